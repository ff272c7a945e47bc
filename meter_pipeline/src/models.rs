use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Column names of the five weather measurements kept in the output, in output order.
pub const WEATHER_MEASURES: [&str; 5] = ["solarradiation", "windspeed", "temp", "precip", "humidity"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    pub year: i32,
    pub max_missing_percent: f64,
    pub drop_year_start: bool, // first GMT row of the year is an export artifact
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            year: 2013,
            max_missing_percent: 5.0,
            drop_year_start: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    #[default]
    Fail,
    Warn,
    Interpolate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub gap_policy: GapPolicy,
    /// When set, the consolidated series must hold every hour of this year.
    pub coverage_year: Option<i32>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            gap_policy: GapPolicy::Fail,
            coverage_year: Some(CleanerConfig::default().year),
        }
    }
}

/// Half-hourly tariff price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRate {
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

/// Consumption table as it arrives: one value column per household.
#[derive(Debug, Clone, Default)]
pub struct WideConsumption {
    pub timestamps: Vec<NaiveDateTime>,
    pub households: Vec<HouseholdColumn>,
}

#[derive(Debug, Clone)]
pub struct HouseholdColumn {
    pub household_id: Arc<str>,
    pub values: Vec<Option<f64>>,
}

impl WideConsumption {
    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    /// Keeps the rows for which `keep` returns true, across every household column.
    pub fn retain_rows<F>(self, keep: F) -> Self
    where
        F: Fn(&NaiveDateTime) -> bool,
    {
        let mask: Vec<bool> = self.timestamps.iter().map(|ts| keep(ts)).collect();
        let timestamps = self
            .timestamps
            .into_iter()
            .zip(&mask)
            .filter_map(|(ts, keep)| keep.then_some(ts))
            .collect();
        let households = self
            .households
            .into_iter()
            .map(|column| HouseholdColumn {
                household_id: column.household_id,
                values: column
                    .values
                    .into_iter()
                    .zip(&mask)
                    .filter_map(|(v, keep)| keep.then_some(v))
                    .collect(),
            })
            .collect();

        Self {
            timestamps,
            households,
        }
    }
}

/// One half-hourly consumption reading in long format.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub household_id: Arc<str>,
    pub value: Option<f64>,
}

/// A reading after imputation; the value can no longer be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedReading {
    pub timestamp: NaiveDateTime,
    pub household_id: Arc<str>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdMissingness {
    pub household_id: String,
    pub missing: usize,
    pub total: usize,
    pub percent_missing: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExclusionReport {
    pub removed: Vec<String>,
    pub retained: usize,
}

impl ExclusionReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedHourlyRecord {
    pub timestamp: NaiveDateTime,
    pub household_id: String,
    pub consumption: f64,
    pub tariff: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub timestamp: NaiveDateTime,
    pub solarradiation: Option<f64>,
    pub windspeed: Option<f64>,
    pub temp: Option<f64>,
    pub precip: Option<f64>,
    pub humidity: Option<f64>,
}

impl WeatherObservation {
    pub fn measures(&self) -> [Option<f64>; 5] {
        [
            self.solarradiation,
            self.windspeed,
            self.temp,
            self.precip,
            self.humidity,
        ]
    }

    pub fn from_measures(timestamp: NaiveDateTime, m: [Option<f64>; 5]) -> Self {
        Self {
            timestamp,
            solarradiation: m[0],
            windspeed: m[1],
            temp: m[2],
            precip: m[3],
            humidity: m[4],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GapReport {
    pub input_rows: usize,
    pub duplicates_dropped: usize,
    pub gaps_filled: Vec<NaiveDateTime>,
    pub gaps_left: Vec<NaiveDateTime>,
}
