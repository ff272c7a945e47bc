use crate::error::{PipelineError, Result};
use crate::models::{HouseholdColumn, TariffRate, WeatherObservation, WideConsumption, WEATHER_MEASURES};
use crate::timestamps::parse_timestamp;
use chrono::NaiveDateTime;
use glob::glob;
use log::{debug, warn};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads the raw CSV sources into typed tables.
///
/// Every column is read as text and converted here, so cells such as `Null`
/// or blanks in a numeric column become missing values instead of schema errors.
#[derive(Debug, Clone)]
pub struct DataLoader {
    pub gmt_column: String,
    pub price_column: String,
    pub weather_time_column: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self {
            gmt_column: "GMT".to_string(),
            price_column: "Price".to_string(),
            weather_time_column: "datetime".to_string(),
        }
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the half-hourly tariff. Rows without a numeric price are skipped.
    pub fn load_tariff(&self, path: &Path) -> Result<Vec<TariffRate>> {
        let df = read_text_csv(path)?;
        let timestamps = parse_time_column(&df, path, &self.gmt_column)?;
        let prices = numeric_column(&df, path, &self.price_column)?;

        let mut skipped = 0;
        let rates: Vec<TariffRate> = timestamps
            .into_iter()
            .zip(prices)
            .filter_map(|(timestamp, price)| match price {
                Some(price) => Some(TariffRate { timestamp, price }),
                None => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            warn!("{}: skipped {} tariff rows without a price", path.display(), skipped);
        }
        debug!("Loaded {} tariff rows from {}", rates.len(), path.display());
        Ok(rates)
    }

    /// Load the consumption table in its wide form: `GMT` plus one column per household.
    pub fn load_consumption(&self, path: &Path) -> Result<WideConsumption> {
        // The frame reader renames repeated headers, so check the raw names first
        let mut seen = HashSet::new();
        for name in read_header(path)? {
            if name != self.gmt_column && !seen.insert(name.clone()) {
                return Err(PipelineError::DuplicateHousehold {
                    path: path.to_path_buf(),
                    household_id: name,
                });
            }
        }

        let df = read_text_csv(path)?;
        let timestamps = parse_time_column(&df, path, &self.gmt_column)?;

        let mut households = Vec::with_capacity(df.width().saturating_sub(1));
        for series in df.get_columns() {
            let name = series.name().to_string();
            if name == self.gmt_column {
                continue;
            }
            households.push(HouseholdColumn {
                household_id: Arc::from(name.as_str()),
                values: parse_numbers(series)?,
            });
        }

        debug!(
            "Loaded {} rows x {} households from {}",
            timestamps.len(),
            households.len(),
            path.display()
        );
        Ok(WideConsumption {
            timestamps,
            households,
        })
    }

    /// Load one weather source, keeping only the timestamp and the five measurements.
    pub fn load_weather(&self, path: &Path) -> Result<Vec<WeatherObservation>> {
        let df = read_text_csv(path)?;
        let timestamps = parse_time_column(&df, path, &self.weather_time_column)?;

        let mut measures = Vec::with_capacity(WEATHER_MEASURES.len());
        for name in WEATHER_MEASURES {
            measures.push(numeric_column(&df, path, name)?);
        }

        let observations = timestamps
            .into_iter()
            .enumerate()
            .map(|(idx, timestamp)| {
                WeatherObservation::from_measures(
                    timestamp,
                    [
                        measures[0][idx],
                        measures[1][idx],
                        measures[2][idx],
                        measures[3][idx],
                        measures[4][idx],
                    ],
                )
            })
            .collect();

        Ok(observations)
    }
}

/// Resolve a glob pattern to the list of weather sources, sorted by path.
/// The order is the de-duplication precedence used by the consolidator.
pub fn discover_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?.filter_map(|entry| entry.ok()).collect();
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::NoInputFiles {
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

fn read_text_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()?;

    Ok(df)
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| PipelineError::io(path, e))?;

    Ok(line
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect())
}

fn column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a Series> {
    df.column(name).map_err(|_| PipelineError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

fn parse_time_column(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<NaiveDateTime>> {
    let values = column(df, path, name)?.str()?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.and_then(parse_timestamp).ok_or_else(|| {
                PipelineError::UnparseableTimestamp {
                    path: path.to_path_buf(),
                    row: row + 1,
                    value: value.unwrap_or_default().to_string(),
                }
            })
        })
        .collect()
}

fn numeric_column(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<Option<f64>>> {
    parse_numbers(column(df, path, name)?)
}

fn parse_numbers(series: &Series) -> Result<Vec<Option<f64>>> {
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}
