use crate::error::{PipelineError, Result};
use crate::models::{
    CleanerConfig, ExclusionReport, HouseholdMissingness, Reading, TariffRate, WideConsumption,
};
use crate::timestamps::{in_year, year_start};
use log::info;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct ConsumptionCleaner {
    config: CleanerConfig,
}

impl ConsumptionCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    pub fn filter_tariff(&self, rates: Vec<TariffRate>) -> Result<Vec<TariffRate>> {
        let year = self.config.year;
        let rates: Vec<TariffRate> = rates
            .into_iter()
            .filter(|r| in_year(&r.timestamp, year))
            .collect();

        if rates.is_empty() {
            return Err(PipelineError::EmptySelection {
                table: "tariff".to_string(),
                year,
            });
        }
        Ok(rates)
    }

    pub fn filter_consumption(&self, wide: WideConsumption) -> Result<WideConsumption> {
        let year = self.config.year;
        let skip = if self.config.drop_year_start {
            year_start(year)
        } else {
            None
        };

        let filtered = wide.retain_rows(|ts| in_year(ts, year) && Some(*ts) != skip);

        if filtered.height() == 0 || filtered.households.is_empty() {
            return Err(PipelineError::EmptySelection {
                table: "consumption".to_string(),
                year,
            });
        }
        Ok(filtered)
    }

    /// Full cleaning pass: year filter, melt, then drop sparse households.
    pub fn clean(&self, wide: WideConsumption) -> Result<(Vec<Reading>, ExclusionReport)> {
        let filtered = self.filter_consumption(wide)?;
        let readings = melt(filtered);
        let (kept, report) = exclude_sparse_households(readings, self.config.max_missing_percent);

        info!(
            "Removed {} households above {}% missing, {} remaining",
            report.removed_count(),
            self.config.max_missing_percent,
            report.retained
        );
        Ok((kept, report))
    }
}

/// Wide to long: one reading per (timestamp, household), timestamp-major.
pub fn melt(wide: WideConsumption) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(wide.height() * wide.households.len());

    for (row, timestamp) in wide.timestamps.iter().enumerate() {
        for column in &wide.households {
            readings.push(Reading {
                timestamp: *timestamp,
                household_id: Arc::clone(&column.household_id),
                value: column.values[row],
            });
        }
    }

    readings
}

/// Missing-value statistics per household, in order of first appearance.
pub fn missingness(readings: &[Reading]) -> Vec<HouseholdMissingness> {
    let mut order: Vec<Arc<str>> = Vec::new();
    let mut counts: HashMap<Arc<str>, (usize, usize)> = HashMap::new();

    for reading in readings {
        let entry = counts.entry(Arc::clone(&reading.household_id)).or_insert_with(|| {
            order.push(Arc::clone(&reading.household_id));
            (0, 0)
        });
        entry.1 += 1;
        if reading.value.is_none() {
            entry.0 += 1;
        }
    }

    order
        .into_iter()
        .map(|id| {
            let (missing, total) = counts[&id];
            HouseholdMissingness {
                household_id: id.to_string(),
                missing,
                total,
                percent_missing: percent(missing, total),
            }
        })
        .collect()
}

/// A household with no readings at all counts as entirely missing.
fn percent(missing: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        missing as f64 / total as f64 * 100.0
    }
}

/// Drops every household whose missing percentage is strictly above `max_percent`.
pub fn exclude_sparse_households(
    readings: Vec<Reading>,
    max_percent: f64,
) -> (Vec<Reading>, ExclusionReport) {
    let stats = missingness(&readings);

    let removed: Vec<String> = stats
        .iter()
        .filter(|s| s.percent_missing > max_percent)
        .map(|s| s.household_id.clone())
        .collect();
    let report = ExclusionReport {
        retained: stats.len() - removed.len(),
        removed,
    };

    let removed_set: HashSet<&str> = report.removed.iter().map(String::as_str).collect();
    let kept = readings
        .into_iter()
        .filter(|r| !removed_set.contains(&*r.household_id))
        .collect();

    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HouseholdColumn;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn wide_with(values: Vec<(&str, Vec<Option<f64>>)>, first: NaiveDateTime) -> WideConsumption {
        let n = values[0].1.len();
        WideConsumption {
            timestamps: (0..n)
                .map(|i| first + Duration::minutes(30 * i as i64))
                .collect(),
            households: values
                .into_iter()
                .map(|(id, values)| HouseholdColumn {
                    household_id: Arc::from(id),
                    values,
                })
                .collect(),
        }
    }

    #[test]
    fn test_filter_consumption_drops_other_years_and_year_start() {
        let first = start() - Duration::minutes(60);
        let wide = wide_with(vec![("MAC001", vec![Some(1.0); 5])], first);
        let cleaner = ConsumptionCleaner::new(CleanerConfig::default());

        let filtered = cleaner.filter_consumption(wide).unwrap();

        // 23:00 and 23:30 belong to 2012, 00:00 is the dropped export row
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.timestamps[0], start() + Duration::minutes(30));
    }

    #[test]
    fn test_filter_consumption_keeps_year_start_when_disabled() {
        let wide = wide_with(vec![("MAC001", vec![Some(1.0); 3])], start());
        let cleaner = ConsumptionCleaner::new(CleanerConfig {
            drop_year_start: false,
            ..CleanerConfig::default()
        });

        assert_eq!(cleaner.filter_consumption(wide).unwrap().height(), 3);
    }

    #[test]
    fn test_empty_year_selection_is_error() {
        let wide = wide_with(vec![("MAC001", vec![Some(1.0); 3])], start());
        let cleaner = ConsumptionCleaner::new(CleanerConfig {
            year: 2014,
            ..CleanerConfig::default()
        });

        let err = cleaner.filter_consumption(wide).unwrap_err();
        assert!(matches!(err, PipelineError::EmptySelection { year: 2014, .. }));
    }

    #[test]
    fn test_filter_tariff_by_year() {
        let rates = vec![
            TariffRate { timestamp: start() - Duration::minutes(30), price: 1.0 },
            TariffRate { timestamp: start(), price: 2.0 },
        ];
        let kept = ConsumptionCleaner::new(CleanerConfig::default())
            .filter_tariff(rates)
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].price, 2.0);
    }

    #[test]
    fn test_melt_is_timestamp_major() {
        let wide = wide_with(
            vec![("A", vec![Some(1.0), Some(2.0)]), ("B", vec![None, Some(4.0)])],
            start(),
        );

        let long = melt(wide);

        assert_eq!(long.len(), 4);
        assert_eq!(&*long[1].household_id, "B");
        assert_eq!(long[1].value, None);
        assert_eq!(long[2].timestamp, start() + Duration::minutes(30));
        assert_eq!(long[3].value, Some(4.0));
    }

    #[test]
    fn test_sparse_households_are_excluded() {
        // 20 readings each: A has 1 missing (5%), B has 2 missing (10%)
        let mut a = vec![Some(0.1); 20];
        a[3] = None;
        let mut b = vec![Some(0.1); 20];
        b[0] = None;
        b[19] = None;
        let readings = melt(wide_with(vec![("A", a), ("B", b)], start()));

        let stats = missingness(&readings);
        assert_eq!(stats[0].missing, 1);
        assert!((stats[0].percent_missing - 5.0).abs() < 1e-9);
        assert!((stats[1].percent_missing - 10.0).abs() < 1e-9);

        let (kept, report) = exclude_sparse_households(readings, 5.0);
        assert_eq!(report.removed, vec!["B".to_string()]);
        assert_eq!(report.retained, 1);
        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|r| &*r.household_id == "A"));
    }

    #[test]
    fn test_zero_total_counts_as_fully_missing() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
