use chrono::{Duration, NaiveDate};
use meter_pipeline::{
    aggregator::merge_hourly,
    imputer::impute,
    models::{HouseholdColumn, TariffRate, WideConsumption},
    CleanerConfig, ConsumptionCleaner,
};
use std::sync::Arc;

fn main() {
    let start = NaiveDate::from_ymd_opt(2013, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let timestamps: Vec<_> = (0..48).map(|i| start + Duration::minutes(30 * i)).collect();

    // Two households for one day; MAC002 loses a reading at 09:00
    let mut mac002: Vec<Option<f64>> = (0..48).map(|i| Some(0.05 * (i % 6) as f64)).collect();
    mac002[18] = None;
    let wide = WideConsumption {
        timestamps: timestamps.clone(),
        households: vec![
            HouseholdColumn {
                household_id: Arc::from("MAC001"),
                values: (0..48).map(|i| Some(0.1 + 0.01 * i as f64)).collect(),
            },
            HouseholdColumn {
                household_id: Arc::from("MAC002"),
                values: mac002,
            },
        ],
    };

    // Low band overnight, high band in the evening peak
    let tariff: Vec<TariffRate> = timestamps
        .iter()
        .map(|ts| TariffRate {
            timestamp: *ts,
            price: if (34..40).contains(&((*ts - start).num_minutes() / 30)) {
                67.20
            } else {
                11.76
            },
        })
        .collect();

    let cleaner = ConsumptionCleaner::new(CleanerConfig::default());
    let (readings, report) = cleaner.clean(wide).expect("cleaning failed");
    println!(
        "Households kept: {}, removed: {:?}",
        report.retained, report.removed
    );

    let imputed = impute(readings).expect("imputation failed");
    let merged = merge_hourly(&imputed, &tariff).expect("merge failed");

    println!("{:<20} {:<8} {:>12} {:>8}", "hour", "house", "consumption", "tariff");
    for row in merged.iter().take(12) {
        println!(
            "{:<20} {:<8} {:>12.3} {:>8}",
            row.timestamp.to_string(),
            row.household_id,
            row.consumption,
            row.tariff.map(|t| format!("{:.2}", t)).unwrap_or_default()
        );
    }
}
