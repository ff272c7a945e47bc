use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use meter_pipeline::aggregator::merge_hourly;
use meter_pipeline::imputer::impute;
use meter_pipeline::models::{Reading, TariffRate};
use std::sync::Arc;

const HOUSEHOLDS: usize = 50;
const HALF_HOURS: i64 = 48 * 30;

fn sample_readings() -> Vec<Reading> {
    let start = NaiveDate::from_ymd_opt(2013, 6, 1)
        .unwrap()
        .and_hms_opt(0, 30, 0)
        .unwrap();
    let ids: Vec<Arc<str>> = (0..HOUSEHOLDS)
        .map(|i| Arc::from(format!("MAC{:06}", i).as_str()))
        .collect();

    let mut readings = Vec::new();
    for step in 0..HALF_HOURS {
        for (h, id) in ids.iter().enumerate() {
            // Every 17th reading missing to give the interpolator work
            let value = if (step as usize + h) % 17 == 0 {
                None
            } else {
                Some(0.1 + (step % 48) as f64 * 0.01)
            };
            readings.push(Reading {
                timestamp: start + Duration::minutes(30 * step),
                household_id: Arc::clone(id),
                value,
            });
        }
    }
    readings
}

fn sample_tariff() -> Vec<TariffRate> {
    let start = NaiveDate::from_ymd_opt(2013, 6, 1)
        .unwrap()
        .and_hms_opt(0, 30, 0)
        .unwrap();
    (0..HALF_HOURS)
        .map(|step| TariffRate {
            timestamp: start + Duration::minutes(30 * step),
            price: if step % 48 > 32 { 67.2 } else { 11.76 },
        })
        .collect()
}

fn benchmark_impute(c: &mut Criterion) {
    let readings = sample_readings();

    c.bench_function("impute_month_50_households", |b| {
        b.iter(|| {
            let _imputed = black_box(impute(readings.clone()));
        });
    });
}

fn benchmark_merge(c: &mut Criterion) {
    let imputed = impute(sample_readings()).unwrap();
    let tariff = sample_tariff();

    c.bench_function("merge_hourly_month_50_households", |b| {
        b.iter(|| {
            let _merged = black_box(merge_hourly(&imputed, &tariff));
        });
    });
}

criterion_group!(benches, benchmark_impute, benchmark_merge);
criterion_main!(benches);
