use crate::error::{PipelineError, Result};
use crate::models::{ImputedReading, MergedHourlyRecord, TariffRate};
use crate::timestamps::{from_millis, hour_bucket, to_millis};
use log::{debug, warn};
use polars::prelude::*;

/// Hourly consumption per household: sum of the readings sharing an hour bucket.
pub fn hourly_consumption(readings: &[ImputedReading]) -> Result<LazyFrame> {
    let hours: Vec<i64> = readings
        .iter()
        .map(|r| to_millis(&hour_bucket(r.timestamp)))
        .collect();
    let ids: Vec<&str> = readings.iter().map(|r| &*r.household_id).collect();
    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();

    let df = df!(
        "hour" => hours,
        "household_id" => ids,
        "consumption" => values
    )?;

    Ok(df
        .lazy()
        .group_by([col("hour"), col("household_id")])
        .agg([col("consumption").sum()]))
}

/// Hourly tariff: mean price of the half-hours sharing an hour bucket.
pub fn hourly_tariff(rates: &[TariffRate]) -> Result<LazyFrame> {
    let hours: Vec<i64> = rates
        .iter()
        .map(|r| to_millis(&hour_bucket(r.timestamp)))
        .collect();
    let prices: Vec<f64> = rates.iter().map(|r| r.price).collect();

    let df = df!(
        "hour" => hours,
        "tariff" => prices
    )?;

    Ok(df
        .lazy()
        .group_by([col("hour")])
        .agg([col("tariff").mean()]))
}

/// Left-join hourly consumption onto hourly tariff, sorted by hour then household.
///
/// Every consumption bucket survives the join; hours without a tariff keep
/// `tariff = None`.
pub fn merge_hourly(
    readings: &[ImputedReading],
    rates: &[TariffRate],
) -> Result<Vec<MergedHourlyRecord>> {
    let merged = hourly_consumption(readings)?
        .join(
            hourly_tariff(rates)?,
            [col("hour")],
            [col("hour")],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(
            [col("hour"), col("household_id")],
            SortMultipleOptions::default(),
        )
        .collect()?;

    records_from_frame(&merged)
}

/// Convert the joined frame back into records. Key and consumption columns
/// must be fully populated; only `tariff` may be null.
fn records_from_frame(merged: &DataFrame) -> Result<Vec<MergedHourlyRecord>> {
    let hours = merged.column("hour")?.i64()?;
    let ids = merged.column("household_id")?.str()?;
    let consumption = merged.column("consumption")?.f64()?;
    let tariff = merged.column("tariff")?.f64()?;
    let null_at = |row, column| PipelineError::NullInMergedFrame { row, column };

    let mut records = Vec::with_capacity(merged.height());
    let mut untariffed = 0;
    for idx in 0..merged.height() {
        let hour = hours
            .get(idx)
            .and_then(from_millis)
            .ok_or_else(|| null_at(idx, "hour"))?;
        let id = ids.get(idx).ok_or_else(|| null_at(idx, "household_id"))?;
        let value = consumption
            .get(idx)
            .ok_or_else(|| null_at(idx, "consumption"))?;
        let price = tariff.get(idx);
        if price.is_none() {
            untariffed += 1;
        }
        records.push(MergedHourlyRecord {
            timestamp: hour,
            household_id: id.to_string(),
            consumption: value,
            tariff: price,
        });
    }

    if untariffed > 0 {
        warn!("{} hourly consumption rows have no tariff for their hour", untariffed);
    }
    debug!("Merged {} hourly rows", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn reading(id: &str, ts: NaiveDateTime, value: f64) -> ImputedReading {
        ImputedReading {
            timestamp: ts,
            household_id: Arc::from(id),
            value,
        }
    }

    #[test]
    fn test_half_hours_sum_into_their_hour() {
        let readings = vec![
            reading("MAC001", at(0, 30), 0.2),
            reading("MAC001", at(1, 0), 0.3),
        ];
        let rates = vec![
            TariffRate { timestamp: at(0, 30), price: 10.0 },
            TariffRate { timestamp: at(1, 0), price: 20.0 },
        ];

        let merged = merge_hourly(&readings, &rates).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp, at(1, 0));
        assert_eq!(merged[0].household_id, "MAC001");
        assert!((merged[0].consumption - 0.5).abs() < 1e-9);
        assert_eq!(merged[0].tariff, Some(15.0));
    }

    #[test]
    fn test_left_join_keeps_hours_without_tariff() {
        let readings = vec![
            reading("MAC002", at(1, 0), 1.0),
            reading("MAC001", at(1, 0), 2.0),
            reading("MAC001", at(3, 0), 3.0),
        ];
        let rates = vec![TariffRate { timestamp: at(1, 0), price: 12.5 }];

        let merged = merge_hourly(&readings, &rates).unwrap();

        assert_eq!(merged.len(), 3);
        // Sorted by hour, then household
        assert_eq!(merged[0].household_id, "MAC001");
        assert_eq!(merged[1].household_id, "MAC002");
        assert_eq!(merged[0].tariff, Some(12.5));
        assert_eq!(merged[1].tariff, Some(12.5));
        assert_eq!(merged[2].timestamp, at(3, 0));
        assert_eq!(merged[2].tariff, None);
    }

    #[test]
    fn test_each_hour_household_pair_appears_once() {
        let mut readings = Vec::new();
        for id in ["A", "B"] {
            for half_hour in 0..8u32 {
                readings.push(reading(id, at(half_hour / 2, (half_hour % 2) * 30), 1.0));
            }
        }
        let merged = merge_hourly(&readings, &[]).unwrap();

        // 00:00 alone, 00:30+01:00, 01:30+02:00, 02:30+03:00, 03:30 alone
        assert_eq!(merged.len(), 2 * 5);
        let mut keys: Vec<(NaiveDateTime, String)> = merged
            .iter()
            .map(|r| (r.timestamp, r.household_id.clone()))
            .collect();
        keys.dedup();
        assert_eq!(keys.len(), merged.len());
        assert!(merged.iter().all(|r| r.tariff.is_none()));
    }

    #[test]
    fn test_null_consumption_in_frame_is_an_error() {
        let frame = df!(
            "hour" => [Some(to_millis(&at(1, 0)))],
            "household_id" => [Some("MAC001")],
            "consumption" => [None::<f64>],
            "tariff" => [Some(10.0)]
        )
        .unwrap();

        let err = records_from_frame(&frame).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::NullInMergedFrame { row: 0, column: "consumption" }
        ));
    }
}
