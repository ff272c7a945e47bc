use crate::error::{PipelineError, Result};
use crate::models::{MergedHourlyRecord, WeatherObservation, WEATHER_MEASURES};
use crate::timestamps::format_timestamp;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

pub fn merged_frame(records: &[MergedHourlyRecord]) -> Result<DataFrame> {
    let timestamps: Vec<String> = records.iter().map(|r| format_timestamp(&r.timestamp)).collect();
    let ids: Vec<&str> = records.iter().map(|r| r.household_id.as_str()).collect();
    let consumption: Vec<f64> = records.iter().map(|r| r.consumption).collect();
    let tariff: Vec<Option<f64>> = records.iter().map(|r| r.tariff).collect();

    Ok(df!(
        "timestamp" => timestamps,
        "household_id" => ids,
        "consumption" => consumption,
        "tariff" => tariff
    )?)
}

pub fn weather_frame(observations: &[WeatherObservation]) -> Result<DataFrame> {
    let timestamps: Vec<String> = observations
        .iter()
        .map(|o| format_timestamp(&o.timestamp))
        .collect();

    let mut columns = vec![Series::new("datetime".into(), timestamps)];
    for (i, name) in WEATHER_MEASURES.iter().enumerate() {
        let values: Vec<Option<f64>> = observations.iter().map(|o| o.measures()[i]).collect();
        columns.push(Series::new((*name).into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = create(path)?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    File::create(path).map_err(|e| PipelineError::io(path, e))
}
