use crate::output_target::OutputTarget;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use meter_pipeline::data_loader::discover_files;
use meter_pipeline::models::GapReport;
use meter_pipeline::output::weather_frame;
use meter_pipeline::{DataLoader, WeatherConfig, WeatherConsolidator, WeatherObservation};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct WeatherSummary {
    pub config: WeatherConfig,
    pub sources: Vec<PathBuf>,
    pub gaps: GapReport,
    pub hourly_rows: usize,
    pub outputs: Vec<PathBuf>,
}

pub struct WeatherProcessor {
    pattern: String,
    output_name: String,
    target: OutputTarget,
    config: WeatherConfig,
}

impl WeatherProcessor {
    pub fn new(pattern: String, output_name: String, target: OutputTarget, config: WeatherConfig) -> Self {
        Self {
            pattern,
            output_name,
            target,
            config,
        }
    }

    pub fn process(&self) -> Result<WeatherSummary> {
        println!("\n🌦️  Processing weather observations");
        println!("{}", "=".repeat(60));

        let files = discover_files(&self.pattern)?;
        println!("Found {} weather files", files.len());
        for file in &files {
            info!("Weather source: {}", file.display());
        }

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        // Collect keeps file order, which decides which duplicate survives
        let loader = DataLoader::new();
        let sources: Vec<Vec<WeatherObservation>> = files
            .par_iter()
            .map(|file| {
                let observations = loader
                    .load_weather(file)
                    .with_context(|| format!("loading weather file {}", file.display()));
                pb.inc(1);
                observations
            })
            .collect::<Result<_>>()?;
        pb.finish_with_message("Files loaded");

        println!("  🧹 Removing duplicates and patching gaps...");
        let consolidator = WeatherConsolidator::new(self.config.clone());
        let (series, gaps) = consolidator.consolidate(sources)?;
        println!(
            "  📊 {} duplicates dropped, {} hours synthesized, {} gaps left",
            gaps.duplicates_dropped,
            gaps.gaps_filled.len(),
            gaps.gaps_left.len()
        );
        println!("  📊 Final record count: {}", series.len());

        let mut df = weather_frame(&series)?;
        let outputs = self.target.write(&self.output_name, &mut df)?;

        println!("  ✅ Completed weather output");
        Ok(WeatherSummary {
            config: self.config.clone(),
            sources: files,
            gaps,
            hourly_rows: series.len(),
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use meter_pipeline::{GapPolicy, PipelineError};
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "name,datetime,temp,feelslike,humidity,precip,windspeed,solarradiation\n";

    #[test]
    fn test_process_merges_overlapping_sources() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("weather_1.csv"),
            format!(
                "{}London,2013-03-31T00:00:00,5.0,3.0,90,0,10,0\n\
                 London,2013-03-31T02:00:00,7.0,5.0,88,0,12,0\n",
                HEADER
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("weather_2.csv"),
            format!(
                "{}London,2013-03-31T02:00:00,99.0,99.0,10,0,1,0\n\
                 London,2013-03-31T03:00:00,8.0,6.0,85,0,14,20\n",
                HEADER
            ),
        )
        .unwrap();

        let out_dir = dir.path().join("out");
        let processor = WeatherProcessor::new(
            dir.path().join("weather_*.csv").to_string_lossy().into_owned(),
            "weather".to_string(),
            OutputTarget::new(out_dir.clone(), true),
            WeatherConfig {
                gap_policy: GapPolicy::Fail,
                coverage_year: None,
            },
        );

        let summary = processor.process().unwrap();

        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.gaps.duplicates_dropped, 1);
        assert_eq!(summary.hourly_rows, 4);
        assert_eq!(summary.outputs.len(), 2);

        let text = fs::read_to_string(out_dir.join("weather.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "datetime,solarradiation,windspeed,temp,precip,humidity");
        let synthesized: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(synthesized[0], "2013-03-31 01:00:00");
        assert!((synthesized[3].parse::<f64>().unwrap() - 6.0).abs() < 1e-9);
        // First source wins for the duplicated 02:00 row
        let kept: Vec<&str> = lines[3].split(',').collect();
        assert!((kept[3].parse::<f64>().unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_first_hour_fails_by_default() {
        let dir = TempDir::new().unwrap();
        let start = NaiveDate::from_ymd_opt(2013, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut contents = HEADER.to_string();
        for h in 1..8760 {
            let ts = start + Duration::hours(h);
            contents.push_str(&format!(
                "London,{},5.0,3.0,90,0,10,0\n",
                ts.format("%Y-%m-%dT%H:%M:%S")
            ));
        }
        fs::write(dir.path().join("weather_1.csv"), contents).unwrap();

        let out_dir = dir.path().join("out");
        let processor = WeatherProcessor::new(
            dir.path().join("weather_*.csv").to_string_lossy().into_owned(),
            "weather".to_string(),
            OutputTarget::new(out_dir.clone(), false),
            WeatherConfig::default(),
        );

        let err = processor.process().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::IncompleteCoverage { expected: 8760, actual: 8759, .. })
        ));
        assert!(!out_dir.join("weather.csv").exists());
    }

    #[test]
    fn test_process_without_sources_fails() {
        let dir = TempDir::new().unwrap();
        let processor = WeatherProcessor::new(
            dir.path().join("weather_*.csv").to_string_lossy().into_owned(),
            "weather".to_string(),
            OutputTarget::new(dir.path().join("out"), false),
            WeatherConfig::default(),
        );

        assert!(processor.process().is_err());
    }
}
