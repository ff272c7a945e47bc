use crate::output_target::OutputTarget;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use meter_pipeline::aggregator::merge_hourly;
use meter_pipeline::imputer::impute_with_progress;
use meter_pipeline::models::ExclusionReport;
use meter_pipeline::output::merged_frame;
use meter_pipeline::{CleanerConfig, ConsumptionCleaner, DataLoader};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct ConsumptionSummary {
    pub config: CleanerConfig,
    pub tariff_rows: usize,
    pub consumption_rows: usize,
    pub households: ExclusionReport,
    pub imputed_readings: usize,
    pub hourly_rows: usize,
    pub outputs: Vec<PathBuf>,
}

pub struct ConsumptionProcessor {
    tariff_path: PathBuf,
    consumption_path: PathBuf,
    output_name: String,
    target: OutputTarget,
    cleaner: ConsumptionCleaner,
}

impl ConsumptionProcessor {
    pub fn new(
        tariff_path: PathBuf,
        consumption_path: PathBuf,
        output_name: String,
        target: OutputTarget,
        config: CleanerConfig,
    ) -> Self {
        Self {
            tariff_path,
            consumption_path,
            output_name,
            target,
            cleaner: ConsumptionCleaner::new(config),
        }
    }

    pub fn process(&self) -> Result<ConsumptionSummary> {
        let year = self.cleaner.config().year;
        println!("\n⚡ Processing consumption and tariff for {}", year);
        println!("{}", "=".repeat(60));

        let loader = DataLoader::new();

        println!("  📂 Loading tariff: {}", self.tariff_path.display());
        let rates = loader
            .load_tariff(&self.tariff_path)
            .context("loading tariff")?;
        let rates = self.cleaner.filter_tariff(rates)?;
        info!("{} tariff rows in {}", rates.len(), year);

        println!("  📂 Loading consumption: {}", self.consumption_path.display());
        let wide = loader
            .load_consumption(&self.consumption_path)
            .context("loading consumption")?;
        info!(
            "Consumption source: {} rows x {} households",
            wide.height(),
            wide.households.len()
        );

        println!("  🧹 Filtering year and dropping sparse households...");
        let (readings, households) = self.cleaner.clean(wide)?;
        let consumption_rows = readings.len();
        println!(
            "  📊 Households removed: {}, remaining: {}",
            households.removed_count(),
            households.retained
        );

        println!("  🔧 Imputing missing readings...");
        let pb = ProgressBar::new(households.retained as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} households")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let imputed = impute_with_progress(readings, || pb.inc(1))?;
        pb.finish_with_message("Households imputed");

        println!("  🕐 Aggregating to hourly buckets and joining tariff...");
        let merged = merge_hourly(&imputed, &rates)?;
        println!("  📊 Final record count: {}", merged.len());

        let mut df = merged_frame(&merged)?;
        let outputs = self.target.write(&self.output_name, &mut df)?;

        println!("  ✅ Completed consumption/tariff output");
        Ok(ConsumptionSummary {
            config: self.cleaner.config().clone(),
            tariff_rows: rates.len(),
            consumption_rows,
            households,
            imputed_readings: imputed.len(),
            hourly_rows: merged.len(),
            outputs,
        })
    }
}
