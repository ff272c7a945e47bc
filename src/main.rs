use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use meter_pipeline::{CleanerConfig, GapPolicy, WeatherConfig};
use std::path::PathBuf;

mod consumption_processor;
mod output_target;
mod run_report;
mod verifier;
mod weather_processor;

use consumption_processor::ConsumptionProcessor;
use output_target::OutputTarget;
use run_report::RunReport;
use weather_processor::WeatherProcessor;

#[derive(Parser)]
#[command(name = "meter_processor")]
#[command(about = "Align smart-meter consumption, tariff and weather data to an hourly grid")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for every output file
    #[arg(long, global = true, env = "METER_OUTPUT_DIR", default_value = "processed")]
    output_dir: PathBuf,

    /// Also write Parquet copies of the outputs
    #[arg(long, global = true)]
    parquet: bool,

    /// Write a JSON run report to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Worker threads (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Clean, impute and merge consumption with tariff prices
    Consumption(ConsumptionArgs),
    /// Consolidate weather files into one hourly series
    Weather(WeatherArgs),
    /// Run both pipelines
    All {
        #[command(flatten)]
        consumption: ConsumptionArgs,
        #[command(flatten)]
        weather: WeatherArgs,
    },
    /// Check previously written outputs
    Verify {
        #[arg(long, default_value = "consumption_tariff_hourly")]
        consumption_output: String,
        #[arg(long, default_value = "weather_hourly")]
        weather_output: String,
    },
}

#[derive(Args)]
struct ConsumptionArgs {
    /// Half-hourly tariff CSV (GMT, Price)
    #[arg(long, default_value = "tariffs.csv")]
    tariff: PathBuf,

    /// Wide consumption CSV (GMT plus one column per household)
    #[arg(long, default_value = "consumption.csv")]
    consumption: PathBuf,

    /// Analysis year
    #[arg(long, default_value_t = 2013)]
    year: i32,

    /// Households above this percentage of missing readings are dropped
    #[arg(long, default_value_t = 5.0)]
    max_missing_percent: f64,

    /// Keep the row at exactly midnight on January 1st
    #[arg(long)]
    keep_year_start: bool,

    /// Output base name (without extension)
    #[arg(long, default_value = "consumption_tariff_hourly")]
    consumption_output: String,
}

#[derive(Args)]
struct WeatherArgs {
    /// Glob matching the weather source files; sorted path order sets duplicate precedence
    #[arg(long, default_value = "weather_*.csv")]
    weather_glob: String,

    /// What to do with gaps other than the spring-forward hour
    #[arg(long, value_enum, default_value = "fail")]
    gap_policy: GapPolicyArg,

    /// Year whose every hour must be present (defaults to the analysis year)
    #[arg(long)]
    weather_year: Option<i32>,

    /// Accept output that does not cover the whole year
    #[arg(long)]
    skip_coverage: bool,

    /// Output base name (without extension)
    #[arg(long, default_value = "weather_hourly")]
    weather_output: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum GapPolicyArg {
    Fail,
    Warn,
    Interpolate,
}

impl From<GapPolicyArg> for GapPolicy {
    fn from(arg: GapPolicyArg) -> Self {
        match arg {
            GapPolicyArg::Fail => GapPolicy::Fail,
            GapPolicyArg::Warn => GapPolicy::Warn,
            GapPolicyArg::Interpolate => GapPolicy::Interpolate,
        }
    }
}

impl ConsumptionArgs {
    fn processor(&self, target: &OutputTarget) -> ConsumptionProcessor {
        ConsumptionProcessor::new(
            self.tariff.clone(),
            self.consumption.clone(),
            self.consumption_output.clone(),
            target.clone(),
            CleanerConfig {
                year: self.year,
                max_missing_percent: self.max_missing_percent,
                drop_year_start: !self.keep_year_start,
            },
        )
    }
}

impl WeatherArgs {
    fn config(&self, analysis_year: i32) -> WeatherConfig {
        let coverage_year = if self.skip_coverage {
            None
        } else {
            Some(self.weather_year.unwrap_or(analysis_year))
        };
        WeatherConfig {
            gap_policy: self.gap_policy.into(),
            coverage_year,
        }
    }

    fn processor(&self, target: &OutputTarget, analysis_year: i32) -> WeatherProcessor {
        WeatherProcessor::new(
            self.weather_glob.clone(),
            self.weather_output.clone(),
            target.clone(),
            self.config(analysis_year),
        )
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let threads = cli.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    println!("🚀 Smart-meter hourly processor");
    println!("Using {} worker threads", rayon::current_num_threads());
    println!("{}", "=".repeat(60));

    let target = OutputTarget::new(cli.output_dir.clone(), cli.parquet);
    let start = std::time::Instant::now();
    let mut report = RunReport::new(chrono::Local::now().to_rfc3339());

    match &cli.command {
        Command::Consumption(args) => {
            report.consumption = Some(args.processor(&target).process()?);
        }
        Command::Weather(args) => {
            let year = CleanerConfig::default().year;
            report.weather = Some(args.processor(&target, year).process()?);
        }
        Command::All {
            consumption,
            weather,
        } => {
            report.consumption = Some(consumption.processor(&target).process()?);
            report.weather = Some(weather.processor(&target, consumption.year).process()?);
        }
        Command::Verify {
            consumption_output,
            weather_output,
        } => {
            let consumption = target.csv_path(consumption_output);
            let weather = target.csv_path(weather_output);
            let issues = verifier::verify_outputs(
                Some(consumption.as_path()).filter(|p| p.exists()),
                Some(weather.as_path()).filter(|p| p.exists()),
            )?;
            if issues > 0 {
                anyhow::bail!("{} issues found in outputs", issues);
            }
            return Ok(());
        }
    }

    let duration = start.elapsed();
    report.elapsed_secs = duration.as_secs_f64();
    if let Some(path) = &cli.report {
        report.save(path)?;
        info!("Run report written to {}", path.display());
    }

    println!("\n✅ Processing complete in {:?}!", duration);
    Ok(())
}
