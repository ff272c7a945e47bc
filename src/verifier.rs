use anyhow::{Context, Result};
use meter_pipeline::timestamps::parse_timestamp;
use polars::prelude::*;
use std::path::Path;

/// Re-read the written outputs and check their contracts:
/// unique (hour, household) keys, null-free consumption, and a gapless weather hour axis.
pub fn verify_outputs(consumption_csv: Option<&Path>, weather_csv: Option<&Path>) -> Result<usize> {
    println!("\n🔍 Output Verification");
    println!("{}", "=".repeat(60));

    let mut total_issues = 0;

    if let Some(path) = consumption_csv {
        println!("\n  Verifying: {}", path.display());
        total_issues += verify_consumption(path)?;
    }
    if let Some(path) = weather_csv {
        println!("\n  Verifying: {}", path.display());
        total_issues += verify_weather(path)?;
    }

    println!("\n{}", "=".repeat(60));
    if total_issues == 0 {
        println!("✅ Output verification passed! No issues found.");
    } else {
        println!("⚠️  Output verification found {} issues", total_issues);
    }
    Ok(total_issues)
}

fn read(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(df)
}

fn verify_consumption(path: &Path) -> Result<usize> {
    let df = read(path)?;
    let mut issues = 0;

    let duplicates = df
        .clone()
        .lazy()
        .group_by([col("timestamp"), col("household_id")])
        .agg([col("consumption").count().alias("count")])
        .filter(col("count").gt(lit(1)))
        .collect()?;
    if duplicates.height() > 0 {
        println!("    ❌ Found {} duplicate (hour, household) entries", duplicates.height());
        issues += duplicates.height();
    } else {
        println!("    ✅ No duplicates found");
    }

    let nulls = df.column("consumption")?.null_count();
    if nulls > 0 {
        println!("    ❌ Found {} missing consumption values", nulls);
        issues += nulls;
    } else {
        println!("    ✅ No missing consumption values");
    }

    println!("    📊 Total records: {}", df.height());
    println!("    📊 Households: {}", df.column("household_id")?.n_unique()?);
    println!("    📊 Hours without tariff: {}", df.column("tariff")?.null_count());
    Ok(issues)
}

fn verify_weather(path: &Path) -> Result<usize> {
    let df = read(path)?;
    let mut issues = 0;

    let column = df.column("datetime")?.cast(&DataType::String)?;
    let timestamps: Vec<_> = column
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_timestamp))
        .collect();

    let unparsed = timestamps.iter().filter(|t| t.is_none()).count();
    if unparsed > 0 {
        println!("    ❌ Found {} unparseable timestamps", unparsed);
        issues += unparsed;
    }

    let mut irregular = 0;
    for pair in timestamps.windows(2) {
        if let (Some(prev), Some(next)) = (pair[0], pair[1]) {
            if (next - prev).num_minutes() != 60 {
                irregular += 1;
            }
        }
    }
    if irregular > 0 {
        println!("    ⚠️  Found {} non-hourly steps (gaps, duplicates or disorder)", irregular);
        issues += irregular;
    } else {
        println!("    ✅ One row per hour");
    }

    println!("    📊 Total records: {}", df.height());
    Ok(issues)
}
