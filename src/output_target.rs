use anyhow::{Context, Result};
use meter_pipeline::output::{write_csv, write_parquet};
use polars::prelude::DataFrame;
use std::path::PathBuf;

/// Where a processor writes its table: always CSV, Parquet on request.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub output_dir: PathBuf,
    pub parquet: bool,
}

impl OutputTarget {
    pub fn new(output_dir: PathBuf, parquet: bool) -> Self {
        Self { output_dir, parquet }
    }

    pub fn csv_path(&self, base_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", base_name))
    }

    pub fn write(&self, base_name: &str, df: &mut DataFrame) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let csv_path = self.csv_path(base_name);
        println!("  💾 Saving CSV: {}", csv_path.display());
        write_csv(df, &csv_path)
            .with_context(|| format!("writing {}", csv_path.display()))?;
        written.push(csv_path);

        if self.parquet {
            let parquet_path = self.output_dir.join(format!("{}.parquet", base_name));
            println!("  📦 Saving Parquet: {}", parquet_path.display());
            write_parquet(df, &parquet_path)
                .with_context(|| format!("writing {}", parquet_path.display()))?;
            written.push(parquet_path);
        }

        Ok(written)
    }
}
