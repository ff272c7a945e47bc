use crate::consumption_processor::ConsumptionSummary;
use crate::weather_processor::WeatherSummary;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub elapsed_secs: f64,
    pub consumption: Option<ConsumptionSummary>,
    pub weather: Option<WeatherSummary>,
}

impl RunReport {
    pub fn new(started_at: String) -> Self {
        Self {
            started_at,
            ..Default::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_writes_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let mut report = RunReport::new("2013-01-01T00:00:00".to_string());
        report.elapsed_secs = 1.5;

        report.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["elapsed_secs"], 1.5);
        assert!(value["consumption"].is_null());
    }
}
