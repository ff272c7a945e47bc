pub mod aggregator;
pub mod cleaner;
pub mod data_loader;
pub mod error;
pub mod imputer;
pub mod models;
pub mod output;
pub mod timestamps;
pub mod weather;

pub use cleaner::ConsumptionCleaner;
pub use data_loader::DataLoader;
pub use error::{PipelineError, Result};
pub use models::{CleanerConfig, GapPolicy, MergedHourlyRecord, WeatherConfig, WeatherObservation};
pub use weather::WeatherConsolidator;
