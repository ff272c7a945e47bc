use crate::error::{PipelineError, Result};
use crate::models::{GapPolicy, GapReport, WeatherConfig, WeatherObservation};
use crate::timestamps::{hours_in_year, in_year};
use chrono::{Duration, NaiveDateTime, Timelike};
use log::{info, warn};


pub struct WeatherConsolidator {
    config: WeatherConfig,
}

impl WeatherConsolidator {
    pub fn new(config: WeatherConfig) -> Self {
        Self { config }
    }

    /// Merge overlapping weather sources into one hourly series.
    ///
    /// `sources` must be in precedence order: for a timestamp present in several
    /// sources, the observation from the earliest source is kept.
    pub fn consolidate(
        &self,
        sources: Vec<Vec<WeatherObservation>>,
    ) -> Result<(Vec<WeatherObservation>, GapReport)> {
        let combined = concat_sources(sources);
        let input_rows = combined.len();

        let (unique, duplicates_dropped) = dedup_keep_first(combined);
        info!(
            "Weather: {} rows in, {} duplicate timestamps dropped",
            input_rows, duplicates_dropped
        );

        let (series, gaps_filled, gaps_left) = fill_gaps(unique, self.config.gap_policy)?;
        for ts in &gaps_filled {
            info!("Weather: synthesized missing hour {}", ts);
        }

        if let Some(year) = self.config.coverage_year {
            check_coverage(&series, year)?;
        }

        Ok((
            series,
            GapReport {
                input_rows,
                duplicates_dropped,
                gaps_filled,
                gaps_left,
            },
        ))
    }
}

pub fn concat_sources(sources: Vec<Vec<WeatherObservation>>) -> Vec<WeatherObservation> {
    sources.into_iter().flatten().collect()
}

/// Stable sort by timestamp, then drop repeated timestamps keeping the first one seen.
pub fn dedup_keep_first(mut observations: Vec<WeatherObservation>) -> (Vec<WeatherObservation>, usize) {
    observations.sort_by_key(|o| o.timestamp);
    let before = observations.len();
    observations.dedup_by_key(|o| o.timestamp);
    let dropped = before - observations.len();
    (observations, dropped)
}

/// Scan successive deltas and patch gaps according to `policy`.
///
/// A two-hour delta is always the spring-forward hour and is filled with the
/// mean of its neighbours. Returns the patched series, the synthesized
/// timestamps and the start of every gap left in place.
pub fn fill_gaps(
    observations: Vec<WeatherObservation>,
    policy: GapPolicy,
) -> Result<(Vec<WeatherObservation>, Vec<NaiveDateTime>, Vec<NaiveDateTime>)> {
    let mut synthesized = Vec::new();
    let mut left = Vec::new();

    for pair in observations.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let delta = next.timestamp - prev.timestamp;

        if delta == Duration::hours(1) {
            continue;
        }
        if delta == Duration::hours(2) {
            synthesized.push(between(prev, next, 1, 2));
            continue;
        }

        match policy {
            GapPolicy::Fail => {
                return Err(PipelineError::UnexpectedGap {
                    after: prev.timestamp,
                    delta_minutes: delta.num_minutes(),
                });
            }
            GapPolicy::Warn => {
                warn!(
                    "Weather: unusual gap of {} minutes after {}, left unfilled",
                    delta.num_minutes(),
                    prev.timestamp
                );
                left.push(prev.timestamp);
            }
            GapPolicy::Interpolate => {
                if delta <= Duration::zero() || delta != Duration::hours(delta.num_hours()) {
                    return Err(PipelineError::UnexpectedGap {
                        after: prev.timestamp,
                        delta_minutes: delta.num_minutes(),
                    });
                }
                let steps = delta.num_hours();
                warn!(
                    "Weather: interpolating {} missing hours after {}",
                    steps - 1,
                    prev.timestamp
                );
                for step in 1..steps {
                    synthesized.push(between(prev, next, step, steps));
                }
            }
        }
    }

    let filled: Vec<NaiveDateTime> = synthesized.iter().map(|o| o.timestamp).collect();
    let mut series = observations;
    series.extend(synthesized);
    series.sort_by_key(|o| o.timestamp);

    Ok((series, filled, left))
}

/// Observation `step` hours after `prev`, linearly placed between `prev` and `next`
/// which are `steps` hours apart. A measure missing on either side stays missing.
fn between(
    prev: &WeatherObservation,
    next: &WeatherObservation,
    step: i64,
    steps: i64,
) -> WeatherObservation {
    let fraction = step as f64 / steps as f64;
    let (a, b) = (prev.measures(), next.measures());
    let mut measures = [None; 5];
    for (i, slot) in measures.iter_mut().enumerate() {
        *slot = match (a[i], b[i]) {
            (Some(x), Some(y)) => Some(x + (y - x) * fraction),
            _ => None,
        };
    }
    WeatherObservation::from_measures(prev.timestamp + Duration::hours(step), measures)
}

/// Require one on-the-hour observation for every hour of `year`.
pub fn check_coverage(observations: &[WeatherObservation], year: i32) -> Result<()> {
    let expected = hours_in_year(year);
    let actual = observations
        .iter()
        .filter(|o| in_year(&o.timestamp, year))
        .filter(|o| o.timestamp.minute() == 0 && o.timestamp.second() == 0)
        .count();

    if actual != expected {
        return Err(PipelineError::IncompleteCoverage {
            year,
            expected,
            actual,
        });
    }
    Ok(())
}
