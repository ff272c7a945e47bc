use crate::error::{PipelineError, Result};
use crate::models::{ImputedReading, Reading};
use chrono::NaiveDateTime;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

type TimeSeries = Vec<(NaiveDateTime, Option<f64>)>;

/// Fill gaps in every household series independently.
///
/// Interior gaps are interpolated linearly in time between the surrounding
/// known readings. Leading and trailing gaps are then forward-filled and
/// back-filled. A household with no known reading at all cannot be filled and
/// fails the whole run with [`PipelineError::ResidualNulls`].
pub fn impute(readings: Vec<Reading>) -> Result<Vec<ImputedReading>> {
    impute_with_progress(readings, || {})
}

/// Same as [`impute`], calling `on_series` once per finished household.
pub fn impute_with_progress<F>(readings: Vec<Reading>, on_series: F) -> Result<Vec<ImputedReading>>
where
    F: Fn() + Sync,
{
    let groups = group_by_household(readings);
    info!("Imputing {} household series", groups.len());

    let filled: Vec<(Arc<str>, TimeSeries)> = groups
        .into_par_iter()
        .map(|(id, mut series)| {
            series.sort_by_key(|(ts, _)| *ts);
            interpolate_time(&mut series);
            fill_edges(&mut series);
            on_series();
            (id, series)
        })
        .collect();

    let mut residual = 0;
    let mut households = Vec::new();
    for (id, series) in &filled {
        let nulls = series.iter().filter(|(_, v)| v.is_none()).count();
        if nulls > 0 {
            residual += nulls;
            households.push(id.to_string());
        }
    }
    if residual > 0 {
        return Err(PipelineError::ResidualNulls {
            count: residual,
            households,
        });
    }

    let imputed: Vec<ImputedReading> = filled
        .into_iter()
        .flat_map(|(id, series)| {
            series.into_iter().filter_map(move |(timestamp, value)| {
                value.map(|value| ImputedReading {
                    timestamp,
                    household_id: Arc::clone(&id),
                    value,
                })
            })
        })
        .collect();

    debug!("Imputation produced {} readings", imputed.len());
    Ok(imputed)
}

fn group_by_household(readings: Vec<Reading>) -> Vec<(Arc<str>, TimeSeries)> {
    let mut index: HashMap<Arc<str>, usize> = HashMap::new();
    let mut groups: Vec<(Arc<str>, TimeSeries)> = Vec::new();

    for reading in readings {
        let slot = *index.entry(Arc::clone(&reading.household_id)).or_insert_with(|| {
            groups.push((Arc::clone(&reading.household_id), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((reading.timestamp, reading.value));
    }

    groups
}

/// Linear interpolation weighted by elapsed time, between known neighbours only.
pub fn interpolate_time(series: &mut [(NaiveDateTime, Option<f64>)]) {
    let mut previous: Option<usize> = None;

    for idx in 0..series.len() {
        let Some(right) = series[idx].1 else {
            continue;
        };
        if let Some(left_idx) = previous {
            if idx > left_idx + 1 {
                let (t0, left) = (series[left_idx].0, series[left_idx].1.unwrap_or(right));
                let span = (series[idx].0 - t0).num_milliseconds() as f64;
                for gap in left_idx + 1..idx {
                    let elapsed = (series[gap].0 - t0).num_milliseconds() as f64;
                    let weight = if span > 0.0 { elapsed / span } else { 0.0 };
                    series[gap].1 = Some(left + (right - left) * weight);
                }
            }
        }
        previous = Some(idx);
    }
}

/// Forward-fill then back-fill whatever interpolation could not reach.
pub fn fill_edges(series: &mut [(NaiveDateTime, Option<f64>)]) {
    let mut last = None;
    for point in series.iter_mut() {
        match point.1 {
            Some(v) => last = Some(v),
            None => point.1 = last,
        }
    }

    let mut next = None;
    for point in series.iter_mut().rev() {
        match point.1 {
            Some(v) => next = Some(v),
            None => point.1 = next,
        }
    }
}
