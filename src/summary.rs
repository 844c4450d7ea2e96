//! Aggregates over a finished row set.
//!
//! [`Summary`] holds the count/mean series a report would chart: requests per
//! method, status, hour and day, the busiest URLs, the response-size
//! distribution and the mean size per method. [`describe`] computes the
//! descriptive statistics table for the numeric columns.

use chrono::Timelike;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::collector::RowSet;
use crate::config::AnalysisConfig;
use crate::error::ProcessingError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCount {
    pub url: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodAverage {
    pub method: String,
    pub average_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_requests: usize,
    /// First-appearance order
    pub requests_per_method: IndexMap<String, usize>,
    pub response_size_histogram: Vec<HistogramBin>,
    /// First-appearance order
    pub requests_per_status: IndexMap<u16, usize>,
    /// Hour of day in each record's own offset
    pub requests_per_hour: BTreeMap<u32, usize>,
    /// `YYYY-MM-DD` in each record's own offset
    pub requests_per_day: BTreeMap<String, usize>,
    pub top_urls: Vec<UrlCount>,
    pub average_size_per_method: Vec<MethodAverage>,
}

impl Summary {
    pub fn from_rows(rows: &RowSet, config: &AnalysisConfig) -> Self {
        let mut requests_per_method: IndexMap<String, usize> = IndexMap::new();
        let mut requests_per_status: IndexMap<u16, usize> = IndexMap::new();
        let mut requests_per_hour = BTreeMap::new();
        let mut requests_per_day = BTreeMap::new();
        let mut url_counts: IndexMap<&str, usize> = IndexMap::new();
        let mut size_per_method: IndexMap<&str, (f64, usize)> = IndexMap::new();

        for record in rows {
            *requests_per_method.entry(record.method.clone()).or_insert(0) += 1;
            *requests_per_status.entry(record.status).or_insert(0) += 1;
            *requests_per_hour.entry(record.timestamp.hour()).or_insert(0) += 1;
            *requests_per_day
                .entry(record.timestamp.date_naive().format("%Y-%m-%d").to_string())
                .or_insert(0) += 1;
            *url_counts.entry(record.url.as_str()).or_insert(0) += 1;

            let (total, count) = size_per_method
                .entry(record.method.as_str())
                .or_insert((0.0, 0));
            *total += record.size;
            *count += 1;
        }

        let mut top_urls: Vec<UrlCount> = url_counts
            .into_iter()
            .map(|(url, count)| UrlCount {
                url: url.to_string(),
                count,
            })
            .collect();
        // Stable sort keeps first appearance ahead on ties
        top_urls.sort_by(|a, b| b.count.cmp(&a.count));
        top_urls.truncate(config.top_urls);

        let mut average_size_per_method: Vec<MethodAverage> = size_per_method
            .into_iter()
            .map(|(method, (total, count))| MethodAverage {
                method: method.to_string(),
                average_size: total / count as f64,
            })
            .collect();
        average_size_per_method.sort_by(|a, b| b.average_size.total_cmp(&a.average_size));

        let sizes: Vec<f64> = rows.iter().map(|r| r.size).collect();

        Summary {
            total_requests: rows.len(),
            requests_per_method,
            response_size_histogram: histogram(&sizes, config.histogram_bins),
            requests_per_status,
            requests_per_hour,
            requests_per_day,
            top_urls,
            average_size_per_method,
        }
    }

    pub fn write_json<W: Write>(&self, output: &mut W) -> Result<(), ProcessingError> {
        serde_json::to_writer_pretty(&mut *output, self)?;
        writeln!(output)?;
        Ok(())
    }
}

/// Equal-width bins over `[min, max]`, the last bin closed on the right.
/// A single distinct value gets the range `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &value in values {
        let index = (((value - lo) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + width * i as f64,
            end: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation, undefined below two values
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return ColumnStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let variance =
                sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(variance.sqrt())
        } else {
            None
        };

        ColumnStats {
            count,
            mean: Some(mean),
            std,
            min: sorted.first().copied(),
            q25: Some(quantile(&sorted, 0.25)),
            q50: Some(quantile(&sorted, 0.50)),
            q75: Some(quantile(&sorted, 0.75)),
            max: sorted.last().copied(),
        }
    }

    fn cells(&self) -> [(&'static str, String); 8] {
        let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        [
            ("count", self.count.to_string()),
            ("mean", fmt(self.mean)),
            ("std", fmt(self.std)),
            ("min", fmt(self.min)),
            ("25%", fmt(self.q25)),
            ("50%", fmt(self.q50)),
            ("75%", fmt(self.q75)),
            ("max", fmt(self.max)),
        ]
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Descriptive statistics for the numeric columns, `status` then `size`
pub fn describe(rows: &RowSet) -> Vec<(&'static str, ColumnStats)> {
    let statuses: Vec<f64> = rows.iter().map(|r| f64::from(r.status)).collect();
    let sizes: Vec<f64> = rows.iter().map(|r| r.size).collect();
    vec![
        ("status", ColumnStats::from_values(&statuses)),
        ("size", ColumnStats::from_values(&sizes)),
    ]
}

/// Write the statistics table: one row per statistic, one column per field
pub fn write_stats_csv<W: Write>(
    stats: &[(&'static str, ColumnStats)],
    output: W,
) -> Result<(), ProcessingError> {
    let mut writer = csv::Writer::from_writer(output);

    let mut header = vec![String::new()];
    header.extend(stats.iter().map(|(name, _)| name.to_string()));
    writer.write_record(&header)?;

    let columns: Vec<[(&'static str, String); 8]> =
        stats.iter().map(|(_, column)| column.cells()).collect();
    for row in 0..8 {
        let label = columns
            .first()
            .map(|cells| cells[row].0)
            .unwrap_or_default();
        let mut record = vec![label.to_string()];
        record.extend(columns.iter().map(|cells| cells[row].1.clone()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
