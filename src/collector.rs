use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use crate::config::{AnalysisConfig, ErrorStrategy};
use crate::error::ProcessingError;
use crate::parser::AccessLogParser;
use crate::record::{AccessRecord, ParsedFields};
use crate::stats::{ProcessingStats, SkippedLine};

/// Ordered, fully coerced rows from one run plus the counters behind them
#[derive(Debug, Default, Clone)]
pub struct RowSet {
    rows: Vec<AccessRecord>,
    stats: ProcessingStats,
}

impl RowSet {
    pub fn new(rows: Vec<AccessRecord>, stats: ProcessingStats) -> Self {
        RowSet { rows, stats }
    }

    pub fn rows(&self) -> &[AccessRecord] {
        &self.rows
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccessRecord> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<AccessRecord> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a AccessRecord;
    type IntoIter = std::slice::Iter<'a, AccessRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Drives the line parser over an input and builds the row set.
///
/// Collection happens in two passes: every line is matched first, then the
/// matched fields are coerced. A timestamp that does not fit the layout
/// aborts the run unless the config asks to skip it.
pub struct RecordCollector {
    parser: AccessLogParser,
    timestamp_errors: ErrorStrategy,
    buffer_size: usize,
}

impl RecordCollector {
    pub fn new(config: &AnalysisConfig) -> Self {
        RecordCollector {
            parser: AccessLogParser::new(),
            timestamp_errors: config.timestamp_errors,
            buffer_size: config.buffer_size,
        }
    }

    pub fn collect_file(&self, path: &Path) -> Result<RowSet, ProcessingError> {
        let file = File::open(path)?;
        self.collect(BufReader::with_capacity(self.buffer_size, file))
    }

    pub fn collect<R: BufRead>(&self, reader: R) -> Result<RowSet, ProcessingError> {
        let start_time = Instant::now();
        let mut stats = ProcessingStats::default();

        let matched = self.match_lines(reader, &mut stats)?;
        let rows = self.coerce(matched, &mut stats)?;

        stats.rows_output = rows.len();
        stats.processing_time = start_time.elapsed();

        if stats.lines_dropped > 0 {
            tracing::warn!(
                dropped = stats.lines_dropped,
                seen = stats.lines_seen,
                "{} of {} lines did not match the access log format",
                stats.lines_dropped,
                stats.lines_seen
            );
        }
        tracing::info!(
            rows = stats.rows_output,
            elapsed = %humantime::format_duration(stats.processing_time),
            "collected row set"
        );

        Ok(RowSet::new(rows, stats))
    }

    fn match_lines<R: BufRead>(
        &self,
        reader: R,
        stats: &mut ProcessingStats,
    ) -> Result<Vec<(usize, ParsedFields)>, ProcessingError> {
        let mut matched = Vec::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line_number = index + 1;
            stats.lines_seen += 1;

            match self.parser.parse_line(&line) {
                Some(fields) => {
                    stats.lines_matched += 1;
                    matched.push((line_number, fields));
                }
                None => {
                    stats.lines_dropped += 1;
                    tracing::debug!(line_number, "line does not match, dropping");
                }
            }
        }

        Ok(matched)
    }

    fn coerce(
        &self,
        matched: Vec<(usize, ParsedFields)>,
        stats: &mut ProcessingStats,
    ) -> Result<Vec<AccessRecord>, ProcessingError> {
        let mut rows = Vec::with_capacity(matched.len());

        for (line_number, fields) in matched {
            let value = fields.timestamp.clone();
            match AccessRecord::from_fields(fields) {
                Ok(record) => {
                    stats.update_timestamp_range(record.timestamp);
                    rows.push(record);
                }
                Err(source) => match self.timestamp_errors {
                    ErrorStrategy::FailFast => {
                        return Err(ProcessingError::TimestampError {
                            line: line_number,
                            value,
                            source,
                        });
                    }
                    ErrorStrategy::Skip => {
                        tracing::warn!(line_number, timestamp = %value, "skipping line with invalid timestamp");
                        stats.timestamp_errors.push(SkippedLine {
                            line_number,
                            reason: format!("invalid timestamp '{}': {}", value, source),
                        });
                    }
                },
            }
        }

        Ok(rows)
    }
}
