use chrono::{DateTime, FixedOffset};
use std::time::Duration;

/// A matched line that was left out of the row set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: String,
}

/// Counters for one collection run
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    /// Total input lines, including blank and unparseable ones
    pub lines_seen: usize,
    /// Lines that matched the grammar
    pub lines_matched: usize,
    /// Lines that did not match the grammar
    pub lines_dropped: usize,
    /// Matched lines discarded because of their timestamp (skip strategy only)
    pub timestamp_errors: Vec<SkippedLine>,
    pub rows_output: usize,
    pub processing_time: Duration,
    pub earliest_timestamp: Option<DateTime<FixedOffset>>,
    pub latest_timestamp: Option<DateTime<FixedOffset>>,
}

impl ProcessingStats {
    pub fn update_timestamp_range(&mut self, timestamp: DateTime<FixedOffset>) {
        match self.earliest_timestamp {
            Some(earliest) if earliest <= timestamp => {}
            _ => self.earliest_timestamp = Some(timestamp),
        }
        match self.latest_timestamp {
            Some(latest) if latest >= timestamp => {}
            _ => self.latest_timestamp = Some(timestamp),
        }
    }

    /// Share of input lines that failed the grammar, in percent
    pub fn drop_rate(&self) -> f64 {
        if self.lines_seen == 0 {
            0.0
        } else {
            self.lines_dropped as f64 * 100.0 / self.lines_seen as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_range() {
        let mut stats = ProcessingStats::default();
        let a = DateTime::parse_from_rfc3339("2023-10-10T13:00:00+00:00").unwrap();
        let b = DateTime::parse_from_rfc3339("2023-10-10T12:00:00+00:00").unwrap();
        let c = DateTime::parse_from_rfc3339("2023-10-10T15:00:00+02:00").unwrap();
        stats.update_timestamp_range(a);
        stats.update_timestamp_range(b);
        stats.update_timestamp_range(c);
        assert_eq!(stats.earliest_timestamp, Some(b));
        assert_eq!(stats.latest_timestamp, Some(a));
    }

    #[test]
    fn test_drop_rate() {
        let mut stats = ProcessingStats::default();
        assert_eq!(stats.drop_rate(), 0.0);
        stats.lines_seen = 4;
        stats.lines_dropped = 1;
        assert_eq!(stats.drop_rate(), 25.0);
    }
}
