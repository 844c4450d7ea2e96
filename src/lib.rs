// src/lib.rs
pub mod collector;
pub mod config;
pub mod error;
pub mod output_format;
pub mod parser;
pub mod record;
pub mod stats;
pub mod summary;

pub use error::*;

pub use collector::{RecordCollector, RowSet};
pub use config::{AnalysisConfig, ErrorStrategy};
pub use output_format::{OutputFormat, OutputFormatter, RowSink};
pub use parser::AccessLogParser;
pub use record::{AccessRecord, ClientAddress, ParsedFields, ResponseSize, COLUMNS};
pub use stats::{ProcessingStats, SkippedLine};
pub use summary::{describe, write_stats_csv, ColumnStats, Summary};
