use serde::Deserialize;
use std::io::Write;

use crate::collector::RowSet;
use crate::error::{ConfigError, ProcessingError};
use crate::record::{AccessRecord, COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[value(name = "csv", help = "Comma-separated values with a header row")]
    Csv,
    #[value(name = "tsv", help = "Tab-separated values with a header row")]
    Tsv,
    #[value(name = "jsonl", help = "JSON Lines format (one JSON object per row)")]
    Jsonl,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "jsonl" => Ok(OutputFormat::Jsonl),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Downstream consumer of the row set, fed one row at a time in order
pub trait RowSink {
    fn write_row(&mut self, record: &AccessRecord) -> Result<(), ProcessingError>;

    /// Flush buffered output. Called once after the last row.
    fn finish(&mut self) -> Result<(), ProcessingError>;

    fn write_rows(&mut self, rows: &RowSet) -> Result<usize, ProcessingError> {
        let mut written = 0;
        for record in rows {
            self.write_row(record)?;
            written += 1;
        }
        self.finish()?;
        Ok(written)
    }
}

enum Target<W: Write> {
    Delimited(csv::Writer<W>),
    Lines(W),
}

/// Writes rows as CSV, TSV or JSON Lines, restricted to a column list
pub struct OutputFormatter<W: Write> {
    format: OutputFormat,
    columns: Vec<String>,
    target: Target<W>,
    headers_written: bool,
}

impl<W: Write> OutputFormatter<W> {
    pub fn new(format: OutputFormat, output: W) -> Self {
        let columns = COLUMNS.iter().map(|c| c.to_string()).collect();
        Self::with_columns(format, output, columns)
    }

    /// Columns must be names from [`COLUMNS`]; see [`check_columns`]
    pub fn with_columns(format: OutputFormat, output: W, columns: Vec<String>) -> Self {
        let target = match format {
            OutputFormat::Csv => Target::Delimited(
                csv::WriterBuilder::new()
                    .delimiter(b',')
                    .has_headers(false)
                    .from_writer(output),
            ),
            OutputFormat::Tsv => Target::Delimited(
                csv::WriterBuilder::new()
                    .delimiter(b'\t')
                    .has_headers(false)
                    .from_writer(output),
            ),
            OutputFormat::Jsonl => Target::Lines(output),
        };

        OutputFormatter {
            format,
            columns,
            target,
            headers_written: false,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn write_headers(&mut self) -> Result<(), ProcessingError> {
        if self.headers_written {
            return Ok(());
        }
        if let Target::Delimited(writer) = &mut self.target {
            writer.write_record(&self.columns)?;
        }
        self.headers_written = true;
        Ok(())
    }

    fn cells(&self, record: &AccessRecord) -> Result<Vec<String>, ProcessingError> {
        self.columns
            .iter()
            .map(|column| {
                record
                    .column_text(column)
                    .ok_or_else(|| ProcessingError::OutputError(format!("Unknown column '{}'", column)))
            })
            .collect()
    }

    fn json_object(&self, record: &AccessRecord) -> Result<serde_json::Value, ProcessingError> {
        let mut obj = serde_json::Map::new();
        for column in &self.columns {
            let value = record.column_value(column).ok_or_else(|| {
                ProcessingError::OutputError(format!("Unknown column '{}'", column))
            })?;
            obj.insert(column.clone(), value);
        }
        Ok(serde_json::Value::Object(obj))
    }
}

impl<W: Write> RowSink for OutputFormatter<W> {
    fn write_row(&mut self, record: &AccessRecord) -> Result<(), ProcessingError> {
        self.write_headers()?;

        match self.format {
            OutputFormat::Csv | OutputFormat::Tsv => {
                let cells = self.cells(record)?;
                if let Target::Delimited(writer) = &mut self.target {
                    writer.write_record(&cells)?;
                }
            }
            OutputFormat::Jsonl => {
                let json_line = serde_json::to_string(&self.json_object(record)?)?;
                if let Target::Lines(output) = &mut self.target {
                    writeln!(output, "{}", json_line)?;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProcessingError> {
        // Header-only output for an empty row set
        self.write_headers()?;
        match &mut self.target {
            Target::Delimited(writer) => writer.flush()?,
            Target::Lines(output) => output.flush()?,
        }
        Ok(())
    }
}

/// Validate a user-supplied column list against the row schema
pub fn check_columns(columns: &[String]) -> Result<(), ConfigError> {
    for column in columns {
        if !COLUMNS.contains(&column.as_str()) {
            return Err(ConfigError::UnknownColumn(column.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert!("logfmt".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_check_columns() {
        assert!(check_columns(&["url".to_string(), "size".to_string()]).is_ok());
        assert!(check_columns(&["path".to_string()]).is_err());
    }

    #[test]
    fn test_empty_csv_has_header() {
        let mut output = Vec::new();
        {
            let mut formatter = OutputFormatter::new(OutputFormat::Csv, &mut output);
            formatter.write_rows(&RowSet::default()).unwrap();
        }
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "ip,timestamp,method,url,status,size,query_parameters\n"
        );
    }

    #[test]
    fn test_empty_jsonl_is_empty() {
        let mut output = Vec::new();
        {
            let mut formatter = OutputFormatter::new(OutputFormat::Jsonl, &mut output);
            formatter.write_rows(&RowSet::default()).unwrap();
        }
        assert!(output.is_empty());
    }
}
