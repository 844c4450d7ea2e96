use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use logtab::{
    describe, write_stats_csv, AnalysisConfig, ErrorStrategy, OutputFormat, OutputFormatter,
    RecordCollector, RowSet, RowSink, Summary,
};

#[derive(Parser)]
#[command(name = "logtab")]
#[command(about = "Turn web-server access logs into typed tables and summary statistics")]
#[command(version)]
struct Args {
    /// Input log file (default: stdin)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Input log file, alternative to the positional argument
    #[arg(short = 'i', long = "input", conflicts_with = "file")]
    input_file: Option<PathBuf>,

    /// Table output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// Table output format
    #[arg(short = 'F', long = "format", value_enum)]
    format: Option<OutputFormat>,

    /// Comma-separated columns to export, in order
    #[arg(short = 'k', long = "keys", value_delimiter = ',')]
    keys: Option<Vec<String>>,

    /// Write aggregate series as JSON to this file
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,

    /// Write descriptive statistics as CSV to this file
    #[arg(long, value_name = "PATH")]
    stats: Option<PathBuf>,

    /// Number of URLs in the top-URL list of the summary
    #[arg(long, value_name = "N")]
    top_urls: Option<usize>,

    /// Drop lines with an unparseable timestamp instead of failing
    #[arg(long)]
    skip_bad_timestamps: bool,

    /// YAML config file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug mode - log processing details to stderr
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn input_path(&self) -> Option<&PathBuf> {
        self.file.as_ref().or(self.input_file.as_ref())
    }

    /// Config file values with command-line overrides applied
    fn resolve_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(keys) = &self.keys {
            config.keys = Some(keys.iter().map(|k| k.trim().to_string()).collect());
        }
        if let Some(top_urls) = self.top_urls {
            config.top_urls = top_urls;
        }
        if self.skip_bad_timestamps {
            config.timestamp_errors = ErrorStrategy::Skip;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    match run(&args) {
        Ok(rows) if rows == 0 => std::process::exit(2),
        Ok(_) => {}
        Err(e) => {
            eprintln!("logtab: error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns the number of rows in the row set
fn run(args: &Args) -> anyhow::Result<usize> {
    let config = args.resolve_config()?;
    let collector = RecordCollector::new(&config);

    let row_set = match args.input_path() {
        Some(path) => collector
            .collect_file(path)
            .with_context(|| format!("Failed to process '{}'", path.display()))?,
        None => collector
            .collect(BufReader::with_capacity(config.buffer_size, io::stdin().lock()))
            .context("Failed to process stdin")?,
    };

    write_table(args, &config, &row_set)?;

    if let Some(path) = &args.summary {
        let mut file = create(path)?;
        Summary::from_rows(&row_set, &config).write_json(&mut file)?;
        file.flush()?;
    }

    if let Some(path) = &args.stats {
        write_stats_csv(&describe(&row_set), create(path)?)?;
    }

    if args.debug {
        report_stats(&row_set);
    }

    Ok(row_set.len())
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
    Ok(BufWriter::with_capacity(65536, file))
}

fn write_table(args: &Args, config: &AnalysisConfig, row_set: &RowSet) -> anyhow::Result<()> {
    let output: Box<dyn Write> = match &args.output_file {
        Some(path) => Box::new(create(path)?),
        None => Box::new(BufWriter::with_capacity(config.buffer_size, io::stdout())),
    };

    let mut formatter =
        OutputFormatter::with_columns(config.output_format, output, config.columns());
    formatter.write_rows(row_set)?;
    Ok(())
}

fn report_stats(row_set: &RowSet) {
    let stats = row_set.stats();
    eprintln!("Final statistics:");
    eprintln!("  Lines seen: {}", stats.lines_seen);
    eprintln!("  Lines matched: {}", stats.lines_matched);
    eprintln!(
        "  Lines dropped: {} ({:.1}%)",
        stats.lines_dropped,
        stats.drop_rate()
    );
    eprintln!("  Bad timestamps skipped: {}", stats.timestamp_errors.len());
    eprintln!("  Rows output: {}", stats.rows_output);
    if let (Some(earliest), Some(latest)) = (stats.earliest_timestamp, stats.latest_timestamp) {
        eprintln!("  Time range: {} .. {}", earliest.to_rfc3339(), latest.to_rfc3339());
    }
    eprintln!(
        "  Processing time: {}",
        humantime::format_duration(stats.processing_time)
    );
}
