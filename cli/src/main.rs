//! takeoff CLI - PDF page extraction with a content-addressed cache

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use colored::Colorize;
use env_logger::{Target, WriteStyle};
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, Log, Metadata, Record};

use takeoff::cache::{record_for, DEFAULT_CACHE_DIR};
use takeoff::parser::DEFAULT_DPI;
use takeoff::{Processed, Takeoff};

#[derive(Parser, Debug)]
#[command(name = "takeoff")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract PDF pages into a content-addressed cache", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Increase console verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Append debug-level logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, value_name = "DIR", env = "TAKEOFF_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Page render resolution in dots per inch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_DPI)]
    dpi: f32,

    /// Page worker threads (0 = one per core)
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    jobs: usize,

    /// Re-extract even if the document is cached
    #[arg(long)]
    refresh: bool,

    /// Neither read nor write the cache
    #[arg(long, conflicts_with = "refresh")]
    no_cache: bool,

    /// Directory containing the Pdfium library
    #[arg(long, value_name = "DIR", env = "PDFIUM_LIB_DIR")]
    pdfium_lib: Option<PathBuf>,

    /// Print the extracted document as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref());

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut takeoff = Takeoff::new()
        .with_cache_dir(&cli.cache_dir)
        .with_dpi(cli.dpi)
        .with_max_workers(cli.jobs);
    if cli.refresh {
        takeoff = takeoff.refresh();
    }
    if cli.no_cache {
        takeoff = takeoff.no_cache();
    }
    if let Some(dir) = &cli.pdfium_lib {
        takeoff = takeoff.with_pdfium_library(dir);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Processing {}...", cli.input.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = takeoff.process(&cli.input);
    pb.finish_and_clear();
    let processed = result?;

    if cli.json {
        println!("{}", to_json(&processed)?);
    } else {
        print_summary(&processed);
    }
    Ok(())
}

fn print_summary(processed: &Processed) {
    let doc = &processed.document;
    let cache = if processed.is_cache_hit() {
        "hit".green()
    } else {
        "miss".yellow()
    };

    println!("{}", "Document".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Source".bold(), doc.source_name);
    println!("{}: {}", "Digest".bold(), doc.content_digest);
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!("{}: {}", "Cache".bold(), cache);
    println!("{}: {}", "Text spans".bold(), doc.text_block_count());
}

/// The document in the same record shape the cache writes to `record.json`.
fn to_json(processed: &Processed) -> Result<String, Box<dyn std::error::Error>> {
    log::info!(
        "{} ({})",
        processed.document.source_name,
        processed.origin.as_str()
    );
    let record = record_for(&processed.document)?;
    Ok(serde_json::to_string_pretty(&record)?)
}

fn console_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Console logger plus an optional debug-level file logger.
struct TeeLogger {
    console: env_logger::Logger,
    file: Option<env_logger::Logger>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.file.as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        self.console.log(record);
        if let Some(file) = &self.file {
            file.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) {
    let console = env_logger::Builder::new()
        .filter_level(console_level(verbose))
        .parse_default_env()
        .build();

    let mut file_error = None;
    let file = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            env_logger::Builder::new()
                .filter_level(LevelFilter::Debug)
                .format_timestamp_millis()
                .write_style(WriteStyle::Never)
                .target(Target::Pipe(Box::new(file)))
                .build(),
        ),
        Err(e) => {
            file_error = Some((path.to_path_buf(), e));
            None
        }
    });

    let max_level = file
        .as_ref()
        .map_or(console.filter(), |f| f.filter().max(console.filter()));

    if log::set_boxed_logger(Box::new(TeeLogger { console, file })).is_ok() {
        log::set_max_level(max_level);
    }

    if let Some((path, e)) = file_error {
        log::warn!(
            "Cannot open log file {}: {}; logging to console only",
            path.display(),
            e
        );
    }
}
