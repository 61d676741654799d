#[macro_use]
extern crate log;

use std::env::consts::{ARCH, FAMILY, OS};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Error;
use clap::Parser;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use crate::config::DEFAULT_CONFIG_NAME;
use crate::program::{Overrides, Program};

mod config;
mod crawler;
mod program;

/// File every log level is written to.
const LOG_FILE_NAME: &str = "rice_grabber.log";

#[derive(Parser)]
#[command(
    name = "rice_grabber",
    version,
    about = "Incrementally downloads tagged screenshots from a post listing"
)]
struct Cli {
    /// Path to the TOML config file (created with defaults if missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_NAME)]
    config: PathBuf,
    /// Listing URL to start from instead of the configured one
    #[arg(long)]
    start_url: Option<String>,
    /// Maximum number of pages to fetch this run
    #[arg(short = 'n', long)]
    max_pages: Option<u32>,
}

/// Lines written to the log file between forced flushes.
const LOG_FLUSH_LINES: usize = 50;

/// Buffered log file sink. Flushes every [`LOG_FLUSH_LINES`] lines and on drop.
///
/// `WriteLogger` serializes access to its writer, so no lock is needed here.
struct BufferedFileWriter {
    writer: BufWriter<File>,
    unflushed_lines: usize,
}

impl BufferedFileWriter {
    fn open(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::with_capacity(64 * 1024, file),
            unflushed_lines: 0,
        })
    }
}

impl Write for BufferedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = self.writer.write(buf)?;

        self.unflushed_lines += buf[..size].iter().filter(|&&b| b == b'\n').count();
        if self.unflushed_lines >= LOG_FLUSH_LINES {
            self.flush()?;
        }

        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.unflushed_lines = 0;
        self.writer.flush()
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    initialize_logger();
    log_system_information();

    let overrides = Overrides {
        start_url: cli.start_url,
        max_pages: cli.max_pages,
    };
    let program = Program::new(cli.config, overrides);
    let result = program.run().await;
    log::logger().flush();
    result
}

/// Initializes the terminal logger and the full-verbosity file logger.
fn initialize_logger() {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str("rice_grabber");

    let buffered_file_writer = match BufferedFileWriter::open(LOG_FILE_NAME) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Failed to open {}: {}. Logging will only output to terminal.", LOG_FILE_NAME, e);
            let _ = TermLogger::init(
                LevelFilter::Info,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::max(), config.build(), buffered_file_writer),
    ]) {
        eprintln!("Failed to initialize combined logger: {}. Falling back to terminal-only logging.", e);
        let _ = TermLogger::init(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

/// Logs information about the system being used.
fn log_system_information() {
    trace!("ARCH:   \"{}\"", ARCH);
    trace!("FAMILY: \"{}\"", FAMILY);
    trace!("OS:     \"{}\"", OS);
}
