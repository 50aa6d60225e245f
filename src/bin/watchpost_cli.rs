use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;

use watchpost::config::Config;
use watchpost::geolocation::{DatabaseResolver, GeoResolver};
use watchpost::input::{AccessLogParser, AuthLogParser};
use watchpost::output::{OutputFormat, OutputHandler};

/// Offline helpers for the watchpost dashboard
#[derive(StructOpt, Debug)]
#[structopt(name = "watchpost", about = "SSH + OpenProject monitor CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "watchpost.toml")]
        output: PathBuf,
    },
    /// Parse a saved log file and print the recognised events
    Parse {
        /// Path to log file
        #[structopt(short, long)]
        file: PathBuf,
        /// Log kind: ssh (journal/auth.log) or openproject (container log)
        #[structopt(short, long, default_value = "ssh")]
        kind: LogKind,
        /// Output format: json, jsonl or console
        #[structopt(long, default_value = "console")]
        format: OutputFormat,
        /// Maximum number of events to print
        #[structopt(short, long, default_value = "10")]
        lines: usize,
    },
    /// Resolve one address against the GeoIP database
    Geo {
        ip: String,
        /// Path to the GeoLite2-City database
        #[structopt(long, default_value = "/opt/ssh-monitor/GeoLite2-City.mmdb")]
        db: PathBuf,
        #[structopt(long, default_value = "console")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum LogKind {
    Ssh,
    OpenProject,
}

impl std::str::FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ssh" => Ok(LogKind::Ssh),
            "openproject" | "op" => Ok(LogKind::OpenProject),
            other => Err(format!("unknown log kind: {}", other)),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Parse {
            file,
            kind,
            format,
            lines,
        } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }
            let text = fs::read_to_string(&file)?;
            let mut output = OutputHandler::new(format, None)?;

            let total = match kind {
                LogKind::Ssh => {
                    let parser = AuthLogParser::new()?;
                    let events: Vec<_> = parser.parse(&text).collect();
                    for event in events.iter().take(lines) {
                        output.write_record(event)?;
                    }
                    events.len()
                }
                LogKind::OpenProject => {
                    let parser = AccessLogParser::new()?;
                    let events: Vec<_> = parser.parse(&text).collect();
                    for event in events.iter().take(lines) {
                        output.write_record(event)?;
                    }
                    events.len()
                }
            };
            output.flush()?;
            eprintln!("Parsed {} event(s) (showing {})", total, total.min(lines));
        }
        Cli::Geo { ip, db, format } => {
            let resolver = DatabaseResolver::open(&db);
            let record = resolver.resolve(&ip);
            let mut output = OutputHandler::new(format, None)?;
            output.write_record(&record)?;
        }
    }

    Ok(())
}
