pub mod map;

pub use map::render_map_html;

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::geolocation::GeoRecord;
use crate::models::{AccessEvent, AuthEvent};

/// One-line human rendering for the console format
pub trait ConsoleLine {
    fn console_line(&self) -> String;
}

impl ConsoleLine for AuthEvent {
    fn console_line(&self) -> String {
        let kind = if self.is_attack() { "ATTACK" } else { "LOGIN" };
        format!("[{}] {} {} user={} ip={}", self.service, self.timestamp, kind, self.user, self.ip)
    }
}

impl ConsoleLine for AccessEvent {
    fn console_line(&self) -> String {
        format!(
            "[{}] {} {} {} -> {} ({:.1} ms) user={} ip={}",
            self.service,
            self.timestamp,
            self.method,
            self.path,
            self.status_code,
            self.duration_ms,
            self.user_id,
            self.ip
        )
    }
}

impl ConsoleLine for GeoRecord {
    fn console_line(&self) -> String {
        format!("{}, {} ({:.4}, {:.4})", self.city, self.country, self.lat, self.lon)
    }
}

/// Output handler for parsed records
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "console" => Ok(OutputFormat::Console),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

impl OutputHandler {
    /// Write to `file_path` (appending) or to stdout when none is given
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match file_path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            None => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Handler writing into an arbitrary sink
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write one record in the configured format
    pub fn write_record<T>(&mut self, record: &T) -> Result<(), Box<dyn std::error::Error>>
    where
        T: Serialize + ConsoleLine,
    {
        let line = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(record)?,
            OutputFormat::Jsonl => serde_json::to_string(record)?,
            OutputFormat::Console => record.console_line(),
        };
        self.write_output(&format!("{}\n", line))
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => writer.write_all(data.as_bytes())?,
            None => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                lock.write_all(data.as_bytes())?;
                lock.flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::fixtures::{access, attack};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("jsonl".parse::<OutputFormat>(), Ok(OutputFormat::Jsonl));
        assert_eq!("console".parse::<OutputFormat>(), Ok(OutputFormat::Console));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_jsonl_to_file() {
        let file = NamedTempFile::new().unwrap();
        let mut handler =
            OutputHandler::new(OutputFormat::Jsonl, Some(file.path().to_path_buf())).unwrap();
        handler.write_record(&attack("1.2.3.4", "admin")).unwrap();
        handler.write_record(&attack("5.6.7.8", "root")).unwrap();
        handler.flush().unwrap();

        let contents = fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "attack");
        assert_eq!(first["user"], "admin");
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pretty_json_into_writer() {
        let buf = SharedBuf::default();
        let mut handler = OutputHandler::with_writer(OutputFormat::Json, Box::new(buf.clone()));
        handler.write_record(&access("1.2.3.4", "4", "2024-05-01T10:00:00")).unwrap();
        handler.flush().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(text.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], 200);
        assert_eq!(value["user_id"], "4");
    }

    #[test]
    fn test_console_lines() {
        let line = attack("1.2.3.4", "admin").console_line();
        assert!(line.contains("ATTACK"));
        assert!(line.contains("ip=1.2.3.4"));

        let line = access("1.2.3.4", "4", "2024-05-01T10:00:00").console_line();
        assert!(line.contains("GET / -> 200"));
        assert!(line.contains("user=4"));
    }
}
