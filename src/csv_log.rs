//! Append-only CSV sinks for the observability records of client and server. These are data
//!  files for offline plotting, separate from `tracing` diagnostics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::error::SinkUnavailable;

pub trait CsvRecord {
    const HEADER: &'static str;

    fn write_row(&self, w: &mut impl Write) -> std::io::Result<()>;
}

/// One row per datagram received by the server from a given peer
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ServerJitterRecord {
    pub timestamp: u64,
    pub packet_id: u64,
    pub jitter_ms: u64,
    /// informational only: jitter plus a penalty on every 5th packet, independent of the delay
    ///  that is actually applied
    pub delay_ms: u64,
}
impl CsvRecord for ServerJitterRecord {
    const HEADER: &'static str = "timestamp,packet_id,jitter_ms,delay_ms";

    fn write_row(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, "{},{},{},{}", self.timestamp, self.packet_id, self.jitter_ms, self.delay_ms)
    }
}

/// Server-wide snapshot. `avg_jitter_ms` is the jitter of the packet that triggered the
///  snapshot, not an aggregate.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ServerStatsRecord {
    pub timestamp: u64,
    pub total_clients: usize,
    pub total_packets: u64,
    pub avg_jitter_ms: u64,
}
impl CsvRecord for ServerStatsRecord {
    const HEADER: &'static str = "timestamp,total_clients,total_packets,avg_jitter_ms";

    fn write_row(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, "{},{},{},{}", self.timestamp, self.total_clients, self.total_packets, self.avg_jitter_ms)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ClientJitterRecord {
    pub timestamp: u64,
    pub packet_id: u64,
    pub buffer_size: usize,
    pub processing_time_ms: u64,
}
impl CsvRecord for ClientJitterRecord {
    const HEADER: &'static str = "timestamp,packet_id,buffer_size,processing_time_ms";

    fn write_row(&self, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(w, "{},{},{},{}", self.timestamp, self.packet_id, self.buffer_size, self.processing_time_ms)
    }
}

/// A CSV file with a fixed header, flushed after every row. A log that could not be opened (or
///  that failed on a write) is disabled: appending to it is a no-op, and the engine owning it
///  keeps working without persisted records.
pub struct CsvLog<R: CsvRecord> {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    _record: PhantomData<R>,
}

impl<R: CsvRecord> CsvLog<R> {
    pub fn create(path: impl AsRef<Path>) -> Result<CsvLog<R>, SinkUnavailable> {
        let path = path.as_ref().to_path_buf();

        let init = || -> std::io::Result<BufWriter<File>> {
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(writer, "{}", R::HEADER)?;
            writer.flush()?;
            Ok(writer)
        };

        match init() {
            Ok(writer) => {
                debug!("opened CSV log {:?}", path);
                Ok(CsvLog {
                    path: Some(path),
                    writer: Some(writer),
                    _record: PhantomData,
                })
            }
            Err(source) => Err(SinkUnavailable { path, source }),
        }
    }

    /// Opens `file_name` in `dir`, or returns a disabled log if `dir` is `None` or the file can
    ///  not be created. The failure is reported here, once.
    pub fn create_in_dir_or_disabled(dir: Option<&Path>, file_name: &str) -> CsvLog<R> {
        let Some(dir) = dir else {
            return Self::disabled();
        };

        match Self::create(dir.join(file_name)) {
            Ok(log) => log,
            Err(e) => {
                warn!("{} - continuing without persisted log", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> CsvLog<R> {
        CsvLog {
            path: None,
            writer: None,
            _record: PhantomData,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn append(&mut self, record: &R) {
        if let Some(writer) = &mut self.writer {
            let result = record.write_row(writer)
                .and_then(|_| writer.flush());

            if let Err(e) = result {
                warn!("error writing to CSV log {:?}, disabling it: {}", self.path, e);
                self.writer = None;
            }
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use std::path::PathBuf;
    use uuid::Uuid;

    /// a fresh, empty directory below the system's temp dir
    pub fn fresh_log_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rtpsim-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn read_lines(path: impl AsRef<std::path::Path>) -> Vec<String> {
        std::fs::read_to_string(path).unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let dir = fresh_log_dir();
        let mut log = CsvLog::<ServerJitterRecord>::create(dir.join("jitter.csv")).unwrap();
        assert!(log.is_enabled());

        log.append(&ServerJitterRecord { timestamp: 1000, packet_id: 0, jitter_ms: 17, delay_ms: 217 });
        log.append(&ServerJitterRecord { timestamp: 1001, packet_id: 1, jitter_ms: 3, delay_ms: 3 });

        assert_eq!(read_lines(dir.join("jitter.csv")), vec![
            "timestamp,packet_id,jitter_ms,delay_ms",
            "1000,0,17,217",
            "1001,1,3,3",
        ]);
    }

    #[test]
    fn test_headers() {
        assert_eq!(ServerStatsRecord::HEADER, "timestamp,total_clients,total_packets,avg_jitter_ms");
        assert_eq!(ClientJitterRecord::HEADER, "timestamp,packet_id,buffer_size,processing_time_ms");
    }

    #[test]
    fn test_client_row() {
        let mut buf = Vec::new();
        ClientJitterRecord { timestamp: 5, packet_id: 2, buffer_size: 4, processing_time_ms: 30 }
            .write_row(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "5,2,4,30\n");
    }

    #[test]
    fn test_unavailable_dir_yields_disabled_log() {
        let dir = fresh_log_dir().join("does").join("not").join("exist");

        assert!(CsvLog::<ServerStatsRecord>::create(dir.join("x.csv")).is_err());

        let mut log = CsvLog::<ServerStatsRecord>::create_in_dir_or_disabled(Some(&dir), "x.csv");
        assert!(!log.is_enabled());
        log.append(&ServerStatsRecord { timestamp: 0, total_clients: 1, total_packets: 10, avg_jitter_ms: 5 });
    }

    #[test]
    fn test_no_dir_yields_disabled_log() {
        let log = CsvLog::<ClientJitterRecord>::create_in_dir_or_disabled(None, "x.csv");
        assert!(!log.is_enabled());
    }
}
