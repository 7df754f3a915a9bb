//! JSONL Quote Archive
//!
//! One `ArchiveEntry` per line, appended as ticks are processed. Lines that
//! fail to parse are skipped, so a torn final write never blocks read-back.
//! `latest` reads backwards from the end of the file and stops at the first
//! match; `history` scans the whole file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::ports::{ArchiveEntry, ArchiveError, QuoteArchive};

pub const DEFAULT_ARCHIVE_PATH: &str = "data/quotes.jsonl";

/// Bytes read per step when scanning from the end
const TAIL_CHUNK: u64 = 8 * 1024;

#[derive(Debug, Clone)]
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parseable entry in file order, regardless of code
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ArchiveEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping corrupt archive line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }

    /// Hand complete lines to `visit`, last line first, until it returns true
    fn scan_backwards<F>(&self, mut visit: F) -> Result<(), ArchiveError>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut pos = file.metadata()?.len();
        // Leading fragment of the previous chunk; its line begins further back
        let mut carry: Vec<u8> = Vec::new();
        while pos > 0 {
            let read = TAIL_CHUNK.min(pos);
            pos -= read;
            file.seek(SeekFrom::Start(pos))?;
            let mut chunk = vec![0u8; read as usize];
            file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&carry);

            let mut end = chunk.len();
            while let Some(newline) = chunk[..end].iter().rposition(|b| *b == b'\n') {
                if visit(&chunk[newline + 1..end]) {
                    return Ok(());
                }
                end = newline;
            }
            chunk.truncate(end);
            carry = chunk;
        }
        if !carry.is_empty() {
            visit(&carry);
        }
        Ok(())
    }

    fn parse_line(&self, line: &[u8]) -> Option<ArchiveEntry> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str(text) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping corrupt archive line in {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl QuoteArchive for JsonlArchive {
    fn record(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    fn latest(&self, code: &str) -> Result<Option<ArchiveEntry>, ArchiveError> {
        let mut found = None;
        self.scan_backwards(|line| match self.parse_line(line) {
            Some(entry) if entry.quote.code == code => {
                found = Some(entry);
                true
            }
            _ => false,
        })?;
        Ok(found)
    }

    fn history(&self, code: &str, limit: usize) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let matching: Vec<ArchiveEntry> = self.entries()?
            .into_iter()
            .filter(|e| e.quote.code == code)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::fixtures::sample_quote;
    use crate::domain::Signal;
    use crate::strategy::TrendLabel;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn entry(price: Decimal, signal: Signal) -> ArchiveEntry {
        ArchiveEntry {
            observed_at: Utc.with_ymd_and_hms(2025, 3, 14, 2, 0, 0).unwrap(),
            quote: sample_quote(price),
            trend: TrendLabel::Up,
            slope: dec!(0.0025),
            signal,
        }
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let archive = JsonlArchive::new(dir.path().join("absent.jsonl"));

        assert!(archive.latest("518880").unwrap().is_none());
        assert!(archive.history("518880", 5).unwrap().is_empty());
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut archive = JsonlArchive::new(dir.path().join("nested/quotes.jsonl"));

        archive.record(&entry(dec!(9.04), Signal::Buy)).unwrap();
        archive.record(&entry(dec!(9.20), Signal::Sell)).unwrap();

        let latest = archive.latest("518880").unwrap().unwrap();
        assert_eq!(latest, entry(dec!(9.20), Signal::Sell));

        let history = archive.history("518880", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].quote.price, dec!(9.04));
        assert_eq!(history[0].quote.precision, 2);
    }

    #[test]
    fn test_history_limit_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let mut archive = JsonlArchive::new(dir.path().join("quotes.jsonl"));
        for price in [dec!(9.01), dec!(9.02), dec!(9.03)] {
            archive.record(&entry(price, Signal::Hold)).unwrap();
        }

        let history = archive.history("518880", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].quote.price, dec!(9.02));
        assert_eq!(history[1].quote.price, dec!(9.03));
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.jsonl");
        let mut archive = JsonlArchive::new(&path);
        archive.record(&entry(dec!(9.04), Signal::Buy)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"observed_at\": \"not a date\"").unwrap();
        writeln!(file).unwrap();
        drop(file);

        archive.record(&entry(dec!(9.10), Signal::Hold)).unwrap();

        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].quote.price, dec!(9.10));
    }

    #[test]
    fn test_latest_reads_from_the_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.jsonl");
        let mut archive = JsonlArchive::new(&path);

        // enough lines to span several read chunks
        for i in 0..200u32 {
            let mut e = entry(Decimal::new(900 + i64::from(i), 2), Signal::Hold);
            if i % 2 == 1 {
                e.quote.code = "600000".to_string();
            }
            archive.record(&e).unwrap();
        }
        assert!(fs::metadata(&path).unwrap().len() > TAIL_CHUNK * 2);

        assert_eq!(archive.latest("518880").unwrap().unwrap().quote.price, dec!(10.98));
        assert_eq!(archive.latest("600000").unwrap().unwrap().quote.price, dec!(10.99));
        assert!(archive.latest("000001").unwrap().is_none());
    }

    #[test]
    fn test_latest_skips_torn_final_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.jsonl");
        let mut archive = JsonlArchive::new(&path);
        archive.record(&entry(dec!(9.04), Signal::Buy)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"observed_at\":").unwrap();
        drop(file);

        let latest = archive.latest("518880").unwrap().unwrap();
        assert_eq!(latest.quote.price, dec!(9.04));
    }
}
