use super::ScoreStore;
use crate::error::{Result, ScoreError};
use crate::model::{MatchRecord, HEADER};
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Match table kept as a CSV file on disk
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the table for appending, creating it with a header row when
    /// it does not exist yet. Existing rows are never rewritten.
    fn open_for_append(&self) -> Result<csv::Writer<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        // A last row without line ending would be glued to the first new row
        let needs_newline = if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            last[0] != b'\n'
        } else {
            false
        };
        if needs_newline {
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if len == 0 {
            writer.write_record(HEADER)?;
        }
        Ok(writer)
    }

    /// Backup path that does not exist yet: `<path>_bk_<unix>`, with a
    /// counter when several clears fall into the same second
    fn backup_path(&self) -> String {
        let base = format!("{}_bk_{}", self.path.display(), Utc::now().timestamp());
        let mut candidate = base.clone();
        let mut n = 1;
        while Path::new(&candidate).exists() {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        candidate
    }
}

impl ScoreStore for LocalStore {
    fn name(&self) -> &'static str {
        "local file"
    }

    fn read(&self) -> Result<Vec<MatchRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for (row, result) in reader.deserialize::<MatchRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("{}: skipping row {}: {}", self.path.display(), row + 1, e),
            }
        }
        Ok(records)
    }

    fn append(&self, records: &[MatchRecord]) -> Result<()> {
        let mut writer = self.open_for_append()?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        log::debug!("{}: {} rows appended", self.path.display(), records.len());
        Ok(())
    }

    fn clear(&self) -> Result<String> {
        if !self.path.exists() {
            return Err(ScoreError::NoData);
        }
        let backup = self.backup_path();
        std::fs::rename(&self.path, &backup)?;
        log::info!("moved {} to {}", self.path.display(), backup);
        Ok(backup)
    }
}
