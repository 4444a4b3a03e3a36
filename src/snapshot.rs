use crate::errors::SnapshotError;
use crate::models::{FundingRow, Protocol};
use csv::StringRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Read the whole table, append in memory, write everything back.
    Rewrite,
    /// Append new rows to the end of the file without reading history.
    Append,
}

/// Appends timestamped funding batches to per-exchange CSV tables.
/// Existing rows are never modified or reordered.
pub struct SnapshotWriter {
    mode: SnapshotMode,
}

impl SnapshotWriter {
    pub fn new(mode: SnapshotMode) -> Self {
        Self { mode }
    }

    /// Stamps `rows` with `timestamp` and adds them after whatever `path`
    /// already holds, creating the table if it does not exist yet.
    /// Returns the number of rows written; an empty batch leaves the table
    /// untouched.
    pub fn write(
        &self,
        path: &Path,
        protocol: Protocol,
        rows: &[FundingRow],
        timestamp: i64,
    ) -> Result<usize, SnapshotError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let header = StringRecord::from(protocol.columns());
        let batch: Vec<StringRecord> = rows
            .iter()
            .map(|row| StringRecord::from(row.to_record(timestamp)))
            .collect();

        if !path.exists() || fs::metadata(path)?.len() == 0 {
            write_table(path, &header, &batch)?;
            tracing::debug!("[{protocol}] created {}", path.display());
            return Ok(batch.len());
        }

        if self.mode == SnapshotMode::Append {
            let existing_header = csv::Reader::from_path(path)?.headers()?.clone();
            if existing_header == header {
                append_records(path, &batch)?;
                return Ok(batch.len());
            }
            tracing::warn!(
                "[{protocol}] {} has a different header, rewriting instead of appending",
                path.display()
            );
        }

        let (existing_header, existing) = read_table(path)?;
        let (merged_header, records) = concat(&existing_header, existing, &header, batch);
        write_table(path, &merged_header, &records)?;

        Ok(rows.len())
    }
}

fn read_table(path: &Path) -> Result<(StringRecord, Vec<StringRecord>), SnapshotError> {
    let mut reader = csv::Reader::from_path(path)?;
    let header = reader.headers()?.clone();
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((header, records))
}

/// Column-aligned concatenation: the existing columns keep their order, any
/// column only the batch has is added at the end, and gaps are left blank.
fn concat(
    existing_header: &StringRecord,
    existing: Vec<StringRecord>,
    batch_header: &StringRecord,
    batch: Vec<StringRecord>,
) -> (StringRecord, Vec<StringRecord>) {
    let mut columns: Vec<&str> = existing_header.iter().collect();
    for column in batch_header.iter() {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    let width = columns.len();

    let mut records = Vec::with_capacity(existing.len() + batch.len());

    for record in existing {
        let mut cells: Vec<&str> = record.iter().collect();
        cells.resize(width, "");
        records.push(StringRecord::from(cells));
    }

    // where each batch column lands in the merged layout
    let positions: Vec<usize> = batch_header
        .iter()
        .filter_map(|column| columns.iter().position(|c| *c == column))
        .collect();

    for record in batch {
        let mut cells = vec![""; width];
        for (value, position) in record.iter().zip(&positions) {
            cells[*position] = value;
        }
        records.push(StringRecord::from(cells));
    }

    (StringRecord::from(columns), records)
}

/// Writes the full table to a sibling temp file, then renames it over `path`.
fn write_table(
    path: &Path,
    header: &StringRecord,
    records: &[StringRecord],
) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(header)?;
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

fn append_records(path: &Path, records: &[StringRecord]) -> Result<(), SnapshotError> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;

    if !ends_with_newline(&mut file)? {
        file.write_all(b"\n")?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(())
}

fn ends_with_newline(file: &mut File) -> Result<bool, SnapshotError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_batch() -> Vec<FundingRow> {
        vec![
            FundingRow::new("BTC", 0.00075, Protocol::Vertex),
            FundingRow::new("ETH", -0.0001, Protocol::Vertex),
        ]
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn creates_missing_table_with_exactly_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vertex_funding_snap.csv");

        let written = SnapshotWriter::new(SnapshotMode::Rewrite)
            .write(&path, Protocol::Vertex, &vertex_batch(), 1_700_000_000)
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            read(&path),
            "Token Name,Funding Rate,Protocol,timestamp\n\
             BTC,0.00075,Vertex,1700000000\n\
             ETH,-0.0001,Vertex,1700000000\n"
        );
    }

    #[test]
    fn rewrite_appends_after_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vertex_funding_snap.csv");
        let existing = "Token Name,Funding Rate,Protocol,timestamp\n\
                        BTC,0.0001,Vertex,100\n\
                        ETH,0.0002,Vertex,100\n\
                        SOL,0.0003,Vertex,100\n";
        fs::write(&path, existing).unwrap();

        let writer = SnapshotWriter::new(SnapshotMode::Rewrite);
        writer
            .write(&path, Protocol::Vertex, &vertex_batch(), 200)
            .unwrap();

        let (_, records) = read_table(&path).unwrap();
        assert_eq!(records.len(), 3 + 2);
        assert!(read(&path).starts_with(existing));
        assert_eq!(&records[3], &StringRecord::from(vec!["BTC", "0.00075", "Vertex", "200"]));
        assert_eq!(&records[4], &StringRecord::from(vec!["ETH", "-0.0001", "Vertex", "200"]));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn append_mode_writes_without_rewriting_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vertex_funding_snap.csv");
        // no trailing newline on the last row
        fs::write(
            &path,
            "Token Name,Funding Rate,Protocol,timestamp\nBTC,0.0001,Vertex,100",
        )
        .unwrap();

        SnapshotWriter::new(SnapshotMode::Append)
            .write(&path, Protocol::Vertex, &vertex_batch(), 200)
            .unwrap();

        assert_eq!(
            read(&path),
            "Token Name,Funding Rate,Protocol,timestamp\n\
             BTC,0.0001,Vertex,100\n\
             BTC,0.00075,Vertex,200\n\
             ETH,-0.0001,Vertex,200\n"
        );
    }

    #[test]
    fn mismatched_header_is_merged_column_wise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hl_funding_snap.csv");
        fs::write(&path, "Token Name,Funding Rate,Protocol,timestamp\nBTC,1.0,Hyperliquid,100\n")
            .unwrap();

        let batch = vec![FundingRow::new("ETH", 2.0, Protocol::Hyperliquid).with_open_interest(7.5)];
        SnapshotWriter::new(SnapshotMode::Append)
            .write(&path, Protocol::Hyperliquid, &batch, 200)
            .unwrap();

        assert_eq!(
            read(&path),
            "Token Name,Funding Rate,Protocol,timestamp,Open Interest (in token)\n\
             BTC,1.0,Hyperliquid,100,\n\
             ETH,2.0,Hyperliquid,200,7.5\n"
        );
    }

    #[test]
    fn empty_batch_leaves_table_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aevo_funding_snap.csv");

        let written = SnapshotWriter::new(SnapshotMode::Rewrite)
            .write(&path, Protocol::Aevo, &[], 100)
            .unwrap();

        assert_eq!(written, 0);
        assert!(!path.exists());
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mango_funding_snap.csv");

        SnapshotWriter::new(SnapshotMode::Rewrite)
            .write(
                &path,
                Protocol::Mango,
                &[FundingRow::new("SOL", 0.0042, Protocol::Mango)],
                100,
            )
            .unwrap();

        assert_eq!(
            read(&path),
            "Token Name,Funding Rate,Protocol,timestamp\nSOL,0.0042,Mango,100\n"
        );
    }
}
