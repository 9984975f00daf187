//! Generic CSV tables and snapshot writes.
//!
//! External datasets have no fixed column set, so they are read as plain
//! string tables. Every artifact write goes through a sibling temp file and
//! a rename, so readers only ever see a complete snapshot.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Header row plus data rows; every row has exactly `columns.len()` cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Read a UTF-8, comma-delimited CSV with a header row.
    /// A missing or unparseable file is a data error.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Data(format!("{} not found", path.display())));
        }
        let file = fs::File::open(path)?;
        Self::from_reader(file).map_err(|e| match e {
            Error::Csv(csv_err) => Error::Data(format!("cannot parse {}: {}", path.display(), csv_err)),
            other => other,
        })
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller cannot work without.
    pub fn require_column(&self, name: &str, what: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::Data(format!("{} is missing column '{}'", what, name)))
    }

    /// Append a derived column computed from each row. A column with the
    /// same name is overwritten in place.
    pub fn push_column<F>(&mut self, name: &str, mut derive: F)
    where
        F: FnMut(&[String]) -> String,
    {
        let existing = self.column_index(name);
        for row in &mut self.rows {
            let value = derive(row);
            match existing {
                Some(idx) => row[idx] = value,
                None => row.push(value),
            }
        }
        if existing.is_none() {
            self.columns.push(name.to_string());
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_snapshot(path, |file| {
            let mut wtr = csv::Writer::from_writer(file);
            wtr.write_record(&self.columns)?;
            for row in &self.rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
            Ok(())
        })
    }
}

/// Write typed records under a fixed header; the header is written even
/// when there are no records.
pub fn write_records<T: Serialize>(path: &Path, columns: &[&str], records: &[T]) -> Result<()> {
    write_snapshot(path, |file| {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        wtr.write_record(columns)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Write to `<path>.tmp`, then rename over `path`.
fn write_snapshot<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let result = fs::File::create(&tmp)
        .map_err(Error::from)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        })
        .and_then(|_| fs::rename(&tmp, path).map_err(Error::from));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pads_and_truncates_rows() {
        let data = "a,b,c\n1,2\n3,4,5,6\n";
        let table = Table::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["3", "4", "5"]);
    }

    #[test]
    fn test_read_missing_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Table::read(&dir.path().join("nope.csv")).unwrap_err();
        assert_eq!(err.kind(), "data");
    }

    #[test]
    fn test_require_column() {
        let table = Table::from_reader("name,artist_names\n".as_bytes()).unwrap();
        assert_eq!(table.require_column("artist_names", "enriched data").unwrap(), 1);
        let err = table.require_column("track_name", "bulk dataset").unwrap_err();
        assert!(err.to_string().contains("'track_name'"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_push_column() {
        let mut table = Table::from_reader("x\nA\nb\n".as_bytes()).unwrap();
        table.push_column("x_lower", |row| row[0].to_lowercase());
        assert_eq!(table.columns, vec!["x", "x_lower"]);
        assert_eq!(table.rows[0], vec!["A", "a"]);

        table.push_column("x_lower", |row| format!("{}!", row[0]));
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.rows[1], vec!["b", "b!"]);
    }

    #[test]
    fn test_write_roundtrip_with_quoting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut table = Table::new(vec!["name".to_string(), "artist_names".to_string()]);
        table.rows.push(vec!["Hello, World".to_string(), "A \"B\"".to_string()]);
        table.write(&path).unwrap();

        let back = Table::read(&path).unwrap();
        assert_eq!(back, table);
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_write_records_empty_has_header() {
        #[derive(Serialize)]
        struct Row {
            a: u32,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_records::<Row>(&path, &["a"], &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");

        write_records(&path, &["a"], &[Row { a: 1 }, Row { a: 2 }]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n2\n");
    }
}
