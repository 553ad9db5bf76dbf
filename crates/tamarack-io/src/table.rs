//! Numeric table reading and label writing.
//!
//! Tables are headerless CSV: one row per point, one numeric cell per
//! feature. Label tables are a single column of 8-bit class indices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, instrument};

use tamarack_rf::{Label, Value};

use crate::error::IoError;

/// A dense row-major table of numeric cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Table<T> {
    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow the cells in row-major order.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.cells
    }

    /// Consume the table into its row-major cell vector.
    #[must_use]
    pub fn into_values(self) -> Vec<T> {
        self.cells
    }
}

impl<T: Copy> Table<T> {
    /// Return one cell.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.cells[row * self.cols + col]
    }
}

/// Read every cell of a headerless CSV table as `f64`.
fn read_raw(path: &Path) -> Result<Table<f64>, IoError> {
    let file = File::open(path).map_err(|e| IoError::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;

    // flexible(true) lets our own column-count check fire instead of a
    // low-level CSV error.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut cells = Vec::new();
    let mut rows = 0;
    let mut cols = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IoError::CsvParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if row == 0 {
            cols = record.len();
        } else if record.len() != cols {
            return Err(IoError::InconsistentRowLength {
                path: path.to_path_buf(),
                row,
                expected: cols,
                got: record.len(),
            });
        }
        for (column, cell) in record.iter().enumerate() {
            let value: f64 = cell.trim().parse().map_err(|_| IoError::InvalidNumber {
                path: path.to_path_buf(),
                row,
                column,
            })?;
            cells.push(value);
        }
        rows += 1;
    }
    if rows == 0 {
        return Err(IoError::EmptyTable {
            path: path.to_path_buf(),
        });
    }

    Ok(Table { rows, cols, cells })
}

/// Read a feature table with cells of element type `F`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileOpen`] | file does not exist or is unreadable |
/// | [`IoError::CsvParse`] | malformed CSV record |
/// | [`IoError::InconsistentRowLength`] | ragged rows |
/// | [`IoError::InvalidNumber`] | a cell fails to parse |
/// | [`IoError::EmptyTable`] | zero data rows |
#[instrument(fields(path = %path.display()))]
pub fn read_table<F: Value>(path: &Path) -> Result<Table<F>, IoError> {
    let raw = read_raw(path)?;
    debug!(rows = raw.rows, cols = raw.cols, "table read");
    Ok(Table {
        rows: raw.rows,
        cols: raw.cols,
        cells: raw.cells.into_iter().map(F::from_f64).collect(),
    })
}

/// Read a single-column label table.
///
/// Every cell must be an integer in `0..=255`.
///
/// # Errors
///
/// The table errors of [`read_table`], plus [`IoError::LabelColumns`] for a
/// multi-column table and [`IoError::LabelOutOfRange`] for a cell that does
/// not fit a [`Label`].
#[instrument(fields(path = %path.display()))]
pub fn read_labels(path: &Path) -> Result<Vec<Label>, IoError> {
    let raw = read_raw(path)?;
    if raw.cols != 1 {
        return Err(IoError::LabelColumns {
            path: path.to_path_buf(),
            columns: raw.cols,
        });
    }
    let mut labels = Vec::with_capacity(raw.rows);
    for (row, &cell) in raw.cells.iter().enumerate() {
        if cell.fract() != 0.0 || !(0.0..=255.0).contains(&cell) {
            return Err(IoError::LabelOutOfRange {
                path: path.to_path_buf(),
                row,
                value: cell as i64,
            });
        }
        labels.push(cell as Label);
    }
    debug!(rows = labels.len(), "labels read");
    Ok(labels)
}

/// Write labels as a single-column table.
///
/// # Errors
///
/// Returns [`IoError::FileCreate`] or [`IoError::WriteFile`] on failure.
#[instrument(skip(labels), fields(path = %path.display(), rows = labels.len()))]
pub fn write_labels(path: &Path, labels: &[Label]) -> Result<(), IoError> {
    let create_err = |e| IoError::FileCreate {
        path: path.to_path_buf(),
        source: e,
    };
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| IoError::WriteFile { path, source: e }
    };

    let file = File::create(path).map_err(create_err)?;
    let mut writer = BufWriter::new(file);
    for &label in labels {
        writeln!(writer, "{label}").map_err(write_err(path))?;
    }
    writer.flush().map_err(write_err(path))?;
    debug!("labels written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_labels, read_table, write_labels};
    use crate::error::IoError;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_a_rectangular_table() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", "1.0,2.5\n3.0,4.0\n");
        let table = read_table::<f64>(&path).unwrap();
        assert_eq!(table.rows(), 2);
        assert_eq!(table.cols(), 2);
        assert_eq!(table.values(), &[1.0, 2.5, 3.0, 4.0]);
        assert_eq!(table.get(1, 0), 3.0);
    }

    #[test]
    fn reads_f32_cells() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", "0.5\n1.5\n");
        let table = read_table::<f32>(&path).unwrap();
        assert_eq!(table.values(), &[0.5f32, 1.5]);
    }

    #[test]
    fn whitespace_around_cells_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", " 1.0 , 2.0\n");
        let table = read_table::<f64>(&path).unwrap();
        assert_eq!(table.values(), &[1.0, 2.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", "1.0,2.0\n3.0\n");
        let err = read_table::<f64>(&path).unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength {
                row: 1,
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn unparseable_cell_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", "1.0,huh\n");
        let err = read_table::<f64>(&path).unwrap_err();
        assert!(matches!(
            err,
            IoError::InvalidNumber { row: 0, column: 1, .. }
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.csv", "");
        assert!(matches!(
            read_table::<f64>(&path).unwrap_err(),
            IoError::EmptyTable { .. }
        ));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.csv");
        assert!(matches!(
            read_table::<f64>(&path).unwrap_err(),
            IoError::FileOpen { .. }
        ));
    }

    #[test]
    fn reads_labels() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "labels.csv", "0\n2\n255\n");
        assert_eq!(read_labels(&path).unwrap(), vec![0, 2, 255]);
    }

    #[test]
    fn multi_column_labels_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "labels.csv", "0,1\n");
        assert!(matches!(
            read_labels(&path).unwrap_err(),
            IoError::LabelColumns { columns: 2, .. }
        ));
    }

    #[test]
    fn out_of_range_labels_are_rejected() {
        let dir = TempDir::new().unwrap();
        for content in ["256\n", "-1\n", "1.5\n"] {
            let path = write_file(&dir, "labels.csv", content);
            assert!(matches!(
                read_labels(&path).unwrap_err(),
                IoError::LabelOutOfRange { .. }
            ));
        }
    }

    #[test]
    fn labels_roundtrip_through_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_labels(&path, &[3, 0, 7]).unwrap();
        assert_eq!(read_labels(&path).unwrap(), vec![3, 0, 7]);
    }
}
