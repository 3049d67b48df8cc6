//! Tabular numeric datasets loaded from CSV.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::domain::error::{PricegateError, Result};

/// Default name of the target column.
pub const DEFAULT_TARGET: &str = "price";

/// Numeric feature matrix plus target column.
///
/// # Invariants
///
/// - at least one row
/// - every row has `feature_names.len()` finite values
/// - `target.len() == rows.len()`, all finite
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    target_name: String,
    rows: Vec<Vec<f64>>,
    target: Vec<f64>,
}

impl Dataset {
    /// Build a dataset from already-parsed columns.
    pub fn new(
        feature_names: Vec<String>,
        target_name: impl Into<String>,
        rows: Vec<Vec<f64>>,
        target: Vec<f64>,
    ) -> Result<Self> {
        let target_name = target_name.into();
        if rows.is_empty() {
            return Err(PricegateError::InvalidDataset(
                "dataset has no rows".to_string(),
            ));
        }
        if rows.len() != target.len() {
            return Err(PricegateError::InvalidDataset(format!(
                "{} feature rows but {} target values",
                rows.len(),
                target.len()
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != feature_names.len() {
                return Err(PricegateError::InvalidDataset(format!(
                    "row {i} has {} values, expected {}",
                    row.len(),
                    feature_names.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) || !target[i].is_finite() {
                return Err(PricegateError::InvalidDataset(format!(
                    "row {i} contains a non-finite value"
                )));
            }
        }
        Ok(Self {
            feature_names,
            target_name,
            rows,
            target,
        })
    }

    /// Load a CSV file with a header row.
    pub fn from_csv_path(path: &Path, target: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            PricegateError::InvalidDataset(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_csv_reader(file, target, &path.display().to_string())
    }

    /// Load CSV from any reader. `source` names the input in error messages.
    pub fn from_csv_reader<R: Read>(reader: R, target: &str, source: &str) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .map_err(|e| PricegateError::InvalidDataset(format!("{source}: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let target_idx = headers.iter().position(|h| h == target).ok_or_else(|| {
            PricegateError::MissingColumn {
                column: target.to_string(),
                context: source.to_string(),
            }
        })?;
        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for (line, record) in csv.records().enumerate() {
            let record =
                record.map_err(|e| PricegateError::InvalidDataset(format!("{source}: {e}")))?;
            let mut row = Vec::with_capacity(feature_names.len());
            for (col, cell) in record.iter().enumerate() {
                let value = parse_cell(cell).ok_or_else(|| {
                    PricegateError::InvalidDataset(format!(
                        "{source}: row {} column '{}' is not a finite number: '{cell}'",
                        line + 1,
                        headers.get(col).map(String::as_str).unwrap_or("?"),
                    ))
                })?;
                if col == target_idx {
                    targets.push(value);
                } else {
                    row.push(value);
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(PricegateError::InvalidDataset(format!(
                "{source}: no data rows"
            )));
        }
        Self::new(feature_names, target, rows, targets)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Rows selected by index, in the given order.
    pub fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        let target = indices.iter().map(|&i| self.target[i]).collect();
        (rows, target)
    }

    /// Feature matrix reordered to `names`. Missing names are an error.
    pub fn project(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let positions = names
            .iter()
            .map(|name| {
                self.feature_names
                    .iter()
                    .position(|f| f == name)
                    .ok_or_else(|| PricegateError::MissingColumn {
                        column: name.clone(),
                        context: "dataset features".to_string(),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&p| row[p]).collect())
            .collect())
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Resolve a data argument: a CSV file as-is, or the first `*.csv` (by
/// name) inside a directory.
pub fn resolve_csv(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let mut csvs: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    csvs.sort();
    csvs.into_iter().next().ok_or_else(|| {
        PricegateError::InvalidDataset(format!("no CSV file in {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "sqft_living,price,bedrooms\n1000,200000,2\n2000,400000,3\n1500,310000,3\n";

    #[test]
    fn loads_features_in_column_order_without_target() {
        let ds = Dataset::from_csv_reader(CSV.as_bytes(), "price", "inline").unwrap();
        assert_eq!(ds.feature_names(), ["sqft_living", "bedrooms"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows()[1], vec![2000.0, 3.0]);
        assert_eq!(ds.target(), [200000.0, 400000.0, 310000.0]);
    }

    #[test]
    fn missing_target_column() {
        let err = Dataset::from_csv_reader(CSV.as_bytes(), "sale_price", "inline").unwrap_err();
        assert!(matches!(err, PricegateError::MissingColumn { ref column, .. } if column == "sale_price"));
    }

    #[test]
    fn header_only_is_rejected() {
        let err = Dataset::from_csv_reader("a,price\n".as_bytes(), "price", "inline").unwrap_err();
        assert!(matches!(err, PricegateError::InvalidDataset(_)));
    }

    #[test]
    fn non_numeric_cell_is_rejected() {
        let csv = "a,price\n1,100\nx,200\n";
        let err = Dataset::from_csv_reader(csv.as_bytes(), "price", "inline").unwrap_err();
        assert!(err.to_string().contains("row 2"));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn project_reorders_and_detects_missing() {
        let ds = Dataset::from_csv_reader(CSV.as_bytes(), "price", "inline").unwrap();
        let m = ds
            .project(&["bedrooms".to_string(), "sqft_living".to_string()])
            .unwrap();
        assert_eq!(m[0], vec![2.0, 1000.0]);

        let err = ds.project(&["grade".to_string()]).unwrap_err();
        assert!(matches!(err, PricegateError::MissingColumn { .. }));
    }

    #[test]
    fn resolve_csv_picks_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), CSV).unwrap();
        std::fs::write(dir.path().join("a.csv"), CSV).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(resolve_csv(dir.path()).unwrap(), dir.path().join("a.csv"));

        let empty = tempfile::tempdir().unwrap();
        assert!(resolve_csv(empty.path()).is_err());
    }
}
