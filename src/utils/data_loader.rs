//! CSV loading into numeric arrays

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads pre-transformed numeric CSV files
#[derive(Debug, Clone)]
pub struct DataLoader {
    has_header: bool,
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            has_header: true,
            infer_schema_length: 1000,
        }
    }

    /// Whether the first line holds column names
    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file as a DataFrame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(KolosalError::DataError(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_has_header(self.has_header)
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Load a CSV file as a row-major `Array2<f64>`.
    ///
    /// Every column is cast to Float64; missing or non-numeric cells are an error.
    pub fn load_array(&self, path: impl AsRef<Path>) -> Result<Array2<f64>> {
        let df = self.load_csv(path)?;
        dataframe_to_array(&df)
    }
}

/// Convert every column of `df` to f64 and lay the values out row-major.
pub fn dataframe_to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.filter(|x| !x.is_nan()).ok_or_else(|| {
                        KolosalError::DataError(format!(
                            "column '{}' row {}: missing or non-numeric value",
                            name, row
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]))
}

/// Write predictions as a single-column CSV named `prediction`.
pub fn save_predictions(path: impl AsRef<Path>, predictions: &Array1<f64>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut df = df!("prediction" => predictions.to_vec())?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kolosal_test_loader_{}_{}.csv", name, std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_array_with_header() {
        let path = write_csv("header", "a,b,target\n1,2.5,3\n4,5,6.5\n");
        let arr = DataLoader::new().load_array(&path).unwrap();

        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr[[0, 1]], 2.5);
        assert_eq!(arr[[1, 2]], 6.5);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_array_without_header() {
        let path = write_csv("noheader", "1,2\n3,4\n5,6\n");
        let arr = DataLoader::new().with_has_header(false).load_array(&path).unwrap();
        assert_eq!(arr.shape(), &[3, 2]);
        assert_eq!(arr[[2, 0]], 5.0);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_value_is_error() {
        let path = write_csv("missing", "a,b\n1,2\n3,\n");
        let err = DataLoader::new().load_array(&path).unwrap_err();
        assert!(matches!(err, KolosalError::DataError(_)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv("/nonexistent/kolosal.csv").unwrap_err();
        assert!(matches!(err, KolosalError::DataError(_)));
    }

    #[test]
    fn test_save_predictions() {
        let path = std::env::temp_dir().join(format!("kolosal_test_preds_{}.csv", std::process::id()));
        save_predictions(&path, &Array1::from(vec![1.5, 2.5])).unwrap();

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names()[0].as_str(), "prediction");
        let _ = fs::remove_file(path);
    }
}
