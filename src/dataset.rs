use polars::prelude::*;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::RxError;
use crate::listing::FieldType;

#[derive(Debug)]
enum FileType {
    Json,
    Csv,
    Parquet,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A single cell of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Null,
}

static NULL: Value = Value::Null;

impl Value {
    /// Numeric reading of the value. Numeric text is parsed, everything else
    /// (including NaN) is treated as missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            Value::Null => None,
        }
    }

    /// Text used for searching and string sorting. `None` for missing values.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(Cow::Owned(format_number(*n))),
            Value::Null => None,
        }
    }

    pub fn display(&self) -> String {
        match self.as_text() {
            Some(s) => s.into_owned(),
            None => String::from("∅"),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One row of a dataset: a provider, a drug, a state ...
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    /// Missing fields read as `Value::Null`.
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
}

impl Column {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Column {
            name: name.to_string(),
            field_type,
        }
    }
}

pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
    pub records: Arc<Vec<Record>>,
}

impl Dataset {
    pub fn load(path: PathBuf) -> Result<Self, RxError> {
        let file_info = Self::get_file_info(path)?;
        debug!("Loading {:?}", file_info);
        let start_time = Instant::now();

        let df = match file_info.file_type {
            FileType::Json => JsonReader::new(File::open(&file_info.path)?).finish()?,
            FileType::Csv => Self::load_csv(&file_info.path)?.collect()?,
            FileType::Parquet => Self::load_parquet(&file_info.path)?.collect()?,
        };

        // Each column is converted in its own thread, records are assembled afterwards.
        let converted: Result<Vec<(Column, Vec<Value>)>, PolarsError> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let converted = converted?;

        let nrows = df.height();
        let mut records = Vec::with_capacity(nrows);
        for ridx in 0..nrows {
            records.push(
                converted
                    .iter()
                    .map(|(column, data)| (column.name.clone(), data[ridx].clone()))
                    .collect::<Record>(),
            );
        }
        let columns: Vec<Column> = converted.into_iter().map(|(c, _)| c).collect();

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        info!(
            "Loaded {} ({} bytes): {} records, {} columns in {}ms",
            name,
            file_info.file_size,
            records.len(),
            columns.len(),
            start_time.elapsed().as_millis()
        );

        Ok(Dataset {
            name,
            columns,
            records: Arc::new(records),
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(Column, Vec<Value>), PolarsError> {
        let column = df.column(col_name)?;

        if Self::is_numeric_type(column.dtype()) {
            let col = column.cast(&DataType::Float64)?;
            let data = col
                .f64()?
                .into_iter()
                .map(|v| v.filter(|n| !n.is_nan()).map_or(Value::Null, Value::Number))
                .collect();
            return Ok((Column::new(col_name, FieldType::Number), data));
        }

        let data = match column.cast(&DataType::String) {
            Ok(col) => col
                .str()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
                .collect(),
            Err(e) => {
                warn!("Column \"{col_name}\" can not be shown as text, leaving it empty: {e}");
                vec![Value::Null; df.height()]
            }
        };
        Ok((Column::new(col_name, FieldType::Text), data))
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn detect_file_type(path: &Path) -> Result<FileType, RxError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("JSON") => Ok(FileType::Json),
            Some("CSV") => Ok(FileType::Csv),
            Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
            _ => Err(RxError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, RxError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RxError::FileNotFound,
            ErrorKind::PermissionDenied => RxError::PermissionDenied,
            _ => RxError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(RxError::LoadingFailed(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size: metadata.len(),
            file_type,
        })
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }
}

/// Distinct displayed values of `field` with their counts, most frequent first.
pub fn distinct_values<'a>(
    records: impl Iterator<Item = &'a Record>,
    field: &str,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let value = record.get(field);
        if !value.is_null() {
            *counts.entry(value.display()).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_unstable_by(|(va, ca), (vb, cb)| cb.cmp(ca).then_with(|| va.cmp(vb)));
    sorted
}
