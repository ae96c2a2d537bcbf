use crate::error::{AeromixError, AmResult};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Header token on the first line of every matrix file.
pub const HEADER_TOKEN: &str = "Alt/Time";

/// Dense (altitude x time) field with row/column labels. Values are stored
/// row-major; missing or invalid entries are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixData {
    pub heights: Vec<f64>,
    pub times: Vec<String>,
    values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl MatrixData {
    /// Allocates a matrix pre-filled with NaN. Labels start empty and are
    /// attached from the reference input before writing.
    pub fn new_nan(rows: usize, cols: usize) -> Self {
        Self {
            heights: Vec::new(),
            times: Vec::new(),
            values: vec![f64::NAN; rows * cols],
            rows,
            cols,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.cols + j] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Copies the row/column labels of `reference` onto this matrix.
    pub fn adopt_labels(&mut self, reference: &MatrixData) {
        self.heights = reference.heights.clone();
        self.times = reference.times.clone();
    }

    /// Bins the finite values into `n` bins over [min, max], clamping values
    /// outside the range. `min == max` derives the range from the data.
    pub fn hist(&self, mut min: f64, mut max: f64, n: usize) -> AmResult<Histogram> {
        if self.values.is_empty() {
            return Err(AeromixError::Shape("histogram of an empty matrix".into()));
        }
        if n < 2 {
            return Err(AeromixError::Shape(format!(
                "histogram needs at least 2 bins, got {}",
                n
            )));
        }

        if min == max {
            min = f64::INFINITY;
            max = f64::NEG_INFINITY;
            for &v in &self.values {
                if v.is_finite() {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            if min > max {
                return Err(AeromixError::Shape(
                    "histogram range: no finite values in matrix".into(),
                ));
            }
            if min == max {
                max = min + 1.0;
            }
        }

        let bin_width = (max - min) / (n - 1) as f64;
        let bins: Vec<f64> = (0..n).map(|i| min + i as f64 * bin_width).collect();
        let mut counts = vec![0usize; n];

        for &v in &self.values {
            if !v.is_finite() {
                continue;
            }
            let clamped = v.clamp(min, max);
            let index = (((clamped - min) / bin_width) as usize).min(n - 1);
            counts[index] += 1;
        }

        Ok(Histogram { bins, counts })
    }
}

/// Binned value counts produced by [`MatrixData::hist`].
#[derive(Debug, Clone)]
pub struct Histogram {
    pub bins: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Reads a labelled matrix from the whitespace-delimited text format.
/// Negative values are replaced by NaN with a warning.
pub fn read_matrix<P: AsRef<Path>>(path: P) -> AmResult<MatrixData> {
    let path_str = path.as_ref().display().to_string();
    let file = File::open(&path)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }

    if lines.len() < 2 {
        return Err(AeromixError::Format {
            path: path_str,
            reason: "expected a header line and at least one data row".into(),
        });
    }

    let mut header = lines[0].split_whitespace();
    // First token is the Alt/Time marker; only the labels after it matter.
    header.next();
    let times: Vec<String> = header.map(str::to_string).collect();

    let mut heights = Vec::new();
    let mut values = Vec::new();
    let mut cols = 0usize;

    for line in &lines[1..] {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            continue;
        }

        let height: f64 = fields[0].parse().map_err(|_| AeromixError::Format {
            path: path_str.clone(),
            reason: format!("bad altitude label '{}'", fields[0]),
        })?;

        let row_len = fields.len() - 1;
        if cols == 0 {
            cols = row_len;
        } else if row_len != cols {
            return Err(AeromixError::Format {
                path: path_str,
                reason: format!(
                    "ragged row at altitude {}: {} values, expected {}",
                    height, row_len, cols
                ),
            });
        }

        heights.push(height);
        for field in &fields[1..] {
            let mut value: f64 = field.parse().map_err(|_| AeromixError::Format {
                path: path_str.clone(),
                reason: format!("bad value '{}' at altitude {}", field, height),
            })?;
            if value < 0.0 {
                warn!(value, altitude = height, "negative value replaced with NaN");
                value = f64::NAN;
            }
            values.push(value);
        }
    }

    if heights.is_empty() {
        return Err(AeromixError::Format {
            path: path_str,
            reason: "no data rows".into(),
        });
    }
    if times.len() != cols {
        return Err(AeromixError::Format {
            path: path_str,
            reason: format!("{} time labels for {} columns", times.len(), cols),
        });
    }

    let rows = heights.len();
    Ok(MatrixData {
        heights,
        times,
        values,
        rows,
        cols,
    })
}

/// Writes a labelled matrix in the same text layout the reader consumes.
/// Altitude labels get 2 fractional digits, values `decimals`.
pub fn write_matrix<P: AsRef<Path>>(path: P, data: &MatrixData, decimals: usize) -> AmResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}\t{}", HEADER_TOKEN, data.times.iter().join("\t"))?;

    for i in 0..data.rows {
        let row = (0..data.cols)
            .map(|j| format!("{:.*}", decimals, data.get(i, j)))
            .join("\t");
        writeln!(writer, "{:.2}\t{}", data.heights[i], row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes a histogram as a two-column tab-separated text file.
pub fn write_histogram<P: AsRef<Path>>(path: P, hist: &Histogram) -> AmResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "X\tY")?;
    for (bin, count) in hist.bins.iter().zip(&hist.counts) {
        writeln!(writer, "{:.2e}\t{:>10}", bin, count)?;
    }

    writer.flush()?;
    Ok(())
}
