//! CSV ingest and validation.
//!
//! Two inputs are supported:
//!
//! - a partition-coefficient table (one row per element) for lattice strain fits
//! - a ratio table (one `radii` column plus one column per sample) for
//!   temperature estimation
//!
//! Design goals:
//! - **Strict schema**: missing columns are reported by name (exit code 2)
//! - **Fail fast**: a malformed value aborts the load with its CSV line number,
//!   before any fit is attempted
//! - **No fitting logic here**

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Conditions, PartitionSample, RatioSeries, SampleSet};
use crate::error::AppError;

const ELEMENT: &[&str] = &["element"];
const RADIUS: &[&str] = &["ri", "radius"];
const VALUE: &[&str] = &["di", "d"];
const SIGMA: &[&str] = &["1s", "sigma", "err"];
const TEMPERATURE_C: &[&str] = &["t [c]", "t_c"];
const PRESSURE_GPA: &[&str] = &["p [gpa]", "p_gpa"];
const RATIO_RADII: &[&str] = &["radii", "radius", "ri"];

/// Absolute zero offset for °C → K.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Summary stats about the rows that were loaded.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_points: usize,
    pub radius_min: f64,
    pub radius_max: f64,
    pub d_min: f64,
    pub d_max: f64,
}

/// A loaded partition-coefficient table.
#[derive(Debug, Clone)]
pub struct PartitionData {
    pub set: SampleSet,
    pub stats: DatasetStats,
    /// Input temperature as given (°C).
    pub temperature_c: f64,
}

/// Load a partition-coefficient CSV from disk.
pub fn load_partition_csv(path: &Path) -> Result<PartitionData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_partition_csv(file)
}

/// Parse a partition-coefficient CSV.
pub fn read_partition_csv<R: Read>(input: R) -> Result<PartitionData, AppError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let element = require_column(&header_map, ELEMENT)?;
    let radius = require_column(&header_map, RADIUS)?;
    let value = require_column(&header_map, VALUE)?;
    let sigma = require_column(&header_map, SIGMA)?;
    let temperature = require_column(&header_map, TEMPERATURE_C)?;
    let pressure = require_column(&header_map, PRESSURE_GPA)?;

    let mut samples = Vec::new();
    let mut first_conditions: Option<(f64, f64)> = None;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("line {line}: CSV parse error: {e}")))?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let name = cell(&record, element)
            .ok_or_else(|| AppError::new(2, format!("line {line}: missing element name")))?
            .to_string();
        let r = parse_positive(&record, radius, line, "radius")?;
        let d = parse_positive(&record, value, line, "partition coefficient")?;
        let s = parse_number(&record, sigma, line, "uncertainty")?;
        if s < 0.0 {
            return Err(AppError::new(2, format!("line {line}: uncertainty must be >= 0 (got {s})")));
        }

        match first_conditions {
            None => {
                let t_c = parse_number(&record, temperature, line, "temperature")?;
                let p = parse_number(&record, pressure, line, "pressure")?;
                first_conditions = Some((t_c, p));
            }
            Some((t_c, p)) => {
                let t_row = cell(&record, temperature).and_then(|c| c.parse::<f64>().ok());
                let p_row = cell(&record, pressure).and_then(|c| c.parse::<f64>().ok());
                if t_row.is_some_and(|v| (v - t_c).abs() > 1e-9) || p_row.is_some_and(|v| (v - p).abs() > 1e-9) {
                    tracing::warn!(line, "conditions differ from the first row; using the first row");
                }
            }
        }

        samples.push(PartitionSample {
            element: name,
            radius: r,
            d,
            sigma: s,
        });
    }

    let Some((temperature_c, pressure_gpa)) = first_conditions else {
        return Err(AppError::new(3, "CSV contains no data rows."));
    };
    let temperature_k = temperature_c + KELVIN_OFFSET;
    if temperature_k <= 0.0 {
        return Err(AppError::new(2, format!("temperature {temperature_c} °C is below absolute zero")));
    }

    let stats = compute_stats(&samples);
    tracing::info!(rows = samples.len(), temperature_k, pressure_gpa, "partition table loaded");

    Ok(PartitionData {
        set: SampleSet {
            samples,
            conditions: Conditions {
                temperature_k,
                pressure_gpa,
            },
        },
        stats,
        temperature_c,
    })
}

/// Load a ratio table CSV from disk.
pub fn load_ratio_table(path: &Path) -> Result<Vec<RatioSeries>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_ratio_table(file)
}

/// Parse a ratio table: one radius column, every other column is a sample.
///
/// Empty cells are skipped for that sample only.
pub fn read_ratio_table<R: Read>(input: R) -> Result<Vec<RatioSeries>, AppError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let radius_idx = require_column(&header_map, RATIO_RADII)?;

    let mut series: Vec<(usize, RatioSeries)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| *idx != radius_idx && !name.trim().is_empty())
        .map(|(idx, name)| {
            (
                idx,
                RatioSeries {
                    sample: name.trim().trim_start_matches('\u{feff}').to_string(),
                    radii: Vec::new(),
                    ratios: Vec::new(),
                },
            )
        })
        .collect();
    if series.is_empty() {
        return Err(AppError::new(2, "Ratio table has no sample columns."));
    }

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("line {line}: CSV parse error: {e}")))?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let r = parse_positive(&record, radius_idx, line, "radius")?;
        for (col, s) in series.iter_mut() {
            if cell(&record, *col).is_none() {
                continue;
            }
            let what = format!("ratio for `{}`", s.sample);
            let v = parse_positive(&record, *col, line, &what)?;
            s.radii.push(r);
            s.ratios.push(v);
        }
    }

    tracing::info!(samples = series.len(), "ratio table loaded");
    Ok(series.into_iter().map(|(_, s)| s).collect())
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Result<usize, AppError> {
    aliases
        .iter()
        .find_map(|a| header_map.get(*a).copied())
        .ok_or_else(|| {
            let alts = aliases
                .iter()
                .map(|a| format!("`{a}`"))
                .collect::<Vec<_>>()
                .join(" or ");
            AppError::new(2, format!("Missing required column: {alts}"))
        })
}

fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number(record: &StringRecord, idx: usize, line: usize, what: &str) -> Result<f64, AppError> {
    let raw = cell(record, idx).ok_or_else(|| AppError::new(2, format!("line {line}: missing {what}")))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| AppError::new(2, format!("line {line}: invalid {what} '{raw}'")))?;
    if !v.is_finite() {
        return Err(AppError::new(2, format!("line {line}: non-finite {what}")));
    }
    Ok(v)
}

fn parse_positive(record: &StringRecord, idx: usize, line: usize, what: &str) -> Result<f64, AppError> {
    let v = parse_number(record, idx, line, what)?;
    if v <= 0.0 {
        return Err(AppError::new(2, format!("line {line}: {what} must be > 0 (got {v})")));
    }
    Ok(v)
}

fn compute_stats(samples: &[PartitionSample]) -> DatasetStats {
    let fold = |f: fn(&PartitionSample) -> f64| {
        samples
            .iter()
            .map(f)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
    };
    let (radius_min, radius_max) = fold(|s| s.radius);
    let (d_min, d_max) = fold(|s| s.d);
    DatasetStats {
        n_points: samples.len(),
        radius_min,
        radius_max,
        d_min,
        d_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTITION: &str = "\u{feff}Element,ri,Di,1s,T [C],P [GPa]
La,1.160,0.8,0.1,1000,1.5
Sm,1.079,4.5,0.4,,
Lu,0.977,45,3,1000,1.5
";

    #[test]
    fn partition_csv_with_bom_and_aliases() {
        let data = read_partition_csv(PARTITION.as_bytes()).unwrap();
        assert_eq!(data.set.len(), 3);
        assert_eq!(data.set.samples[1].element, "Sm");
        assert!((data.set.conditions.temperature_k - 1273.15).abs() < 1e-12);
        assert_eq!(data.set.conditions.pressure_gpa, 1.5);
        assert_eq!(data.stats.radius_min, 0.977);
        assert_eq!(data.stats.d_max, 45.0);
    }

    #[test]
    fn missing_error_column_fails_before_fitting() {
        let csv = "element,radius,d,t_c,p_gpa\nLa,1.16,0.8,1000,1.5\n";
        let err = read_partition_csv(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("`1s`"), "{err}");
    }

    #[test]
    fn non_positive_coefficient_reports_line() {
        let csv = "element,radius,d,sigma,t_c,p_gpa\nLa,1.16,0.8,0.1,1000,1.5\nCe,1.143,-2,0.1,1000,1.5\n";
        let err = read_partition_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn header_only_is_insufficient() {
        let csv = "element,radius,d,sigma,t_c,p_gpa\n";
        assert_eq!(read_partition_csv(csv.as_bytes()).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn ratio_table_skips_empty_cells_per_sample() {
        let csv = "radii,zrn-1,zrn-2\n0.977,300,280\n1.004,120,\n1.053,35,33\n";
        let series = read_ratio_table(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].sample, "zrn-1");
        assert_eq!(series[0].ratios, vec![300.0, 120.0, 35.0]);
        assert_eq!(series[1].radii, vec![0.977, 1.053]);
    }

    #[test]
    fn ratio_table_requires_radii() {
        let csv = "r,zrn-1\n0.977,300\n";
        let err = read_ratio_table(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("`radii`"));
    }
}
