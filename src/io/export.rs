//! CSV exports.
//!
//! - temperature estimates: one row per sample, in input order. Failed samples
//!   keep their row with an empty temperature and the reason in `status`.
//! - partition and ratio tables in the same layouts that `ingest` reads, so
//!   synthetic data can be fed straight back in.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{RatioSeries, SampleSet, TemperatureTable};
use crate::error::AppError;
use crate::io::ingest::KELVIN_OFFSET;

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(4, format!("Failed to create CSV '{}': {e}", path.display())))
}

fn csv_err(e: csv::Error) -> AppError {
    AppError::new(4, format!("Failed to write CSV: {e}"))
}

/// Write the temperature table to a CSV file.
pub fn write_temperature_csv(path: &Path, table: &TemperatureTable) -> Result<(), AppError> {
    write_temperature_table(create(path)?, table)
}

/// Write the temperature table as CSV to any writer.
pub fn write_temperature_table<W: Write>(out: W, table: &TemperatureTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["sample", "temperature_k", "temperature_c", "err_t", "status"])
        .map_err(csv_err)?;

    for row in &table.rows {
        let written = match &row.outcome {
            Ok(est) => writer.write_record([
                row.sample.clone(),
                format!("{:.2}", est.temperature_k),
                format!("{:.2}", est.temperature_c()),
                est.stderr_k.map(|s| format!("{s:.2}")).unwrap_or_default(),
                "ok".to_string(),
            ]),
            Err(msg) => writer.write_record([
                row.sample.clone(),
                String::new(),
                String::new(),
                String::new(),
                format!("failed: {msg}"),
            ]),
        };
        written.map_err(csv_err)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write a partition table (`element,ri,di,1s,T [C],P [GPa]`).
pub fn write_partition_csv(path: &Path, set: &SampleSet) -> Result<(), AppError> {
    write_partition_table(create(path)?, set)
}

pub fn write_partition_table<W: Write>(out: W, set: &SampleSet) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["element", "ri", "di", "1s", "T [C]", "P [GPa]"])
        .map_err(csv_err)?;
    let t_c = set.conditions.temperature_k - KELVIN_OFFSET;
    for s in &set.samples {
        writer
            .write_record([
                s.element.clone(),
                format!("{:.3}", s.radius),
                format!("{:.6e}", s.d),
                format!("{:.6e}", s.sigma),
                format!("{t_c:.2}"),
                format!("{:.3}", set.conditions.pressure_gpa),
            ])
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write a ratio table (`radii` plus one column per series).
///
/// Series are aligned by radius; a series without a value at some radius
/// leaves that cell empty.
pub fn write_ratio_csv(path: &Path, series: &[RatioSeries]) -> Result<(), AppError> {
    write_ratio_table(create(path)?, series)
}

pub fn write_ratio_table<W: Write>(out: W, series: &[RatioSeries]) -> Result<(), AppError> {
    let mut radii: Vec<f64> = series.iter().flat_map(|s| s.radii.iter().copied()).collect();
    radii.sort_by(|a, b| b.total_cmp(a));
    radii.dedup();

    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["radii".to_string()];
    header.extend(series.iter().map(|s| s.sample.clone()));
    writer.write_record(&header).map_err(csv_err)?;

    for &r in &radii {
        let mut record = vec![format!("{r:.3}")];
        for s in series {
            let cell = s
                .radii
                .iter()
                .position(|&x| x == r)
                .map(|i| format!("{:.6e}", s.ratios[i]))
                .unwrap_or_default();
            record.push(cell);
        }
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TemperatureEstimate, TemperatureRow};

    #[test]
    fn failed_rows_stay_in_the_export() {
        let table = TemperatureTable {
            rows: vec![
                TemperatureRow {
                    sample: "a".to_string(),
                    outcome: Ok(TemperatureEstimate {
                        sample: "a".to_string(),
                        temperature_k: 1073.15,
                        stderr_k: Some(4.256),
                        n: 6,
                        nfev: 5,
                    }),
                },
                TemperatureRow {
                    sample: "b, rim".to_string(),
                    outcome: Err("insufficient data: 1 usable ratio".to_string()),
                },
            ],
        };
        let mut buf = Vec::new();
        write_temperature_table(&mut buf, &table).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample,temperature_k,temperature_c,err_t,status");
        assert_eq!(lines[1], "a,1073.15,800.00,4.26,ok");
        assert_eq!(lines[2], "\"b, rim\",,,,failed: insufficient data: 1 usable ratio");
    }

    #[test]
    fn written_tables_read_back() {
        use crate::io::{read_partition_csv, read_ratio_table};

        let set = SampleSet {
            samples: vec![crate::domain::PartitionSample {
                element: "Lu".to_string(),
                radius: 0.977,
                d: 45.0,
                sigma: 3.0,
            }],
            conditions: crate::domain::Conditions {
                temperature_k: 1273.15,
                pressure_gpa: 1.5,
            },
        };
        let mut buf = Vec::new();
        write_partition_table(&mut buf, &set).unwrap();
        let back = read_partition_csv(buf.as_slice()).unwrap();
        assert_eq!(back.set.samples[0].element, "Lu");
        assert!((back.set.conditions.temperature_k - 1273.15).abs() < 1e-9);

        let series = vec![
            RatioSeries {
                sample: "a".to_string(),
                radii: vec![0.977, 1.004],
                ratios: vec![300.0, 120.0],
            },
            RatioSeries {
                sample: "b".to_string(),
                radii: vec![1.004],
                ratios: vec![110.0],
            },
        ];
        let mut buf = Vec::new();
        write_ratio_table(&mut buf, &series).unwrap();
        let back = read_ratio_table(buf.as_slice()).unwrap();
        assert_eq!(back[0].ratios, vec![120.0, 300.0]);
        assert_eq!(back[1].radii, vec![1.004]);
    }
}
