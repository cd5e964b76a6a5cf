//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitConfig, LatticeFit, ModelKind, ParamEstimate, TemperatureTable};
use crate::fit::FitSelection;
use crate::io::PartitionData;
use crate::report::ElementResidual;

/// Format the full run summary (dataset stats + fit diagnostics + chosen model).
pub fn format_run_summary(data: &PartitionData, selection: &FitSelection, config: &FitConfig) -> String {
    let mut out = String::new();
    let c = &data.set.conditions;

    out.push_str("=== lsm - lattice strain fit ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Conditions: T={:.2} K ({:.1} °C) | P={:.2} GPa\n",
        c.temperature_k, data.temperature_c, c.pressure_gpa
    ));
    out.push_str(&format!(
        "Points: n={} | radius=[{:.3}, {:.3}] Å | D=[{:.4e}, {:.4e}]\n",
        data.stats.n_points, data.stats.radius_min, data.stats.radius_max, data.stats.d_min, data.stats.d_max
    ));
    out.push_str(&format!("Sigma mode: {:?} | Q: {}\n", config.sigma_mode, config.q.label()));

    out.push_str("\nModel diagnostics:\n");
    for fit in &selection.fits {
        let chosen = if fit.model == selection.best.model { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<14} chi2={:.4} red.chi2={} BIC={:.3} nfev={}\n",
            fit.model.display_name(),
            fit.quality.chi2,
            fit.quality
                .reduced_chi2
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "n/a".to_string()),
            fit.quality.bic,
            fit.quality.nfev,
        ));
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }

    out.push_str(&format!("\nChosen model: {}\n", selection.best.model.display_name()));
    for line in format_annotation(&selection.best).lines() {
        out.push_str(&format!("- {line}\n"));
    }
    out.push_str(&format!("- {}\n", format_pressure(c.pressure_gpa)));
    if let Some(q) = selection.best.q_joules {
        out.push_str(&format!("- Q = {:.0}e-21 J\n", q * 1e21));
    }
    out.push('\n');

    out
}

/// Annotation block shown on plots: D0, r0 and E with one-sigma errors.
pub fn format_annotation(fit: &LatticeFit) -> String {
    format!(
        "D0 = {}\nr0 = {} Å\nE = {} GPa",
        fmt_pm(fit.d0, 2),
        fmt_pm(fit.r0, 3),
        fmt_pm(fit.modulus_gpa, 0)
    )
}

/// Pressure label.
pub fn format_pressure(pressure_gpa: f64) -> String {
    format!("{pressure_gpa:.0} GPa")
}

/// One-line label of a fit, used as a plot legend.
pub fn format_model_label(fit: &LatticeFit) -> String {
    match fit.model {
        ModelKind::Unconstrained => "lattice strain fit (free E)".to_string(),
        ModelKind::Constrained => format!(
            "lattice strain fit (Q = {:.0}e-21 J)",
            fit.q_joules.unwrap_or(f64::NAN) * 1e21
        ),
    }
}

/// Per-element residual table.
pub fn format_residuals(rows: &[ElementResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} {:>7} {:>12} {:>12} {:>12} {:>8}\n",
        "element", "radius", "D_obs", "D_fit", "residual", "pull"
    ));
    out.push_str(&format!(
        "{:-<8} {:-<7} {:-<12} {:-<12} {:-<12} {:-<8}\n",
        "", "", "", "", "", ""
    ));
    for r in rows {
        let pull = r.pull.map(|p| format!("{p:>8.2}")).unwrap_or_else(|| format!("{:>8}", "n/a"));
        out.push_str(&format!(
            "{:<8} {:>7.3} {:>12.4e} {:>12.4e} {:>12.4e} {pull}\n",
            truncate(&r.sample.element, 8),
            r.sample.radius,
            r.sample.d,
            r.d_fit,
            r.residual,
        ));
    }
    out
}

/// Temperature results table (failed samples listed with their reason).
pub fn format_temperature_table(table: &TemperatureTable, calibration_label: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== lsm - temperature estimates ({calibration_label}) ===\n"));
    out.push_str(&format!(
        "{:<16} {:>10} {:>10} {:>8} {:>4}\n",
        "sample", "T [K]", "T [°C]", "±T", "n"
    ));
    out.push_str(&format!("{:-<16} {:-<10} {:-<10} {:-<8} {:-<4}\n", "", "", "", "", ""));
    for row in &table.rows {
        match &row.outcome {
            Ok(est) => out.push_str(&format!(
                "{:<16} {:>10.1} {:>10.1} {:>8} {:>4}\n",
                truncate(&row.sample, 16),
                est.temperature_k,
                est.temperature_c(),
                est.stderr_k.map(|s| format!("{s:.1}")).unwrap_or_else(|| "n/a".to_string()),
                est.n,
            )),
            Err(msg) => out.push_str(&format!("{:<16} FAILED: {msg}\n", truncate(&row.sample, 16))),
        }
    }
    let failed = table.failures().count();
    if failed > 0 {
        out.push_str(&format!("\n{failed} of {} sample(s) failed.\n", table.rows.len()));
    }
    out
}

fn fmt_pm(p: ParamEstimate, decimals: usize) -> String {
    match p.stderr {
        Some(s) => format!("{:.*} ± {:.*}", decimals, p.value, decimals, s),
        None => format!("{:.*} ± n/a", decimals, p.value),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conditions, FitQuality, SigmaMode, TemperatureEstimate, TemperatureRow};

    fn fit() -> LatticeFit {
        LatticeFit {
            model: ModelKind::Unconstrained,
            d0: ParamEstimate::new(46.2871, Some(5.1234)),
            r0: ParamEstimate::new(0.95612, Some(0.01234)),
            modulus_gpa: ParamEstimate::new(419.6, None),
            raw_params: vec![46.2871, 0.95612, 23.88],
            covariance: None,
            quality: FitQuality {
                chi2: 0.0,
                reduced_chi2: None,
                bic: 3.3,
                n: 3,
                nfev: 7,
            },
            conditions: Conditions {
                temperature_k: 1273.15,
                pressure_gpa: 1.5,
            },
            q_joules: None,
            sigma_mode: SigmaMode::Absolute,
        }
    }

    #[test]
    fn annotation_matches_plot_layout() {
        assert_eq!(
            format_annotation(&fit()),
            "D0 = 46.29 ± 5.12\nr0 = 0.956 ± 0.012 Å\nE = 420 ± n/a GPa"
        );
        assert_eq!(format_pressure(1.5), "2 GPa");
    }

    #[test]
    fn temperature_table_lists_failures() {
        let table = TemperatureTable {
            rows: vec![
                TemperatureRow {
                    sample: "zrn-1".to_string(),
                    outcome: Ok(TemperatureEstimate {
                        sample: "zrn-1".to_string(),
                        temperature_k: 1023.15,
                        stderr_k: Some(12.34),
                        n: 7,
                        nfev: 6,
                    }),
                },
                TemperatureRow {
                    sample: "zrn-2".to_string(),
                    outcome: Err("insufficient data".to_string()),
                },
            ],
        };
        let text = format_temperature_table(&table, "Streicher et al. (2022)");
        assert!(text.contains("zrn-1"));
        assert!(text.contains("750.0"));
        assert!(text.contains("12.3"));
        assert!(text.contains("zrn-2            FAILED: insufficient data"));
        assert!(text.contains("1 of 2 sample(s) failed."));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
