//! Reporting utilities: per-element residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{LatticeFit, PartitionSample, PhysicalConstants};
use crate::error::AppError;
use crate::fit::model_for_fit;

/// Observed vs fitted value for one element.
#[derive(Debug, Clone)]
pub struct ElementResidual {
    pub sample: PartitionSample,
    pub d_fit: f64,
    pub residual: f64,
    /// `residual / σ`, when σ > 0.
    pub pull: Option<f64>,
}

/// Compute fitted values and residuals for each element.
pub fn compute_residuals(
    samples: &[PartitionSample],
    fit: &LatticeFit,
    constants: &PhysicalConstants,
) -> Result<Vec<ElementResidual>, AppError> {
    let model = model_for_fit(fit, constants);
    let mut out = Vec::with_capacity(samples.len());
    for s in samples {
        let d_fit = model.predict(s.radius, &fit.raw_params);
        if !d_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        let residual = s.d - d_fit;
        out.push(ElementResidual {
            sample: s.clone(),
            d_fit,
            residual,
            pull: (s.sigma > 0.0).then(|| residual / s.sigma),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conditions, FitQuality, ModelKind, ParamEstimate, SigmaMode};

    #[test]
    fn residuals_against_known_curve() {
        let fit = LatticeFit {
            model: ModelKind::Unconstrained,
            d0: ParamEstimate::new(100.0, None),
            r0: ParamEstimate::new(1.0, None),
            modulus_gpa: ParamEstimate::new(0.0, None),
            raw_params: vec![100.0, 1.0, 0.0],
            covariance: None,
            quality: FitQuality {
                chi2: 0.0,
                reduced_chi2: None,
                bic: 0.0,
                n: 2,
                nfev: 1,
            },
            conditions: Conditions {
                temperature_k: 1000.0,
                pressure_gpa: 1.0,
            },
            q_joules: None,
            sigma_mode: SigmaMode::Absolute,
        };
        let samples = vec![
            PartitionSample {
                element: "A".to_string(),
                radius: 0.9,
                d: 104.0,
                sigma: 2.0,
            },
            PartitionSample {
                element: "B".to_string(),
                radius: 1.1,
                d: 99.0,
                sigma: 0.0,
            },
        ];
        // E = 0: the curve is flat at D0.
        let res = compute_residuals(&samples, &fit, &PhysicalConstants::default()).unwrap();
        assert!((res[0].residual - 4.0).abs() < 1e-12);
        assert_eq!(res[0].pull, Some(2.0));
        assert!((res[1].residual + 1.0).abs() < 1e-12);
        assert_eq!(res[1].pull, None);
    }
}
