//! Model selection (unconstrained vs constrained) using BIC.
//!
//! With `ModelSpec::Both`, each model is fitted and scored with
//! `BIC = χ² + k·ln n`. Rules:
//! 1. Skip models without residual degrees of freedom (`n < k + 1`)
//! 2. A model whose fit fails is skipped (the reason is kept)
//! 3. Choose the lowest BIC; ties go to the model with fewer parameters

use crate::domain::{LatticeFit, ModelKind, ModelSpec, SampleSet};
use crate::error::FitError;
use crate::fit::LatticeStrainFitter;

/// Extra observations beyond the parameter count needed to compare models.
const MIN_N_BUFFER: usize = 1;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: LatticeFit,
    /// Every successful fit, simplest model first.
    pub fits: Vec<LatticeFit>,
    /// Models that were skipped and why.
    pub skipped: Vec<(ModelKind, String)>,
}

/// Fit the requested model(s) and select the best.
pub fn fit_and_select(
    set: &SampleSet,
    spec: ModelSpec,
    fitter: &LatticeStrainFitter,
) -> Result<FitSelection, FitError> {
    let single = match spec {
        ModelSpec::Unconstrained => Some(ModelKind::Unconstrained),
        ModelSpec::Constrained => Some(ModelKind::Constrained),
        ModelSpec::Both => None,
    };
    if let Some(kind) = single {
        let fit = fitter.fit(set, kind)?;
        return Ok(FitSelection {
            best: fit.clone(),
            fits: vec![fit],
            skipped: Vec::new(),
        });
    }

    let n = set.len();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    let mut first_error = None;

    for kind in [ModelKind::Constrained, ModelKind::Unconstrained] {
        let k = kind.param_count();
        if n < k + MIN_N_BUFFER {
            skipped.push((kind, format!("underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER)));
            continue;
        }
        match fitter.fit(set, kind) {
            Ok(fit) => fits.push(fit),
            // Input problems affect both models equally.
            Err(err @ FitError::InvalidInput(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(model = kind.display_name(), "fit skipped: {err}");
                skipped.push((kind, err.to_string()));
                first_error.get_or_insert(err);
            }
        }
    }

    if fits.is_empty() {
        return Err(first_error.unwrap_or_else(|| {
            FitError::Insufficient(format!("{n} observations are not enough to compare models"))
        }));
    }

    let best = select_by_bic(&fits).clone();
    tracing::info!(model = best.model.display_name(), bic = best.quality.bic, "model selected");
    Ok(FitSelection { best, fits, skipped })
}

/// Lowest BIC; `fits` is ordered simplest first, so ties keep the simpler model.
fn select_by_bic(fits: &[LatticeFit]) -> &LatticeFit {
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.quality.bic < best.quality.bic {
            best = f;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conditions, PartitionSample, PhysicalConstants};
    use crate::models::LatticeModel;

    fn set(model: &LatticeModel, params: &[f64], radii: &[f64]) -> SampleSet {
        let samples = radii
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let d = model.predict(r, params);
                PartitionSample {
                    element: format!("E{i}"),
                    radius: r,
                    d,
                    sigma: 0.01 * d,
                }
            })
            .collect();
        SampleSet {
            samples,
            conditions: Conditions {
                temperature_k: 1173.15,
                pressure_gpa: 1.0,
            },
        }
    }

    const RADII: [f64; 7] = [0.977, 0.994, 1.015, 1.040, 1.066, 1.109, 1.160];

    #[test]
    fn constrained_data_selects_constrained_model() {
        let constants = PhysicalConstants::default();
        let model = LatticeModel::constrained(&constants, constants.q1, 1173.15);
        let data = set(&model, &[60.0, 0.96], &RADII);
        let selection = fit_and_select(&data, ModelSpec::Both, &LatticeStrainFitter::new(constants)).unwrap();
        assert_eq!(selection.fits.len(), 2);
        assert_eq!(selection.best.model, ModelKind::Constrained);
    }

    #[test]
    fn stiffer_data_selects_unconstrained_model() {
        // E far from the value implied by Q1 at this r0.
        let data = set(&LatticeModel::Unconstrained, &[60.0, 0.96, 50.0], &RADII);
        let fitter = LatticeStrainFitter::new(PhysicalConstants::default()).with_max_evals(200);
        let selection = fit_and_select(&data, ModelSpec::Both, &fitter).unwrap();
        assert_eq!(selection.best.model, ModelKind::Unconstrained);
    }

    #[test]
    fn underdetermined_models_are_skipped() {
        let data = set(&LatticeModel::Unconstrained, &[60.0, 0.96, 30.0], &RADII[..3]);
        let fitter = LatticeStrainFitter::new(PhysicalConstants::default());
        let selection = fit_and_select(&data, ModelSpec::Both, &fitter).unwrap();
        assert_eq!(selection.fits.len(), 1);
        assert_eq!(selection.best.model, ModelKind::Constrained);
        assert_eq!(selection.skipped[0].0, ModelKind::Unconstrained);
    }

    #[test]
    fn single_model_spec_fits_only_that_model() {
        let data = set(&LatticeModel::Unconstrained, &[60.0, 0.96, 30.0], &RADII);
        let fitter = LatticeStrainFitter::new(PhysicalConstants::default());
        let selection = fit_and_select(&data, ModelSpec::Unconstrained, &fitter).unwrap();
        assert_eq!(selection.fits.len(), 1);
        assert_eq!(selection.best.model, ModelKind::Unconstrained);
    }

    #[test]
    fn two_points_cannot_compare_models() {
        let data = set(&LatticeModel::Unconstrained, &[60.0, 0.96, 30.0], &RADII[..2]);
        let fitter = LatticeStrainFitter::new(PhysicalConstants::default());
        let err = fit_and_select(&data, ModelSpec::Both, &fitter).unwrap_err();
        assert!(matches!(err, FitError::Insufficient(_)));
    }
}
