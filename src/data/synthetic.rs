//! Synthetic partition-coefficient data.
//!
//! Used for demos (`lsm synth`) and tests: draw a lattice strain curve with
//! known parameters, sample it at REE radii and add seeded Gaussian noise.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{
    Calibration, Conditions, ModelKind, PartitionSample, PhysicalConstants, QConstant, RatioSeries, SampleSet,
};
use crate::error::AppError;
use crate::models::LatticeModel;

/// Eightfold-coordinated trivalent REE + Y radii (Shannon 1976), in Å.
pub const REE_VIII_RADII: [(&str, f64); 15] = [
    ("La", 1.160),
    ("Ce", 1.143),
    ("Pr", 1.126),
    ("Nd", 1.109),
    ("Sm", 1.079),
    ("Eu", 1.066),
    ("Gd", 1.053),
    ("Tb", 1.040),
    ("Dy", 1.027),
    ("Y", 1.019),
    ("Ho", 1.015),
    ("Er", 1.004),
    ("Tm", 0.994),
    ("Yb", 0.985),
    ("Lu", 0.977),
];

/// Parameters of a synthetic partition set.
#[derive(Debug, Clone)]
pub struct PartitionSynth {
    pub model: ModelKind,
    pub d0: f64,
    pub r0: f64,
    /// Strain parameter in fit units (unconstrained model only).
    pub e_fit: f64,
    /// Elastic constant (constrained model only).
    pub q: QConstant,
    pub conditions: Conditions,
    /// Relative one-sigma noise applied to each value.
    pub noise_rel: f64,
    /// Relative uncertainty written to the sigma column.
    pub sigma_rel: f64,
    pub seed: u64,
}

impl Default for PartitionSynth {
    fn default() -> Self {
        Self {
            model: ModelKind::Unconstrained,
            d0: 150.0,
            r0: 0.95,
            e_fit: 30.0,
            q: QConstant::Q1,
            conditions: Conditions {
                temperature_k: 1273.15,
                pressure_gpa: 1.0,
            },
            noise_rel: 0.05,
            sigma_rel: 0.05,
            seed: 42,
        }
    }
}

fn noise(seed: u64) -> Result<(StdRng, Normal<f64>), AppError> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    Ok((StdRng::seed_from_u64(seed), normal))
}

/// Multiplicative Gaussian noise, kept strictly positive.
fn perturb(value: f64, rel: f64, z: f64) -> f64 {
    (value * (1.0 + rel * z)).max(value * 1e-3)
}

/// Generate a partition set over the REE radii.
pub fn generate_partition_set(spec: &PartitionSynth, constants: &PhysicalConstants) -> Result<SampleSet, AppError> {
    if !(spec.noise_rel.is_finite() && spec.noise_rel >= 0.0 && spec.sigma_rel.is_finite() && spec.sigma_rel >= 0.0) {
        return Err(AppError::new(2, "Noise and sigma levels must be finite and >= 0."));
    }
    if !(spec.conditions.temperature_k.is_finite() && spec.conditions.temperature_k > 0.0) {
        return Err(AppError::new(2, "Synthetic temperature must be > 0 K."));
    }

    let (model, params) = match spec.model {
        ModelKind::Unconstrained => (LatticeModel::Unconstrained, vec![spec.d0, spec.r0, spec.e_fit]),
        ModelKind::Constrained => (
            LatticeModel::constrained(constants, constants.q_joules(spec.q), spec.conditions.temperature_k),
            vec![spec.d0, spec.r0],
        ),
    };

    let (mut rng, normal) = noise(spec.seed)?;
    let samples = REE_VIII_RADII
        .iter()
        .map(|&(element, radius)| {
            let truth = model.predict(radius, &params);
            PartitionSample {
                element: element.to_string(),
                radius,
                d: perturb(truth, spec.noise_rel, normal.sample(&mut rng)),
                sigma: spec.sigma_rel * truth,
            }
        })
        .collect();

    Ok(SampleSet {
        samples,
        conditions: spec.conditions,
    })
}

/// Generate a ratio table: one series per `(sample, temperature_k)` pair.
pub fn generate_ratio_table(
    temperatures: &[(String, f64)],
    constants: &PhysicalConstants,
    q: QConstant,
    calibration: Calibration,
    noise_rel: f64,
    seed: u64,
) -> Result<Vec<RatioSeries>, AppError> {
    if !(noise_rel.is_finite() && noise_rel >= 0.0) {
        return Err(AppError::new(2, "Noise level must be finite and >= 0."));
    }
    let model = LatticeModel::temperature(constants, constants.q_joules(q), calibration);
    let (mut rng, normal) = noise(seed)?;

    temperatures
        .iter()
        .map(|(name, t)| {
            if !(t.is_finite() && *t > 0.0) {
                return Err(AppError::new(2, format!("{name}: temperature must be > 0 K")));
            }
            let radii: Vec<f64> = REE_VIII_RADII.iter().map(|&(_, r)| r).collect();
            let ratios = radii
                .iter()
                .map(|&r| perturb(model.predict(r, &[*t]), noise_rel, normal.sample(&mut rng)))
                .collect();
            Ok(RatioSeries {
                sample: name.clone(),
                radii,
                ratios,
            })
        })
        .collect()
}
