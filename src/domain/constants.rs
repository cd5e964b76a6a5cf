//! Physical constants and literature calibrations.
//!
//! Everything the model formulas need beyond the fitted parameters lives here,
//! so that choosing between literature values is a runtime parameter rather
//! than a code edit.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Constants table used by the lattice strain models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Avogadro constant (1/mol).
    pub avogadro: f64,
    /// Molar gas constant (J/(mol·K)).
    pub gas_constant: f64,
    /// Host site size term added to `r0` in the constrained exponent (Å).
    pub site_radius: f64,
    /// Fixed optimal radius used by the temperature estimator (Å).
    pub reference_radius: f64,
    /// Elastic constant Q1 (J).
    pub q1: f64,
    /// Elastic constant Q2 (J).
    pub q2: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            avogadro: 6.022_140_86e23,
            gas_constant: 8.314_472,
            site_radius: 1.38,
            reference_radius: 0.94,
            q1: 6489e-21,
            q2: 7687e-21,
        }
    }
}

impl PhysicalConstants {
    /// Resolve a Q selection to joules.
    pub fn q_joules(&self, q: QConstant) -> f64 {
        match q {
            QConstant::Q1 => self.q1,
            QConstant::Q2 => self.q2,
            QConstant::Custom(joules) => joules,
        }
    }

    /// `R·T/N_A · 1e21`: converts the fitted strain parameter `E` of the
    /// unconstrained model (radii in Å) into an effective modulus in GPa.
    pub fn modulus_conversion(&self, temperature_k: f64) -> f64 {
        self.gas_constant * temperature_k / self.avogadro * 1e21
    }

    /// `−4π·N_A·Q/R`, the temperature-free part of the constrained exponent.
    pub fn strain_coefficient(&self, q_joules: f64) -> f64 {
        -4.0 * std::f64::consts::PI * self.avogadro * q_joules / self.gas_constant
    }
}

/// Which literature elastic constant constrains the modulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QConstant {
    Q1,
    Q2,
    /// Explicit value in joules.
    Custom(f64),
}

impl QConstant {
    pub fn label(self) -> String {
        match self {
            QConstant::Q1 => "Q1".to_string(),
            QConstant::Q2 => "Q2".to_string(),
            QConstant::Custom(j) => format!("Q={j:.4e} J"),
        }
    }

    /// Cycle Q1 -> Q2 -> Q1 (custom values go back to Q1).
    pub fn toggle(self) -> Self {
        match self {
            QConstant::Q1 => QConstant::Q2,
            QConstant::Q2 | QConstant::Custom(_) => QConstant::Q1,
        }
    }
}

/// Named Q presets as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QPreset {
    Q1,
    Q2,
}

impl QPreset {
    /// Combine a preset with an optional explicit override (in units of 1e-21 J).
    pub fn resolve(self, custom_e21: Option<f64>) -> QConstant {
        match custom_e21 {
            Some(v) => QConstant::Custom(v * 1e-21),
            None => match self {
                QPreset::Q1 => QConstant::Q1,
                QPreset::Q2 => QConstant::Q2,
            },
        }
    }
}

/// Empirical factor `exp(a/T − b)` of the temperature estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub a: f64,
    pub b: f64,
}

impl Calibration {
    pub fn factor(&self, temperature_k: f64) -> f64 {
        (self.a / temperature_k - self.b).exp()
    }
}

/// Published calibrations of the zircon/melt temperature factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationPreset {
    /// Streicher et al. (2022).
    #[value(name = "streicher2022")]
    Streicher2022,
    /// Rubatto & Hermann (2007).
    #[value(name = "rubatto-hermann2007")]
    RubattoHermann2007,
}

impl CalibrationPreset {
    pub fn calibration(self) -> Calibration {
        match self {
            CalibrationPreset::Streicher2022 => Calibration { a: 13594.0, b: 7.1266 },
            CalibrationPreset::RubattoHermann2007 => Calibration { a: 22420.0, b: 14.221 },
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CalibrationPreset::Streicher2022 => "Streicher et al. (2022)",
            CalibrationPreset::RubattoHermann2007 => "Rubatto & Hermann (2007)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q_presets_resolve_to_joules() {
        let c = PhysicalConstants::default();
        assert_eq!(c.q_joules(QConstant::Q1), 6489e-21);
        assert_eq!(c.q_joules(QConstant::Q2), 7687e-21);
        assert_eq!(QPreset::Q2.resolve(None), QConstant::Q2);
        assert_eq!(QPreset::Q1.resolve(Some(7000.0)), QConstant::Custom(7000.0 * 1e-21));
    }

    #[test]
    fn modulus_conversion_at_1000k() {
        // R*T/N_A*1e21 = 8.314472e3 / 6.02214086e23 * 1e21 ~ 13.806
        let f = PhysicalConstants::default().modulus_conversion(1000.0);
        assert!((f - 13.806_5).abs() < 1e-3, "got {f}");
    }

    #[test]
    fn calibration_factor_matches_closed_form() {
        let cal = CalibrationPreset::Streicher2022.calibration();
        let t = 1000.0;
        assert!((cal.factor(t) - (13.594_f64 - 7.1266).exp()).abs() < 1e-9);
    }
}
