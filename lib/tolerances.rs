//! Fixed numerical tolerances separating floating-point noise from genuinely
//! wrong results.

use serde::Deserialize;
use crate::error::{ AvalancheError, AvalancheResult };

/// Tolerances applied by the consistency checks.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Hermiticity of operators, relative to their largest element.
    pub hermitian: f64,
    /// Deviation of an evolved state's norm from 1.
    pub norm: f64,
    /// Imaginary part of an expectation value of a Hermitian operator.
    pub imag: f64,
    /// Excursion of an occupation probability outside `[0, 1]`.
    pub probability: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            hermitian: 1e-10,
            norm: 1e-8,
            imag: 1e-10,
            probability: 1e-8,
        }
    }
}

impl Tolerances {
    /// Require every tolerance to be finite and non-negative.
    pub fn validated(self) -> AvalancheResult<Self> {
        [
            ("hermitian", self.hermitian),
            ("norm", self.norm),
            ("imag", self.imag),
            ("probability", self.probability),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite() || *value < 0.0)
        .map_or(Ok(self), |(name, value)| {
            Err(AvalancheError::InvalidSetting { name, value })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_or_nan_tolerances_are_rejected() {
        assert!(Tolerances::default().validated().is_ok());
        let zero = Tolerances { hermitian: 0.0, ..Tolerances::default() };
        assert!(zero.validated().is_ok());
        let neg = Tolerances { norm: -1e-8, ..Tolerances::default() };
        assert!(matches!(
            neg.validated(),
            Err(AvalancheError::InvalidSetting { name: "norm", .. }),
        ));
        let nan = Tolerances { probability: f64::NAN, ..Tolerances::default() };
        assert!(matches!(
            nan.validated(),
            Err(AvalancheError::InvalidSetting { name: "probability", .. }),
        ));
    }
}
