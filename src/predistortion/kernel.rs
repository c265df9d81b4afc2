// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linear time-invariant correction kernels.

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// Threshold below which a leading coefficient is treated as zero.
const LEADING_COEFF_EPS: f64 = 1e-12;

/// A predistortion kernel.
///
/// `Fir` is a causal convolution with `taps`. `Iir` is the rational
/// transfer function `B(z) / A(z)` in direct form, with `b` the numerator
/// and `a` the denominator coefficients (`a[0]` normalizes the output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Fir { taps: Vec<f64> },
    Iir { b: Vec<f64>, a: Vec<f64> },
}

impl Kernel {
    /// Pass-through kernel.
    pub fn identity() -> Self {
        Kernel::Fir { taps: vec![1.0] }
    }

    /// Single-pole correction for a line whose step response is
    /// `1 + amplitude * exp(-t / tau)`.
    ///
    /// The resulting IIR filter has unit DC gain. Positive `amplitude`
    /// corrects overshoot, negative corrects undershoot.
    ///
    /// Ref: Rol et al., Appl. Phys. Lett. 116, 054001 (2020).
    ///
    /// # Errors
    ///
    /// `InvalidShapeParameter` for non-positive `tau_ns` or
    /// `sample_rate_ghz`, or `amplitude <= -1`.
    pub fn exponential(amplitude: f64, tau_ns: f64, sample_rate_ghz: f64) -> Result<Self> {
        if !(tau_ns > 0.0 && tau_ns.is_finite()) {
            return Err(PulseError::shape("tau", format!("must be positive, got {tau_ns}")).into());
        }
        if !(sample_rate_ghz > 0.0 && sample_rate_ghz.is_finite()) {
            return Err(PulseError::shape(
                "sample_rate",
                format!("must be positive, got {sample_rate_ghz}"),
            )
            .into());
        }
        if !(amplitude > -1.0 && amplitude.is_finite()) {
            return Err(PulseError::shape(
                "amplitude",
                format!("must be finite and > -1, got {amplitude}"),
            )
            .into());
        }

        let alpha = 1.0 - (-1.0 / (sample_rate_ghz * tau_ns * (1.0 + amplitude))).exp();
        let k = if amplitude >= 0.0 {
            amplitude / (1.0 + amplitude - alpha)
        } else {
            amplitude / (1.0 + amplitude) / (1.0 - alpha)
        };
        Ok(Kernel::Iir {
            b: vec![1.0 - k + k * alpha, -(1.0 - k) * (1.0 - alpha)],
            a: vec![1.0, -(1.0 - alpha)],
        })
    }

    /// Exact inverse transfer function.
    ///
    /// FIR taps become the denominator of an all-pole IIR; an IIR kernel
    /// swaps numerator and denominator. The inverse is only stable when the
    /// original kernel is minimum-phase.
    ///
    /// # Errors
    ///
    /// `InvalidShapeParameter` if the new leading denominator coefficient
    /// is zero.
    pub fn inverse(&self) -> Result<Kernel> {
        self.validate()?;
        let (b, a) = match self {
            Kernel::Fir { taps } => (vec![1.0], taps.clone()),
            Kernel::Iir { b, a } => (a.clone(), b.clone()),
        };
        if a[0].abs() < LEADING_COEFF_EPS {
            return Err(PulseError::shape(
                "kernel",
                "leading numerator coefficient is zero; inverse is not causal",
            )
            .into());
        }
        Ok(Kernel::Iir { b, a })
    }

    /// Check coefficients: non-empty, finite, `a[0] != 0`.
    pub fn validate(&self) -> Result<()> {
        let check = |name: &str, coeffs: &[f64]| -> Result<()> {
            if coeffs.is_empty() {
                return Err(PulseError::shape(name, "must not be empty").into());
            }
            if let Some(i) = coeffs.iter().position(|c| !c.is_finite()) {
                return Err(
                    PulseError::shape(name, format!("coefficient {i} is not finite")).into(),
                );
            }
            Ok(())
        };
        match self {
            Kernel::Fir { taps } => check("taps", taps),
            Kernel::Iir { b, a } => {
                check("b", b)?;
                check("a", a)?;
                if a[0].abs() < LEADING_COEFF_EPS {
                    return Err(PulseError::shape("a", "a[0] must be non-zero").into());
                }
                Ok(())
            }
        }
    }

    /// Steady-state gain for a constant input.
    pub fn dc_gain(&self) -> f64 {
        match self {
            Kernel::Fir { taps } => taps.iter().sum(),
            Kernel::Iir { b, a } => b.iter().sum::<f64>() / a.iter().sum::<f64>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let k = Kernel::identity();
        assert!(k.validate().is_ok());
        assert_relative_eq!(k.dc_gain(), 1.0);
    }

    #[test]
    fn test_exponential_unit_dc_gain() {
        for amp in [0.2, -0.15, 0.0] {
            let k = Kernel::exponential(amp, 30.0, 2.4).unwrap();
            assert_relative_eq!(k.dc_gain(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exponential_rejects_bad_params() {
        assert!(Kernel::exponential(0.1, 0.0, 1.0).is_err());
        assert!(Kernel::exponential(0.1, 10.0, -1.0).is_err());
        assert!(Kernel::exponential(-1.0, 10.0, 1.0).is_err());
    }

    #[test]
    fn test_inverse_of_fir() {
        let k = Kernel::Fir {
            taps: vec![1.0, 0.3, -0.1],
        };
        assert_eq!(
            k.inverse().unwrap(),
            Kernel::Iir {
                b: vec![1.0],
                a: vec![1.0, 0.3, -0.1],
            }
        );
    }

    #[test]
    fn test_inverse_of_iir_swaps() {
        let k = Kernel::Iir {
            b: vec![2.0, 1.0],
            a: vec![1.0, -0.5],
        };
        let inv = k.inverse().unwrap();
        assert_eq!(
            inv,
            Kernel::Iir {
                b: vec![1.0, -0.5],
                a: vec![2.0, 1.0],
            }
        );
        assert_relative_eq!(k.dc_gain() * inv.dc_gain(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_requires_leading_tap() {
        let k = Kernel::Fir {
            taps: vec![0.0, 1.0],
        };
        assert!(k.inverse().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Kernel::Fir { taps: vec![] }.validate().is_err());
        assert!(Kernel::Fir {
            taps: vec![1.0, f64::NAN]
        }
        .validate()
        .is_err());
        assert!(Kernel::Iir {
            b: vec![1.0],
            a: vec![0.0, 1.0]
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_kernel_yaml() {
        let k: Kernel = serde_yaml::from_str("type: iir\nb: [1.0, -0.9]\na: [1.0, -0.8]\n").unwrap();
        assert!(matches!(k, Kernel::Iir { .. }));
    }
}
