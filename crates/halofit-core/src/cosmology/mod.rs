//! Collaborator interfaces consumed by the non-linear module.
//!
//! The background evolution and the linear power spectrum are produced
//! elsewhere; the non-linear module only needs the lookups below.

pub mod reference;

pub use reference::{BbksLinearSpectrum, FlatLcdmBackground, ReferenceSpectrumSettings};

use crate::domain::{NonlinearError, NonlinearResult};
use serde::{Deserialize, Serialize};

/// Present-day density parameters and reduced Hubble constant.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmologicalParameters {
    pub omega0_cdm: f64,
    pub omega0_b: f64,
    #[serde(default)]
    pub omega0_ncdm_tot: f64,
    pub h: f64,
}

impl CosmologicalParameters {
    pub fn new(omega0_cdm: f64, omega0_b: f64, omega0_ncdm_tot: f64, h: f64) -> Self {
        Self {
            omega0_cdm,
            omega0_b,
            omega0_ncdm_tot,
            h,
        }
    }

    pub fn omega0_m(&self) -> f64 {
        self.omega0_cdm + self.omega0_b + self.omega0_ncdm_tot
    }

    pub fn omega0_m_h2(&self) -> f64 {
        self.omega0_m() * self.h * self.h
    }

    /// Massive-neutrino density relative to baryons plus cold dark matter.
    pub fn neutrino_fraction(&self) -> f64 {
        self.omega0_ncdm_tot / (self.omega0_b + self.omega0_cdm)
    }

    pub fn validate(&self) -> NonlinearResult<()> {
        let fields = [
            ("omega0Cdm", self.omega0_cdm),
            ("omega0B", self.omega0_b),
            ("omega0NcdmTot", self.omega0_ncdm_tot),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(NonlinearError::invalid_input(
                    "cosmological parameters",
                    format!("{field} must be finite and >= 0, got {value}"),
                ));
            }
        }
        if self.omega0_b + self.omega0_cdm <= 0.0 {
            return Err(NonlinearError::invalid_input(
                "cosmological parameters",
                "omega0B + omega0Cdm must be > 0",
            ));
        }
        if !self.h.is_finite() || self.h <= 0.0 {
            return Err(NonlinearError::invalid_input(
                "cosmological parameters",
                format!("h must be finite and > 0, got {}", self.h),
            ));
        }
        Ok(())
    }
}

/// Density parameters of the background at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundDensities {
    pub omega_m: f64,
    pub omega_r: f64,
}

impl BackgroundDensities {
    /// Everything that is neither matter nor radiation counts as dark energy.
    pub fn omega_lambda(&self) -> f64 {
        1.0 - self.omega_m - self.omega_r
    }
}

pub trait BackgroundSource {
    /// Reduced Hubble constant `h`.
    fn hubble(&self) -> f64;

    /// Internal time coordinate of the background tables at redshift `z`.
    fn time_of_redshift(&self, z: f64) -> NonlinearResult<f64>;

    fn densities_at_time(&self, time: f64) -> NonlinearResult<BackgroundDensities>;

    fn densities_at_redshift(&self, z: f64) -> NonlinearResult<BackgroundDensities> {
        let time = self.time_of_redshift(z)?;
        self.densities_at_time(time)
    }
}

pub trait LinearSpectrumSource {
    /// Wavenumbers in 1/Mpc, strictly increasing.
    fn k_grid(&self) -> &[f64];

    /// Linear P(k) in Mpc^3 on [`Self::k_grid`], summed over initial conditions.
    fn pk_at_z(&self, z: f64) -> NonlinearResult<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::{BackgroundDensities, CosmologicalParameters};

    #[test]
    fn derived_matter_quantities() {
        let params = CosmologicalParameters::new(0.25, 0.05, 0.003, 0.7);
        assert!((params.omega0_m() - 0.303).abs() < 1.0e-15);
        assert!((params.omega0_m_h2() - 0.303 * 0.49).abs() < 1.0e-15);
        assert!((params.neutrino_fraction() - 0.01).abs() < 1.0e-15);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(CosmologicalParameters::new(0.25, 0.05, 0.0, 0.0).validate().is_err());
        assert!(CosmologicalParameters::new(-0.1, 0.05, 0.0, 0.7).validate().is_err());
        assert!(CosmologicalParameters::new(0.0, 0.0, 0.1, 0.7).validate().is_err());
    }

    #[test]
    fn lambda_closes_the_budget() {
        let densities = BackgroundDensities {
            omega_m: 0.3,
            omega_r: 1.0e-4,
        };
        assert!((densities.omega_lambda() - 0.6999).abs() < 1.0e-15);
    }

    #[test]
    fn parameters_deserialize_from_camel_case() {
        let params: CosmologicalParameters =
            serde_json::from_str(r#"{ "omega0Cdm": 0.25, "omega0B": 0.05, "h": 0.7 }"#)
                .expect("parse");
        assert_eq!(params.omega0_ncdm_tot, 0.0);
        assert_eq!(params.h, 0.7);
    }
}
