//! Analytic collaborators for flat matter + radiation + Lambda cosmologies.
//!
//! These stand in for full Boltzmann-code outputs when driving the module
//! from the command line or in tests: a closed-form background and a BBKS
//! linear spectrum normalised to sigma_8.

use super::{BackgroundDensities, BackgroundSource, CosmologicalParameters, LinearSpectrumSource};
use crate::common::constants::{ANORM, SIGMA8_RADIUS_MPC_H};
use crate::domain::{NonlinearError, NonlinearResult};
use crate::numerics::{CubicSpline, SplineBoundary, log_grid};
use serde::{Deserialize, Serialize};

/// Flat background; the internal time coordinate is `ln a = -ln(1 + z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatLcdmBackground {
    params: CosmologicalParameters,
    omega0_r: f64,
}

impl FlatLcdmBackground {
    pub fn new(params: CosmologicalParameters) -> Self {
        Self {
            params,
            omega0_r: 0.0,
        }
    }

    pub fn with_radiation(mut self, omega0_r: f64) -> Self {
        self.omega0_r = omega0_r;
        self
    }

    pub fn omega0_lambda(&self) -> f64 {
        1.0 - self.params.omega0_m() - self.omega0_r
    }

    /// `H(z)^2 / H0^2`.
    pub fn expansion_squared(&self, z: f64) -> f64 {
        let scale = 1.0 + z;
        self.params.omega0_m() * scale.powi(3)
            + self.omega0_r * scale.powi(4)
            + self.omega0_lambda()
    }
}

impl BackgroundSource for FlatLcdmBackground {
    fn hubble(&self) -> f64 {
        self.params.h
    }

    fn time_of_redshift(&self, z: f64) -> NonlinearResult<f64> {
        if !z.is_finite() || z <= -1.0 {
            return Err(NonlinearError::invalid_input(
                "background",
                format!("redshift must be finite and > -1, got {z}"),
            ));
        }
        Ok(-(1.0 + z).ln())
    }

    fn densities_at_time(&self, time: f64) -> NonlinearResult<BackgroundDensities> {
        if !time.is_finite() {
            return Err(NonlinearError::invalid_input(
                "background",
                format!("time coordinate must be finite, got {time}"),
            ));
        }
        let z = (-time).exp() - 1.0;
        let expansion_squared = self.expansion_squared(z);
        let scale = 1.0 + z;
        Ok(BackgroundDensities {
            omega_m: self.params.omega0_m() * scale.powi(3) / expansion_squared,
            omega_r: self.omega0_r * scale.powi(4) / expansion_squared,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceSpectrumSettings {
    pub n_s: f64,
    pub sigma8: f64,
    /// Grid bounds in 1/Mpc.
    pub k_min: f64,
    pub k_max: f64,
    pub k_count: usize,
}

impl Default for ReferenceSpectrumSettings {
    fn default() -> Self {
        Self {
            n_s: 0.96,
            sigma8: 0.8,
            k_min: 1.0e-4,
            k_max: 100.0,
            k_count: 500,
        }
    }
}

/// `P(k, z) = A k^n_s T(k)^2 D(z)^2` with the BBKS transfer function and the
/// Carroll, Press & Turner growth approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct BbksLinearSpectrum {
    background: FlatLcdmBackground,
    k: Vec<f64>,
    unnormalised: Vec<f64>,
    amplitude: f64,
    growth_today: f64,
}

impl BbksLinearSpectrum {
    pub fn new(
        params: CosmologicalParameters,
        background: FlatLcdmBackground,
        settings: ReferenceSpectrumSettings,
    ) -> NonlinearResult<Self> {
        params.validate()?;
        if settings.sigma8 <= 0.0 || !settings.sigma8.is_finite() {
            return Err(NonlinearError::invalid_input(
                "reference spectrum",
                format!("sigma8 must be finite and > 0, got {}", settings.sigma8),
            ));
        }
        let k = log_grid(settings.k_min, settings.k_max, settings.k_count)
            .filter(|grid| settings.k_max > settings.k_min && grid.len() >= 3)
            .ok_or_else(|| {
                NonlinearError::invalid_input(
                    "reference spectrum",
                    format!(
                        "k grid needs 0 < kMin < kMax and at least 3 points, got [{}, {}] x {}",
                        settings.k_min, settings.k_max, settings.k_count
                    ),
                )
            })?;

        let shape = shape_parameter(&params);
        let unnormalised: Vec<f64> = k
            .iter()
            .map(|&wavenumber| {
                let transfer = bbks_transfer(wavenumber / (shape * params.h));
                wavenumber.powf(settings.n_s) * transfer * transfer
            })
            .collect();

        let radius = SIGMA8_RADIUS_MPC_H / params.h;
        let integrand: Vec<f64> = k
            .iter()
            .zip(&unnormalised)
            .map(|(&wavenumber, &power)| {
                let window = top_hat_window(wavenumber * radius);
                power * wavenumber * wavenumber * ANORM * window * window
            })
            .collect();
        let variance =
            CubicSpline::new(k.clone(), integrand, SplineBoundary::EstimatedDerivative)?
                .integrate();
        if !(variance.is_finite() && variance > 0.0) {
            return Err(NonlinearError::invalid_input(
                "reference spectrum",
                format!("sigma_8 variance must be positive, got {variance}"),
            ));
        }

        let growth_today = unnormalised_growth(&background, 0.0)?;
        Ok(Self {
            background,
            k,
            unnormalised,
            amplitude: settings.sigma8 * settings.sigma8 / variance,
            growth_today,
        })
    }

    /// Linear growth factor normalised to 1 today.
    pub fn growth_factor(&self, z: f64) -> NonlinearResult<f64> {
        Ok(unnormalised_growth(&self.background, z)? / (self.growth_today * (1.0 + z)))
    }
}

impl LinearSpectrumSource for BbksLinearSpectrum {
    fn k_grid(&self) -> &[f64] {
        &self.k
    }

    fn pk_at_z(&self, z: f64) -> NonlinearResult<Vec<f64>> {
        let growth = self.growth_factor(z)?;
        let scale = self.amplitude * growth * growth;
        Ok(self.unnormalised.iter().map(|power| power * scale).collect())
    }
}

/// Sugiyama (1995) shape parameter.
fn shape_parameter(params: &CosmologicalParameters) -> f64 {
    let omega0_m = params.omega0_m();
    omega0_m * params.h * (-params.omega0_b * (1.0 + (2.0 * params.h).sqrt() / omega0_m)).exp()
}

fn bbks_transfer(q: f64) -> f64 {
    if q < 1.0e-10 {
        return 1.0;
    }
    let polynomial = 1.0
        + 3.89 * q
        + (16.1 * q).powi(2)
        + (5.46 * q).powi(3)
        + (6.71 * q).powi(4);
    (1.0 + 2.34 * q).ln() / (2.34 * q) * polynomial.powf(-0.25)
}

fn top_hat_window(x: f64) -> f64 {
    if x < 1.0e-3 {
        return 1.0 - x * x / 10.0;
    }
    3.0 * (x.sin() - x * x.cos()) / (x * x * x)
}

fn unnormalised_growth(background: &FlatLcdmBackground, z: f64) -> NonlinearResult<f64> {
    let densities = background.densities_at_redshift(z)?;
    let omega_m = densities.omega_m;
    let omega_lambda = densities.omega_lambda();
    Ok(2.5 * omega_m
        / (omega_m.powf(4.0 / 7.0) - omega_lambda
            + (1.0 + omega_m / 2.0) * (1.0 + omega_lambda / 70.0)))
}
