//! Halofit non-linear ratio engine (Smith et al. 2003, with the small-scale
//! and massive-neutrino update of Bird, Viel & Haehnelt 2011).
//!
//! For one redshift the engine locates the non-linear scale by bisection on
//! the Gaussian-filtered variance of the linear spectrum, then maps every
//! linear sample above `k_min_nonlinear` onto its non-linear value.

mod fitting;

pub use fitting::{HalofitCoefficients, HalofitCosmology, apply_halofit};

use crate::common::constants::ANORM;
use crate::cosmology::{BackgroundSource, CosmologicalParameters};
use crate::domain::{NonlinearError, NonlinearResult};
use crate::numerics::{SplineBoundary, SplineError, integrate_spline, spline_second_derivatives};
use tracing::{debug, warn};

pub const LOG_RADIUS_LOWER_START: f64 = -2.0;
pub const LOG_RADIUS_UPPER_START: f64 = 3.5;
pub const SIGMA_TOLERANCE: f64 = 0.001;
/// Once the upper bound drops below this the filtered variance never reaches
/// unity inside the bracket; the search stops at the current radius.
pub const EARLY_TIME_LOG_RADIUS: f64 = -1.9999;
/// Corrections apply above `K_MIN_NONLINEAR_PER_H * h` (1/Mpc).
pub const K_MIN_NONLINEAR_PER_H: f64 = 0.005;

/// Gaussian-windowed moments of the linear spectrum at one smoothing radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceMoments {
    pub sigma_squared: f64,
    /// `integral P k^2 anorm 2x^2 exp(-x^2) dk`
    pub first: f64,
    /// `integral P k^2 anorm 4x^2(1 - x^2) exp(-x^2) dk`
    pub second: f64,
}

impl VarianceMoments {
    pub fn sigma(&self) -> f64 {
        self.sigma_squared.sqrt()
    }

    pub fn first_log_derivative(&self) -> f64 {
        -self.first / self.sigma_squared
    }

    pub fn second_log_derivative(&self) -> f64 {
        let ratio = self.first / self.sigma_squared;
        -ratio * ratio - self.second / self.sigma_squared
    }
}

/// Computes the three moments by spline quadrature over the sampled `k` grid.
pub fn variance_moments(
    k: &[f64],
    p_lin: &[f64],
    radius: f64,
) -> Result<VarianceMoments, SplineError> {
    if p_lin.len() != k.len() {
        return Err(SplineError::LengthMismatch {
            expected: k.len(),
            actual: p_lin.len(),
        });
    }

    let mut zeroth = Vec::with_capacity(k.len());
    let mut first = Vec::with_capacity(k.len());
    let mut second = Vec::with_capacity(k.len());
    for (&wavenumber, &power) in k.iter().zip(p_lin) {
        let x2 = wavenumber * wavenumber * radius * radius;
        let weighted = power * wavenumber * wavenumber * ANORM * (-x2).exp();
        zeroth.push(weighted);
        first.push(weighted * 2.0 * x2);
        second.push(weighted * 4.0 * x2 * (1.0 - x2));
    }

    Ok(VarianceMoments {
        sigma_squared: integrate_samples(k, &zeroth)?,
        first: integrate_samples(k, &first)?,
        second: integrate_samples(k, &second)?,
    })
}

fn integrate_samples(k: &[f64], integrand: &[f64]) -> Result<f64, SplineError> {
    let second = spline_second_derivatives(k, integrand, SplineBoundary::EstimatedDerivative)?;
    integrate_spline(k, integrand, &second)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleSearchOutcome {
    /// `|sigma - 1| <= SIGMA_TOLERANCE`.
    Converged,
    /// The variance stays below unity down to the smallest radius; typical of
    /// very early times. The last midpoint radius is kept.
    EarlyTimeEscape,
}

/// Result of the non-linear scale search at one redshift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearScale {
    pub z: f64,
    pub sigma: f64,
    /// Smoothing radius `R` (Mpc) at which the search stopped.
    pub radius: f64,
    /// `1 / R`.
    pub k_nl: f64,
    pub n_eff: f64,
    pub curvature: f64,
    pub iterations: usize,
    pub outcome: ScaleSearchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSearchInput<'a> {
    pub k: &'a [f64],
    pub p_lin: &'a [f64],
    pub z: f64,
    pub max_iterations: usize,
}

impl<'a> ScaleSearchInput<'a> {
    pub fn new(k: &'a [f64], p_lin: &'a [f64], z: f64, max_iterations: usize) -> Self {
        Self {
            k,
            p_lin,
            z,
            max_iterations,
        }
    }
}

/// Bisects `log10 R` in `[-2, 3.5]` until the filtered variance is unity.
pub fn find_nonlinear_scale(input: ScaleSearchInput<'_>) -> NonlinearResult<NonlinearScale> {
    let mut log_lower = LOG_RADIUS_LOWER_START;
    let mut log_upper = LOG_RADIUS_UPPER_START;
    let mut iterations = 0;
    let mut last_sigma = f64::NAN;

    loop {
        if iterations == input.max_iterations {
            return Err(NonlinearError::Convergence {
                z: input.z,
                iterations,
                sigma: last_sigma,
            });
        }
        iterations += 1;

        let log_mid = 0.5 * (log_lower + log_upper);
        let radius = 10f64.powf(log_mid);
        let moments = variance_moments(input.k, input.p_lin, radius)?;
        if !(moments.sigma_squared.is_finite() && moments.sigma_squared > 0.0) {
            return Err(NonlinearError::invalid_input(
                "halofit",
                format!(
                    "filtered variance must be positive, got {} at z={} R={radius}",
                    moments.sigma_squared, input.z
                ),
            ));
        }

        let sigma = moments.sigma();
        last_sigma = sigma;
        let diff = sigma - 1.0;
        if diff > SIGMA_TOLERANCE {
            log_lower = log_mid;
        } else if diff < -SIGMA_TOLERANCE {
            log_upper = log_mid;
        }

        let outcome = if log_upper < EARLY_TIME_LOG_RADIUS {
            Some(ScaleSearchOutcome::EarlyTimeEscape)
        } else if diff.abs() <= SIGMA_TOLERANCE {
            Some(ScaleSearchOutcome::Converged)
        } else {
            None
        };

        if let Some(outcome) = outcome {
            return Ok(NonlinearScale {
                z: input.z,
                sigma,
                radius,
                k_nl: 1.0 / radius,
                n_eff: -3.0 - moments.first_log_derivative(),
                curvature: -moments.second_log_derivative(),
                iterations,
                outcome,
            });
        }
    }
}

/// Applies Halofit row by row for one cosmology.
#[derive(Debug)]
pub struct HalofitEngine<'a, B: ?Sized> {
    cosmology: &'a CosmologicalParameters,
    background: &'a B,
    max_iterations: usize,
}

impl<'a, B> HalofitEngine<'a, B>
where
    B: BackgroundSource + ?Sized,
{
    pub fn new(
        cosmology: &'a CosmologicalParameters,
        background: &'a B,
        max_iterations: usize,
    ) -> Self {
        Self {
            cosmology,
            background,
            max_iterations,
        }
    }

    pub fn k_min_nonlinear(&self) -> f64 {
        K_MIN_NONLINEAR_PER_H * self.background.hubble()
    }

    /// Replaces the linear spectrum in `row` by the non-linear one at `z`.
    pub fn transform_row(
        &self,
        z: f64,
        k: &[f64],
        row: &mut [f64],
    ) -> NonlinearResult<NonlinearScale> {
        if row.len() != k.len() {
            return Err(NonlinearError::invalid_input(
                "halofit",
                format!(
                    "spectrum row at z={z} has {} samples for {} wavenumbers",
                    row.len(),
                    k.len()
                ),
            ));
        }

        let densities = self.background.densities_at_redshift(z)?;
        let halofit_cosmology = HalofitCosmology::new(self.cosmology, densities);
        let scale = find_nonlinear_scale(ScaleSearchInput::new(k, row, z, self.max_iterations))?;

        match scale.outcome {
            ScaleSearchOutcome::Converged => debug!(
                z,
                k_nl = scale.k_nl,
                n_eff = scale.n_eff,
                curvature = scale.curvature,
                iterations = scale.iterations,
                "non-linear scale found"
            ),
            ScaleSearchOutcome::EarlyTimeEscape => warn!(
                z,
                sigma = scale.sigma,
                iterations = scale.iterations,
                "filtered variance stays below unity, keeping smallest smoothing radius"
            ),
        }

        apply_halofit(row, k, &scale, &halofit_cosmology, self.k_min_nonlinear());
        Ok(scale)
    }
}
