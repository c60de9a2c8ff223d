use super::NonlinearScale;
use crate::common::constants::ANORM;
use crate::cosmology::{BackgroundDensities, CosmologicalParameters};

/// Density state entering the fitting formula at one redshift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalofitCosmology {
    pub omega_m: f64,
    pub omega_lambda: f64,
    pub f_nu: f64,
    /// Present-day `(omega0_cdm + omega0_b + omega0_ncdm) h^2`.
    pub omega0_m_h2: f64,
}

impl HalofitCosmology {
    pub fn new(params: &CosmologicalParameters, densities: BackgroundDensities) -> Self {
        Self {
            omega_m: densities.omega_m,
            omega_lambda: densities.omega_lambda(),
            f_nu: params.neutrino_fraction(),
            omega0_m_h2: params.omega0_m_h2(),
        }
    }

    /// Exponents `(f1, f2, f3)` interpolated between open and flat fits.
    fn omega_exponents(&self) -> (f64, f64, f64) {
        let omega_m = self.omega_m;
        if (1.0 - omega_m).abs() <= 0.01 {
            return (1.0, 1.0, 1.0);
        }

        let open = (
            omega_m.powf(-0.0732),
            omega_m.powf(-0.1423),
            omega_m.powf(0.0725),
        );
        let flat = (
            omega_m.powf(-0.0307),
            omega_m.powf(-0.0585),
            omega_m.powf(0.0743),
        );
        let frac = self.omega_lambda / (1.0 - omega_m);
        (
            frac * flat.0 + (1.0 - frac) * open.0,
            frac * flat.1 + (1.0 - frac) * open.1,
            frac * flat.2 + (1.0 - frac) * open.2,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalofitCoefficients {
    pub k_nl: f64,
    pub gamma: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub mu: f64,
    pub nu: f64,
    pub alpha: f64,
    pub beta: f64,
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
    pub f_nu: f64,
    pub omega0_m_h2: f64,
}

impl HalofitCoefficients {
    pub fn new(scale: &NonlinearScale, cosmology: &HalofitCosmology) -> Self {
        let n = scale.n_eff;
        let curvature = scale.curvature;
        let f_nu = cosmology.f_nu;
        let (f1, f2, f3) = cosmology.omega_exponents();

        // Bird, Viel & Haehnelt 2011 small-scale correction to gamma.
        let extra_gamma = 0.3159 - 0.0765 * n - 0.8350 * curvature;
        let gamma = extra_gamma + 0.86485 + 0.2989 * n + 0.1631 * curvature;

        let log_a = 1.4861 + 1.83693 * n + 1.67618 * n * n + 0.7940 * n.powi(3)
            + 0.1670756 * n.powi(4)
            - 0.620695 * curvature;

        Self {
            k_nl: scale.k_nl,
            gamma,
            a: 10f64.powf(log_a),
            b: 10f64.powf(0.9463 + 0.9466 * n + 0.3084 * n * n - 0.940 * curvature),
            c: 10f64.powf(-0.2807 + 0.6669 * n + 0.3214 * n * n - 0.0793 * curvature),
            mu: 10f64.powf(-3.54419 + 0.19086 * n),
            nu: 10f64.powf(0.95897 + 1.2857 * n),
            alpha: 1.38848 + 0.3701 * n - 0.1452 * n * n,
            beta: 0.8291 + 0.9854 * n + 0.3400 * n * n + f_nu * (-6.4868 + 1.4373 * n * n),
            f1,
            f2,
            f3,
            f_nu,
            omega0_m_h2: cosmology.omega0_m_h2,
        }
    }

    /// Non-linear dimensionless power `Delta^2_nl` from the linear one at `k`.
    pub fn nonlinear_power(&self, k: f64, delta2_lin: f64) -> f64 {
        let y = k / self.k_nl;

        let halo = self.a * y.powf(3.0 * self.f1)
            / (1.0 + self.b * y.powf(self.f2) + (self.f3 * self.c * y).powf(3.0 - self.gamma));
        let halo = halo / (1.0 + self.mu / y + self.nu / (y * y))
            * (1.0 + self.f_nu * (2.080 - 12.39 * (self.omega0_m_h2 - 0.3))
                / (1.0 + 1.201e-3 * y.powi(3)));

        let delta2_aa = delta2_lin * (1.0 + self.f_nu * 26.29 * k * k / (1.0 + 1.5 * k * k));
        let quasi = delta2_lin * (1.0 + delta2_aa).powf(self.beta) / (1.0 + self.alpha * delta2_aa)
            * (-y / 4.0 - y * y / 8.0).exp();

        quasi + halo
    }
}

/// Overwrites `p` (Mpc^3) with the non-linear spectrum for `k > k_min_nonlinear`.
pub fn apply_halofit(
    p: &mut [f64],
    k: &[f64],
    scale: &NonlinearScale,
    cosmology: &HalofitCosmology,
    k_min_nonlinear: f64,
) {
    let coefficients = HalofitCoefficients::new(scale, cosmology);
    for (power, &wavenumber) in p.iter_mut().zip(k) {
        if wavenumber <= k_min_nonlinear {
            continue;
        }
        let to_dimensionless = wavenumber.powi(3) * ANORM;
        let delta2_nl = coefficients.nonlinear_power(wavenumber, *power * to_dimensionless);
        *power = delta2_nl / to_dimensionless;
    }
}
