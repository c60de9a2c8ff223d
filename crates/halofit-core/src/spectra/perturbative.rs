//! Import of time-renormalization-group output.
//!
//! The external solver samples `eta_size` times; every second sample is kept,
//! and each kept row loses `4 * double_escape` wavenumbers at the high-k end.

use super::table::{SpectrumMatrix, SpectrumTable};
use crate::common::config::PerturbativeSettings;
use crate::domain::{NonlinearError, NonlinearResult};

/// Raw solver output. Spectra are laid out `[index_time * k.len() + index_k]`
/// and `None` marks cells the solver did not compute.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbativeOutput {
    pub k: Vec<f64>,
    /// Redshift of each time sample, `eta_size` entries.
    pub z: Vec<f64>,
    pub double_escape: usize,
    /// Density-density spectrum.
    pub p_11: Vec<Option<f64>>,
    /// Density-velocity spectrum.
    pub p_12: Vec<Option<f64>>,
    /// Velocity-velocity spectrum.
    pub p_22: Vec<Option<f64>>,
}

impl PerturbativeOutput {
    /// Adapter for solvers that mark missing cells with an exact `0.0`.
    pub fn from_zero_sentinel(
        k: Vec<f64>,
        z: Vec<f64>,
        double_escape: usize,
        p_11: &[f64],
        p_12: &[f64],
        p_22: &[f64],
    ) -> Self {
        let cells = |values: &[f64]| -> Vec<Option<f64>> {
            values
                .iter()
                .map(|&value| (value != 0.0).then_some(value))
                .collect()
        };
        Self {
            k,
            z,
            double_escape,
            p_11: cells(p_11),
            p_12: cells(p_12),
            p_22: cells(p_22),
        }
    }

    pub fn eta_size(&self) -> usize {
        self.z.len()
    }

    pub fn retained_z_size(&self) -> usize {
        (self.eta_size() - 1) / 2 + 1
    }

    /// Checks the output against the settings the solver was run with.
    pub fn check_settings(&self, settings: &PerturbativeSettings) -> NonlinearResult<()> {
        if self.eta_size() != settings.eta_size {
            return Err(NonlinearError::invalid_input(
                "perturbative output",
                format!(
                    "{} time samples, settings request etaSize={}",
                    self.eta_size(),
                    settings.eta_size
                ),
            ));
        }
        if self.double_escape != settings.double_escape {
            return Err(NonlinearError::invalid_input(
                "perturbative output",
                format!(
                    "doubleEscape={} differs from settings value {}",
                    self.double_escape, settings.double_escape
                ),
            ));
        }
        Ok(())
    }

    fn validate(&self) -> NonlinearResult<()> {
        if self.eta_size() == 0 || self.eta_size() % 2 == 0 {
            return Err(NonlinearError::invalid_input(
                "perturbative output",
                format!("time grid must have an odd size, got {}", self.eta_size()),
            ));
        }
        let expected = self.eta_size() * self.k.len();
        for (name, values) in [("p_11", &self.p_11), ("p_12", &self.p_12), ("p_22", &self.p_22)] {
            if values.len() != expected {
                return Err(NonlinearError::invalid_input(
                    "perturbative output",
                    format!("{name} has {} cells, expected {expected}", values.len()),
                ));
            }
        }
        Ok(())
    }
}

impl SpectrumTable {
    /// Builds density, velocity and cross tables from solver output,
    /// replacing missing cells by the last computed value along z.
    pub fn from_perturbative(output: &PerturbativeOutput) -> NonlinearResult<SpectrumTable> {
        output.validate()?;

        let k_len = output.k.len();
        let z_size = output.retained_z_size();
        let shrink = 4 * output.double_escape;
        let mut k_sizes = Vec::with_capacity(z_size);
        for index_z in 0..z_size {
            let size = k_len
                .checked_sub(shrink * index_z)
                .filter(|&size| size >= 2)
                .ok_or_else(|| {
                    NonlinearError::invalid_input(
                        "perturbative output",
                        format!(
                            "row {index_z} keeps fewer than two of {k_len} wavenumbers \
                             with doubleEscape={}",
                            output.double_escape
                        ),
                    )
                })?;
            k_sizes.push(size);
        }

        let z = (0..z_size).map(|index_z| output.z[2 * index_z]).collect();
        let density = retained_rows(&output.p_11, k_len, k_sizes.clone())?;
        let cross = retained_rows(&output.p_12, k_len, k_sizes.clone())?;
        let velocity = retained_rows(&output.p_22, k_len, k_sizes)?;

        SpectrumTable::new(z, output.k.clone(), density, Some((velocity, cross)))
    }
}

/// Copies every second time sample and forward-fills missing cells per k.
fn retained_rows(
    cells: &[Option<f64>],
    k_len: usize,
    k_sizes: Vec<usize>,
) -> NonlinearResult<SpectrumMatrix> {
    let mut matrix = SpectrumMatrix::zeros(k_sizes)?;
    let mut last = vec![0.0; k_len];
    for (index_z, row) in matrix.rows_mut().enumerate() {
        let source = &cells[2 * index_z * k_len..(2 * index_z + 1) * k_len];
        for ((value, cell), last) in row.iter_mut().zip(source).zip(last.iter_mut()) {
            if let Some(computed) = cell {
                *last = *computed;
            }
            *value = *last;
        }
    }
    Ok(matrix)
}
