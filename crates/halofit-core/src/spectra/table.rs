use crate::domain::{NonlinearError, NonlinearResult};
use crate::numerics::{
    SplineBoundary, interpolate_table_lines, spline_table_lines, validate_abscissa,
};

/// Row-major `z_size x k_size[0]` matrix with a valid length per z row.
///
/// Entries past a row's valid length are padding: they take part in the
/// z-direction splines but are never returned as valid samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMatrix {
    values: Vec<f64>,
    row_len: usize,
    k_sizes: Vec<usize>,
}

impl SpectrumMatrix {
    /// Zero-filled matrix. `k_sizes[0]` sets the row length; later rows may
    /// be shorter but never below two samples.
    pub fn zeros(k_sizes: Vec<usize>) -> NonlinearResult<Self> {
        let Some(&row_len) = k_sizes.first() else {
            return Err(NonlinearError::invalid_input(
                "spectrum matrix",
                "at least one z row is required",
            ));
        };
        for (row, &size) in k_sizes.iter().enumerate() {
            if !(2..=row_len).contains(&size) {
                return Err(NonlinearError::invalid_input(
                    "spectrum matrix",
                    format!("row {row} has {size} valid samples, expected 2..={row_len}"),
                ));
            }
        }

        Ok(Self {
            values: vec![0.0; row_len * k_sizes.len()],
            row_len,
            k_sizes,
        })
    }

    pub fn z_size(&self) -> usize {
        self.k_sizes.len()
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn k_sizes(&self) -> &[usize] {
        &self.k_sizes
    }

    pub fn row(&self, index_z: usize) -> &[f64] {
        let start = index_z * self.row_len;
        &self.values[start..start + self.row_len]
    }

    pub fn valid_row(&self, index_z: usize) -> &[f64] {
        &self.row(index_z)[..self.k_sizes[index_z]]
    }

    pub fn row_mut(&mut self, index_z: usize) -> &mut [f64] {
        let start = index_z * self.row_len;
        &mut self.values[start..start + self.row_len]
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.values.chunks_exact_mut(self.row_len)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// A matrix sealed together with its second derivatives along z.
#[derive(Debug, Clone, PartialEq)]
pub struct SplinedSpectrum {
    matrix: SpectrumMatrix,
    second: Vec<f64>,
}

impl SplinedSpectrum {
    pub fn new(z: &[f64], matrix: SpectrumMatrix) -> NonlinearResult<Self> {
        if z.len() != matrix.z_size() {
            return Err(NonlinearError::invalid_input(
                "spectrum table",
                format!(
                    "{} redshifts for a matrix with {} rows",
                    z.len(),
                    matrix.z_size()
                ),
            ));
        }

        let second = if z.len() == 1 {
            vec![0.0; matrix.row_len()]
        } else {
            spline_table_lines(
                z,
                matrix.as_slice(),
                matrix.row_len(),
                SplineBoundary::EstimatedDerivative,
            )?
        };

        Ok(Self { matrix, second })
    }

    pub fn matrix(&self) -> &SpectrumMatrix {
        &self.matrix
    }

    /// Valid samples of row `index_z`, or `None` past the end of the table.
    pub fn stored_row(&self, index_z: usize) -> Option<&[f64]> {
        (index_z < self.matrix.z_size()).then(|| self.matrix.valid_row(index_z))
    }

    /// Full row (all `k_size[0]` wavenumbers) interpolated at `z`.
    pub fn interpolate(
        &self,
        z_grid: &[f64],
        z: f64,
        hint: &mut usize,
    ) -> NonlinearResult<Vec<f64>> {
        if z_grid.len() == 1 {
            return Ok(self.matrix.row(0).to_vec());
        }
        Ok(interpolate_table_lines(
            z_grid,
            self.matrix.as_slice(),
            &self.second,
            self.matrix.row_len(),
            z,
            hint,
        )?)
    }
}

/// Non-linear spectra sampled on a redshift grid and a shared wavenumber grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumTable {
    z: Vec<f64>,
    k: Vec<f64>,
    density: SplinedSpectrum,
    velocity: Option<SplinedSpectrum>,
    cross: Option<SplinedSpectrum>,
}

impl SpectrumTable {
    /// Seals the matrices; `velocity_and_cross` is present only for
    /// perturbative imports and must share the density's shape.
    pub fn new(
        z: Vec<f64>,
        k: Vec<f64>,
        density: SpectrumMatrix,
        velocity_and_cross: Option<(SpectrumMatrix, SpectrumMatrix)>,
    ) -> NonlinearResult<Self> {
        check_redshifts(&z)?;
        validate_abscissa(&k)?;
        if k.len() != density.row_len() {
            return Err(NonlinearError::invalid_input(
                "spectrum table",
                format!(
                    "{} wavenumbers for rows of {} samples",
                    k.len(),
                    density.row_len()
                ),
            ));
        }

        let (velocity, cross) = match velocity_and_cross {
            Some((velocity, cross)) => {
                for (name, matrix) in [("velocity", &velocity), ("cross", &cross)] {
                    if matrix.k_sizes() != density.k_sizes() {
                        return Err(NonlinearError::invalid_input(
                            "spectrum table",
                            format!("{name} matrix shape differs from the density matrix"),
                        ));
                    }
                }
                (
                    Some(SplinedSpectrum::new(&z, velocity)?),
                    Some(SplinedSpectrum::new(&z, cross)?),
                )
            }
            None => (None, None),
        };
        let density = SplinedSpectrum::new(&z, density)?;

        Ok(Self {
            z,
            k,
            density,
            velocity,
            cross,
        })
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn k(&self) -> &[f64] {
        &self.k
    }

    pub fn z_size(&self) -> usize {
        self.z.len()
    }

    pub fn k_size(&self) -> &[usize] {
        self.density.matrix().k_sizes()
    }

    pub fn density(&self) -> &SplinedSpectrum {
        &self.density
    }

    pub fn velocity(&self) -> Option<&SplinedSpectrum> {
        self.velocity.as_ref()
    }

    pub fn cross(&self) -> Option<&SplinedSpectrum> {
        self.cross.as_ref()
    }

    /// Valid wavenumber count of the first stored row at or beyond `z` in the
    /// grid direction, clamped to the last row.
    pub fn k_size_at_z(&self, z: f64) -> usize {
        let decreasing = self.z.len() > 1 && self.z[1] < self.z[0];
        let last = self.z.len() - 1;
        let index_z = self
            .z
            .iter()
            .position(|&stored| if decreasing { stored <= z } else { stored >= z })
            .unwrap_or(last);
        self.k_size()[index_z]
    }
}

fn check_redshifts(z: &[f64]) -> NonlinearResult<()> {
    match z {
        [] => Err(NonlinearError::invalid_input(
            "spectrum table",
            "redshift grid is empty",
        )),
        [single] if !single.is_finite() => Err(NonlinearError::invalid_input(
            "spectrum table",
            format!("redshift must be finite, got {single}"),
        )),
        [_] => Ok(()),
        _ => Ok(validate_abscissa(z)?),
    }
}
