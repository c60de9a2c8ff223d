use super::table::SpectrumTable;
use crate::domain::{NonlinearError, NonlinearResult};
use crate::numerics::{CubicSpline, SplineBoundary};

/// All stored wavenumbers at one redshift. Only the first `k_size_at_z`
/// entries are meaningful; the rest are padding carried by the z splines.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumAtRedshift {
    pub density: Vec<f64>,
    pub velocity: Option<Vec<f64>>,
    pub cross: Option<Vec<f64>>,
    pub k_size_at_z: usize,
}

impl SpectrumAtRedshift {
    pub fn valid_density(&self) -> &[f64] {
        &self.density[..self.k_size_at_z]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumAtPoint {
    pub density: f64,
    pub velocity: Option<f64>,
    pub cross: Option<f64>,
    pub k_size_at_z: usize,
}

impl SpectrumTable {
    pub fn pk_at_z(&self, z: f64) -> NonlinearResult<SpectrumAtRedshift> {
        check_query("redshift", z)?;

        let mut hint = 0;
        let density = self.density().interpolate(self.z(), z, &mut hint)?;
        let velocity = self
            .velocity()
            .map(|spectrum| spectrum.interpolate(self.z(), z, &mut hint))
            .transpose()?;
        let cross = self
            .cross()
            .map(|spectrum| spectrum.interpolate(self.z(), z, &mut hint))
            .transpose()?;

        Ok(SpectrumAtRedshift {
            density,
            velocity,
            cross,
            k_size_at_z: self.k_size_at_z(z),
        })
    }

    pub fn pk_at_k_and_z(&self, k: f64, z: f64) -> NonlinearResult<SpectrumAtPoint> {
        check_query("wavenumber", k)?;
        let slice = self.pk_at_z(z)?;
        let count = slice.k_size_at_z;
        let k_grid = &self.k()[..count];

        let at_k = |values: &[f64]| -> NonlinearResult<f64> {
            let spline = CubicSpline::new(
                k_grid.to_vec(),
                values[..count].to_vec(),
                SplineBoundary::Natural,
            )?;
            Ok(spline.evaluate(k))
        };

        Ok(SpectrumAtPoint {
            density: at_k(slice.density.as_slice())?,
            velocity: slice.velocity.as_deref().map(at_k).transpose()?,
            cross: slice.cross.as_deref().map(at_k).transpose()?,
            k_size_at_z: count,
        })
    }
}

fn check_query(name: &str, value: f64) -> NonlinearResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NonlinearError::invalid_input(
            "spectrum query",
            format!("{name} must be finite, got {value}"),
        ))
    }
}
