use super::table::{SpectrumMatrix, SpectrumTable};
use crate::common::config::{NonlinearSettings, redshift_row_count};
use crate::cosmology::{BackgroundSource, CosmologicalParameters, LinearSpectrumSource};
use crate::domain::{NonlinearError, NonlinearResult};
use crate::halofit::{HalofitEngine, NonlinearScale};
use tracing::info;

/// Decreasing redshift grid from `z_max_pk` to 0 with roughly `dz` spacing.
pub fn redshift_grid(z_max_pk: f64, dz: f64) -> NonlinearResult<Vec<f64>> {
    if !z_max_pk.is_finite() || z_max_pk < 0.0 {
        return Err(NonlinearError::invalid_input(
            "redshift grid",
            format!("zMaxPk must be finite and >= 0, got {z_max_pk}"),
        ));
    }
    if !dz.is_finite() || dz <= 0.0 {
        return Err(NonlinearError::invalid_input(
            "redshift grid",
            format!("halofitDz must be finite and > 0, got {dz}"),
        ));
    }

    let z_size = redshift_row_count(z_max_pk, dz)?;
    if z_size == 1 {
        return Ok(vec![0.0]);
    }

    let last = (z_size - 1) as f64;
    Ok((0..z_size)
        .map(|index_z| (last - index_z as f64) / last * z_max_pk)
        .collect())
}

/// Halofit table together with the scale found at every stored redshift.
#[derive(Debug, Clone, PartialEq)]
pub struct HalofitBuild {
    pub table: SpectrumTable,
    pub scales: Vec<NonlinearScale>,
}

impl SpectrumTable {
    /// Samples the linear spectrum on the redshift grid, replaces each row by
    /// its Halofit counterpart and seals the table.
    pub fn from_fitting_function<B, L>(
        settings: &NonlinearSettings,
        cosmology: &CosmologicalParameters,
        background: &B,
        linear: &L,
    ) -> NonlinearResult<HalofitBuild>
    where
        B: BackgroundSource + ?Sized,
        L: LinearSpectrumSource + ?Sized,
    {
        settings.validate()?;
        cosmology.validate()?;

        let z = redshift_grid(settings.z_max_pk, settings.halofit_dz)?;
        let k = linear.k_grid().to_vec();
        let mut density = SpectrumMatrix::zeros(vec![k.len(); z.len()])?;
        let engine = HalofitEngine::new(cosmology, background, settings.halofit_max_iterations);

        info!(
            z_size = z.len(),
            k_size = k.len(),
            z_max = settings.z_max_pk,
            "computing non-linear spectrum with Halofit"
        );

        let mut scales = Vec::with_capacity(z.len());
        for (&z_value, row) in z.iter().zip(density.rows_mut()) {
            let linear_row = linear.pk_at_z(z_value)?;
            if linear_row.len() != row.len() {
                return Err(NonlinearError::invalid_input(
                    "linear spectrum",
                    format!(
                        "pk_at_z({z_value}) returned {} samples for {} wavenumbers",
                        linear_row.len(),
                        row.len()
                    ),
                ));
            }
            row.copy_from_slice(&linear_row);
            scales.push(engine.transform_row(z_value, &k, row)?);
        }

        let table = SpectrumTable::new(z, k, density, None)?;
        Ok(HalofitBuild { table, scales })
    }
}
