//! Non-linear spectrum tables and their lifecycle.

mod builder;
mod perturbative;
mod query;
mod table;

pub use builder::{HalofitBuild, redshift_grid};
pub use perturbative::PerturbativeOutput;
pub use query::{SpectrumAtPoint, SpectrumAtRedshift};
pub use table::{SpectrumMatrix, SpectrumTable, SplinedSpectrum};

use crate::common::config::{NonlinearSettings, PerturbativeSettings};
use crate::cosmology::{BackgroundSource, CosmologicalParameters, LinearSpectrumSource};
use crate::domain::{NonlinearError, NonlinearMethod, NonlinearResult};
use crate::halofit::NonlinearScale;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
enum TableState {
    NotRequested,
    NotReady,
    Ready(Box<SpectrumTable>),
}

/// Owns the non-linear table for one method selection. Queries only succeed
/// once a build has completed.
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearSpectra {
    method: NonlinearMethod,
    state: TableState,
}

impl NonlinearSpectra {
    pub fn new(method: NonlinearMethod) -> Self {
        let state = if method.is_requested() {
            TableState::NotReady
        } else {
            info!("no non-linear spectra requested, module skipped");
            TableState::NotRequested
        };
        Self { method, state }
    }

    pub fn method(&self) -> NonlinearMethod {
        self.method
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, TableState::Ready(_))
    }

    pub fn table(&self) -> NonlinearResult<&SpectrumTable> {
        self.ready_table("table")
    }

    pub fn compute_halofit<B, L>(
        &mut self,
        settings: &NonlinearSettings,
        cosmology: &CosmologicalParameters,
        background: &B,
        linear: &L,
    ) -> NonlinearResult<Vec<NonlinearScale>>
    where
        B: BackgroundSource + ?Sized,
        L: LinearSpectrumSource + ?Sized,
    {
        self.expect_method("compute_halofit", |method| method == NonlinearMethod::Halofit)?;
        self.state = TableState::NotReady;

        let build = SpectrumTable::from_fitting_function(settings, cosmology, background, linear)?;
        self.state = TableState::Ready(Box::new(build.table));
        Ok(build.scales)
    }

    pub fn import_perturbative(
        &mut self,
        settings: &PerturbativeSettings,
        output: &PerturbativeOutput,
    ) -> NonlinearResult<()> {
        self.expect_method("import_perturbative", NonlinearMethod::is_perturbative)?;
        self.state = TableState::NotReady;

        settings.validate()?;
        output.check_settings(settings)?;
        info!(
            method = %self.method,
            eta_size = output.eta_size(),
            k_size = output.k.len(),
            "importing perturbative non-linear spectra"
        );
        let table = SpectrumTable::from_perturbative(output)?;
        debug!(z_size = table.z_size(), k_size = ?table.k_size(), "perturbative table sealed");
        self.state = TableState::Ready(Box::new(table));
        Ok(())
    }

    /// Drops the table. A handle that never requested spectra is unaffected.
    pub fn release(&mut self) {
        if self.method.is_requested() {
            self.state = TableState::NotReady;
        }
    }

    pub fn pk_at_z(&self, z: f64) -> NonlinearResult<SpectrumAtRedshift> {
        self.ready_table("pk_at_z")?.pk_at_z(z)
    }

    pub fn pk_at_k_and_z(&self, k: f64, z: f64) -> NonlinearResult<SpectrumAtPoint> {
        self.ready_table("pk_at_k_and_z")?.pk_at_k_and_z(k, z)
    }

    fn ready_table(&self, operation: &'static str) -> NonlinearResult<&SpectrumTable> {
        match &self.state {
            TableState::NotRequested => Err(NonlinearError::UnsupportedMethod { operation }),
            TableState::NotReady => Err(NonlinearError::TableNotReady { operation }),
            TableState::Ready(table) => Ok(table.as_ref()),
        }
    }

    fn expect_method(
        &self,
        operation: &'static str,
        accepts: impl Fn(NonlinearMethod) -> bool,
    ) -> NonlinearResult<()> {
        if !self.method.is_requested() {
            return Err(NonlinearError::UnsupportedMethod { operation });
        }
        if !accepts(self.method) {
            return Err(NonlinearError::invalid_input(
                "nonlinear spectra",
                format!("{operation} is not available for method '{}'", self.method),
            ));
        }
        Ok(())
    }
}
