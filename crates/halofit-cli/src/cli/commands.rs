use super::CliError;
use halofit_core::common::config::{ConfigError, NonlinearSettings, read_json_document};
use halofit_core::cosmology::{
    BbksLinearSpectrum, CosmologicalParameters, FlatLcdmBackground, LinearSpectrumSource,
    ReferenceSpectrumSettings,
};
use halofit_core::halofit::NonlinearScale;
use halofit_core::numerics::{CubicSpline, SplineBoundary};
use halofit_core::spectra::NonlinearSpectra;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct PkArgs {
    /// Run file with cosmology, settings and reference spectrum blocks
    #[arg(long)]
    config: PathBuf,

    /// Wavenumber in 1/Mpc
    #[arg(long, allow_negative_numbers = true)]
    k: f64,

    /// Redshift
    #[arg(long, allow_negative_numbers = true)]
    z: f64,
}

#[derive(clap::Args)]
pub(super) struct TableArgs {
    /// Run file with cosmology, settings and reference spectrum blocks
    #[arg(long)]
    config: PathBuf,

    /// Redshift of the printed slice
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    z: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunFile {
    cosmology: CosmologicalParameters,
    #[serde(default)]
    settings: NonlinearSettings,
    #[serde(default)]
    reference_spectrum: ReferenceSpectrumSettings,
    /// Present-day radiation density of the reference background.
    #[serde(default)]
    omega0_r: f64,
}

struct Session {
    linear: BbksLinearSpectrum,
    spectra: NonlinearSpectra,
    scales: Vec<NonlinearScale>,
}

impl Session {
    fn build(config: &Path) -> Result<Self, CliError> {
        info!(config = %config.display(), "loading run file");
        let run: RunFile = match read_json_document(config) {
            Ok(run) => run,
            Err(error @ ConfigError::Read { .. }) => {
                return Err(anyhow::Error::new(error).context("run file is unavailable").into());
            }
            Err(error) => return Err(CliError::RunFile(error)),
        };
        run.settings.validate()?;

        let background = FlatLcdmBackground::new(run.cosmology).with_radiation(run.omega0_r);
        let linear = BbksLinearSpectrum::new(run.cosmology, background, run.reference_spectrum)?;
        let mut spectra = NonlinearSpectra::new(run.settings.method);
        let scales = if spectra.method().is_requested() {
            spectra.compute_halofit(&run.settings, &run.cosmology, &background, &linear)?
        } else {
            Vec::new()
        };

        info!(
            method = %spectra.method(),
            ready = spectra.is_ready(),
            scales = scales.len(),
            "session ready"
        );
        Ok(Self {
            linear,
            spectra,
            scales,
        })
    }

    fn linear_at(&self, k: f64, z: f64) -> Result<f64, CliError> {
        let row = self.linear.pk_at_z(z)?;
        let spline = CubicSpline::new(self.linear.k_grid().to_vec(), row, SplineBoundary::Natural)
            .map_err(halofit_core::NonlinearError::from)?;
        Ok(spline.evaluate(k))
    }
}

pub(super) fn run_pk_command(args: PkArgs) -> Result<i32, CliError> {
    let session = Session::build(&args.config)?;
    let point = session.spectra.pk_at_k_and_z(args.k, args.z)?;
    let linear = session.linear_at(args.k, args.z)?;

    println!("# k[1/Mpc] z P_lin[Mpc^3] P_nl[Mpc^3]");
    println!(
        "{:.6e} {:.6e} {:.6e} {:.6e}",
        args.k, args.z, linear, point.density
    );
    Ok(0)
}

pub(super) fn run_table_command(args: TableArgs) -> Result<i32, CliError> {
    let session = Session::build(&args.config)?;
    let slice = session.spectra.pk_at_z(args.z)?;
    let table = session.spectra.table()?;

    println!("# z={} k_size_at_z={}", args.z, slice.k_size_at_z);
    for scale in &session.scales {
        println!(
            "# scale z={:.4} k_nl={:.6e} n_eff={:.6} curvature={:.6} iterations={} outcome={:?}",
            scale.z, scale.k_nl, scale.n_eff, scale.curvature, scale.iterations, scale.outcome
        );
    }
    println!("# k[1/Mpc] P_nl[Mpc^3]");
    for (k, power) in table.k().iter().zip(slice.valid_density()) {
        println!("{k:.6e} {power:.6e}");
    }
    Ok(0)
}
