//! Precision and method settings for the non-linear module.
//!
//! Settings are read from JSON documents with camelCase keys. Every field has
//! a default so partial documents are accepted.

use crate::domain::{NonlinearError, NonlinearMethod, NonlinearResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HALOFIT_DZ: f64 = 0.1;
pub const DEFAULT_HALOFIT_MAX_ITERATIONS: usize = 100;
/// Upper bound on the number of redshift rows of a Halofit table.
pub const MAX_REDSHIFT_ROWS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonlinearSettings {
    #[serde(default)]
    pub method: NonlinearMethod,
    /// Redshift step of the Halofit table.
    #[serde(default = "default_halofit_dz")]
    pub halofit_dz: f64,
    /// Largest redshift stored in the table.
    #[serde(default)]
    pub z_max_pk: f64,
    #[serde(default = "default_halofit_max_iterations")]
    pub halofit_max_iterations: usize,
    #[serde(default)]
    pub perturbative: Option<PerturbativeSettings>,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        Self {
            method: NonlinearMethod::None,
            halofit_dz: DEFAULT_HALOFIT_DZ,
            z_max_pk: 0.0,
            halofit_max_iterations: DEFAULT_HALOFIT_MAX_ITERATIONS,
            perturbative: None,
        }
    }
}

impl NonlinearSettings {
    pub fn halofit(z_max_pk: f64, halofit_dz: f64) -> Self {
        Self {
            method: NonlinearMethod::Halofit,
            halofit_dz,
            z_max_pk,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> NonlinearResult<()> {
        if !self.halofit_dz.is_finite() || self.halofit_dz <= 0.0 {
            return Err(NonlinearError::invalid_input(
                "settings",
                format!("halofitDz must be finite and > 0, got {}", self.halofit_dz),
            ));
        }
        if !self.z_max_pk.is_finite() || self.z_max_pk < 0.0 {
            return Err(NonlinearError::invalid_input(
                "settings",
                format!("zMaxPk must be finite and >= 0, got {}", self.z_max_pk),
            ));
        }
        redshift_row_count(self.z_max_pk, self.halofit_dz)?;
        if self.halofit_max_iterations == 0 {
            return Err(NonlinearError::invalid_input(
                "settings",
                "halofitMaxIterations must be at least 1",
            ));
        }
        if let Some(perturbative) = &self.perturbative {
            perturbative.validate()?;
        }
        Ok(())
    }
}

/// Number of rows of the redshift grid `z_max_pk, ..., 0` with step `dz`.
/// Both values must already be finite and in range.
pub(crate) fn redshift_row_count(z_max_pk: f64, dz: f64) -> NonlinearResult<usize> {
    let steps = (z_max_pk / dz).floor();
    if !steps.is_finite() || steps >= MAX_REDSHIFT_ROWS as f64 {
        return Err(NonlinearError::invalid_input(
            "redshift grid",
            format!("zMaxPk / halofitDz = {z_max_pk} / {dz} exceeds {MAX_REDSHIFT_ROWS} rows"),
        ));
    }
    Ok(steps as usize + 1)
}

/// Settings of the perturbative (time-renormalization-group) solver. The
/// solver itself is external; only `eta_size` and `double_escape` shape the
/// imported tables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerturbativeSettings {
    pub z_ini: f64,
    pub eta_size: usize,
    pub k_l: f64,
    pub k_min: f64,
    pub logstepx_min: f64,
    pub k_growth_factor: f64,
    /// Number of escape steps per time sample; every retained z row drops
    /// `4 * double_escape` wavenumbers at the high-k end.
    pub double_escape: usize,
}

impl Default for PerturbativeSettings {
    fn default() -> Self {
        Self {
            z_ini: 35.0,
            eta_size: 101,
            k_l: 1.0e-3,
            k_min: 1.0e-4,
            logstepx_min: 0.07,
            k_growth_factor: 0.1,
            double_escape: 2,
        }
    }
}

impl PerturbativeSettings {
    pub fn validate(&self) -> NonlinearResult<()> {
        if self.eta_size == 0 || self.eta_size % 2 == 0 {
            return Err(NonlinearError::invalid_input(
                "perturbative settings",
                format!("etaSize must be odd and positive, got {}", self.eta_size),
            ));
        }
        if !self.z_ini.is_finite() || self.z_ini <= 0.0 {
            return Err(NonlinearError::invalid_input(
                "perturbative settings",
                format!("zIni must be finite and > 0, got {}", self.z_ini),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid settings '{}': {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: NonlinearError,
    },
}

pub fn read_json_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<NonlinearSettings, ConfigError> {
    let path = path.as_ref();
    let settings: NonlinearSettings = read_json_document(path)?;
    settings.validate().map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(settings)
}

fn default_halofit_dz() -> f64 {
    DEFAULT_HALOFIT_DZ
}

fn default_halofit_max_iterations() -> usize {
    DEFAULT_HALOFIT_MAX_ITERATIONS
}
