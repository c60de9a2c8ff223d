pub mod common;
pub mod cosmology;
pub mod domain;
pub mod halofit;
pub mod numerics;
pub mod spectra;

pub use domain::{NonlinearError, NonlinearMethod, NonlinearResult};
pub use spectra::NonlinearSpectra;
