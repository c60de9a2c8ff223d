use halofit_core::common::config::NonlinearSettings;
use halofit_core::cosmology::{
    BbksLinearSpectrum, CosmologicalParameters, FlatLcdmBackground, LinearSpectrumSource,
    ReferenceSpectrumSettings,
};
use halofit_core::domain::{NonlinearError, NonlinearMethod};
use halofit_core::halofit::{HalofitEngine, K_MIN_NONLINEAR_PER_H, ScaleSearchOutcome};
use halofit_core::numerics::{CubicSpline, SplineBoundary};
use halofit_core::spectra::{NonlinearSpectra, SpectrumTable};

struct Fixture {
    cosmology: CosmologicalParameters,
    background: FlatLcdmBackground,
    linear: BbksLinearSpectrum,
}

fn lcdm() -> Fixture {
    let cosmology = CosmologicalParameters::new(0.25, 0.05, 0.0, 0.7);
    let background = FlatLcdmBackground::new(cosmology);
    let linear =
        BbksLinearSpectrum::new(cosmology, background, ReferenceSpectrumSettings::default())
            .expect("reference spectrum should build");
    Fixture {
        cosmology,
        background,
        linear,
    }
}

fn linear_at(fixture: &Fixture, k: f64, z: f64) -> f64 {
    let row = fixture.linear.pk_at_z(z).expect("linear row");
    CubicSpline::new(fixture.linear.k_grid().to_vec(), row, SplineBoundary::Natural)
        .expect("spline")
        .evaluate(k)
}

#[test]
fn halofit_table_boosts_mildly_nonlinear_scales_today() {
    let fixture = lcdm();
    let settings = NonlinearSettings::halofit(2.0, 0.5);
    let mut spectra = NonlinearSpectra::new(NonlinearMethod::Halofit);

    let scales = spectra
        .compute_halofit(&settings, &fixture.cosmology, &fixture.background, &fixture.linear)
        .expect("halofit table should build");

    assert!(spectra.is_ready());
    let table = spectra.table().expect("table");
    assert_eq!(table.z(), &[2.0, 1.5, 1.0, 0.5, 0.0]);
    assert_eq!(scales.len(), 5);
    assert!(table.k_size().iter().all(|&size| size == table.k().len()));

    let point = spectra.pk_at_k_and_z(0.1, 0.0).expect("point query");
    let linear = linear_at(&fixture, 0.1, 0.0);
    assert!(point.density.is_finite() && point.density > 0.0);
    assert!(
        point.density > linear,
        "P_nl={} should exceed P_lin={linear}",
        point.density
    );
    assert!(point.velocity.is_none() && point.cross.is_none());

    let ratio_small = spectra.pk_at_k_and_z(0.3, 0.0).expect("point").density
        / linear_at(&fixture, 0.3, 0.0);
    assert!(ratio_small > 1.5, "ratio at k=0.3 was {ratio_small}");
}

#[test]
fn zero_maximum_redshift_builds_a_single_row() {
    let fixture = lcdm();
    let settings = NonlinearSettings::halofit(0.0, 0.1);
    let mut spectra = NonlinearSpectra::new(NonlinearMethod::Halofit);

    let scales = spectra
        .compute_halofit(&settings, &fixture.cosmology, &fixture.background, &fixture.linear)
        .expect("single row table");

    assert_eq!(scales.len(), 1);
    assert_eq!(spectra.table().expect("table").z(), &[0.0]);
    let slice = spectra.pk_at_z(0.0).expect("slice");
    assert_eq!(slice.k_size_at_z, fixture.linear.k_grid().len());
    assert!(spectra.pk_at_k_and_z(0.2, 0.0).expect("point").density > 0.0);
}

#[test]
fn large_scales_keep_the_linear_spectrum() {
    let fixture = lcdm();
    let settings = NonlinearSettings::halofit(3.0, 0.5);
    let build = SpectrumTable::from_fitting_function(
        &settings,
        &fixture.cosmology,
        &fixture.background,
        &fixture.linear,
    )
    .expect("table");

    let threshold = K_MIN_NONLINEAR_PER_H * fixture.cosmology.h;
    let k = build.table.k();
    for (index_z, &z) in build.table.z().iter().enumerate() {
        let linear = fixture.linear.pk_at_z(z).expect("linear row");
        let stored = build.table.density().matrix().row(index_z);
        for index_k in (0..k.len()).filter(|&index_k| k[index_k] <= threshold) {
            assert_eq!(stored[index_k], linear[index_k], "z={z} k={}", k[index_k]);
        }
    }
}

#[test]
fn stored_redshifts_are_reproduced_exactly() {
    let fixture = lcdm();
    let build = SpectrumTable::from_fitting_function(
        &NonlinearSettings::halofit(1.0, 0.25),
        &fixture.cosmology,
        &fixture.background,
        &fixture.linear,
    )
    .expect("table");

    for (index_z, &z) in build.table.z().iter().enumerate() {
        let slice = build.table.pk_at_z(z).expect("slice");
        let stored = build.table.density().matrix().row(index_z);
        for (value, expected) in slice.density.iter().zip(stored) {
            assert!(
                (value - expected).abs() <= 1.0e-10 * expected.abs(),
                "z={z}: {value} != {expected}"
            );
        }
    }
}

#[test]
fn scale_search_converges_late_and_escapes_early() {
    let fixture = lcdm();
    let engine = HalofitEngine::new(&fixture.cosmology, &fixture.background, 100);
    let k = fixture.linear.k_grid();

    for z in [0.0, 0.5, 1.0, 2.0, 5.0] {
        let mut row = fixture.linear.pk_at_z(z).expect("row");
        let scale = engine.transform_row(z, k, &mut row).expect("scale");
        assert_eq!(scale.outcome, ScaleSearchOutcome::Converged, "z={z}");
        assert!((scale.sigma - 1.0).abs() <= 1.0e-3);
        assert!(scale.n_eff > -3.0 && scale.n_eff < 0.0, "n_eff={} at z={z}", scale.n_eff);
    }

    for z in [20.0, 100.0, 1000.0] {
        let mut row = fixture.linear.pk_at_z(z).expect("row");
        let scale = engine.transform_row(z, k, &mut row).expect("escape is not an error");
        assert_eq!(scale.outcome, ScaleSearchOutcome::EarlyTimeEscape, "z={z}");
        assert!(scale.sigma < 1.0);
    }
}

#[test]
fn nonlinear_scale_moves_to_smaller_scales_with_redshift() {
    let fixture = lcdm();
    let build = SpectrumTable::from_fitting_function(
        &NonlinearSettings::halofit(2.0, 0.5),
        &fixture.cosmology,
        &fixture.background,
        &fixture.linear,
    )
    .expect("table");

    for pair in build.scales.windows(2) {
        assert!(pair[0].z > pair[1].z);
        assert!(pair[0].k_nl > pair[1].k_nl);
    }
}

#[test]
fn failed_build_leaves_the_handle_not_ready() {
    let fixture = lcdm();
    let settings = NonlinearSettings {
        halofit_max_iterations: 2,
        ..NonlinearSettings::halofit(1.0, 0.5)
    };
    let mut spectra = NonlinearSpectra::new(NonlinearMethod::Halofit);

    let error = spectra
        .compute_halofit(&settings, &fixture.cosmology, &fixture.background, &fixture.linear)
        .expect_err("two bisections cannot converge");
    assert!(matches!(error, NonlinearError::Convergence { iterations: 2, .. }));
    assert_eq!(error.exit_code(), 4);

    assert!(!spectra.is_ready());
    assert!(matches!(
        spectra.pk_at_k_and_z(0.1, 0.0),
        Err(NonlinearError::TableNotReady { .. })
    ));
}

#[test]
fn radiation_and_massive_neutrinos_are_accepted() {
    let cosmology = CosmologicalParameters::new(0.24, 0.05, 0.01, 0.7);
    let background = FlatLcdmBackground::new(cosmology).with_radiation(8.5e-5);
    let linear =
        BbksLinearSpectrum::new(cosmology, background, ReferenceSpectrumSettings::default())
            .expect("reference spectrum");
    let mut spectra = NonlinearSpectra::new(NonlinearMethod::Halofit);

    spectra
        .compute_halofit(
            &NonlinearSettings::halofit(1.0, 0.5),
            &cosmology,
            &background,
            &linear,
        )
        .expect("table");
    let point = spectra.pk_at_k_and_z(0.5, 0.5).expect("point");
    assert!(point.density.is_finite() && point.density > 0.0);
}

#[test]
fn out_of_range_method_codes_are_configuration_errors() {
    let error = NonlinearMethod::from_code(7).expect_err("code 7 is not a method");
    assert_eq!(error.code(), "INPUT.METHOD_RANGE");
    assert_eq!(error.exit_code(), 2);
}
