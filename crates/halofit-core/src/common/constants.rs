pub const PI: f64 = std::f64::consts::PI;
/// `1 / (2 pi^2)`: converts `k^3 P(k)` into the dimensionless power `Delta^2(k)`.
pub const ANORM: f64 = 1.0 / (2.0 * PI * PI);
/// Top-hat radius used for sigma_8 normalisation, in Mpc/h.
pub const SIGMA8_RADIUS_MPC_H: f64 = 8.0;

#[cfg(test)]
mod tests {
    use super::{ANORM, PI};

    #[test]
    fn anorm_matches_two_pi_squared() {
        assert!((ANORM * 2.0 * PI * PI - 1.0).abs() < 1.0e-15);
    }
}
