//! Cubic spline interpolation and quadrature on tabulated data.
//!
//! Second derivatives are obtained from the usual tridiagonal system. Grids
//! may be strictly increasing or strictly decreasing; intervals are handled
//! with signed widths so both orientations share the same formulas.
//!
//! Tables with several quantities sampled on the same abscissa use the
//! "lines" layout `values[index_x * line_count + line]`, i.e. each abscissa
//! owns one contiguous row holding every quantity. A spectrum matrix stored
//! z-major is exactly this layout with `x = z` and one line per wavenumber.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SplineBoundary {
    /// Zero second derivative at both ends.
    #[default]
    Natural,
    /// First derivative at each end taken from the parabola through the three
    /// edge samples. Falls back to `Natural` on two-point grids.
    EstimatedDerivative,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("spline requires at least 2 points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("spline abscissa must be finite, index {index} got {value}")]
    NonFiniteAbscissa { index: usize, value: f64 },
    #[error(
        "spline abscissa must be strictly monotonic, index {index} has {current} after {previous}"
    )]
    NonMonotonic {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("spline ordinate length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Checks that `x` can carry a spline: at least two finite, strictly
/// monotonic samples in either direction.
pub fn validate_abscissa(x: &[f64]) -> Result<(), SplineError> {
    if x.len() < 2 {
        return Err(SplineError::InsufficientPoints { actual: x.len() });
    }

    for (index, value) in x.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFiniteAbscissa { index, value });
        }
    }

    let ascending = x[1] > x[0];
    for index in 1..x.len() {
        let previous = x[index - 1];
        let current = x[index];
        let ordered = if ascending {
            current > previous
        } else {
            current < previous
        };
        if !ordered {
            return Err(SplineError::NonMonotonic {
                index,
                previous,
                current,
            });
        }
    }

    Ok(())
}

/// Second derivatives of the cubic spline through `(x, y)`.
pub fn spline_second_derivatives(
    x: &[f64],
    y: &[f64],
    boundary: SplineBoundary,
) -> Result<Vec<f64>, SplineError> {
    spline_table_lines(x, y, 1, boundary)
}

/// Second derivatives with respect to `x` for every line of a table laid out
/// as `values[index_x * line_count + line]`.
pub fn spline_table_lines(
    x: &[f64],
    values: &[f64],
    line_count: usize,
    boundary: SplineBoundary,
) -> Result<Vec<f64>, SplineError> {
    validate_abscissa(x)?;
    let point_count = x.len();
    let expected = point_count * line_count;
    if values.len() != expected {
        return Err(SplineError::LengthMismatch {
            expected,
            actual: values.len(),
        });
    }

    let at = |index_x: usize, line: usize| index_x * line_count + line;
    let estimated = boundary == SplineBoundary::EstimatedDerivative && point_count >= 3;
    let mut second = vec![0.0; expected];
    let mut u = vec![0.0; expected];

    if estimated {
        let h = x[1] - x[0];
        for line in 0..line_count {
            let first_slope = parabola_edge_slope(
                [x[0], x[1], x[2]],
                [values[at(0, line)], values[at(1, line)], values[at(2, line)]],
            );
            second[at(0, line)] = -0.5;
            u[at(0, line)] =
                (3.0 / h) * ((values[at(1, line)] - values[at(0, line)]) / h - first_slope);
        }
    }

    for index in 1..point_count - 1 {
        let sig = (x[index] - x[index - 1]) / (x[index + 1] - x[index - 1]);
        let upper_width = x[index + 1] - x[index];
        let lower_width = x[index] - x[index - 1];
        let span = x[index + 1] - x[index - 1];
        for line in 0..line_count {
            let p = sig * second[at(index - 1, line)] + 2.0;
            second[at(index, line)] = (sig - 1.0) / p;
            let slope_change = (values[at(index + 1, line)] - values[at(index, line)])
                / upper_width
                - (values[at(index, line)] - values[at(index - 1, line)]) / lower_width;
            u[at(index, line)] = (6.0 * slope_change / span - sig * u[at(index - 1, line)]) / p;
        }
    }

    let last = point_count - 1;
    let last_width = x[last] - x[last - 1];
    for line in 0..line_count {
        let (qn, un) = if estimated {
            let last_slope = parabola_edge_slope(
                [x[last], x[last - 1], x[last - 2]],
                [
                    values[at(last, line)],
                    values[at(last - 1, line)],
                    values[at(last - 2, line)],
                ],
            );
            let chord = (values[at(last, line)] - values[at(last - 1, line)]) / last_width;
            (0.5, (3.0 / last_width) * (last_slope - chord))
        } else {
            (0.0, 0.0)
        };
        second[at(last, line)] =
            (un - qn * u[at(last - 1, line)]) / (qn * second[at(last - 1, line)] + 1.0);
    }

    for index in (0..last).rev() {
        for line in 0..line_count {
            second[at(index, line)] =
                second[at(index, line)] * second[at(index + 1, line)] + u[at(index, line)];
        }
    }

    Ok(second)
}

/// Evaluates the spline at `query`. `hint` holds the lower index of the last
/// bracketing interval and is updated, so monotone query sequences only walk
/// a few intervals per call. Queries outside the grid extrapolate linearly
/// with the spline slope at the nearest endpoint.
pub fn evaluate_spline(
    x: &[f64],
    y: &[f64],
    second: &[f64],
    query: f64,
    hint: &mut usize,
) -> Result<f64, SplineError> {
    check_shape(x, y, second)?;
    Ok(evaluate_unchecked(x, y, second, query, hint))
}

/// Interpolates every line of a table (see [`spline_table_lines`]) at `query`.
pub fn interpolate_table_lines(
    x: &[f64],
    values: &[f64],
    second: &[f64],
    line_count: usize,
    query: f64,
    hint: &mut usize,
) -> Result<Vec<f64>, SplineError> {
    if x.len() < 2 {
        return Err(SplineError::InsufficientPoints { actual: x.len() });
    }
    let expected = x.len() * line_count;
    for actual in [values.len(), second.len()] {
        if actual != expected {
            return Err(SplineError::LengthMismatch { expected, actual });
        }
    }

    let stencil = Stencil::locate(x, query, hint);
    let lower = stencil.lower() * line_count;
    let upper = lower + line_count;
    Ok((0..line_count)
        .map(|line| {
            stencil.apply(
                values[lower + line],
                values[upper + line],
                second[lower + line],
                second[upper + line],
            )
        })
        .collect())
}

/// Integral of the spline over the whole grid, oriented from `x[0]` to
/// `x[n-1]`.
pub fn integrate_spline(x: &[f64], y: &[f64], second: &[f64]) -> Result<f64, SplineError> {
    check_shape(x, y, second)?;
    Ok(integrate_unchecked(x, y, second))
}

/// Owned spline over a validated grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>, boundary: SplineBoundary) -> Result<Self, SplineError> {
        let second = spline_second_derivatives(&x, &y, boundary)?;
        Ok(Self { x, y, second })
    }

    pub fn evaluate(&self, query: f64) -> f64 {
        let mut hint = 0;
        self.evaluate_with_hint(query, &mut hint)
    }

    pub fn evaluate_with_hint(&self, query: f64, hint: &mut usize) -> f64 {
        evaluate_unchecked(&self.x, &self.y, &self.second, query, hint)
    }

    pub fn integrate(&self) -> f64 {
        integrate_unchecked(&self.x, &self.y, &self.second)
    }
}

fn check_shape(x: &[f64], y: &[f64], second: &[f64]) -> Result<(), SplineError> {
    if x.len() < 2 {
        return Err(SplineError::InsufficientPoints { actual: x.len() });
    }
    for actual in [y.len(), second.len()] {
        if actual != x.len() {
            return Err(SplineError::LengthMismatch {
                expected: x.len(),
                actual,
            });
        }
    }
    Ok(())
}

fn evaluate_unchecked(x: &[f64], y: &[f64], second: &[f64], query: f64, hint: &mut usize) -> f64 {
    let stencil = Stencil::locate(x, query, hint);
    let lower = stencil.lower();
    stencil.apply(y[lower], y[lower + 1], second[lower], second[lower + 1])
}

fn integrate_unchecked(x: &[f64], y: &[f64], second: &[f64]) -> f64 {
    (0..x.len() - 1)
        .map(|index| {
            let h = x[index + 1] - x[index];
            h * (y[index] + y[index + 1]) / 2.0
                - h * h * h * (second[index] + second[index + 1]) / 24.0
        })
        .sum()
}

/// Slope at `x[0]` of the parabola through three samples.
fn parabola_edge_slope(x: [f64; 3], y: [f64; 3]) -> f64 {
    let near = x[1] - x[0];
    let far = x[2] - x[0];
    (far * far * (y[1] - y[0]) - near * near * (y[2] - y[0])) / (far * near * (x[2] - x[1]))
}

/// Weights for one query point against interval `[x[lower], x[lower + 1]]`.
#[derive(Debug, Clone, Copy)]
enum Stencil {
    Interior {
        lower: usize,
        a: f64,
        b: f64,
        width: f64,
    },
    BeforeStart {
        width: f64,
        offset: f64,
    },
    AfterEnd {
        lower: usize,
        width: f64,
        offset: f64,
    },
}

impl Stencil {
    fn locate(x: &[f64], query: f64, hint: &mut usize) -> Self {
        let last = x.len() - 1;
        let ascending = x[last] > x[0];
        let beyond = |lhs: f64, rhs: f64| if ascending { lhs > rhs } else { lhs < rhs };

        if beyond(x[0], query) {
            *hint = 0;
            return Self::BeforeStart {
                width: x[1] - x[0],
                offset: query - x[0],
            };
        }
        if beyond(query, x[last]) {
            *hint = last - 1;
            return Self::AfterEnd {
                lower: last - 1,
                width: x[last] - x[last - 1],
                offset: query - x[last],
            };
        }

        let mut lower = (*hint).min(last - 1);
        while lower > 0 && beyond(x[lower], query) {
            lower -= 1;
        }
        while lower < last - 1 && beyond(query, x[lower + 1]) {
            lower += 1;
        }
        *hint = lower;

        let width = x[lower + 1] - x[lower];
        Self::Interior {
            lower,
            a: (x[lower + 1] - query) / width,
            b: (query - x[lower]) / width,
            width,
        }
    }

    fn lower(self) -> usize {
        match self {
            Self::Interior { lower, .. } | Self::AfterEnd { lower, .. } => lower,
            Self::BeforeStart { .. } => 0,
        }
    }

    fn apply(self, y_lower: f64, y_upper: f64, second_lower: f64, second_upper: f64) -> f64 {
        match self {
            Self::Interior { a, b, width, .. } => {
                a * y_lower
                    + b * y_upper
                    + ((a * a * a - a) * second_lower + (b * b * b - b) * second_upper)
                        * width
                        * width
                        / 6.0
            }
            Self::BeforeStart { width, offset } => {
                let slope = (y_upper - y_lower) / width
                    - width * (2.0 * second_lower + second_upper) / 6.0;
                y_lower + slope * offset
            }
            Self::AfterEnd { width, offset, .. } => {
                let slope = (y_upper - y_lower) / width
                    + width * (second_lower + 2.0 * second_upper) / 6.0;
                y_upper + slope * offset
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CubicSpline, SplineBoundary, SplineError, evaluate_spline, integrate_spline,
        interpolate_table_lines, spline_second_derivatives, spline_table_lines,
    };
    use std::f64::consts::PI;

    fn uniform_grid(start: f64, end: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|index| start + (end - start) * index as f64 / (count - 1) as f64)
            .collect()
    }

    fn max_midpoint_error(count: usize) -> f64 {
        let x = uniform_grid(0.0, PI, count);
        let y: Vec<f64> = x.iter().map(|value| value.sin()).collect();
        let spline = CubicSpline::new(x.clone(), y, SplineBoundary::Natural).expect("spline");
        x.windows(2)
            .map(|pair| {
                let mid = 0.5 * (pair[0] + pair[1]);
                (spline.evaluate(mid) - mid.sin()).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn spline_reproduces_samples_at_nodes() {
        let x = uniform_grid(0.1, 3.0, 17);
        let y: Vec<f64> = x.iter().map(|value| value.exp() * value.cos()).collect();
        for boundary in [SplineBoundary::Natural, SplineBoundary::EstimatedDerivative] {
            let second = spline_second_derivatives(&x, &y, boundary).expect("second derivatives");
            let mut hint = 0;
            for (node, expected) in x.iter().zip(&y) {
                let actual = evaluate_spline(&x, &y, &second, *node, &mut hint).expect("eval");
                assert!((actual - expected).abs() <= 1.0e-12 * expected.abs().max(1.0));
            }
        }
    }

    #[test]
    fn midpoint_error_shrinks_with_fourth_order() {
        let coarse = max_midpoint_error(11);
        let fine = max_midpoint_error(21);
        assert!(coarse < 1.0e-3, "coarse error {coarse}");
        assert!(coarse / fine > 10.0, "ratio {}", coarse / fine);
    }

    #[test]
    fn decreasing_grids_match_increasing_grids() {
        let x = uniform_grid(0.0, 2.0, 9);
        let y: Vec<f64> = x.iter().map(|value| 1.0 / (1.0 + value * value)).collect();
        let x_rev: Vec<f64> = x.iter().rev().copied().collect();
        let y_rev: Vec<f64> = y.iter().rev().copied().collect();

        let forward =
            CubicSpline::new(x, y, SplineBoundary::EstimatedDerivative).expect("forward");
        let backward =
            CubicSpline::new(x_rev, y_rev, SplineBoundary::EstimatedDerivative).expect("backward");

        for query in [0.05, 0.33, 1.0, 1.77, 1.99] {
            assert!((forward.evaluate(query) - backward.evaluate(query)).abs() < 1.0e-12);
        }
        assert!((forward.integrate() + backward.integrate()).abs() < 1.0e-12);
    }

    #[test]
    fn extrapolation_follows_endpoint_slope() {
        let x = uniform_grid(0.0, 4.0, 9);
        let y: Vec<f64> = x.iter().map(|value| 3.0 * value - 1.0).collect();
        let spline = CubicSpline::new(x, y, SplineBoundary::Natural).expect("spline");

        assert!((spline.evaluate(-2.0) - (-7.0)).abs() < 1.0e-12);
        assert!((spline.evaluate(6.0) - 17.0).abs() < 1.0e-12);
        assert!(spline.evaluate(1.0e3).is_finite());
    }

    #[test]
    fn integral_of_constant_is_exact() {
        let x = vec![-1.0, -0.2, 0.5, 1.7, 3.0];
        let y = vec![2.5; x.len()];
        let second = spline_second_derivatives(&x, &y, SplineBoundary::EstimatedDerivative)
            .expect("second derivatives");
        let integral = integrate_spline(&x, &y, &second).expect("integral");
        assert!((integral - 4.0 * 2.5).abs() < 1.0e-12);
    }

    #[test]
    fn estimated_boundary_integrates_quadratics_exactly() {
        let x = uniform_grid(0.0, 3.0, 7);
        let y: Vec<f64> = x.iter().map(|value| value * value).collect();
        let spline = CubicSpline::new(x, y, SplineBoundary::EstimatedDerivative).expect("spline");
        assert!((spline.integrate() - 9.0).abs() < 1.0e-12);
        assert!((spline.evaluate(1.25) - 1.5625).abs() < 1.0e-12);
    }

    #[test]
    fn table_lines_match_independent_splines() {
        let z = vec![2.0, 1.5, 1.0, 0.5, 0.0];
        let line_count = 3;
        let mut table = Vec::with_capacity(z.len() * line_count);
        for redshift in &z {
            for line in 0..line_count {
                table.push((1.0 + line as f64) / (1.0 + redshift) + redshift * redshift);
            }
        }

        let second = spline_table_lines(&z, &table, line_count, SplineBoundary::EstimatedDerivative)
            .expect("table second derivatives");
        let mut hint = 0;
        let row = interpolate_table_lines(&z, &table, &second, line_count, 0.7, &mut hint)
            .expect("interpolate");

        for (line, value) in row.iter().enumerate() {
            let column: Vec<f64> = (0..z.len())
                .map(|index| table[index * line_count + line])
                .collect();
            let single = CubicSpline::new(
                z.clone(),
                column,
                SplineBoundary::EstimatedDerivative,
            )
            .expect("column spline");
            assert!((single.evaluate(0.7) - value).abs() < 1.0e-12);
        }
        assert_eq!(hint, 2);
    }

    #[test]
    fn two_point_grids_degrade_to_linear_interpolation() {
        let spline = CubicSpline::new(
            vec![1.0, 3.0],
            vec![2.0, 6.0],
            SplineBoundary::EstimatedDerivative,
        )
        .expect("spline");
        assert!((spline.evaluate(2.0) - 4.0).abs() < 1.0e-12);
        let boundary = SplineBoundary::EstimatedDerivative;
        let second = spline_second_derivatives(&[1.0, 3.0], &[2.0, 6.0], boundary);
        assert_eq!(second, Ok(vec![0.0, 0.0]));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert_eq!(
            spline_second_derivatives(&[1.0], &[1.0], SplineBoundary::Natural),
            Err(SplineError::InsufficientPoints { actual: 1 })
        );
        assert_eq!(
            spline_second_derivatives(&[0.0, 1.0, 1.0], &[0.0; 3], SplineBoundary::Natural),
            Err(SplineError::NonMonotonic {
                index: 2,
                previous: 1.0,
                current: 1.0,
            })
        );
        assert_eq!(
            spline_second_derivatives(&[0.0, 1.0, 2.0], &[0.0; 2], SplineBoundary::Natural),
            Err(SplineError::LengthMismatch {
                expected: 3,
                actual: 2,
            })
        );
        assert!(matches!(
            spline_second_derivatives(&[0.0, f64::NAN], &[0.0; 2], SplineBoundary::Natural),
            Err(SplineError::NonFiniteAbscissa { index: 1, .. })
        ));
    }
}
