pub mod spline;

pub use spline::{
    CubicSpline, SplineBoundary, SplineError, evaluate_spline, integrate_spline,
    interpolate_table_lines, spline_second_derivatives, spline_table_lines, validate_abscissa,
};

/// Inclusive grid from `start` to `end`; the last sample is pinned to `end`.
pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Inclusive logarithmically spaced grid between two positive bounds.
pub fn log_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if start <= 0.0 || end <= 0.0 || !start.is_finite() || !end.is_finite() {
        return None;
    }

    let mut grid: Vec<f64> = linear_grid(start.ln(), end.ln(), count)?
        .into_iter()
        .map(f64::exp)
        .collect();
    grid[0] = start;
    grid[count - 1] = end;
    Some(grid)
}

#[cfg(test)]
mod tests {
    use super::{linear_grid, log_grid};

    #[test]
    fn linear_grid_is_inclusive_and_rejects_invalid_counts() {
        assert_eq!(linear_grid(0.0, 1.0, 1), None);
        let grid = linear_grid(0.0, 2.0, 5).expect("grid");
        assert_eq!(grid, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        let decreasing = linear_grid(2.0, 0.0, 5).expect("grid");
        assert_eq!(decreasing, vec![2.0, 1.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn log_grid_spans_decades_evenly() {
        let grid = log_grid(1.0e-3, 10.0, 5).expect("grid");
        assert_eq!(grid[0], 1.0e-3);
        assert_eq!(grid[4], 10.0);
        assert!((grid[1] - 1.0e-2).abs() < 1.0e-15);
        assert!((grid[3] - 1.0).abs() < 1.0e-12);
        assert_eq!(log_grid(0.0, 1.0, 4), None);
    }
}
