//! Interpolating B-splines through the fitted coefficients
//!
//! The smoother builds one not-a-knot interpolating spline per coefficient
//! column. A spline is stored as its (knots, coefficients, degree) triple,
//! which is also what the coefficient archive persists.
//!
//! Evaluation outside the knot span continues the boundary polynomial. That
//! keeps the inversion usable a few nanometres past the fitted grid, but it
//! is extrapolation: use [`SmoothedCoefficientCurve::covers`] to check.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::qssa::table::CoefficientTable;

pub const DEFAULT_DEGREE: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum SmoothError {
    #[error("at least 2 points are needed to interpolate, got {0}")]
    TooFewPoints(usize),
    #[error("only odd spline degrees are supported, got {0}")]
    EvenDegree(usize),
    #[error("interpolation abscissae must be strictly increasing and finite")]
    NotIncreasing,
    #[error("x and y lengths differ ({0} vs {1})")]
    LengthMismatch(usize, usize),
    #[error("collocation matrix is singular")]
    Singular,
    #[error("invalid spline: {0}")]
    InvalidSpline(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SplineParts")]
pub struct BSpline {
    knots: Vec<f64>,
    coefficients: Vec<f64>,
    degree: usize,
}

#[derive(Deserialize)]
struct SplineParts {
    knots: Vec<f64>,
    coefficients: Vec<f64>,
    degree: usize,
}

impl TryFrom<SplineParts> for BSpline {
    type Error = SmoothError;

    fn try_from(parts: SplineParts) -> Result<Self, SmoothError> {
        BSpline::new(parts.knots, parts.coefficients, parts.degree)
    }
}

impl BSpline {
    pub fn new(knots: Vec<f64>, coefficients: Vec<f64>, degree: usize) -> Result<Self, SmoothError> {
        if coefficients.len() < degree + 1 {
            return Err(SmoothError::InvalidSpline(format!(
                "{} coefficients cannot carry degree {}",
                coefficients.len(),
                degree
            )));
        }
        if knots.len() != coefficients.len() + degree + 1 {
            return Err(SmoothError::InvalidSpline(format!(
                "expected {} knots, got {}",
                coefficients.len() + degree + 1,
                knots.len()
            )));
        }
        if knots.iter().chain(&coefficients).any(|v| !v.is_finite())
            || knots.windows(2).any(|w| w[1] < w[0])
        {
            return Err(SmoothError::InvalidSpline(
                "knots must be finite and non-decreasing".to_string(),
            ));
        }
        if knots[degree] >= knots[coefficients.len()] {
            return Err(SmoothError::InvalidSpline("empty base interval".to_string()));
        }
        Ok(Self {
            knots,
            coefficients,
            degree,
        })
    }

    /// Not-a-knot interpolant of odd `degree` through `(xs, ys)`.
    pub fn interpolate(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, SmoothError> {
        let n = xs.len();
        if n != ys.len() {
            return Err(SmoothError::LengthMismatch(n, ys.len()));
        }
        if degree % 2 == 0 {
            return Err(SmoothError::EvenDegree(degree));
        }
        if n < degree + 1 {
            return Err(SmoothError::TooFewPoints(n));
        }
        if xs.iter().any(|x| !x.is_finite()) || xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SmoothError::NotIncreasing);
        }

        let k = degree;
        let half = (k + 1) / 2;
        let mut knots = Vec::with_capacity(n + k + 1);
        knots.extend(std::iter::repeat_n(xs[0], k + 1));
        knots.extend_from_slice(&xs[half..n - half]);
        knots.extend(std::iter::repeat_n(xs[n - 1], k + 1));

        // Collocation matrix, one row per data point.
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, &x) in xs.iter().enumerate() {
            let span = find_span(&knots, n, k, x);
            let basis = basis_functions(&knots, span, k, x);
            for (j, b) in basis.into_iter().enumerate() {
                matrix[i][span - k + j] = b;
            }
        }

        let coefficients = solve_dense(matrix, ys.to_vec()).ok_or(SmoothError::Singular)?;
        BSpline::new(knots, coefficients, k)
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// `[t_k, t_n]`, the interval the spline was built on.
    pub fn base_interval(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.coefficients.len()])
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.coefficients.len();
        let span = find_span(&self.knots, n, self.degree, x);
        basis_functions(&self.knots, span, self.degree, x)
            .into_iter()
            .enumerate()
            .map(|(j, b)| b * self.coefficients[span - self.degree + j])
            .sum()
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

/// Index `l` in `[k, n-1]` with `t_l <= x < t_{l+1}`, clamped at both ends
/// so that points outside the base interval use the boundary polynomial.
fn find_span(knots: &[f64], n: usize, k: usize, x: f64) -> usize {
    let last_le = knots[..=n].partition_point(|&t| t <= x).saturating_sub(1);
    last_le.clamp(k, n - 1)
}

/// Non-zero basis functions `N_{span-k..=span, k}(x)` (Cox-de Boor).
fn basis_functions(knots: &[f64], span: usize, k: usize, x: f64) -> Vec<f64> {
    let mut values = vec![0.0; k + 1];
    let mut left = vec![0.0; k + 1];
    let mut right = vec![0.0; k + 1];
    values[0] = 1.0;

    for j in 1..=k {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }

    values
}

/// Gaussian elimination with partial pivoting. The collocation matrix is
/// banded, so zero multipliers are skipped.
fn solve_dense(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        let (upper, lower) = m.split_at_mut(col + 1);
        let pivot_row = &upper[col];
        for (offset, row) in lower.iter_mut().enumerate() {
            let factor = row[col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                row[c] -= factor * pivot_row[c];
            }
            rhs[col + 1 + offset] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|c| m[row][c] * x[c]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }
    Some(x)
}

/// Two splines, one per coefficient column, sharing the fitted support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedCoefficientCurve {
    pub coef1: BSpline,
    pub coef2: BSpline,
}

impl SmoothedCoefficientCurve {
    /// Wavelength range of the table the curve was built from.
    pub fn support(&self) -> (f64, f64) {
        self.coef1.base_interval()
    }

    /// Whether `wavelength` is inside the fitted range, i.e. not extrapolated.
    pub fn covers(&self, wavelength: f64) -> bool {
        let (lo, hi) = self.support();
        (lo..=hi).contains(&wavelength)
    }

    pub fn evaluate(&self, wave: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let outside = wave.iter().filter(|&&wl| !self.covers(wl)).count();
        if outside > 0 {
            let (lo, hi) = self.support();
            debug!(
                "extrapolating coefficients at {} wavelength(s) outside [{}, {}] nm",
                outside, lo, hi
            );
        }
        (self.coef1.evaluate_many(wave), self.coef2.evaluate_many(wave))
    }
}

/// Smoothed curve plus the degree that was actually used.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothReport {
    pub curve: SmoothedCoefficientCurve,
    pub requested_degree: usize,
    pub degree: usize,
}

impl SmoothReport {
    pub fn degree_reduced(&self) -> bool {
        self.degree < self.requested_degree
    }
}

/// Cubic interpolating curve through the table (degree reduced if needed).
pub fn smooth(table: &CoefficientTable) -> Result<SmoothedCoefficientCurve, SmoothError> {
    smooth_with_degree(table, DEFAULT_DEGREE).map(|report| report.curve)
}

pub fn smooth_with_degree(
    table: &CoefficientTable,
    degree: usize,
) -> Result<SmoothReport, SmoothError> {
    if degree % 2 == 0 {
        return Err(SmoothError::EvenDegree(degree));
    }
    let n = table.len();
    if n < 2 {
        return Err(SmoothError::TooFewPoints(n));
    }

    // Largest odd degree the table can carry.
    let usable = if n > degree {
        degree
    } else if (n - 1) % 2 == 1 {
        n - 1
    } else {
        n - 2
    };
    if usable < degree {
        warn!(
            "coefficient table has {} rows; spline degree reduced from {} to {}",
            n, degree, usable
        );
    }

    let wave = table.wavelengths();
    let curve = SmoothedCoefficientCurve {
        coef1: BSpline::interpolate(&wave, &table.coef1(), usable)?,
        coef2: BSpline::interpolate(&wave, &table.coef2(), usable)?,
    };

    Ok(SmoothReport {
        curve,
        requested_degree: degree,
        degree: usable,
    })
}
