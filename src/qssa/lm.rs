//! Levenberg-Marquardt least squares for small parameter vectors
//!
//! Minimises `Σ (yᵢ - f(xᵢ; p))²` for a model with `N` parameters. The normal
//! matrix is damped with its own diagonal (Marquardt scaling), so the solver
//! is insensitive to the very different magnitudes of the parameters.
//! After convergence the parameter covariance is estimated as
//! `(JᵀJ)⁻¹ · SSR / (n - N)`, the unweighted least-squares convention.

use thiserror::Error;

/// A model `f(x; p)` with an analytic Jacobian.
pub trait LmModel<const N: usize> {
    fn evaluate(&self, x: f64, params: &[f64; N]) -> f64;
    fn jacobian_row(&self, x: f64, params: &[f64; N]) -> [f64; N];
}

#[derive(Debug, Clone, Copy)]
pub struct LmConfig {
    /// Maximum accepted-step iterations.
    pub max_iterations: usize,
    /// Relative reduction of the sum of squares below which the fit has converged.
    pub ftol: f64,
    /// Relative parameter step below which the fit has converged.
    pub xtol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Damping at which no downhill step is left to take.
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.5e-8,
            xtol: 1.5e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSolution<const N: usize> {
    pub params: [f64; N],
    /// `None` when there are no degrees of freedom left to estimate it.
    pub covariance: Option<[[f64; N]; N]>,
    /// Sum of squared residuals at `params`.
    pub chi2: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LmError {
    #[error("{samples} samples, at least {needed} needed")]
    TooFewSamples { samples: usize, needed: usize },
    #[error("non-finite samples")]
    NonFiniteSamples,
    #[error("singular normal matrix")]
    SingularNormalMatrix,
    #[error("parameters diverged")]
    NonFiniteParameters,
    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),
}

pub fn levenberg_marquardt<M, const N: usize>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    initial: [f64; N],
    config: &LmConfig,
) -> Result<LmSolution<N>, LmError>
where
    M: LmModel<N>,
{
    let n = xs.len().min(ys.len());
    if n < N {
        return Err(LmError::TooFewSamples {
            samples: n,
            needed: N,
        });
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(LmError::NonFiniteSamples);
    }

    let mut params = initial;
    let mut chi2 = compute_chi2(model, xs, ys, &params);
    let mut lambda = config.initial_lambda;
    let mut converged = chi2 == 0.0;
    let mut iterations = 0;

    while !converged && iterations < config.max_iterations {
        iterations += 1;
        let (hessian, gradient) = normal_equations(model, xs, ys, &params);

        loop {
            let mut damped = hessian;
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * hessian[i][i].max(f64::MIN_POSITIVE);
            }

            let Some(step) = solve(damped, gradient) else {
                lambda *= config.lambda_up;
                if lambda > config.max_lambda {
                    return Err(LmError::SingularNormalMatrix);
                }
                continue;
            };

            let mut trial = params;
            for (p, d) in trial.iter_mut().zip(step) {
                *p += d;
            }
            if trial.iter().any(|p| !p.is_finite()) {
                return Err(LmError::NonFiniteParameters);
            }

            let trial_chi2 = compute_chi2(model, xs, ys, &trial);
            if trial_chi2 <= chi2 {
                let reduction = chi2 - trial_chi2;
                let small_step = step
                    .iter()
                    .zip(&trial)
                    .all(|(d, p)| d.abs() <= config.xtol * (p.abs() + config.xtol));

                params = trial;
                chi2 = trial_chi2;
                lambda = (lambda * config.lambda_down).max(f64::MIN_POSITIVE);
                converged = reduction <= config.ftol * chi2 || small_step || chi2 == 0.0;
                break;
            }

            lambda *= config.lambda_up;
            if lambda > config.max_lambda {
                // No downhill direction remains: we sit on the minimum to
                // machine precision.
                converged = true;
                break;
            }
        }
    }

    if !converged {
        return Err(LmError::MaxIterations(iterations));
    }

    let (hessian, _) = normal_equations(model, xs, ys, &params);
    let inverse = invert(hessian).ok_or(LmError::SingularNormalMatrix)?;
    let covariance = (n > N).then(|| {
        let scale = chi2 / (n - N) as f64;
        inverse.map(|row| row.map(|v| v * scale))
    });

    Ok(LmSolution {
        params,
        covariance,
        chi2,
        iterations,
    })
}

fn compute_chi2<M: LmModel<N>, const N: usize>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &[f64; N],
) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = y - model.evaluate(x, params);
            r * r
        })
        .sum()
}

/// `JᵀJ` and `Jᵀr` at `params`.
fn normal_equations<M: LmModel<N>, const N: usize>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &[f64; N],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0; N]; N];
    let mut gradient = [0.0; N];

    for (&x, &y) in xs.iter().zip(ys) {
        let r = y - model.evaluate(x, params);
        let j = model.jacobian_row(x, params);
        for a in 0..N {
            gradient[a] += j[a] * r;
            for b in 0..N {
                hessian[a][b] += j[a] * j[b];
            }
        }
    }

    (hessian, gradient)
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve<const N: usize>(mut m: [[f64; N]; N], mut rhs: [f64; N]) -> Option<[f64; N]> {
    let scale = m
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tiny = scale * f64::EPSILON * N as f64;

    for col in 0..N {
        let pivot = (col..N).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() <= tiny {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..N {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..N {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0; N];
    for row in (0..N).rev() {
        let tail: f64 = (row + 1..N).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }
    Some(x)
}

fn invert<const N: usize>(m: [[f64; N]; N]) -> Option<[[f64; N]; N]> {
    let mut inverse = [[0.0; N]; N];
    for col in 0..N {
        let mut unit = [0.0; N];
        unit[col] = 1.0;
        let x = solve(m, unit)?;
        for row in 0..N {
            inverse[row][col] = x[row];
        }
    }
    Some(inverse)
}
