// src/fit.rs
//
// Least-squares polynomial fit of the (position, delay) samples via the
// normal equations. The position axis is normalized to [0, 1] over the
// observed sample range before solving; raw pixel positions raised to high
// powers would not survive f64.

use crate::types::Sample;
use anyhow::{bail, Result};
use std::fmt;

/// Fitted polynomial over the normalized coordinate
/// t = (position - domain.0) / (domain.1 - domain.0).
/// Coefficients are stored highest degree first.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
    domain: (f64, f64),
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    /// Position range the normalized coordinate maps over.
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Evaluates the fitted curve at a raw (unnormalized) position.
    pub fn eval(&self, position: f64) -> f64 {
        let t = (position - self.domain.0) / (self.domain.1 - self.domain.0);
        self.coeffs.iter().fold(0.0, |acc, &c| acc * t + c)
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "t = (y - {:.1}) / {:.1}",
            self.domain.0,
            self.domain.1 - self.domain.0
        )?;
        for (i, c) in self.coeffs.iter().enumerate() {
            writeln!(f, "  c[t^{}] = {:+.6e}", self.degree() - i, c)?;
        }
        Ok(())
    }
}

/// Fits a polynomial of the given degree minimizing squared error over the
/// samples. Degenerate inputs (an empty set, zero position spread, or a
/// singular system from fewer than degree + 1 distinct positions) are hard
/// errors; there is no automatic degree reduction.
pub fn fit_polynomial(samples: &[Sample], degree: usize) -> Result<Polynomial> {
    if samples.is_empty() {
        bail!("cannot fit a polynomial to an empty sample set");
    }

    let y_min = samples
        .iter()
        .map(|s| s.position)
        .fold(f64::INFINITY, f64::min);
    let y_max = samples
        .iter()
        .map(|s| s.position)
        .fold(f64::NEG_INFINITY, f64::max);
    let y_range = y_max - y_min;
    if y_range < f64::EPSILON {
        bail!(
            "all {} samples share one position; the fit is degenerate",
            samples.len()
        );
    }

    let order = degree + 1;

    // Moment sums of the normal equations: A[i][j] = Σ tⁱ⁺ʲ, b[i] = Σ delay·tⁱ.
    let mut moments = vec![0.0f64; 2 * degree + 1];
    let mut rhs = vec![0.0f64; order];
    for sample in samples {
        let t = (sample.position - y_min) / y_range;
        let mut power = 1.0;
        for (i, moment) in moments.iter_mut().enumerate() {
            *moment += power;
            if i < order {
                rhs[i] += sample.delay_ms * power;
            }
            power *= t;
        }
    }

    let mut matrix = vec![vec![0.0f64; order]; order];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = moments[i + j];
        }
    }

    // solve_dense returns coefficients lowest degree first.
    let mut coeffs = solve_dense(matrix, rhs)?;
    coeffs.reverse();

    Ok(Polynomial {
        coeffs,
        domain: (y_min, y_max),
    })
}

/// Solves Ax = b by Gaussian elimination with partial pivoting.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            bail!("normal equations are singular; not enough distinct samples for the requested degree");
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for j in col..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for col in (0..n).rev() {
        let mut acc = b[col];
        for j in (col + 1)..n {
            acc -= a[col][j] * x[j];
        }
        x[col] = acc / a[col][col];
        if !x[col].is_finite() {
            bail!("polynomial fit produced a non-finite coefficient");
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: f64, delay_ms: f64) -> Sample {
        Sample { position, delay_ms }
    }

    #[test]
    fn degree_one_through_two_points_reproduces_the_line() {
        let samples = [sample(0.0, 400.0), sample(575.0, 0.0)];
        let poly = fit_polynomial(&samples, 1).unwrap();

        for s in &samples {
            assert!(
                (poly.eval(s.position) - s.delay_ms).abs() < 1e-6,
                "eval({}) = {}, want {}",
                s.position,
                poly.eval(s.position),
                s.delay_ms
            );
        }
    }

    #[test]
    fn quadratic_samples_are_recovered_exactly() {
        // delay = 2t² - 3t + 5 over t = position / 100.
        let samples: Vec<Sample> = (0..=10)
            .map(|i| {
                let t = i as f64 / 10.0;
                sample(t * 100.0, 2.0 * t * t - 3.0 * t + 5.0)
            })
            .collect();

        let poly = fit_polynomial(&samples, 2).unwrap();
        for s in &samples {
            assert!((poly.eval(s.position) - s.delay_ms).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_sample_set_is_a_hard_error() {
        assert!(fit_polynomial(&[], 1).is_err());
    }

    #[test]
    fn single_position_is_degenerate() {
        let samples = [sample(10.0, 1.0), sample(10.0, 2.0), sample(10.0, 3.0)];
        assert!(fit_polynomial(&samples, 1).is_err());
    }

    #[test]
    fn too_few_samples_for_the_degree_is_singular() {
        let samples = [sample(0.0, 400.0), sample(575.0, 0.0)];
        assert!(fit_polynomial(&samples, 3).is_err());
    }

    #[test]
    fn refitting_the_same_samples_is_deterministic() {
        let samples: Vec<Sample> = (0..=20)
            .map(|i| sample(i as f64 * 28.75, 400.0 - i as f64 * 20.0 + (i % 3) as f64))
            .collect();

        let a = fit_polynomial(&samples, 4).unwrap();
        let b = fit_polynomial(&samples, 4).unwrap();
        assert_eq!(a.coefficients(), b.coefficients());
        assert_eq!(a.domain(), b.domain());
    }
}
