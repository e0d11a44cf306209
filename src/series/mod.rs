// src/series/mod.rs

//! Term sources feeding the engine.
//!
//! The engine only sees the `TermSource` trait. `TaylorSeries` is the stock
//! source: the Taylor expansion of a catalogued holomorphic function about a
//! base point `a`, evaluated at `z0`, produced one term at a time:
//!
//! ```text
//! term_n = f^(n)(a) / n! * (z0 - a)^n
//! ```
//!
//! Derivatives come from closed forms, not symbolic differentiation.

use crate::error::SeriesError;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// One value of the term stream.
pub type Term = Complex64;

/// An endless, non-restartable stream of complex terms.
pub trait TermSource {
    fn next_term(&mut self) -> Term;
}

impl<F> TermSource for F
where
    F: FnMut() -> Term,
{
    fn next_term(&mut self) -> Term {
        self()
    }
}

/// Functions with closed-form Taylor coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFunction {
    /// `exp(z)`
    #[default]
    Exp,
    /// `1 / (1 - z)`
    Geometric,
    /// `sin(z)`
    Sin,
    /// `cos(z)`
    Cos,
    /// `log(1 + z)`
    Log1p,
}

impl SeriesFunction {
    pub fn expression(&self) -> &'static str {
        match self {
            SeriesFunction::Exp => "exp(z)",
            SeriesFunction::Geometric => "1/(1-z)",
            SeriesFunction::Sin => "sin(z)",
            SeriesFunction::Cos => "cos(z)",
            SeriesFunction::Log1p => "log(1+z)",
        }
    }

    /// Direct evaluation, used to compare against partial sums.
    pub fn evaluate(&self, z: Complex64) -> Complex64 {
        let one = Complex64::new(1.0, 0.0);
        match self {
            SeriesFunction::Exp => z.exp(),
            SeriesFunction::Geometric => (one - z).inv(),
            SeriesFunction::Sin => z.sin(),
            SeriesFunction::Cos => z.cos(),
            SeriesFunction::Log1p => (one + z).ln(),
        }
    }
}

impl FromStr for SeriesFunction {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "exp" | "exp(z)" => Ok(SeriesFunction::Exp),
            "geometric" | "1/(1-z)" => Ok(SeriesFunction::Geometric),
            "sin" | "sin(z)" => Ok(SeriesFunction::Sin),
            "cos" | "cos(z)" => Ok(SeriesFunction::Cos),
            "log1p" | "log(1+z)" | "ln(1+z)" => Ok(SeriesFunction::Log1p),
            _ => Err(SeriesError::UnknownFunction(s.to_string())),
        }
    }
}

impl fmt::Display for SeriesFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}

/// Parses `1+1.5i`, `1+1.5j`, `-0.5i`, `2` and the like.
pub fn parse_complex(s: &str) -> Result<Complex64, SeriesError> {
    let normalized: String = s
        .trim()
        .chars()
        .map(|c| if c == 'j' || c == 'J' { 'i' } else { c })
        .collect();
    Complex64::from_str(&normalized).map_err(|_| SeriesError::InvalidComplex(s.to_string()))
}

/// Taylor expansion of `function` about `base_point`, evaluated at `eval_point`.
///
/// Each term's magnitude is one running product: times a fixed step, and
/// divided by `n` for exp, sin and cos. `n!` and `(z0 - a)^n` are never formed
/// on their own, so a convergent series yields finite terms for any `n`.
#[derive(Debug, Clone)]
pub struct TaylorSeries {
    function: SeriesFunction,
    base_point: Complex64,
    eval_point: Complex64,
    /// Index of the next term.
    n: u64,
    /// `(z0 - a)^n / n!` for exp/sin/cos, `((z0 - a) * r)^n` for the
    /// ratio-coefficient functions.
    magnitude: Complex64,
    step: Complex64,
    /// `f^(n)(a)` for `n mod 4`, or `r` for 1/(1-z).
    derivatives: [Complex64; 4],
    partial_sum: Complex64,
}

impl TaylorSeries {
    pub fn new(function: SeriesFunction, base_point: Complex64, eval_point: Complex64) -> Self {
        let one = Complex64::new(1.0, 0.0);
        let a = base_point;
        let difference = eval_point - base_point;
        let (step, derivatives) = match function {
            SeriesFunction::Exp => (difference, [a.exp(); 4]),
            SeriesFunction::Sin => (difference, [a.sin(), a.cos(), -a.sin(), -a.cos()]),
            SeriesFunction::Cos => (difference, [a.cos(), -a.sin(), -a.cos(), a.sin()]),
            // f^(n)(a) / n! = (1 - a)^-(n+1)
            SeriesFunction::Geometric => {
                let ratio = (one - a).inv();
                (difference * ratio, [ratio; 4])
            }
            // f^(n)(a) / n! = (-1)^(n-1) / (n (1 + a)^n) for n >= 1
            SeriesFunction::Log1p => (difference * (one + a).inv(), [(one + a).ln(); 4]),
        };
        TaylorSeries {
            function,
            base_point,
            eval_point,
            n: 0,
            magnitude: one,
            step,
            derivatives,
            partial_sum: Complex64::new(0.0, 0.0),
        }
    }

    pub fn function(&self) -> SeriesFunction {
        self.function
    }

    pub fn base_point(&self) -> Complex64 {
        self.base_point
    }

    pub fn eval_point(&self) -> Complex64 {
        self.eval_point
    }

    /// Number of terms produced so far.
    pub fn terms_produced(&self) -> u64 {
        self.n
    }

    /// Sum of every term produced so far.
    pub fn partial_sum(&self) -> Complex64 {
        self.partial_sum
    }

    fn divides_by_factorial(&self) -> bool {
        matches!(
            self.function,
            SeriesFunction::Exp | SeriesFunction::Sin | SeriesFunction::Cos
        )
    }

    /// Factor multiplying `magnitude` in the current term.
    fn factor(&self) -> Complex64 {
        match self.function {
            SeriesFunction::Log1p if self.n > 0 => {
                let sign = if self.n % 2 == 1 { 1.0 } else { -1.0 };
                Complex64::new(sign / self.n as f64, 0.0)
            }
            _ => self.derivatives[(self.n % 4) as usize],
        }
    }
}

impl TermSource for TaylorSeries {
    fn next_term(&mut self) -> Term {
        let term = self.factor() * self.magnitude;
        self.partial_sum += term;

        self.n += 1;
        self.magnitude *= self.step;
        if self.divides_by_factorial() {
            self.magnitude /= self.n as f64;
        }
        term
    }
}
