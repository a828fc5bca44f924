//! Statistical compatibility of two track states on the same surface.
//!
//! The score is the squared Mahalanobis distance of the parameter difference
//! under the summed covariance:
//!
//! χ² = Δᵀ (C₁ + C₂)⁻¹ Δ,   Δ = x₁ − x₂
//!
//! A degenerate comparison (summed covariance not positive definite, states
//! on different surfaces) is reported as [`Compatibility::Indeterminate`],
//! never as a very good or very bad score.

use globalmuon_env::TrackState;
use nalgebra::linalg::Cholesky;
use serde::{Deserialize, Serialize};

/// Why a comparison could not produce a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degeneracy {
    /// Summed covariance is singular or not positive definite
    SingularCovariance,
    /// The states are expressed on different surfaces
    SurfaceMismatch,
    /// The quadratic form overflowed or produced NaN
    NonFiniteScore,
}

/// Outcome of a state comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Compatibility {
    Compatible(f64),
    Incompatible(f64),
    Indeterminate(Degeneracy),
}

impl Compatibility {
    /// Conservative reading: an indeterminate comparison is not a match.
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible(_))
    }

    /// The χ² score, if one could be computed.
    pub fn chi2(&self) -> Option<f64> {
        match self {
            Compatibility::Compatible(chi2) | Compatibility::Incompatible(chi2) => Some(*chi2),
            Compatibility::Indeterminate(_) => None,
        }
    }
}

/// χ² gate between two states.
#[derive(Debug, Clone, Copy)]
pub struct StateComparator {
    max_chi2: f64,
}

impl StateComparator {
    pub fn new(max_chi2: f64) -> Self {
        Self { max_chi2 }
    }

    pub fn max_chi2(&self) -> f64 {
        self.max_chi2
    }

    /// Compare two states expressed on the same reference surface.
    pub fn compare(&self, a: &TrackState, b: &TrackState) -> Compatibility {
        if a.surface() != b.surface() {
            return Compatibility::Indeterminate(Degeneracy::SurfaceMismatch);
        }

        let residual = a.parameter_difference(b);
        let summed = a.covariance() + b.covariance();

        // Cholesky fails on anything that is not positive definite,
        // which covers exactly singular sums as well as indefinite ones
        let inverse = match Cholesky::new(summed) {
            Some(chol) => chol.inverse(),
            None => return Compatibility::Indeterminate(Degeneracy::SingularCovariance),
        };

        let chi2 = (residual.transpose() * inverse * residual)[(0, 0)];
        if !chi2.is_finite() {
            return Compatibility::Indeterminate(Degeneracy::NonFiniteScore);
        }

        if chi2 > self.max_chi2 {
            Compatibility::Incompatible(chi2)
        } else {
            Compatibility::Compatible(chi2)
        }
    }
}
