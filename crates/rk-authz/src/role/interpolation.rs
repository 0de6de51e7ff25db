//! Rank Interpolation
//!
//! Computes the weight of a role spliced in directly above or below an
//! existing one. The math is pure; reading the neighbours and writing the row
//! happens in the service layer.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::entity::Role;
use crate::error::{AuthzError, Result};

/// Distance stepped away from the reference when it has no neighbour.
pub const DEFAULT_WEIGHT_STEP: f64 = 100.0;

/// Where the new role goes relative to the reference role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Directly below (larger weight)
    Subordinate,
    /// Directly above (smaller weight)
    Superior,
}

/// Closest-integer midpoint of two bounding weights.
///
/// The arithmetic mean is used as-is when it is already an integer or the
/// bounds are at most 1 apart. Otherwise the nearest integer strictly inside
/// the open interval wins, halves rounding away from zero.
pub fn midpoint_weight(a: f64, b: f64) -> f64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mean = low / 2.0 + high / 2.0;
    if mean.fract() == 0.0 || high - low <= 1.0 {
        return mean;
    }

    let nearest = mean.round();
    let other = if nearest > mean { mean.floor() } else { mean.ceil() };
    [nearest, other]
        .into_iter()
        .find(|candidate| *candidate > low && *candidate < high)
        .unwrap_or(mean)
}

/// Open interval a new weight must fall into, `None` bounds being infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightWindow {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl WeightWindow {
    pub fn contains(&self, weight: f64) -> bool {
        self.low.map_or(true, |low| weight > low) && self.high.map_or(true, |high| weight < high)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightPlanner {
    step: f64,
}

impl Default for WeightPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT_STEP)
    }
}

impl WeightPlanner {
    pub fn new(step: f64) -> Self {
        Self { step }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// The window between `reference` and its nearest ranked neighbour in the
    /// requested direction. An unranked reference counts as +infinity.
    pub fn window(&self, reference: &Role, siblings: &[Role], placement: Placement) -> WeightWindow {
        let r = reference.effective_weight();
        let others = siblings
            .iter()
            .filter(|s| !s.is_same(reference) && s.category_id == reference.category_id)
            .filter_map(|s| s.weight);

        match placement {
            Placement::Subordinate => WeightWindow {
                low: reference.weight.or(Some(f64::INFINITY)),
                high: others.filter(|w| *w > r).min_by(f64::total_cmp),
            },
            Placement::Superior => WeightWindow {
                low: others.filter(|w| *w < r).max_by(f64::total_cmp),
                high: reference.weight,
            },
        }
    }

    /// Weight for a role placed next to `reference`.
    ///
    /// `siblings` are the roles currently in the reference's category. A
    /// requested weight is honoured only when it already lies inside the
    /// window; otherwise it is replaced by the computed value.
    pub fn plan(
        &self,
        reference: &Role,
        siblings: &[Role],
        placement: Placement,
        requested: Option<f64>,
    ) -> Result<Option<f64>> {
        let window = self.window(reference, siblings, placement);

        if let Some(weight) = requested {
            if weight.is_finite() && window.contains(weight) {
                return Ok(Some(weight));
            }
            warn!(
                requested = weight,
                reference = %reference.name,
                ?placement,
                "Requested weight violates the ordering, using computed weight"
            );
        }

        let Some(r) = reference.weight else {
            let alone = !siblings
                .iter()
                .any(|s| !s.is_same(reference) && s.category_id == reference.category_id);
            return Ok(alone.then_some(self.step));
        };

        let weight = match placement {
            Placement::Subordinate => match window.high {
                Some(neighbour) => midpoint_weight(r, neighbour),
                None => r + self.step,
            },
            Placement::Superior => match window.low {
                Some(neighbour) => midpoint_weight(neighbour, r),
                None => r - self.step,
            },
        };

        if !window.contains(weight) {
            return Err(AuthzError::validation(format!(
                "no representable weight between {:?} and {:?}",
                window.low, window.high
            )));
        }
        Ok(Some(weight))
    }
}
