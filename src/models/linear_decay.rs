use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::models::{DerivativeRequirement, Derivatives, PdeModel, StabilityHints};
use crate::Error;

/// Pointwise linear decay, `u_t = -k u`. Needs no spatial derivatives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DecayRecord", into = "DecayRecord")]
pub struct LinearDecayModel {
    rate: f64,
    derivatives: DerivativeRequirement,
}

#[derive(Serialize, Deserialize)]
struct DecayRecord {
    dimensions: usize,
    rate: f64,
}

impl TryFrom<DecayRecord> for LinearDecayModel {
    type Error = Error;

    fn try_from(record: DecayRecord) -> Result<Self, Error> {
        Self::new(record.dimensions, record.rate)
    }
}

impl From<LinearDecayModel> for DecayRecord {
    fn from(model: LinearDecayModel) -> Self {
        Self {
            dimensions: model.derivatives.dimensions(),
            rate: model.rate,
        }
    }
}

impl LinearDecayModel {
    pub fn new(dimensions: usize, rate: f64) -> Result<Self, Error> {
        if dimensions == 0 {
            return Err(Error::NoDimensions);
        }
        if !rate.is_finite() {
            return Err(Error::BadCoefficient {
                name: "rate".to_string(),
                reason: "must be finite".to_string(),
            });
        }

        Ok(Self {
            rate,
            derivatives: DerivativeRequirement::new(dimensions),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl PdeModel for LinearDecayModel {
    fn dimensions(&self) -> usize {
        self.derivatives.dimensions()
    }

    fn required_derivatives(&self) -> &DerivativeRequirement {
        &self.derivatives
    }

    fn rhs(&self, state: ArrayViewD<f64>, _derivatives: &Derivatives) -> Result<ArrayD<f64>, Error> {
        if state.ndim() != self.dimensions() {
            return Err(Error::DimensionMismatch {
                model: self.dimensions(),
                grid: state.ndim(),
            });
        }
        Ok(state.mapv(|u| -self.rate * u))
    }

    fn stability_hints(&self) -> StabilityHints {
        StabilityHints {
            reaction_rate: self.rate.abs(),
            ..Default::default()
        }
    }

    fn name(&self) -> &'static str {
        "Linear decay"
    }
}
