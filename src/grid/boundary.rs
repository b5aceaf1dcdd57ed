use serde::{Deserialize, Serialize};

/// How stencils read values that lie outside of the grid.
///
/// Every policy is expressed as a ghost node: a stencil that steps `k` nodes past an edge reads
/// the value the policy assigns to that ghost position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Mirror the state about the edge node, `u[-k] = u[k]`.
    Reflect,
    /// The first and last node along an axis are the same physical point, `u[-k] = u[n - k]`.
    Periodic,
    /// Every ghost node holds a fixed value.
    FixedValue(f64),
    /// Ghost nodes copy the nearest edge node, `u[-k] = u[0]`.
    #[default]
    ZeroGradient,
}

/// Where a (possibly out of range) stencil position reads its value from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ghost {
    /// An in-grid node index along the axis.
    Node(usize),
    Value(f64),
}

impl BoundaryPolicy {
    /// Resolves position `index` along an axis holding `nodes` nodes.
    pub fn resolve(&self, index: isize, nodes: usize) -> Ghost {
        let last = nodes as isize - 1;
        if (0..=last).contains(&index) {
            return Ghost::Node(index as usize);
        }

        match *self {
            BoundaryPolicy::ZeroGradient => Ghost::Node(index.clamp(0, last) as usize),
            BoundaryPolicy::Reflect => {
                if last == 0 {
                    return Ghost::Node(0);
                }
                let period = 2 * last;
                let folded = index.rem_euclid(period);
                Ghost::Node(if folded <= last { folded } else { period - folded } as usize)
            }
            BoundaryPolicy::Periodic => {
                if last == 0 {
                    return Ghost::Node(0);
                }
                // node `last` and node 0 coincide, so the period is the cell count
                Ghost::Node(index.rem_euclid(last) as usize)
            }
            BoundaryPolicy::FixedValue(value) => Ghost::Value(value),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoundaryPolicy::Reflect => "reflect",
            BoundaryPolicy::Periodic => "periodic",
            BoundaryPolicy::FixedValue(_) => "fixed-value",
            BoundaryPolicy::ZeroGradient => "zero-gradient",
        }
    }
}
