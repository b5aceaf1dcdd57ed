//! Central finite differences over a state array.
//!
//! These compute the derivative tensors a model declares in its `DerivativeRequirement`.

use ndarray::{ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, Axis, Zip};

use crate::grid::{BoundaryPolicy, Ghost};
use crate::models::derivatives::{self, DerivativeRequirement, Derivatives};
use crate::Error;

/// Copies `state` shifted by `offset` nodes along `axis`, so `out[i] = state[i + offset]`.
///
/// Positions past the edges are resolved with `policy`. With `parallel` set, the lanes along
/// `axis` are filled on the rayon thread pool.
pub fn shifted(
    state: ArrayViewD<f64>,
    axis: usize,
    offset: isize,
    policy: BoundaryPolicy,
    parallel: bool,
) -> ArrayD<f64> {
    let nodes = state.len_of(Axis(axis));
    let mut out = ArrayD::zeros(state.raw_dim());

    let fill = |mut out_lane: ArrayViewMut1<f64>, lane: ArrayView1<f64>| {
        for (i, out) in out_lane.iter_mut().enumerate() {
            *out = match policy.resolve(i as isize + offset, nodes) {
                Ghost::Node(j) => lane[j],
                Ghost::Value(value) => value,
            };
        }
    };

    let zip = Zip::from(out.lanes_mut(Axis(axis))).and(state.lanes(Axis(axis)));
    if parallel {
        zip.par_for_each(fill);
    } else {
        zip.for_each(fill);
    }

    out
}

/// `(u[i+1] - u[i-1]) / 2h` along `axis`.
pub fn first_derivative(
    state: ArrayViewD<f64>,
    axis: usize,
    delta: f64,
    policy: BoundaryPolicy,
    parallel: bool,
) -> ArrayD<f64> {
    let mut out = shifted(state.view(), axis, 1, policy, parallel);
    out -= &shifted(state, axis, -1, policy, parallel);
    out *= 0.5 / delta;
    out
}

/// `(u[i+1] - 2u[i] + u[i-1]) / h²` along `axis`.
pub fn second_derivative(
    state: ArrayViewD<f64>,
    axis: usize,
    delta: f64,
    policy: BoundaryPolicy,
    parallel: bool,
) -> ArrayD<f64> {
    let mut out = shifted(state.view(), axis, 1, policy, parallel);
    out += &shifted(state.view(), axis, -1, policy, parallel);
    out.scaled_add(-2.0, &state);
    out *= (delta * delta).recip();
    out
}

/// Computes the derivative called `name`, e.g. `x0`, `x1x1` or `x0x1`.
///
/// Repeated axes use the compact three point second difference, mixed derivatives are
/// composed from first differences.
pub fn derivative(
    name: &str,
    state: ArrayViewD<f64>,
    deltas: &[f64],
    policy: BoundaryPolicy,
    parallel: bool,
) -> Result<ArrayD<f64>, Error> {
    let axes = derivatives::parse(name)?;
    let mut counts = vec![0usize; state.ndim()];
    for axis in axes {
        match counts.get_mut(axis) {
            Some(count) => *count += 1,
            None => return Err(Error::InvalidDerivativeName(name.to_string())),
        }
    }

    let mut result = state.to_owned();
    for (axis, &count) in counts.iter().enumerate() {
        for _ in 0..count / 2 {
            result = second_derivative(result.view(), axis, deltas[axis], policy, parallel);
        }
        if count % 2 == 1 {
            result = first_derivative(result.view(), axis, deltas[axis], policy, parallel);
        }
    }

    Ok(result)
}

/// Computes every derivative named by `requirement`.
pub fn supply(
    requirement: &DerivativeRequirement,
    state: ArrayViewD<f64>,
    deltas: &[f64],
    policy: BoundaryPolicy,
    parallel: bool,
) -> Result<Derivatives, Error> {
    debug_assert_eq!(deltas.len(), state.ndim());
    requirement
        .iter()
        .map(|name| -> Result<_, Error> {
            Ok((name, derivative(name, state.view(), deltas, policy, parallel)?))
        })
        .collect()
}
