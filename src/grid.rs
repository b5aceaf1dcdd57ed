//! Discretized domains and the state held on them.

mod boundary;

pub use boundary::{BoundaryPolicy, Ghost};

use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One axis of a discretized domain.
// node[0] <-> lower_bound
// node[i] <-> lower_bound + i * delta
// node[cells] <-> upper_bound
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DimensionRecord")]
pub struct GridDimension {
    lower_bound: f64,
    upper_bound: f64,
    cells: usize,
}

#[derive(Deserialize)]
struct DimensionRecord {
    lower_bound: f64,
    upper_bound: f64,
    cells: usize,
}

impl TryFrom<DimensionRecord> for GridDimension {
    type Error = Error;

    fn try_from(record: DimensionRecord) -> Result<Self, Error> {
        GridDimension::new(record.lower_bound, record.upper_bound, record.cells)
    }
}

impl GridDimension {
    /// Creates a dimension spanning `[lower_bound, upper_bound]` with `cells` cells.
    pub fn new(lower_bound: f64, upper_bound: f64, cells: usize) -> Result<Self, Error> {
        let finite = lower_bound.is_finite() && upper_bound.is_finite();
        if cells == 0 || !finite || upper_bound <= lower_bound {
            return Err(Error::InvalidDimension {
                lower: lower_bound,
                upper: upper_bound,
                cells,
            });
        }

        Ok(Self {
            lower_bound,
            upper_bound,
            cells,
        })
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn length(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// The number of cells along this axis.
    pub fn size(&self) -> usize {
        self.cells
    }

    /// The number of nodes along this axis, one more than the number of cells.
    pub fn nodes(&self) -> usize {
        self.cells + 1
    }

    pub fn delta(&self) -> f64 {
        self.length() / self.cells as f64
    }

    /// The physical coordinate of node `index`.
    pub fn coordinate(&self, index: usize) -> f64 {
        if index == self.cells {
            self.upper_bound
        } else {
            self.lower_bound + self.delta() * index as f64
        }
    }

    /// Evenly spaced node coordinates, both bounds included.
    pub fn span(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.nodes(), |i| self.coordinate(i))
    }
}

/// An N-dimensional mesh of nodes holding a scalar state.
///
/// `domain` has shape `(nodes_0, ..., nodes_{k-1}, k)` and stores the coordinates of every node,
/// `states` has shape `(nodes_0, ..., nodes_{k-1})`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridRecord", into = "GridRecord")]
pub struct FiniteStateGrid {
    dimensions: Vec<GridDimension>,
    deltas: Vec<f64>,
    domain: ArrayD<f64>,
    states: ArrayD<f64>,
}

/// Serialized layout of a grid, everything else is derived from the dimensions.
#[derive(Serialize, Deserialize)]
struct GridRecord {
    dimensions: Vec<GridDimension>,
    states: ArrayD<f64>,
}

impl From<FiniteStateGrid> for GridRecord {
    fn from(grid: FiniteStateGrid) -> Self {
        Self {
            dimensions: grid.dimensions,
            states: grid.states,
        }
    }
}

impl TryFrom<GridRecord> for FiniteStateGrid {
    type Error = Error;

    fn try_from(record: GridRecord) -> Result<Self, Error> {
        let mut grid = FiniteStateGrid::new(record.dimensions)?;
        grid.set_states(record.states)?;
        Ok(grid)
    }
}

impl FiniteStateGrid {
    /// Creates a grid over `dimensions`, in axis order, with a zero state.
    pub fn new(dimensions: Vec<GridDimension>) -> Result<Self, Error> {
        if dimensions.is_empty() {
            return Err(Error::NoDimensions);
        }

        let ndim = dimensions.len();
        let spans = dimensions
            .iter()
            .map(GridDimension::span)
            .collect::<Vec<_>>();
        let deltas = dimensions
            .iter()
            .map(GridDimension::delta)
            .collect::<Vec<_>>();
        let shape = dimensions
            .iter()
            .map(GridDimension::nodes)
            .collect::<Vec<_>>();

        let mut domain_shape = shape.clone();
        domain_shape.push(ndim);
        let domain = ArrayD::from_shape_fn(IxDyn(&domain_shape), |index| {
            let axis = index[ndim];
            spans[axis][index[axis]]
        });
        let states = ArrayD::zeros(IxDyn(&shape));

        Ok(Self {
            dimensions,
            deltas,
            domain,
            states,
        })
    }

    pub fn dimensions(&self) -> &[GridDimension] {
        &self.dimensions
    }

    pub fn ndim(&self) -> usize {
        self.dimensions.len()
    }

    /// Node counts per axis.
    pub fn shape(&self) -> &[usize] {
        self.states.shape()
    }

    /// Node spacing per axis.
    pub fn spacing(&self) -> &[f64] {
        &self.deltas
    }

    pub fn domain(&self) -> ArrayViewD<'_, f64> {
        self.domain.view()
    }

    pub fn states(&self) -> ArrayViewD<'_, f64> {
        self.states.view()
    }

    pub fn read(&self, indices: &[usize]) -> Result<f64, Error> {
        self.states
            .get(indices)
            .copied()
            .ok_or_else(|| self.out_of_bounds(indices))
    }

    pub fn write(&mut self, indices: &[usize], value: f64) -> Result<(), Error> {
        match self.states.get_mut(indices) {
            Some(node) => {
                *node = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(indices)),
        }
    }

    /// Reads the node `offset` steps away from `indices` along `axis`.
    ///
    /// Positions outside of the grid are resolved with `policy`.
    pub fn neighbors(
        &self,
        indices: &[usize],
        axis: usize,
        offset: isize,
        policy: BoundaryPolicy,
    ) -> Result<f64, Error> {
        if axis >= self.ndim() {
            return Err(self.out_of_bounds(indices));
        }
        // validates `indices`
        self.read(indices)?;

        let position = indices[axis] as isize + offset;
        match policy.resolve(position, self.shape()[axis]) {
            Ghost::Node(node) => {
                let mut moved = indices.to_vec();
                moved[axis] = node;
                self.read(&moved)
            }
            Ghost::Value(value) => Ok(value),
        }
    }

    /// The physical coordinates of the node at `indices`.
    pub fn coordinates(&self, indices: &[usize]) -> Result<Vec<f64>, Error> {
        self.read(indices)?;
        Ok(self
            .dimensions
            .iter()
            .zip(indices)
            .map(|(dimension, &i)| dimension.coordinate(i))
            .collect())
    }

    /// Sets every node to `f` evaluated at the node coordinates.
    pub fn initialize(&mut self, f: impl Fn(ArrayView1<f64>) -> f64) {
        let last = Axis(self.ndim());
        Zip::from(&mut self.states)
            .and(self.domain.lanes(last))
            .for_each(|state, x| *state = f(x));
    }

    /// Replaces the state, which must match the grid shape.
    pub fn set_states(&mut self, states: ArrayD<f64>) -> Result<(), Error> {
        if states.shape() != self.shape() {
            return Err(Error::BadInit {
                array_name: "state".to_string(),
                input_shape: states.shape().to_vec(),
                expected_shape: self.shape().to_vec(),
            });
        }
        self.states = states;
        Ok(())
    }

    /// Swaps in a fully computed next state.
    pub(crate) fn commit(&mut self, next: ArrayD<f64>) {
        debug_assert_eq!(next.shape(), self.states.shape());
        self.states = next;
    }

    fn out_of_bounds(&self, indices: &[usize]) -> Error {
        Error::OutOfBounds {
            indices: indices.iter().map(|&i| i as isize).collect(),
            shape: self.shape().to_vec(),
        }
    }
}
