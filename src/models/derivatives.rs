use std::collections::HashMap;

use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Name of the first derivative along `axis`, e.g. `x0`.
pub fn first(axis: usize) -> String {
    expand("x", axis)
}

/// Name of the pure second derivative along `axis`, e.g. `x1x1`.
pub fn second(axis: usize) -> String {
    expand("xx", axis)
}

/// Suffixes every letter of `base` with `axis`, so `xx` along axis 2 becomes `x2x2`.
pub fn expand(base: &str, axis: usize) -> String {
    base.chars().map(|c| format!("{c}{axis}")).collect()
}

/// Splits a derivative name into the axes it differentiates along, `x0x1` gives `[0, 1]`.
pub fn parse(name: &str) -> Result<Vec<usize>, Error> {
    let invalid = || Error::InvalidDerivativeName(name.to_string());

    let mut axes = Vec::new();
    let mut rest = name;
    while !rest.is_empty() {
        rest = rest.strip_prefix('x').ok_or_else(invalid)?;
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let axis = rest[..digits].parse::<usize>().map_err(|_| invalid())?;
        axes.push(axis);
        rest = &rest[digits..];
    }

    if axes.is_empty() {
        return Err(invalid());
    }
    Ok(axes)
}

/// The derivatives a model needs supplied to evaluate its right-hand side.
///
/// Names keep their registration order, which is the order `satisfied_by` reports them in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeRequirement {
    dimensions: usize,
    names: Vec<String>,
}

impl DerivativeRequirement {
    /// An empty requirement for a model over `dimensions` axes.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            names: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Registers `name`; registering a name twice keeps the first position.
    pub fn declare(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// Declares `base` expanded along each of `axes`, or along every axis when `axes` is `None`.
    pub fn for_axes(&mut self, base: &str, axes: Option<&[usize]>) {
        match axes {
            Some(axes) => axes.iter().for_each(|&axis| self.declare(expand(base, axis))),
            None => (0..self.dimensions).for_each(|axis| self.declare(expand(base, axis))),
        }
    }

    /// Fails with the first registered name missing from `supplied`.
    pub fn satisfied_by(&self, supplied: &Derivatives) -> Result<(), Error> {
        match self.names.iter().find(|name| !supplied.contains(name)) {
            Some(name) => Err(Error::MissingDerivative(name.clone())),
            None => Ok(()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Derivative tensors supplied to a model, by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Derivatives {
    values: HashMap<String, ArrayD<f64>>,
}

impl Derivatives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ArrayViewD<'_, f64>> {
        self.values.get(name).map(ArrayD::view)
    }

    /// Looks up `name`, which must be present and have the given shape.
    pub fn get_checked(&self, name: &str, shape: &[usize]) -> Result<ArrayViewD<'_, f64>, Error> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::MissingDerivative(name.to_string()))?;
        if value.shape() != shape {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                found: value.shape().to_vec(),
                expected: shape.to_vec(),
            });
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ArrayD<f64>)> for Derivatives {
    fn from_iter<I: IntoIterator<Item = (S, ArrayD<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
