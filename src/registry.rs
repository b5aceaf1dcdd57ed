//! Named, persistent collections of models, grids, solvers and simulation setups.
//!
//! A `Registry` is stored as a single JSON document. Loading a path that does not exist gives an
//! empty registry, so a fresh working directory needs no setup.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fdm::ExplicitSolver;
use crate::models::Model;
use crate::{Error, FiniteStateGrid, Resolution, Simulation, SimulationDescriptor};

/// Entries of one kind, keyed and listed by name.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Collection<T> {
    #[serde(skip)]
    kind: &'static str,
    entries: BTreeMap<String, T>,
}

impl<T> Collection<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Entry names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Adds `value` under a name that must not be taken yet.
    pub fn create(&mut self, name: impl Into<String>, value: T) -> Result<(), Error> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::AlreadyExists {
                collection: self.kind.to_string(),
                name,
            });
        }
        self.entries.insert(name, value);
        Ok(())
    }

    /// Adds or replaces `value`, returning the replaced entry.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        self.entries.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Result<&T, Error> {
        self.entries.get(name).ok_or_else(|| self.not_found(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut T, Error> {
        let kind = self.kind;
        self.entries.get_mut(name).ok_or_else(|| Error::NotFound {
            collection: kind.to_string(),
            name: name.to_string(),
        })
    }

    pub fn delete(&mut self, name: &str) -> Result<T, Error> {
        self.entries.remove(name).ok_or_else(|| self.not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn not_found(&self, name: &str) -> Error {
        Error::NotFound {
            collection: self.kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// A simulation setup that refers to registered components by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub model: String,
    pub grid: String,
    pub solver: String,
    pub time_range: (f64, f64),
    pub resolution: Resolution,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Stored")]
pub struct Registry {
    pub models: Collection<Model>,
    pub grids: Collection<FiniteStateGrid>,
    pub solvers: Collection<ExplicitSolver>,
    pub simulations: Collection<SimulationRecord>,
}

/// On-disk layout; missing sections read as empty.
#[derive(Deserialize)]
struct Stored {
    #[serde(default)]
    models: BTreeMap<String, Model>,
    #[serde(default)]
    grids: BTreeMap<String, FiniteStateGrid>,
    #[serde(default)]
    solvers: BTreeMap<String, ExplicitSolver>,
    #[serde(default)]
    simulations: BTreeMap<String, SimulationRecord>,
}

impl From<Stored> for Registry {
    fn from(stored: Stored) -> Self {
        let mut registry = Registry::new();
        registry.models.entries = stored.models;
        registry.grids.entries = stored.grids;
        registry.solvers.entries = stored.solvers;
        registry.simulations.entries = stored.simulations;
        registry
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            models: Collection::new("model"),
            grids: Collection::new("grid"),
            solvers: Collection::new("solver"),
            simulations: Collection::new("simulation"),
        }
    }

    /// Reads a registry from `path`, or an empty one if there is no such file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::File::open(path) {
            Ok(file) => {
                let registry = Self::from_reader(io::BufReader::new(file))?;
                tracing::debug!("loaded registry from {}", path.display());
                Ok(registry)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no registry at {}, starting empty", path.display());
                Ok(Self::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the registry to `path`, replacing any previous contents.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut writer = io::BufWriter::new(fs::File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        tracing::debug!("saved registry to {}", path.display());
        Ok(())
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_writer(&self, writer: impl Write) -> Result<(), Error> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Builds the simulation registered as `name` from copies of the components it refers to.
    pub fn instantiate(&self, name: &str) -> Result<Simulation<ExplicitSolver>, Error> {
        let record = self.simulations.get(name)?;
        Simulation::new(SimulationDescriptor {
            grid: self.grids.get(&record.grid)?.clone(),
            model: self.models.get(&record.model)?.clone(),
            solver: self.solvers.get(&record.solver)?.clone(),
            time_range: record.time_range,
            resolution: record.resolution,
        })
    }
}
