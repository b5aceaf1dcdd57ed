use std::path::PathBuf;

use ndarray::{aview1, s, Array1, Axis};

use crate::simulation::Snapshot;
use crate::{Error, FiniteStateGrid};

/// How snapshots should be saved to file.
#[derive(Clone, Debug)]
pub struct SaveSettings {
    /// The path to the save file.
    pub filename: PathBuf,
    /// Whether or not to overwrite any possibly saved data. Otherwise new snapshots are
    /// appended to the existing datasets.
    pub overwrite: bool,
}

/// Appends snapshots to `snapshots/time` and the flattened, row-major `snapshots/states`.
pub(crate) struct SnapshotWriter {
    file: hdf5::File,
    nodes: usize,
    offset: usize,
}

impl SnapshotWriter {
    pub(crate) fn open(
        settings: &SaveSettings,
        grid: &FiniteStateGrid,
        delta_t: f64,
    ) -> Result<Self, Error> {
        let filename = &settings.filename;
        let nodes = grid.states().len();

        if filename.exists() && !settings.overwrite {
            let file = hdf5::File::append(filename)?;
            let offset = file.dataset("snapshots/time")?.shape()[0];
            return Ok(Self {
                file,
                nodes,
                offset,
            });
        }

        let file = hdf5::File::create(filename)?;
        let group = file.create_group("snapshots")?;
        group
            .new_dataset::<f64>()
            .shape(hdf5::Extent::resizable(0))
            .create("time")?;
        group
            .new_dataset::<f64>()
            .shape((hdf5::Extent::resizable(0), nodes))
            .create("states")?;

        // save grid layout and deltas as file attributes
        let shape = grid.shape().iter().map(|&n| n as u64).collect::<Vec<_>>();
        file.new_attr::<u64>()
            .shape(shape.len())
            .create("shape")?
            .write(shape.as_slice())?;
        file.new_attr::<f64>()
            .shape(grid.ndim())
            .create("spacing")?
            .write(grid.spacing())?;
        file.new_attr::<f64>()
            .shape(hdf5::Extents::Scalar)
            .create("time_step")?
            .write_scalar(&delta_t)?;

        Ok(Self {
            file,
            nodes,
            offset: 0,
        })
    }

    pub(crate) fn append(&mut self, snapshot: &Snapshot) -> Result<(), Error> {
        let row = self.offset;

        let time = self.file.dataset("snapshots/time")?;
        time.resize(row + 1)?;
        time.write_slice(aview1(&[snapshot.time]), s![row..row + 1])?;

        let states = self.file.dataset("snapshots/states")?;
        states.resize((row + 1, self.nodes))?;
        let flat = snapshot.states.iter().cloned().collect::<Array1<f64>>();
        states.write_slice(flat.insert_axis(Axis(0)).view(), s![row..row + 1, ..])?;

        self.offset += 1;
        Ok(())
    }
}
