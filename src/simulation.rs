use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{ArrayD, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::fdm::ExplicitSolver;
use crate::models::{Model, PdeModel};
use crate::{ComputeDescriptor, Error, FiniteStateGrid, Solver};

#[cfg(feature = "hdf5")]
mod save;

#[cfg(feature = "hdf5")]
pub use save::SaveSettings;

/// How the simulated time interval is divided into steps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// A fixed number of equal steps.
    Steps(usize),
    /// Steps of at most the given size, rounded up to a whole number of steps.
    Delta(f64),
    /// The fewest equal steps that each stay within `safety` times the solver's stability limit.
    Stable { safety: f64 },
}

/// Describes a simulation.
pub struct SimulationDescriptor<S: Solver> {
    pub grid: FiniteStateGrid,
    pub model: Model,
    /// The `Solver` for the simulation.
    pub solver: S,
    /// Closed interval `[t0, t1]` to integrate over. The grid state is taken to be at `t0`.
    pub time_range: (f64, f64),
    pub resolution: Resolution,
}

/// The grid state after a completed step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed steps.
    pub step: usize,
    pub time: f64,
    pub states: ArrayD<f64>,
}

/// Requests that a running simulation stops before its next step.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Describes a simulation run.
#[derive(Default)]
pub struct RunDescriptor {
    /// Whether or not to show a progress bar.
    pub verbose: bool,
    pub cancel: Option<CancelToken>,
    /// Wall clock time after which the run stops with `Error::Timeout`.
    pub timeout: Option<Duration>,
    /// Number of steps after which the run stops with `Error::Timeout`.
    pub step_budget: Option<usize>,
    /// Where, if anywhere, to save the snapshots.
    #[cfg(feature = "hdf5")]
    pub save_settings: Option<SaveSettings>,
}

/// Binds a grid, a model and a solver to a time interval.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    try_from = "SimulationState<S>",
    bound(deserialize = "S: Solver + Deserialize<'de>")
)]
pub struct Simulation<S = ExplicitSolver> {
    grid: FiniteStateGrid,
    model: Model,
    solver: S,
    start: f64,
    end: f64,
    steps: usize,
    /// Completed steps.
    step: usize,
}

/// Serialized form of a `Simulation`, checked before use.
#[derive(Deserialize)]
struct SimulationState<S> {
    grid: FiniteStateGrid,
    model: Model,
    solver: S,
    start: f64,
    end: f64,
    steps: usize,
    step: usize,
}

impl<S: Solver> TryFrom<SimulationState<S>> for Simulation<S> {
    type Error = Error;

    fn try_from(state: SimulationState<S>) -> Result<Self, Error> {
        check_setup(&state.grid, &state.model, state.start, state.end)?;
        if state.steps == 0 {
            return Err(Error::InvalidTimeStep(f64::INFINITY));
        }
        if state.step > state.steps {
            return Err(Error::SnapshotOutOfRange {
                step: state.step,
                steps: state.steps,
            });
        }

        Ok(Self {
            grid: state.grid,
            model: state.model,
            solver: state.solver,
            start: state.start,
            end: state.end,
            steps: state.steps,
            step: state.step,
        })
    }
}

fn check_setup(grid: &FiniteStateGrid, model: &Model, start: f64, end: f64) -> Result<(), Error> {
    if !start.is_finite() || !end.is_finite() || end <= start {
        return Err(Error::InvalidTimeRange { start, end });
    }
    if model.dimensions() != grid.ndim() {
        return Err(Error::DimensionMismatch {
            model: model.dimensions(),
            grid: grid.ndim(),
        });
    }
    Ok(())
}

impl<S: Solver> Simulation<S> {
    /// Creates a new `Simulation` instance.
    pub fn new(desc: SimulationDescriptor<S>) -> Result<Self, Error> {
        let (start, end) = desc.time_range;
        check_setup(&desc.grid, &desc.model, start, end)?;

        let span = end - start;
        let steps = match desc.resolution {
            Resolution::Steps(0) => return Err(Error::InvalidTimeStep(f64::INFINITY)),
            Resolution::Steps(steps) => steps,
            Resolution::Delta(delta_t) => {
                if !delta_t.is_finite() || delta_t <= 0.0 {
                    return Err(Error::InvalidTimeStep(delta_t));
                }
                whole_steps(span / delta_t)
            }
            Resolution::Stable { safety } => {
                if !(safety > 0.0 && safety <= 1.0) {
                    return Err(Error::BadCoefficient {
                        name: "safety".to_string(),
                        reason: "must lie in (0, 1]".to_string(),
                    });
                }
                match desc.solver.stability_limit(&desc.grid, &desc.model) {
                    Some(limit) if limit <= 0.0 => {
                        return Err(Error::UnstableStep {
                            delta_t: span,
                            limit,
                        })
                    }
                    Some(limit) => whole_steps(span / (safety * limit)),
                    None => 1,
                }
            }
        };

        Ok(Self {
            grid: desc.grid,
            model: desc.model,
            solver: desc.solver,
            start,
            end,
            steps,
            step: 0,
        })
    }

    pub fn grid(&self) -> &FiniteStateGrid {
        &self.grid
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn time_range(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    /// Total number of steps over the time range.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn completed_steps(&self) -> usize {
        self.step
    }

    pub fn delta_t(&self) -> f64 {
        (self.end - self.start) / self.steps as f64
    }

    /// Time of the state currently held by the grid.
    pub fn time(&self) -> f64 {
        self.time_at(self.step)
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    fn time_at(&self, step: usize) -> f64 {
        if step >= self.steps {
            self.end
        } else {
            self.start + (self.end - self.start) * step as f64 / self.steps as f64
        }
    }

    /// Sets the state from node coordinates and rewinds to the start of the time range.
    pub fn initialize(&mut self, f: impl Fn(ArrayView1<f64>) -> f64) {
        self.grid.initialize(f);
        self.step = 0;
    }

    /// Sets the state and rewinds to the start of the time range.
    pub fn set_initial_state(&mut self, states: ArrayD<f64>) -> Result<(), Error> {
        self.grid.set_states(states)?;
        self.step = 0;
        Ok(())
    }

    /// Continues from a snapshot taken by this simulation or an identical one.
    pub fn restart_from(&mut self, snapshot: &Snapshot) -> Result<(), Error> {
        if snapshot.step > self.steps {
            return Err(Error::SnapshotOutOfRange {
                step: snapshot.step,
                steps: self.steps,
            });
        }
        self.grid.set_states(snapshot.states.clone())?;
        self.step = snapshot.step;
        Ok(())
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step,
            time: self.time(),
            states: self.grid.states().to_owned(),
        }
    }

    /// Lazily steps through the remaining time range, yielding a snapshot after every step.
    ///
    /// The first error ends the run. Dropping the iterator early leaves the simulation at the
    /// last completed step, from where a later run continues.
    pub fn run(&mut self, desc: RunDescriptor) -> Run<'_, S> {
        Run {
            sim: self,
            desc,
            started: None,
            taken: 0,
            bar: None,
            finished: false,
            #[cfg(feature = "hdf5")]
            writer: None,
        }
    }

    /// Runs to the end of the time range, collecting every snapshot.
    pub fn run_to_end(&mut self, desc: RunDescriptor) -> Result<Vec<Snapshot>, Error> {
        self.run(desc).collect()
    }

    fn advance(&mut self) -> Result<Snapshot, Error> {
        let (time, delta_t) = (self.time(), self.delta_t());
        self.solver.step(
            &mut self.grid,
            ComputeDescriptor {
                model: &self.model,
                time,
                delta_t,
            },
        )?;
        self.step += 1;
        Ok(self.snapshot())
    }
}

/// Number of steps for `ratio = span / Δt`, ignoring rounding noise on exact multiples.
fn whole_steps(ratio: f64) -> usize {
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    (steps as usize).max(1)
}

impl<S: Solver> fmt::Display for Simulation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulation of `{}` model:\n\t- `{}` method\n\t- Δx = {:?}\n\t- Δt = {:e} ({} steps)",
            self.model.name(),
            self.solver.name(),
            self.grid.spacing(),
            self.delta_t(),
            self.steps,
        )
    }
}

/// A run in progress, see `Simulation::run`.
pub struct Run<'s, S: Solver> {
    sim: &'s mut Simulation<S>,
    desc: RunDescriptor,
    started: Option<Instant>,
    taken: usize,
    bar: Option<indicatif::ProgressBar>,
    finished: bool,
    #[cfg(feature = "hdf5")]
    writer: Option<save::SnapshotWriter>,
}

impl<S: Solver> Run<'_, S> {
    fn start(&mut self) -> Result<(), Error> {
        self.started = Some(Instant::now());

        let remaining = self.sim.steps.saturating_sub(self.sim.step);
        tracing::info!(
            "start of simulation of `{}` model (`{}` method, Δt={:e}, {} of {} steps remaining)",
            self.sim.model.name(),
            self.sim.solver.name(),
            self.sim.delta_t(),
            remaining,
            self.sim.steps,
        );

        if self.desc.verbose {
            self.bar = Some(indicatif::ProgressBar::new(remaining as u64));
        }

        #[cfg(feature = "hdf5")]
        if let Some(settings) = &self.desc.save_settings {
            self.writer = Some(save::SnapshotWriter::open(
                settings,
                &self.sim.grid,
                self.sim.delta_t(),
            )?);
        }

        Ok(())
    }

    fn interruption(&self) -> Option<Error> {
        let time = self.sim.time();
        if let Some(cancel) = &self.desc.cancel {
            if cancel.is_cancelled() {
                return Some(Error::Cancelled { time });
            }
        }

        let timed_out = self
            .desc
            .timeout
            .zip(self.started)
            .map_or(false, |(timeout, started)| started.elapsed() >= timeout);
        let exhausted = self.desc.step_budget.map_or(false, |budget| self.taken >= budget);
        if timed_out || exhausted {
            return Some(Error::Timeout {
                time,
                steps: self.taken,
            });
        }

        None
    }

    fn fail(&mut self, err: Error) -> Error {
        self.finished = true;
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
        tracing::warn!("simulation stopped at t = {}: {}", self.sim.time(), err);
        err
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        tracing::info!(
            "finished simulation of `{}` model at t = {}",
            self.sim.model.name(),
            self.sim.time()
        );
    }
}

impl<S: Solver> Iterator for Run<'_, S> {
    type Item = Result<Snapshot, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.started.is_none() {
            if let Err(err) = self.start() {
                return Some(Err(self.fail(err)));
            }
        }
        if self.sim.is_finished() {
            self.finish();
            return None;
        }
        if let Some(err) = self.interruption() {
            return Some(Err(self.fail(err)));
        }

        let snapshot = match self.sim.advance() {
            Ok(snapshot) => snapshot,
            Err(err) => return Some(Err(self.fail(err))),
        };
        self.taken += 1;
        tracing::trace!("step {} (t = {})", snapshot.step, snapshot.time);

        #[cfg(feature = "hdf5")]
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writer.append(&snapshot) {
                return Some(Err(self.fail(err)));
            }
        }

        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
        Some(Ok(snapshot))
    }
}
