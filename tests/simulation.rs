use std::time::Duration;

use npdes::prelude::*;

fn decay(steps: usize) -> Simulation {
    let mut sim = Simulation::new(SimulationDescriptor {
        grid: FiniteStateGrid::new(vec![GridDimension::new(0.0, 1.0, 8).unwrap()]).unwrap(),
        model: LinearDecayModel::new(1, 1.0).unwrap().into(),
        solver: ExplicitSolver::default(),
        time_range: (0.0, 1.0),
        resolution: Resolution::Steps(steps),
    })
    .unwrap();
    sim.initialize(|x| 1.0 + x[0]);
    sim
}

fn diffusion() -> Simulation {
    let model = AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
        dimensions: 1,
        velocity: 0.3.into(),
        diffusivity: 0.1.into(),
    })
    .unwrap();
    let mut sim = Simulation::new(SimulationDescriptor {
        grid: FiniteStateGrid::new(vec![GridDimension::new(0.0, 1.0, 10).unwrap()]).unwrap(),
        model: model.into(),
        solver: ExplicitSolver::new(ExplicitSolverDescriptor {
            boundary: BoundaryPolicy::Reflect,
            ..Default::default()
        })
        .unwrap(),
        time_range: (0.0, 0.5),
        resolution: Resolution::Steps(20),
    })
    .unwrap();
    sim.initialize(|x| (-30.0 * (x[0] - 0.4).powi(2)).exp());
    sim
}

#[test]
fn yields_a_snapshot_per_step() {
    let mut sim = decay(10);
    let mut snapshots = sim.run_to_end(RunDescriptor::default()).unwrap();

    assert_eq!(snapshots.len(), 10);
    assert!(snapshots.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(snapshots.first().map(|s| s.step), Some(1));
    assert_eq!(snapshots.last().map(|s| s.time), Some(1.0));

    // snapshots own their data
    let second = snapshots[1].states.clone();
    snapshots[0].states.fill(-1.0);
    assert_eq!(snapshots[1].states, second);
    assert_eq!(sim.grid().states(), snapshots[9].states);

    // u(1) = 0.9^10 u(0) under forward Euler
    let expected = 0.9f64.powi(10);
    assert!((sim.grid().read(&[0]).unwrap() - expected).abs() < 1e-12);
}

#[test]
fn cancellation_stops_before_the_next_step() {
    let mut sim = decay(10);
    let cancel = CancelToken::new();
    let mut run = sim.run(RunDescriptor {
        cancel: Some(cancel.clone()),
        ..Default::default()
    });

    for _ in 0..3 {
        assert!(run.next().unwrap().is_ok());
    }
    cancel.cancel();
    assert!(matches!(run.next(), Some(Err(Error::Cancelled { time })) if (time - 0.3).abs() < 1e-12));
    assert!(run.next().is_none());
    drop(run);

    assert_eq!(sim.completed_steps(), 3);
}

#[test]
fn step_budget_and_timeout() {
    let mut sim = decay(10);
    let results = sim
        .run(RunDescriptor {
            step_budget: Some(4),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    assert_eq!(results.len(), 5);
    assert!(matches!(results[4], Err(Error::Timeout { steps: 4, .. })));

    // a later run picks up where the last one stopped
    let rest = sim.run_to_end(RunDescriptor::default()).unwrap();
    assert_eq!(rest.len(), 6);
    assert_eq!(rest[0].step, 5);

    let mut sim = decay(10);
    let result = sim.run_to_end(RunDescriptor {
        timeout: Some(Duration::ZERO),
        ..Default::default()
    });
    assert!(matches!(result, Err(Error::Timeout { steps: 0, .. })));
    assert_eq!(sim.completed_steps(), 0);
}

#[test]
fn restart_from_snapshot_reproduces_the_run() {
    let mut full = diffusion();
    let reference = full.run_to_end(RunDescriptor::default()).unwrap();

    let mut restarted = diffusion();
    restarted.restart_from(&reference[7]).unwrap();
    assert_eq!(restarted.time(), reference[7].time);
    let rest = restarted.run_to_end(RunDescriptor::default()).unwrap();

    assert_eq!(rest.len(), reference.len() - 8);
    assert_eq!(rest.last(), reference.last());

    let beyond = Snapshot {
        step: 21,
        ..reference[0].clone()
    };
    assert!(matches!(
        restarted.restart_from(&beyond),
        Err(Error::SnapshotOutOfRange { step: 21, steps: 20 })
    ));
}

#[test]
fn first_error_ends_the_run() {
    let model = AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
        dimensions: 1,
        velocity: 0.0.into(),
        diffusivity: 1.0.into(),
    })
    .unwrap();
    let mut sim = Simulation::new(SimulationDescriptor {
        grid: FiniteStateGrid::new(vec![GridDimension::new(0.0, 1.0, 10).unwrap()]).unwrap(),
        model: model.into(),
        solver: ExplicitSolver::default(),
        time_range: (0.0, 1.0),
        resolution: Resolution::Steps(2),
    })
    .unwrap();
    sim.initialize(|x| x[0]);
    let before = sim.grid().states().to_owned();

    let mut run = sim.run(RunDescriptor::default());
    assert!(matches!(run.next(), Some(Err(Error::UnstableStep { .. }))));
    assert!(run.next().is_none());
    drop(run);

    assert_eq!(sim.grid().states(), before);
    assert_eq!(sim.completed_steps(), 0);
}

#[test]
fn stable_resolution_runs_cleanly() {
    let mut sim = Simulation::new(SimulationDescriptor {
        grid: FiniteStateGrid::new(vec![
            GridDimension::new(0.0, 1.0, 16).unwrap(),
            GridDimension::new(0.0, 1.0, 16).unwrap(),
        ])
        .unwrap(),
        model: AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
            dimensions: 2,
            velocity: vec![1.0, -0.5].into(),
            diffusivity: vec![0.01, 0.02].into(),
        })
        .unwrap()
        .into(),
        solver: ExplicitSolver::new(ExplicitSolverDescriptor {
            boundary: BoundaryPolicy::Periodic,
            parallel: true,
            ..Default::default()
        })
        .unwrap(),
        time_range: (0.0, 0.25),
        resolution: Resolution::Stable { safety: 0.5 },
    })
    .unwrap();
    sim.initialize(|x| (std::f64::consts::TAU * x[0]).sin() * (std::f64::consts::TAU * x[1]).cos());

    let snapshots = sim.run_to_end(RunDescriptor::default()).unwrap();
    assert_eq!(snapshots.len(), sim.steps());
    assert!(sim.is_finished());
    assert_eq!(sim.time(), 0.25);
}

#[test]
fn simulations_serialize_mid_run() {
    let mut sim = diffusion();
    sim.run(RunDescriptor::default()).take(5).for_each(drop);
    assert_eq!(sim.completed_steps(), 5);

    let json = serde_json::to_string(&sim).unwrap();
    let mut restored: Simulation = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.completed_steps(), 5);

    let a = sim.run_to_end(RunDescriptor::default()).unwrap();
    let b = restored.run_to_end(RunDescriptor::default()).unwrap();
    assert_eq!(a, b);
}

fn periodic_advection(scheme: TimeScheme, diffusivity: f64) -> Result<Simulation, Error> {
    let model = AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
        dimensions: 1,
        velocity: 1.0.into(),
        diffusivity: diffusivity.into(),
    })?;
    let mut sim = Simulation::new(SimulationDescriptor {
        grid: FiniteStateGrid::new(vec![GridDimension::new(0.0, 1.0, 32)?])?,
        model: model.into(),
        solver: ExplicitSolver::new(ExplicitSolverDescriptor {
            scheme,
            boundary: BoundaryPolicy::Periodic,
            ..Default::default()
        })?,
        time_range: (0.0, 20.0),
        resolution: Resolution::Stable { safety: 0.5 },
    })?;
    sim.initialize(|x| (8.0 * std::f64::consts::PI * x[0]).sin());
    Ok(sim)
}

fn peak(sim: &Simulation) -> f64 {
    sim.grid().states().iter().fold(0.0f64, |max, u| max.max(u.abs()))
}

#[test]
fn stable_resolution_keeps_advection_bounded() {
    for scheme in [TimeScheme::ForwardEuler, TimeScheme::Heun] {
        assert!(matches!(
            periodic_advection(scheme, 0.0),
            Err(Error::UnstableStep { limit, .. }) if limit == 0.0
        ));
    }

    let mut sim = periodic_advection(TimeScheme::RungeKutta4, 0.0).unwrap();
    let initial = peak(&sim);
    sim.run_to_end(RunDescriptor::default()).unwrap();
    assert!(sim.steps() > 100);
    assert!(peak(&sim) <= initial + 1e-9);

    let mut sim = periodic_advection(TimeScheme::ForwardEuler, 0.05).unwrap();
    sim.run_to_end(RunDescriptor::default()).unwrap();
    assert!(peak(&sim) <= initial + 1e-9);
}
