use npdes::prelude::*;

fn main() {
    tracing_subscriber::fmt::init();

    let diffusivity: f64 = 0.05;

    let grid = FiniteStateGrid::new(vec![
        GridDimension::new(-1.0, 1.0, 64).unwrap(),
        GridDimension::new(-1.0, 1.0, 64).unwrap(),
    ])
    .unwrap();

    let model = AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
        dimensions: 2,
        velocity: vec![0.2, 0.0].into(),
        diffusivity: diffusivity.into(),
    })
    .unwrap();

    let mut simulation = Simulation::new(SimulationDescriptor {
        grid,
        model: model.into(),
        solver: ExplicitSolver::new(ExplicitSolverDescriptor {
            scheme: TimeScheme::Heun,
            boundary: BoundaryPolicy::ZeroGradient,
            parallel: true,
            ..Default::default()
        })
        .unwrap(),
        time_range: (0.1, 1.0),
        resolution: Resolution::Stable { safety: 0.9 },
    })
    .unwrap();

    // start from the exact solution at t0 so the error can be tracked
    let (t0, t1) = simulation.time_range();
    let exact = |sim: &Simulation, t: f64| {
        sim.model()
            .analytic_solution(sim.grid().domain(), t)
            .unwrap()
    };
    let initial = exact(&simulation, t0);
    simulation.set_initial_state(initial).unwrap();

    println!("\n{}\n", simulation);

    let snapshots = simulation
        .run_to_end(RunDescriptor {
            verbose: true,
            ..Default::default()
        })
        .unwrap();

    let last = snapshots.last().unwrap();
    let error = (&last.states - &exact(&simulation, t1))
        .iter()
        .fold(0.0f64, |max, e| max.max(e.abs()));

    println!(
        "\n-- Result --\n\
        snapshots:    {}\n\
        t:            {:<9.3}\n\
        max error:    {:<9.2e}\n",
        snapshots.len(),
        last.time,
        error,
    );
}
