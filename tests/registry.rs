use npdes::prelude::*;

fn populated() -> Registry {
    let mut registry = Registry::new();
    let mut line =
        FiniteStateGrid::new(vec![GridDimension::new(0.0, 1.0, 10).unwrap()]).unwrap();
    line.initialize(|x| (-25.0 * (x[0] - 0.5).powi(2)).exp());

    registry.grids.create("line", line).unwrap();
    registry
        .models
        .create(
            "heat",
            AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
                dimensions: 1,
                velocity: 0.0.into(),
                diffusivity: 0.1.into(),
            })
            .unwrap()
            .into(),
        )
        .unwrap();
    registry
        .solvers
        .create(
            "rk4",
            ExplicitSolver::new(ExplicitSolverDescriptor {
                scheme: TimeScheme::RungeKutta4,
                boundary: BoundaryPolicy::FixedValue(0.0),
                ..Default::default()
            })
            .unwrap(),
        )
        .unwrap();
    registry
        .simulations
        .create(
            "cooling",
            SimulationRecord {
                model: "heat".to_string(),
                grid: "line".to_string(),
                solver: "rk4".to_string(),
                time_range: (0.0, 0.2),
                resolution: Resolution::Stable { safety: 0.9 },
            },
        )
        .unwrap();
    registry
}

#[test]
fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(dir.path().join("registry.json")).unwrap();
    assert!(registry.models.is_empty());
    assert!(registry.grids.is_empty());
    assert!(registry.solvers.is_empty());
    assert!(registry.simulations.is_empty());
}

#[test]
fn save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");

    let registry = populated();
    registry.save(&path).unwrap();
    let loaded = Registry::load(&path).unwrap();
    assert_eq!(loaded, registry);
    assert_eq!(loaded.solvers.list(), vec!["rk4"]);

    // loaded entries keep their collection names for errors
    assert!(matches!(
        loaded.models.get("wave"),
        Err(Error::NotFound { collection, .. }) if collection == "model"
    ));
}

#[test]
fn malformed_entries_are_rejected() {
    let json = r#"{
        "models": {
            "bad": { "kind": "AdvectionDiffusion", "dimensions": 1, "velocity": 0.0, "diffusivity": -1.0 }
        }
    }"#;
    assert!(matches!(
        Registry::from_reader(json.as_bytes()),
        Err(Error::Json(_))
    ));
}

#[test]
fn instantiated_simulations_are_independent() {
    let mut registry = populated();
    let mut sim = registry.instantiate("cooling").unwrap();
    let snapshots = sim.run_to_end(RunDescriptor::default()).unwrap();
    assert_eq!(snapshots.len(), sim.steps());

    // the registered grid still holds the initial state
    let initial = registry.grids.get("line").unwrap();
    assert_ne!(initial.states(), sim.grid().states());
    assert!(initial.read(&[5]).unwrap() > sim.grid().read(&[5]).unwrap());

    registry.grids.delete("line").unwrap();
    assert!(matches!(
        registry.instantiate("cooling"),
        Err(Error::NotFound { collection, name }) if collection == "grid" && name == "line"
    ));
}
