//! Mesh-quality optimisation regressions: one optimisation pass on the
//! crossed unit-square triangle mesh, driven through the test presets.

use parafem::control::presets;
use parafem::geometry::quality;
use parafem::prelude::*;

fn build_node(levels: usize) -> RootMeshNode {
    let mut node = RootMeshNode::new(ConformalMesh::unit_square_tri_cross());
    node.add_part("bnd", MeshPart::whole_boundary(node.mesh()));
    for _ in 0..levels {
        node = node.refine(AdaptMode::None);
    }
    node
}

#[test]
fn optimise_improves_min_angle_on_level_3() {
    let node = build_node(3);

    // The structured crossed mesh starts at 45 degrees exactly.
    let initial = quality::min_angle(node.mesh());
    assert!((initial - 45.0).abs() < 1e-10, "initial angle {initial}");

    let meshopt_config = presets::tests::meshopt_config().unwrap();
    let solver_config = presets::tests::solver_config().unwrap();
    let mut control = MeshoptControl::from_config(
        node,
        &meshopt_config,
        "HyperelasticityDefault",
        &solver_config,
    )
    .unwrap();

    let status = control.optimise().unwrap();
    assert!(
        matches!(status, SolverStatus::Success | SolverStatus::MaxIter | SolverStatus::Stagnated),
        "unexpected status {status:?}"
    );

    let q = control.quality();
    assert!(
        q.min_angle > 50.0,
        "optimised min angle {} did not improve enough",
        q.min_angle
    );
    assert!(
        q.cell_size_defect <= 0.3,
        "cell size defect {}",
        q.cell_size_defect
    );
    assert!(q.min_quality >= 0.4, "shape quality {}", q.min_quality);
}

#[test]
fn dirichlet_boundary_stays_fixed() {
    let node = build_node(2);
    let before: Vec<_> = node
        .find_part("bnd")
        .unwrap()
        .vertices()
        .iter()
        .map(|&v| node.mesh().vertex(v))
        .collect();

    let meshopt_config = presets::tests::meshopt_config().unwrap();
    let solver_config = presets::tests::solver_config().unwrap();
    let mut control = MeshoptControl::from_config(
        node,
        &meshopt_config,
        "HyperelasticityDefault",
        &solver_config,
    )
    .unwrap();
    control.optimise().unwrap();

    let node = control.node();
    for (&v, old) in node.find_part("bnd").unwrap().vertices().iter().zip(&before) {
        let now = node.mesh().vertex(v);
        assert!((now - old).norm() < 1e-12, "boundary vertex {v} moved");
    }
}

/// The functional value never increases over an optimisation pass.
#[test]
fn optimisation_is_a_descent() {
    let node = build_node(2);
    let meshopt_config = presets::tests::meshopt_config().unwrap();
    let solver_config = presets::tests::solver_config().unwrap();

    let mut control = MeshoptControl::from_config(
        node,
        &meshopt_config,
        "HyperelasticityDefault",
        &solver_config,
    )
    .unwrap();
    let before = quality::min_angle(control.node().mesh());
    control.optimise().unwrap();
    let after = quality::min_angle(control.node().mesh());
    assert!(after >= before - 1e-12, "{after} < {before}");
}
