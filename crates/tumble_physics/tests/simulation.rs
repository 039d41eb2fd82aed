//! Scenario tests for the full detect → cache → solve → integrate pipeline

use std::sync::Arc;

use tumble_math::{Mat3, SpatialVector, Transform, Vec3};
use tumble_physics::{
    AgentCache, BodyKey, BodyRef, Integrator, LookupOutcome, PhysicsConfig, PhysicsWorld, RigidBody, Shape, ShapeType,
};

const DT: f64 = 1.0 / 60.0;

fn zero_gravity() -> PhysicsConfig {
    PhysicsConfig::new(Vec3::ZERO)
}

fn ground(world: &mut PhysicsWorld, centre: Vec3) -> BodyKey {
    let shape = Arc::new(Shape::cuboid(Vec3::new(10.0, 1.0, 10.0)).unwrap());
    world.add_body(
        RigidBody::new(shape, Transform::from_translation(centre))
            .unwrap()
            .with_static(true),
    )
}

// ==================== Contact Scenarios ====================

/// Two unit spheres of mass 1 a hair apart produce a candidate contact and no impulse
#[test]
fn test_nearly_touching_spheres_stay_put() {
    let mut world = PhysicsWorld::with_config(zero_gravity());
    let unit_density = 1.0 / (4.0 / 3.0 * std::f64::consts::PI);
    let sphere = Arc::new(Shape::sphere(1.0).unwrap());
    let a = world.add_body(RigidBody::new(sphere.clone(), Transform::IDENTITY).unwrap().with_density(unit_density).unwrap());
    let b = world.add_body(
        RigidBody::new(sphere, Transform::from_translation(Vec3::new(2.1, 0.0, 0.0)))
            .unwrap()
            .with_density(unit_density)
            .unwrap(),
    );
    assert!((world.get_body(a).unwrap().mass() - 1.0).abs() < 1e-12);

    world.step(DT);

    assert_eq!(world.contacts().len(), 1);
    let contact = &world.contacts()[0];
    assert!(!contact.is_penetrating());
    assert!((contact.penetration + 0.1).abs() < 1e-9);

    let stats = world.last_solve();
    assert!(stats.converged);
    assert_eq!(stats.rows, 3);
    assert_eq!(world.velocity(a).unwrap(), SpatialVector::ZERO);
    assert_eq!(world.velocity(b).unwrap(), SpatialVector::ZERO);
    assert_eq!(world.pose(b).unwrap().translation, Vec3::new(2.1, 0.0, 0.0));
}

/// A unit box resting flush on a static ground settles without sinking
#[test]
fn test_box_rests_on_ground() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, Vec3::new(0.0, -1.0, 0.0));
    let cube = world.add_body(
        RigidBody::new(Arc::new(Shape::cuboid(Vec3::ONE).unwrap()), Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap(),
    );

    for _ in 0..180 {
        world.step(DT);
    }

    let body = world.get_body(cube).unwrap();
    // The stored momentum carries the half step of gravity the solver cancels next frame
    assert!(body.last_mid_velocity().linear.length() < 1e-3);
    assert!(body.velocity().linear.y.abs() <= 9.81 * DT);
    assert!((body.position().y - 1.0).abs() < 0.01);
    assert!(body.orientation().abs_diff_eq(&Mat3::IDENTITY, 1e-3));

    assert_eq!(world.contacts().len(), 1);
    let contact = &world.contacts()[0];
    assert_eq!(contact.points().len(), 4);
    assert!(contact.penetration < 0.01);
}

/// A falling sphere is caught by speculative contacts instead of tunnelling
#[test]
fn test_dropped_sphere_comes_to_rest() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, Vec3::new(0.0, -1.0, 0.0));
    let ball = world.add_body(
        RigidBody::new(Arc::new(Shape::sphere(0.5).unwrap()), Transform::from_translation(Vec3::new(0.0, 3.0, 0.0)))
            .unwrap(),
    );

    let mut lowest = f64::INFINITY;
    for _ in 0..240 {
        world.step(DT);
        lowest = lowest.min(world.pose(ball).unwrap().translation.y);
    }

    assert!(lowest > 0.5 - 0.02);
    let y = world.pose(ball).unwrap().translation.y;
    assert!((y - 0.5).abs() < 0.02);
    assert!(world.get_body(ball).unwrap().last_mid_velocity().linear.length() < 1e-3);
}

/// Cache size affects performance only, never the simulated result
#[test]
fn test_cache_capacity_does_not_change_results() {
    fn build(capacity: usize) -> (PhysicsWorld, Vec<BodyKey>) {
        let mut world = PhysicsWorld::with_config(PhysicsConfig {
            agent_cache_capacity: capacity,
            ..Default::default()
        });
        let mut balls = Vec::new();
        for x in [0.0, 30.0, 60.0] {
            ground(&mut world, Vec3::new(x, -1.0, 0.0));
            let shape = Arc::new(Shape::sphere(0.5).unwrap());
            balls.push(world.add_body(
                RigidBody::new(shape, Transform::from_translation(Vec3::new(x, 0.6, 0.0)))
                    .unwrap()
                    .with_velocity(SpatialVector::linear(Vec3::new(1.0, 0.0, 0.0))),
            ));
        }
        (world, balls)
    }

    let (mut small, small_balls) = build(1);
    let (mut large, large_balls) = build(256);
    for _ in 0..60 {
        small.step(DT);
        large.step(DT);
    }

    assert!(small.agent_cache().stats().spares > 0);
    assert_eq!(large.agent_cache().stats().spares, 0);
    for (&s, &l) in small_balls.iter().zip(&large_balls) {
        let (ps, pl) = (small.pose(s).unwrap(), large.pose(l).unwrap());
        assert!(ps.abs_diff_eq(&pl, 1e-12));
        assert!((small.velocity(s).unwrap().linear - large.velocity(l).unwrap().linear).length() < 1e-12);
    }
    assert_eq!(small.contacts().len(), large.contacts().len());
}

// ==================== Integrator Properties ====================

/// Integrating a free body forward then backward restores it
///
/// The box has distinct principal moments so its world inertia changes with
/// orientation. With the mid-step inertia refined to convergence the round
/// trip is exact to rounding; the single default pass leaves an O(dt³)
/// orientation error.
#[test]
fn test_free_body_round_trip() {
    let shape = Arc::new(Shape::cuboid(Vec3::new(1.0, 0.5, 0.25)).unwrap());
    let start = Transform::new(Mat3::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalized(), 0.7), Vec3::new(1.0, -2.0, 0.5));
    let body = RigidBody::new(shape, start)
        .unwrap()
        .with_gravity(false)
        .with_velocity(SpatialVector::new(Vec3::new(0.3, -1.0, 2.0), Vec3::new(4.0, -1.5, 2.5)));
    let momentum = body.momentum();

    let mut converged = body.clone();
    let integrator = Integrator::new(10);
    integrator.evolve(&mut converged, DT);
    assert!(!converged.pose().abs_diff_eq(&start, 1e-6));
    integrator.evolve(&mut converged, -DT);

    assert!(converged.pose().abs_diff_eq(&start, 1e-10));
    assert!((converged.momentum() - momentum).linear.length() < 1e-12);
    assert!((converged.momentum() - momentum).angular.length() < 1e-12);

    let mut single = body;
    Integrator::default().evolve(&mut single, DT);
    Integrator::default().evolve(&mut single, -DT);
    assert!(single.pose().abs_diff_eq(&start, 2e-5));
    assert!((single.pose().translation - start.translation).length() < 1e-12);
    assert!((single.momentum() - momentum).angular.length() < 1e-12);
}

/// Kinetic energy change over a step matches the work done by the force
#[test]
fn test_energy_matches_work() {
    let shape = Arc::new(Shape::cuboid(Vec3::new(1.0, 0.5, 0.25)).unwrap());
    let mut body = RigidBody::new(shape, Transform::IDENTITY)
        .unwrap()
        .with_velocity(SpatialVector::new(Vec3::new(1.0, 0.0, 0.5), Vec3::new(0.2, 0.6, -0.3)));
    let force = SpatialVector::new(Vec3::new(0.0, 5.0, -2.0), Vec3::new(0.5, 0.0, 0.25));

    for &dt in &[0.02, 0.01, 0.005] {
        let mut stepped = body.clone();
        let ke0 = stepped.kinetic_energy();
        stepped.apply_force(force);
        Integrator::default().evolve(&mut stepped, dt);
        let ke1 = stepped.kinetic_energy();
        let work = stepped.last_mid_velocity().dot(force) * dt;
        assert!(
            (ke1 - ke0 - work).abs() <= dt * (ke0 + ke1 + work.abs()),
            "dt {}: energy change {} vs work {}",
            dt,
            ke1 - ke0,
            work
        );
    }

    // Pure linear force: the midpoint rule is exact
    body = body.with_velocity(SpatialVector::linear(Vec3::new(1.0, 2.0, 3.0)));
    let ke0 = body.kinetic_energy();
    body.apply_force(SpatialVector::linear(Vec3::new(-4.0, 0.0, 1.0)));
    Integrator::default().evolve(&mut body, 0.1);
    let work = body.last_mid_velocity().linear.dot(Vec3::new(-4.0, 0.0, 1.0)) * 0.1;
    assert!((body.kinetic_energy() - ke0 - work).abs() < 1e-12);
}

// ==================== Agent Cache ====================

/// Alternating lookups of two unrelated pairs never leak state between them
#[test]
fn test_alternating_pairs_do_not_cross_contaminate() {
    let mut arena: slotmap::SlotMap<BodyKey, ()> = slotmap::SlotMap::with_key();
    let keys: Vec<BodyKey> = (0..4).map(|_| arena.insert(())).collect();
    let refs: Vec<BodyRef> = keys.iter().map(|&k| BodyRef::new(k, ShapeType::Box)).collect();
    let pairs = [(refs[0], refs[1], Vec3::X), (refs[2], refs[3], Vec3::Y)];

    for capacity in [1, 2, 64] {
        let mut cache = AgentCache::new(capacity);
        for frame in 1..=20u64 {
            let (a, b, marker) = pairs[(frame % 2) as usize];
            let (agent, outcome) = cache.get_agent(a, b, frame);

            assert_eq!(agent.pair, (a.key, b.key));
            if let Some(axis) = agent.separating_axis {
                assert_eq!(axis, marker, "capacity {} frame {} ({:?})", capacity, frame, outcome);
            }
            if outcome == LookupOutcome::Spare {
                assert_eq!(agent.frames_in_contact, 0);
            }
            agent.separating_axis = Some(marker);
            agent.frames_in_contact += 1;
        }
    }
}
