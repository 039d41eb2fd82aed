//! tumble - headless rigid-body simulation
//!
//! Builds the configured demo scene, runs it for the configured duration at
//! a fixed timestep and logs body energies along the way.

use tumble::config::AppConfig;
use tumble::scene::SceneBuilder;
use tumble::systems::SimulationSystem;
use tumble_physics::PhysicsWorld;

fn main() {
    // Load configuration before logging so the configured level applies
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    env_logger::Builder::new()
        .parse_filters(&config.debug.log_level)
        .parse_default_env()
        .init();
    log::info!("Starting tumble");
    if let Some(e) = config_error {
        log::warn!("Failed to load config: {}. Using defaults.", e);
    }

    let mut scene = match SceneBuilder::from_config(&config) {
        Ok(scene) => scene,
        Err(e) => {
            log::error!("Failed to build scene: {}", e);
            std::process::exit(1);
        }
    };

    let mut sim = SimulationSystem::new(config.physics.timestep, config.physics.max_frame_time);
    let interval = config.debug.report_interval;
    let mut last_report = 0;
    while sim.simulated_time() < config.scene.duration {
        let report = sim.update(&mut scene.world, config.physics.timestep);
        if report.steps == 0 {
            break;
        }
        if interval > 0 && sim.total_steps() - last_report >= interval {
            last_report = sim.total_steps();
            report_energies(&scene.world, sim.simulated_time());
        }
    }

    let stats = scene.world.agent_cache().stats();
    log::info!(
        "Simulated {:.2}s in {} steps; {} contacts at the end, cache hits {} / claims {} / spares {}",
        sim.simulated_time(),
        sim.total_steps(),
        scene.world.contacts().len(),
        stats.hits,
        stats.claims,
        stats.spares
    );

    if config.debug.dump_contacts {
        for contact in scene.world.contacts() {
            match scene.world.debug_dump(contact.body_a, contact.body_b) {
                Ok(dump) => log::info!("Contact pair:\n{}", dump),
                Err(e) => log::warn!("Could not dump contact pair: {}", e),
            }
        }
    }
}

fn report_energies(world: &PhysicsWorld, time: f64) {
    let total: f64 = world.body_keys().filter_map(|k| world.kinetic_energy(k)).sum();
    log::info!("t = {:.2}s: total kinetic energy {:.6}", time, total);
    for key in world.body_keys() {
        if let (Some(pose), Some(energy)) = (world.pose(key), world.kinetic_energy(key)) {
            let p = pose.translation;
            log::debug!("  {:?} at ({:.3}, {:.3}, {:.3}) KE {:.6}", key, p.x, p.y, p.z, energy);
        }
    }
}
