//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`TUMBLE_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};
use std::path::Path;
use tumble_math::Vec3;
use tumble_physics::{PhysicsConfig, SolverConfig};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Physics configuration
    #[serde(default)]
    pub physics: SimulationConfig,
    /// Demo scene layout
    #[serde(default)]
    pub scene: SceneConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`TUMBLE_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        // Load user config (optional)
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // Environment variables override everything
        // TUMBLE_PHYSICS__TIMESTEP=0.01 -> physics.timestep = 0.01
        figment = figment.merge(Env::prefixed("TUMBLE_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Physics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gravity acceleration [x, y, z]
    pub gravity: [f64; 3],
    /// Fixed physics step in seconds
    pub timestep: f64,
    /// Longest frame the fixed-step loop will catch up on
    pub max_frame_time: f64,
    /// Gap at which contacts start being generated
    pub contact_margin: f64,
    /// Slots in the collision agent cache
    pub agent_cache_capacity: usize,
    /// Mid-step inertia refinement passes
    pub refinement_iterations: u32,
    /// Maximum contact solver sweeps per step
    pub solver_iterations: usize,
    /// Impulse change below which the solver stops early
    pub solver_tolerance: f64,
    /// Fraction of penetration corrected per step
    pub baumgarte: f64,
    /// Penetration allowed before correction kicks in
    pub slop: f64,
    /// Approach speed above which contacts bounce
    pub restitution_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let physics = PhysicsConfig::default();
        Self {
            gravity: physics.gravity.to_array(),
            timestep: 1.0 / 60.0,
            max_frame_time: 0.25,
            contact_margin: physics.contact_margin,
            agent_cache_capacity: physics.agent_cache_capacity,
            refinement_iterations: physics.refinement_iterations,
            solver_iterations: physics.solver.iterations,
            solver_tolerance: physics.solver.tolerance,
            baumgarte: physics.solver.baumgarte,
            slop: physics.solver.slop,
            restitution_threshold: physics.solver.restitution_threshold,
        }
    }
}

impl SimulationConfig {
    /// Convert to the physics crate's world configuration
    pub fn to_physics_config(&self) -> PhysicsConfig {
        PhysicsConfig {
            gravity: Vec3::from_array(self.gravity),
            contact_margin: self.contact_margin,
            agent_cache_capacity: self.agent_cache_capacity,
            refinement_iterations: self.refinement_iterations,
            solver: SolverConfig {
                iterations: self.solver_iterations,
                tolerance: self.solver_tolerance,
                baumgarte: self.baumgarte,
                slop: self.slop,
                restitution_threshold: self.restitution_threshold,
            },
        }
    }
}

/// Demo scene layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Simulated time to run, in seconds
    pub duration: f64,
    /// Half extents of the static ground box (its top face is at y = 0)
    pub ground_half_extents: [f64; 3],
    /// Material preset name for the ground
    pub ground_material: String,
    /// Number of boxes stacked at the origin
    pub stack_height: u32,
    /// Half extent of each stacked box
    pub box_half_extent: f64,
    /// Number of spheres dropped beside the stack
    pub sphere_count: u32,
    pub sphere_radius: f64,
    /// Height of the lowest sphere's centre above the ground
    pub drop_height: f64,
    /// Density of every dynamic body
    pub density: f64,
    /// Material preset name for the dynamic bodies
    pub body_material: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            duration: 5.0,
            ground_half_extents: [10.0, 1.0, 10.0],
            ground_material: "concrete".to_string(),
            stack_height: 3,
            box_half_extent: 0.5,
            sphere_count: 2,
            sphere_radius: 0.4,
            drop_height: 4.0,
            density: 1.0,
            body_material: "wood".to_string(),
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level filter (error, warn, info, debug, trace, or env_logger directives)
    pub log_level: String,
    /// Log body energies every this many physics steps (0 disables)
    pub report_interval: u64,
    /// Dump every final contact pair as RON at the end of the run
    pub dump_contacts: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            report_interval: 60,
            dump_contacts: false,
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}
