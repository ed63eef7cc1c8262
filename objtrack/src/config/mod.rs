//! Tracker configuration.
//!
//! Options are grouped into INI sections. Every key is optional; missing keys
//! take the defaults listed below.
//!
//! # Example Configuration (INI)
//!
//! ```ini
//! [search]
//! area_shape = field_of_view
//! single_instance = true
//! frustum_far_distance = 4.0
//! frustum_horizontal_fov_degrees = 75
//! frustum_aspect_ratio = 1.0
//! area_scale_factor = 2.0
//! global_extent = 5.0
//!
//! [query]
//! max_scale_change = 0.1
//! allowed_vertical_orientation_degrees = 0
//! coverage_threshold_factor = 1.0
//!
//! [strategy]
//! tracking = auto
//! detection = auto
//! area_refinement = false
//!
//! [scheduler]
//! ; milliseconds
//! tick_interval = 16
//! cooldown = 100
//! prune_distance_factor = 1.5
//! refinement_interval = 1000
//!
//! [diagnostics]
//! directory = /var/lib/objtrack/diagnostics
//! sentinel_filename = debug
//!
//! [logging]
//! filter = info
//! directory = /var/log/objtrack
//! ```

mod loader;
mod types;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use types::{DetectionStrategy, ParseEnumError, SearchAreaShape, TrackingStrategy};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or parsed.
    #[error("Failed to load config file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// INI text could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// A key holds a value that cannot be used.
    #[error("Invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Search-area geometry and instance policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub area_shape: SearchAreaShape,
    /// Stop searching for a model once one instance of it is tracked.
    pub single_instance: bool,
    /// Far plane of the search frustum, metres.
    pub frustum_far_distance: f32,
    pub frustum_horizontal_fov_degrees: f32,
    /// Horizontal / vertical.
    pub frustum_aspect_ratio: f32,
    /// Multiplier applied to model dimensions for box and sphere areas.
    pub area_scale_factor: f32,
    /// Edge length of the box used by `start_query`, metres.
    pub global_extent: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            area_shape: SearchAreaShape::FieldOfView,
            single_instance: true,
            frustum_far_distance: 4.0,
            frustum_horizontal_fov_degrees: 75.0,
            frustum_aspect_ratio: 1.0,
            area_scale_factor: 2.0,
            global_extent: 5.0,
        }
    }
}

/// Scan tolerances propagated into every query.
///
/// Values are clamped into their valid ranges on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    max_scale_change: f32,
    allowed_vertical_orientation_degrees: f32,
    coverage_threshold_factor: f32,
}

impl QueryConfig {
    pub const MAX_SCALE_CHANGE_RANGE: (f32, f32) = (0.0, 1.0);
    pub const VERTICAL_ORIENTATION_RANGE: (f32, f32) = (0.0, 180.0);
    pub const COVERAGE_FACTOR_RANGE: (f32, f32) = (0.01, 1.0);

    pub fn max_scale_change(&self) -> f32 {
        self.max_scale_change
    }

    pub fn allowed_vertical_orientation_degrees(&self) -> f32 {
        self.allowed_vertical_orientation_degrees
    }

    pub fn coverage_threshold_factor(&self) -> f32 {
        self.coverage_threshold_factor
    }

    pub fn with_max_scale_change(mut self, value: f32) -> Self {
        self.set_max_scale_change(value);
        self
    }

    pub fn with_allowed_vertical_orientation_degrees(mut self, value: f32) -> Self {
        self.set_allowed_vertical_orientation_degrees(value);
        self
    }

    pub fn with_coverage_threshold_factor(mut self, value: f32) -> Self {
        self.set_coverage_threshold_factor(value);
        self
    }

    pub fn set_max_scale_change(&mut self, value: f32) {
        let (lo, hi) = Self::MAX_SCALE_CHANGE_RANGE;
        self.max_scale_change = value.clamp(lo, hi);
    }

    pub fn set_allowed_vertical_orientation_degrees(&mut self, value: f32) {
        let (lo, hi) = Self::VERTICAL_ORIENTATION_RANGE;
        self.allowed_vertical_orientation_degrees = value.clamp(lo, hi);
    }

    pub fn set_coverage_threshold_factor(&mut self, value: f32) {
        let (lo, hi) = Self::COVERAGE_FACTOR_RANGE;
        self.coverage_threshold_factor = value.clamp(lo, hi);
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_scale_change: 0.1,
            allowed_vertical_orientation_degrees: 0.0,
            coverage_threshold_factor: 1.0,
        }
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyConfig {
    pub tracking: TrackingStrategy,
    pub detection: DetectionStrategy,
    /// Enable the autonomous search-area refiner.
    pub area_refinement: bool,
}

/// Tick cadence and scheduling thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Pause after a cycle with nothing to search for.
    pub cooldown: Duration,
    /// Instances farther than `frustum_far_distance * prune_distance_factor`
    /// from the camera are dropped.
    pub prune_distance_factor: f32,
    /// Minimum time between refinement passes.
    pub refinement_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            cooldown: Duration::from_millis(100),
            prune_distance_factor: 1.5,
            refinement_interval: Duration::from_secs(1),
        }
    }
}

/// Diagnostics capture location.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsConfig {
    /// Directory holding capture files and the sentinel.
    pub directory: Option<PathBuf>,
    /// Capture is enabled only while this file exists in `directory`.
    pub sentinel_filename: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            sentinel_filename: "debug".to_string(),
        }
    }
}

/// Log filter and optional file output.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerConfig {
    pub search: SearchConfig,
    pub query: QueryConfig,
    pub strategy: StrategyConfig,
    pub scheduler: SchedulerConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

impl TrackerConfig {
    /// `<config dir>/objtrack/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("objtrack").join("config.ini"))
    }

    /// Distance beyond which tracked instances are pruned.
    pub fn prune_distance(&self) -> f32 {
        self.search.frustum_far_distance * self.scheduler.prune_distance_factor
    }
}
