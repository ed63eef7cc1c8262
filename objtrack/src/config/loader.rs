//! INI loading and rendering for [`TrackerConfig`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{ConfigError, ConfigResult, TrackerConfig};

const SEARCH: &str = "search";
const QUERY: &str = "query";
const STRATEGY: &str = "strategy";
const SCHEDULER: &str = "scheduler";
const DIAGNOSTICS: &str = "diagnostics";
const LOGGING: &str = "logging";

/// Typed reads from one INI section.
struct SectionReader<'a> {
    name: &'static str,
    props: Option<&'a Properties>,
}

impl<'a> SectionReader<'a> {
    fn new(ini: &'a Ini, name: &'static str) -> Self {
        Self {
            name,
            props: ini.section(Some(name)),
        }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.props
            .and_then(|p| p.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, key: &str, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn parse<T: FromStr>(&self, key: &str, current: T) -> ConfigResult<T> {
        match self.raw(key) {
            Some(value) => value.parse().map_err(|_| self.invalid(key, value)),
            None => Ok(current),
        }
    }

    fn bool(&self, key: &str, current: bool) -> ConfigResult<bool> {
        match self.raw(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, value)),
            },
            None => Ok(current),
        }
    }

    /// Strictly positive finite float.
    fn positive(&self, key: &str, current: f32) -> ConfigResult<f32> {
        let value = self.parse(key, current)?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(key, &value.to_string()))
        }
    }

    /// Float clamped into `range`, warning when clamping changes it.
    fn clamped(&self, key: &str, current: f32, range: (f32, f32)) -> ConfigResult<f32> {
        let value: f32 = self.parse(key, current)?;
        if !value.is_finite() {
            return Err(self.invalid(key, &value.to_string()));
        }
        let clamped = value.clamp(range.0, range.1);
        if clamped != value {
            tracing::warn!(
                section = self.name,
                key,
                value,
                clamped,
                "Config value out of range, clamped"
            );
        }
        Ok(clamped)
    }

    fn millis(&self, key: &str, current: Duration) -> ConfigResult<Duration> {
        match self.raw(key) {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| self.invalid(key, value)),
            None => Ok(current),
        }
    }

    fn path(&self, key: &str, current: Option<PathBuf>) -> Option<PathBuf> {
        self.raw(key).map(PathBuf::from).or(current)
    }

    fn string(&self, key: &str, current: String) -> String {
        self.raw(key).map(str::to_string).unwrap_or(current)
    }
}

impl TrackerConfig {
    /// Load configuration from an INI file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ini(&ini)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();

        let s = SectionReader::new(ini, SEARCH);
        let search = &mut config.search;
        search.area_shape = s.parse("area_shape", search.area_shape)?;
        search.single_instance = s.bool("single_instance", search.single_instance)?;
        search.frustum_far_distance =
            s.positive("frustum_far_distance", search.frustum_far_distance)?;
        search.frustum_horizontal_fov_degrees = s.clamped(
            "frustum_horizontal_fov_degrees",
            search.frustum_horizontal_fov_degrees,
            (1.0, 179.0),
        )?;
        search.frustum_aspect_ratio =
            s.positive("frustum_aspect_ratio", search.frustum_aspect_ratio)?;
        search.area_scale_factor = s.positive("area_scale_factor", search.area_scale_factor)?;
        search.global_extent = s.positive("global_extent", search.global_extent)?;

        let q = SectionReader::new(ini, QUERY);
        let query = &mut config.query;
        let value = q.clamped(
            "max_scale_change",
            query.max_scale_change(),
            super::QueryConfig::MAX_SCALE_CHANGE_RANGE,
        )?;
        query.set_max_scale_change(value);
        let value = q.clamped(
            "allowed_vertical_orientation_degrees",
            query.allowed_vertical_orientation_degrees(),
            super::QueryConfig::VERTICAL_ORIENTATION_RANGE,
        )?;
        query.set_allowed_vertical_orientation_degrees(value);
        let value = q.clamped(
            "coverage_threshold_factor",
            query.coverage_threshold_factor(),
            super::QueryConfig::COVERAGE_FACTOR_RANGE,
        )?;
        query.set_coverage_threshold_factor(value);

        let st = SectionReader::new(ini, STRATEGY);
        let strategy = &mut config.strategy;
        strategy.tracking = st.parse("tracking", strategy.tracking)?;
        strategy.detection = st.parse("detection", strategy.detection)?;
        strategy.area_refinement = st.bool("area_refinement", strategy.area_refinement)?;

        let sc = SectionReader::new(ini, SCHEDULER);
        let scheduler = &mut config.scheduler;
        scheduler.tick_interval = sc.millis("tick_interval", scheduler.tick_interval)?;
        if scheduler.tick_interval.is_zero() {
            return Err(sc.invalid("tick_interval", "0"));
        }
        scheduler.cooldown = sc.millis("cooldown", scheduler.cooldown)?;
        scheduler.prune_distance_factor =
            sc.positive("prune_distance_factor", scheduler.prune_distance_factor)?;
        scheduler.refinement_interval =
            sc.millis("refinement_interval", scheduler.refinement_interval)?;

        let d = SectionReader::new(ini, DIAGNOSTICS);
        let diagnostics = &mut config.diagnostics;
        diagnostics.directory = d.path("directory", diagnostics.directory.take());
        diagnostics.sentinel_filename = d.string(
            "sentinel_filename",
            std::mem::take(&mut diagnostics.sentinel_filename),
        );

        let l = SectionReader::new(ini, LOGGING);
        let logging = &mut config.logging;
        logging.filter = l.string("filter", std::mem::take(&mut logging.filter));
        logging.directory = l.path("directory", logging.directory.take());

        Ok(config)
    }

    /// Render the effective configuration as INI text.
    pub fn to_ini_string(&self) -> ConfigResult<String> {
        let mut ini = Ini::new();

        ini.with_section(Some(SEARCH))
            .set("area_shape", self.search.area_shape.to_string())
            .set("single_instance", self.search.single_instance.to_string())
            .set(
                "frustum_far_distance",
                self.search.frustum_far_distance.to_string(),
            )
            .set(
                "frustum_horizontal_fov_degrees",
                self.search.frustum_horizontal_fov_degrees.to_string(),
            )
            .set(
                "frustum_aspect_ratio",
                self.search.frustum_aspect_ratio.to_string(),
            )
            .set("area_scale_factor", self.search.area_scale_factor.to_string())
            .set("global_extent", self.search.global_extent.to_string());

        ini.with_section(Some(QUERY))
            .set("max_scale_change", self.query.max_scale_change().to_string())
            .set(
                "allowed_vertical_orientation_degrees",
                self.query.allowed_vertical_orientation_degrees().to_string(),
            )
            .set(
                "coverage_threshold_factor",
                self.query.coverage_threshold_factor().to_string(),
            );

        ini.with_section(Some(STRATEGY))
            .set("tracking", self.strategy.tracking.to_string())
            .set("detection", self.strategy.detection.to_string())
            .set("area_refinement", self.strategy.area_refinement.to_string());

        ini.with_section(Some(SCHEDULER))
            .set(
                "tick_interval",
                self.scheduler.tick_interval.as_millis().to_string(),
            )
            .set("cooldown", self.scheduler.cooldown.as_millis().to_string())
            .set(
                "prune_distance_factor",
                self.scheduler.prune_distance_factor.to_string(),
            )
            .set(
                "refinement_interval",
                self.scheduler.refinement_interval.as_millis().to_string(),
            );

        ini.with_section(Some(DIAGNOSTICS)).set(
            "sentinel_filename",
            self.diagnostics.sentinel_filename.clone(),
        );
        if let Some(dir) = &self.diagnostics.directory {
            ini.set_to(
                Some(DIAGNOSTICS),
                "directory".to_string(),
                dir.display().to_string(),
            );
        }

        ini.with_section(Some(LOGGING))
            .set("filter", self.logging.filter.clone());
        if let Some(dir) = &self.logging.directory {
            ini.set_to(
                Some(LOGGING),
                "directory".to_string(),
                dir.display().to_string(),
            );
        }

        let mut buf = Vec::new();
        ini.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
