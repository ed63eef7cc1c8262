//! Strategy and shape enums with their INI spellings.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A config string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Geometry of the region a detection query searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchAreaShape {
    /// Level box sized to the model, in front of the camera.
    Box,
    /// The camera's viewing frustum.
    #[default]
    FieldOfView,
    /// Sphere sized to the model, in front of the camera.
    Sphere,
}

impl fmt::Display for SearchAreaShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchAreaShape::Box => write!(f, "box"),
            SearchAreaShape::FieldOfView => write!(f, "field_of_view"),
            SearchAreaShape::Sphere => write!(f, "sphere"),
        }
    }
}

impl FromStr for SearchAreaShape {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "box" => Ok(Self::Box),
            "field_of_view" | "fov" => Ok(Self::FieldOfView),
            "sphere" => Ok(Self::Sphere),
            _ => Err(ParseEnumError::new("search area shape", s)),
        }
    }
}

/// How tracking modes are assigned to instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackingStrategy {
    /// Accurate while visible, paused otherwise.
    #[default]
    Auto,
    Accurate,
    Coarse,
    Pause,
}

impl fmt::Display for TrackingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingStrategy::Auto => write!(f, "auto"),
            TrackingStrategy::Accurate => write!(f, "accurate"),
            TrackingStrategy::Coarse => write!(f, "coarse"),
            TrackingStrategy::Pause => write!(f, "pause"),
        }
    }
}

impl FromStr for TrackingStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "accurate" => Ok(Self::Accurate),
            "coarse" => Ok(Self::Coarse),
            "pause" => Ok(Self::Pause),
            _ => Err(ParseEnumError::new("tracking strategy", s)),
        }
    }
}

/// Whether the tracker searches on its own or only on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DetectionStrategy {
    #[default]
    Auto,
    /// Only explicitly queued query batches are dispatched.
    Manual,
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionStrategy::Auto => write!(f, "auto"),
            DetectionStrategy::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for DetectionStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseEnumError::new("detection strategy", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_roundtrip() {
        for shape in [
            SearchAreaShape::Box,
            SearchAreaShape::FieldOfView,
            SearchAreaShape::Sphere,
        ] {
            assert_eq!(shape.to_string().parse::<SearchAreaShape>(), Ok(shape));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Accurate".parse(), Ok(TrackingStrategy::Accurate));
        assert_eq!(" MANUAL ".parse(), Ok(DetectionStrategy::Manual));
        assert_eq!("FOV".parse(), Ok(SearchAreaShape::FieldOfView));
    }

    #[test]
    fn test_unknown_value_is_error() {
        let err = "sometimes".parse::<TrackingStrategy>().unwrap_err();
        assert_eq!(err.kind, "tracking strategy");
        assert_eq!(err.value, "sometimes");
        assert!(err.to_string().contains("sometimes"));
    }
}
