use thiserror::Error;

/// Rejected clustering configuration. Raised before any photo is looked at.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("geohash precision must be between 1 and 12, got {0}")]
    GeohashPrecision(u8),

    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("building radius must be at least {min} m, got {value}")]
    BuildingRadius { value: f64, min: f64 },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("unit gap ({unit_gap_minutes} min) must be shorter than the visit gap ({visit_gap_minutes} min)")]
    UnitGapTooWide {
        unit_gap_minutes: u64,
        visit_gap_minutes: u64,
    },

    #[error("max minority ratio must be in (0, 0.5), got {0}")]
    MinorityRatio(f64),
}

/// Why a single photo record was excluded from clustering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhotoError {
    #[error("missing photo id")]
    MissingId,

    #[error("missing capture timestamp")]
    MissingTimestamp,

    #[error("unparsable capture timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("coordinate out of range (lat {lat}, lng {lng})")]
    CoordinateOutOfRange { lat: f64, lng: f64 },

    #[error("invalid GPS accuracy {0}")]
    InvalidAccuracy(f64),

    #[error("duplicate photo id")]
    DuplicateId,
}
