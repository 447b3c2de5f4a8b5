use bearing_export::ExportError;
use bearing_kernel::KernelError;

use crate::part::Part;

/// Rejected bearing parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("a bearing needs at least 2 balls, got {count}")]
    TooFewBalls { count: u32 },

    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("balls of diameter {ball_diameter} do not fit on a circle of radius {circle_radius}")]
    BallsDoNotFit {
        ball_diameter: f64,
        circle_radius: f64,
    },

    #[error("circle radius {circle_radius} leaves no room for the center wheel (minimum {minimum})")]
    CircleTooSmall { circle_radius: f64, minimum: f64 },
}

/// Errors from building or exporting a bearing.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("{part} has not been built yet")]
    MissingPart { part: Part },
}
