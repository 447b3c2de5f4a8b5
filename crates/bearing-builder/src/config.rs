use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// The center wheel is a cylinder this much narrower than the ball circle.
pub(crate) const CENTER_WHEEL_CLEARANCE: f64 = 1.5;

/// Geometric parameters of a bearing. Immutable once validated.
///
/// Lengths are in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigFields")]
pub struct BearingConfig {
    ball_count: u32,
    circle_radius: f64,
    ball_diameter: f64,
    thickness: f64,
}

/// Unvalidated form used for deserialization.
#[derive(Deserialize)]
struct ConfigFields {
    ball_count: u32,
    circle_radius: f64,
    ball_diameter: f64,
    thickness: f64,
}

impl TryFrom<ConfigFields> for BearingConfig {
    type Error = ConfigError;

    fn try_from(f: ConfigFields) -> Result<Self, Self::Error> {
        BearingConfig::new(f.ball_count, f.circle_radius, f.ball_diameter, f.thickness)
    }
}

impl BearingConfig {
    pub fn new(
        ball_count: u32,
        circle_radius: f64,
        ball_diameter: f64,
        thickness: f64,
    ) -> Result<Self, ConfigError> {
        if ball_count < 2 {
            return Err(ConfigError::TooFewBalls { count: ball_count });
        }
        for (field, value) in [
            ("circle_radius", circle_radius),
            ("ball_diameter", ball_diameter),
            ("thickness", thickness),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if ball_diameter >= 2.0 * circle_radius {
            return Err(ConfigError::BallsDoNotFit {
                ball_diameter,
                circle_radius,
            });
        }
        if circle_radius <= CENTER_WHEEL_CLEARANCE {
            return Err(ConfigError::CircleTooSmall {
                circle_radius,
                minimum: CENTER_WHEEL_CLEARANCE,
            });
        }
        Ok(Self {
            ball_count,
            circle_radius,
            ball_diameter,
            thickness,
        })
    }

    pub fn ball_count(&self) -> u32 {
        self.ball_count
    }

    /// Radius of the circle the ball centers lie on.
    pub fn circle_radius(&self) -> f64 {
        self.circle_radius
    }

    pub fn ball_diameter(&self) -> f64 {
        self.ball_diameter
    }

    pub fn ball_radius(&self) -> f64 {
        self.ball_diameter / 2.0
    }

    /// Height of the tracks; the wheels are 2 mm taller.
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Angle between neighboring balls, in degrees.
    pub fn sector_degrees(&self) -> f64 {
        360.0 / self.ball_count as f64
    }
}

impl Default for BearingConfig {
    fn default() -> Self {
        Self {
            ball_count: 8,
            circle_radius: 20.0,
            ball_diameter: 4.1,
            thickness: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let d = BearingConfig::default();
        assert_eq!(
            BearingConfig::new(d.ball_count(), d.circle_radius(), d.ball_diameter(), d.thickness()),
            Ok(d)
        );
        assert_eq!(d.sector_degrees(), 45.0);
        assert_eq!(d.ball_radius(), 2.05);
    }

    #[test]
    fn test_rejects_too_few_balls() {
        assert_eq!(
            BearingConfig::new(1, 20.0, 4.1, 4.0),
            Err(ConfigError::TooFewBalls { count: 1 })
        );
        assert!(BearingConfig::new(2, 20.0, 4.1, 4.0).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_and_non_finite() {
        assert!(matches!(
            BearingConfig::new(8, 0.0, 4.1, 4.0),
            Err(ConfigError::NonPositive { field: "circle_radius", .. })
        ));
        assert!(matches!(
            BearingConfig::new(8, 20.0, -1.0, 4.0),
            Err(ConfigError::NonPositive { field: "ball_diameter", .. })
        ));
        assert!(matches!(
            BearingConfig::new(8, 20.0, 4.1, f64::NAN),
            Err(ConfigError::NonPositive { field: "thickness", .. })
        ));
        assert!(matches!(
            BearingConfig::new(8, f64::INFINITY, 4.1, 4.0),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn test_rejects_balls_that_do_not_fit() {
        assert!(matches!(
            BearingConfig::new(8, 2.0, 4.0, 4.0),
            Err(ConfigError::BallsDoNotFit { .. })
        ));
        assert!(matches!(
            BearingConfig::new(2, 1.0, 0.5, 1.0),
            Err(ConfigError::CircleTooSmall { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: BearingConfig = serde_json::from_str(
            r#"{"ball_count":8,"circle_radius":20.0,"ball_diameter":4.1,"thickness":4.0}"#,
        )
        .unwrap();
        assert_eq!(ok, BearingConfig::default());

        let bad = serde_json::from_str::<BearingConfig>(
            r#"{"ball_count":1,"circle_radius":20.0,"ball_diameter":4.1,"thickness":4.0}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_serializes_all_fields() {
        let json = serde_json::to_string(&BearingConfig::default()).unwrap();
        assert_eq!(
            json,
            r#"{"ball_count":8,"circle_radius":20.0,"ball_diameter":4.1,"thickness":4.0}"#
        );
    }
}
