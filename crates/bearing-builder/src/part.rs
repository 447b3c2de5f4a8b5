use std::fmt;

use serde::{Deserialize, Serialize};

/// The named solids a bearing build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Balls,
    BallTrackRing,
    TopTrack,
    BottomTrack,
    CenterWheel,
    OuterWheel,
}

impl Part {
    pub const ALL: [Part; 6] = [
        Part::Balls,
        Part::BallTrackRing,
        Part::TopTrack,
        Part::BottomTrack,
        Part::CenterWheel,
        Part::OuterWheel,
    ];

    /// Stable name, used for export file names and 3MF part names.
    pub fn as_str(self) -> &'static str {
        match self {
            Part::Balls => "balls",
            Part::BallTrackRing => "ball_track_ring",
            Part::TopTrack => "top_track",
            Part::BottomTrack => "bottom_track",
            Part::CenterWheel => "center_wheel",
            Part::OuterWheel => "outer_wheel",
        }
    }

    /// The stage that produces this part.
    pub fn stage(self) -> BuildStage {
        match self {
            Part::Balls => BuildStage::BallsBuilt,
            Part::BallTrackRing => BuildStage::SegmentsBuilt,
            Part::TopTrack | Part::BottomTrack => BuildStage::TracksBuilt,
            Part::CenterWheel | Part::OuterWheel => BuildStage::WheelsBuilt,
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a build. Stages complete strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum BuildStage {
    #[default]
    Empty,
    BallsBuilt,
    SegmentsBuilt,
    TracksBuilt,
    WheelsBuilt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_names() {
        let names: Vec<_> = Part::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            [
                "balls",
                "ball_track_ring",
                "top_track",
                "bottom_track",
                "center_wheel",
                "outer_wheel"
            ]
        );
        assert_eq!(Part::TopTrack.to_string(), "top_track");
    }

    #[test]
    fn test_part_serde_matches_as_str() {
        for part in Part::ALL {
            let json = serde_json::to_string(&part).unwrap();
            assert_eq!(json, format!("\"{}\"", part.as_str()));
        }
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(BuildStage::Empty < BuildStage::BallsBuilt);
        assert!(BuildStage::TracksBuilt < BuildStage::WheelsBuilt);
        assert_eq!(Part::BottomTrack.stage(), BuildStage::TracksBuilt);
    }
}
