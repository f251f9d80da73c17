//! Direction classification
//!
//! Each axis is compared against its own low/high threshold, producing four
//! independent flags. Every active flag contributes one label from the
//! configured [`LabelMap`]; the labels are sorted and joined with `-`, so two
//! active flags yield a diagonal such as `left-up`.

use super::CalibrationProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NEUTRAL_LABEL: &str = "neutral";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

/// Classified joystick state as reported to the peer
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Both axes inside their neutral zone
    Neutral,
    /// One label or a `-` joined diagonal
    Deflected(String),
    /// Both thresholds of one axis exceeded at once; thresholds are misconfigured
    Invalid(Axis),
}

impl Direction {
    pub fn label(&self) -> &str {
        match self {
            Direction::Neutral => NEUTRAL_LABEL,
            Direction::Deflected(label) => label,
            Direction::Invalid(Axis::X) => "invalid-x",
            Direction::Invalid(Axis::Y) => "invalid-y",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label reported for each of the four deflection flags.
///
/// Kept as configuration because the physical orientation of the stick
/// differs between boards.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LabelMap {
    pub low_x: String,
    pub high_x: String,
    pub low_y: String,
    pub high_y: String,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            low_x: "left".to_string(),
            high_x: "right".to_string(),
            low_y: "up".to_string(),
            high_y: "down".to_string(),
        }
    }
}

impl LabelMap {
    /// Labels must be non-empty, distinct, free of the `-` separator and
    /// must not collide with the reserved neutral/invalid labels.
    pub fn validate(&self) -> Result<(), String> {
        let labels = [
            ("low_x", &self.low_x),
            ("high_x", &self.high_x),
            ("low_y", &self.low_y),
            ("high_y", &self.high_y),
        ];
        for (i, (name, label)) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(format!("labels.{} must not be empty", name));
            }
            if label.contains('-') {
                return Err(format!("labels.{} must not contain '-'", name));
            }
            if label.as_str() == NEUTRAL_LABEL || label.starts_with("invalid") {
                return Err(format!("labels.{} uses reserved label '{}'", name, label));
            }
            if let Some((other, _)) = labels[..i].iter().find(|(_, l)| l == label) {
                return Err(format!(
                    "labels.{} and labels.{} share the label '{}'",
                    other, name, label
                ));
            }
        }
        Ok(())
    }
}

/// Maps calibrated readings to [`Direction`]s. Pure, no I/O.
#[derive(Clone, Debug, Default)]
pub struct DirectionClassifier {
    labels: LabelMap,
}

impl DirectionClassifier {
    pub fn new(labels: LabelMap) -> Self {
        Self { labels }
    }

    pub fn classify(&self, x: i32, y: i32, profile: &CalibrationProfile) -> Direction {
        let (x_low, x_high) = profile.x_thresholds();
        let (y_low, y_high) = profile.y_thresholds();

        let beyond_low_x = x < x_low;
        let beyond_high_x = x > x_high;
        let beyond_low_y = y < y_low;
        let beyond_high_y = y > y_high;

        if beyond_low_x && beyond_high_x {
            return Direction::Invalid(Axis::X);
        }
        if beyond_low_y && beyond_high_y {
            return Direction::Invalid(Axis::Y);
        }

        let mut parts: Vec<&str> = [
            (beyond_low_x, &self.labels.low_x),
            (beyond_high_x, &self.labels.high_x),
            (beyond_low_y, &self.labels.low_y),
            (beyond_high_y, &self.labels.high_y),
        ]
        .into_iter()
        .filter(|(active, _)| *active)
        .map(|(_, label)| label.as_str())
        .collect();

        if parts.is_empty() {
            return Direction::Neutral;
        }

        parts.sort_unstable();
        Direction::Deflected(parts.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CalibrationProfile {
        CalibrationProfile::new(20_600, 20_880, 2_500)
    }

    fn classifier() -> DirectionClassifier {
        DirectionClassifier::default()
    }

    #[test]
    fn readings_inside_threshold_are_neutral() {
        let p = profile();
        let c = classifier();
        for (dx, dy) in [(0, 0), (2_500, 0), (-2_500, 2_500), (1_200, -2_499), (-2_500, -2_500)] {
            assert_eq!(
                c.classify(p.center_x + dx, p.center_y + dy, &p),
                Direction::Neutral,
                "offset ({}, {})",
                dx,
                dy
            );
        }
    }

    #[test]
    fn single_axis_maps_to_its_label() {
        let p = profile();
        let c = classifier();
        let cases = [
            (-3_000, 0, "left"),
            (3_000, 0, "right"),
            (0, -3_000, "up"),
            (0, 3_000, "down"),
            (2_501, 100, "right"),
        ];
        for (dx, dy, expected) in cases {
            assert_eq!(
                c.classify(p.center_x + dx, p.center_y + dy, &p),
                Direction::Deflected(expected.to_string())
            );
        }
    }

    #[test]
    fn diagonals_join_in_sorted_order() {
        let p = profile();
        let c = classifier();
        let cases = [
            (-3_000, -3_000, "left-up"),
            (3_000, -3_000, "right-up"),
            (-3_000, 3_000, "down-left"),
            (3_000, 3_000, "down-right"),
        ];
        for (dx, dy, expected) in cases {
            assert_eq!(c.classify(p.center_x + dx, p.center_y + dy, &p).label(), expected);
        }
    }

    #[test]
    fn diagonal_label_does_not_depend_on_table_order() {
        let p = profile();
        let swapped = DirectionClassifier::new(LabelMap {
            low_x: "up".into(),
            high_x: "down".into(),
            low_y: "left".into(),
            high_y: "right".into(),
        });
        // low X + low Y: "up" then "left" in flag order, sorted to "left-up"
        assert_eq!(
            swapped.classify(p.center_x - 3_000, p.center_y - 3_000, &p).label(),
            "left-up"
        );
    }

    #[test]
    fn site_remap_reports_rotated_labels() {
        let p = profile();
        let remapped = DirectionClassifier::new(LabelMap {
            low_x: "down".into(),
            high_x: "up".into(),
            low_y: "left".into(),
            high_y: "right".into(),
        });
        assert_eq!(remapped.classify(p.center_x, p.center_y - 4_000, &p).label(), "left");
        assert_eq!(remapped.classify(p.center_x + 4_000, p.center_y, &p).label(), "up");
        assert_eq!(
            remapped.classify(p.center_x + 4_000, p.center_y + 4_000, &p).label(),
            "right-up"
        );
    }

    #[test]
    fn overlapping_thresholds_surface_as_invalid() {
        // A negative delta makes the low threshold sit above the high one.
        let p = CalibrationProfile::new(1_000, 1_000, -100);
        let c = classifier();
        assert_eq!(c.classify(1_000, 0, &p), Direction::Invalid(Axis::X));
        assert_eq!(c.classify(1_000, 0, &p).label(), "invalid-x");

        let p = CalibrationProfile::new(0, 1_000, -100);
        assert_eq!(c.classify(5_000, 1_000, &p), Direction::Invalid(Axis::Y));
    }

    #[test]
    fn label_map_validation() {
        assert!(LabelMap::default().validate().is_ok());

        let mut labels = LabelMap::default();
        labels.low_y = "left".into();
        assert!(labels.validate().is_err());

        let mut labels = LabelMap::default();
        labels.high_x = "neutral".into();
        assert!(labels.validate().is_err());

        let mut labels = LabelMap::default();
        labels.high_x = "far-right".into();
        assert!(labels.validate().is_err());
    }
}
