//! Heuristic palm features derived from one hand's landmarks.
//!
//! Every value here is a plain function of the 21 normalized points, so the
//! same landmarks always produce the same features.

use hand_landmarks::landmarks::{
    HandLandmarks, INDEX_MCP, INDEX_PIP, INDEX_TIP, MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP, PINKY_MCP,
    PINKY_PIP, PINKY_TIP, RING_MCP, RING_PIP, RING_TIP, THUMB_IP, THUMB_TIP, WRIST,
};
use serde::{Deserialize, Serialize};

/// Openness above this reads as "high openness".
pub const OPENNESS_THRESHOLD: f64 = 0.2;
/// Life line above this reads as "long life line".
pub const LIFE_LINE_THRESHOLD: f64 = 0.1;

const FINGER_JOINTS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

const MCP_JOINTS: [usize; 4] = [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalmFeatures {
    pub fingers: u8,
    pub openness: f64,
    pub life_line: f64,
    pub fingers_label: String,
    pub openness_label: String,
    pub life_line_label: String,
}

impl PalmFeatures {
    pub fn from_landmarks(landmarks: &HandLandmarks) -> Self {
        let fingers = count_extended_fingers(landmarks);
        let openness = round3(palm_openness(landmarks));
        let life_line = round3(life_line_length(landmarks));

        Self {
            fingers,
            openness,
            life_line,
            fingers_label: fingers_label(fingers).to_string(),
            openness_label: openness_label(openness).to_string(),
            life_line_label: life_line_label(life_line).to_string(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} fingers, openness={:.3}, life_line={:.3}",
            self.fingers, self.openness, self.life_line
        )
    }

    /// Feature name/value pairs in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("fingers", self.fingers.to_string()),
            ("openness", format!("{:.3}", self.openness)),
            ("life_line", format!("{:.3}", self.life_line)),
            ("fingers_label", self.fingers_label.clone()),
            ("openness_label", self.openness_label.clone()),
            ("life_line_label", self.life_line_label.clone()),
        ]
    }

    /// One `name: value` query per feature, leaving out zero measurements.
    pub fn knowledge_queries(&self) -> Vec<String> {
        let zero = |name: &str| match name {
            "fingers" => self.fingers == 0,
            "openness" => self.openness == 0.0,
            "life_line" => self.life_line == 0.0,
            _ => false,
        };

        self.entries()
            .into_iter()
            .filter(|(name, value)| !zero(name) && !value.is_empty())
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect()
    }
}

/// A finger counts as extended when its tip sits farther from the wrist than
/// its middle joint. The thumb is judged against the pinky base instead, which
/// works for either hand.
pub fn count_extended_fingers(landmarks: &HandLandmarks) -> u8 {
    let fingers = FINGER_JOINTS
        .iter()
        .filter(|(tip, pip)| landmarks.distance(*tip, WRIST) > landmarks.distance(*pip, WRIST))
        .count() as u8;

    let thumb = landmarks.distance(THUMB_TIP, PINKY_MCP) > landmarks.distance(THUMB_IP, PINKY_MCP);

    fingers + u8::from(thumb)
}

/// Mean distance from the wrist to the four finger bases.
pub fn palm_openness(landmarks: &HandLandmarks) -> f64 {
    let total: f64 = MCP_JOINTS
        .iter()
        .map(|mcp| landmarks.distance(WRIST, *mcp))
        .sum();
    total / MCP_JOINTS.len() as f64
}

/// Wrist to middle finger base.
pub fn life_line_length(landmarks: &HandLandmarks) -> f64 {
    landmarks.distance(WRIST, MIDDLE_MCP)
}

pub fn fingers_label(fingers: u8) -> &'static str {
    match fingers {
        0..=2 => "few fingers, secretive",
        3..=4 => "average fingers, balanced",
        _ => "full open hand, open-minded",
    }
}

pub fn openness_label(openness: f64) -> &'static str {
    if openness > OPENNESS_THRESHOLD {
        "high openness"
    } else {
        "low openness"
    }
}

pub fn life_line_label(life_line: f64) -> &'static str {
    if life_line > LIFE_LINE_THRESHOLD {
        "long life line"
    } else {
        "short life line"
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
