use hand_landmarks::{HandLandmarks, Landmark, LandmarkError};
use rand::Rng;

const MAX_JITTER: f32 = 0.01;

/// Open right hand, palm to the camera.
pub(crate) const DEMO_HAND: [(f32, f32); 21] = [
    (0.50, 0.90),
    (0.40, 0.85),
    (0.33, 0.78),
    (0.28, 0.72),
    (0.22, 0.66),
    (0.42, 0.60),
    (0.40, 0.48),
    (0.39, 0.41),
    (0.38, 0.35),
    (0.50, 0.58),
    (0.50, 0.45),
    (0.50, 0.37),
    (0.50, 0.30),
    (0.58, 0.60),
    (0.60, 0.48),
    (0.61, 0.41),
    (0.62, 0.36),
    (0.65, 0.64),
    (0.68, 0.55),
    (0.70, 0.50),
    (0.72, 0.45),
];

/// Landmarks used when the caller sends no image. Each coordinate is nudged a
/// little so repeated demos do not produce identical readings.
pub fn demo_landmarks() -> Result<HandLandmarks, LandmarkError> {
    let mut rng = rand::rng();
    let points = DEMO_HAND
        .iter()
        .map(|(x, y)| {
            Landmark::new(
                x + rng.random_range(-MAX_JITTER..=MAX_JITTER),
                y + rng.random_range(-MAX_JITTER..=MAX_JITTER),
                0.0,
            )
        })
        .collect();
    HandLandmarks::new(points)
}
