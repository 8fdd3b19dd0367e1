mod ort_service;

pub mod config;
pub mod landmarks;
pub mod model_service;

pub use config::{ModelConfig, Validatable};
pub use landmarks::{HandDetection, HandLandmarks, Landmark, LandmarkError, HAND_CONNECTIONS};
pub use model_service::{LandmarkModel, ModelError};
pub use ort_service::OrtLandmarkService;
