use crate::landmarks::{HandDetection, LandmarkError};
use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    Output(String),
    #[error("Invalid landmarks: {0}")]
    Landmarks(#[from] LandmarkError),
}

/// A hand landmark detector. `Ok(None)` means no hand was found.
#[async_trait]
pub trait LandmarkModel: Send + Sync + 'static {
    async fn detect(&self, image: &DynamicImage) -> Result<Option<HandDetection>, ModelError>;
}
