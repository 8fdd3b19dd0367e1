use crate::{
    annotate::{self, AnnotatedImage},
    demo::demo_landmarks,
    features::PalmFeatures,
    knowledge::KnowledgeBase,
    roaster::{Roaster, TextGenerator},
    storage::ImageStore,
    telemetry::Metrics,
};
use hand_landmarks::{HandLandmarks, LandmarkModel};
use image::DynamicImage;
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use tracing::instrument;

pub const INVALID_IMAGE: &str = "Invalid image";
pub const NO_HAND_SUMMARY: &str = "No hand detected";
pub const NO_HAND_PREDICTION: &str = "Please show your hand clearly to the camera";
pub const ERROR_SUMMARY: &str = "Error";
pub const ERROR_PREDICTION: &str = "Could not read your palm right now.";
pub const GENERATION_FAILED: &str = "⚠️ Could not generate prediction right now.";

#[derive(Debug, Clone)]
pub enum PalmInput {
    Upload {
        bytes: Vec<u8>,
        gender: Option<String>,
    },
    Demo {
        gender: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub summary: String,
    pub prediction: String,
    pub features: Option<PalmFeatures>,
    pub image_path: Option<String>,
}

impl PredictionResponse {
    pub fn placeholder(summary: &str, prediction: &str) -> Self {
        Self {
            summary: summary.to_string(),
            prediction: prediction.to_string(),
            features: None,
            image_path: None,
        }
    }
}

/// Runs one palm reading from raw input to roast.
pub struct PalmReader {
    detector: Arc<dyn LandmarkModel>,
    knowledge: Arc<KnowledgeBase>,
    roaster: Roaster<dyn TextGenerator>,
    store: ImageStore,
    metrics: Arc<Metrics>,
    top_k: usize,
}

impl PalmReader {
    pub fn new(
        detector: Arc<dyn LandmarkModel>,
        knowledge: Arc<KnowledgeBase>,
        generator: Arc<dyn TextGenerator>,
        store: ImageStore,
        metrics: Arc<Metrics>,
        top_k: usize,
    ) -> Self {
        Self {
            detector,
            knowledge,
            roaster: Roaster::new(generator),
            store,
            metrics,
            top_k,
        }
    }

    /// Never fails; every failure becomes a placeholder response.
    #[instrument(skip_all)]
    pub async fn read(&self, input: PalmInput) -> PredictionResponse {
        let (response, outcome) = match input {
            PalmInput::Upload { bytes, gender } => self.read_upload(bytes, gender).await,
            PalmInput::Demo { gender } => self.read_demo(gender).await,
        };
        self.metrics.record_reading(outcome);
        response
    }

    async fn read_upload(
        &self,
        bytes: Vec<u8>,
        gender: Option<String>,
    ) -> (PredictionResponse, &'static str) {
        if let Err(e) = self.store.save_upload(&bytes).await {
            tracing::warn!("Could not keep uploaded image: {}", e);
        }

        let image = match annotate::decode(&bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::info!("Rejected upload: {}", e);
                return (
                    PredictionResponse::placeholder(INVALID_IMAGE, INVALID_IMAGE),
                    "invalid_image",
                );
            }
        };

        let detection = match self.detector.detect(&image).await {
            Ok(Some(detection)) => detection,
            Ok(None) => {
                return (
                    PredictionResponse::placeholder(NO_HAND_SUMMARY, NO_HAND_PREDICTION),
                    "no_hand",
                )
            }
            Err(e) => {
                tracing::error!("Landmark detection failed: {}", e);
                return (
                    PredictionResponse::placeholder(ERROR_SUMMARY, ERROR_PREDICTION),
                    "error",
                );
            }
        };
        tracing::debug!("Hand detected with presence {:.2}", detection.presence);

        let image_path = self.save_annotated(&image, &detection.landmarks).await;
        self.interpret(&detection.landmarks, image_path, gender.as_deref())
            .await
    }

    async fn read_demo(&self, gender: Option<String>) -> (PredictionResponse, &'static str) {
        match demo_landmarks() {
            Ok(landmarks) => self.interpret(&landmarks, None, gender.as_deref()).await,
            Err(e) => {
                tracing::error!("Demo landmarks are malformed: {}", e);
                (
                    PredictionResponse::placeholder(ERROR_SUMMARY, ERROR_PREDICTION),
                    "error",
                )
            }
        }
    }

    async fn save_annotated(
        &self,
        image: &DynamicImage,
        landmarks: &HandLandmarks,
    ) -> Option<String> {
        let jpg = match AnnotatedImage::new(image, landmarks).to_jpg() {
            Ok(jpg) => jpg,
            Err(e) => {
                tracing::warn!("Could not annotate image: {}", e);
                return None;
            }
        };

        match self.store.save_annotated(&jpg).await {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                tracing::warn!("Could not save annotated image: {}", e);
                None
            }
        }
    }

    async fn interpret(
        &self,
        landmarks: &HandLandmarks,
        image_path: Option<String>,
        gender: Option<&str>,
    ) -> (PredictionResponse, &'static str) {
        let features = PalmFeatures::from_landmarks(landmarks);
        let summary = features.summary();
        tracing::info!("Palm features: {}", summary);

        let (prediction, outcome) = match self.generate(&features, gender).await {
            Ok(prediction) => (prediction, "roast"),
            Err(e) => {
                tracing::error!("Roast generation failed: {}", e);
                (GENERATION_FAILED.to_string(), "generation_failed")
            }
        };

        (
            PredictionResponse {
                summary,
                prediction,
                features: Some(features),
                image_path,
            },
            outcome,
        )
    }

    async fn generate(
        &self,
        features: &PalmFeatures,
        gender: Option<&str>,
    ) -> anyhow::Result<String> {
        let meanings = self
            .knowledge
            .lookup(&features.knowledge_queries(), self.top_k)
            .await?;

        if meanings.is_empty() {
            return Ok(self.roaster.roast(features, &meanings, gender).await?);
        }

        let start = Instant::now();
        let roast = self.roaster.roast(features, &meanings, gender).await;
        self.metrics
            .record_llm_duration(start.elapsed().as_millis() as u64);

        Ok(roast?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StorageConfig,
        features::tests::open_hand,
        knowledge::{
            tests::{palmistry_index, KeywordEmbedder},
            KnowledgeIndex,
        },
        roaster::{tests::ScriptedGenerator, LlmError, UNREADABLE_PALM},
    };
    use async_trait::async_trait;
    use hand_landmarks::{HandDetection, ModelError};
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    enum Detector {
        Hand,
        Nothing,
        Broken,
    }

    #[async_trait]
    impl LandmarkModel for Detector {
        async fn detect(&self, _image: &DynamicImage) -> Result<Option<HandDetection>, ModelError> {
            match self {
                Detector::Hand => Ok(Some(HandDetection {
                    landmarks: open_hand(),
                    presence: 0.98,
                })),
                Detector::Nothing => Ok(None),
                Detector::Broken => Err(ModelError::Inference("session poisoned".into())),
            }
        }
    }

    struct SilentGenerator;

    #[async_trait]
    impl TextGenerator for SilentGenerator {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }
    }

    struct Fixture {
        reader: PalmReader,
        generator: Arc<ScriptedGenerator>,
        metrics: Arc<Metrics>,
        dir: TempDir,
    }

    impl Fixture {
        fn has_metric(&self, prefix: &str) -> bool {
            self.metrics
                .registry
                .gather()
                .iter()
                .any(|family| family.get_name().starts_with(prefix))
        }
    }

    fn fixture_with(detector: Detector, index: KnowledgeIndex) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(&StorageConfig {
            upload_dir: dir.path().join("uploads"),
            image_dir: dir.path().join("images"),
        })
        .unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let reader = PalmReader::new(
            Arc::new(detector),
            Arc::new(KnowledgeBase::new(index, Arc::new(KeywordEmbedder))),
            generator.clone(),
            store,
            metrics.clone(),
            2,
        );
        Fixture {
            reader,
            generator,
            metrics,
            dir,
        }
    }

    fn fixture(detector: Detector) -> Fixture {
        fixture_with(detector, palmistry_index())
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(32, 32, Rgb([90, 60, 40])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(bytes: Vec<u8>) -> PalmInput {
        PalmInput::Upload {
            bytes,
            gender: None,
        }
    }

    #[tokio::test]
    async fn test_garbage_upload_is_invalid_image() {
        let fx = fixture(Detector::Hand);

        let response = fx.reader.read(upload(b"not an image".to_vec())).await;

        assert_eq!(
            response,
            PredictionResponse::placeholder(INVALID_IMAGE, INVALID_IMAGE)
        );
        assert!(fx.generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_hand_response() {
        let fx = fixture(Detector::Nothing);

        let response = fx.reader.read(upload(png_bytes())).await;

        assert_eq!(response.summary, NO_HAND_SUMMARY);
        assert_eq!(response.prediction, NO_HAND_PREDICTION);
        assert!(response.features.is_none());
        assert!(response.image_path.is_none());
    }

    #[tokio::test]
    async fn test_model_error_response() {
        let fx = fixture(Detector::Broken);

        let response = fx.reader.read(upload(png_bytes())).await;

        assert_eq!(
            response,
            PredictionResponse::placeholder(ERROR_SUMMARY, ERROR_PREDICTION)
        );
    }

    #[tokio::test]
    async fn test_detected_hand_gets_roasted_and_annotated() {
        let fx = fixture(Detector::Hand);

        let response = fx
            .reader
            .read(PalmInput::Upload {
                bytes: png_bytes(),
                gender: Some("male".into()),
            })
            .await;

        let features = response.features.expect("features");
        assert_eq!(features.fingers, 5);
        assert_eq!(response.summary, features.summary());
        assert_eq!(response.prediction, "Beta, your hand says more than your CV.");

        let image_path = response.image_path.expect("annotated image");
        assert!(image_path.starts_with(fx.dir.path().join("images").to_str().unwrap()));
        assert!(std::path::Path::new(&image_path).exists());

        let prompts = fx.generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("User gender: male."));
        assert!(prompts[0].contains("Palmistry Meanings"));
        drop(prompts);
        assert!(fx.has_metric("llm_duration_ms"));
    }

    #[tokio::test]
    async fn test_demo_mode_reads_without_image() {
        let fx = fixture(Detector::Broken);

        let response = fx.reader.read(PalmInput::Demo { gender: None }).await;

        assert!(response.features.is_some());
        assert!(response.image_path.is_none());
        assert_eq!(response.prediction, "Beta, your hand says more than your CV.");
    }

    #[tokio::test]
    async fn test_empty_knowledge_base_falls_back_without_llm() {
        let fx = fixture_with(Detector::Hand, KnowledgeIndex::default());

        let response = fx.reader.read(upload(png_bytes())).await;

        assert_eq!(response.prediction, UNREADABLE_PALM);
        assert!(response.features.is_some());
        assert!(fx.generator.prompts.lock().unwrap().is_empty());
        assert!(fx.has_metric("readings_total"));
        assert!(!fx.has_metric("llm_duration_ms"));
    }

    #[tokio::test]
    async fn test_index_dimension_mismatch_fails_generation() {
        let mut index = palmistry_index();
        index.dimensions = 1536;
        let fx = fixture_with(Detector::Hand, index);

        let response = fx.reader.read(upload(png_bytes())).await;

        assert_eq!(response.prediction, GENERATION_FAILED);
        assert!(response.features.is_some());
        assert!(fx.generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_keeps_features() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(&StorageConfig {
            upload_dir: dir.path().join("uploads"),
            image_dir: dir.path().join("images"),
        })
        .unwrap();
        let reader = PalmReader::new(
            Arc::new(Detector::Hand),
            Arc::new(KnowledgeBase::new(
                palmistry_index(),
                Arc::new(KeywordEmbedder),
            )),
            Arc::new(SilentGenerator),
            store,
            Arc::new(Metrics::new().unwrap()),
            2,
        );

        let response = reader.read(upload(png_bytes())).await;

        assert_eq!(response.prediction, GENERATION_FAILED);
        assert!(response.features.is_some());
        assert!(response.image_path.is_some());
    }
}
