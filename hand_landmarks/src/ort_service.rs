use crate::{
    config::{ModelConfig, Validatable},
    landmarks::{HandDetection, HandLandmarks, Landmark, NUM_LANDMARKS},
    model_service::{LandmarkModel, ModelError},
};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Placement of the original image inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    width: u32,
    height: u32,
}

fn transform_image(
    image: &DynamicImage,
    input_size: u32,
) -> Result<(Array<f32, Ix4>, Letterbox), ModelError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ModelError::Inference("image has no pixels".into()));
    }

    let scale = input_size as f32 / width.max(height) as f32;
    let resized_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
    let resized_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
    let resized = image
        .resize_exact(resized_width, resized_height, FilterType::CatmullRom)
        .to_rgb8();

    let pad_x = (input_size - resized_width) / 2;
    let pad_y = (input_size - resized_height) / 2;

    let size = input_size as usize;
    let mut input = Array::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let px = (x + pad_x) as usize;
        let py = (y + pad_y) as usize;
        let [r, g, b] = pixel.0;
        input[[0, py, px, 0]] = (r as f32) / 255.;
        input[[0, py, px, 1]] = (g as f32) / 255.;
        input[[0, py, px, 2]] = (b as f32) / 255.;
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        width,
        height,
    };

    Ok((input, letterbox))
}

fn to_landmarks(raw: &[f32], letterbox: &Letterbox) -> Result<HandLandmarks, ModelError> {
    if raw.len() < NUM_LANDMARKS * 3 {
        return Err(ModelError::Output(format!(
            "expected {} landmark values, got {}",
            NUM_LANDMARKS * 3,
            raw.len()
        )));
    }

    let width = letterbox.width as f32;
    let height = letterbox.height as f32;
    let points = raw
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|xyz| {
            let x = (xyz[0] - letterbox.pad_x) / letterbox.scale;
            let y = (xyz[1] - letterbox.pad_y) / letterbox.scale;
            let z = xyz[2] / letterbox.scale;
            Landmark::new(x / width, y / height, z / width)
        })
        .collect();

    Ok(HandLandmarks::new(points)?)
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

#[derive(Clone)]
pub struct OrtLandmarkService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    input_size: u32,
    min_presence: f32,
    landmarks_output: String,
    presence_output: String,
}

impl OrtLandmarkService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_config.get_path();
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()
                    .map_err(|e| ModelError::Load(e.to_string()))?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .map_err(|e| ModelError::Load(e.to_string()))?
                    .with_intra_threads(1)
                    .map_err(|e| ModelError::Load(e.to_string()))?
                    .commit_from_file(&model_path)
                    .map_err(|e| ModelError::Load(e.to_string()))?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_path
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            input_size: model_config.input_size,
            min_presence: model_config.min_presence,
            landmarks_output: model_config.landmarks_output.clone(),
            presence_output: model_config.presence_output.clone(),
        })
    }

    /// Returns the raw landmark values and the presence logit.
    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<(Vec<f32>, f32), ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let landmarks = outputs
            .get(self.landmarks_output.as_str())
            .ok_or_else(|| {
                ModelError::Output(format!("missing output `{}`", self.landmarks_output))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(e.to_string()))?
            .1
            .to_vec();

        let presence = outputs
            .get(self.presence_output.as_str())
            .ok_or_else(|| {
                ModelError::Output(format!("missing output `{}`", self.presence_output))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(e.to_string()))?
            .1
            .first()
            .copied()
            .ok_or_else(|| ModelError::Output("empty presence tensor".into()))?;

        Ok((landmarks, presence))
    }

    fn detect_blocking(&self, image: &DynamicImage) -> Result<Option<HandDetection>, ModelError> {
        let (input, letterbox) = transform_image(image, self.input_size)?;
        let (raw_landmarks, presence_logit) = self.run_inference(&input)?;

        let presence = sigmoid(presence_logit);
        if presence < self.min_presence {
            tracing::debug!(
                "Hand presence {:.3} below threshold {:.3}",
                presence,
                self.min_presence
            );
            return Ok(None);
        }

        let landmarks = to_landmarks(&raw_landmarks, &letterbox)?;
        Ok(Some(HandDetection {
            landmarks,
            presence,
        }))
    }
}

#[async_trait]
impl LandmarkModel for OrtLandmarkService {
    async fn detect(&self, image: &DynamicImage) -> Result<Option<HandDetection>, ModelError> {
        let service = self.clone();
        let image = image.clone();
        tokio::task::spawn_blocking(move || service.detect_blocking(&image))
            .await
            .map_err(|e| ModelError::Inference(format!("inference task failed: {}", e)))?
    }
}
