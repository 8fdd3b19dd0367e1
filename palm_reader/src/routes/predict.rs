use crate::{
    pipeline::{PalmInput, PredictionResponse, INVALID_IMAGE},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        FromRequest, Multipart, Request, State,
    },
    http::{header, HeaderMap},
    response::Json,
};
use serde::Deserialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/predict";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Malformed multipart request: {0}")]
    Multipart(#[from] MultipartRejection),
    #[error("Failed to read multipart field: {0}")]
    Field(#[from] MultipartError),
}

#[derive(Deserialize, Default)]
struct DemoRequest {
    #[serde(default)]
    gender: Option<String>,
}

/// Always answers 200; bad uploads become an "Invalid image" reading.
#[instrument(skip_all)]
pub async fn predict(State(state): State<SharedState>, request: Request) -> Json<PredictionResponse> {
    state.metrics.record_request(ROUTE);
    let start = Instant::now();

    let response = match read_input(&state, request).await {
        Ok(input) => state.reader.read(input).await,
        Err(e) => {
            tracing::info!("Rejected upload: {}", e);
            PredictionResponse::placeholder(INVALID_IMAGE, INVALID_IMAGE)
        }
    };

    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, ROUTE);
    Json(response)
}

async fn read_input(state: &SharedState, request: Request) -> Result<PalmInput, PredictError> {
    if !is_multipart(request.headers()) {
        let gender = match Bytes::from_request(request, state).await {
            Ok(body) => serde_json::from_slice::<DemoRequest>(&body)
                .unwrap_or_default()
                .gender,
            Err(_) => None,
        };
        return Ok(PalmInput::Demo { gender });
    }

    let mut multipart = Multipart::from_request(request, state).await?;
    let mut file = None;
    let mut gender = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => file = Some(field.bytes().await?.to_vec()),
            Some("gender") => gender = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(match file {
        Some(bytes) => PalmInput::Upload { bytes, gender },
        None => PalmInput::Demo { gender },
    })
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}
