mod routes;

pub mod annotate;
pub mod app;
pub mod config;
pub mod demo;
pub mod features;
pub mod knowledge;
pub mod openai;
pub mod pipeline;
pub mod roaster;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use app::start_app;
pub use pipeline::{PalmInput, PalmReader, PredictionResponse};
