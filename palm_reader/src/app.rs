use crate::config::Config;
use crate::knowledge::{IndexError, KnowledgeBase, KnowledgeIndex, OpenAiEmbedder};
use crate::openai::OpenAiClient;
use crate::pipeline::PalmReader;
use crate::roaster::OpenAiChat;
use crate::server::HttpServer;
use crate::storage::ImageStore;
use crate::telemetry::Metrics;

use hand_landmarks::OrtLandmarkService;
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    config.validate()?;

    let detector = match OrtLandmarkService::new(&config.model) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to initialize landmark model: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let client = OpenAiClient::new(&config.openai)?;
    let embedder = Arc::new(OpenAiEmbedder::new(
        client.clone(),
        config.openai.embedding_model.clone(),
    ));
    let chat = Arc::new(OpenAiChat::new(client, &config.openai));

    let index = match KnowledgeIndex::load(&config.knowledge.index_dir) {
        Ok(index) => {
            tracing::info!("Loaded {} knowledge snippets", index.snippets.len());
            index
        }
        Err(IndexError::NotFound(path)) => {
            tracing::warn!(
                "No knowledge index at {:?}, readings will fall back to the default roast",
                path
            );
            KnowledgeIndex::default()
        }
        Err(e) => {
            tracing::error!("Failed to load knowledge index: {:?}", e);
            return Err(Box::new(e));
        }
    };
    let knowledge = Arc::new(KnowledgeBase::new(index, embedder));

    let store = ImageStore::new(&config.storage)?;
    let metrics = Arc::new(Metrics::new()?);

    let reader = Arc::new(PalmReader::new(
        detector,
        knowledge,
        chat,
        store,
        metrics.clone(),
        config.knowledge.top_k,
    ));

    let server = HttpServer::new(reader, metrics, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
