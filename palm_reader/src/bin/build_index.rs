use anyhow::Context;
use palm_reader::{
    config,
    knowledge::{KnowledgeIndex, OpenAiEmbedder, TextChunker},
    openai::OpenAiClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Embeds the palmistry knowledge source and writes the index the server
/// loads at startup.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::get_configuration()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();

    let knowledge = &config.knowledge;
    let text = std::fs::read_to_string(&knowledge.source_file)
        .with_context(|| format!("Failed to read {:?}", knowledge.source_file))?;

    let client = OpenAiClient::new(&config.openai)?;
    let embedder = OpenAiEmbedder::new(client, config.openai.embedding_model.clone());
    let chunker = TextChunker::new(knowledge.chunk_size, knowledge.chunk_overlap);

    let index = KnowledgeIndex::build(&text, &chunker, &embedder).await?;
    let path = index.save(&knowledge.index_dir)?;

    tracing::info!(
        "Indexed {} snippets ({} dimensions) into {:?}",
        index.snippets.len(),
        index.dimensions,
        path
    );
    Ok(())
}
