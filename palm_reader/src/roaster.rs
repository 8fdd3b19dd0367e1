use crate::{
    config::OpenAiConfig,
    features::PalmFeatures,
    openai::{OpenAiClient, OpenAiError},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt::Write, sync::Arc};
use thiserror::Error;
use tracing::instrument;

pub const UNREADABLE_PALM: &str =
    "Baba couldn't make any sense of this one, beta. Hold your hand properly in front of the camera!";

const SYSTEM_PROMPT: &str = r#"You are "Savage Baba", a witty, sarcastic but insightful roadside palm reader.
You mix real palmistry wisdom with merciless roasting.

Style rules:
- Speak like a mystical desi baba with a funny twist, using a "beta"/"beti" tone.
- Use natural Hinglish.
- Every reading must feel personal and follow from the detected hand features and their meanings.
- Never print raw numbers; interpret them instead (low openness: closed mind, high openness: carefree, long life line: long life, short life line: struggle).
- Stick to one theme per reading and stay tied to palmistry meanings; do not invent random traits.
- Avoid generic adjectives and filler lines.
- Each point is one or two tight, savage, funny lines. No summaries."#;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Chat completion request failed: {0}")]
    Request(#[from] OpenAiError),
    #[error("Chat completion returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response: ChatResponse = self.client.post_json("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

pub fn build_user_prompt(
    features: &PalmFeatures,
    meanings: &[String],
    gender: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if let Some(gender) = gender.map(str::trim).filter(|g| !g.is_empty()) {
        let _ = writeln!(
            prompt,
            "User gender: {}. Use beta or beti accordingly.\n",
            gender
        );
    }

    prompt.push_str("Palm Features Detected:\n");
    for (name, value) in features.entries() {
        let _ = writeln!(prompt, "- {}: {}", name, value);
    }

    prompt.push_str("\nPalmistry Meanings (from Knowledge Base):\n");
    for meaning in meanings {
        let _ = writeln!(prompt, "- {}", meaning);
    }

    prompt.push_str("\nNow generate a unique palm reading roast with real palmistry insights.");
    prompt
}

/// Turns palm features and their retrieved meanings into a roast.
pub struct Roaster<G: TextGenerator + ?Sized> {
    generator: Arc<G>,
}

impl<G: TextGenerator + ?Sized> Roaster<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self { generator }
    }

    pub async fn roast(
        &self,
        features: &PalmFeatures,
        meanings: &[String],
        gender: Option<&str>,
    ) -> Result<String, LlmError> {
        if meanings.is_empty() {
            return Ok(UNREADABLE_PALM.to_string());
        }

        let user_prompt = build_user_prompt(features, meanings, gender);
        self.generator.complete(SYSTEM_PROMPT, &user_prompt).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed roast.
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        pub prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok("Beta, your hand says more than your CV.".to_string())
        }
    }

    fn features() -> PalmFeatures {
        PalmFeatures {
            fingers: 5,
            openness: 0.31,
            life_line: 0.32,
            fingers_label: "full open hand, open-minded".into(),
            openness_label: "high openness".into(),
            life_line_label: "long life line".into(),
        }
    }

    #[test]
    fn test_user_prompt_lists_features_and_meanings() {
        let prompt = build_user_prompt(
            &features(),
            &["An open palm means an open mind.".to_string()],
            Some("female"),
        );

        assert!(prompt.starts_with("User gender: female."));
        assert!(prompt.contains("- fingers: 5\n"));
        assert!(prompt.contains("- openness_label: high openness\n"));
        assert!(prompt.contains("- An open palm means an open mind.\n"));
    }

    #[test]
    fn test_user_prompt_skips_blank_gender() {
        let prompt = build_user_prompt(&features(), &[], Some("  "));
        assert!(prompt.starts_with("Palm Features Detected:"));
    }

    #[tokio::test]
    async fn test_roast_without_meanings_skips_llm() {
        let generator = Arc::new(ScriptedGenerator::default());
        let roaster = Roaster::new(generator.clone());

        let roast = roaster.roast(&features(), &[], None).await.unwrap();

        assert_eq!(roast, UNREADABLE_PALM);
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roast_sends_prompt() {
        let generator = Arc::new(ScriptedGenerator::default());
        let roaster = Roaster::new(generator.clone());

        let roast = roaster
            .roast(&features(), &["Long life line, long life.".to_string()], None)
            .await
            .unwrap();

        assert_eq!(roast, "Beta, your hand says more than your CV.");
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- Long life line, long life."));
    }

    fn chat_for(server: &MockServer) -> OpenAiChat {
        let config = OpenAiConfig {
            api_key: Some("test-key".into()),
            base_url: server.base_url(),
            ..Default::default()
        };
        OpenAiChat::new(OpenAiClient::new(&config).unwrap(), &config)
    }

    #[tokio::test]
    async fn test_openai_chat_returns_trimmed_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions").json_body(json!({
                    "model": "gpt-4o-mini",
                    "messages": [
                        {"role": "system", "content": "be savage"},
                        {"role": "user", "content": "Palm summary"}
                    ],
                    "temperature": 0.9,
                    "max_tokens": 300
                }));
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Roasted!  \n"}}]
                }));
            })
            .await;

        let reply = chat_for(&server)
            .complete("be savage", "Palm summary")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Roasted!");
    }

    #[tokio::test]
    async fn test_openai_chat_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let result = chat_for(&server).complete("system", "user").await;
        assert!(matches!(result, Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_openai_chat_surfaces_server_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let result = chat_for(&server).complete("system", "user").await;
        assert!(matches!(
            result,
            Err(LlmError::Request(OpenAiError::Status { .. }))
        ));
    }
}
