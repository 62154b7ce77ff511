// Generation collaborator
// Turns retrieved context plus a question into an answer from a chat model


use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::database::lancedb::{KNOWN_AGE_GROUPS, KNOWN_REGIONS};
use crate::embeddings::ollama::{ChatMessage, ChatOptions, OllamaClient};
use crate::{RagError, Result};

/// System and user text handed to a chat model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Opaque text generator consuming a prompt
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &Prompt) -> anyhow::Result<String>;
}

/// Chat completion through a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    options: ChatOptions,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient, model: impl Into<String>, options: ChatOptions) -> Self {
        Self {
            client,
            model: model.into(),
            options,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = OllamaClient::new(&config.ollama)
            .context("Failed to create Ollama client for generation")?
            .with_timeout(Duration::from_secs(config.generation.timeout_seconds));

        Ok(Self::new(
            client,
            config.generation.model.clone(),
            ChatOptions {
                temperature: config.generation.temperature,
                num_predict: config.generation.num_predict,
            },
        ))
    }
}

impl Generator for OllamaGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn generate(&self, prompt: &Prompt) -> anyhow::Result<String> {
        let messages = [
            ChatMessage::system(prompt.system.as_str()),
            ChatMessage::user(prompt.user.as_str()),
        ];
        self.client.chat(&self.model, &messages, self.options)
    }
}

/// Build the chat prompt for `query`, grounding it in `context`
///
/// Audience hints are only added for recognised age groups and regions,
/// matching what the retrieval filter understands.
#[inline]
pub fn build_prompt(
    query: &str,
    context: &str,
    age_group: Option<&str>,
    region: Option<&str>,
) -> Prompt {
    let mut system = String::from(
        "You are a financial literacy assistant for women. \
         Answer only personal finance questions: budgeting, saving, investing, banking, loans, \
         government schemes and small business.\n\
         Keep answers clear, direct and under 400 words.\n",
    );

    let age_group = age_group.filter(|g| KNOWN_AGE_GROUPS.contains(g));
    let region = region
        .map(str::to_ascii_lowercase)
        .filter(|r| KNOWN_REGIONS.contains(&r.as_str()));

    match (age_group, region.as_deref()) {
        (Some(age), Some(region)) => {
            system.push_str(&audience_line(&format!("aged {age} in {}", capitalize(region))));
        }
        (Some(age), None) => system.push_str(&audience_line(&format!("aged {age}"))),
        (None, Some(region)) => {
            system.push_str(&audience_line(&format!("in {}", capitalize(region))));
        }
        (None, None) => {}
    }

    system.push_str("\nContext:\n");
    system.push_str(context);
    system.push_str("\n\nUse the context above. If it does not cover the question, say so.");

    Prompt {
        system,
        user: query.to_string(),
    }
}

fn audience_line(who: &str) -> String {
    format!("The reader is {who}; tailor examples to them.\n")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Run `generator` off the async runtime and reject blank answers
#[inline]
pub async fn generate_answer(generator: Arc<dyn Generator>, prompt: Prompt) -> Result<String> {
    debug!("Generating answer with {}", generator.model_name());

    let answer = tokio::task::spawn_blocking(move || generator.generate(&prompt))
        .await
        .map_err(|e| RagError::Generation(format!("Generation task failed: {e}")))?
        .map_err(|e| RagError::Generation(format!("{e:#}")))?;

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(RagError::Generation(
            "Model returned an empty response".to_string(),
        ));
    }

    Ok(answer.to_string())
}
