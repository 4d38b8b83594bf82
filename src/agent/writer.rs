// SYNOID Script Writer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Text generation for the short-video tools: ideas, social captions,
// rewrites of source material, transcript analysis and voiceover polish.
// Talks to any OpenAI-compatible chat completions endpoint.

use crate::error::{Result, ShortsError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Longest transcript excerpt sent for analysis.
pub const ANALYSIS_CHAR_LIMIT: usize = 8000;

const DEFAULT_REWRITE_STYLE: &str = "casual and natural";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(client: reqwest::Client, api_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        info!("[WRITER] Asking {} ({} chars)", self.model, prompt.len());

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.7
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ShortsError::external(
                "text generator",
                format!("{}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ShortsError::external("text generator", "empty completion"))
    }
}

/// Prompt layer over a [`TextGenerator`]. Every method rejects blank input
/// before calling out.
#[derive(Clone)]
pub struct ScriptWriter {
    generator: Arc<dyn TextGenerator>,
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ShortsError::InputValidation(format!("{} must not be empty", what)))
    } else {
        Ok(trimmed)
    }
}

const CREATOR_ROLE: &str = "You are a short-form video creator and scriptwriter.";

impl ScriptWriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn idea(&self, topic: &str) -> Result<String> {
        let topic = required(topic, "topic")?;
        let prompt = format!(
            "Pitch an engaging content idea for a short vertical video about: {}. \
             Keep the tone light and catchy for short-video viewers.",
            topic
        );
        self.generator.complete(CREATOR_ROLE, &prompt).await
    }

    pub async fn social_caption(&self, topic: &str, lang: &str) -> Result<String> {
        let topic = required(topic, "topic")?;
        let lang = if lang.trim().is_empty() { "id" } else { lang.trim() };
        let prompt = format!(
            "Write a short caption for a Reels or YouTube Shorts video in language '{}'. \
             Make it catchy and include emoji and popular hashtags. Video topic: {}",
            lang, topic
        );
        self.generator.complete(CREATOR_ROLE, &prompt).await
    }

    /// Turn source material into a short-video narration script.
    pub async fn rewrite(&self, source: &str, style: Option<&str>) -> Result<String> {
        let source = required(source, "source text")?;
        let style = style
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REWRITE_STYLE);
        let prompt = format!(
            "Turn the material below into a compelling narration script for a short video.\n\
             Writing style: {}.\n\n\
             Adapt to the topic:\n\
             - podcast or talk: distil it into a strong motivational or reflective message;\n\
             - product or place: add useful facts the source leaves out and make it visual;\n\
             - history, story or biography: draw out a life lesson that motivates the viewer.\n\
             The output must read as one flowing voiceover.\n\nSource:\n{}",
            style, source
        );
        self.generator.complete(CREATOR_ROLE, &prompt).await
    }

    pub async fn analyze_transcript(&self, transcript: &str) -> Result<String> {
        let transcript = required(transcript, "transcript")?;
        let excerpt: String = transcript.chars().take(ANALYSIS_CHAR_LIMIT).collect();
        let prompt = format!(
            "Here is the transcript of a YouTube video:\n---\n{}\n---\n\
             Analyse it and report in markdown:\n\
             1. **Main topic**\n2. **Video format**\n3. **Delivery style**\n\
             4. **Two-sentence summary**",
            excerpt
        );
        self.generator
            .complete("You are an expert YouTube video analyst.", &prompt)
            .await
    }

    /// Rewrite a script so it reads naturally aloud in 30 to 60 seconds.
    pub async fn polish_voiceover(&self, text: &str) -> Result<String> {
        let text = required(text, "text")?;
        let prompt = format!(
            "Rewrite the text below so it suits a 30 to 60 second short video voiceover. \
             Use natural spoken language and light storytelling. Reply with the narration only.\n\n{}",
            text
        );
        self.generator
            .complete(
                "You are a voiceover scriptwriter for short videos and a skilled storyteller.",
                &prompt,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated".to_string())
        }
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_generator() {
        let generator = Arc::new(RecordingGenerator::default());
        let writer = ScriptWriter::new(generator.clone());
        assert!(writer.idea("  ").await.is_err());
        assert!(writer.social_caption("", "id").await.is_err());
        assert!(writer.rewrite("\n", None).await.is_err());
        assert!(writer.analyze_transcript("").await.is_err());
        assert!(writer.polish_voiceover(" ").await.is_err());
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompts_carry_input() {
        let generator = Arc::new(RecordingGenerator::default());
        let writer = ScriptWriter::new(generator.clone());
        assert_eq!(writer.idea("kopi pagi").await.unwrap(), "generated");
        writer.rewrite("sejarah candi", Some("formal")).await.unwrap();
        writer.social_caption("pantai", "en").await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("kopi pagi"));
        assert!(prompts[1].contains("Writing style: formal."));
        assert!(prompts[2].contains("language 'en'"));
    }

    #[tokio::test]
    async fn test_analysis_truncates_transcript() {
        let generator = Arc::new(RecordingGenerator::default());
        let writer = ScriptWriter::new(generator.clone());
        let transcript = "x".repeat(ANALYSIS_CHAR_LIMIT + 500);
        writer.analyze_transcript(&transcript).await.unwrap();
        let prompts = generator.prompts.lock().unwrap();
        let xs = prompts[0].chars().filter(|c| *c == 'x').count();
        assert_eq!(xs, ANALYSIS_CHAR_LIMIT);
    }
}
