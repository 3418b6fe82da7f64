//! Gemini client for candidate sayings.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, GeneratorResult};
use crate::generator::{GenerationMode, SayingGenerator};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GeneratorResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GeneratorError::config("GEMINI_API_KEY not set"))?;

        let timeout_secs: u64 = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// `SayingGenerator` backed by the Gemini `generateContent` endpoint.
pub struct GeminiSayingGenerator {
    config: GeminiConfig,
    mode: GenerationMode,
    client: Client,
}

impl GeminiSayingGenerator {
    pub fn new(config: GeminiConfig, mode: GenerationMode) -> GeneratorResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("figures-generator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            mode,
            client,
        })
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    fn build_prompt(&self, display_name: &str, batch_size: usize) -> String {
        let max_chars = self.mode.max_chars();
        format!(
            r#"人物: {display_name}

この人物の価値観や生き方を踏まえ、現代の生活や仕事に通じる含意を持つ
{max_chars}文字以内の日本語の短文を{batch_size}本生成してください。
番号や記号での列挙は避け、互いに言い換えにならないようにしてください。

次の形式の JSON オブジェクトだけを返してください:
{{"sayings": ["...", "..."]}}"#
        )
    }

    fn build_request(&self, display_name: &str, batch_size: usize) -> GeminiRequest {
        GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: "あなたは偉人の思想を現代語に落とし込む編集者です。".to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: self.build_prompt(display_name, batch_size),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.9,
                top_p: 0.9,
            },
        }
    }

    async fn call_gemini_api(&self, request: &GeminiRequest) -> GeneratorResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        );

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api { status, body });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        gemini_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or(GeneratorError::EmptyResponse)
    }
}

#[async_trait]
impl SayingGenerator for GeminiSayingGenerator {
    async fn generate(&self, display_name: &str, batch_size: usize) -> GeneratorResult<Vec<String>> {
        let request = self.build_request(display_name, batch_size);
        let start = Instant::now();

        let result = match self.call_gemini_api(&request).await {
            Ok(text) => parse_sayings(&text),
            Err(e) => Err(e),
        };

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!("figures_generator_requests_total", "outcome" => outcome).increment(1);
        histogram!("figures_generator_latency_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(sayings) => info!(
                model = %self.config.model,
                display_name = %display_name,
                returned = sayings.len(),
                "Generated candidate batch"
            ),
            Err(e) => warn!(model = %self.config.model, display_name = %display_name, "Generation failed: {}", e),
        }

        result
    }
}

#[derive(Debug, Deserialize)]
struct SayingsPayload {
    sayings: Option<Vec<serde_json::Value>>,
}

/// Parse `{"sayings": [...]}`, tolerating a markdown code fence around it.
pub fn parse_sayings(text: &str) -> GeneratorResult<Vec<String>> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    let payload: SayingsPayload = serde_json::from_str(text)
        .map_err(|e| GeneratorError::invalid_payload(format!("not a JSON object: {}", e)))?;

    let items = payload
        .sayings
        .ok_or_else(|| GeneratorError::invalid_payload("missing 'sayings' array"))?;

    debug!(count = items.len(), "Parsed generator payload");

    Ok(items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_payload() {
        let parsed = parse_sayings(r#"{"sayings": ["志を磨け", "継続は力なり"]}"#).unwrap();
        assert_eq!(parsed, vec!["志を磨け", "継続は力なり"]);
    }

    #[test]
    fn test_parse_fenced_payload() {
        let parsed = parse_sayings("```json\n{\"sayings\": [\"一\"]}\n```").unwrap();
        assert_eq!(parsed, vec!["一"]);

        let parsed = parse_sayings("```\n{\"sayings\": []}\n```").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_stringifies_non_string_items() {
        let parsed = parse_sayings(r#"{"sayings": ["a", 7]}"#).unwrap();
        assert_eq!(parsed, vec!["a", "7"]);
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(matches!(
            parse_sayings(r#"{"lines": ["a"]}"#),
            Err(GeneratorError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_sayings(r#"{"sayings": "a"}"#),
            Err(GeneratorError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_sayings("not json"),
            Err(GeneratorError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_prompt_reflects_mode_and_batch() {
        let config = GeminiConfig {
            api_key: "k".to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(1),
        };
        let generator = GeminiSayingGenerator::new(config, GenerationMode::Long).unwrap();
        let prompt = generator.build_prompt("織田信長", 12);
        assert!(prompt.contains("織田信長"));
        assert!(prompt.contains("80文字以内"));
        assert!(prompt.contains("12本"));
    }
}
