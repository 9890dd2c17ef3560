//! Generative-assist capability for ambiguous PII findings.
//!
//! The redactor masks high-confidence findings on its own. Findings in
//! the ambiguous band are collected into batches and offered to a
//! [`RedactionAssist`] implementation for a second opinion. The
//! capability is strictly best-effort: any failure leaves the local
//! result standing.

use crate::error::Result;
use crate::redact::analyzer::PiiEntity;

#[cfg(feature = "assist")]
use crate::error::PipelineError;
#[cfg(feature = "assist")]
use reqwest::blocking::Client;
#[cfg(feature = "assist")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "assist")]
use std::time::Duration;

/// One ambiguous finding offered for review.
#[derive(Debug, Clone)]
pub struct AssistItem {
    /// The matched text.
    pub snippet: String,
    /// What the local analyzer thinks it is.
    pub entity: PiiEntity,
}

/// Second-opinion service for ambiguous findings.
///
/// Implementations must be `Send + Sync`. A review call covers a whole
/// batch; implementations never issue one request per cell.
pub trait RedactionAssist: Send + Sync {
    /// Review a batch of ambiguous findings.
    ///
    /// Returns one verdict per item, in order: `true` to mask, `false`
    /// to leave the text alone.
    fn review(&self, batch: &[AssistItem]) -> Result<Vec<bool>>;

    /// Provider name for logging.
    fn name(&self) -> &str;

    /// False for the local-only implementation.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Local-only stand-in used when no API key is configured.
///
/// Confirms every finding, so the local analyzer's verdict stands.
#[derive(Debug, Default)]
pub struct NoAssist;

impl RedactionAssist for NoAssist {
    fn review(&self, batch: &[AssistItem]) -> Result<Vec<bool>> {
        Ok(vec![true; batch.len()])
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(feature = "assist")]
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

#[cfg(feature = "assist")]
const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

#[cfg(feature = "assist")]
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[cfg(feature = "assist")]
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[cfg(feature = "assist")]
#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[cfg(feature = "assist")]
#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[cfg(feature = "assist")]
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[cfg(feature = "assist")]
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[cfg(feature = "assist")]
#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[cfg(feature = "assist")]
#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

/// Gemini-backed reviewer for ambiguous findings.
///
/// Sends one request per batch with a yes/no verdict per line and a
/// bounded timeout.
#[cfg(feature = "assist")]
pub struct GeminiAssist {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

#[cfg(feature = "assist")]
impl GeminiAssist {
    /// Create a reviewer with the default model and timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            client,
        })
    }

    fn build_prompt(&self, batch: &[AssistItem]) -> String {
        let mut prompt = String::from(
            "You review possible personal data found in an industrial sensor \
             log. For each numbered item, answer whether the text really is \
             the named kind of personal data.\n\n",
        );
        for (i, item) in batch.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. [{}] {}\n",
                i + 1,
                item.entity.label(),
                item.snippet
            ));
        }
        prompt.push_str(
            "\nAnswer with one line per item, in order, containing only YES \
             or NO. No other text.\n",
        );
        prompt
    }

    fn call_api(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 500,
            },
        };

        let url = format!(
            "{}{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            return Err(PipelineError::RedactionServiceUnavailable(format!(
                "Gemini API error {}",
                response.status()
            )));
        }

        let result: GeminiResponse = response.json()?;
        let text = result
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.as_ref())
            .and_then(|parts| parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                PipelineError::RedactionServiceUnavailable(
                    "no response content from Gemini API".to_string(),
                )
            })?;

        Ok(text)
    }

    /// Parse one YES/NO line per item. Unparseable lines confirm the
    /// local finding rather than discard it.
    fn parse_verdicts(&self, response: &str, expected: usize) -> Vec<bool> {
        let mut verdicts: Vec<bool> = response
            .lines()
            .filter_map(|line| {
                let cleaned = line
                    .trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                    .trim();
                if cleaned.is_empty() {
                    return None;
                }
                if cleaned.eq_ignore_ascii_case("no") {
                    Some(false)
                } else {
                    Some(true)
                }
            })
            .collect();

        verdicts.resize(expected, true);
        verdicts.truncate(expected);
        verdicts
    }
}

#[cfg(feature = "assist")]
impl RedactionAssist for GeminiAssist {
    fn review(&self, batch: &[AssistItem]) -> Result<Vec<bool>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = self.build_prompt(batch);
        let response = self.call_api(&prompt)?;
        Ok(self.parse_verdicts(&response, batch.len()))
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}
