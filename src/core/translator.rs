/*
 * Translates one unit of text through an OpenAI-compatible chat completions
 * endpoint. Each call waits for a slot on the run's `RatePacer`, sends the
 * configured system and user prompts followed by a translation instruction and the
 * content, and adds the reported token usage to the run's counters.
 *
 * The message assembly and response parsing are plain functions so they can be
 * checked without a network.
 */
use crate::core::config::{DEFAULT_TIMEOUT_SECS, PromptSet, VendorConfig};
use crate::core::models::language_display_name;
use crate::core::rate_pacer::RatePacer;
use crate::core::run_control::{Cancelled, RunControl};
use crate::core::token_usage::{TokenCounters, TokenUsage};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum TranslateError {
    Http(reqwest::Error),
    Status { code: u16, body: String },
    MalformedResponse(serde_json::Error),
    Cancelled,
}

impl From<reqwest::Error> for TranslateError {
    fn from(err: reqwest::Error) -> Self {
        TranslateError::Http(err)
    }
}

impl From<serde_json::Error> for TranslateError {
    fn from(err: serde_json::Error) -> Self {
        TranslateError::MalformedResponse(err)
    }
}

impl From<Cancelled> for TranslateError {
    fn from(_: Cancelled) -> Self {
        TranslateError::Cancelled
    }
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Http(e) => write!(f, "Translation request failed: {e}"),
            TranslateError::Status { code, body } => {
                write!(f, "Translation endpoint returned status {code}: {body}")
            }
            TranslateError::MalformedResponse(e) => {
                write!(f, "Translation response could not be parsed: {e}")
            }
            TranslateError::Cancelled => write!(f, "Translation canceled"),
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranslateError::Http(e) => Some(e),
            TranslateError::MalformedResponse(e) => Some(e),
            _ => None,
        }
    }
}

pub struct TranslationRequest<'a> {
    pub content: &'a str,
    pub target_lang: &'a str,
    pub source_path: &'a Path,
}

pub trait TranslatorOperations: Send + Sync {
    fn translate(
        &self,
        request: &TranslationRequest<'_>,
        control: &RunControl,
    ) -> Result<String, TranslateError>;
    fn token_usage(&self) -> TokenUsage;
    fn reset_token_usage(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

pub fn translation_instruction(target_lang: &str, source_path: &Path) -> String {
    let extension = source_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "Please translate the following content to {}. The file type is {extension}.",
        language_display_name(target_lang)
    )
}

/*
 * System prompts (or a single empty system message when none are configured),
 * then user prompts, then the instruction, then the content itself.
 */
pub fn build_messages(prompts: &PromptSet, request: &TranslationRequest<'_>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = prompts
        .system
        .iter()
        .map(|prompt| ChatMessage::new(ChatRole::System, prompt.as_str()))
        .collect();
    if messages.is_empty() {
        messages.push(ChatMessage::new(ChatRole::System, ""));
    }
    messages.extend(
        prompts
            .user
            .iter()
            .map(|prompt| ChatMessage::new(ChatRole::User, prompt.as_str())),
    );
    messages.push(ChatMessage::new(
        ChatRole::User,
        translation_instruction(request.target_lang, request.source_path),
    ));
    messages.push(ChatMessage::new(ChatRole::User, request.content));
    messages
}

/*
 * Extracts the first choice's text and the usage report. A response without
 * usable content yields `original` unchanged.
 */
pub fn parse_completion(response: ChatCompletionResponse, original: &str) -> (String, TokenUsage) {
    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty());
    match content {
        Some(text) => (text, usage),
        None => {
            log::warn!("Translator: Response carried no content, keeping the untranslated text.");
            (original.to_string(), usage)
        }
    }
}

pub fn completions_url(api_endpoint: &str) -> String {
    format!("{}/chat/completions", api_endpoint.trim_end_matches('/'))
}

pub struct CoreTranslator {
    client: Client,
    vendor: VendorConfig,
    prompts: PromptSet,
    pacer: Arc<RatePacer>,
    counters: TokenCounters,
}

impl CoreTranslator {
    pub fn new(
        vendor: VendorConfig,
        prompts: PromptSet,
        pacer: Arc<RatePacer>,
    ) -> Result<Self, TranslateError> {
        let timeout_secs = vendor.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        log::info!(
            "Translator: Using vendor '{}' at {} (model '{}', timeout {timeout_secs}s).",
            vendor.name,
            vendor.api_endpoint,
            vendor.model
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(CoreTranslator {
            client,
            vendor,
            prompts,
            pacer,
            counters: TokenCounters::new(),
        })
    }

    fn send(&self, messages: &[ChatMessage]) -> Result<ChatCompletionResponse, TranslateError> {
        let body = ChatCompletionRequest {
            model: &self.vendor.model,
            messages,
            temperature: self.vendor.temperature,
        };
        let response = self
            .client
            .post(completions_url(&self.vendor.api_endpoint))
            .bearer_auth(&self.vendor.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(TranslateError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl TranslatorOperations for CoreTranslator {
    fn translate(
        &self,
        request: &TranslationRequest<'_>,
        control: &RunControl,
    ) -> Result<String, TranslateError> {
        self.pacer
            .wait_for_slot(&self.vendor.name, self.vendor.requests_per_minute(), control)?;

        let messages = build_messages(&self.prompts, request);
        log::debug!(
            "Translator: Sending {} message(s) for {:?} to '{}' with model '{}'.",
            messages.len(),
            request.source_path,
            language_display_name(request.target_lang),
            self.vendor.model
        );
        let started = Instant::now();
        let response = self.send(&messages).inspect_err(|e| {
            log::error!("Translator: Translation failed for {:?}: {e}", request.source_path);
        })?;

        let (translated, usage) = parse_completion(response, request.content);
        self.counters.add(usage.input_tokens, usage.output_tokens);
        log::info!(
            "Translator: Request completed in {:.1}s (input: {} tokens, output: {} tokens).",
            started.elapsed().as_secs_f64(),
            usage.input_tokens,
            usage.output_tokens
        );
        Ok(translated)
    }

    fn token_usage(&self) -> TokenUsage {
        self.counters.snapshot()
    }

    fn reset_token_usage(&self) {
        self.counters.reset();
    }
}
