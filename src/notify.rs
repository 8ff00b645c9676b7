use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;

pub const NOT_CONFIGURED: &str = "messaging not configured";

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub thread_id: Option<String>,
    pub api_base: String,
}

/// Result of one outbound attempt. Failures are data, never errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl SendOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Folds an operation error into a failed outcome.
    pub fn settle(result: Result<SendOutcome, AppError>) -> Self {
        result.unwrap_or_else(|err| Self::failed(err.to_string()))
    }
}

pub struct Notifier {
    config: Option<TelegramConfig>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: Option<TelegramConfig>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let Some(config) = &self.config else {
            return SendOutcome::failed(NOT_CONFIGURED);
        };
        let mut payload = json!({
            "chat_id": config.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(thread_id) = &config.thread_id {
            payload["message_thread_id"] = json!(thread_id);
        }
        let request = self
            .client
            .post(method_url(config, "sendMessage"))
            .json(&payload);
        let outcome = finish(request.send().await, "message sent").await;
        log_outcome("sendMessage", &outcome);
        outcome
    }

    pub async fn send_file(&self, path: &Path, caption: &str) -> SendOutcome {
        let Some(config) = &self.config else {
            return SendOutcome::failed(NOT_CONFIGURED);
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => return SendOutcome::failed(format!("cannot read {}: {err}", path.display())),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup.json".to_string());
        let part = match Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/json")
        {
            Ok(part) => part,
            Err(err) => return SendOutcome::failed(err.to_string()),
        };
        let mut form = Form::new()
            .text("chat_id", config.chat_id.clone())
            .text("caption", caption.to_string())
            .part("document", part);
        if let Some(thread_id) = &config.thread_id {
            form = form.text("message_thread_id", thread_id.clone());
        }
        let request = self
            .client
            .post(method_url(config, "sendDocument"))
            .multipart(form);
        let outcome = finish(request.send().await, "file sent").await;
        log_outcome("sendDocument", &outcome);
        outcome
    }
}

fn method_url(config: &TelegramConfig, method: &str) -> String {
    format!(
        "{}/bot{}/{}",
        config.api_base.trim_end_matches('/'),
        config.token,
        method
    )
}

async fn finish(
    result: Result<reqwest::Response, reqwest::Error>,
    success_message: &str,
) -> SendOutcome {
    match result {
        Ok(response) if response.status().is_success() => SendOutcome::ok(success_message),
        Ok(response) => {
            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => err.without_url().to_string(),
            };
            SendOutcome::failed(format!("error {status}: {body}"))
        }
        Err(err) => SendOutcome::failed(format!("connection error: {}", err.without_url())),
    }
}

fn log_outcome(method: &str, outcome: &SendOutcome) {
    if outcome.success {
        info!(method, "messaging call succeeded");
    } else {
        warn!(method, message = %outcome.message, "messaging call failed");
    }
}
