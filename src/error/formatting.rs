//! Error formatting utilities
//!
//! Renders errors for the event stream shown to the user and for structured
//! log records.

use crate::Error;
use std::error::Error as StdError;

/// Format error for display
///
/// Appends every nested cause that the top-level message does not already
/// contain, so reqwest's connection details survive into the event log.
pub fn format_error(error: &Error) -> String {
    let formatted = match error {
        Error::Auth { stage, reason } => format!("login failed at {}: {}", stage, reason),
        Error::Transport {
            operation,
            attempts,
            message,
            timed_out: true,
        } => format!(
            "{} timed out {} times, check the network connection ({})",
            operation, attempts, message
        ),
        _ => error.to_string(),
    };

    let mut result = formatted;
    let mut source = error.source();

    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !result.contains(&cause_text) {
            result = format!("{} (caused by {})", result, cause_text);
        }
        source = cause.source();
    }

    result
}

/// Format error for logging with structured data
pub fn format_error_for_logging(error: &Error) -> serde_json::Value {
    let mut log_data = serde_json::json!({
        "message": format_error(error),
        "category": error.category(),
        "retryable": error.is_retryable(),
    });

    match error {
        Error::Auth { stage, .. } => {
            log_data["stage"] = serde_json::Value::String(stage.to_string());
        }
        Error::Transport {
            operation,
            attempts,
            timed_out,
            ..
        } => {
            log_data["operation"] = serde_json::Value::String(operation.clone());
            log_data["attempts"] = serde_json::Value::Number((*attempts).into());
            log_data["timed_out"] = serde_json::Value::Bool(*timed_out);
        }
        Error::RateLimit { retry_after_ms, .. } => {
            log_data["retry_after_ms"] = serde_json::Value::Number((*retry_after_ms).into());
        }
        _ => {}
    }

    log_data
}
