//! Webhook backend API: response envelopes and the HTTP client.
//!
//! Both endpoints wrap their payload in `{status, message?, data?}`. The
//! parsers here turn that envelope into a typed `Result` once, at the
//! boundary, so the controller never inspects JSON shape itself:
//!
//! - `GET /api/dashboard/summary` → [`DashboardSummary`]
//! - `GET /api/webhook/data?from=..&to=..` → `Vec<WebhookRecord>`

pub mod client;

use serde_json::Value;

use crate::error::DashboardError;
use crate::model::{DashboardSummary, WebhookRecord};

pub use client::{ApiClient, Transport, UreqTransport};

/// Envelope status value that marks a successful response.
const SUCCESS_STATUS: &str = "success";

/// Unwrap the `{status, message, data}` envelope and return `data`.
fn unwrap_envelope(body: Value) -> Result<Value, DashboardError> {
    let Value::Object(mut envelope) = body else {
        return Err(DashboardError::Protocol(
            "expected a JSON object envelope".to_string(),
        ));
    };

    let status = envelope.get("status").and_then(Value::as_str);
    if status != Some(SUCCESS_STATUS) {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Err(DashboardError::Rejected(message));
    }

    match envelope.remove("data") {
        None | Some(Value::Null) => Err(DashboardError::Protocol(
            "response has no data field".to_string(),
        )),
        Some(data) => Ok(data),
    }
}

/// Validate a summary response body.
pub fn parse_summary(body: Value) -> Result<DashboardSummary, DashboardError> {
    let data = unwrap_envelope(body)?;
    let summary: DashboardSummary = serde_json::from_value(data)
        .map_err(|e| DashboardError::Protocol(format!("unexpected summary shape: {e}")))?;

    if let Some(dataset) = summary.chart_data.misaligned_dataset() {
        return Err(DashboardError::Protocol(format!(
            "chart dataset '{}' has {} points for {} labels",
            dataset.label,
            dataset.data.len(),
            summary.chart_data.labels.len()
        )));
    }

    Ok(summary)
}

/// Validate a records response body.
pub fn parse_records(body: Value) -> Result<Vec<WebhookRecord>, DashboardError> {
    let data = unwrap_envelope(body)?;
    if !data.is_array() {
        return Err(DashboardError::Protocol(
            "expected data to be a list of records".to_string(),
        ));
    }
    serde_json::from_value(data)
        .map_err(|e| DashboardError::Protocol(format!("unexpected record shape: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
