//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, which is the concrete implementation
//! of the `ReportBackend` port from the `core` crate. It handles all interactions
//! with the Compare Bot backend using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use compare_bot_core::domain::{
    ComparisonQuery, ComparisonResult, LoginGrant, ReportSummary, UploadReceipt, UploadRequest,
};
use compare_bot_core::ports::{PortError, PortResult, ReportBackend};
use reqwest::{multipart, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the `ReportBackend` port.
///
/// No request timeout is configured: a hung request keeps its workflow
/// waiting until the caller gives up.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` talking to `base_url`.
    pub fn new(base_url: impl Into<String>) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Serialize)]
struct LoginPayload<'a> {
    client_id: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginRecord {
    token: String,
    client_id: Option<String>,
}
impl LoginRecord {
    fn to_domain(self, requested_client_id: &str) -> LoginGrant {
        LoginGrant {
            token: self.token,
            client_id: self
                .client_id
                .unwrap_or_else(|| requested_client_id.to_string()),
        }
    }
}

/// The `{detail}` body the backend attaches to failures. Validation failures
/// carry a list instead of a string; those yield no message.
#[derive(Deserialize)]
struct ErrorRecord {
    detail: Option<serde_json::Value>,
}
impl ErrorRecord {
    fn into_message(self) -> Option<String> {
        match self.detail {
            Some(serde_json::Value::String(message)) if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ReceiptRecord {
    message: Option<String>,
    report_id: Option<i64>,
    week_number: Option<u32>,
    text_length: Option<u64>,
}
impl ReceiptRecord {
    fn to_domain(self) -> UploadReceipt {
        UploadReceipt {
            message: self.message,
            report_id: self.report_id,
            week_number: self.week_number,
            text_length: self.text_length,
        }
    }
}

#[derive(Deserialize)]
struct ComparisonRecord {
    summary: String,
    highlights: Vec<String>,
    week_number: u32,
    previous_week_number: u32,
    created_at: String,
}
impl ComparisonRecord {
    fn to_domain(self) -> PortResult<ComparisonResult> {
        let created_at = parse_timestamp(&self.created_at)?;
        ComparisonResult::new(
            self.summary,
            self.highlights,
            self.week_number,
            self.previous_week_number,
            created_at,
        )
        .map_err(|e| PortError::Malformed(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ReportRecord {
    id: i64,
    week_number: u32,
    created_at: String,
    text_length: u64,
}
impl ReportRecord {
    fn to_domain(self) -> PortResult<ReportSummary> {
        Ok(ReportSummary {
            id: self.id,
            week_number: self.week_number,
            created_at: parse_timestamp(&self.created_at)?,
            text_length: self.text_length,
        })
    }
}

/// Accepts RFC 3339 and zone-less ISO 8601; the latter is taken as UTC.
fn parse_timestamp(raw: &str) -> PortResult<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(stamp.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| PortError::Malformed(format!("bad timestamp '{raw}': {e}")))
}

//=========================================================================================
// Response helpers
//=========================================================================================

fn transport(e: reqwest::Error) -> PortError {
    PortError::Transport(e.to_string())
}

/// Turns a non-success response into a `PortError`, keeping the backend's
/// `detail` text when there is one.
async fn rejection(response: Response) -> PortError {
    let status = response.status();
    let message = response
        .json::<ErrorRecord>()
        .await
        .ok()
        .and_then(ErrorRecord::into_message);
    debug!(status = %status, message = ?message, "backend rejected request");
    match status {
        StatusCode::NOT_FOUND => PortError::NotFound(message.unwrap_or_default()),
        _ => PortError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> PortResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Malformed(e.to_string()))
}

//=========================================================================================
// `ReportBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReportBackend for HttpBackend {
    async fn login(&self, client_id: &str, password: &str) -> PortResult<LoginGrant> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginPayload {
                client_id,
                password,
            })
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => {
                let record: LoginRecord = decode(response).await?;
                Ok(record.to_domain(client_id))
            }
            StatusCode::UNAUTHORIZED => Err(PortError::Unauthorized),
            _ => Err(rejection(response).await),
        }
    }

    async fn upload_report(
        &self,
        token: &str,
        request: &UploadRequest,
    ) -> PortResult<UploadReceipt> {
        let file_part = multipart::Part::bytes(request.file.bytes.to_vec())
            .file_name(request.file.name.clone())
            .mime_str(&request.file.mime)
            .map_err(|e| PortError::Unexpected(format!("invalid MIME type: {e}")))?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("client_id", request.client_id.clone())
            .text("week_number", request.week_number.to_string());

        let response = self
            .client
            .post(self.url("/upload_report"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        // A success body we cannot read is still a success.
        let receipt = match response.json::<ReceiptRecord>().await {
            Ok(record) => record.to_domain(),
            Err(e) => {
                warn!("upload succeeded but the receipt was unreadable: {}", e);
                UploadReceipt::default()
            }
        };
        Ok(receipt)
    }

    async fn compare_reports(
        &self,
        token: &str,
        query: &ComparisonQuery,
    ) -> PortResult<ComparisonResult> {
        let mut params = vec![("client_id", query.client_id.clone())];
        if let Some(week) = query.week_number {
            params.push(("week_number", week.to_string()));
        }

        let response = self
            .client
            .get(self.url("/compare_reports"))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            return Err(rejection(response).await);
        }
        let record: ComparisonRecord = decode(response).await?;
        record.to_domain()
    }

    async fn list_reports(&self, token: &str, client_id: &str) -> PortResult<Vec<ReportSummary>> {
        let response = self
            .client
            .get(self.url("/reports"))
            .bearer_auth(token)
            .query(&[("client_id", client_id)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let records: Vec<ReportRecord> = decode(response).await?;
        let mut reports = records
            .into_iter()
            .map(ReportRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        reports.sort_by(|a, b| b.week_number.cmp(&a.week_number));
        Ok(reports)
    }
}
