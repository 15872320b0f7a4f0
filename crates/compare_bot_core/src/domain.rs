//! crates/compare_bot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the Compare Bot client.
//! These structs are independent of any transport or serialization format.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;

/// The only MIME type the upload workflow accepts.
pub const PDF_MIME: &str = "application/pdf";

/// Validation failures caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("'{0}' is not a positive week number")]
    InvalidWeekNumber(String),
    #[error("expected a PDF file, got '{mime}'")]
    NotPdf { mime: String },
    #[error("client id must not be empty")]
    EmptyClientId,
    #[error("week {week_number} cannot be compared against week {previous_week_number}")]
    WeekOrder {
        week_number: u32,
        previous_week_number: u32,
    },
}

//=========================================================================================
// Session
//=========================================================================================

/// An authenticated client session.
///
/// Exists only between a successful login (or restoration from storage) and
/// the next logout.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub client_id: String,
    pub token: String,
}

impl Session {
    pub fn new(client_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token: token.into(),
        }
    }
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// The body of a successful `/auth/login` response.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub client_id: String,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("client_id", &self.client_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

//=========================================================================================
// Uploads
//=========================================================================================

/// A report week. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekNumber(NonZeroU32);

impl WeekNumber {
    pub fn new(week: u32) -> Option<Self> {
        NonZeroU32::new(week).map(Self)
    }

    /// Parses user input such as `" 16 "`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        input
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ValidationError::InvalidWeekNumber(input.trim().to_string()))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for WeekNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file picked by the user, as a browser file input would describe it.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl ReportFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Derives the MIME type from the file extension, the way a file picker does.
    pub fn mime_for_path(path: &Path) -> &'static str {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME,
            _ => "application/octet-stream",
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }
}

impl fmt::Debug for ReportFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One upload attempt. Built per submission and never persisted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: ReportFile,
    pub client_id: String,
    pub week_number: WeekNumber,
}

impl UploadRequest {
    pub fn new(
        file: ReportFile,
        client_id: impl Into<String>,
        week_number: WeekNumber,
    ) -> Result<Self, ValidationError> {
        if !file.is_pdf() {
            return Err(ValidationError::NotPdf { mime: file.mime });
        }
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ValidationError::EmptyClientId);
        }
        Ok(Self {
            file,
            client_id,
            week_number,
        })
    }
}

/// Outcome of the latest upload attempt, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Success,
    Error(String),
}

/// What the backend reports back after storing a report. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub message: Option<String>,
    pub report_id: Option<i64>,
    pub week_number: Option<u32>,
    pub text_length: Option<u64>,
}

//=========================================================================================
// Comparisons
//=========================================================================================

/// Which comparison to ask for. Without a week the backend picks the most
/// recent comparable pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonQuery {
    pub client_id: String,
    pub week_number: Option<WeekNumber>,
}

/// An AI-generated comparison of one week's report against an earlier one.
///
/// Immutable once received; `week_number > previous_week_number` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    summary: String,
    highlights: Vec<String>,
    week_number: u32,
    previous_week_number: u32,
    created_at: DateTime<Utc>,
}

impl ComparisonResult {
    pub fn new(
        summary: String,
        highlights: Vec<String>,
        week_number: u32,
        previous_week_number: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if week_number <= previous_week_number {
            return Err(ValidationError::WeekOrder {
                week_number,
                previous_week_number,
            });
        }
        Ok(Self {
            summary,
            highlights,
            week_number,
            previous_week_number,
            created_at,
        })
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn highlights(&self) -> &[String] {
        &self.highlights
    }

    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    pub fn previous_week_number(&self) -> u32 {
        self.previous_week_number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The comparison panel's state. `Empty` until the first fetch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetrievalState {
    #[default]
    Empty,
    Loading,
    Loaded(ComparisonResult),
    NotFound,
    Failed(String),
}

impl RetrievalState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            Self::Loaded(result) => Some(result),
            _ => None,
        }
    }
}

/// Direction a highlight points in, judged from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    const UP_WORDS: [&'static str; 3] = ["increase", "up", "higher"];
    const DOWN_WORDS: [&'static str; 3] = ["decrease", "down", "lower"];

    /// Plain substring match, upward words first: "Revenue up 12%" is `Up`.
    pub fn classify(highlight: &str) -> Self {
        let text = highlight.to_lowercase();
        if Self::UP_WORDS.iter().any(|w| text.contains(w)) {
            Trend::Up
        } else if Self::DOWN_WORDS.iter().any(|w| text.contains(w)) {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

/// A stored report, as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub id: i64,
    pub week_number: u32,
    pub created_at: DateTime<Utc>,
    pub text_length: u64,
}
