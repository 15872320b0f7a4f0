//! services/client/src/view/render.rs
//!
//! Plain-text rendering of every view state.

use compare_bot_core::domain::{ComparisonResult, ReportSummary, RetrievalState, Trend, UploadStatus};

use crate::view::Tab;
use crate::workflow::{UploadForm, NO_COMPARISON_MESSAGE};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials. Please try again.";
pub const DEMO_LOGIN_FAILED_MESSAGE: &str = "Demo login failed. Please try again.";
pub const UPLOAD_SUCCESS_BANNER: &str = "Report uploaded successfully! Processing comparison...";

pub fn trend_icon(trend: Trend) -> char {
    match trend {
        Trend::Up => '▲',
        Trend::Down => '▼',
        Trend::Flat => '–',
    }
}

pub fn initializing() -> String {
    "Loading...".to_string()
}

pub fn login(error: Option<&str>, busy: bool) -> String {
    let mut lines = vec![
        "Sign in to Compare Bot".to_string(),
        "Enter your client credentials to access your reports".to_string(),
    ];
    if let Some(error) = error {
        lines.push(format!("! {error}"));
    }
    if busy {
        lines.push("Signing in...".to_string());
    }
    lines.join("\n")
}

pub fn header(client_id: &str, active: Tab) -> String {
    let tab = |tab: Tab, label: &str| {
        if tab == active {
            format!("[{label}]")
        } else {
            format!(" {label} ")
        }
    };
    format!(
        "Welcome, {client_id}\n{}  {}",
        tab(Tab::Upload, "Upload Report"),
        tab(Tab::Results, "View Results")
    )
}

pub fn upload_form(form: &UploadForm) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Week Number: {}",
        if form.week_input.is_empty() {
            "(e.g., 15)"
        } else {
            form.week_input.as_str()
        }
    ));
    match &form.selected_file {
        Some(file) => lines.push(format!("File: {} (ready to upload)", file.name)),
        None => lines.push("File: none selected (only PDF files are accepted)".to_string()),
    }
    match &form.status {
        UploadStatus::Idle => {}
        UploadStatus::Success => lines.push(UPLOAD_SUCCESS_BANNER.to_string()),
        UploadStatus::Error(message) => lines.push(format!("! {message}")),
    }
    if form.is_uploading() {
        lines.push("Uploading...".to_string());
    }
    lines.join("\n")
}

pub fn retrieval(state: &RetrievalState) -> String {
    match state {
        RetrievalState::Empty => "No comparison data\n\
             Upload reports for consecutive weeks to see AI-powered comparisons."
            .to_string(),
        RetrievalState::Loading => "Analyzing reports...".to_string(),
        RetrievalState::NotFound => NO_COMPARISON_MESSAGE.to_string(),
        RetrievalState::Failed(message) => format!("! {message}"),
        RetrievalState::Loaded(result) => comparison(result),
    }
}

pub fn comparison(result: &ComparisonResult) -> String {
    let mut lines = vec![
        format!(
            "Week {} vs Week {}",
            result.week_number(),
            result.previous_week_number()
        ),
        format!("Generated on {}", result.created_at().format("%Y-%m-%d")),
        String::new(),
        "Summary".to_string(),
        result.summary().to_string(),
        String::new(),
        "Key Highlights".to_string(),
    ];
    lines.extend(
        result
            .highlights()
            .iter()
            .map(|h| format!("  {} {}", trend_icon(Trend::classify(h)), h)),
    );
    lines.join("\n")
}

pub fn reports(reports: &[ReportSummary]) -> String {
    if reports.is_empty() {
        return "No reports uploaded yet.".to_string();
    }
    reports
        .iter()
        .map(|r| {
            format!(
                "Week {:>3}  #{:<5} {}  {} chars",
                r.week_number,
                r.id,
                r.created_at.format("%Y-%m-%d"),
                r.text_length
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn result() -> ComparisonResult {
        ComparisonResult::new(
            "Solid week.".into(),
            vec![
                "Revenue up 12%".into(),
                "Returns decreased".into(),
                "Headcount unchanged".into(),
            ],
            16,
            15,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn comparison_shows_trend_icons() {
        let text = retrieval(&RetrievalState::Loaded(result()));
        assert!(text.contains("Week 16 vs Week 15"));
        assert!(text.contains("Generated on 2024-03-01"));
        assert!(text.contains("▲ Revenue up 12%"));
        assert!(text.contains("▼ Returns decreased"));
        assert!(text.contains("– Headcount unchanged"));
    }

    #[test]
    fn not_found_is_guidance_not_an_error() {
        let text = retrieval(&RetrievalState::NotFound);
        assert_eq!(text, NO_COMPARISON_MESSAGE);
        assert!(!text.starts_with('!'));
        assert!(retrieval(&RetrievalState::Failed("boom".into())).starts_with("! boom"));
    }

    #[test]
    fn header_marks_active_tab() {
        assert_eq!(
            header("client_001", Tab::Results),
            "Welcome, client_001\n Upload Report   [View Results]"
        );
    }

    #[test]
    fn upload_form_shows_status() {
        let mut form = UploadForm::default();
        assert!(upload_form(&form).contains("none selected"));
        form.status = UploadStatus::Success;
        assert!(upload_form(&form).contains(UPLOAD_SUCCESS_BANNER));
        form.status = UploadStatus::Error("Please select a valid PDF file".into());
        form.in_flight = 1;
        let text = upload_form(&form);
        assert!(text.contains("! Please select a valid PDF file"));
        assert!(text.contains("Uploading..."));
    }
}
