use std::sync::Arc;

use serde::Deserialize;

use crate::error::AppError;
use crate::llm::{GenerateRequest, LlmClient};

use super::submission::ReportSubmission;

/// Full formatted narrative report. The service is asked for a progress
/// sentence as well, but only the report body is required output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullReport {
    pub report: String,
    pub progress: Option<String>,
}

/// One-paragraph summary plus a single-sentence progress statement for the
/// PM dashboard. Both fields are required output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub summary: String,
    pub progress: String,
}

/// Boundary to the external generation service. The two operations are
/// independent: different instruction templates, different output schemas,
/// no shared state, no ordering requirement.
#[async_trait::async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate_full_report(
        &self,
        input: &ReportSubmission,
        photo_data_uri: &str,
    ) -> Result<FullReport, AppError>;

    async fn generate_summary(
        &self,
        input: &ReportSubmission,
        photo_data_uri: &str,
    ) -> Result<ReportSummary, AppError>;
}

pub struct LlmReportGenerator {
    client: Arc<LlmClient>,
    model_report: String,
    model_summary: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmReportGenerator {
    pub fn new(
        client: Arc<LlmClient>,
        model_report: String,
        model_summary: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            model_report,
            model_summary,
            temperature,
            max_tokens,
        }
    }
}

const FULL_REPORT_SYSTEM: &str = "You are an AI assistant specialized in generating \
    QA-compliant daily reports for underground pipeline projects. Incorporate the \
    location, time, and weather conditions to provide maximum detail with minimum \
    data entry. The final report must be well-formatted and easy to read.";

const SUMMARY_SYSTEM: &str = "You are an AI assistant summarizing daily reports for \
    underground pipeline projects, highlighting the key observations and issues a \
    project manager needs.";

fn full_report_prompt(input: &ReportSubmission, photo_data_uri: &str) -> String {
    format!(
        "Generate a detailed and well-structured daily report from this submission:\n\n\
        Project ID: {}\n\
        Date: {}\n\
        Location: {}\n\
        Weather Conditions: {}\n\
        Manpower Details: {}\n\
        Equipment Hours: {}\n\
        Materials Used: {}\n\
        Progress Updates: {}\n\
        Risks/Issues: {}\n\
        Photo: {}\n\
        Foreman Signature: {}\n\n\
        Return your answer as JSON with this exact structure:\n\
        {{\n  \"report\": \"the full formatted report\",\n  \
        \"progress\": \"one sentence summarizing the day's project progress\"\n}}",
        input.project_id,
        input.date,
        input.gps_location,
        input.weather,
        input.manpower,
        input.equipment_hours,
        input.materials_used,
        input.progress_updates,
        input.risks_issues,
        photo_data_uri,
        input.digital_signature,
    )
}

fn summary_prompt(input: &ReportSubmission, photo_data_uri: &str) -> String {
    format!(
        "Summarize the key observations and issues from this daily report:\n\n\
        GPS Location: {}\n\
        Project ID: {}\n\
        Weather Conditions: {}\n\
        Manpower Details: {}\n\
        Equipment Hours: {}\n\
        Materials Used: {}\n\
        Progress Updates: {}\n\
        Risks and Issues: {}\n\
        Photo: {}\n\
        Digital Signature: {}\n\
        Timestamp: {}\n\n\
        Return your answer as JSON with this exact structure:\n\
        {{\n  \"summary\": \"concise summary of key observations and issues\",\n  \
        \"progress\": \"one sentence summarizing the day's project progress\"\n}}",
        input.gps_location,
        input.project_id,
        input.weather,
        input.manpower,
        input.equipment_hours,
        input.materials_used,
        input.progress_updates,
        input.risks_issues,
        photo_data_uri,
        input.digital_signature,
        input.timestamp,
    )
}

#[async_trait::async_trait]
impl ReportGenerator for LlmReportGenerator {
    #[tracing::instrument(
        name = "gateway full_report",
        skip(self, input, photo_data_uri),
        fields(report.operation = "full_report", report.project_id = %input.project_id)
    )]
    async fn generate_full_report(
        &self,
        input: &ReportSubmission,
        photo_data_uri: &str,
    ) -> Result<FullReport, AppError> {
        let resp = self
            .client
            .generate(&GenerateRequest {
                model: self.model_report.clone(),
                system: FULL_REPORT_SYSTEM.to_string(),
                prompt: full_report_prompt(input, photo_data_uri),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                operation: "full_report".to_string(),
            })
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?;

        parse_full_report(&resp.content)
    }

    #[tracing::instrument(
        name = "gateway summary",
        skip(self, input, photo_data_uri),
        fields(report.operation = "summary", report.project_id = %input.project_id)
    )]
    async fn generate_summary(
        &self,
        input: &ReportSubmission,
        photo_data_uri: &str,
    ) -> Result<ReportSummary, AppError> {
        let resp = self
            .client
            .generate(&GenerateRequest {
                model: self.model_summary.clone(),
                system: SUMMARY_SYSTEM.to_string(),
                prompt: summary_prompt(input, photo_data_uri),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                operation: "summary".to_string(),
            })
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?;

        parse_summary(&resp.content)
    }
}

// Output that does not match the declared schema is a hard failure; nothing
// is coerced from free-form completions.
fn parse_full_report(content: &str) -> Result<FullReport, AppError> {
    #[derive(Deserialize)]
    struct RawFullReport {
        report: String,
        progress: Option<String>,
    }

    let json_str = extract_json(content);
    let raw: RawFullReport = serde_json::from_str(&json_str)
        .map_err(|e| AppError::Generation(format!("malformed full-report output: {e}")))?;

    if raw.report.trim().is_empty() {
        return Err(AppError::Generation(
            "full-report output has an empty report field".to_string(),
        ));
    }

    Ok(FullReport {
        report: raw.report,
        progress: raw.progress,
    })
}

fn parse_summary(content: &str) -> Result<ReportSummary, AppError> {
    #[derive(Deserialize)]
    struct RawSummary {
        summary: String,
        progress: String,
    }

    let json_str = extract_json(content);
    let raw: RawSummary = serde_json::from_str(&json_str)
        .map_err(|e| AppError::Generation(format!("malformed summary output: {e}")))?;

    if raw.summary.trim().is_empty() || raw.progress.trim().is_empty() {
        return Err(AppError::Generation(
            "summary output has empty required fields".to_string(),
        ));
    }

    Ok(ReportSummary {
        summary: raw.summary,
        progress: raw.progress,
    })
}

fn extract_json(content: &str) -> String {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim().to_string();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }
    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::submission::{PLACEHOLDER_PHOTO_DATA_URI, sample_submission};

    #[test]
    fn test_full_report_prompt_embeds_all_fields() {
        let submission = sample_submission();
        let prompt = full_report_prompt(&submission, PLACEHOLDER_PHOTO_DATA_URI);

        assert!(prompt.contains("PJ-1023"));
        assert!(prompt.contains("Site A"));
        assert!(prompt.contains("Excavator: 8hrs"));
        assert!(prompt.contains("Laid 50m of pipe."));
        assert!(prompt.contains("John Doe"));
        assert!(prompt.contains(PLACEHOLDER_PHOTO_DATA_URI));
    }

    #[test]
    fn test_summary_prompt_embeds_timestamp_and_photo() {
        let submission = sample_submission();
        let prompt = summary_prompt(&submission, "data:image/jpeg;base64,abcd");

        assert!(prompt.contains("2023-03-15T17:00:00.000Z"));
        assert!(prompt.contains("data:image/jpeg;base64,abcd"));
    }

    #[test]
    fn test_parse_full_report_valid() {
        let content = r#"{"report": "Daily report body.", "progress": "Laid 50m of pipe."}"#;
        let parsed = parse_full_report(content).unwrap();
        assert_eq!(parsed.report, "Daily report body.");
        assert_eq!(parsed.progress.as_deref(), Some("Laid 50m of pipe."));
    }

    #[test]
    fn test_parse_full_report_progress_optional() {
        let content = r#"{"report": "Daily report body."}"#;
        let parsed = parse_full_report(content).unwrap();
        assert!(parsed.progress.is_none());
    }

    #[test]
    fn test_parse_full_report_markdown_wrapped() {
        let content = "```json\n{\"report\": \"Wrapped body.\", \"progress\": \"Done.\"}\n```";
        let parsed = parse_full_report(content).unwrap();
        assert_eq!(parsed.report, "Wrapped body.");
    }

    #[test]
    fn test_parse_full_report_malformed_fails() {
        let content = "Here is your report: everything went fine today.";
        let err = parse_full_report(content).unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }

    #[test]
    fn test_parse_full_report_empty_body_fails() {
        let content = r#"{"report": "  "}"#;
        assert!(parse_full_report(content).is_err());
    }

    #[test]
    fn test_parse_summary_valid() {
        let content =
            r#"{"summary": "50m of pipe laid, no issues.", "progress": "On schedule."}"#;
        let parsed = parse_summary(content).unwrap();
        assert_eq!(parsed.summary, "50m of pipe laid, no issues.");
        assert_eq!(parsed.progress, "On schedule.");
    }

    #[test]
    fn test_parse_summary_missing_progress_fails() {
        let content = r#"{"summary": "50m of pipe laid."}"#;
        assert!(parse_summary(content).is_err());
    }

    #[test]
    fn test_extract_json_plain_fence() {
        let content = "```\n{\"summary\": \"s\", \"progress\": \"p\"}\n```";
        assert!(extract_json(content).starts_with('{'));
    }

    #[test]
    fn test_extract_json_no_fence() {
        let content = "  {\"report\": \"r\"}  ";
        assert_eq!(extract_json(content), "{\"report\": \"r\"}");
    }
}
