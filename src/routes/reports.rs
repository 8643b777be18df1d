use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::db::reports::{DailyReportRecord, ReportStatus};
use crate::error::{AppError, AppResult};
use crate::pipeline::submission::ReportSubmission;

#[derive(Debug, Deserialize)]
pub struct SubmitReportBody {
    #[serde(flatten)]
    pub submission: ReportSubmission,
    /// The caller's asserted connectivity state; an offline submission is
    /// saved to the local fallback store instead of being generated.
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportResponse {
    pub success: bool,
    pub message: String,
    pub stored_offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    pub submitted_data: ReportSubmission,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub foreman: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub status: ReportStatus,
    pub pm_comments: Option<String>,
}

pub async fn submit_report(
    State(state): State<AppState>,
    Json(body): Json<SubmitReportBody>,
) -> AppResult<Json<SubmitReportResponse>> {
    let outcome = state.pipeline.submit(body.submission, body.offline).await?;

    let message = if outcome.stored_offline {
        "No connection; report saved locally for later submission.".to_string()
    } else {
        "Report submitted and processed successfully!".to_string()
    };

    Ok(Json(SubmitReportResponse {
        success: true,
        message,
        stored_offline: outcome.stored_offline,
        report_id: outcome.report_id,
        generated_report: outcome.generated_report,
        report_summary: outcome.report_summary,
        progress: outcome.progress,
        submitted_data: outcome.submitted_data,
    }))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<DailyReportRecord>>> {
    let limit = params.limit.unwrap_or(20);
    let offset = params.offset.unwrap_or(0);

    let reports = state
        .repository
        .list(params.foreman.as_deref(), limit, offset)
        .await?;

    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DailyReportRecord>> {
    let report = state
        .repository
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id}")))?;

    Ok(Json(report))
}

/// Admin action: move a report through the review workflow, optionally
/// updating the PM comment. The update is compare-and-swap on the status
/// the admin saw, so racing transitions surface as conflicts.
pub async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> AppResult<Json<DailyReportRecord>> {
    let record = state
        .repository
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id}")))?;

    let current = ReportStatus::parse(&record.status)
        .ok_or_else(|| AppError::Internal(format!("stored status {:?} unknown", record.status)))?;

    if !current.can_transition_to(body.status) {
        return Err(AppError::InvalidTransition(format!(
            "Report {id} cannot move from {} to {}",
            current.as_str(),
            body.status.as_str()
        )));
    }

    let updated = state
        .repository
        .update_status(&id, current, body.status, body.pm_comments.as_deref())
        .await?;

    tracing::info!(
        report.id = %id,
        from = current.as_str(),
        to = body.status.as_str(),
        "Report status updated"
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_body_flattens_submission() {
        let body: SubmitReportBody = serde_json::from_str(
            r#"{
                "projectId": "PJ-1023",
                "gpsLocation": "Site A",
                "date": "2023-03-15",
                "weather": "Sunny",
                "manpower": "1 Foreman, 5 Laborers",
                "equipmentHours": "Excavator: 8hrs",
                "materialsUsed": "Pipes: 10 units",
                "progressUpdates": "Laid 50m of pipe.",
                "risksIssues": "None reported.",
                "digitalSignature": "John Doe",
                "timestamp": "2023-03-15T17:00:00.000Z"
            }"#,
        )
        .unwrap();

        assert_eq!(body.submission.project_id, "PJ-1023");
        assert!(!body.offline);
    }

    #[test]
    fn test_submit_body_offline_flag() {
        let body: SubmitReportBody = serde_json::from_str(
            r#"{
                "projectId": "PJ-1023",
                "gpsLocation": "Site A",
                "date": "2023-03-15",
                "weather": "Sunny",
                "manpower": "1 Foreman, 5 Laborers",
                "equipmentHours": "Excavator: 8hrs",
                "materialsUsed": "Pipes: 10 units",
                "progressUpdates": "Laid 50m of pipe.",
                "risksIssues": "None reported.",
                "digitalSignature": "John Doe",
                "timestamp": "2023-03-15T17:00:00.000Z",
                "offline": true
            }"#,
        )
        .unwrap();

        assert!(body.offline);
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.foreman, None);
        assert_eq!(query.limit, None);
        assert_eq!(query.offset, None);
    }

    #[test]
    fn test_transition_body_deserialize() {
        let body: TransitionBody =
            serde_json::from_str(r#"{"status": "Approved", "pmComments": "Good work."}"#).unwrap();
        assert_eq!(body.status, ReportStatus::Approved);
        assert_eq!(body.pm_comments.as_deref(), Some("Good work."));
    }

    #[test]
    fn test_transition_body_unknown_status_rejected() {
        let result = serde_json::from_str::<TransitionBody>(r#"{"status": "Archived"}"#);
        assert!(result.is_err());
    }
}
