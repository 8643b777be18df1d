use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::time::timeout;

use crate::db::reports::{DailyReportRecord, ReportRepository, ReportStatus};
use crate::error::{AppError, AppResult};
use crate::offline::{OfflineStore, offline_key};
use crate::telemetry::metrics::{OFFLINE_SAVES, SUBMISSION_DURATION, SUBMISSIONS_ACCEPTED};

use super::generator::ReportGenerator;
use super::submission::ReportSubmission;
use super::validate;

/// Result of a submit operation, in the shape the dashboard consumes. An
/// offline save carries no id and no generated artifacts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub report_id: Option<String>,
    pub stored_offline: bool,
    pub generated_report: Option<String>,
    pub report_summary: Option<String>,
    pub progress: Option<String>,
    pub submitted_data: ReportSubmission,
}

pub struct SubmissionPipeline {
    generator: Arc<dyn ReportGenerator>,
    repository: Arc<dyn ReportRepository>,
    offline_store: Arc<dyn OfflineStore>,
    generation_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        generator: Arc<dyn ReportGenerator>,
        repository: Arc<dyn ReportRepository>,
        offline_store: Arc<dyn OfflineStore>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            repository,
            offline_store,
            generation_timeout,
        }
    }

    /// Validate, then either save locally (offline) or run both generation
    /// calls, mint an id, and persist the record. Either generation call
    /// failing fails the whole submission; there is no partial-success
    /// state where one artifact exists without the other.
    #[tracing::instrument(
        name = "pipeline submit",
        skip(self, submission),
        fields(
            report.id = tracing::field::Empty,
            report.project_id = %submission.project_id,
            report.offline = offline,
        )
    )]
    pub async fn submit(
        &self,
        submission: ReportSubmission,
        offline: bool,
    ) -> AppResult<SubmitOutcome> {
        let start = Instant::now();

        validate::validate(&submission).map_err(AppError::Validation)?;

        if offline {
            return self.save_offline(submission);
        }

        let photo = submission.photo_or_placeholder().to_string();

        let (full, summary) = tokio::join!(
            timeout(
                self.generation_timeout,
                self.generator.generate_full_report(&submission, &photo),
            ),
            timeout(
                self.generation_timeout,
                self.generator.generate_summary(&submission, &photo),
            ),
        );

        let full = full.map_err(|_| AppError::Timeout)??;
        let summary = summary.map_err(|_| AppError::Timeout)??;

        let report_id = mint_report_id();

        let record = DailyReportRecord {
            id: report_id.clone(),
            project_id: submission.project_id.clone(),
            gps_location: submission.gps_location.clone(),
            date: submission.date.clone(),
            weather: submission.weather.clone(),
            manpower: submission.manpower.clone(),
            equipment_hours: submission.equipment_hours.clone(),
            materials_used: submission.materials_used.clone(),
            progress_updates: submission.progress_updates.clone(),
            risks_issues: submission.risks_issues.clone(),
            photo_data_uri: submission.photo_data_uri.clone(),
            digital_signature: submission.digital_signature.clone(),
            timestamp: submission.timestamp.clone(),
            foreman_name: submission.digital_signature.clone(),
            status: ReportStatus::Submitted.as_str().to_string(),
            generated_report: Some(full.report.clone()),
            report_summary: Some(summary.summary.clone()),
            progress: Some(summary.progress.clone()),
            pm_comments: None,
            created_at: None,
        };
        self.repository.insert(&record).await?;

        let duration = start.elapsed();
        SUBMISSION_DURATION.record(duration.as_secs_f64(), &[]);
        SUBMISSIONS_ACCEPTED.add(1, &[]);

        let span = tracing::Span::current();
        span.record("report.id", report_id.as_str());

        tracing::info!(
            report.id = %report_id,
            duration_ms = duration.as_millis() as u64,
            "Report submitted and processed"
        );

        Ok(SubmitOutcome {
            report_id: Some(report_id),
            stored_offline: false,
            generated_report: Some(full.report),
            report_summary: Some(summary.summary),
            progress: Some(summary.progress),
            submitted_data: submission,
        })
    }

    fn save_offline(&self, submission: ReportSubmission) -> AppResult<SubmitOutcome> {
        let millis = submission.timestamp_millis().ok_or_else(|| {
            AppError::Internal("validated timestamp failed to parse".to_string())
        })?;

        let key = offline_key(millis);
        self.offline_store.save(&key, &submission)?;
        OFFLINE_SAVES.add(1, &[]);

        Ok(SubmitOutcome {
            report_id: None,
            stored_offline: true,
            generated_report: None,
            report_summary: None,
            progress: None,
            submitted_data: submission,
        })
    }
}

/// `REP-` plus current milliseconds plus a 4-digit sequence counter, so two
/// submissions landing in the same millisecond still get distinct ids. The
/// counter starts at a random offset to keep ids unguessable across
/// restarts.
pub fn mint_report_id() -> String {
    use std::sync::LazyLock;
    use std::sync::atomic::{AtomicU32, Ordering};

    static SEQUENCE: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(fastrand::u32(..10_000)));

    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("REP-{}{seq:04}", Utc::now().timestamp_millis())
}
