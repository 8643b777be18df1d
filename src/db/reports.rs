use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Workflow status of a daily report. `Approved` and `Rejected` are terminal;
/// skipping `Reviewed` on the way there is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Submitted,
    Reviewed,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Submitted => "Submitted",
            ReportStatus::Reviewed => "Reviewed",
            ReportStatus::Approved => "Approved",
            ReportStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Submitted" => Some(ReportStatus::Submitted),
            "Reviewed" => Some(ReportStatus::Reviewed),
            "Approved" => Some(ReportStatus::Approved),
            "Rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Approved | ReportStatus::Rejected)
    }

    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        match self {
            ReportStatus::Submitted => matches!(
                next,
                ReportStatus::Reviewed | ReportStatus::Approved | ReportStatus::Rejected
            ),
            ReportStatus::Reviewed => {
                matches!(next, ReportStatus::Approved | ReportStatus::Rejected)
            }
            ReportStatus::Approved | ReportStatus::Rejected => false,
        }
    }
}

/// A persisted daily report: the submission fields plus the server-assigned
/// id, workflow status, generated artifacts, and PM comments. Serialized
/// camelCase to match the wire format the dashboard consumes.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportRecord {
    pub id: String,
    pub project_id: String,
    pub gps_location: String,
    pub date: String,
    pub weather: String,
    pub manpower: String,
    pub equipment_hours: String,
    pub materials_used: String,
    pub progress_updates: String,
    pub risks_issues: String,
    pub photo_data_uri: Option<String>,
    pub digital_signature: String,
    pub timestamp: String,
    pub foreman_name: String,
    pub status: String,
    pub generated_report: Option<String>,
    pub report_summary: Option<String>,
    pub progress: Option<String>,
    pub pm_comments: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn insert(&self, record: &DailyReportRecord) -> AppResult<()>;
    async fn get(&self, id: &str) -> AppResult<Option<DailyReportRecord>>;
    async fn list(
        &self,
        foreman: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<DailyReportRecord>>;
    /// Compare-and-swap status update: only applies when the stored status
    /// still equals `expected`, so two admins racing a transition cannot
    /// both win.
    async fn update_status(
        &self,
        id: &str,
        expected: ReportStatus,
        next: ReportStatus,
        pm_comments: Option<&str>,
    ) -> AppResult<DailyReportRecord>;
}

const RECORD_COLUMNS: &str = "id, project_id, gps_location, date, weather, manpower, \
     equipment_hours, materials_used, progress_updates, risks_issues, \
     photo_data_uri, digital_signature, timestamp, foreman_name, status, \
     generated_report, report_summary, progress, pm_comments, created_at";

#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    #[tracing::instrument(name = "db.reports.insert", skip_all, fields(report.id = %record.id))]
    async fn insert(&self, record: &DailyReportRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO daily_reports \
             (id, project_id, gps_location, date, weather, manpower, \
              equipment_hours, materials_used, progress_updates, risks_issues, \
              photo_data_uri, digital_signature, timestamp, foreman_name, status, \
              generated_report, report_summary, progress, pm_comments) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, $18, $19)",
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(&record.gps_location)
        .bind(&record.date)
        .bind(&record.weather)
        .bind(&record.manpower)
        .bind(&record.equipment_hours)
        .bind(&record.materials_used)
        .bind(&record.progress_updates)
        .bind(&record.risks_issues)
        .bind(&record.photo_data_uri)
        .bind(&record.digital_signature)
        .bind(&record.timestamp)
        .bind(&record.foreman_name)
        .bind(&record.status)
        .bind(&record.generated_report)
        .bind(&record.report_summary)
        .bind(&record.progress)
        .bind(&record.pm_comments)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "db.reports.get", skip(self))]
    async fn get(&self, id: &str) -> AppResult<Option<DailyReportRecord>> {
        let record = sqlx::query_as::<_, DailyReportRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(name = "db.reports.list", skip(self))]
    async fn list(
        &self,
        foreman: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<DailyReportRecord>> {
        let records = match foreman {
            Some(name) => {
                sqlx::query_as::<_, DailyReportRecord>(&format!(
                    "SELECT {RECORD_COLUMNS} FROM daily_reports \
                     WHERE foreman_name = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                ))
                .bind(name)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DailyReportRecord>(&format!(
                    "SELECT {RECORD_COLUMNS} FROM daily_reports \
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(records)
    }

    #[tracing::instrument(name = "db.reports.update_status", skip(self))]
    async fn update_status(
        &self,
        id: &str,
        expected: ReportStatus,
        next: ReportStatus,
        pm_comments: Option<&str>,
    ) -> AppResult<DailyReportRecord> {
        let updated = sqlx::query_as::<_, DailyReportRecord>(&format!(
            "UPDATE daily_reports \
             SET status = $3, pm_comments = COALESCE($4, pm_comments) \
             WHERE id = $1 AND status = $2 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(pm_comments)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| {
            AppError::Conflict(format!(
                "Report {id} was modified concurrently, expected status {}",
                expected.as_str()
            ))
        })
    }
}
