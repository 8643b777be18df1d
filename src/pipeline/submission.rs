use serde::{Deserialize, Serialize};

/// 1x1 transparent PNG, substituted when a submission carries no photo so
/// the generation service always receives a valid image reference.
pub const PLACEHOLDER_PHOTO_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// A foreman's daily report payload as submitted from the field. Every
/// descriptive field is free text; no structured parsing is applied.
/// Serialized camelCase to match the form wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub project_id: String,
    pub gps_location: String,
    pub date: String,
    pub weather: String,
    pub manpower: String,
    pub equipment_hours: String,
    pub materials_used: String,
    pub progress_updates: String,
    pub risks_issues: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_data_uri: Option<String>,
    pub digital_signature: String,
    pub timestamp: String,
}

impl ReportSubmission {
    pub fn photo_or_placeholder(&self) -> &str {
        match self.photo_data_uri.as_deref() {
            Some(uri) if !uri.is_empty() => uri,
            _ => PLACEHOLDER_PHOTO_DATA_URI,
        }
    }

    /// Submission instant in epoch milliseconds; `None` when the timestamp
    /// string is not RFC 3339 (validation rejects those before use).
    pub fn timestamp_millis(&self) -> Option<i64> {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

#[cfg(test)]
pub fn sample_submission() -> ReportSubmission {
    ReportSubmission {
        project_id: "PJ-1023".to_string(),
        gps_location: "Site A".to_string(),
        date: "2023-03-15".to_string(),
        weather: "Sunny".to_string(),
        manpower: "1 Foreman, 5 Laborers".to_string(),
        equipment_hours: "Excavator: 8hrs".to_string(),
        materials_used: "Pipes: 10 units".to_string(),
        progress_updates: "Laid 50m of pipe.".to_string(),
        risks_issues: "None reported.".to_string(),
        photo_data_uri: None,
        digital_signature: "John Doe".to_string(),
        timestamp: "2023-03-15T17:00:00.000Z".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_placeholder_when_missing() {
        let submission = sample_submission();
        assert_eq!(submission.photo_or_placeholder(), PLACEHOLDER_PHOTO_DATA_URI);
    }

    #[test]
    fn test_photo_placeholder_when_empty() {
        let mut submission = sample_submission();
        submission.photo_data_uri = Some(String::new());
        assert_eq!(submission.photo_or_placeholder(), PLACEHOLDER_PHOTO_DATA_URI);
    }

    #[test]
    fn test_photo_kept_when_present() {
        let mut submission = sample_submission();
        submission.photo_data_uri = Some("data:image/jpeg;base64,abcd".to_string());
        assert_eq!(submission.photo_or_placeholder(), "data:image/jpeg;base64,abcd");
    }

    #[test]
    fn test_timestamp_millis() {
        let submission = sample_submission();
        assert_eq!(submission.timestamp_millis(), Some(1678899600000));
    }

    #[test]
    fn test_timestamp_millis_unparseable() {
        let mut submission = sample_submission();
        submission.timestamp = "yesterday evening".to_string();
        assert_eq!(submission.timestamp_millis(), None);
    }

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{
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
        }"#;

        let parsed: ReportSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, sample_submission());

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["projectId"], "PJ-1023");
        assert!(back.get("photoDataUri").is_none());
    }
}
