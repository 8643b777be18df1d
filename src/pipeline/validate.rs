use crate::error::FieldErrors;

use super::submission::ReportSubmission;

/// Checks a submission against the canonical field rules. Pure: no side
/// effects, no partial acceptance. Returns every failing field at once so
/// the form can render inline errors in a single pass.
pub fn validate(submission: &ReportSubmission) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    require_min(&mut errors, "projectId", &submission.project_id, 3);
    require_min(&mut errors, "gpsLocation", &submission.gps_location, 5);
    require_min(&mut errors, "date", &submission.date, 1);
    require_min(&mut errors, "weather", &submission.weather, 3);
    require_min(&mut errors, "manpower", &submission.manpower, 10);
    require_min(&mut errors, "equipmentHours", &submission.equipment_hours, 5);
    require_min(&mut errors, "materialsUsed", &submission.materials_used, 5);
    require_min(&mut errors, "progressUpdates", &submission.progress_updates, 10);
    require_min(&mut errors, "risksIssues", &submission.risks_issues, 5);
    require_min(&mut errors, "digitalSignature", &submission.digital_signature, 2);

    if submission.timestamp.trim().is_empty() {
        errors.insert("timestamp".to_string(), "Timestamp is required.".to_string());
    } else if submission.timestamp_millis().is_none() {
        errors.insert(
            "timestamp".to_string(),
            "Timestamp must be an RFC 3339 date-time.".to_string(),
        );
    }

    if let Some(uri) = submission.photo_data_uri.as_deref()
        && !uri.is_empty()
        && !is_image_data_uri(uri)
    {
        errors.insert(
            "photoDataUri".to_string(),
            "Photo must be a base64 data URI with an image MIME type.".to_string(),
        );
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn require_min(errors: &mut FieldErrors, field: &str, value: &str, min: usize) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.insert(field.to_string(), "This field is required.".to_string());
    } else if len < min {
        errors.insert(
            field.to_string(),
            format!("Must be at least {min} characters."),
        );
    }
}

fn is_image_data_uri(uri: &str) -> bool {
    uri.starts_with("data:image/") && uri.contains(";base64,")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::submission::sample_submission;

    #[test]
    fn test_valid_submission_passes() {
        assert!(validate(&sample_submission()).is_ok());
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let cases: Vec<(&str, Box<dyn Fn(&mut ReportSubmission)>)> = vec![
            ("projectId", Box::new(|s| s.project_id.clear())),
            ("gpsLocation", Box::new(|s| s.gps_location.clear())),
            ("date", Box::new(|s| s.date.clear())),
            ("weather", Box::new(|s| s.weather.clear())),
            ("manpower", Box::new(|s| s.manpower.clear())),
            ("equipmentHours", Box::new(|s| s.equipment_hours.clear())),
            ("materialsUsed", Box::new(|s| s.materials_used.clear())),
            ("progressUpdates", Box::new(|s| s.progress_updates.clear())),
            ("risksIssues", Box::new(|s| s.risks_issues.clear())),
            ("digitalSignature", Box::new(|s| s.digital_signature.clear())),
            ("timestamp", Box::new(|s| s.timestamp.clear())),
        ];

        for (field, clear) in cases {
            let mut submission = sample_submission();
            clear(&mut submission);
            let errors = validate(&submission).unwrap_err();
            assert!(errors.contains_key(field), "expected error for {field}");
        }
    }

    #[test]
    fn test_below_minimum_length_rejected() {
        let mut submission = sample_submission();
        submission.manpower = "2 guys".to_string(); // < 10 chars
        let errors = validate(&submission).unwrap_err();
        assert_eq!(
            errors.get("manpower").unwrap(),
            "Must be at least 10 characters."
        );
    }

    #[test]
    fn test_project_id_minimum() {
        let mut submission = sample_submission();
        submission.project_id = "PJ".to_string();
        let errors = validate(&submission).unwrap_err();
        assert!(errors.contains_key("projectId"));
    }

    #[test]
    fn test_whitespace_only_is_missing() {
        let mut submission = sample_submission();
        submission.weather = "   ".to_string();
        let errors = validate(&submission).unwrap_err();
        assert_eq!(errors.get("weather").unwrap(), "This field is required.");
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let mut submission = sample_submission();
        submission.timestamp = "March 15th".to_string();
        let errors = validate(&submission).unwrap_err();
        assert!(errors.contains_key("timestamp"));
    }

    #[test]
    fn test_photo_must_be_image_data_uri() {
        let mut submission = sample_submission();
        submission.photo_data_uri = Some("https://example.com/photo.png".to_string());
        let errors = validate(&submission).unwrap_err();
        assert!(errors.contains_key("photoDataUri"));

        submission.photo_data_uri = Some("data:text/plain;base64,aGVsbG8=".to_string());
        let errors = validate(&submission).unwrap_err();
        assert!(errors.contains_key("photoDataUri"));

        submission.photo_data_uri = Some("data:image/jpeg;base64,/9j/4AAQ".to_string());
        assert!(validate(&submission).is_ok());
    }

    #[test]
    fn test_multiple_failures_reported_together() {
        let mut submission = sample_submission();
        submission.project_id.clear();
        submission.manpower = "few".to_string();
        submission.risks_issues.clear();

        let errors = validate(&submission).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
