//! CSV export of outcome records.

use super::{OutcomeError, OutcomeRecord};

/// Header row of an export, in [`OutcomeRecord`] field order.
pub const OUTCOME_CSV_COLUMNS: [&str; 12] = [
    "id",
    "run_id",
    "lead_id",
    "external_call_id",
    "status",
    "failure_reason",
    "duration_secs",
    "summary",
    "interest_level",
    "meeting_scheduled",
    "next_steps",
    "recorded_at",
];

fn export_error(e: impl std::fmt::Display) -> OutcomeError {
    OutcomeError::Export(e.to_string())
}

/// Render records as CSV. The header is written even when `records` is empty.
pub fn outcomes_to_csv(records: &[OutcomeRecord]) -> Result<Vec<u8>, OutcomeError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(OUTCOME_CSV_COLUMNS)
        .map_err(export_error)?;
    for record in records {
        writer.serialize(record).map_err(export_error)?;
    }

    writer.into_inner().map_err(export_error)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::outcome::{InterestLevel, OutcomeStatus};

    fn record(id: &str, status: OutcomeStatus) -> OutcomeRecord {
        OutcomeRecord {
            id: id.to_string(),
            run_id: "run-1".to_string(),
            lead_id: "lead-1".to_string(),
            external_call_id: Some("CA000001".to_string()),
            status,
            failure_reason: None,
            duration_secs: 42.5,
            summary: "Interested, asked for a demo, call back Tuesday".to_string(),
            interest_level: InterestLevel::High,
            meeting_scheduled: true,
            next_steps: "schedule_demo".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_export_has_header() {
        let csv = String::from_utf8(outcomes_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), OUTCOME_CSV_COLUMNS.join(","));
    }

    #[test]
    fn test_export_rows() {
        let mut failed = record("out-2", OutcomeStatus::Failed);
        failed.external_call_id = None;
        failed.failure_reason = Some("no_answer".to_string());
        failed.meeting_scheduled = false;

        let bytes = outcomes_to_csv(&[record("out-1", OutcomeStatus::Completed), failed]).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, OUTCOME_CSV_COLUMNS);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][4], "completed");
        assert_eq!(&rows[0][7], "Interested, asked for a demo, call back Tuesday");
        assert_eq!(&rows[0][8], "high");
        assert_eq!(&rows[0][9], "true");
        assert!(rows[0][11].starts_with("2024-03-01T10:30:00"));
        assert_eq!(&rows[1][3], "");
        assert_eq!(&rows[1][5], "no_answer");
    }
}
