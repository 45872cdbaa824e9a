//! CSV bulk import of leads.

use serde::Deserialize;

use super::{CreateLeadRequest, LeadError};

/// Columns a lead upload must carry. The rest are optional.
pub const REQUIRED_LEAD_COLUMNS: [&str; 3] = ["business_name", "contact_number", "contact_name"];

/// Example upload served to operators.
pub const LEAD_CSV_TEMPLATE: &str = "\
business_name,contact_number,contact_name,business_type,company_size,current_challenges,best_call_time
Joe's Pizza Palace,+15551234567,Joe Martinez,Restaurant,Small,Phone orders during busy hours,14:00-16:00
Green Valley Dental,+15555678901,Dr. Michael Brown,Healthcare,Small,Appointment scheduling and reminders,12:00-14:00
";

#[derive(Debug, Deserialize)]
struct LeadRow {
    business_name: String,
    contact_number: String,
    contact_name: String,
    #[serde(default)]
    business_type: String,
    #[serde(default)]
    company_size: String,
    #[serde(default)]
    current_challenges: Option<String>,
    #[serde(default)]
    best_call_time: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<LeadRow> for CreateLeadRequest {
    fn from(row: LeadRow) -> Self {
        Self {
            contact_number: row.contact_number,
            business_name: row.business_name,
            contact_name: row.contact_name,
            business_type: row.business_type,
            company_size: row.company_size,
            current_challenges: non_empty(row.current_challenges),
            best_call_time: non_empty(row.best_call_time),
        }
    }
}

/// Parse a lead upload.
///
/// The whole file is rejected if a required column is missing or any row
/// is malformed; nothing is returned partially. Unknown columns are ignored.
pub fn parse_leads_csv(data: &[u8]) -> Result<Vec<CreateLeadRequest>, LeadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| LeadError::Invalid(format!("unreadable CSV header: {}", e)))?
        .clone();
    let missing: Vec<&str> = REQUIRED_LEAD_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(LeadError::Invalid(format!(
            "missing CSV columns: {}",
            missing.join(", ")
        )));
    }

    let mut requests = Vec::new();
    for (index, row) in reader.deserialize::<LeadRow>().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let row = row.map_err(|e| LeadError::Invalid(format!("line {}: {}", line, e)))?;
        if row.business_name.is_empty() {
            return Err(LeadError::Invalid(format!(
                "line {}: business_name is required",
                line
            )));
        }
        requests.push(CreateLeadRequest::from(row));
    }

    if requests.is_empty() {
        return Err(LeadError::Invalid("CSV contains no leads".to_string()));
    }
    Ok(requests)
}
