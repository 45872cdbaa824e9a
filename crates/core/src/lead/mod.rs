//! Lead records: the prospects a campaign dials.

mod import;
mod sqlite_store;
mod store;
mod types;

pub use import::{parse_leads_csv, LEAD_CSV_TEMPLATE, REQUIRED_LEAD_COLUMNS};
pub use sqlite_store::SqliteLeadStore;
pub use store::{CreateLeadRequest, LeadError, LeadFilter, LeadStore};
pub use types::{Lead, LeadStatus};
