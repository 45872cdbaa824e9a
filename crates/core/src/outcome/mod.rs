//! Outcome records written once per concluded call attempt.

mod export;
mod sink;
mod sqlite;
mod types;

pub use export::{outcomes_to_csv, OUTCOME_CSV_COLUMNS};
pub use sink::{OutcomeError, OutcomeFilter, ResultSink};
pub use sqlite::SqliteResultSink;
pub use types::{CallStatistics, InterestLevel, OutcomeRecord, OutcomeStatus};
