//! Outbound call placement.

mod twilio;
mod types;
mod unconfigured;

pub use twilio::{normalize_destination, TwilioClient};
pub use types::{CallContext, CallPlacementClient, PlacedCall, PlacementError};
pub use unconfigured::UnconfiguredPlacementClient;
