//! Live conversation tracking.

mod hub;
mod types;

pub use hub::{CallEventHub, Delivery, MAX_HELD_EVENTS};
pub use types::{ConversationEnd, ConversationPipeline, PipelineError, Speaker, Turn};
