//! Request path and the background side-effect queue behind it

pub mod dispatch;
pub mod orchestrator;

pub use dispatch::{OutboundMessage, SideEffectDispatcher, RECURRING_LOOKBACK, RECURRING_THRESHOLD};
pub use orchestrator::{TriageOutcome, TriagePipeline};
