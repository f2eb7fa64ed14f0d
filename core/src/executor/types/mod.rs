pub mod config;
pub mod result;

pub use config::*;
pub use result::*;

pub use super::metrics::Metrics;
pub use super::timeline::{TimelineEvent, TimelineEventType};
