//! Type definitions for revtrack

mod error;
mod metrics;
mod records;

pub use error::*;
pub use metrics::*;
pub use records::*;
