//! Vigil Common Types
//!
//! Shared types and wire contracts used by the agent core and the RPC
//! dispatcher. Everything that crosses the host boundary is defined here.

pub mod error;
pub mod filter;
pub mod logging;
pub mod types;

pub use error::{Error, Result};
pub use filter::{FilterCondition, FilterExpr, FilterOp};
pub use logging::{init_agent_logging, init_logging, LogConfig};
pub use types::*;

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
