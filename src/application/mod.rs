//! Application layer - use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations; wiring happens in the binary.

pub mod services;

pub use services::{ChatOutcome, ChatPrompt, ChatService, DocumentService, IngestedFile};
