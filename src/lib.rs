//! Shopping assistant: turns a free-text request into a product search on a
//! retail site and adds the best matches to the cart through a WebDriver
//! controlled browser tab.

pub mod automation;
pub mod bridge;
pub mod completion;
pub mod config;
pub mod error;
pub mod filter;
pub mod page;
pub mod parsers;
pub mod results;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use bridge::{AgentLink, Orchestrator, PageContext, RunReport};
pub use completion::CompletionClient;
pub use config::AssistantConfig;
pub use error::{AssistantError, ConnectivityError};
pub use results::{CandidateProduct, CartAttemptResult, CartSummary, ParsedRequest};
