//! Link between the orchestrator and the agent that owns the browser page.

pub mod agent;
pub mod messages;
pub mod orchestrator;


use crate::error::{AssistantError, ConnectivityError};
use async_trait::async_trait;

pub use agent::AgentLink;
pub use messages::{Request, Response};
pub use orchestrator::{Orchestrator, RunReport};

/// Request/response channel to whatever serves the page
#[async_trait]
pub trait PageContext: Send + Sync {
    /// One round trip.
    ///
    /// [`ConnectivityError::Absent`] means nothing is listening;
    /// [`ConnectivityError::Severed`] means the request was accepted but no
    /// reply arrived.
    async fn send(&self, request: Request) -> Result<Response, ConnectivityError>;

    /// Wait until the agent has finished everything it accepted and stop it.
    /// Returns the reply to the last request if it arrived after `send`
    /// gave up on it.
    async fn settle(&mut self) -> Option<Response>;

    /// Stop any previous agent and start a fresh one on the page
    async fn reinject(&mut self) -> Result<(), AssistantError>;
}
