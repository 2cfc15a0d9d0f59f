use crate::page::PageError;
use crate::store::StoreError;
use thiserror::Error;

/// Failures on the channel between the orchestrator and the page agent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    /// No agent is listening (never injected, or its task has exited)
    #[error("receiving end does not exist")]
    Absent,

    /// The agent accepted the request but the reply never came back
    #[error("message channel closed before a response was received: {0}")]
    Severed(String),
}

/// Errors surfaced by the assistant
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("completion service error (status {status:?}): {message}")]
    RemoteService { status: Option<u16>, message: String },

    #[error("could not parse completion output: {reason}")]
    Parse { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection to page agent lost: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("failed to initialize assistant on this page: {0}")]
    InjectionFailed(String),

    #[error("page agent reported failure in {action}: {message}")]
    Agent {
        action: &'static str,
        message: String,
    },

    #[error("browser error: {0}")]
    Page(#[from] PageError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no products found matching the request")]
    NoProducts,

    #[error("no API credential provided")]
    MissingCredential,
}

impl AssistantError {
    /// Short, actionable phrase for the end user
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::Connectivity(_) => {
                "Connection lost with the shop page. Please refresh the page and try again."
                    .to_string()
            }
            AssistantError::InjectionFailed(_) => {
                "Assistant failed to load on this page. Please refresh the page and try again."
                    .to_string()
            }
            AssistantError::RemoteService { .. } | AssistantError::Http(_) => {
                "AI service error. Please check your API key and try again.".to_string()
            }
            AssistantError::Parse { .. } => {
                "Could not understand the AI response. Try rephrasing your request.".to_string()
            }
            AssistantError::NoProducts => {
                "No matching products found. Try using different search terms.".to_string()
            }
            AssistantError::MissingCredential => {
                "Please provide your OpenAI API key (--api-key or OPENAI_API_KEY).".to_string()
            }
            AssistantError::Page(_) => {
                "Browser automation failed. Make sure a WebDriver server is running.".to_string()
            }
            AssistantError::Agent { action, message } => match *action {
                "searchProducts" => format!("Search failed: {}", message),
                "addToCart" => format!("Adding to cart failed: {}", message),
                _ => format!("The shop page reported an error: {}", message),
            },
            AssistantError::Store(_) | AssistantError::Config(_) => self.to_string(),
        }
    }
}
