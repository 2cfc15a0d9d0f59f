use crate::results::{CandidateProduct, CartAttemptResult, ParsedRequest};
use serde::{Deserialize, Serialize};

/// Request sent to the page agent.
///
/// On the wire this is `{"action": "...", "data": ...}` with `data` omitted
/// for `ping`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum Request {
    Ping,
    SearchProducts(ParsedRequest),
    AddToCart(Vec<CandidateProduct>),
}

impl Request {
    pub fn action_name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::SearchProducts(_) => "searchProducts",
            Request::AddToCart(_) => "addToCart",
        }
    }
}

/// Reply from the page agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<CandidateProduct>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CartAttemptResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn pong() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn products(products: Vec<CandidateProduct>) -> Self {
        Self {
            success: true,
            products: Some(products),
            ..Self::default()
        }
    }

    pub fn results(results: Vec<CartAttemptResult>) -> Self {
        Self {
            success: true,
            results: Some(results),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
