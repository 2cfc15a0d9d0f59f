use serde::{Deserialize, Serialize};

/// Structured search parameters produced from a free-text request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRequest {
    /// Main search terms
    pub keywords: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Minimum price in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,

    /// Maximum price in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// How many items (the completion prompt defaults this to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl ParsedRequest {
    /// Create a request with keywords only
    pub fn new(keywords: &str) -> Self {
        Self {
            keywords: keywords.to_string(),
            ..Self::default()
        }
    }

    /// Search box query: keywords followed by category, size, color and brand
    pub fn search_query(&self) -> String {
        let mut query = self.keywords.trim().to_string();
        for extra in [&self.category, &self.size, &self.color, &self.brand]
            .into_iter()
            .flatten()
        {
            let extra = extra.trim();
            if !extra.is_empty() {
                query.push(' ');
                query.push_str(extra);
            }
        }
        query
    }
}

/// Reference to the page element a product was extracted from.
///
/// Only meaningful while the page stays at the navigation generation it was
/// taken in; after any navigation the element must be re-queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomHandle {
    /// Page navigation generation at extraction time
    pub generation: u64,
    /// CSS locator that re-finds the element
    pub locator: String,
}

/// A product found on the search results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProduct {
    /// Site-assigned product identifier
    pub id: String,
    pub title: String,
    pub price_display: String,
    pub price_value: Option<f64>,
    pub detail_url: String,
    pub image_url: String,
    pub relevance_score: u32,
    /// Never crosses the bridge; the receiving side re-queries by id
    #[serde(skip)]
    pub dom_handle: Option<DomHandle>,
}

/// Outcome of one add-to-cart attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAttemptResult {
    pub title: String,
    pub price_display: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CartAttemptResult {
    pub fn succeeded(product: &CandidateProduct) -> Self {
        Self {
            title: product.title.clone(),
            price_display: product.price_display.clone(),
            success: true,
            error: None,
        }
    }

    pub fn failed(product: &CandidateProduct, error: impl Into<String>) -> Self {
        Self {
            title: product.title.clone(),
            price_display: product.price_display.clone(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a cart run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartSummary {
    AllAdded { total: usize },
    Partial { added: usize, total: usize },
    NoneAdded { total: usize },
}

impl CartSummary {
    pub fn from_results(results: &[CartAttemptResult]) -> Self {
        let total = results.len();
        let added = results.iter().filter(|r| r.success).count();
        if total > 0 && added == total {
            CartSummary::AllAdded { total }
        } else if added > 0 {
            CartSummary::Partial { added, total }
        } else {
            CartSummary::NoneAdded { total }
        }
    }

    /// Status line shown to the user
    pub fn message(&self) -> String {
        match self {
            CartSummary::AllAdded { .. } => "Successfully added all products to cart!".to_string(),
            CartSummary::Partial { added, total } => format!(
                "Added {} of {} products. Please add remaining items manually.",
                added, total
            ),
            CartSummary::NoneAdded { .. } => {
                "Found products but couldn't add automatically. Please click \"Add to Cart\" buttons manually."
                    .to_string()
            }
        }
    }
}
