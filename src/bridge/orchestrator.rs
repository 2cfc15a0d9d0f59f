use super::PageContext;
use super::messages::{Request, Response};
use crate::completion::CompletionClient;
use crate::config::TimingConfig;
use crate::error::{AssistantError, ConnectivityError};
use crate::results::{CandidateProduct, CartAttemptResult, CartSummary, ParsedRequest};
use crate::store::{
    KeyValueStore, StoreKey, StoredCartResults, record_additions, record_search,
    take_fresh_cart_results,
};
use crate::utils::pause;
use std::sync::Arc;

/// Title of the single result reported when the agent recorded an error
/// instead of results
pub const NAVIGATION_ERROR_TITLE: &str = "Navigation Error";

const RESULT_LOST: &str = "result lost — please check your cart";

/// Outcome of one end-to-end request
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub request: ParsedRequest,
    pub products: Vec<CandidateProduct>,
    /// `None` when products were only searched
    pub results: Option<Vec<CartAttemptResult>>,
}

impl RunReport {
    pub fn summary(&self) -> Option<CartSummary> {
        self.results.as_deref().map(CartSummary::from_results)
    }
}

pub struct Orchestrator<C: PageContext> {
    context: C,
    store: Arc<dyn KeyValueStore>,
    timing: TimingConfig,
}

impl<C: PageContext> Orchestrator<C> {
    pub fn new(context: C, store: Arc<dyn KeyValueStore>, timing: TimingConfig) -> Self {
        Self {
            context,
            store,
            timing,
        }
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Ping the agent, injecting a new one when nothing answers
    pub async fn ensure_ready(&mut self) -> Result<(), AssistantError> {
        match self.context.send(Request::Ping).await {
            Ok(response) if response.success => return Ok(()),
            Ok(response) => ::log::warn!("Agent answered ping with failure: {:?}", response.error),
            Err(e) => ::log::info!("Agent not ready ({}), injecting", e),
        }

        self.context
            .reinject()
            .await
            .map_err(|e| AssistantError::InjectionFailed(e.to_string()))?;

        match self.context.send(Request::Ping).await {
            Ok(response) if response.success => Ok(()),
            Ok(response) => Err(AssistantError::InjectionFailed(
                response.error.unwrap_or_else(|| "agent did not answer ping".to_string()),
            )),
            Err(e) => Err(AssistantError::InjectionFailed(e.to_string())),
        }
    }

    /// Ask the agent for ranked products. A missing agent is reinjected and
    /// asked once more; a severed reply is surfaced as is.
    pub async fn search_products(
        &mut self,
        parsed: &ParsedRequest,
    ) -> Result<Vec<CandidateProduct>, AssistantError> {
        let request = Request::SearchProducts(parsed.clone());
        let response = match self.context.send(request.clone()).await {
            Ok(response) => response,
            Err(ConnectivityError::Absent) => {
                ::log::warn!("No agent for search, reinjecting and retrying once");
                self.context.reinject().await?;
                self.context.send(request).await?
            }
            Err(e) => return Err(e.into()),
        };

        if !response.success {
            return Err(AssistantError::Agent {
                action: "searchProducts",
                message: response.error.unwrap_or_else(|| "search failed".to_string()),
            });
        }
        Ok(response.products.unwrap_or_default())
    }

    /// Submit products for a cart run. The returned list always has one entry
    /// per product, in order.
    ///
    /// When the reply is lost, the agent is first allowed to finish and its
    /// late reply is used. Failing that, results it persisted within the
    /// freshness window are used; only without them is the agent reinjected
    /// and the run retried once.
    pub async fn add_to_cart(
        &mut self,
        products: &[CandidateProduct],
    ) -> Result<Vec<CartAttemptResult>, AssistantError> {
        let request = Request::AddToCart(products.to_vec());
        let lost = match self.context.send(request.clone()).await {
            Ok(response) => return cart_results(response, products),
            Err(e) => e,
        };

        ::log::warn!("Cart run reply lost: {}", lost);
        pause(self.timing.storage_grace_ms).await;

        // The run may still be going; nothing is reported or retried until
        // the agent has stopped
        if let Some(response) = self.context.settle().await {
            if let Err(e) = self.store.remove(StoreKey::LastCartResults) {
                ::log::warn!("Could not clear stored cart results: {}", e);
            }
            return cart_results(response, products);
        }

        match take_fresh_cart_results(self.store.as_ref(), self.timing.freshness_window_ms) {
            Ok(Some(record)) => return Ok(recovered_results(record, products)),
            Ok(None) => {}
            Err(e) => ::log::warn!("Could not read stored cart results: {}", e),
        }

        ::log::info!("No fresh stored results, reinjecting and retrying once");
        self.context.reinject().await?;
        let response = self.context.send(request).await?;
        cart_results(response, products)
    }

    /// Full pipeline: parse the request, search, and optionally add every
    /// product to the cart
    pub async fn run(
        &mut self,
        completion: &CompletionClient,
        free_text: &str,
        credential: &str,
        auto_add_to_cart: bool,
    ) -> Result<RunReport, AssistantError> {
        self.ensure_ready().await?;

        let parsed = completion.parse_request(free_text, credential).await?;
        if let Err(e) = record_search(self.store.as_ref()) {
            ::log::warn!("Could not update usage counters: {}", e);
        }

        let products = self.search_products(&parsed).await?;
        if products.is_empty() {
            return Err(AssistantError::NoProducts);
        }

        if !auto_add_to_cart {
            return Ok(RunReport {
                request: parsed,
                products,
                results: None,
            });
        }

        let results = self.add_to_cart(&products).await?;
        let added = results.iter().filter(|r| r.success).count();
        if let Err(e) = record_additions(self.store.as_ref(), added) {
            ::log::warn!("Could not update usage counters: {}", e);
        }
        ::log::info!("{}", CartSummary::from_results(&results).message());

        Ok(RunReport {
            request: parsed,
            products,
            results: Some(results),
        })
    }
}

fn cart_results(
    response: Response,
    products: &[CandidateProduct],
) -> Result<Vec<CartAttemptResult>, AssistantError> {
    if !response.success {
        return Err(AssistantError::Agent {
            action: "addToCart",
            message: response.error.unwrap_or_else(|| "cart run failed".to_string()),
        });
    }
    Ok(pad_results(response.results.unwrap_or_default(), products))
}

fn recovered_results(
    record: StoredCartResults,
    products: &[CandidateProduct],
) -> Vec<CartAttemptResult> {
    let results = match (record.results, record.error) {
        (_, Some(error)) => vec![CartAttemptResult {
            title: NAVIGATION_ERROR_TITLE.to_string(),
            price_display: String::new(),
            success: false,
            error: Some(error),
        }],
        (Some(results), None) => results,
        (None, None) => Vec::new(),
    };
    ::log::info!("Using {} stored cart results", results.len());
    pad_results(results, products)
}

/// Fit a result list to the submitted products: missing entries become
/// failures, extra entries are dropped
fn pad_results(
    mut results: Vec<CartAttemptResult>,
    products: &[CandidateProduct],
) -> Vec<CartAttemptResult> {
    if results.len() < products.len() {
        let missing = &products[results.len()..];
        results.extend(
            missing
                .iter()
                .map(|product| CartAttemptResult::failed(product, RESULT_LOST)),
        );
    }
    results.truncate(products.len());
    results
}
