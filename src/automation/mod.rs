//! Add-to-cart automation.
//!
//! Each product runs through an explicit state machine:
//!
//! ```text
//! TryListingPage --found & confirmed--> Done(Ok)
//!       |
//!       +--not found / unconfirmed / page error--> TryDetailPage --> Done(Ok | Err)
//! ```
//!
//! `Done` is terminal. Failures never escape as errors; they are recorded in
//! the product's [`CartAttemptResult`].

mod detail;
mod listing;

#[cfg(test)]
mod tests;

use crate::config::AssistantConfig;
use crate::page::{Page, PageError};
use crate::results::{CandidateProduct, CartAttemptResult};
use crate::store::{KeyValueStore, StoredCartResults, publish_cart_results};
use crate::utils::pause;
use thiserror::Error;

/// Why an add-to-cart attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationFailure {
    #[error("button not found")]
    ButtonNotFound,

    #[error("disabled — unavailable")]
    ButtonDisabled,

    /// Text of an error indicator shown by the site
    #[error("{0}")]
    Rejected(String),

    #[error("uncertain — please check your cart")]
    Uncertain,

    #[error("page error: {0}")]
    Page(String),
}

impl From<PageError> for AutomationFailure {
    fn from(error: PageError) -> Self {
        AutomationFailure::Page(error.to_string())
    }
}

/// States of one add-to-cart attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartState {
    TryListingPage,
    TryDetailPage,
    Done(Result<(), AutomationFailure>),
}

impl CartState {
    /// Run one transition
    async fn advance<P: Page>(
        self,
        page: &P,
        product: &CandidateProduct,
        config: &AssistantConfig,
    ) -> CartState {
        match self {
            CartState::TryListingPage => match listing::try_add(page, product, config).await {
                Ok(true) => CartState::Done(Ok(())),
                Ok(false) => CartState::TryDetailPage,
                Err(e) => {
                    ::log::warn!("Listing page attempt for {} failed: {}", product.id, e);
                    CartState::TryDetailPage
                }
            },
            CartState::TryDetailPage => {
                CartState::Done(detail::try_add(page, product, config).await)
            }
            done @ CartState::Done(_) => done,
        }
    }
}

/// Try to add one product to the cart, first from the listing page and then
/// from its detail page. Never fails; the outcome is in the result.
pub async fn add_to_cart<P: Page>(
    page: &P,
    product: &CandidateProduct,
    config: &AssistantConfig,
) -> CartAttemptResult {
    ::log::info!("Adding to cart: {} ({})", product.title, product.id);

    let mut state = CartState::TryListingPage;
    loop {
        state = state.advance(page, product, config).await;
        ::log::debug!("Product {} -> {:?}", product.id, state);

        if let CartState::Done(outcome) = state {
            return match outcome {
                Ok(()) => {
                    ::log::info!("Added {} to cart", product.id);
                    CartAttemptResult::succeeded(product)
                }
                Err(failure) => {
                    ::log::info!("Could not add {}: {}", product.id, failure);
                    CartAttemptResult::failed(product, failure.to_string())
                }
            };
        }
    }
}

/// Process products strictly one at a time, in order. After every product
/// the results so far are published to the store's last-results slot so a
/// caller that lost its connection can still recover them.
pub async fn add_all<P: Page>(
    page: &P,
    products: &[CandidateProduct],
    store: &dyn KeyValueStore,
    config: &AssistantConfig,
) -> Vec<CartAttemptResult> {
    let mut results = Vec::with_capacity(products.len());

    for (index, product) in products.iter().enumerate() {
        let result = add_to_cart(page, product, config).await;
        results.push(result);
        publish_cart_results(store, &StoredCartResults::results(results.clone()));

        if index + 1 < products.len() {
            pause(config.timing.inter_item_ms).await;
        }
    }

    results
}

/// Matches of `selector`, treating a failing query as no match
async fn query_all<P: Page>(page: &P, selector: &str) -> Vec<P::Element> {
    match page.find_all(selector).await {
        Ok(found) => found,
        Err(e) => {
            ::log::debug!("Query {:?} failed: {}", selector, e);
            Vec::new()
        }
    }
}

async fn query_within<P: Page>(page: &P, scope: &P::Element, selector: &str) -> Vec<P::Element> {
    match page.find_within(scope, selector).await {
        Ok(found) => found,
        Err(e) => {
            ::log::debug!("Scoped query {:?} failed: {}", selector, e);
            Vec::new()
        }
    }
}

/// First selector of the chain that matches anything
async fn first_present<P: Page>(page: &P, chain: &[String]) -> Option<String> {
    for selector in chain {
        if !query_all(page, selector).await.is_empty() {
            return Some(selector.clone());
        }
    }
    None
}
