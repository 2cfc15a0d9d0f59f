use super::{first_present, query_all, query_within};
use crate::config::{AssistantConfig, SelectorConfig};
use crate::page::{Page, PageError, find_first};
use crate::results::CandidateProduct;
use crate::utils::pause;

/// Click the product's add-to-cart control on the results page.
///
/// Returns `Ok(false)` when no usable control exists or the click could not
/// be confirmed.
pub(super) async fn try_add<P: Page>(
    page: &P,
    product: &CandidateProduct,
    config: &AssistantConfig,
) -> Result<bool, PageError> {
    let selectors = &config.selectors;

    let Some(container) = locate_container(page, product, selectors).await? else {
        ::log::debug!("No listing element for {}", product.id);
        return Ok(false);
    };

    let Some(button) = find_button(page, &container, product, selectors).await? else {
        ::log::debug!("No listing add-to-cart control for {}", product.id);
        return Ok(false);
    };

    page.scroll_into_view(&button).await?;
    pause(config.timing.listing_settle_ms).await;
    page.click(&button).await?;
    pause(config.timing.listing_response_ms).await;

    if let Some(indicator) = first_present(page, &selectors.listing_success).await {
        ::log::debug!("Listing add confirmed by {}", indicator);
        return Ok(true);
    }
    // A cart counter in the header is taken as confirmation as well
    Ok(!query_all(page, &selectors.cart_count).await.is_empty())
}

/// Resolve the product's element on the current page, re-querying by id
/// when the extraction handle belongs to an earlier navigation
async fn locate_container<P: Page>(
    page: &P,
    product: &CandidateProduct,
    selectors: &SelectorConfig,
) -> Result<Option<P::Element>, PageError> {
    if let Some(handle) = &product.dom_handle {
        if handle.generation == page.generation() {
            if let Some(found) = find_first(page, &handle.locator).await? {
                return Ok(Some(found));
            }
        } else {
            ::log::debug!(
                "Handle for {} is from generation {}, page is at {}",
                product.id,
                handle.generation,
                page.generation()
            );
        }
    }

    let by_id = format!(r#"[{}="{}"]"#, selectors.id_attribute, product.id);
    find_first(page, &by_id).await
}

async fn find_button<P: Page>(
    page: &P,
    container: &P::Element,
    product: &CandidateProduct,
    selectors: &SelectorConfig,
) -> Result<Option<P::Element>, PageError> {
    // 1. Known selectors inside the container
    for selector in &selectors.listing_buttons {
        for candidate in query_within(page, container, selector).await {
            if page.is_enabled(&candidate).await? {
                ::log::debug!("Listing control for {} matched {}", product.id, selector);
                return Ok(Some(candidate));
            }
        }
    }

    // 2. Known selectors anywhere, attributed to the product via the
    //    nearest ancestor carrying its id
    for selector in &selectors.listing_buttons {
        for candidate in query_all(page, selector).await {
            let owner = page.closest_attr(&candidate, &selectors.id_attribute).await?;
            if owner.as_deref() == Some(product.id.as_str()) && page.is_enabled(&candidate).await? {
                ::log::debug!("Page-wide control for {} matched {}", product.id, selector);
                return Ok(Some(candidate));
            }
        }
    }

    // 3. Any interactive element in the container whose label reads like add-to-cart
    for candidate in query_within(page, container, &selectors.interactive_elements).await {
        let label = control_label(page, &candidate).await?.to_lowercase();
        let matches = selectors
            .button_text_markers
            .iter()
            .any(|marker| label.contains(marker.as_str()));
        if matches && page.is_enabled(&candidate).await? {
            ::log::debug!("Listing control for {} matched by text {:?}", product.id, label);
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Visible text, falling back to the `value` and `aria-label` attributes
async fn control_label<P: Page>(page: &P, element: &P::Element) -> Result<String, PageError> {
    let text = page.text(element).await?;
    if !text.is_empty() {
        return Ok(text);
    }
    for attribute in ["value", "aria-label"] {
        if let Some(value) = page.attr(element, attribute).await? {
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }
    Ok(String::new())
}
