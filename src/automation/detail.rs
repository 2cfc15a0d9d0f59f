use super::{AutomationFailure, first_present, query_all};
use crate::config::{AssistantConfig, ButtonValidation, SelectorConfig};
use crate::page::{Page, PageError, find_first};
use crate::results::CandidateProduct;
use crate::utils::pause;

/// Open the product's detail page and add it from there
pub(super) async fn try_add<P: Page>(
    page: &P,
    product: &CandidateProduct,
    config: &AssistantConfig,
) -> Result<(), AutomationFailure> {
    let selectors = &config.selectors;
    let timing = &config.timing;

    page.goto(&product.detail_url).await?;
    page.wait_for_load().await?;
    pause(timing.detail_settle_ms).await;

    // Variants first: the button stays inert until a size is chosen
    if let Err(e) = resolve_variants(page, config).await {
        ::log::warn!("Variant selection for {} failed: {}", product.id, e);
    }

    let button = match find_validated_button(page, selectors).await? {
        Some(button) => button,
        None => last_resort_button(page, selectors)
            .await
            .ok_or(AutomationFailure::ButtonNotFound)?,
    };

    if !page.is_enabled(&button).await? {
        return Err(AutomationFailure::ButtonDisabled);
    }

    page.scroll_into_view(&button).await?;
    pause(timing.detail_click_settle_ms).await;
    page.click(&button).await?;
    pause(timing.detail_response_ms).await;

    let confirmed = first_present(page, &selectors.detail_success).await;

    // An error shown by the site wins over any success indicator
    if let Some(message) = error_indicator_text(page, selectors).await {
        return Err(AutomationFailure::Rejected(message));
    }

    if let Some(indicator) = confirmed {
        ::log::debug!("Detail add for {} confirmed by {}", product.id, indicator);
        return Ok(());
    }
    if !query_all(page, &selectors.cart_count).await.is_empty() {
        return Ok(());
    }

    Err(AutomationFailure::Uncertain)
}

async fn find_validated_button<P: Page>(
    page: &P,
    selectors: &SelectorConfig,
) -> Result<Option<P::Element>, PageError> {
    for selector in &selectors.detail_buttons {
        for candidate in query_all(page, selector).await {
            if !page.is_enabled(&candidate).await? || !page.is_displayed(&candidate).await? {
                continue;
            }
            if is_cart_control(page, &candidate, &selectors.button_validation).await? {
                ::log::debug!("Detail control matched {}", selector);
                return Ok(Some(candidate));
            }
        }
    }
    Ok(None)
}

/// Whether any identifying attribute marks the element as the real
/// add-to-cart control
async fn is_cart_control<P: Page>(
    page: &P,
    element: &P::Element,
    validation: &ButtonValidation,
) -> Result<bool, PageError> {
    let exact = [
        ("id", &validation.ids),
        ("name", &validation.names),
        ("value", &validation.values),
    ];
    for (attribute, accepted) in exact {
        if let Some(value) = page.attr(element, attribute).await? {
            if accepted.iter().any(|a| *a == value) {
                return Ok(true);
            }
        }
    }

    let partial = [
        ("title", &validation.title_contains),
        ("formaction", &validation.formaction_contains),
    ];
    for (attribute, fragments) in partial {
        if let Some(value) = page.attr(element, attribute).await? {
            if fragments.iter().any(|f| value.contains(f.as_str())) {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

/// First match of the fallback chain, with no validation at all
async fn last_resort_button<P: Page>(page: &P, selectors: &SelectorConfig) -> Option<P::Element> {
    for selector in &selectors.detail_last_resort {
        if let Some(found) = query_all(page, selector).await.into_iter().next() {
            ::log::debug!("Using last-resort control {}", selector);
            return Some(found);
        }
    }
    None
}

async fn error_indicator_text<P: Page>(page: &P, selectors: &SelectorConfig) -> Option<String> {
    for selector in &selectors.detail_errors {
        let Some(indicator) = query_all(page, selector).await.into_iter().next() else {
            continue;
        };
        match page.text(&indicator).await {
            Ok(text) if !text.trim().is_empty() => return Some(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => ::log::debug!("Could not read error indicator {}: {}", selector, e),
        }
    }
    None
}

async fn resolve_variants<P: Page>(page: &P, config: &AssistantConfig) -> Result<(), PageError> {
    let selectors = &config.selectors;

    if let Some(choice) = choose_option(
        page,
        &selectors.size_prompts,
        &selectors.size_options,
        &selectors.preferred_size_markers,
        selectors,
    )
    .await?
    {
        ::log::info!("Selected size {:?}", choice);
        pause(config.timing.option_settle_ms).await;
    }

    if let Some(choice) = choose_option(
        page,
        &selectors.color_prompts,
        &selectors.color_options,
        &[],
        selectors,
    )
    .await?
    {
        ::log::info!("Selected color {:?}", choice);
        pause(config.timing.option_settle_ms).await;
    }

    Ok(())
}

/// If a prompt still asks for a choice, click the preferred option (or the
/// first one). Returns the text of the clicked option.
async fn choose_option<P: Page>(
    page: &P,
    prompts: &[String],
    options_selector: &str,
    preferred: &[String],
    selectors: &SelectorConfig,
) -> Result<Option<String>, PageError> {
    for prompt_selector in prompts {
        let Some(prompt) = find_first(page, prompt_selector).await? else {
            continue;
        };
        if !page
            .text(&prompt)
            .await?
            .contains(selectors.variant_prompt_marker.as_str())
        {
            continue;
        }

        let options = query_all(page, options_selector).await;
        if options.is_empty() {
            return Ok(None);
        }

        let mut labels = Vec::with_capacity(options.len());
        for option in &options {
            labels.push(page.text(option).await?.to_lowercase());
        }

        let index = labels
            .iter()
            .position(|label| {
                preferred
                    .iter()
                    .any(|marker| label.contains(marker.as_str()) || label == marker.trim())
            })
            .unwrap_or(0);

        page.click(&options[index]).await?;
        return Ok(Some(labels.swap_remove(index)));
    }
    Ok(None)
}
