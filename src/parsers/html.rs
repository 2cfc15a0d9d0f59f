use crate::config::{AssistantConfig, MAX_RESULTS_LIMIT, SelectorConfig};
use crate::filter::{ProductFilter, parse_price};
use crate::parsers::{compile_selector, element_text};
use crate::results::{CandidateProduct, DomHandle, ParsedRequest};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use url::Url;

/// Price display used for products found by the link scan
pub const PRICE_NOT_AVAILABLE: &str = "Price not available";

/// Where a snapshot came from; used to resolve links and stamp handles
#[derive(Debug, Clone, Copy)]
pub struct PageSnapshot<'a> {
    pub html: &'a str,
    pub url: &'a str,
    pub generation: u64,
}

/// Extracts ranked candidate products from a search results page.
///
/// Never fails: elements that cannot be read are skipped. Returns at most
/// `config.max_results` products ordered by descending relevance, page order
/// kept for ties.
pub fn extract_products(
    snapshot: PageSnapshot<'_>,
    request: &ParsedRequest,
    config: &AssistantConfig,
) -> Vec<CandidateProduct> {
    let filter = ProductFilter::new(request, &config.scoring);
    if filter.is_unsatisfiable() {
        ::log::info!(
            "Price range {:?}..{:?} is inverted, nothing can match",
            request.min_price,
            request.max_price
        );
        return Vec::new();
    }

    let doc = Html::parse_document(snapshot.html);
    let base = Url::parse(snapshot.url).ok();
    let selectors = &config.selectors;

    let containers = find_listing_containers(&doc, selectors);
    let mut products = Vec::new();
    let mut seen = HashSet::new();

    for (index, element) in containers.iter().enumerate() {
        let Some(product) = extract_listing(element, &filter, base.as_ref(), &snapshot, config)
        else {
            ::log::trace!("Skipping listing element {}", index + 1);
            continue;
        };
        if !seen.insert(product.id.clone()) {
            ::log::trace!("Skipping duplicate listing for {}", product.id);
            continue;
        }
        ::log::debug!(
            "Listing {}: {:?} ({}) score {}",
            index + 1,
            product.title,
            product.id,
            product.relevance_score
        );
        products.push(product);
    }

    if products.is_empty() {
        ::log::info!("No products from listing containers, scanning product links");
        products = scan_detail_links(&doc, base.as_ref(), &snapshot, config);
    }

    // Vec::sort_by is stable, so equal scores keep page order
    products.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    products.truncate(config.max_results.min(MAX_RESULTS_LIMIT));

    ::log::info!("Extracted {} candidate products", products.len());
    products
}

/// Tries each container selector in priority order and falls back to every
/// element carrying the identifier attribute
fn find_listing_containers<'a>(doc: &'a Html, selectors: &SelectorConfig) -> Vec<ElementRef<'a>> {
    for selector in &selectors.listing_containers {
        let Some(compiled) = compile_selector(selector) else {
            continue;
        };
        let found: Vec<_> = doc.select(&compiled).collect();
        ::log::debug!("Selector {:?} found {} elements", selector, found.len());
        if !found.is_empty() {
            return found;
        }
    }

    let generic = format!("[{}]", selectors.id_attribute);
    let found: Vec<_> = compile_selector(&generic)
        .map(|compiled| doc.select(&compiled).collect())
        .unwrap_or_default();
    ::log::debug!("Generic selector {:?} found {} elements", generic, found.len());
    found
}

fn extract_listing(
    element: &ElementRef<'_>,
    filter: &ProductFilter,
    base: Option<&Url>,
    snapshot: &PageSnapshot<'_>,
    config: &AssistantConfig,
) -> Option<CandidateProduct> {
    let selectors = &config.selectors;

    let id = element
        .value()
        .attr(&selectors.id_attribute)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let title = first_text(element, &selectors.title);
    let link = first_link(element, &selectors.link, base);
    let (Some(title), Some(detail_url)) = (title, link) else {
        ::log::debug!("Product {} is missing a title or a link", id);
        return None;
    };

    let price_display = first_text(element, &selectors.price).unwrap_or_default();
    let price_value = parse_price(&price_display);
    if !filter.admits_price(price_value) {
        ::log::debug!("Product {} priced {:?} is outside the range", id, price_value);
        return None;
    }

    let image_url = compile_selector(&selectors.image)
        .and_then(|image| {
            element
                .select(&image)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string)
        })
        .unwrap_or_default();

    let relevance_score = filter.score(&title);
    let locator = format!("[{}=\"{}\"]", selectors.id_attribute, id);

    Some(CandidateProduct {
        id,
        title,
        price_display,
        price_value,
        detail_url,
        image_url,
        relevance_score,
        dom_handle: Some(DomHandle {
            generation: snapshot.generation,
            locator,
        }),
    })
}

/// Secondary pass: product links anywhere on the page
fn scan_detail_links(
    doc: &Html,
    base: Option<&Url>,
    snapshot: &PageSnapshot<'_>,
    config: &AssistantConfig,
) -> Vec<CandidateProduct> {
    let selectors = &config.selectors;
    let patterns: Vec<Regex> = selectors
        .detail_url_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
    let Some(links) = compile_selector(&selectors.fallback_links) else {
        return Vec::new();
    };

    let mut products = Vec::new();
    for link in doc.select(&links).take(selectors.fallback_link_limit) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(detail_url) = resolve_link(base, href) else {
            continue;
        };
        let Some(id) = detail_id(&patterns, &detail_url) else {
            continue;
        };

        let text = element_text(&link);
        let title = if !text.is_empty() {
            text
        } else if let Some(title) = link.value().attr("title").filter(|t| !t.trim().is_empty()) {
            title.trim().to_string()
        } else {
            format!("Product {}", id)
        };

        if title.chars().count() < selectors.fallback_min_title_len {
            continue;
        }

        ::log::debug!("Link scan found {:?} ({})", title, id);
        products.push(CandidateProduct {
            title,
            price_display: PRICE_NOT_AVAILABLE.to_string(),
            price_value: None,
            detail_url,
            image_url: String::new(),
            relevance_score: config.scoring.fallback,
            dom_handle: Some(DomHandle {
                generation: snapshot.generation,
                locator: format!("a[href*=\"{}\"]", id),
            }),
            id,
        });
    }

    products
}

/// Extract a product id from a detail-page URL
pub fn detail_id(patterns: &[Regex], url: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// First non-empty text, trying each selector's first match in order
fn first_text(element: &ElementRef<'_>, chain: &[String]) -> Option<String> {
    chain.iter().find_map(|selector| {
        let compiled = compile_selector(selector)?;
        let found = element.select(&compiled).next()?;
        let text = element_text(&found);
        (!text.is_empty()).then_some(text)
    })
}

/// First link with an href, resolved against the page URL
fn first_link(element: &ElementRef<'_>, chain: &[String], base: Option<&Url>) -> Option<String> {
    chain.iter().find_map(|selector| {
        let compiled = compile_selector(selector)?;
        let found = element.select(&compiled).next()?;
        let href = found.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        resolve_link(base, href)
    })
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}
