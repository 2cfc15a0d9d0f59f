use crate::error::AssistantError;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Upper bound on the number of products picked per request
pub const MAX_RESULTS_LIMIT: usize = 5;

/// Top-level assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Search endpoint of the shop; the query is appended as `?k=`
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Number of ranked products kept after extraction, 1 to [`MAX_RESULTS_LIMIT`]
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Whether found products are added to the cart automatically
    #[serde(default = "default_auto_add_to_cart")]
    pub auto_add_to_cart: bool,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// Chat-completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    /// Upper bound on the completion length
    pub max_tokens: u32,
    /// Kept low so the output stays close to plain JSON
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 200,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

/// Exact attribute values that mark the real add-to-cart control on a
/// product detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonValidation {
    pub ids: Vec<String>,
    pub names: Vec<String>,
    pub values: Vec<String>,
    pub title_contains: Vec<String>,
    pub formaction_contains: Vec<String>,
}

impl Default for ButtonValidation {
    fn default() -> Self {
        Self {
            ids: strings(&["add-to-cart-button"]),
            names: strings(&["submit.add-to-cart"]),
            values: strings(&["Add to Cart"]),
            title_contains: strings(&["Add to Shopping Cart"]),
            formaction_contains: strings(&["/cart/add-to-cart"]),
        }
    }
}

/// Every selector chain used against the shop's markup. Chains are tried in
/// order; markup drift is fixed here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Attribute carrying the site-assigned product identifier
    pub id_attribute: String,
    pub listing_containers: Vec<String>,
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub link: Vec<String>,
    pub image: String,

    /// Links scanned when no listing container yields a product
    pub fallback_links: String,
    /// Regexes with one capture group for the product id
    pub detail_url_patterns: Vec<String>,
    pub fallback_link_limit: usize,
    pub fallback_min_title_len: usize,

    /// Marker contained in the URL of a search results page
    pub search_page_marker: String,

    pub listing_buttons: Vec<String>,
    pub interactive_elements: String,
    /// Lowercase phrases identifying an add-to-cart control by its text
    pub button_text_markers: Vec<String>,
    pub listing_success: Vec<String>,
    pub cart_count: String,

    pub detail_buttons: Vec<String>,
    pub detail_last_resort: Vec<String>,
    pub button_validation: ButtonValidation,
    pub detail_success: Vec<String>,
    pub detail_errors: Vec<String>,

    /// Text shown by a variant dropdown that still needs a choice
    pub variant_prompt_marker: String,
    pub size_prompts: Vec<String>,
    pub size_options: String,
    /// Lowercase substrings preferred when picking a size
    pub preferred_size_markers: Vec<String>,
    pub color_prompts: Vec<String>,
    pub color_options: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            id_attribute: "data-asin".to_string(),
            listing_containers: strings(&[
                r#"[data-component-type="s-search-result"]"#,
                ".s-result-item",
                r#"[data-asin]:not([data-asin=""])"#,
                ".s-card-container",
                ".s-expand-height",
                ".AdHolder",
                r#"[cel_widget_id*="MAIN-SEARCH_RESULTS"]"#,
            ]),
            title: strings(&[
                "h2 a span",
                ".s-size-mini span",
                r#"[data-cy="title-recipe-title"]"#,
                "h2 span",
                ".a-size-base-plus",
                ".a-size-medium",
                ".s-link-style .a-text-normal",
            ]),
            price: strings(&[
                ".a-price-whole",
                ".a-price .a-offscreen",
                ".a-price-range",
                ".a-price",
                ".s-price-instructions-style .a-offscreen",
            ]),
            link: strings(&[
                "h2 a",
                ".s-link-style a",
                r#"a[href*="/dp/"]"#,
                r#"a[href*="/gp/product/"]"#,
            ]),
            image: "img.s-image, img[data-image-latency], .s-image img".to_string(),
            fallback_links: r#"a[href*="/dp/"], a[href*="/gp/product/"]"#.to_string(),
            detail_url_patterns: strings(&[r"/dp/([A-Z0-9]{10})", r"/gp/product/([A-Z0-9]{10})"]),
            fallback_link_limit: 10,
            fallback_min_title_len: 5,
            search_page_marker: "/s?k=".to_string(),
            listing_buttons: strings(&[
                ".s-add-to-cart-button",
                r#"[data-action="add-to-cart"]"#,
                r#"button[data-action*="cart"]"#,
                r#".a-button[data-action="add-to-cart"]"#,
                r#"input[value*="Add to Cart"]"#,
                r#"input[value*="Add to cart"]"#,
                r#"button[aria-label*="Add to Cart"]"#,
                r#"button[aria-label*="Add to cart"]"#,
                r#"[data-cy="add-to-cart"]"#,
                ".puis-add-to-cart-button",
                ".s-atc-button",
                ".a-button-base",
                r#"input[type="submit"][value*="Cart"]"#,
                r#"input[type="submit"][value*="cart"]"#,
                r#"button[title*="Add to Cart"]"#,
                r#"button[title*="Add to cart"]"#,
                r#"button[data-testid*="cart"]"#,
                r#"button[class*="cart"]"#,
                r#"[role="button"][aria-label*="cart"]"#,
                r#"form[action*="cart"] input[type="submit"]"#,
                r#"form[action*="cart"] button"#,
                r#".a-button-input[value*="cart"]"#,
                r#".a-button-input[value*="Cart"]"#,
            ]),
            interactive_elements: r#"button, input[type="submit"], .a-button"#.to_string(),
            button_text_markers: strings(&["add to cart", "add to basket"]),
            listing_success: strings(&[
                ".a-alert-success",
                ".sw-atc-added-to-cart",
                r#"[data-feature-name="addToCart"]"#,
                ".s-cart-added-confirmation",
                ".a-changeover-inner",
            ]),
            cart_count: "#nav-cart-count, .nav-cart-count".to_string(),
            detail_buttons: strings(&[
                r#"input#add-to-cart-button[name="submit.add-to-cart"][value="Add to Cart"]"#,
                r#"input[id="add-to-cart-button"][name="submit.add-to-cart"]"#,
                r#"input[name="submit.add-to-cart"][title="Add to Shopping Cart"]"#,
                r#"input[formaction*="/cart/add-to-cart"][class*="a-button-input"]"#,
                r#"input[aria-labelledby="submit.add-to-cart-announce"]"#,
                "#add-to-cart-button",
                r#"input[name="submit.add-to-cart"]"#,
                r#"input[value="Add to Cart"]"#,
                r#"input[title*="Add to Shopping Cart"]"#,
                r#"input[formaction*="/cart/add-to-cart"]"#,
                r#"input.a-button-input[type="submit"]"#,
                r#"#addToCart_feature_div input[type="submit"]"#,
                r#".a-button-primary input[type="submit"]"#,
                r#"span[id*="submit.add-to-cart"] input"#,
                r#"button[data-action="add-to-cart"]"#,
                ".a-button-primary",
                r#"#dp-buy-box input[type="submit"]"#,
                r#"[data-feature-name="addToCart"] input[type="submit"]"#,
            ]),
            detail_last_resort: strings(&[
                "#add-to-cart-button",
                r#"input[name="submit.add-to-cart"]"#,
                r#"input[value="Add to Cart"]"#,
            ]),
            button_validation: ButtonValidation::default(),
            detail_success: strings(&[
                ".a-alert-success",
                "#sw-atc-added-to-cart",
                "#attachDisplayAddBaseAlert",
                ".a-changeover-inner",
                r#"[data-feature-name="addToCart"] .a-alert-success"#,
                "#huc-v2-order-row-confirm-text",
                r#".a-alert[data-a-subst="-aui-template-confirm-cart-add-html"]"#,
            ]),
            detail_errors: strings(&[
                ".a-alert-error",
                ".a-alert-warning",
                "#outOfStock",
                "#availability .a-color-state",
                r#".a-alert[data-a-subst="-aui-template-error-cart-add-html"]"#,
            ]),
            variant_prompt_marker: "Select".to_string(),
            size_prompts: strings(&[
                "#native_dropdown_selected_size_name",
                ".a-dropdown-prompt",
                r#"select[name*="size"]"#,
                r#"[data-action="main-image-click"] select"#,
            ]),
            size_options: r#"[data-dp-url*="size_name"], .a-dropdown-container li"#.to_string(),
            preferred_size_markers: strings(&["medium", "m "]),
            color_prompts: strings(&[
                "#native_dropdown_selected_color_name",
                r#"select[name*="color"]"#,
            ]),
            color_options: r#"[data-dp-url*="color_name"]"#.to_string(),
        }
    }
}

impl SelectorConfig {
    /// Check that every selector and pattern compiles
    pub fn validate(&self) -> Result<(), AssistantError> {
        let single = [
            &self.image,
            &self.fallback_links,
            &self.interactive_elements,
            &self.cart_count,
            &self.size_options,
            &self.color_options,
        ];
        let chains = [
            &self.listing_containers,
            &self.title,
            &self.price,
            &self.link,
            &self.listing_buttons,
            &self.listing_success,
            &self.detail_buttons,
            &self.detail_last_resort,
            &self.detail_success,
            &self.detail_errors,
            &self.size_prompts,
            &self.color_prompts,
        ];

        for selector in single.into_iter().chain(chains.into_iter().flatten()) {
            Selector::parse(selector).map_err(|e| {
                AssistantError::Config(format!("invalid selector {:?}: {}", selector, e))
            })?;
        }

        for pattern in &self.detail_url_patterns {
            Regex::new(pattern).map_err(|e| {
                AssistantError::Config(format!("invalid URL pattern {:?}: {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

/// Relevance weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Added per keyword token found in the title
    pub keyword: u32,
    pub size: u32,
    pub color: u32,
    pub brand: u32,
    /// Fixed score for products found by the link scan
    pub fallback: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            keyword: 10,
            size: 5,
            color: 5,
            brand: 8,
            fallback: 1,
        }
    }
}

/// Delays and deadlines, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// After scrolling a listing-page button into view
    pub listing_settle_ms: u64,
    /// After clicking a listing-page button
    pub listing_response_ms: u64,
    /// After a product detail page finished loading
    pub detail_settle_ms: u64,
    /// After scrolling the detail-page button into view
    pub detail_click_settle_ms: u64,
    /// After clicking the detail-page button
    pub detail_response_ms: u64,
    /// After choosing a size or color
    pub option_settle_ms: u64,
    /// Between two products of one batch
    pub inter_item_ms: u64,
    /// After the search results page loaded
    pub search_settle_ms: u64,
    /// After (re)starting the page agent
    pub injection_ms: u64,
    /// Before looking for persisted results after a lost connection
    pub storage_grace_ms: u64,
    /// Persisted results older than this are ignored
    pub freshness_window_ms: u64,
    /// Deadline for one reply from the page agent
    pub response_timeout_ms: u64,
    pub load_timeout_ms: u64,
    pub load_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            listing_settle_ms: 1000,
            listing_response_ms: 2000,
            detail_settle_ms: 3000,
            detail_click_settle_ms: 1000,
            detail_response_ms: 3000,
            option_settle_ms: 1000,
            inter_item_ms: 1000,
            search_settle_ms: 2000,
            injection_ms: 1000,
            storage_grace_ms: 2000,
            freshness_window_ms: 10_000,
            response_timeout_ms: 120_000,
            load_timeout_ms: 30_000,
            load_poll_ms: 100,
        }
    }
}

impl TimingConfig {
    /// Same deadlines and freshness window, but no settle or response delays
    pub fn without_delays() -> Self {
        Self {
            listing_settle_ms: 0,
            listing_response_ms: 0,
            detail_settle_ms: 0,
            detail_click_settle_ms: 0,
            detail_response_ms: 0,
            option_settle_ms: 0,
            inter_item_ms: 0,
            search_settle_ms: 0,
            injection_ms: 0,
            storage_grace_ms: 0,
            ..Self::default()
        }
    }
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Default value for search_base_url
fn default_search_base_url() -> String {
    "https://www.amazon.com/s".to_string()
}

/// Default value for max_results
fn default_max_results() -> usize {
    5
}

fn default_auto_add_to_cart() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            search_base_url: default_search_base_url(),
            max_results: default_max_results(),
            auto_add_to_cart: default_auto_add_to_cart(),
            completion: CompletionConfig::default(),
            selectors: SelectorConfig::default(),
            scoring: ScoringConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssistantError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            AssistantError::Config(format!("cannot open {}: {}", path.display(), e))
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AssistantError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string and validate its selectors
    pub fn from_json(json: &str) -> Result<Self, AssistantError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| AssistantError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check bounds and selectors
    pub fn validate(&self) -> Result<(), AssistantError> {
        if !(1..=MAX_RESULTS_LIMIT).contains(&self.max_results) {
            return Err(AssistantError::Config(format!(
                "max_results must be between 1 and {}, got {}",
                MAX_RESULTS_LIMIT, self.max_results
            )));
        }
        self.selectors.validate()
    }

    /// Override the WebDriver URL with the WEBDRIVER_URL environment variable if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_are_valid() {
        assert!(SelectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AssistantConfig::from_json(
            r#"{"max_results": 3, "scoring": {"brand": 12}, "timing": {"inter_item_ms": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.max_results, 3);
        assert_eq!(config.scoring.brand, 12);
        assert_eq!(config.scoring.keyword, 10);
        assert_eq!(config.timing.inter_item_ms, 0);
        assert_eq!(config.timing.freshness_window_ms, 10_000);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.completion.max_tokens, 200);
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let result =
            AssistantConfig::from_json(r#"{"selectors": {"listing_containers": ["div[["]}}"#);
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn test_max_results_is_bounded() {
        for json in [r#"{"max_results": 8}"#, r#"{"max_results": 0}"#] {
            let result = AssistantConfig::from_json(json);
            assert!(matches!(result, Err(AssistantError::Config(_))), "{}", json);
        }
        let config = AssistantConfig::from_json(r#"{"max_results": 5}"#).unwrap();
        assert_eq!(config.max_results, MAX_RESULTS_LIMIT);
    }

    #[test]
    fn test_without_delays_keeps_deadlines() {
        let timing = TimingConfig::without_delays();
        assert_eq!(timing.detail_settle_ms, 0);
        assert_eq!(timing.storage_grace_ms, 0);
        assert_eq!(timing.freshness_window_ms, 10_000);
        assert!(timing.response_timeout_ms > 0);
    }
}
