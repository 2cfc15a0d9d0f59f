use super::*;
use crate::config::TimingConfig;
use crate::page::fixture::{FixturePage, Reaction};
use crate::results::DomHandle;
use crate::store::{MemoryStore, take_fresh_cart_results};

const SEARCH_URL: &str = "https://shop.test/s?k=desk+lamp";

const LISTING_WITH_BUTTON: &str = r#"<html><body>
<div data-component-type="s-search-result" data-asin="B000000001">
  <h2><a href="/dp/B000000001"><span>Desk Lamp</span></a></h2>
  <button class="s-add-to-cart-button" id="atc-1">Add to cart</button>
</div>
</body></html>"#;

const LISTING_WITHOUT_BUTTON: &str = r#"<html><body>
<div data-component-type="s-search-result" data-asin="B000000001">
  <h2><a href="/dp/B000000001"><span>Desk Lamp</span></a></h2>
</div>
</body></html>"#;

const LISTING_ADDED: &str = r#"<html><body>
<div class="a-alert-success">Added to cart</div>
</body></html>"#;

const DETAIL_PAGE: &str = r#"<html><body>
<div id="dp-buy-box">
  <input id="add-to-cart-button" name="submit.add-to-cart" value="Add to Cart" type="submit">
</div>
</body></html>"#;

const DETAIL_ADDED: &str = r#"<html><body>
<div id="sw-atc-added-to-cart">Added to Cart</div>
</body></html>"#;

fn detail_url(id: &str) -> String {
    format!("https://shop.test/dp/{}", id)
}

fn product(id: &str, title: &str) -> CandidateProduct {
    CandidateProduct {
        id: id.to_string(),
        title: title.to_string(),
        price_display: "$19.99".to_string(),
        price_value: Some(19.99),
        detail_url: detail_url(id),
        image_url: String::new(),
        relevance_score: 10,
        dom_handle: Some(DomHandle {
            generation: 0,
            locator: format!(r#"[data-asin="{}"]"#, id),
        }),
    }
}

fn config() -> AssistantConfig {
    AssistantConfig {
        timing: TimingConfig::without_delays(),
        ..AssistantConfig::default()
    }
}

#[tokio::test]
async fn test_listing_page_add_confirmed() {
    let page = FixturePage::new(SEARCH_URL, LISTING_WITH_BUTTON)
        .on_click("#atc-1", Reaction::Replace(LISTING_ADDED.to_string()));

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.title, "Desk Lamp");
    assert_eq!(page.clicks(), vec!["atc-1"]);
    assert!(page.visits().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_listing_click_falls_back_to_detail_page() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITH_BUTTON)
        .with_route(&url, DETAIL_PAGE)
        .on_click(
            "#add-to-cart-button",
            Reaction::Replace(DETAIL_ADDED.to_string()),
        );

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(result.success);
    assert_eq!(page.clicks(), vec!["atc-1", "add-to-cart-button"]);
    assert_eq!(page.visits(), vec![url]);
}

#[tokio::test]
async fn test_disabled_detail_button_is_not_clicked() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON).with_route(
        &url,
        r#"<html><body>
        <input id="add-to-cart-button" name="submit.add-to-cart" value="Add to Cart" disabled>
        </body></html>"#,
    );

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("disabled — unavailable"));
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn test_missing_button_on_both_pages() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON)
        .with_route(&url, "<html><body><p>Currently no offers</p></body></html>");

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("button not found"));
    assert_eq!(result.price_display, "$19.99");
}

#[tokio::test]
async fn test_error_indicator_wins_over_success_indicator() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON)
        .with_route(&url, DETAIL_PAGE)
        .on_click(
            "#add-to-cart-button",
            Reaction::Replace(
                r#"<html><body>
                <div class="a-alert-success">Added</div>
                <div id="outOfStock">Currently unavailable.</div>
                </body></html>"#
                    .to_string(),
            ),
        );

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Currently unavailable."));
}

#[tokio::test]
async fn test_no_feedback_after_click_is_uncertain() {
    let url = detail_url("B000000001");
    let page =
        FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON).with_route(&url, DETAIL_PAGE);

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("uncertain — please check your cart")
    );
    assert_eq!(page.clicks(), vec!["add-to-cart-button"]);
}

#[tokio::test]
async fn test_cart_counter_counts_as_confirmation() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON).with_route(
        &url,
        r#"<html><body>
        <span id="nav-cart-count">1</span>
        <input id="add-to-cart-button" name="submit.add-to-cart" value="Add to Cart" type="submit">
        </body></html>"#,
    );

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(result.success);
}

#[tokio::test]
async fn test_size_is_chosen_before_clicking() {
    let url = detail_url("B000000001");
    let page = FixturePage::new(SEARCH_URL, LISTING_WITHOUT_BUTTON)
        .with_route(
            &url,
            r#"<html><body>
            <span id="native_dropdown_selected_size_name">Select</span>
            <div class="a-dropdown-container"><ul>
              <li id="size-s">Small</li>
              <li id="size-m">Medium</li>
              <li id="size-l">Large</li>
            </ul></div>
            <input id="add-to-cart-button" name="submit.add-to-cart" value="Add to Cart" type="submit">
            </body></html>"#,
        )
        .on_click(
            "#add-to-cart-button",
            Reaction::Replace(DETAIL_ADDED.to_string()),
        );

    let result = add_to_cart(&page, &product("B000000001", "Hoodie"), &config()).await;

    assert!(result.success);
    assert_eq!(page.clicks(), vec!["size-m", "add-to-cart-button"]);
}

#[tokio::test]
async fn test_page_wide_button_is_matched_by_owner_id() {
    let page = FixturePage::new(
        SEARCH_URL,
        r#"<html><body>
        <div data-component-type="s-search-result" data-asin="B000000001"><h2>Desk Lamp</h2></div>
        <div data-asin="B000000002"><button class="s-atc-button" id="other-atc">Add to cart</button></div>
        <div data-asin="B000000001" class="overlay"><button class="s-atc-button" id="overlay-atc">Add to cart</button></div>
        </body></html>"#,
    )
    .on_click("#overlay-atc", Reaction::Replace(LISTING_ADDED.to_string()));

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(result.success);
    assert_eq!(page.clicks(), vec!["overlay-atc"]);
}

#[tokio::test]
async fn test_button_found_by_label_text() {
    let page = FixturePage::new(
        SEARCH_URL,
        r#"<html><body>
        <div data-component-type="s-search-result" data-asin="B000000001">
          <h2>Desk Lamp</h2>
          <span class="a-button" id="basket-btn">Add to Basket</span>
        </div>
        </body></html>"#,
    )
    .on_click("#basket-btn", Reaction::Replace(LISTING_ADDED.to_string()));

    let result = add_to_cart(&page, &product("B000000001", "Desk Lamp"), &config()).await;

    assert!(result.success);
    assert_eq!(page.clicks(), vec!["basket-btn"]);
}

#[tokio::test]
async fn test_stale_handle_is_requeried_by_id() {
    let page = FixturePage::new("about:blank", "<html></html>")
        .with_route(SEARCH_URL, LISTING_WITH_BUTTON)
        .on_click("#atc-1", Reaction::Replace(LISTING_ADDED.to_string()));
    page.goto(SEARCH_URL).await.unwrap();

    let mut stale = product("B000000001", "Desk Lamp");
    stale.dom_handle = Some(DomHandle {
        generation: 0,
        locator: "#no-longer-valid".to_string(),
    });

    let result = add_to_cart(&page, &stale, &config()).await;

    assert!(result.success);
    assert_eq!(page.clicks(), vec!["atc-1"]);
}

#[tokio::test]
async fn test_batch_keeps_order_and_publishes_results() {
    let page = FixturePage::new(SEARCH_URL, LISTING_WITH_BUTTON)
        .on_click("#atc-1", Reaction::Replace(LISTING_ADDED.to_string()))
        .with_route(&detail_url("B000000003"), DETAIL_PAGE)
        .on_click(
            "#add-to-cart-button",
            Reaction::Replace(DETAIL_ADDED.to_string()),
        );
    let store = MemoryStore::new();
    let products = vec![
        product("B000000001", "Desk Lamp"),
        product("B000000002", "Floor Lamp"),
        product("B000000003", "Reading Lamp"),
    ];

    let results = add_all(&page, &products, &store, &config()).await;

    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Desk Lamp", "Floor Lamp", "Reading Lamp"]);
    let outcomes: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert_eq!(results[1].error.as_deref(), Some("button not found"));

    let published = take_fresh_cart_results(&store, 10_000).unwrap().unwrap();
    assert_eq!(published.results, Some(results));
}

#[tokio::test]
async fn test_empty_batch() {
    let page = FixturePage::new(SEARCH_URL, LISTING_WITH_BUTTON);
    let store = MemoryStore::new();

    let results = add_all(&page, &[], &store, &config()).await;

    assert!(results.is_empty());
    assert!(take_fresh_cart_results(&store, 10_000).unwrap().is_none());
}
