pub mod html;
pub mod request;


use scraper::{ElementRef, Selector};

/// Compile a CSS selector, logging and skipping it if the configuration holds
/// something the parser rejects
pub fn compile_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            ::log::warn!("Skipping invalid selector {:?}: {}", selector, e);
            None
        }
    }
}

/// Whitespace-normalized text content of an element
pub fn element_text(element: &ElementRef<'_>) -> String {
    crate::utils::normalize_text(&element.text().collect::<String>())
}
