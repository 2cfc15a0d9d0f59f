use crate::config::ScoringConfig;
use crate::results::ParsedRequest;
use regex::Regex;
use std::sync::LazyLock;

/// Leading `digits[,digits]*[.digits]` in a price display string
static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d+)*(?:\.\d+)?").expect("price pattern should be valid"));

/// Parse the numeric value out of a price display string such as `$1,234.56`
pub fn parse_price(display: &str) -> Option<f64> {
    let found = PRICE_PATTERN.find(display)?;
    found.as_str().replace(',', "").parse().ok()
}

/// Price bounds and relevance scoring derived from one parsed request
#[derive(Debug, Clone)]
pub struct ProductFilter {
    keywords: Vec<String>,
    size: Option<String>,
    color: Option<String>,
    brand: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    weights: ScoringConfig,
}

impl ProductFilter {
    /// Create a filter from a request and scoring weights
    pub fn new(request: &ParsedRequest, weights: &ScoringConfig) -> Self {
        Self {
            keywords: request
                .keywords
                .split_whitespace()
                .map(str::to_lowercase)
                .collect(),
            size: lowercase_term(&request.size),
            color: lowercase_term(&request.color),
            brand: lowercase_term(&request.brand),
            min_price: request.min_price,
            max_price: request.max_price,
            weights: weights.clone(),
        }
    }

    /// An inverted range can never be satisfied
    pub fn is_unsatisfiable(&self) -> bool {
        match (self.min_price, self.max_price) {
            (Some(min), Some(max)) => min > max,
            _ => false,
        }
    }

    /// Bounds apply only when both the bound and the price are known
    pub fn admits_price(&self, price: Option<f64>) -> bool {
        let Some(price) = price else {
            return true;
        };
        if let Some(max) = self.max_price {
            if price > max {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if price < min {
                return false;
            }
        }
        true
    }

    /// Additive relevance score of a product title
    pub fn score(&self, title: &str) -> u32 {
        let title = title.to_lowercase();
        let mut score = 0;

        for keyword in &self.keywords {
            if title.contains(keyword.as_str()) {
                score += self.weights.keyword;
            }
        }

        let attributes = [
            (&self.size, self.weights.size),
            (&self.color, self.weights.color),
            (&self.brand, self.weights.brand),
        ];
        for (term, weight) in attributes {
            if let Some(term) = term {
                if title.contains(term.as_str()) {
                    score += weight;
                }
            }
        }

        score
    }
}

fn lowercase_term(term: &Option<String>) -> Option<String> {
    term.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ParsedRequest {
        ParsedRequest {
            keywords: "running shoes".to_string(),
            color: Some("black".to_string()),
            brand: Some("nike".to_string()),
            ..ParsedRequest::default()
        }
    }

    #[test]
    fn test_score_adds_keyword_and_attribute_weights() {
        let filter = ProductFilter::new(&request(), &ScoringConfig::default());
        assert_eq!(filter.score("Nike Air Max Men's Running Shoes Black"), 33);
        assert_eq!(filter.score("Adidas Trail Shoes"), 10);
        assert_eq!(filter.score("Garden hose"), 0);
    }

    #[test]
    fn test_score_ignores_extra_whitespace_in_keywords() {
        let request = ParsedRequest::new("  desk   lamp ");
        let filter = ProductFilter::new(&request, &ScoringConfig::default());
        assert_eq!(filter.score("LED Desk Lamp"), 20);
        assert_eq!(filter.score("Floor light"), 0);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,234.56"), Some(1234.56));
        assert_eq!(parse_price("29."), Some(29.0));
        assert_eq!(parse_price("$15.99 - $24.99"), Some(15.99));
        assert_eq!(parse_price("Price not available"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_price_bounds() {
        let request = ParsedRequest {
            min_price: Some(20.0),
            max_price: Some(50.0),
            ..ParsedRequest::new("lamp")
        };
        let filter = ProductFilter::new(&request, &ScoringConfig::default());
        assert!(filter.admits_price(Some(20.0)));
        assert!(filter.admits_price(Some(50.0)));
        assert!(!filter.admits_price(Some(19.99)));
        assert!(!filter.admits_price(Some(50.01)));
        assert!(filter.admits_price(None));
        assert!(!filter.is_unsatisfiable());
    }

    #[test]
    fn test_inverted_range_is_unsatisfiable() {
        let request = ParsedRequest {
            min_price: Some(100.0),
            max_price: Some(10.0),
            ..ParsedRequest::new("lamp")
        };
        let filter = ProductFilter::new(&request, &ScoringConfig::default());
        assert!(filter.is_unsatisfiable());
    }
}
