use crate::error::AssistantError;
use crate::results::ParsedRequest;

/// Instruction sent to the completion endpoint for one free-text request
pub fn build_instruction(free_text: &str) -> String {
    format!(
        r#"Parse this product request and extract structured information. Return a JSON object with the following fields:
- keywords: main search terms
- category: product category (optional)
- size: size requirement (optional)
- color: color preference (optional)
- maxPrice: maximum price in USD (optional, extract number only)
- minPrice: minimum price in USD (optional, extract number only)
- brand: preferred brand (optional)
- quantity: how many items (default 1)

Request: "{}"

Return only valid JSON, no additional text."#,
        free_text.trim().replace('"', "'")
    )
}

/// Parses the text block returned by the completion endpoint.
///
/// A surrounding Markdown code fence is tolerated; anything else that is not
/// a JSON object matching [`ParsedRequest`] is a parse error.
pub fn parse_completion_content(content: &str) -> Result<ParsedRequest, AssistantError> {
    let body = strip_code_fence(content.trim());

    let request: ParsedRequest =
        serde_json::from_str(body).map_err(|e| AssistantError::Parse {
            reason: e.to_string(),
        })?;

    if request.keywords.trim().is_empty() {
        return Err(AssistantError::Parse {
            reason: "keywords are empty".to_string(),
        });
    }

    Ok(request)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line, then the closing fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
