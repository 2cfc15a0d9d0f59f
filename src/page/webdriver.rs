use crate::config::TimingConfig;
use crate::page::{Page, PageError};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Endpoints tried when the configured WebDriver URL does not answer
const FALLBACK_WEBDRIVER_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

const READY_STATE_SCRIPT: &str = "return document.readyState;";

const SCROLL_SCRIPT: &str = "arguments[0].scrollIntoView({behavior: 'instant', block: 'center'});";

const CLOSEST_ATTR_SCRIPT: &str = r#"
    const name = arguments[1];
    const holder = arguments[0].closest('[' + name + ']');
    return holder ? holder.getAttribute(name) : null;
"#;

/// A browser tab driven over WebDriver
pub struct WebDriverPage {
    client: Client,
    generation: AtomicU64,
    load_timeout: Duration,
    load_poll: Duration,
}

impl WebDriverPage {
    /// Connect to the WebDriver server, trying common alternative endpoints
    /// when the configured one fails
    pub async fn connect(webdriver_url: &str, timing: &TimingConfig) -> Result<Self, PageError> {
        let client = connect_to_webdriver(webdriver_url).await?;
        Ok(Self::from_client(client, timing))
    }

    /// Wrap an existing session
    pub fn from_client(client: Client, timing: &TimingConfig) -> Self {
        Self {
            client,
            generation: AtomicU64::new(0),
            load_timeout: Duration::from_millis(timing.load_timeout_ms),
            load_poll: Duration::from_millis(timing.load_poll_ms.max(10)),
        }
    }

    /// End the WebDriver session
    pub async fn close(self) -> Result<(), PageError> {
        self.client.close().await?;
        Ok(())
    }

    fn element_arg(element: &Element) -> Result<Value, PageError> {
        serde_json::to_value(element).map_err(|e| PageError::Command(e.to_string()))
    }
}

async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client, PageError> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!(
                "Failed to connect to WebDriver at {}: {}",
                webdriver_url,
                e
            );
        }
    }

    for url in FALLBACK_WEBDRIVER_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(PageError::Session(format!(
        "no WebDriver server reachable at {} or fallbacks",
        webdriver_url
    )))
}

#[async_trait]
impl Page for WebDriverPage {
    type Element = Element;

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        ::log::info!("Navigating to {}", url);
        // Handles taken before this point are stale even if goto fails midway
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), PageError> {
        let started = Instant::now();
        loop {
            match self.client.execute(READY_STATE_SCRIPT, vec![]).await {
                Ok(Value::String(state)) if state == "complete" => return Ok(()),
                Ok(_) => {}
                Err(e) => ::log::trace!("readyState check failed: {}", e),
            }
            if started.elapsed() >= self.load_timeout {
                return Err(PageError::Timeout("page load".to_string()));
            }
            tokio::time::sleep(self.load_poll).await;
        }
    }

    async fn source(&self) -> Result<String, PageError> {
        Ok(self.client.source().await?)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>, PageError> {
        Ok(self.client.find_all(Locator::Css(selector)).await?)
    }

    async fn find_within(&self, scope: &Element, selector: &str) -> Result<Vec<Element>, PageError> {
        Ok(scope.find_all(Locator::Css(selector)).await?)
    }

    async fn attr(&self, element: &Element, name: &str) -> Result<Option<String>, PageError> {
        Ok(element.attr(name).await?)
    }

    async fn text(&self, element: &Element) -> Result<String, PageError> {
        Ok(crate::utils::normalize_text(&element.text().await?))
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool, PageError> {
        Ok(element.is_enabled().await?)
    }

    async fn is_displayed(&self, element: &Element) -> Result<bool, PageError> {
        Ok(element.is_displayed().await?)
    }

    async fn click(&self, element: &Element) -> Result<(), PageError> {
        element.click().await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<(), PageError> {
        let arg = Self::element_arg(element)?;
        self.client.execute(SCROLL_SCRIPT, vec![arg]).await?;
        Ok(())
    }

    async fn closest_attr(&self, element: &Element, name: &str) -> Result<Option<String>, PageError> {
        let arg = Self::element_arg(element)?;
        let value = self
            .client
            .execute(CLOSEST_ATTR_SCRIPT, vec![arg, Value::String(name.to_string())])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }
}
