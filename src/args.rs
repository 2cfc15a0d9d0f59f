use clap::Parser;
use clap::builder::RangedU64ValueParser;
use smart_cart::AssistantConfig;
use smart_cart::config::MAX_RESULTS_LIMIT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smart-cart")]
#[command(about = "Shopping assistant that finds products from a plain-language request and adds them to the cart")]
#[command(version)]
pub struct Args {
    /// What to shop for, e.g. "black running shoes size 10 under $80"
    pub request: String,

    /// Completion API key; saved to the store for later runs
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// URL of the WebDriver server
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Key-value store file
    #[arg(long, default_value = "smart-cart-store.json")]
    pub store: PathBuf,

    /// Page to open before searching
    #[arg(long)]
    pub start_url: Option<String>,

    /// Only list matching products, do not add them to the cart
    #[arg(long)]
    pub search_only: bool,

    /// Add the products to the cart even if a saved setting says otherwise
    #[arg(long, conflicts_with = "search_only")]
    pub add_to_cart: bool,

    /// Maximum number of products to pick (1 to 5)
    #[arg(
        short,
        long,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_RESULTS_LIMIT as u64)
    )]
    pub max_results: Option<usize>,

    /// Remember the cart mode and --max-results for later runs
    #[arg(long)]
    pub save_settings: bool,
}

impl Args {
    /// Command-line values take precedence over the file and stored settings
    pub fn apply(&self, config: &mut AssistantConfig) {
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if self.search_only {
            config.auto_add_to_cart = false;
        }
        if self.add_to_cart {
            config.auto_add_to_cart = true;
        }
    }
}
