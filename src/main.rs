use clap::Parser;
use smart_cart::page::{Page, WebDriverPage};
use smart_cart::store::{
    FileStore, KeyValueStore, Settings, load_credential, load_settings, save_credential,
    save_settings,
};
use smart_cart::{
    AgentLink, AssistantConfig, AssistantError, CompletionClient, Orchestrator, RunReport,
};
use std::sync::Arc;

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), AssistantError> {
    let mut config = match &args.config {
        Some(path) => AssistantConfig::from_file(path)?,
        None => AssistantConfig::default(),
    };
    config.apply_env_overrides();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&args.store)?);
    if let Some(settings) = load_settings(store.as_ref())? {
        config.auto_add_to_cart = settings.auto_add_to_cart;
        config.max_results = settings.max_results;
    }
    args.apply(&mut config);
    // Stored settings are checked here as well as file values
    config.validate()?;

    if args.save_settings {
        save_settings(
            store.as_ref(),
            &Settings {
                auto_add_to_cart: config.auto_add_to_cart,
                max_results: config.max_results,
            },
        )?;
    }

    let credential = resolve_credential(args.api_key.as_deref(), store.as_ref())?;
    let completion = CompletionClient::new(&config.completion)?;

    println!("Note: smart-cart drives the browser through a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using the default {}",
        config.webdriver_url
    );

    let page = WebDriverPage::connect(&config.webdriver_url, &config.timing).await?;
    if let Some(start_url) = &args.start_url {
        page.goto(start_url).await?;
        page.wait_for_load().await?;
    }

    let config = Arc::new(config);
    let link = AgentLink::new(page, Arc::clone(&store), Arc::clone(&config));
    let mut orchestrator = Orchestrator::new(link, store, config.timing.clone());

    let start_time = std::time::Instant::now();
    let outcome = orchestrator
        .run(
            &completion,
            &args.request,
            &credential,
            config.auto_add_to_cart,
        )
        .await;
    ::log::info!(
        "Request handled in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );

    if let Some(page) = orchestrator.into_context().shutdown().await {
        if let Err(e) = page.close().await {
            ::log::warn!("Failed to close WebDriver session: {}", e);
        }
    }

    print_report(&outcome?);
    Ok(())
}

/// Key from the command line or environment (remembered for next time),
/// otherwise the one saved earlier
fn resolve_credential(
    provided: Option<&str>,
    store: &dyn KeyValueStore,
) -> Result<String, AssistantError> {
    if let Some(key) = provided.map(str::trim).filter(|k| !k.is_empty()) {
        if let Err(e) = save_credential(store, key) {
            ::log::warn!("Could not save API key: {}", e);
        }
        return Ok(key.to_string());
    }
    load_credential(store)?.ok_or(AssistantError::MissingCredential)
}

fn print_report(report: &RunReport) {
    println!("Searching for: {}", report.request.search_query());
    println!("Found {} products:", report.products.len());
    for (index, product) in report.products.iter().enumerate() {
        println!(
            "  {}. {} - {} (score {})",
            index + 1,
            product.title,
            product.price_display,
            product.relevance_score
        );
        println!("     {}", product.detail_url);
    }

    let (Some(results), Some(summary)) = (&report.results, report.summary()) else {
        return;
    };

    println!();
    for result in results {
        match &result.error {
            None if result.success => println!("  [added]  {}", result.title),
            error => println!(
                "  [failed] {}: {}",
                result.title,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!("{}", summary.message());
}
