use super::PageContext;
use super::messages::{Request, Response};
use crate::automation::add_all;
use crate::config::AssistantConfig;
use crate::error::{AssistantError, ConnectivityError};
use crate::page::Page;
use crate::parsers::html::{PageSnapshot, extract_products};
use crate::results::{CandidateProduct, ParsedRequest};
use crate::store::{KeyValueStore, StoredCartResults, publish_cart_results};
use crate::utils::pause;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

const QUEUE_DEPTH: usize = 8;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Serves requests against one page, strictly one at a time
struct PageAgent<P: Page> {
    page: Arc<Mutex<P>>,
    store: Arc<dyn KeyValueStore>,
    config: Arc<AssistantConfig>,
}

impl<P: Page + 'static> PageAgent<P> {
    async fn serve(self, mut inbox: mpsc::Receiver<Envelope>) {
        ::log::debug!("Page agent started");
        while let Some(Envelope { request, reply }) = inbox.recv().await {
            let action = request.action_name();
            let response = self.handle(request).await;
            if reply.send(response).is_err() {
                ::log::warn!(
                    "Reply to {} could not be delivered; cart results stay in the store",
                    action
                );
            }
        }
        ::log::debug!("Page agent stopped");
    }

    async fn handle(&self, request: Request) -> Response {
        // Held for the whole request, so an agent started by a reinjection
        // waits for the previous one to finish with the page
        let page = self.page.lock().await;

        match request {
            Request::Ping => Response::pong(),
            Request::SearchProducts(parsed) => {
                match search(&*page, &parsed, &self.config).await {
                    Ok(products) => {
                        ::log::info!("Found {} products", products.len());
                        Response::products(products)
                    }
                    Err(e) => {
                        ::log::error!("Search failed: {}", e);
                        Response::failure(e.to_string())
                    }
                }
            }
            Request::AddToCart(products) => {
                if let Err(e) = page.current_url().await {
                    ::log::error!("Page unavailable for cart run: {}", e);
                    publish_cart_results(self.store.as_ref(), &StoredCartResults::error(e.to_string()));
                    return Response::failure(e.to_string());
                }
                let results = add_all(&*page, &products, self.store.as_ref(), &self.config).await;
                Response::results(results)
            }
        }
    }
}

/// Make sure the page shows search results, then extract ranked products
/// from its current DOM
async fn search<P: Page>(
    page: &P,
    parsed: &ParsedRequest,
    config: &AssistantConfig,
) -> Result<Vec<CandidateProduct>, AssistantError> {
    let current = page.current_url().await?;
    if !current.contains(config.selectors.search_page_marker.as_str()) {
        let target = search_url(&config.search_base_url, &parsed.search_query())?;
        page.goto(target.as_str()).await?;
        page.wait_for_load().await?;
        pause(config.timing.search_settle_ms).await;
    }

    let html = page.source().await?;
    let url = page.current_url().await?;
    let snapshot = PageSnapshot {
        html: &html,
        url: &url,
        generation: page.generation(),
    };
    Ok(extract_products(snapshot, parsed, config))
}

fn search_url(base: &str, query: &str) -> Result<Url, AssistantError> {
    Url::parse_with_params(base, &[("k", query)])
        .map_err(|e| AssistantError::Config(format!("invalid search URL {:?}: {}", base, e)))
}

/// Link to the agent serving one page. Starts without an agent; the first
/// [`PageContext::reinject`] spawns one.
pub struct AgentLink<P: Page + 'static> {
    page: Arc<Mutex<P>>,
    store: Arc<dyn KeyValueStore>,
    config: Arc<AssistantConfig>,
    sender: Option<mpsc::Sender<Envelope>>,
    task: Option<JoinHandle<()>>,
    /// Reply channel of the last request that missed its deadline
    overdue: std::sync::Mutex<Option<oneshot::Receiver<Response>>>,
}

impl<P: Page + 'static> AgentLink<P> {
    pub fn new(page: P, store: Arc<dyn KeyValueStore>, config: Arc<AssistantConfig>) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
            store,
            config,
            sender: None,
            task: None,
            overdue: std::sync::Mutex::new(None),
        }
    }

    /// Stop the agent and hand the page back once it is idle
    pub async fn shutdown(mut self) -> Option<P> {
        self.stop_agent().await;
        Arc::try_unwrap(self.page).ok().map(Mutex::into_inner)
    }

    /// Close the agent's inbox and wait for it to finish the request it is
    /// working on. Clicks already issued are never cancelled.
    async fn stop_agent(&mut self) {
        self.sender = None;
        if let Some(task) = self.task.take() {
            ::log::debug!("Waiting for the page agent to finish");
            if let Err(e) = task.await {
                ::log::warn!("Page agent ended abnormally: {}", e);
            }
        }
    }

    fn set_overdue(&self, receiver: Option<oneshot::Receiver<Response>>) {
        match self.overdue.lock() {
            Ok(mut overdue) => *overdue = receiver,
            Err(_) => ::log::warn!("Overdue reply slot poisoned"),
        }
    }

    #[cfg(test)]
    pub(crate) fn page(&self) -> &Arc<Mutex<P>> {
        &self.page
    }
}

#[async_trait]
impl<P: Page + 'static> PageContext for AgentLink<P> {
    async fn send(&self, request: Request) -> Result<Response, ConnectivityError> {
        let sender = self.sender.as_ref().ok_or(ConnectivityError::Absent)?;
        let action = request.action_name();
        let (reply, mut pending) = oneshot::channel();
        self.set_overdue(None);

        sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ConnectivityError::Absent)?;

        let deadline = Duration::from_millis(self.config.timing.response_timeout_ms);
        let outcome = tokio::time::timeout(deadline, &mut pending).await;
        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ConnectivityError::Severed(format!(
                "agent dropped the reply to {}",
                action
            ))),
            Err(_) => {
                // The agent is still working on it; settle() collects the reply
                self.set_overdue(Some(pending));
                Err(ConnectivityError::Severed(format!(
                    "no reply to {} within {} ms",
                    action,
                    deadline.as_millis()
                )))
            }
        }
    }

    async fn settle(&mut self) -> Option<Response> {
        self.stop_agent().await;
        let overdue = match self.overdue.get_mut() {
            Ok(overdue) => overdue.take()?,
            Err(_) => return None,
        };
        match overdue.await {
            Ok(response) => {
                ::log::info!("Collected a reply that arrived after its deadline");
                Some(response)
            }
            Err(_) => None,
        }
    }

    async fn reinject(&mut self) -> Result<(), AssistantError> {
        // Two agents must never drive the page at once
        self.stop_agent().await;
        self.set_overdue(None);

        let (sender, inbox) = mpsc::channel(QUEUE_DEPTH);
        let agent = PageAgent {
            page: Arc::clone(&self.page),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        };
        self.task = Some(tokio::spawn(agent.serve(inbox)));
        self.sender = Some(sender);

        ::log::info!("Page agent injected");
        pause(self.config.timing.injection_ms).await;
        Ok(())
    }
}
