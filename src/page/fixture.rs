//! Scripted in-memory page used by the automation and bridge tests.

use crate::page::{Page, PageError};
use crate::parsers::element_text;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Mutex;

const NOT_FOUND_PAGE: &str = "<html><body><h1>Page not found</h1></body></html>";

/// What happens when an element matching a selector is clicked
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Replace the document in place (same URL, no navigation)
    Replace(String),
    /// Navigate to a routed URL
    Navigate(String),
}

#[derive(Debug, Clone)]
pub struct FixtureElement {
    dom_version: u64,
    index: usize,
}

struct FixtureState {
    url: String,
    html: String,
    generation: u64,
    dom_version: u64,
    routes: HashMap<String, String>,
    reactions: Vec<(String, Reaction)>,
    clicks: Vec<String>,
    visits: Vec<String>,
}

impl FixtureState {
    fn navigate(&mut self, url: &str) {
        self.visits.push(url.to_string());
        self.html = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| NOT_FOUND_PAGE.to_string());
        self.url = url.to_string();
        self.generation += 1;
        self.dom_version += 1;
    }
}

pub struct FixturePage {
    state: Mutex<FixtureState>,
}

impl FixturePage {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            state: Mutex::new(FixtureState {
                url: url.to_string(),
                html: html.to_string(),
                generation: 0,
                dom_version: 0,
                routes: HashMap::new(),
                reactions: Vec::new(),
                clicks: Vec::new(),
                visits: Vec::new(),
            }),
        }
    }

    /// Serve `html` when `url` is visited
    pub fn with_route(self, url: &str, html: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(url.to_string(), html.to_string());
        self
    }

    /// React to clicks on elements matching `selector`
    pub fn on_click(self, selector: &str, reaction: Reaction) -> Self {
        self.state
            .lock()
            .unwrap()
            .reactions
            .push((selector.to_string(), reaction));
        self
    }

    /// `id` (or tag name) of every clicked element, in order
    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    fn compile(selector: &str) -> Result<Selector, PageError> {
        Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))
    }

    fn elements(doc: &Html) -> Vec<ElementRef<'_>> {
        doc.tree.root().descendants().filter_map(ElementRef::wrap).collect()
    }

    /// Run `f` against a live element, failing if the DOM changed since it was found
    fn with_element<R>(
        &self,
        element: &FixtureElement,
        f: impl FnOnce(&ElementRef<'_>) -> R,
    ) -> Result<R, PageError> {
        let state = self.state.lock().unwrap();
        if element.dom_version != state.dom_version {
            return Err(PageError::StaleElement);
        }
        let doc = Html::parse_document(&state.html);
        let all = Self::elements(&doc);
        let found = all.get(element.index).ok_or(PageError::StaleElement)?;
        Ok(f(found))
    }
}

#[async_trait]
impl Page for FixturePage {
    type Element = FixtureElement;

    fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.state.lock().unwrap().navigate(url);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn source(&self) -> Result<String, PageError> {
        Ok(self.state.lock().unwrap().html.clone())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<FixtureElement>, PageError> {
        let compiled = Self::compile(selector)?;
        let state = self.state.lock().unwrap();
        let doc = Html::parse_document(&state.html);
        Ok(Self::elements(&doc)
            .iter()
            .enumerate()
            .filter(|(_, e)| compiled.matches(e))
            .map(|(index, _)| FixtureElement {
                dom_version: state.dom_version,
                index,
            })
            .collect())
    }

    async fn find_within(
        &self,
        scope: &FixtureElement,
        selector: &str,
    ) -> Result<Vec<FixtureElement>, PageError> {
        let compiled = Self::compile(selector)?;
        let state = self.state.lock().unwrap();
        if scope.dom_version != state.dom_version {
            return Err(PageError::StaleElement);
        }
        let doc = Html::parse_document(&state.html);
        let all = Self::elements(&doc);
        let scope_id = all.get(scope.index).ok_or(PageError::StaleElement)?.id();
        Ok(all
            .iter()
            .enumerate()
            .filter(|(_, e)| compiled.matches(e) && e.ancestors().any(|a| a.id() == scope_id))
            .map(|(index, _)| FixtureElement {
                dom_version: state.dom_version,
                index,
            })
            .collect())
    }

    async fn attr(&self, element: &FixtureElement, name: &str) -> Result<Option<String>, PageError> {
        self.with_element(element, |e| e.value().attr(name).map(str::to_string))
    }

    async fn text(&self, element: &FixtureElement) -> Result<String, PageError> {
        self.with_element(element, element_text)
    }

    async fn is_enabled(&self, element: &FixtureElement) -> Result<bool, PageError> {
        self.with_element(element, |e| e.value().attr("disabled").is_none())
    }

    async fn is_displayed(&self, element: &FixtureElement) -> Result<bool, PageError> {
        self.with_element(element, |e| {
            let style = e.value().attr("style").unwrap_or("").replace(' ', "");
            !style.contains("display:none") && !style.contains("visibility:hidden")
        })
    }

    async fn click(&self, element: &FixtureElement) -> Result<(), PageError> {
        let (label, disabled) = self.with_element(element, |e| {
            let label = e
                .value()
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| e.value().name().to_string());
            (label, e.value().attr("disabled").is_some())
        })?;

        let mut state = self.state.lock().unwrap();
        state.clicks.push(label);
        if disabled {
            return Ok(());
        }

        let doc = Html::parse_document(&state.html);
        let all = Self::elements(&doc);
        let clicked = all[element.index];
        let reaction = state
            .reactions
            .iter()
            .find(|(selector, _)| {
                Selector::parse(selector)
                    .map(|s| s.matches(&clicked))
                    .unwrap_or(false)
            })
            .map(|(_, reaction)| reaction.clone());
        drop(all);
        drop(doc);

        match reaction {
            Some(Reaction::Replace(html)) => {
                state.html = html;
                state.dom_version += 1;
            }
            Some(Reaction::Navigate(url)) => state.navigate(&url),
            None => {}
        }
        Ok(())
    }

    async fn scroll_into_view(&self, element: &FixtureElement) -> Result<(), PageError> {
        self.with_element(element, |_| ())
    }

    async fn closest_attr(
        &self,
        element: &FixtureElement,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.with_element(element, |e| {
            e.value().attr(name).map(str::to_string).or_else(|| {
                e.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find_map(|a| a.value().attr(name).map(str::to_string))
            })
        })
    }
}
