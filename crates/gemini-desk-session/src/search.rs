use std::cell::{Cell, Ref, RefCell};

use gemini_desk_types::{ChatError, SearchHit, SearchQuery, SearchResults};

use crate::backend::WorkspaceBackend;
use crate::render::{escape_html, safe_url};

pub trait SearchView {
    fn set_busy(&mut self, busy: bool);

    /// Replace the results area. `html` is already escaped.
    fn show_html(&mut self, html: &str);
}

/// The desk search page: one query box over documents, Drive, Gmail and
/// tasks. A newer search supersedes one still in flight.
pub struct SearchPanel<B: WorkspaceBackend, V: SearchView> {
    backend: B,
    view: RefCell<V>,
    generation: Cell<u64>,
}

impl<B: WorkspaceBackend, V: SearchView> SearchPanel<B, V> {
    pub fn new(backend: B, view: V) -> Self {
        Self {
            backend,
            view: RefCell::new(view),
            generation: Cell::new(0),
        }
    }

    pub fn view(&self) -> Ref<'_, V> {
        self.view.borrow()
    }

    pub async fn run(&self, query: SearchQuery) {
        let query = match query.validated() {
            Ok(Some(query)) => query,
            Ok(None) => {
                log::debug!("Ignoring blank search");
                return;
            }
            Err(e) => {
                // Supersedes any search still in flight
                self.generation.set(self.generation.get() + 1);
                let mut view = self.view.borrow_mut();
                view.set_busy(false);
                view.show_html(&error_notice(&e));
                return;
            }
        };

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.view.borrow_mut().set_busy(true);

        log::debug!("Searching {:?} in {:?}", query.query, query.source);
        let result = self.backend.search(&query).await;

        if self.generation.get() != generation {
            log::warn!("Dropping results of superseded search {:?}", query.query);
            return;
        }

        let html = match result {
            Ok(results) => render_results_html(&results),
            Err(e) => {
                log::error!("Search failed: {}", e);
                error_notice(&e)
            }
        };
        let mut view = self.view.borrow_mut();
        view.set_busy(false);
        view.show_html(&html);
    }
}

fn error_notice(error: &ChatError) -> String {
    format!(
        r#"<p class="search-error">Error: {}</p>"#,
        escape_html(&error.to_string())
    )
}

/// Results grouped by source; empty sources are left out
pub fn render_results_html(results: &SearchResults) -> String {
    if results.is_empty() {
        return r#"<p class="search-empty">No results found.</p>"#.to_string();
    }

    let mut html = String::new();
    for (heading, hits) in results.sections() {
        if hits.is_empty() {
            continue;
        }
        html.push_str(&format!(
            r#"<section class="search-section"><h4>{}</h4><ul>"#,
            escape_html(heading)
        ));
        for hit in hits {
            html.push_str(&hit_html(hit));
        }
        html.push_str("</ul></section>");
    }
    html
}

fn hit_html(hit: &SearchHit) -> String {
    let title = escape_html(&hit.display_title());
    let mut html = String::from(r#"<li class="search-hit">"#);
    match hit.url.as_deref().and_then(safe_url) {
        Some(url) => html.push_str(&format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            escape_html(url),
            title
        )),
        None => html.push_str(&format!(r#"<span class="search-title">{}</span>"#, title)),
    }
    if let Some(snippet) = hit.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
        html.push_str(&format!(
            r#"<p class="search-snippet">{}</p>"#,
            escape_html(snippet)
        ));
    }
    html.push_str("</li>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_results_notice() {
        assert_eq!(
            render_results_html(&SearchResults::default()),
            r#"<p class="search-empty">No results found.</p>"#
        );
    }

    #[test]
    fn test_hit_is_escaped_and_unsafe_link_dropped() {
        let hit = SearchHit {
            title: Some("<b>Q3</b>".to_string()),
            url: Some("javascript:alert(1)".to_string()),
            snippet: Some("a & b".to_string()),
            ..Default::default()
        };
        assert_eq!(
            hit_html(&hit),
            r#"<li class="search-hit"><span class="search-title">&lt;b&gt;Q3&lt;/b&gt;</span><p class="search-snippet">a &amp; b</p></li>"#
        );
    }
}
