use std::rc::Rc;

use wasm_bindgen::JsValue;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, KeyboardEvent, MouseEvent};

use gemini_desk_session::{SearchPanel, SearchView};
use gemini_desk_types::{ChatConfig, SearchQuery, SearchSource};

use crate::dom;
use crate::frappe::FrappeClient;
use crate::google_ui;

type Panel = SearchPanel<FrappeClient, DomSearchView>;

pub struct DomSearchView {
    results: Element,
    button: Element,
    spinner: Option<HtmlElement>,
}

impl SearchView for DomSearchView {
    fn set_busy(&mut self, busy: bool) {
        let toggled = if busy {
            self.button.set_attribute("disabled", "disabled")
        } else {
            self.button.remove_attribute("disabled")
        };
        if let Err(e) = toggled {
            log::error!("Failed to toggle search button: {:?}", e);
        }
        if let Some(spinner) = &self.spinner {
            if busy {
                dom::show_element(spinner);
            } else {
                dom::hide_element(spinner);
            }
        }
    }

    fn show_html(&mut self, html: &str) {
        self.results.set_inner_html(html);
    }
}

/// Form fields read on each search
struct SearchForm {
    query: HtmlInputElement,
    source: Option<web_sys::HtmlSelectElement>,
    from_date: Option<HtmlInputElement>,
    to_date: Option<HtmlInputElement>,
}

impl SearchForm {
    fn read(&self) -> SearchQuery {
        let date = |input: &Option<HtmlInputElement>| {
            input
                .as_ref()
                .map(|i| i.value())
                .filter(|v| !v.trim().is_empty())
        };
        SearchQuery {
            query: self.query.value(),
            source: self
                .source
                .as_ref()
                .map(|s| SearchSource::parse(&s.value()))
                .unwrap_or_default(),
            from_date: date(&self.from_date),
            to_date: date(&self.to_date),
        }
    }
}

pub struct SearchApp {
    document: Document,
    client: FrappeClient,
    panel: Rc<Panel>,
}

impl SearchApp {
    pub fn new(config: ChatConfig) -> Result<Self, JsValue> {
        let document = crate::document()?;
        let spinner = match dom::find_element(&document, "searchSpinner") {
            Some(_) => Some(dom::get_html_element_by_id(&document, "searchSpinner")?),
            None => None,
        };
        let view = DomSearchView {
            results: dom::get_element_by_id(&document, "searchResults")?,
            button: dom::get_element_by_id(&document, "searchButton")?,
            spinner,
        };
        let client = FrappeClient::new(config);
        let panel = Rc::new(SearchPanel::new(client.clone(), view));

        Ok(Self {
            document,
            client,
            panel,
        })
    }

    pub fn start(self) -> Result<(), JsValue> {
        let optional_input = |id: &str| match dom::find_element(&self.document, id) {
            Some(_) => dom::get_input_by_id(&self.document, id).map(Some),
            None => Ok(None),
        };
        let source = match dom::find_element(&self.document, "searchSource") {
            Some(_) => Some(dom::get_select_by_id(&self.document, "searchSource")?),
            None => None,
        };
        let form = Rc::new(SearchForm {
            query: dom::get_input_by_id(&self.document, "searchInput")?,
            source,
            from_date: optional_input("searchFromDate")?,
            to_date: optional_input("searchToDate")?,
        });

        let button = dom::get_element_by_id(&self.document, "searchButton")?;
        let panel = self.panel.clone();
        let fields = form.clone();
        dom::add_click_listener(&button, move |event: MouseEvent| {
            event.prevent_default();
            run_search(panel.clone(), fields.read());
        })?;

        let input = dom::get_element_by_id(&self.document, "searchInput")?;
        let panel = self.panel.clone();
        dom::add_listener(&input, "keydown", move |event: KeyboardEvent| {
            if event.key() == "Enter" {
                event.prevent_default();
                run_search(panel.clone(), form.read());
            }
        })?;

        google_ui::mount(&self.document, self.client.clone())
    }
}

fn run_search(panel: Rc<Panel>, query: SearchQuery) {
    wasm_bindgen_futures::spawn_local(async move {
        panel.run(query).await;
    });
}
