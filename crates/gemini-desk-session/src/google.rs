use std::cell::{Cell, RefCell};

use gemini_desk_types::ChatError;

use crate::backend::WorkspaceBackend;

/// Whether the user has linked a Google account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoogleStatus {
    #[default]
    Unknown,
    Connected,
    NotConnected,
}

impl GoogleStatus {
    pub fn button_label(&self) -> &'static str {
        match self {
            GoogleStatus::Connected => "Connected",
            GoogleStatus::NotConnected | GoogleStatus::Unknown => "Connect Google Account",
        }
    }
}

pub trait ConnectView {
    fn show_status(&mut self, status: GoogleStatus);
}

/// State behind the "Connect Google Account" button
pub struct GoogleAccount<B: WorkspaceBackend, V: ConnectView> {
    backend: B,
    view: RefCell<V>,
    status: Cell<GoogleStatus>,
    /// Consent URL fetched ahead of the click that opens it
    auth_url: RefCell<Option<String>>,
}

impl<B: WorkspaceBackend, V: ConnectView> GoogleAccount<B, V> {
    pub fn new(backend: B, view: V) -> Self {
        Self {
            backend,
            view: RefCell::new(view),
            status: Cell::new(GoogleStatus::Unknown),
            auth_url: RefCell::new(None),
        }
    }

    pub fn status(&self) -> GoogleStatus {
        self.status.get()
    }

    pub fn view(&self) -> std::cell::Ref<'_, V> {
        self.view.borrow()
    }

    /// Ask the backend whether a token is stored and update the button.
    /// Unless connected, the consent URL is fetched too so a click can open
    /// it straight away.
    pub async fn refresh(&self) -> GoogleStatus {
        let status = match self.backend.check_google_integration().await {
            Ok(true) => GoogleStatus::Connected,
            Ok(false) => GoogleStatus::NotConnected,
            Err(e) => {
                log::error!("Failed to check Google integration: {}", e);
                GoogleStatus::Unknown
            }
        };
        self.status.set(status);
        self.view.borrow_mut().show_status(status);

        if status != GoogleStatus::Connected {
            if let Err(e) = self.prepare_authorization_url().await {
                log::error!("Failed to get Google authorization URL: {}", e);
            }
        }
        status
    }

    /// Fetch the consent URL and keep it for [`prepared_authorization_url`]
    ///
    /// [`prepared_authorization_url`]: Self::prepared_authorization_url
    pub async fn prepare_authorization_url(&self) -> Result<String, ChatError> {
        let url = self.authorization_url().await?;
        *self.auth_url.borrow_mut() = Some(url.clone());
        Ok(url)
    }

    /// The consent URL fetched by the last successful prepare, if any
    pub fn prepared_authorization_url(&self) -> Option<String> {
        self.auth_url.borrow().clone()
    }

    /// URL of the OAuth consent screen; only http(s) URLs are accepted
    pub async fn authorization_url(&self) -> Result<String, ChatError> {
        let url = self.backend.get_auth_url().await?;
        let url = url.trim();
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return Err(ChatError::protocol("authorization URL is not an http(s) URL"));
        }
        Ok(url.to_string())
    }
}
