//! Where the client is: page URL, derived endpoints, and navigation.
//!
//! A browser client reads its location from the address bar and navigates
//! by assigning to it. Here the location is a parsed [`PageLocation`] and
//! navigation side effects go through the [`PageHost`] trait, so the event
//! loop never touches global state.

use pulse_types::SessionToken;
use reqwest::Url;
use tracing::info;

use crate::error::ClientError;

/// Path of the duplex endpoint on the page's host.
pub const WEBSOCKET_PATH: &str = "/ws";

/// Path the presenter posts to when advancing the slide.
pub const NEXT_SLIDE_PATH: &str = "/nextSlide";

/// Prefix of the participant survey view.
const SURVEY_PREFIX: &str = "/survey/";

/// Parsed page URL the client was started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    /// Parse an `http` or `https` page URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Url`] if the URL does not parse, uses another
    /// scheme, or has no host.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let url = Url::parse(raw).map_err(|e| ClientError::Url(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Url(format!(
                "{raw}: unsupported scheme {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ClientError::Url(format!("{raw}: missing host")));
        }
        Ok(Self { url })
    }

    /// Path component, e.g. `/survey/abc123`.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Session token from the trailing path segment.
    pub fn token(&self) -> SessionToken {
        SessionToken::from_path(self.path())
    }

    /// Host plus explicit port, if any.
    fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// `scheme://host[:port]` of the page.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.url.scheme(), self.authority())
    }

    /// Duplex endpoint on the same host: `wss` for `https` pages, `ws`
    /// otherwise.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.url.scheme() == "https" { "wss" } else { "ws" };
        format!("{scheme}://{}{WEBSOCKET_PATH}", self.authority())
    }

    /// Presenter endpoint on the same origin.
    pub fn next_slide_url(&self) -> String {
        format!("{}{NEXT_SLIDE_PATH}", self.origin())
    }
}

/// Whether a path shows the results view.
///
/// Matches `results` anywhere after the first character.
pub fn is_results_view(path: &str) -> bool {
    path.find("results").is_some_and(|idx| idx > 0)
}

/// History entry to rewrite to on load, if any.
///
/// Only survey pages are rewritten, and only when the path is not already
/// the canonical `/survey/{token}`.
pub fn rewrite_target(path: &str, token: &SessionToken) -> Option<String> {
    if token.is_empty() || !path.starts_with(SURVEY_PREFIX) {
        return None;
    }
    let canonical = token.survey_path();
    (path != canonical).then_some(canonical)
}

/// Navigation and notification side effects of the page.
pub trait PageHost: Send {
    /// Path currently shown.
    fn current_path(&self) -> String;

    /// Leave for another path.
    fn navigate(&mut self, path: &str);

    /// Reload the current path.
    fn reload(&mut self);

    /// Rewrite the address bar without loading anything.
    fn replace_path(&mut self, path: &str);

    /// Show a blocking notice to the user.
    fn alert(&mut self, message: &str);
}

/// A side effect requested of a [`LoggingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    /// Navigated to a path.
    Navigate(String),
    /// Reloaded the current path.
    Reload,
    /// Rewrote the address bar.
    ReplacePath(String),
    /// Showed an alert.
    Alert(String),
}

/// Headless page host: tracks the current path and logs every side effect.
#[derive(Debug, Clone)]
pub struct LoggingHost {
    path: String,
    actions: Vec<PageAction>,
}

impl LoggingHost {
    /// Start on `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            actions: Vec::new(),
        }
    }

    /// Side effects requested so far, oldest first.
    pub fn actions(&self) -> &[PageAction] {
        &self.actions
    }
}

impl PageHost for LoggingHost {
    fn current_path(&self) -> String {
        self.path.clone()
    }

    fn navigate(&mut self, path: &str) {
        info!(from = %self.path, to = path, "navigating");
        path.clone_into(&mut self.path);
        self.actions.push(PageAction::Navigate(path.to_owned()));
    }

    fn reload(&mut self) {
        info!(path = %self.path, "reloading page");
        self.actions.push(PageAction::Reload);
    }

    fn replace_path(&mut self, path: &str) {
        info!(from = %self.path, to = path, "rewriting address bar");
        path.clone_into(&mut self.path);
        self.actions.push(PageAction::ReplacePath(path.to_owned()));
    }

    fn alert(&mut self, message: &str) {
        info!(text = message, "alert shown");
        self.actions.push(PageAction::Alert(message.to_owned()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_follows_page_scheme() {
        let page = PageLocation::parse("http://localhost:8000/survey/abc").unwrap();
        assert_eq!(page.websocket_url(), "ws://localhost:8000/ws");

        let page = PageLocation::parse("https://pulse.example/results/abc").unwrap();
        assert_eq!(page.websocket_url(), "wss://pulse.example/ws");
        assert_eq!(page.next_slide_url(), "https://pulse.example/nextSlide");
    }

    #[test]
    fn rejects_non_http_pages() {
        assert!(matches!(
            PageLocation::parse("ftp://pulse.example/"),
            Err(ClientError::Url(_))
        ));
        assert!(PageLocation::parse("not a url").is_err());
    }

    #[test]
    fn token_is_trailing_segment() {
        let page = PageLocation::parse("http://localhost:8000/survey/abc123").unwrap();
        assert_eq!(page.token().as_str(), "abc123");
    }

    #[test]
    fn results_view_detection() {
        assert!(is_results_view("/results/abc"));
        assert!(is_results_view("/presenter/results"));
        assert!(!is_results_view("/survey/abc"));
        assert!(!is_results_view("results"));
    }

    #[test]
    fn rewrite_only_noncanonical_survey_paths() {
        let token = SessionToken::from_path("/survey/abc");
        assert_eq!(rewrite_target("/survey/abc", &token), None);
        assert_eq!(
            rewrite_target("/survey/x/abc", &token),
            Some(String::from("/survey/abc"))
        );
        assert_eq!(rewrite_target("/results/abc", &token), None);
        assert_eq!(rewrite_target("/survey/", &SessionToken::default()), None);
    }

    #[test]
    fn logging_host_tracks_path() {
        let mut host = LoggingHost::new("/results/abc");
        host.navigate("/survey/abc");
        host.reload();
        assert_eq!(host.current_path(), "/survey/abc");
        assert_eq!(
            host.actions(),
            &[
                PageAction::Navigate(String::from("/survey/abc")),
                PageAction::Reload
            ]
        );
    }
}
