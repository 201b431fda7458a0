//! Authenticated session against a Tiny Tiny RSS server.
//!
//! # Design
//! A `Session` is created by logging in and owns the resulting session id.
//! Every method is one round-trip: build the request, hand it to the
//! transport, parse the envelope. Nothing is validated locally; a call made
//! after `logout` goes out with an empty `sid` and the server's
//! `NOT_LOGGED_IN` comes back as `ApiError::Api`.
//!
//! Server version and API level never change for a running server, so they
//! are fetched at most once per session.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{ApiRequest, TtRssClient};
use crate::error::{ApiError, RemoteError};
use crate::http::{Transport, UreqTransport};
use crate::types::{
    de_count, ArticleField, ArticleIds, Category, Feed, FeedTree, FeedsQuery, HeadlinesQuery, Label, ServerConfig,
    UpdateMode,
};

/// Counter groups requested by default from `getCounters`: feeds, labels,
/// categories.
pub const DEFAULT_COUNTER_MODE: &str = "flc";

/// Behaviour switches for a `Session`.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Re-fetch labels for every affected article after `set_article_label`.
    /// Servers up to 1.15 drop their label cache for those articles and
    /// `getHeadlines` reports no labels until `getLabels` regenerates it.
    pub refresh_labels_after_assign: bool,
}

/// Feed-side credentials for `subscribeToFeed` on password-protected feeds.
#[derive(Debug, Clone)]
pub struct FeedCredentials {
    pub login: String,
    pub password: String,
}

#[derive(Deserialize)]
struct LoginContent {
    session_id: String,
    #[serde(default)]
    api_level: Option<u32>,
}

#[derive(Deserialize)]
struct LevelContent {
    level: u32,
}

#[derive(Deserialize)]
struct VersionContent {
    version: String,
}

#[derive(Deserialize)]
struct StatusContent {
    status: bool,
}

#[derive(Deserialize)]
struct UnreadContent {
    #[serde(deserialize_with = "de_count")]
    unread: u64,
}

#[derive(Deserialize)]
struct UpdatedContent {
    #[serde(deserialize_with = "de_count")]
    updated: u64,
}

pub struct Session<T: Transport = UreqTransport> {
    client: TtRssClient,
    transport: T,
    sid: String,
    options: SessionOptions,
    version: OnceLock<String>,
    api_level: OnceLock<u32>,
}

impl Session<UreqTransport> {
    /// Log in over HTTP with the default timeout.
    pub fn connect(endpoint: &str, user: &str, password: &str) -> Result<Self, ApiError> {
        Self::login(UreqTransport::new(), endpoint, user, password)
    }
}

impl<T: Transport> Session<T> {
    /// Log in and return the authenticated session.
    ///
    /// Fails with `ApiError::Api(RemoteError::LoginError)` on bad
    /// credentials and `ApiDisabled` when API access is off for the account.
    pub fn login(transport: T, endpoint: &str, user: &str, password: &str) -> Result<Self, ApiError> {
        Self::login_with_options(transport, endpoint, user, password, SessionOptions::default())
    }

    pub fn login_with_options(
        transport: T,
        endpoint: &str,
        user: &str,
        password: &str,
        options: SessionOptions,
    ) -> Result<Self, ApiError> {
        let mut session = Self {
            client: TtRssClient::new(endpoint),
            transport,
            sid: String::new(),
            options,
            version: OnceLock::new(),
            api_level: OnceLock::new(),
        };

        let content: LoginContent = session.call_as(&ApiRequest::Login {
            user: user.to_string(),
            password: password.to_string(),
        })?;
        if content.session_id.is_empty() {
            return Err(ApiError::Deserialization("login returned an empty session id".to_string()));
        }
        if let Some(level) = content.api_level {
            let _ = session.api_level.set(level);
        }
        session.sid = content.session_id;
        tracing::info!(endpoint = %session.client.endpoint(), user, "Logged in");
        Ok(session)
    }

    /// Close the remote session. The local token is cleared even when the
    /// server call fails, so the session is unusable afterwards either way.
    pub fn logout(&mut self) -> Result<(), ApiError> {
        let result = self.call(&ApiRequest::Logout);
        self.sid.clear();
        match result {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote logout failed; session id discarded");
                Err(e)
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.sid
    }

    pub fn has_token(&self) -> bool {
        !self.sid.is_empty()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Send any request with the current session id and return the raw
    /// `content` of the reply.
    pub fn call(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        tracing::debug!(op = request.op(), "Calling API");
        let http_request = self.client.build(&self.sid, request)?;
        let response = self.transport.execute(http_request)?;
        self.client.parse(response).inspect_err(|e| {
            tracing::debug!(op = request.op(), error = %e, "API call failed");
        })
    }

    fn call_as<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, ApiError> {
        let content = self.call(request)?;
        serde_json::from_value(content).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Server info
    // -----------------------------------------------------------------------

    /// API level, fetched once. Servers older than 1.5.8 do not know
    /// `getApiLevel`; those report level 0.
    pub fn api_level(&self) -> Result<u32, ApiError> {
        if let Some(level) = self.api_level.get() {
            return Ok(*level);
        }
        let level = match self.call_as::<LevelContent>(&ApiRequest::GetApiLevel) {
            Ok(content) => content.level,
            Err(ApiError::Api(RemoteError::UnknownMethod)) => 0,
            Err(e) => return Err(e),
        };
        Ok(*self.api_level.get_or_init(|| level))
    }

    /// Server version string, fetched once.
    pub fn version(&self) -> Result<String, ApiError> {
        if let Some(version) = self.version.get() {
            return Ok(version.clone());
        }
        let content: VersionContent = self.call_as(&ApiRequest::GetVersion)?;
        Ok(self.version.get_or_init(|| content.version).clone())
    }

    /// Whether the server still considers this session logged in.
    pub fn is_logged_in(&self) -> Result<bool, ApiError> {
        let content: StatusContent = self.call_as(&ApiRequest::IsLoggedIn)?;
        Ok(content.status)
    }

    pub fn config(&self) -> Result<ServerConfig, ApiError> {
        self.call_as(&ApiRequest::GetConfig)
    }

    pub fn pref(&self, pref_name: &str) -> Result<Value, ApiError> {
        self.call(&ApiRequest::GetPref {
            pref_name: pref_name.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Counters, feeds, categories
    // -----------------------------------------------------------------------

    /// Global unread article count.
    pub fn unread(&self) -> Result<u64, ApiError> {
        let content: UnreadContent = self.call_as(&ApiRequest::GetUnread)?;
        Ok(content.unread)
    }

    /// Unread counters per feed group. `output_mode` is a string of
    /// `f` (feeds), `l` (labels), `c` (categories), `t` (tags).
    pub fn counters(&self, output_mode: &str) -> Result<Value, ApiError> {
        self.call(&ApiRequest::GetCounters {
            output_mode: output_mode.to_string(),
        })
    }

    pub fn feed_tree(&self, include_empty: bool) -> Result<FeedTree, ApiError> {
        self.call_as(&ApiRequest::GetFeedTree { include_empty })
    }

    pub fn feeds(&self, query: &FeedsQuery) -> Result<Vec<Feed>, ApiError> {
        self.call_as(&ApiRequest::GetFeeds(query.clone()))
    }

    /// In nested mode only top-level categories are listed, with unread
    /// counts rolled up from their children.
    pub fn categories(
        &self,
        unread_only: bool,
        enable_nested: bool,
        include_empty: bool,
    ) -> Result<Vec<Category>, ApiError> {
        self.call_as(&ApiRequest::GetCategories {
            unread_only,
            enable_nested,
            include_empty,
        })
    }

    /// Synchronous server-side refresh of one feed. Can take as long as the
    /// upstream site does to answer.
    pub fn update_feed(&self, feed_id: i64) -> Result<Value, ApiError> {
        self.call(&ApiRequest::UpdateFeed { feed_id })
    }

    /// Mark every article in a feed (or category, if `is_cat`) read.
    pub fn catchup_feed(&self, feed_id: i64, is_cat: bool) -> Result<Value, ApiError> {
        self.call(&ApiRequest::CatchupFeed { feed_id, is_cat })
    }

    pub fn subscribe_to_feed(&self, feed_url: &str, category_id: i64) -> Result<Value, ApiError> {
        self.subscribe_to_feed_with(feed_url, category_id, None)
    }

    /// Subscribe, optionally passing credentials for the feed itself. The
    /// returned status code is server-defined.
    pub fn subscribe_to_feed_with(
        &self,
        feed_url: &str,
        category_id: i64,
        credentials: Option<&FeedCredentials>,
    ) -> Result<Value, ApiError> {
        self.call(&ApiRequest::SubscribeToFeed {
            feed_url: feed_url.to_string(),
            category_id,
            login: credentials.map(|c| c.login.clone()),
            password: credentials.map(|c| c.password.clone()),
        })
    }

    pub fn unsubscribe_feed(&self, feed_id: i64) -> Result<Value, ApiError> {
        self.call(&ApiRequest::UnsubscribeFeed { feed_id })
    }

    // -----------------------------------------------------------------------
    // Articles
    // -----------------------------------------------------------------------

    /// Headlines for a feed. The shape depends on `include_header`: a list
    /// of articles, or `[header, [articles]]`.
    pub fn headlines(&self, query: &HeadlinesQuery) -> Result<Value, ApiError> {
        self.call(&ApiRequest::GetHeadlines(query.clone()))
    }

    /// Full article objects for one or more ids.
    pub fn article(&self, ids: impl Into<ArticleIds>) -> Result<Value, ApiError> {
        self.call(&ApiRequest::GetArticle { article_id: ids.into() })
    }

    /// Change one field on the given articles and return how many were
    /// actually modified. `note` is only meaningful with `ArticleField::Note`.
    pub fn update_article(
        &self,
        ids: impl Into<ArticleIds>,
        mode: UpdateMode,
        field: ArticleField,
        note: Option<&str>,
    ) -> Result<u64, ApiError> {
        let content: UpdatedContent = self.call_as(&ApiRequest::UpdateArticle {
            article_ids: ids.into(),
            mode,
            field,
            data: note.map(str::to_string),
        })?;
        Ok(content.updated)
    }

    pub fn share_to_published(&self, title: &str, url: &str, content: &str) -> Result<Value, ApiError> {
        self.call(&ApiRequest::ShareToPublished {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    /// All configured labels; `checked` is set on those carried by
    /// `article_id` (0 checks none).
    pub fn labels(&self, article_id: i64) -> Result<Vec<Label>, ApiError> {
        self.call_as(&ApiRequest::GetLabels { article_id })
    }

    /// Assign or remove a label and return the number of articles updated.
    ///
    /// Previously fetched `Label::checked` values for these articles are
    /// stale afterwards. With `refresh_labels_after_assign` set, labels are
    /// re-fetched per article so the server rebuilds its label cache.
    pub fn set_article_label(
        &self,
        ids: impl Into<ArticleIds>,
        label_id: i64,
        assign: bool,
    ) -> Result<u64, ApiError> {
        let ids = ids.into();
        let content: UpdatedContent = self.call_as(&ApiRequest::SetArticleLabel {
            article_ids: ids.clone(),
            label_id,
            assign,
        })?;

        if self.options.refresh_labels_after_assign {
            for &article_id in ids.ids() {
                self.labels(article_id)?;
            }
            tracing::debug!(articles = ids.ids().len(), "Refreshed label cache");
        }
        Ok(content.updated)
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.client.endpoint())
            .field("sid", &if self.sid.is_empty() { "" } else { "[REDACTED]" })
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use crate::http::{HttpRequest, HttpResponse};
    use serde_json::json;

    /// Replays canned bodies in order and records every request body.
    struct Scripted {
        replies: RefCell<VecDeque<&'static str>>,
        seen: RefCell<Vec<Value>>,
    }

    impl Scripted {
        fn new(replies: &[&'static str]) -> Self {
            Self {
                replies: RefCell::new(replies.iter().copied().collect()),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn ops(&self) -> Vec<String> {
            self.seen.borrow().iter().map(|b| b["op"].as_str().unwrap().to_string()).collect()
        }

        fn handle(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.seen.borrow_mut().push(serde_json::from_str(&request.body).unwrap());
            let body = self.replies.borrow_mut().pop_front().expect("unexpected request");
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: body.to_string(),
            })
        }

        fn transport(&self) -> impl Fn(HttpRequest) -> Result<HttpResponse, ApiError> + '_ {
            move |request| self.handle(request)
        }
    }

    const LOGIN_OK: &str = r#"{"seq":0,"status":0,"content":{"session_id":"abc"}}"#;

    #[test]
    fn login_then_unread() {
        let server = Scripted::new(&[LOGIN_OK, r#"{"seq":0,"status":0,"content":{"unread":"7"}}"#]);
        let session = Session::login(server.transport(), "http://stub/api/", "admin", "pw").unwrap();
        assert_eq!(session.session_id(), "abc");
        assert_eq!(session.unread().unwrap(), 7);

        let seen = server.seen.borrow();
        assert_eq!(seen[0], json!({"op": "login", "sid": "", "user": "admin", "password": "pw"}));
        assert_eq!(seen[1], json!({"op": "getUnread", "sid": "abc"}));
    }

    #[test]
    fn rejected_login_is_an_api_error() {
        let server = Scripted::new(&[r#"{"seq":0,"status":1,"content":{"error":"LOGIN_ERROR"}}"#]);
        let err = Session::login(server.transport(), "http://stub/api/", "admin", "wrong").unwrap_err();
        assert!(matches!(err, ApiError::Api(RemoteError::LoginError)));
    }

    #[test]
    fn closure_transport_works() {
        let transport = |_req: HttpRequest| {
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: LOGIN_OK.to_string(),
            })
        };
        let session = Session::login(transport, "http://stub/api/", "u", "p").unwrap();
        assert!(session.has_token());
    }

    #[test]
    fn login_seeds_api_level() {
        let server = Scripted::new(&[r#"{"content":{"session_id":"abc","api_level":15}}"#]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        assert_eq!(session.api_level().unwrap(), 15);
        assert_eq!(server.ops(), vec!["login"]);
    }

    #[test]
    fn version_and_level_are_fetched_once() {
        let server = Scripted::new(&[
            LOGIN_OK,
            r#"{"content":{"version":"21.06"}}"#,
            r#"{"content":{"level":14}}"#,
        ]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        for _ in 0..3 {
            assert_eq!(session.version().unwrap(), "21.06");
            assert_eq!(session.api_level().unwrap(), 14);
        }
        assert_eq!(server.ops(), vec!["login", "getVersion", "getApiLevel"]);
    }

    #[test]
    fn old_servers_report_level_zero() {
        let server = Scripted::new(&[LOGIN_OK, r#"{"content":{"error":"UNKNOWN_METHOD"}}"#]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        assert_eq!(session.api_level().unwrap(), 0);
    }

    #[test]
    fn logout_clears_token_even_on_failure() {
        let server = Scripted::new(&[LOGIN_OK, r#"{"content":{"error":"NOT_LOGGED_IN"}}"#]);
        let mut session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        assert!(session.logout().is_err());
        assert!(!session.has_token());
    }

    #[test]
    fn label_refresh_is_opt_in() {
        let server = Scripted::new(&[
            LOGIN_OK,
            r#"{"content":{"status":"OK","updated":2}}"#,
            r#"{"content":[]}"#,
            r#"{"content":[]}"#,
        ]);
        let options = SessionOptions {
            refresh_labels_after_assign: true,
        };
        let session =
            Session::login_with_options(server.transport(), "http://stub/api/", "u", "p", options).unwrap();
        assert_eq!(session.set_article_label([10, 11], 1, true).unwrap(), 2);
        assert_eq!(server.ops(), vec!["login", "setArticleLabel", "getLabels", "getLabels"]);
        assert_eq!(server.seen.borrow()[3]["article_id"], 11);
    }

    #[test]
    fn label_assignment_without_refresh() {
        let server = Scripted::new(&[LOGIN_OK, r#"{"content":{"status":"OK","updated":1}}"#]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        assert_eq!(session.set_article_label(10, 1, false).unwrap(), 1);
        assert_eq!(server.ops(), vec!["login", "setArticleLabel"]);
    }

    #[test]
    fn update_reply_without_count_is_malformed() {
        let server = Scripted::new(&[LOGIN_OK, r#"{"content":{"status":"OK"}}"#]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        let err = session
            .update_article(10, UpdateMode::Set, ArticleField::Starred, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)), "{err:?}");
    }

    #[test]
    fn debug_redacts_session_id() {
        let server = Scripted::new(&[LOGIN_OK]);
        let session = Session::login(server.transport(), "http://stub/api/", "u", "p").unwrap();
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("abc"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
