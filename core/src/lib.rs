//! Synchronous client for the Tiny Tiny RSS JSON API.
//!
//! # Overview
//! `TtRssClient` builds `HttpRequest` values and parses `HttpResponse`
//! values without touching the network. `Session` logs in, holds the
//! session id, and exposes one method per remote operation, executing each
//! round-trip through a `Transport` (`UreqTransport` by default).
//!
//! # Design
//! - Every operation is a POST of `{op, sid, ...}` to one endpoint; the
//!   reply's `content` is returned as-is or deserialized into a record type.
//! - Error envelopes (`content.error`) become `ApiError::Api`, kept apart
//!   from transport failures.
//! - Record types name the keys the client relies on and keep the rest in
//!   an `extra` map, so newer server fields survive.

pub mod client;
pub mod error;
pub mod http;
pub mod session;
pub mod types;

pub use client::{ApiRequest, TtRssClient};
pub use error::{ApiError, RemoteError};
pub use http::{HttpRequest, HttpResponse, Transport, UreqTransport, DEFAULT_TIMEOUT};
pub use session::{FeedCredentials, Session, SessionOptions, DEFAULT_COUNTER_MODE};
pub use types::{
    cat_id, feed_id, ArticleField, ArticleIds, Category, CategoryStat, Feed, FeedTree, FeedsQuery, HeadlinesQuery,
    Label, NodeId, OrderBy, SearchMode, ServerConfig, TreeNode, TreeRoot, UpdateMode, ViewMode,
};
