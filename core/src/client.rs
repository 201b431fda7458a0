//! Stateless request builder and response parser for the Tiny Tiny RSS API.
//!
//! # Design
//! `TtRssClient` holds only the endpoint URL. Every operation is an
//! `ApiRequest` variant; `build` turns one into an `HttpRequest` carrying
//! `{op, sid, ...fields}` and `parse` unwraps the `{content}` envelope of the
//! reply. The round-trip itself happens elsewhere (see `Transport`), so this
//! module is deterministic and tested without a server.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, RemoteError};
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{ArticleField, ArticleIds, FeedsQuery, HeadlinesQuery, UpdateMode};

/// One remote operation and its parameters.
///
/// Serializes to the request body minus `sid`: the variant name becomes the
/// `op` field, the variant's fields sit beside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ApiRequest {
    Login {
        user: String,
        password: String,
    },
    Logout,
    GetApiLevel,
    GetVersion,
    IsLoggedIn,
    GetUnread,
    GetCounters {
        output_mode: String,
    },
    GetFeedTree {
        include_empty: bool,
    },
    GetFeeds(FeedsQuery),
    GetCategories {
        unread_only: bool,
        enable_nested: bool,
        include_empty: bool,
    },
    GetHeadlines(HeadlinesQuery),
    UpdateArticle {
        article_ids: ArticleIds,
        mode: UpdateMode,
        field: ArticleField,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    GetArticle {
        article_id: ArticleIds,
    },
    GetConfig,
    UpdateFeed {
        feed_id: i64,
    },
    GetPref {
        pref_name: String,
    },
    CatchupFeed {
        feed_id: i64,
        is_cat: bool,
    },
    GetLabels {
        article_id: i64,
    },
    SetArticleLabel {
        article_ids: ArticleIds,
        label_id: i64,
        assign: bool,
    },
    ShareToPublished {
        title: String,
        url: String,
        content: String,
    },
    SubscribeToFeed {
        feed_url: String,
        category_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        login: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    UnsubscribeFeed {
        feed_id: i64,
    },
}

impl ApiRequest {
    /// The remote method name, as sent in `op`.
    pub fn op(&self) -> &'static str {
        match self {
            ApiRequest::Login { .. } => "login",
            ApiRequest::Logout => "logout",
            ApiRequest::GetApiLevel => "getApiLevel",
            ApiRequest::GetVersion => "getVersion",
            ApiRequest::IsLoggedIn => "isLoggedIn",
            ApiRequest::GetUnread => "getUnread",
            ApiRequest::GetCounters { .. } => "getCounters",
            ApiRequest::GetFeedTree { .. } => "getFeedTree",
            ApiRequest::GetFeeds(_) => "getFeeds",
            ApiRequest::GetCategories { .. } => "getCategories",
            ApiRequest::GetHeadlines(_) => "getHeadlines",
            ApiRequest::UpdateArticle { .. } => "updateArticle",
            ApiRequest::GetArticle { .. } => "getArticle",
            ApiRequest::GetConfig => "getConfig",
            ApiRequest::UpdateFeed { .. } => "updateFeed",
            ApiRequest::GetPref { .. } => "getPref",
            ApiRequest::CatchupFeed { .. } => "catchupFeed",
            ApiRequest::GetLabels { .. } => "getLabels",
            ApiRequest::SetArticleLabel { .. } => "setArticleLabel",
            ApiRequest::ShareToPublished { .. } => "shareToPublished",
            ApiRequest::SubscribeToFeed { .. } => "subscribeToFeed",
            ApiRequest::UnsubscribeFeed { .. } => "unsubscribeFeed",
        }
    }
}

/// Synchronous, stateless client for the Tiny Tiny RSS JSON API.
#[derive(Debug, Clone)]
pub struct TtRssClient {
    endpoint: String,
}

impl TtRssClient {
    /// `endpoint` is the full API URL, e.g. `https://host/tt-rss/api/`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string() + "/",
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build(&self, sid: &str, request: &ApiRequest) -> Result<HttpRequest, ApiError> {
        let mut body = match serde_json::to_value(request) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(ApiError::Serialization(format!("expected an object, got {other}")));
            }
            Err(e) => return Err(ApiError::Serialization(e.to_string())),
        };
        body.insert("sid".to_string(), Value::String(sid.to_string()));

        let body = serde_json::to_string(&body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            url: self.endpoint.clone(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        })
    }

    /// Unwrap the response envelope and return `content` unmodified.
    pub fn parse(&self, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response)?;
        let envelope: Value =
            serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;

        let Value::Object(mut envelope) = envelope else {
            return Err(ApiError::Deserialization("response is not a JSON object".to_string()));
        };
        if let Some(code) = error_code(envelope.get("error")) {
            return Err(ApiError::Api(code));
        }
        let content = envelope
            .remove("content")
            .ok_or_else(|| ApiError::Deserialization("response has no content field".to_string()))?;
        if let Some(code) = error_code(content.get("error")) {
            return Err(ApiError::Api(code));
        }
        Ok(content)
    }

    /// `parse` followed by deserialization of `content` into `T`.
    pub fn parse_as<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        let content = self.parse(response)?;
        serde_json::from_value(content).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Error codes are strings in every known release; newer ones also send
/// `{"error": {"code": ...}}` objects.
fn error_code(value: Option<&Value>) -> Option<RemoteError> {
    match value? {
        Value::String(code) => Some(RemoteError::from_code(code)),
        Value::Object(obj) => obj.get("code").and_then(Value::as_str).map(RemoteError::from_code),
        _ => None,
    }
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 200 {
        return Ok(());
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
