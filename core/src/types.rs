//! Value types returned by the API and parameter types accepted by it.
//!
//! # Design
//! Server payloads carry more keys than any one release documents, and
//! different operations fill different subsets of them. Records therefore
//! name the keys the client relies on, keep them optional where some
//! operation omits them, and collect everything else into an `extra` map.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Special ids
// ---------------------------------------------------------------------------

/// Virtual feed ids accepted by `getHeadlines`. Label feeds sit below
/// `LABEL_BASE`.
pub mod feed_id {
    pub const ARCHIVED: i64 = 0;
    pub const STARRED: i64 = -1;
    pub const PUBLISHED: i64 = -2;
    pub const FRESH: i64 = -3;
    pub const ALL_ARTICLES: i64 = -4;
    pub const LABEL_BASE: i64 = -10;

    /// Convert a label's database id to the feed id its articles appear
    /// under. Servers before 1.7.5 report database ids from `getLabels`.
    pub fn from_label_id(label_id: i64) -> i64 {
        -11 - label_id
    }

    pub fn is_label(feed_id: i64) -> bool {
        feed_id < LABEL_BASE
    }
}

/// Special category ids accepted by `getFeeds`.
pub mod cat_id {
    pub const UNCATEGORIZED: i64 = 0;
    pub const SPECIAL: i64 = -1;
    pub const LABELS: i64 = -2;
    pub const ALL_EXCLUDING_VIRTUAL: i64 = -3;
    pub const ALL_INCLUDING_VIRTUAL: i64 = -4;
}

// ---------------------------------------------------------------------------
// Lenient scalars
// ---------------------------------------------------------------------------

/// Counters arrive as numbers from some operations and as strings
/// (`{"unread":"992"}`) from others. Tree and feed listings use `-1` for
/// counts the server did not compute, so those fields are signed.
pub(crate) fn de_count<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count<N> {
        Num(N),
        Str(String),
    }

    match Count::<T>::deserialize(deserializer)? {
        Count::Num(n) => Ok(n),
        Count::Str(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn de_opt_count<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
    T::Err: fmt::Display,
{
    Option::<Value>::deserialize(deserializer)?
        .map(|value| de_count(value).map_err(de::Error::custom))
        .transpose()
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A subscribed feed as returned by `getFeeds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_count")]
    pub unread: Option<i64>,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub cat_id: Option<i64>,
    #[serde(default)]
    pub has_icon: Option<bool>,
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    /// Keys this client does not model, e.g. `is_cat` for nested categories.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feed {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: None,
            unread: None,
            feed_url: None,
            cat_id: None,
            has_icon: None,
            last_updated: None,
            order_id: None,
            extra: Map::new(),
        }
    }

    /// Build a feed from one element of a server response.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Overlay attributes from another response fragment. Keys present in
    /// `attrs` win; keys absent leave the current value alone. `id` is
    /// never changed.
    pub fn merge(&mut self, attrs: &Map<String, Value>) {
        let mut current = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => return,
        };
        for (key, value) in attrs {
            if key != "id" {
                current.insert(key.clone(), value.clone());
            }
        }
        match serde_json::from_value::<Feed>(Value::Object(current)) {
            Ok(merged) => *self = merged,
            Err(e) => tracing::warn!(feed_id = self.id, error = %e, "Ignoring malformed feed attributes"),
        }
    }

    /// True when this entry is a nested category listed by
    /// `getFeeds(include_nested = true)`.
    pub fn is_category(&self) -> bool {
        self.extra.get("is_cat").and_then(Value::as_bool).unwrap_or(false)
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title.as_deref().unwrap_or("?"), self.unread.unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A category as returned by `getCategories`.
///
/// The tree fetch supplies id and title only; counters come from a separate
/// statistics call and are applied with `set_stat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "de_id")]
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "de_count")]
    pub unread: u64,
    #[serde(default)]
    pub order_id: Option<i64>,
}

/// Statistics fragment merged into a `Category` after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryStat {
    #[serde(deserialize_with = "de_count")]
    pub unread: u64,
    #[serde(default)]
    pub order_id: Option<i64>,
}

impl Category {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            unread: 0,
            order_id: None,
        }
    }

    pub fn set_stat(&mut self, stat: &CategoryStat) {
        self.unread = stat.unread;
        if stat.order_id.is_some() {
            self.order_id = stat.order_id;
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.unread)
    }
}

/// Category ids are strings in older `getCategories` responses.
fn de_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(i64),
        Str(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Num(n) => Ok(n),
        Id::Str(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Feed tree
// ---------------------------------------------------------------------------

/// Identifier of a tree node. Categories are tagged `CAT:<n>`; feeds are
/// either plain numbers or `FEED:<n>` depending on server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Category(i64),
    Feed(i64),
}

impl NodeId {
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(n) = raw.strip_prefix("CAT:") {
            return n.parse().ok().map(NodeId::Category);
        }
        let n = raw.strip_prefix("FEED:").unwrap_or(raw);
        n.parse().ok().map(NodeId::Feed)
    }

    pub fn is_category(&self) -> bool {
        matches!(self, NodeId::Category(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Category(n) => write!(f, "CAT:{n}"),
            NodeId::Feed(n) => write!(f, "FEED:{n}"),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match &raw {
            Value::String(s) => NodeId::parse(s),
            Value::Number(n) => n.as_i64().map(NodeId::Feed),
            _ => None,
        };
        parsed.ok_or_else(|| de::Error::custom(format!("invalid tree node id: {raw}")))
    }
}

/// One node of the category/feed tree.
///
/// Category nodes always have a child list (possibly empty); feed nodes
/// never do. Deserialization rejects a feed node that carries children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub unread: i64,
    pub items: Vec<TreeNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeNode {
    pub fn is_category(&self) -> bool {
        self.id.is_category()
    }

    /// Depth-first iterator over this node and all of its descendants.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &TreeNode)> {
        let mut stack = vec![(0usize, self)];
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.items.iter().rev().map(|child| (depth + 1, child)));
            Some((depth, node))
        })
    }
}

impl<'de> Deserialize<'de> for TreeNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            id: NodeId,
            #[serde(default)]
            name: String,
            #[serde(default, deserialize_with = "de_opt_count")]
            unread: Option<i64>,
            #[serde(default)]
            items: Option<Vec<TreeNode>>,
            #[serde(flatten)]
            extra: Map<String, Value>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let items = match (raw.id, raw.items) {
            (NodeId::Category(_), items) => items.unwrap_or_default(),
            (NodeId::Feed(_), None) => Vec::new(),
            (NodeId::Feed(_), Some(items)) if items.is_empty() => Vec::new(),
            (id @ NodeId::Feed(_), Some(_)) => {
                return Err(de::Error::custom(format!("feed node {id} has children")));
            }
        };
        Ok(TreeNode {
            id: raw.id,
            name: raw.name,
            unread: raw.unread.unwrap_or(0),
            items,
            extra: raw.extra,
        })
    }
}

/// Result of `getFeedTree`. The top-level sequence lives under
/// `categories.items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedTree {
    pub categories: TreeRoot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRoot {
    #[serde(default)]
    pub items: Vec<TreeNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedTree {
    pub fn roots(&self) -> &[TreeNode] {
        &self.categories.items
    }

    /// Every node of the tree in depth-first order, with its depth below
    /// the root sequence.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &TreeNode)> {
        self.roots().iter().flat_map(|node| node.walk())
    }
}

// ---------------------------------------------------------------------------
// Labels and server config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub caption: String,
    #[serde(default)]
    pub fg_color: String,
    #[serde(default)]
    pub bg_color: String,
    /// Whether the article passed to `getLabels` carries this label.
    #[serde(default)]
    pub checked: bool,
}

/// Snapshot returned by `getConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub icons_dir: String,
    #[serde(default)]
    pub icons_url: String,
    #[serde(default)]
    pub daemon_is_running: bool,
    #[serde(default, deserialize_with = "de_count")]
    pub num_feeds: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How `updateArticle` changes the selected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Clear = 0,
    Set = 1,
    Toggle = 2,
}

/// Which article field `updateArticle` operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
    Starred = 0,
    Published = 1,
    Unread = 2,
    Note = 3,
}

impl Serialize for UpdateMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl Serialize for ArticleField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    AllArticles,
    Unread,
    Adaptive,
    Marked,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Oldest first.
    DateReverse,
    /// Newest first, by feed-supplied date.
    FeedDates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    AllFeeds,
    ThisFeed,
    ThisCat,
}

/// One or more article ids, sent as a comma-separated list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleIds(Vec<i64>);

impl ArticleIds {
    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn to_csv(&self) -> String {
        self.0.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
    }
}

impl From<i64> for ArticleIds {
    fn from(id: i64) -> Self {
        ArticleIds(vec![id])
    }
}

impl From<Vec<i64>> for ArticleIds {
    fn from(ids: Vec<i64>) -> Self {
        ArticleIds(ids)
    }
}

impl From<&[i64]> for ArticleIds {
    fn from(ids: &[i64]) -> Self {
        ArticleIds(ids.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for ArticleIds {
    fn from(ids: [i64; N]) -> Self {
        ArticleIds(ids.to_vec())
    }
}

impl Serialize for ArticleIds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_csv())
    }
}

/// Parameters for `getFeeds`. `limit = 0` returns everything and the
/// server ignores `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedsQuery {
    pub cat_id: i64,
    pub unread_only: bool,
    pub limit: u32,
    pub offset: u32,
    pub include_nested: bool,
}

impl FeedsQuery {
    pub fn new(cat_id: i64) -> Self {
        Self {
            cat_id,
            unread_only: false,
            limit: 0,
            offset: 0,
            include_nested: false,
        }
    }

    pub fn unread_only(mut self, yes: bool) -> Self {
        self.unread_only = yes;
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn include_nested(mut self, yes: bool) -> Self {
        self.include_nested = yes;
        self
    }
}

/// Parameters for `getHeadlines`. Only `feed_id` is required; unset
/// options are left out of the request and the server default applies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HeadlinesQuery {
    pub feed_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_excerpt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<ViewMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_attachments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_nested: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_sandbox: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,
}

impl HeadlinesQuery {
    pub fn new(feed_id: i64) -> Self {
        Self {
            feed_id,
            ..Self::default()
        }
    }

    pub fn view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = Some(mode);
        self
    }

    pub fn page(mut self, limit: u32, skip: u32) -> Self {
        self.limit = Some(limit);
        self.skip = Some(skip);
        self
    }

    pub fn category(mut self) -> Self {
        self.is_cat = Some(true);
        self
    }

    pub fn excerpt(mut self, yes: bool) -> Self {
        self.show_excerpt = Some(yes);
        self
    }

    pub fn content(mut self, yes: bool) -> Self {
        self.show_content = Some(yes);
        self
    }

    pub fn since(mut self, article_id: i64) -> Self {
        self.since_id = Some(article_id);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn search(mut self, query: impl Into<String>, mode: SearchMode) -> Self {
        self.search = Some(query.into());
        self.search_mode = Some(mode);
        self
    }
}
