//! In-memory fixture data and the operations over it.
//!
//! The data set is small but exercises every shape the API returns: nested
//! categories, an uncategorized feed, an empty category, starred, published,
//! unread and labelled articles.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const VERSION: &str = "22.08";
pub const API_LEVEL: u32 = 15;

/// Headline limit when the caller does not pass one.
const DEFAULT_HEADLINE_LIMIT: usize = 60;
/// Hard cap applied from API level 6 on.
const MAX_HEADLINE_LIMIT: usize = 200;

/// Error codes returned in `content.error`.
pub mod code {
    pub const API_DISABLED: &str = "API_DISABLED";
    pub const LOGIN_ERROR: &str = "LOGIN_ERROR";
    pub const NOT_LOGGED_IN: &str = "NOT_LOGGED_IN";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    pub const INCORRECT_USAGE: &str = "INCORRECT_USAGE";
    pub const FEED_NOT_FOUND: &str = "FEED_NOT_FOUND";
}

#[derive(Debug, Clone)]
pub struct Account {
    pub password: String,
    pub api_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: i64,
    pub title: String,
    pub parent: Option<i64>,
    pub order_id: i64,
}

#[derive(Debug, Clone)]
pub struct FeedRow {
    pub id: i64,
    pub title: String,
    pub feed_url: String,
    /// `None` is Uncategorized.
    pub cat_id: Option<i64>,
    pub last_updated: i64,
    pub order_id: i64,
}

#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub id: i64,
    /// `None` is archived: the article outlived its feed or was shared.
    pub feed_id: Option<i64>,
    pub title: String,
    pub link: String,
    pub content: String,
    pub updated: i64,
    pub unread: bool,
    pub marked: bool,
    pub published: bool,
    pub note: String,
    pub labels: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct LabelRow {
    pub id: i64,
    pub caption: String,
    pub fg_color: String,
    pub bg_color: String,
}

/// Convert a label's database id to the feed id it is exposed as.
pub fn label_to_feed_id(label_id: i64) -> i64 {
    -11 - label_id
}

/// Inverse of `label_to_feed_id`.
pub fn feed_to_label_id(feed_id: i64) -> i64 {
    -11 - feed_id
}

const VIRTUAL_FEEDS: [(i64, &str); 5] = [
    (-4, "All articles"),
    (-3, "Fresh articles"),
    (-1, "Starred articles"),
    (-2, "Published articles"),
    (0, "Archived articles"),
];

pub type OpResult = Result<Value, &'static str>;

/// Lenient view over request parameters. The server accepts booleans and
/// integers either as JSON scalars or as their string spellings.
pub struct Params<'a>(pub &'a Map<String, Value>);

impl Params<'_> {
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.bool(key).unwrap_or(false)
    }

    /// Comma-separated id list, or a single integer.
    pub fn ids(&self, key: &str) -> Vec<i64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_i64().into_iter().collect(),
            Some(Value::String(s)) => s.split(',').filter_map(|p| p.trim().parse().ok()).collect(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerState {
    pub accounts: HashMap<String, Account>,
    pub sessions: HashSet<String>,
    pub categories: Vec<CategoryRow>,
    pub feeds: Vec<FeedRow>,
    pub articles: Vec<ArticleRow>,
    pub labels: Vec<LabelRow>,
    pub prefs: Map<String, Value>,
    next_feed_id: i64,
    next_article_id: i64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::fixture()
    }
}

impl ServerState {
    /// The seeded data set. Accounts: `admin`/`password` (API enabled) and
    /// `disabled`/`password` (API disabled).
    pub fn fixture() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "admin".to_string(),
            Account {
                password: "password".to_string(),
                api_enabled: true,
            },
        );
        accounts.insert(
            "disabled".to_string(),
            Account {
                password: "password".to_string(),
                api_enabled: false,
            },
        );

        let cat = |id, title: &str, parent, order_id| CategoryRow {
            id,
            title: title.to_string(),
            parent,
            order_id,
        };
        let categories = vec![
            cat(1, "Tech", None, 1),
            cat(2, "News", None, 2),
            cat(3, "Rust", Some(1), 1),
            cat(4, "Empty", None, 3),
        ];

        let feed = |id, title: &str, url: &str, cat_id, order_id| FeedRow {
            id,
            title: title.to_string(),
            feed_url: url.to_string(),
            cat_id,
            last_updated: 1_539_065_812,
            order_id,
        };
        let feeds = vec![
            feed(10, "LWN.net", "https://lwn.net/headlines/rss", Some(1), 1),
            feed(11, "This Week in Rust", "https://this-week-in-rust.org/rss.xml", Some(3), 1),
            feed(12, "World News", "https://news.example.org/world.xml", Some(2), 1),
            feed(13, "Loose Ends", "https://blog.example.org/feed", None, 1),
        ];

        let article = |id, feed_id, title: &str, unread, marked, published| ArticleRow {
            id,
            feed_id,
            title: title.to_string(),
            link: format!("https://example.org/articles/{id}"),
            content: format!("<p>{title}</p>"),
            updated: 1_600_000_000 + id,
            unread,
            marked,
            published,
            note: String::new(),
            labels: Vec::new(),
        };
        let mut articles = vec![
            article(100, Some(10), "Kernel release", true, false, false),
            article(101, Some(10), "Filesystem news", false, true, false),
            article(102, Some(11), "Issue 500", true, false, true),
            article(103, Some(11), "Issue 501", true, true, false),
            article(104, Some(12), "Election results", false, false, false),
            article(105, Some(13), "Odds and ends", true, false, false),
            article(106, None, "Saved for later", false, true, false),
        ];
        articles[2].labels.push(1);

        let labels = vec![
            LabelRow {
                id: 1,
                caption: "Rust".to_string(),
                fg_color: "#e14a00".to_string(),
                bg_color: "#ffffff".to_string(),
            },
            LabelRow {
                id: 2,
                caption: "Later".to_string(),
                fg_color: "".to_string(),
                bg_color: "".to_string(),
            },
        ];

        let mut prefs = Map::new();
        prefs.insert("ENABLE_FEED_CATS".to_string(), json!(true));
        prefs.insert("DEFAULT_ARTICLE_LIMIT".to_string(), json!(30));
        prefs.insert("USER_LANGUAGE".to_string(), json!(""));

        Self {
            accounts,
            sessions: HashSet::new(),
            categories,
            feeds,
            articles,
            labels,
            prefs,
            next_feed_id: 14,
            next_article_id: 107,
        }
    }

    /// Apply one request. `sid` has already been extracted from the body.
    pub fn dispatch(&mut self, op: &str, sid: &str, params: &Params<'_>) -> OpResult {
        match op {
            "login" => return self.login(params),
            "isLoggedIn" => return Ok(json!({ "status": self.sessions.contains(sid) })),
            _ => {}
        }
        if !self.sessions.contains(sid) {
            return Err(code::NOT_LOGGED_IN);
        }
        match op {
            "logout" => {
                self.sessions.remove(sid);
                Ok(json!({ "status": "OK" }))
            }
            "getVersion" => Ok(json!({ "version": VERSION })),
            "getApiLevel" => Ok(json!({ "level": API_LEVEL })),
            "getUnread" => Ok(json!({ "unread": self.unread_total().to_string() })),
            "getCounters" => Ok(self.counters(params.str("output_mode").unwrap_or("flc"))),
            "getFeedTree" => Ok(self.feed_tree(params.flag("include_empty"))),
            "getFeeds" => Ok(self.get_feeds(params)),
            "getCategories" => Ok(self.get_categories(params)),
            "getHeadlines" => self.headlines(params),
            "updateArticle" => self.update_article(params),
            "getArticle" => self.get_article(params),
            "getConfig" => Ok(json!({
                "icons_dir": "feed-icons",
                "icons_url": "feed-icons",
                "daemon_is_running": true,
                "num_feeds": self.feeds.len(),
            })),
            "updateFeed" => {
                let feed_id = params.int("feed_id").ok_or(code::INCORRECT_USAGE)?;
                self.feed(feed_id).ok_or(code::FEED_NOT_FOUND)?;
                Ok(json!({ "status": "OK" }))
            }
            "getPref" => {
                let name = params.str("pref_name").ok_or(code::INCORRECT_USAGE)?;
                Ok(json!({ "value": self.prefs.get(name).cloned().unwrap_or(Value::Null) }))
            }
            "catchupFeed" => self.catchup(params),
            "getLabels" => Ok(self.get_labels(params.int("article_id").unwrap_or(0))),
            "setArticleLabel" => self.set_label(params),
            "shareToPublished" => self.share(params),
            "subscribeToFeed" => self.subscribe(params),
            "unsubscribeFeed" => {
                let feed_id = params.int("feed_id").ok_or(code::INCORRECT_USAGE)?;
                let before = self.feeds.len();
                self.feeds.retain(|f| f.id != feed_id);
                if self.feeds.len() == before {
                    return Err(code::FEED_NOT_FOUND);
                }
                for article in self.articles.iter_mut().filter(|a| a.feed_id == Some(feed_id)) {
                    article.feed_id = None;
                }
                Ok(json!({ "status": "OK" }))
            }
            _ => Err(code::UNKNOWN_METHOD),
        }
    }

    fn login(&mut self, params: &Params<'_>) -> OpResult {
        let user = params.str("user").unwrap_or_default();
        let password = params.str("password").unwrap_or_default();
        let account = self.accounts.get(user).filter(|a| a.password == password).ok_or(code::LOGIN_ERROR)?;
        if !account.api_enabled {
            return Err(code::API_DISABLED);
        }
        let sid = Uuid::new_v4().simple().to_string();
        self.sessions.insert(sid.clone());
        Ok(json!({ "session_id": sid, "api_level": API_LEVEL }))
    }

    fn feed(&self, id: i64) -> Option<&FeedRow> {
        self.feeds.iter().find(|f| f.id == id)
    }

    fn unread_total(&self) -> usize {
        self.articles.iter().filter(|a| a.unread).count()
    }

    fn feed_unread(&self, feed_id: i64) -> usize {
        self.articles.iter().filter(|a| a.unread && a.feed_id == Some(feed_id)).count()
    }

    fn label_unread(&self, label_id: i64) -> usize {
        self.articles.iter().filter(|a| a.unread && a.labels.contains(&label_id)).count()
    }

    fn child_categories(&self, parent: Option<i64>) -> impl Iterator<Item = &CategoryRow> {
        self.categories.iter().filter(move |c| c.parent == parent)
    }

    /// Feeds directly in `cat_id` (0 is Uncategorized), plus those of child
    /// categories when `nested`.
    fn feeds_in(&self, cat_id: i64, nested: bool) -> Vec<&FeedRow> {
        let wanted = if cat_id == 0 { None } else { Some(cat_id) };
        let mut feeds: Vec<&FeedRow> = self.feeds.iter().filter(|f| f.cat_id == wanted).collect();
        if nested && cat_id != 0 {
            for child in self.child_categories(Some(cat_id)) {
                feeds.extend(self.feeds_in(child.id, true));
            }
        }
        feeds
    }

    fn category_unread(&self, cat_id: i64, nested: bool) -> usize {
        self.feeds_in(cat_id, nested).iter().map(|f| self.feed_unread(f.id)).sum()
    }

    fn virtual_unread(&self, feed_id: i64) -> usize {
        self.articles_for(feed_id, false).iter().filter(|a| a.unread).count()
    }

    fn feed_json(&self, feed: &FeedRow) -> Value {
        json!({
            "id": feed.id,
            "title": feed.title,
            "feed_url": feed.feed_url,
            "unread": self.feed_unread(feed.id),
            "has_icon": false,
            "cat_id": feed.cat_id.unwrap_or(0),
            "last_updated": feed.last_updated,
            "order_id": feed.order_id,
        })
    }

    fn virtual_feeds_json(&self) -> Vec<Value> {
        VIRTUAL_FEEDS
            .iter()
            .map(|(id, title)| {
                json!({ "id": id, "title": title, "unread": self.virtual_unread(*id), "cat_id": -1 })
            })
            .collect()
    }

    fn label_feeds_json(&self) -> Vec<Value> {
        self.labels
            .iter()
            .map(|l| {
                json!({
                    "id": label_to_feed_id(l.id),
                    "title": l.caption,
                    "unread": self.label_unread(l.id),
                    "cat_id": -2,
                })
            })
            .collect()
    }

    fn get_feeds(&self, params: &Params<'_>) -> Value {
        let cat_id = params.int("cat_id").unwrap_or(0);
        let unread_only = params.flag("unread_only");
        let include_nested = params.flag("include_nested");

        let mut out: Vec<Value> = match cat_id {
            -1 => self.virtual_feeds_json(),
            -2 => self.label_feeds_json(),
            -3 => self.feeds.iter().map(|f| self.feed_json(f)).collect(),
            -4 => {
                let mut all = self.virtual_feeds_json();
                all.extend(self.label_feeds_json());
                all.extend(self.feeds.iter().map(|f| self.feed_json(f)));
                all
            }
            cat => {
                let mut list = Vec::new();
                if include_nested && cat > 0 {
                    for child in self.child_categories(Some(cat)) {
                        list.push(json!({
                            "id": child.id,
                            "title": child.title,
                            "unread": self.category_unread(child.id, true),
                            "is_cat": true,
                            "order_id": child.order_id,
                        }));
                    }
                }
                list.extend(self.feeds_in(cat, false).into_iter().map(|f| self.feed_json(f)));
                list
            }
        };

        if unread_only {
            out.retain(|f| f["unread"].as_u64().unwrap_or(0) > 0);
        }
        let limit = params.int("limit").unwrap_or(0).max(0) as usize;
        if limit > 0 {
            let offset = params.int("offset").unwrap_or(0).max(0) as usize;
            out = out.into_iter().skip(offset).take(limit).collect();
        }
        Value::Array(out)
    }

    fn get_categories(&self, params: &Params<'_>) -> Value {
        let unread_only = params.flag("unread_only");
        let nested = params.flag("enable_nested");
        let include_empty = params.flag("include_empty");

        let mut out = Vec::new();
        for cat in &self.categories {
            if nested && cat.parent.is_some() {
                continue;
            }
            let has_feeds = !self.feeds_in(cat.id, nested).is_empty();
            if !has_feeds && !include_empty {
                continue;
            }
            out.push(json!({
                "id": cat.id,
                "title": cat.title,
                "unread": self.category_unread(cat.id, nested),
                "order_id": cat.order_id,
            }));
        }
        if self.feeds.iter().any(|f| f.cat_id.is_none()) {
            out.push(json!({ "id": 0, "title": "Uncategorized", "unread": self.category_unread(0, false) }));
        }
        let special_unread: usize = VIRTUAL_FEEDS.iter().map(|(id, _)| self.virtual_unread(*id)).sum();
        out.push(json!({ "id": -1, "title": "Special", "unread": special_unread }));
        if !self.labels.is_empty() {
            let label_unread: usize = self.labels.iter().map(|l| self.label_unread(l.id)).sum();
            out.push(json!({ "id": -2, "title": "Labels", "unread": label_unread }));
        }

        if unread_only {
            out.retain(|c| c["unread"].as_u64().unwrap_or(0) > 0);
        }
        Value::Array(out)
    }

    fn counters(&self, mode: &str) -> Value {
        let mut out = vec![
            json!({ "id": "global-unread", "counter": self.unread_total() }),
            json!({ "id": "subscribed-feeds", "counter": self.feeds.len() }),
        ];
        if mode.contains('f') {
            out.extend(self.feeds.iter().map(|f| json!({ "id": f.id, "counter": self.feed_unread(f.id) })));
            out.extend(
                VIRTUAL_FEEDS
                    .iter()
                    .map(|(id, _)| json!({ "id": id, "counter": self.virtual_unread(*id) })),
            );
        }
        if mode.contains('l') {
            out.extend(self.labels.iter().map(|l| {
                json!({
                    "id": label_to_feed_id(l.id),
                    "counter": self.label_unread(l.id),
                    "description": l.caption,
                })
            }));
        }
        if mode.contains('c') {
            out.extend(self.categories.iter().map(|c| {
                json!({ "id": c.id, "kind": "cat", "counter": self.category_unread(c.id, false) })
            }));
        }
        // Tags are not modelled; `t` yields nothing.
        Value::Array(out)
    }

    fn tree_feed_node(&self, feed: &FeedRow) -> Value {
        json!({
            "id": format!("FEED:{}", feed.id),
            "bare_id": feed.id,
            "name": feed.title,
            "unread": self.feed_unread(feed.id),
            "type": "feed",
            "checkbox": false,
        })
    }

    fn tree_category_node(&self, cat: &CategoryRow, include_empty: bool) -> Option<Value> {
        let mut items: Vec<Value> = self
            .child_categories(Some(cat.id))
            .filter_map(|child| self.tree_category_node(child, include_empty))
            .collect();
        items.extend(self.feeds_in(cat.id, false).into_iter().map(|f| self.tree_feed_node(f)));
        if items.is_empty() && !include_empty {
            return None;
        }
        Some(json!({
            "id": format!("CAT:{}", cat.id),
            "bare_id": cat.id,
            "name": cat.title,
            "type": "category",
            "unread": 0,
            "child_unread": self.category_unread(cat.id, true),
            "items": items,
        }))
    }

    fn feed_tree(&self, include_empty: bool) -> Value {
        let special: Vec<Value> = VIRTUAL_FEEDS
            .iter()
            .map(|(id, title)| {
                json!({ "id": format!("FEED:{id}"), "bare_id": id, "name": title,
                        "unread": self.virtual_unread(*id), "type": "feed" })
            })
            .collect();
        let mut items = vec![json!({
            "id": "CAT:-1", "bare_id": -1, "name": "Special", "type": "category", "unread": 0, "items": special,
        })];

        if !self.labels.is_empty() {
            let label_nodes: Vec<Value> = self
                .labels
                .iter()
                .map(|l| {
                    let id = label_to_feed_id(l.id);
                    json!({ "id": format!("FEED:{id}"), "bare_id": id, "name": l.caption,
                            "unread": self.label_unread(l.id), "type": "feed",
                            "fg_color": l.fg_color, "bg_color": l.bg_color })
                })
                .collect();
            items.push(json!({
                "id": "CAT:-2", "bare_id": -2, "name": "Labels", "type": "category",
                "unread": 0, "items": label_nodes,
            }));
        }

        items.extend(self.child_categories(None).filter_map(|c| self.tree_category_node(c, include_empty)));

        let uncategorized: Vec<Value> = self
            .feeds_in(0, false)
            .into_iter()
            .map(|f| self.tree_feed_node(f))
            .collect();
        if !uncategorized.is_empty() || include_empty {
            items.push(json!({
                "id": "CAT:0", "bare_id": 0, "name": "Uncategorized", "type": "category", "unread": 0,
                "items": uncategorized,
            }));
        }

        json!({ "categories": { "identifier": "id", "label": "name", "items": items } })
    }

    /// Articles visible under `feed_id`, special ids included.
    fn articles_for(&self, feed_id: i64, is_cat: bool) -> Vec<&ArticleRow> {
        if is_cat {
            let feed_ids: Vec<i64> = self.feeds_in(feed_id, true).iter().map(|f| f.id).collect();
            return self
                .articles
                .iter()
                .filter(|a| a.feed_id.is_some_and(|id| feed_ids.contains(&id)))
                .collect();
        }
        self.articles
            .iter()
            .filter(|a| match feed_id {
                -1 => a.marked,
                -2 => a.published,
                -3 => a.unread,
                -4 => true,
                0 => a.feed_id.is_none(),
                id if id < -10 => a.labels.contains(&feed_to_label_id(id)),
                id => a.feed_id == Some(id),
            })
            .collect()
    }

    fn feed_title(&self, article: &ArticleRow) -> String {
        article
            .feed_id
            .and_then(|id| self.feed(id))
            .map(|f| f.title.clone())
            .unwrap_or_default()
    }

    fn article_labels(&self, article: &ArticleRow) -> Vec<Value> {
        self.labels
            .iter()
            .filter(|l| article.labels.contains(&l.id))
            .map(|l| json!([label_to_feed_id(l.id), l.caption, l.fg_color, l.bg_color]))
            .collect()
    }

    fn headlines(&self, params: &Params<'_>) -> OpResult {
        let feed_id = params.int("feed_id").ok_or(code::INCORRECT_USAGE)?;
        let is_cat = params.flag("is_cat");
        let show_excerpt = params.flag("show_excerpt");
        let show_content = params.flag("show_content");

        let mut rows = self.articles_for(feed_id, is_cat);
        match params.str("view_mode") {
            Some("unread") => rows.retain(|a| a.unread),
            Some("marked") => rows.retain(|a| a.marked),
            Some("published") => rows.retain(|a| a.published),
            _ => {}
        }
        if let Some(since) = params.int("since_id") {
            rows.retain(|a| a.id > since);
        }
        if let Some(query) = params.str("search").filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            rows.retain(|a| a.title.to_lowercase().contains(&query));
        }
        match params.str("order_by") {
            Some("date_reverse") => rows.sort_by_key(|a| a.updated),
            _ => rows.sort_by_key(|a| std::cmp::Reverse(a.updated)),
        }

        let limit = match params.int("limit") {
            Some(n) if n > 0 => (n as usize).min(MAX_HEADLINE_LIMIT),
            _ => DEFAULT_HEADLINE_LIMIT,
        };
        let skip = params.int("skip").unwrap_or(0).max(0) as usize;

        let headlines: Vec<Value> = rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|a| {
                let mut h = json!({
                    "id": a.id,
                    "unread": a.unread,
                    "marked": a.marked,
                    "published": a.published,
                    "updated": a.updated,
                    "is_updated": false,
                    "title": a.title,
                    "link": a.link,
                    "feed_id": a.feed_id.map(|id| id.to_string()),
                    "feed_title": self.feed_title(a),
                    "tags": [],
                    "labels": self.article_labels(a),
                    "note": a.note,
                });
                if show_excerpt {
                    h["excerpt"] = json!(a.title.clone());
                }
                if show_content {
                    h["content"] = json!(a.content.clone());
                }
                h
            })
            .collect();

        if params.flag("include_header") {
            let first_id = headlines.first().map(|h| h["id"].clone()).unwrap_or(json!(0));
            return Ok(json!([{ "id": feed_id, "first_id": first_id, "is_cat": is_cat }, headlines]));
        }
        Ok(Value::Array(headlines))
    }

    fn update_article(&mut self, params: &Params<'_>) -> OpResult {
        let ids = params.ids("article_ids");
        let mode = params.int("mode").ok_or(code::INCORRECT_USAGE)?;
        let field = params.int("field").ok_or(code::INCORRECT_USAGE)?;
        if ids.is_empty() || !(0..=2).contains(&mode) || !(0..=3).contains(&field) {
            return Err(code::INCORRECT_USAGE);
        }
        let note = params.str("data").unwrap_or_default().to_string();

        let mut updated = 0;
        for article in self.articles.iter_mut().filter(|a| ids.contains(&a.id)) {
            if field == 3 {
                article.note = note.clone();
                updated += 1;
                continue;
            }
            let flag = match field {
                0 => &mut article.marked,
                1 => &mut article.published,
                _ => &mut article.unread,
            };
            let next = match mode {
                0 => false,
                1 => true,
                _ => !*flag,
            };
            if *flag != next {
                *flag = next;
                updated += 1;
            }
        }
        Ok(json!({ "status": "OK", "updated": updated }))
    }

    fn get_article(&self, params: &Params<'_>) -> OpResult {
        let ids = params.ids("article_id");
        if ids.is_empty() {
            return Err(code::INCORRECT_USAGE);
        }
        let out: Vec<Value> = self
            .articles
            .iter()
            .filter(|a| ids.contains(&a.id))
            .map(|a| {
                json!({
                    "id": a.id,
                    "guid": format!("urn:article:{}", a.id),
                    "title": a.title,
                    "link": a.link,
                    "labels": self.article_labels(a),
                    "unread": a.unread,
                    "marked": a.marked,
                    "published": a.published,
                    "comments": "",
                    "author": "",
                    "updated": a.updated,
                    "content": a.content,
                    "feed_id": a.feed_id.map(|id| id.to_string()),
                    "feed_title": self.feed_title(a),
                    "attachments": [],
                    "note": a.note,
                })
            })
            .collect();
        Ok(Value::Array(out))
    }

    fn catchup(&mut self, params: &Params<'_>) -> OpResult {
        let feed_id = params.int("feed_id").ok_or(code::INCORRECT_USAGE)?;
        let is_cat = params.flag("is_cat");
        let ids: Vec<i64> = self.articles_for(feed_id, is_cat).iter().map(|a| a.id).collect();
        for article in self.articles.iter_mut().filter(|a| ids.contains(&a.id)) {
            article.unread = false;
        }
        Ok(json!({ "status": "OK" }))
    }

    fn get_labels(&self, article_id: i64) -> Value {
        let carried = self
            .articles
            .iter()
            .find(|a| a.id == article_id)
            .map(|a| a.labels.clone())
            .unwrap_or_default();
        let out: Vec<Value> = self
            .labels
            .iter()
            .map(|l| {
                json!({
                    "id": label_to_feed_id(l.id),
                    "caption": l.caption,
                    "fg_color": l.fg_color,
                    "bg_color": l.bg_color,
                    "checked": carried.contains(&l.id),
                })
            })
            .collect();
        Value::Array(out)
    }

    fn set_label(&mut self, params: &Params<'_>) -> OpResult {
        let ids = params.ids("article_ids");
        let label_feed_id = params.int("label_id").ok_or(code::INCORRECT_USAGE)?;
        let assign = params.flag("assign");
        let label_id = feed_to_label_id(label_feed_id);
        if !self.labels.iter().any(|l| l.id == label_id) {
            return Err(code::INCORRECT_USAGE);
        }

        let mut updated = 0;
        for article in self.articles.iter_mut().filter(|a| ids.contains(&a.id)) {
            let has = article.labels.contains(&label_id);
            if assign && !has {
                article.labels.push(label_id);
            } else if !assign && has {
                article.labels.retain(|&l| l != label_id);
            }
            updated += 1;
        }
        Ok(json!({ "status": "OK", "message": "", "updated": updated }))
    }

    fn share(&mut self, params: &Params<'_>) -> OpResult {
        let title = params.str("title").ok_or(code::INCORRECT_USAGE)?;
        let url = params.str("url").ok_or(code::INCORRECT_USAGE)?;
        let content = params.str("content").unwrap_or_default();

        let id = self.next_article_id;
        self.next_article_id += 1;
        self.articles.push(ArticleRow {
            id,
            feed_id: None,
            title: title.to_string(),
            link: url.to_string(),
            content: content.to_string(),
            updated: 1_700_000_000,
            unread: false,
            marked: false,
            published: true,
            note: String::new(),
            labels: Vec::new(),
        });
        Ok(json!({ "status": "OK" }))
    }

    /// Status codes: 0 already subscribed, 1 added, 2 invalid URL.
    fn subscribe(&mut self, params: &Params<'_>) -> OpResult {
        let url = params.str("feed_url").ok_or(code::INCORRECT_USAGE)?;
        let category_id = params.int("category_id").unwrap_or(0);

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(json!({ "status": { "code": 2 } }));
        }
        if let Some(existing) = self.feeds.iter().find(|f| f.feed_url == url) {
            return Ok(json!({ "status": { "code": 0, "feed_id": existing.id } }));
        }

        let id = self.next_feed_id;
        self.next_feed_id += 1;
        let cat_id = self.categories.iter().any(|c| c.id == category_id).then_some(category_id);
        self.feeds.push(FeedRow {
            id,
            title: url.to_string(),
            feed_url: url.to_string(),
            cat_id,
            last_updated: 0,
            order_id: 0,
        });
        Ok(json!({ "status": { "code": 1, "feed_id": id } }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn logged_in() -> (ServerState, String) {
        let mut state = ServerState::fixture();
        let body = params(json!({"user": "admin", "password": "password"}));
        let content = state.dispatch("login", "", &Params(&body)).unwrap();
        let sid = content["session_id"].as_str().unwrap().to_string();
        (state, sid)
    }

    #[test]
    fn params_are_lenient() {
        let map = params(json!({"a": "1", "b": "true", "c": 0, "d": "3,4, 5", "e": 7}));
        let p = Params(&map);
        assert_eq!(p.int("a"), Some(1));
        assert_eq!(p.bool("b"), Some(true));
        assert_eq!(p.bool("c"), Some(false));
        assert_eq!(p.ids("d"), vec![3, 4, 5]);
        assert_eq!(p.ids("e"), vec![7]);
        assert!(!p.flag("missing"));
    }

    #[test]
    fn operations_require_session() {
        let mut state = ServerState::fixture();
        let empty = Map::new();
        assert_eq!(state.dispatch("getUnread", "", &Params(&empty)), Err(code::NOT_LOGGED_IN));
        assert_eq!(
            state.dispatch("isLoggedIn", "", &Params(&empty)),
            Ok(json!({"status": false}))
        );
    }

    #[test]
    fn disabled_account_is_refused() {
        let mut state = ServerState::fixture();
        let body = params(json!({"user": "disabled", "password": "password"}));
        assert_eq!(state.dispatch("login", "", &Params(&body)), Err(code::API_DISABLED));
    }

    #[test]
    fn unknown_op_is_reported() {
        let (mut state, sid) = logged_in();
        assert_eq!(state.dispatch("frobnicate", &sid, &Params(&Map::new())), Err(code::UNKNOWN_METHOD));
    }

    #[test]
    fn unread_counts_fixture_articles() {
        let (mut state, sid) = logged_in();
        let content = state.dispatch("getUnread", &sid, &Params(&Map::new())).unwrap();
        assert_eq!(content, json!({"unread": "4"}));
    }

    #[test]
    fn label_ids_convert_both_ways() {
        assert_eq!(label_to_feed_id(1), -12);
        assert_eq!(feed_to_label_id(-12), 1);
    }

    #[test]
    fn toggle_counts_changed_rows() {
        let (mut state, sid) = logged_in();
        let body = params(json!({"article_ids": "100,101", "mode": 2, "field": 0}));
        let content = state.dispatch("updateArticle", &sid, &Params(&body)).unwrap();
        assert_eq!(content["updated"], 2);
        assert!(state.articles[0].marked);
        assert!(!state.articles[1].marked);
    }
}
