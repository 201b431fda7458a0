//! Verify `build` and `parse` against JSON test vectors stored in `test-vectors/`.
//!
//! Request vectors are keyed by name; the request each name stands for is
//! constructed below. Comparing parsed JSON (not raw strings) avoids false
//! negatives from field-ordering differences.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use serde_json::Value;
use ttrss_core::{
    cat_id, feed_id, ApiError, ApiRequest, ArticleField, ArticleIds, FeedsQuery, HeadlinesQuery, HttpResponse,
    OrderBy, SearchMode, TtRssClient, UpdateMode, DEFAULT_COUNTER_MODE,
};

fn requests_by_name() -> HashMap<&'static str, ApiRequest> {
    HashMap::from([
        (
            "login",
            ApiRequest::Login {
                user: "admin".to_string(),
                password: "password".to_string(),
            },
        ),
        ("logout", ApiRequest::Logout),
        (
            "counters_default_mode",
            ApiRequest::GetCounters {
                output_mode: DEFAULT_COUNTER_MODE.to_string(),
            },
        ),
        ("feed_tree", ApiRequest::GetFeedTree { include_empty: true }),
        ("feeds_all_unlimited", ApiRequest::GetFeeds(FeedsQuery::new(cat_id::ALL_INCLUDING_VIRTUAL))),
        (
            "categories_nested",
            ApiRequest::GetCategories {
                unread_only: true,
                enable_nested: true,
                include_empty: false,
            },
        ),
        ("headlines_minimal", ApiRequest::GetHeadlines(HeadlinesQuery::new(feed_id::ALL_ARTICLES))),
        (
            "headlines_search",
            ApiRequest::GetHeadlines(
                HeadlinesQuery::new(3)
                    .category()
                    .search("kernel", SearchMode::ThisCat)
                    .order_by(OrderBy::FeedDates)
                    .page(20, 0),
            ),
        ),
        (
            "mark_read",
            ApiRequest::UpdateArticle {
                article_ids: ArticleIds::from([1, 2, 3]),
                mode: UpdateMode::Clear,
                field: ArticleField::Unread,
                data: None,
            },
        ),
        ("get_article_list", ApiRequest::GetArticle { article_id: ArticleIds::from(vec![7, 8]) }),
        ("labels_default_article", ApiRequest::GetLabels { article_id: 0 }),
        (
            "remove_label",
            ApiRequest::SetArticleLabel {
                article_ids: ArticleIds::from(5),
                label_id: feed_id::from_label_id(1),
                assign: false,
            },
        ),
        (
            "subscribe_uncategorized",
            ApiRequest::SubscribeToFeed {
                feed_url: "https://example.org/rss".to_string(),
                category_id: cat_id::UNCATEGORIZED,
                login: None,
                password: None,
            },
        ),
        (
            "subscribe_with_credentials",
            ApiRequest::SubscribeToFeed {
                feed_url: "https://example.org/private".to_string(),
                category_id: 2,
                login: Some("reader".to_string()),
                password: Some("hunter2".to_string()),
            },
        ),
        (
            "share",
            ApiRequest::ShareToPublished {
                title: "T".to_string(),
                url: "https://example.org/".to_string(),
                content: "C".to_string(),
            },
        ),
    ])
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let client = TtRssClient::new(vectors["endpoint"].as_str().unwrap());
    let default_sid = vectors["sid"].as_str().unwrap();
    let requests = requests_by_name();

    let cases = vectors["cases"].as_array().unwrap();
    assert_eq!(cases.len(), requests.len(), "every constructed request has a vector");

    for case in cases {
        let name = case["name"].as_str().unwrap();
        let request = requests.get(name).unwrap_or_else(|| panic!("no request named {name}"));
        let sid = case["sid"].as_str().unwrap_or(default_sid);

        let req = client.build(sid, request).unwrap();
        assert_eq!(req.url, vectors["endpoint"].as_str().unwrap(), "{name}: url");
        let body: Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body, case["expected_body"], "{name}: body");
        assert_eq!(body["op"], request.op(), "{name}: op");
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let client = TtRssClient::new("http://localhost:3000/api/");
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        };

        let result = client.parse(response);
        if let Some(expected) = case.get("expected_content") {
            assert_eq!(&result.unwrap(), expected, "{name}: content");
        } else if let Some(code) = case.get("expected_error") {
            match result {
                Err(ApiError::Api(remote)) => assert_eq!(remote.code(), code.as_str().unwrap(), "{name}"),
                other => panic!("{name}: expected API error, got {other:?}"),
            }
        } else {
            let err = result.unwrap_err();
            assert!(err.is_transport(), "{name}: expected transport error, got {err:?}");
        }
    }
}
