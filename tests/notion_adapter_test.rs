//! Notion board adapter against a mock Notion API.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

use notion_issues::adapters::plugins::notion::NotionSource;
use notion_issues::domain::models::{FetchConfig, NotionConfig, RateLimitConfig, RetryConfig};
use notion_issues::{IssueQuery, IssueSource, NormalizedIssue};

fn board(server: &ServerGuard) -> NotionSource {
    let config = NotionConfig {
        token: "secret".to_string(),
        database: "Issues".to_string(),
        base_url: server.url(),
        rate_limit: RateLimitConfig::new(1000.0, 1000),
    };
    let fetch = FetchConfig {
        page_workers: 2,
        page_size: 100,
        fetch_comments: false,
    };
    NotionSource::new(&config, &fetch, RetryConfig::disabled()).unwrap()
}

fn page(id: &str, edited: &str) -> Value {
    json!({
        "object": "page",
        "id": id,
        "last_edited_time": edited,
        "archived": false,
        "properties": {
            "Title": { "id": "title", "type": "title" },
            "Status": { "id": "st", "type": "select" },
            "Labels": { "id": "lb", "type": "multi_select" },
            "Issue Key": { "id": "key", "type": "rich_text" }
        }
    })
}

fn list(results: Value, has_more: bool, next_cursor: Option<&str>) -> String {
    json!({
        "object": "list",
        "results": results,
        "has_more": has_more,
        "next_cursor": next_cursor
    })
    .to_string()
}

fn text_list(kind: &str, parts: &[&str], has_more: bool, next_cursor: Option<&str>) -> String {
    let results: Vec<Value> = parts
        .iter()
        .map(|part| json!({ "object": "property_item", "type": kind, kind: { "plain_text": part } }))
        .collect();
    json!({
        "object": "list",
        "property_item": { "type": kind, kind: {} },
        "results": results,
        "has_more": has_more,
        "next_cursor": next_cursor
    })
    .to_string()
}

async fn mock_search(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/v1/search")
        .match_header("authorization", "Bearer secret")
        .match_header("notion-version", "2022-06-28")
        .with_status(200)
        .with_body(list(
            json!([
                { "object": "database", "id": "db-other", "title": [{ "plain_text": "Issues archive" }] },
                { "object": "database", "id": "db1", "title": [{ "plain_text": "Issues" }] }
            ]),
            false,
            None,
        ))
        .expect(1)
        .create_async()
        .await
}

/// Property endpoints of one page, answering with fixed values.
async fn mock_properties(server: &mut ServerGuard, page_id: &str, key: &str, title: &str, status: &str) -> Vec<mockito::Mock> {
    let base = format!("/v1/pages/{page_id}/properties");
    vec![
        server
            .mock("GET", format!("{base}/title").as_str())
            .match_query(Matcher::Any)
            .with_body(text_list("title", &[title], false, None))
            .create_async()
            .await,
        server
            .mock("GET", format!("{base}/st").as_str())
            .match_query(Matcher::Any)
            .with_body(json!({ "object": "property_item", "type": "select", "select": { "name": status } }).to_string())
            .create_async()
            .await,
        server
            .mock("GET", format!("{base}/lb").as_str())
            .match_query(Matcher::Any)
            .with_body(
                json!({ "object": "property_item", "type": "multi_select", "multi_select": [{ "name": "bug" }] })
                    .to_string(),
            )
            .create_async()
            .await,
        server
            .mock("GET", format!("{base}/key").as_str())
            .match_query(Matcher::Any)
            .with_body(text_list("rich_text", &[key], false, None))
            .create_async()
            .await,
    ]
}

#[tokio::test]
async fn test_get_issues_walks_query_pages_and_properties() {
    let mut server = Server::new_async().await;
    let search = mock_search(&mut server).await;
    let filter = json!({ "property": "Issue Key", "rich_text": { "starts_with": "widgets#" } });
    let first = server
        .mock("POST", "/v1/databases/db1/query")
        .match_body(Matcher::Json(json!({ "filter": filter, "page_size": 100 })))
        .with_body(list(json!([page("p1", "2024-03-01T10:00:00.000Z")]), true, Some("c2")))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/v1/databases/db1/query")
        .match_body(Matcher::Json(json!({ "filter": filter, "page_size": 100, "start_cursor": "c2" })))
        .with_body(list(json!([page("p2", "2024-03-02T10:00:00.000Z")]), false, None))
        .expect(1)
        .create_async()
        .await;
    let _p1 = mock_properties(&mut server, "p1", "widgets#1", "First", "open").await;
    let _p2 = mock_properties(&mut server, "p2", "widgets#2", "Second", "closed").await;

    let board = board(&server);
    let query = IssueQuery::new().with_key_prefix(Some("widgets#".to_string()));
    let issues = board.get_issues(&query).await.unwrap();

    assert_eq!(issues.keys().collect::<Vec<_>>(), vec!["widgets#1", "widgets#2"]);
    let first_issue = &issues["widgets#1"];
    assert_eq!(first_issue.title, "First");
    assert_eq!(first_issue.status, "open");
    assert_eq!(first_issue.labels, vec!["bug"]);
    assert!(first_issue.is_unassigned());
    assert!(board.is_closed(&issues["widgets#2"].status));

    // Enumeration fills the key cache; no extra query is needed.
    assert_eq!(board.key_to_id("widgets#2").await.unwrap().as_deref(), Some("p2"));

    search.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_long_title_is_drained_across_property_pages() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let _query = server
        .mock("POST", "/v1/databases/db1/query")
        .with_body(list(json!([page("p1", "2024-03-01T10:00:00.000Z")]), false, None))
        .create_async()
        .await;
    let mut mocks = mock_properties(&mut server, "p1", "widgets#1", "unused", "open").await;
    // Replace the title endpoint with a two-page answer.
    mocks.remove(0).remove_async().await;
    let title_first = server
        .mock("GET", "/v1/pages/p1/properties/title")
        .match_query(Matcher::Exact("page_size=100".to_string()))
        .with_body(text_list("title", &["Crash", "on"], true, Some("t2")))
        .expect(1)
        .create_async()
        .await;
    let title_second = server
        .mock("GET", "/v1/pages/p1/properties/title")
        .match_query(Matcher::Exact("page_size=100&start_cursor=t2".to_string()))
        .with_body(text_list("title", &["startup"], false, None))
        .expect(1)
        .create_async()
        .await;

    let issues = board(&server).get_issues(&IssueQuery::new()).await.unwrap();

    assert_eq!(issues["widgets#1"].title, "Crash on startup");
    title_first.assert_async().await;
    title_second.assert_async().await;
}

#[tokio::test]
async fn test_page_with_failed_property_is_skipped() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let _query = server
        .mock("POST", "/v1/databases/db1/query")
        .with_body(list(
            json!([page("p1", "2024-03-01T10:00:00.000Z"), page("p2", "2024-03-01T10:00:00.000Z")]),
            false,
            None,
        ))
        .create_async()
        .await;
    let _p1 = mock_properties(&mut server, "p1", "widgets#1", "Fine", "open").await;
    let mut p2 = mock_properties(&mut server, "p2", "widgets#2", "Broken", "open").await;
    p2.remove(1).remove_async().await;
    let _broken = server
        .mock("GET", "/v1/pages/p2/properties/st")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let board = board(&server);
    let issues = board.get_issues(&IssueQuery::new()).await.unwrap();

    assert_eq!(issues.keys().collect::<Vec<_>>(), vec!["widgets#1"]);
    assert_eq!(board.unreadable_records(), 1);
}

#[tokio::test]
async fn test_page_without_key_is_ignored_not_unreadable() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let _query = server
        .mock("POST", "/v1/databases/db1/query")
        .with_body(list(
            json!([page("p1", "2024-03-01T10:00:00.000Z"), page("p2", "2024-03-01T10:00:00.000Z")]),
            false,
            None,
        ))
        .create_async()
        .await;
    let _p1 = mock_properties(&mut server, "p1", "widgets#1", "Tracked", "open").await;
    let _p2 = mock_properties(&mut server, "p2", "", "Scratch note", "open").await;

    let board = board(&server);
    let issues = board.get_issues(&IssueQuery::new()).await.unwrap();

    assert_eq!(issues.keys().collect::<Vec<_>>(), vec!["widgets#1"]);
    assert_eq!(board.unreadable_records(), 0);
}

#[tokio::test]
async fn test_create_update_and_archive() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let create = server
        .mock("POST", "/v1/pages")
        .match_body(Matcher::PartialJson(json!({
            "parent": { "type": "database_id", "database_id": "db1" },
            "properties": {
                "Issue Key": { "rich_text": [{ "type": "text", "text": { "content": "widgets#7" } }] },
                "Status": { "select": { "name": "open" } },
                "Assignee": { "select": { "name": "ada" } }
            }
        })))
        .with_body(page("p7", "2024-03-05T10:00:00.000Z").to_string())
        .expect(1)
        .create_async()
        .await;
    let update = server
        .mock("PATCH", "/v1/pages/p7")
        .match_body(Matcher::PartialJson(json!({
            "properties": { "Status": { "select": { "name": "closed" } } }
        })))
        .with_body(page("p7", "2024-03-06T10:00:00.000Z").to_string())
        .expect(1)
        .create_async()
        .await;
    let archive = server
        .mock("PATCH", "/v1/pages/p7")
        .match_body(Matcher::Json(json!({ "archived": true })))
        .with_body(page("p7", "2024-03-06T10:00:00.000Z").to_string())
        .expect(1)
        .create_async()
        .await;

    let board = board(&server);
    let issue = NormalizedIssue::new("widgets#7")
        .with_title("Login fails")
        .with_status("open")
        .with_assignee("ada");

    let created = board.create_issue("widgets#7", &issue).await;
    assert!(created.success, "{created:?}");
    assert_eq!(created.external_id.as_deref(), Some("p7"));

    let updated = board.update_issue("widgets#7", &issue.clone().with_status("closed")).await;
    assert!(updated.success, "{updated:?}");

    let archived = board.archive_issue("widgets#7").await;
    assert!(archived.success, "{archived:?}");

    create.assert_async().await;
    update.assert_async().await;
    archive.assert_async().await;
}

#[tokio::test]
async fn test_update_unknown_key_fails_without_writing() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let lookup = server
        .mock("POST", "/v1/databases/db1/query")
        .match_body(Matcher::PartialJson(json!({
            "filter": { "property": "Issue Key", "rich_text": { "equals": "widgets#404" } }
        })))
        .with_body(list(json!([]), false, None))
        .expect(1)
        .create_async()
        .await;
    let write = server.mock("PATCH", Matcher::Any).expect(0).create_async().await;

    let result = board(&server)
        .update_issue("widgets#404", &NormalizedIssue::new("widgets#404"))
        .await;

    assert!(result.is_failure());
    lookup.assert_async().await;
    write.assert_async().await;
}

#[tokio::test]
async fn test_delete_matching_keys_archives_every_match() {
    let mut server = Server::new_async().await;
    let _search = mock_search(&mut server).await;
    let _query = server
        .mock("POST", "/v1/databases/db1/query")
        .match_body(Matcher::PartialJson(json!({
            "filter": { "property": "Issue Key", "rich_text": { "starts_with": "widgets#" } }
        })))
        .with_body(list(
            json!([page("p1", "2024-03-01T10:00:00.000Z"), page("p2", "2024-03-01T10:00:00.000Z")]),
            false,
            None,
        ))
        .create_async()
        .await;
    let archive_p1 = server
        .mock("PATCH", "/v1/pages/p1")
        .match_body(Matcher::Json(json!({ "archived": true })))
        .with_body(page("p1", "2024-03-07T10:00:00.000Z").to_string())
        .expect(1)
        .create_async()
        .await;
    let archive_p2 = server
        .mock("PATCH", "/v1/pages/p2")
        .with_status(409)
        .with_body(r#"{"object":"error","code":"conflict_error"}"#)
        .expect(1)
        .create_async()
        .await;

    let archived = board(&server).delete_matching_keys("widgets#").await.unwrap();

    assert_eq!(archived, 1);
    archive_p1.assert_async().await;
    archive_p2.assert_async().await;
}

#[tokio::test]
async fn test_missing_database_is_reported() {
    let mut server = Server::new_async().await;
    let _search = server
        .mock("POST", "/v1/search")
        .with_body(list(json!([]), false, None))
        .create_async()
        .await;

    let err = board(&server).get_issues(&IssueQuery::new()).await.unwrap_err();
    assert!(err.to_string().contains("Issues"), "{err}");
}
