use mockito::Matcher;
use newsdesk::catalog::{fallback_catalog, CatalogLoader, CatalogSource};

const SHEET_BODY: &str = r#"{
    "range": "News!A1:I4",
    "majorDimension": "ROWS",
    "values": [
        ["title", "keyword", "source", "tags", "url", "date", "summary", "likes", "id"],
        ["Solar output hits a new record", "Energy", "Green Daily", "recommended", "https://news.example.com/solar", "2024-07-02", "Grid operators report a sunny quarter.", "1,204", "n-100"],
        ["Rust 2.0 is not happening", "Web", "Tech Ledger", "", "https://news.example.com/rust", "2024-07-01", "", "7", "n-101"],
        ["Row without a url", "Web", "Tech Ledger"]
    ]
}"#;

#[tokio::test]
async fn loads_items_from_sheet() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/values/News")
        .match_query(Matcher::UrlEncoded("key".into(), "sheet-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SHEET_BODY)
        .create_async()
        .await;

    let catalog = CatalogLoader::new(Some(format!("{}/values/News", server.url())))
        .with_api_key(Some("sheet-key".into()))
        .load()
        .await;

    assert_eq!(catalog.source, CatalogSource::Remote);
    assert!(catalog.banner().is_none());
    assert_eq!(catalog.items.len(), 2);

    let solar = catalog.get("n-100").expect("solar item");
    assert_eq!(solar.like_count, 1204);
    assert!(solar.has_tag("recommended"));
    assert_eq!(catalog.items[1].id, "n-101");

    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_serves_fallback() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/values/News")
        .with_status(500)
        .create_async()
        .await;

    let catalog = CatalogLoader::new(Some(format!("{}/values/News", server.url())))
        .load()
        .await;

    assert!(catalog.is_fallback());
    assert_eq!(catalog.items, fallback_catalog());
    assert!(catalog.banner().is_some());
    match &catalog.source {
        CatalogSource::Fallback { reason } => assert!(reason.contains("500")),
        other => panic!("unexpected source: {:?}", other),
    }
}

#[tokio::test]
async fn malformed_payload_serves_fallback() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/values/News")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>not a sheet</html>")
        .create_async()
        .await;

    let catalog = CatalogLoader::new(Some(format!("{}/values/News", server.url())))
        .load()
        .await;

    assert!(catalog.is_fallback());
    assert_eq!(catalog.items.len(), fallback_catalog().len());
}

#[tokio::test]
async fn header_only_sheet_serves_fallback() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/values/News")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"values": [["title", "keyword", "source"]]}"#)
        .create_async()
        .await;

    let catalog = CatalogLoader::new(Some(format!("{}/values/News", server.url())))
        .load()
        .await;

    assert!(catalog.is_fallback());
}

#[tokio::test]
async fn unreachable_sheet_serves_fallback() {
    let catalog = CatalogLoader::new(Some("http://127.0.0.1:1/values/News".into()))
        .with_timeout(2)
        .load()
        .await;

    assert!(catalog.is_fallback());
    assert!(catalog.get("fallback-1").is_some());
}
