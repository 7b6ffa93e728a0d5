mod common;

use assert_matches::assert_matches;

use common::MockServer;
use pubmed_sync::error::SyncError;
use pubmed_sync::ncbi::{EntrezIdentity, EutilsHttpClient, PubmedClient};
use pubmed_sync::normalize::normalize;

const EFETCH_BODY: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle><MedlineCitation><PMID Version="1">1</PMID>
    <Article><ArticleTitle>First.</ArticleTitle></Article>
  </MedlineCitation></PubmedArticle>
  <PubmedArticle><MedlineCitation><PMID Version="1">2</PMID>
    <Article><ArticleTitle>Second.</ArticleTitle></Article>
  </MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;

fn client(server: &MockServer, api_key: Option<&str>) -> EutilsHttpClient {
    EutilsHttpClient::with_base_url(
        EntrezIdentity {
            email: "me@example.org".to_string(),
            api_key: api_key.map(str::to_string),
        },
        server.base_url(),
    )
    .unwrap()
}

#[test]
fn search_sends_relevance_query_with_identity() {
    let server = MockServer::start(vec![(
        200,
        r#"{"esearchresult":{"count":"2","idlist":["31","7"]}}"#,
    )]);

    let ids = client(&server, Some("k123")).search("heart failure", 25).unwrap();

    assert_eq!(ids, vec!["31", "7"]);
    let requests = server.finish();
    let line = &requests[0].request_line;
    assert!(line.starts_with("GET /esearch.fcgi?"));
    for param in [
        "db=pubmed",
        "term=heart+failure",
        "retmax=25",
        "sort=relevance",
        "retmode=json",
        "tool=pubmed-sync",
        "email=me%40example.org",
        "api_key=k123",
    ] {
        assert!(line.contains(param), "{param} missing from {line}");
    }
    assert!(
        requests[0]
            .header("user-agent")
            .unwrap()
            .starts_with("pubmed-sync/")
    );
}

#[test]
fn fetch_requests_medline_xml_for_the_batch() {
    let server = MockServer::start(vec![(200, EFETCH_BODY)]);

    let articles = client(&server, None)
        .fetch_full(&["1".to_string(), "2".to_string()])
        .unwrap();

    let ids = articles
        .iter()
        .map(|article| normalize(article).id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "2"]);
    let requests = server.finish();
    let line = &requests[0].request_line;
    assert!(line.starts_with("GET /efetch.fcgi?"));
    for param in ["db=pubmed", "id=1%2C2", "rettype=medline", "retmode=xml"] {
        assert!(line.contains(param), "{param} missing from {line}");
    }
    assert!(!line.contains("api_key"));
}

#[test]
fn empty_batch_makes_no_request() {
    let server = MockServer::start(Vec::new());

    let articles = client(&server, None).fetch_full(&[]).unwrap();

    assert!(articles.is_empty());
    assert!(server.finish().is_empty());
}

#[test]
fn error_status_carries_the_response_body() {
    let server = MockServer::start(vec![(400, "Invalid query")]);

    let err = client(&server, None).search("(", 10).unwrap_err();

    assert_matches!(err, SyncError::EutilsStatus { status: 400, message } if message == "Invalid query");
    server.finish();
}

#[test]
fn search_error_field_is_a_parse_error() {
    let server = MockServer::start(vec![(
        200,
        r#"{"esearchresult":{"ERROR":"Invalid query syntax"}}"#,
    )]);

    let err = client(&server, None).search("(", 10).unwrap_err();

    assert_matches!(err, SyncError::EutilsParse(message) if message.contains("Invalid query"));
    server.finish();
}
