//! HTTP-level tests of the DBLP client, the classifier and the DOI abstract
//! resolver against a local mock server.

use std::sync::Arc;

use paperscout_core::{
    ABSTRACT_NOT_FOUND, AbstractSource, BibliographyBackend, ClassificationError, Config, CoreError,
    Dblp, DoiAbstractResolver, FetchError, OpenAiClassifier, Pipeline, ProgressEvent,
    TitleClassifier,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_answer(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn acm_page(abstract_text: &str) -> String {
    format!(
        r#"<html><body><article>
            <section id="abstract" role="doc-abstract">
                <h2 property="name">Abstract</h2>
                <div role="paragraph">{abstract_text}</div>
            </section>
        </article></body></html>"#
    )
}

#[tokio::test]
async fn dblp_venue_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/venue/api"))
        .and(query_param("q", "osdi"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"@total": "1", "hit": [
                {"info": {"venue": "OSDI", "acronym": "OSDI", "url": "https://dblp.org/db/conf/osdi/"}}
            ]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dblp = Dblp::with_base_url(server.uri());
    let venues = dblp.find_conferences("osdi", &reqwest::Client::new()).await.unwrap();
    assert_eq!(venues.len(), 1);
    assert_eq!(venues[0].acronym, "osdi");
    assert_eq!(venues[0].url, "https://dblp.org/db/conf/osdi/");
}

#[tokio::test]
async fn dblp_publication_search_uses_stream_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .and(query_param("q", "stream:streams/conf/osdi:"))
        .and(query_param("h", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"@total": "2", "hit": [
                {"info": {"title": "A fork() in the road.", "doi": "10.1145/3317550.3321435",
                          "ee": "https://doi.org/10.1145/3317550.3321435"}},
                {"info": {"title": "Unikraft."}}
            ]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dblp = Dblp::with_base_url(server.uri());
    let publications = dblp
        .find_publications("OSDI", &reqwest::Client::new())
        .await
        .unwrap();
    assert_eq!(publications.len(), 2);
    assert_eq!(publications[0].doi(), Some("10.1145/3317550.3321435"));
    assert_eq!(publications[1].link, None);
}

#[tokio::test]
async fn dblp_error_status_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dblp = Dblp::with_base_url(server.uri());
    let err = dblp.find_conferences("osdi", &reqwest::Client::new()).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 500));
}

#[tokio::test]
async fn dblp_malformed_payload_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let dblp = Dblp::with_base_url(server.uri());
    let err = dblp.find_publications("osdi", &reqwest::Client::new()).await.unwrap_err();
    assert!(matches!(err, FetchError::Malformed { .. }));
}

#[tokio::test]
async fn dblp_rejects_empty_name_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dblp = Dblp::with_base_url(server.uri());
    let err = dblp.find_conferences("   ", &reqwest::Client::new()).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidQuery(_)));
}

#[tokio::test]
async fn classifier_normalizes_bare_string_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer(r#"{"titles": "Paper X"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new("sk-test")
        .with_endpoint(format!("{}/v1/chat/completions", server.uri()));
    let batch = vec!["Paper X".to_string(), "Paper Y".to_string()];
    let titles = classifier
        .match_titles("fork", &batch, &reqwest::Client::new())
        .await
        .unwrap();
    assert_eq!(titles, ["Paper X"]);
}

#[tokio::test]
async fn classifier_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new("sk-test").with_endpoint(server.uri());
    let err = classifier
        .match_titles("fork", &["T".to_string()], &reqwest::Client::new())
        .await
        .unwrap_err();
    match err {
        ClassificationError::Status { status, body } => {
            assert_eq!(status.as_u16(), 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn classifier_rejects_invalid_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Paper X, Paper Y")))
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new("sk-test").with_endpoint(server.uri());
    let err = classifier
        .match_titles("fork", &["Paper X".to_string()], &reqwest::Client::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClassificationError::InvalidJson(_)));
}

#[tokio::test]
async fn classifier_rejects_oversized_batch_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer(r#"{"titles": []}"#)))
        .expect(0)
        .mount(&server)
        .await;

    let classifier = OpenAiClassifier::new("sk-test").with_endpoint(server.uri());
    let batch: Vec<String> = (0..51).map(|i| format!("Paper {i}")).collect();
    let err = classifier
        .match_titles("fork", &batch, &reqwest::Client::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClassificationError::BatchTooLarge { size: 51, max: 50 }));
}

#[tokio::test]
async fn abstract_follows_redirect_to_known_publisher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10.1145/xyz"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/doi/10.1145/xyz", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doi/10.1145/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(acm_page("We study forks.")))
        .mount(&server)
        .await;

    let resolver = DoiAbstractResolver::new()
        .with_base_url(server.uri())
        .with_publisher_hosts(vec!["127.0.0.1".into()]);
    let text = resolver
        .retrieve_abstract("10.1145/xyz", &reqwest::Client::new())
        .await;
    assert_eq!(text, "We study forks.");
}

#[tokio::test]
async fn abstract_on_unknown_publisher_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10.1145/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(acm_page("Should be ignored.")))
        .mount(&server)
        .await;

    // Default publisher hosts only know dl.acm.org.
    let resolver = DoiAbstractResolver::new().with_base_url(server.uri());
    let text = resolver
        .retrieve_abstract("10.1145/xyz", &reqwest::Client::new())
        .await;
    assert_eq!(text, ABSTRACT_NOT_FOUND);
}

#[tokio::test]
async fn abstract_failures_degrade_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10.1145/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/10.1145/nosection"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Cookie wall</body></html>"))
        .mount(&server)
        .await;

    let resolver = DoiAbstractResolver::new()
        .with_base_url(server.uri())
        .with_publisher_hosts(vec!["127.0.0.1".into()]);
    let client = reqwest::Client::new();
    assert_eq!(resolver.retrieve_abstract("10.1145/missing", &client).await, ABSTRACT_NOT_FOUND);
    assert_eq!(resolver.retrieve_abstract("10.1145/nosection", &client).await, ABSTRACT_NOT_FOUND);
    assert_eq!(resolver.retrieve_abstract("not-a-doi", &client).await, ABSTRACT_NOT_FOUND);
}

#[tokio::test]
async fn pipeline_from_config_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/venue/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"hit": [
                {"info": {"acronym": "HotOS", "url": "https://dblp.org/db/conf/hotos/"}}
            ]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .and(query_param("q", "stream:streams/conf/hotos:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"@total": "2", "hit": [
                {"info": {"title": "A fork() in the road.", "doi": "10.1145/3317550.3321435",
                          "ee": "https://doi.org/10.1145/3317550.3321435"}},
                {"info": {"title": "Something about storage."}}
            ]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_answer(r#"{"titles": ["A fork() in the road", "Invented"]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/10.1145/3317550.3321435"))
        .respond_with(ResponseTemplate::new(200).set_body_string(acm_page("Fork is a bad idea.")))
        .mount(&server)
        .await;

    let config = Config {
        openai_api_key: Some("sk-test".into()),
        chat_endpoint: format!("{}/v1/chat/completions", server.uri()),
        dblp_base_url: server.uri(),
        doi_base_url: server.uri(),
        publisher_hosts: vec!["127.0.0.1".into()],
        timeout_secs: 5,
        ..Config::default()
    };
    let pipeline = Pipeline::from_config(&config).unwrap();
    let report = pipeline
        .run("hotos", "- Fork", &|_: ProgressEvent| {})
        .await
        .unwrap();

    assert_eq!(report.venues.len(), 1);
    assert_eq!(report.venues[0].venue.acronym, "hotos");
    assert_eq!(report.matches.len(), 1);
    let matched = &report.matches[0];
    // Resolved to the stored DBLP title despite the missing trailing period.
    assert_eq!(matched.title, "A fork() in the road.");
    assert_eq!(matched.link.as_deref(), Some("https://doi.org/10.1145/3317550.3321435"));
    assert_eq!(matched.abstract_text.as_deref(), Some("Fork is a bad idea."));
}

#[tokio::test]
async fn pipeline_reports_bare_string_answer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/venue/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"hit": [
                {"info": {"acronym": "OSDI", "url": "https://dblp.org/db/conf/osdi/"}}
            ]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"@total": "2", "hit": [
                {"info": {"title": "Paper X", "ee": "https://example.org/x"}},
                {"info": {"title": "Paper Y"}}
            ]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer(r#"{"titles": "Paper X"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        openai_api_key: Some("sk-test".into()),
        chat_endpoint: format!("{}/v1/chat/completions", server.uri()),
        dblp_base_url: server.uri(),
        fetch_abstracts: false,
        timeout_secs: 5,
        ..Config::default()
    };
    let pipeline = Pipeline::from_config(&config).unwrap();
    let report = pipeline
        .run("osdi", "systems", &|_: ProgressEvent| {})
        .await
        .unwrap();

    let titles: Vec<_> = report.matches.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, ["Paper X"]);
    assert_eq!(report.matches[0].link.as_deref(), Some("https://example.org/x"));
}

#[tokio::test]
async fn pipeline_from_config_requires_api_key() {
    let err = Pipeline::from_config(&Config::default()).err().unwrap();
    assert!(matches!(err, CoreError::Config(_)));
}

#[test]
fn backends_are_object_safe() {
    let _: Arc<dyn BibliographyBackend> = Arc::new(Dblp::new());
    let _: Arc<dyn TitleClassifier> = Arc::new(OpenAiClassifier::new("k"));
    let _: Arc<dyn AbstractSource> = Arc::new(DoiAbstractResolver::new());
}
