mod common;

use plinth::boot::{names, Sequencer, Signal};
use plinth::error::{BoxError, EnvelopeKind, ErrorEnvelope};
use plinth::App;

use common::{client, start, test_config};

fn sequencer_with_failing_route(envelope: ErrorEnvelope) -> Sequencer {
    let sequencer = Sequencer::new(test_config());
    sequencer.on(names::CONFIGURE_ROUTES, move |app: App| {
        let envelope = envelope.clone();
        async move {
            let envelope = envelope.clone();
            app.get("/broken", move |_request| {
                let envelope = envelope.clone();
                async move { Err::<String, BoxError>(envelope.into()) }
            });
            Ok(Signal::Continue)
        }
    });
    sequencer
}

#[tokio::test]
async fn unknown_routes_get_a_described_not_found() {
    let sequencer = Sequencer::new(test_config());
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.text().await.unwrap(),
        "Route GET:/does-not-exist not found"
    );

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn json_clients_get_the_not_found_envelope() {
    let sequencer = Sequencer::new(test_config());
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/does-not-exist"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["type"], "NotFound");
    // the default fallback envelope is public, so its message is disclosed
    assert_eq!(body["message"], "Route GET:/does-not-exist not found");

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn non_public_errors_are_redacted_for_json_clients() {
    let envelope = ErrorEnvelope::new(EnvelopeKind::UnknownError, "db password is hunter2")
        .detail("connection", "10.0.0.5");
    let sequencer = sequencer_with_failing_route(envelope);
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/broken"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "An error occurred.");
    assert_eq!(body["type"], "UnknownError");
    assert!(body["details"].as_object().unwrap().is_empty());

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn permission_denied_reads_become_forbidden() {
    let envelope = ErrorEnvelope::new(EnvelopeKind::PermissionDenied, "not yours");
    let sequencer = sequencer_with_failing_route(envelope);
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/broken"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn explicit_status_code_details_always_win() {
    let envelope =
        ErrorEnvelope::new(EnvelopeKind::NotFound, "long gone").http_status_code(410);
    let sequencer = sequencer_with_failing_route(envelope);
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/broken"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 410);

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn html_preferring_clients_get_the_plain_fallback() {
    let envelope = ErrorEnvelope::new(EnvelopeKind::UnknownError, "internal detail");
    let sequencer = sequencer_with_failing_route(envelope);
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/broken"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    // nothing internal leaks into the fallback body
    assert_eq!(response.text().await.unwrap(), "Internal Server Error");

    run.shutdown();
    run.join().await;
}

#[tokio::test]
async fn dump_exceptions_renders_a_diagnostic_page() {
    let envelope = ErrorEnvelope::new(EnvelopeKind::UnknownError, "diagnostic detail");
    let sequencer = Sequencer::new({
        let mut config = test_config();
        config.dump_exceptions = true;
        config
    });
    sequencer.on(names::CONFIGURE_ROUTES, move |app: App| {
        let envelope = envelope.clone();
        async move {
            let envelope = envelope.clone();
            app.get("/broken", move |_request| {
                let envelope = envelope.clone();
                async move { Err::<String, BoxError>(envelope.into()) }
            });
            Ok(Signal::Continue)
        }
    });
    let (run, addr) = start(&sequencer).await;

    let response = client()
        .get(format!("http://{addr}/broken"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("diagnostic detail"));

    run.shutdown();
    run.join().await;
}
