mod common;

use common::{backend_payload, d, fixture_rollup};
use costing_service::config::BackendSettings;
use costing_service::models::ProjectRollup;
use costing_service::services::{BackendError, CostsBackend, HttpCostsBackend};
use serde_json::Value;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Numbers as `f64`, so `5` and `5.0` compare equal.
fn normalized(value: Value) -> Value {
    match value {
        Value::Number(n) => n.as_f64().map(Value::from).unwrap_or(Value::Number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalized).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalized(v))).collect()),
        other => other,
    }
}

fn backend_for(server: &MockServer) -> HttpCostsBackend {
    HttpCostsBackend::new(&BackendSettings {
        base_url: format!("{}/api/", server.uri()),
        timeout_secs: Some(5),
    })
}

#[tokio::test]
async fn fetch_decodes_backend_field_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projectdetails/42/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let rollup = backend_for(&server).fetch_costs(42).await.unwrap();

    assert_eq!(rollup.profit_margin_percent, Some(d("10")));
    assert_eq!(rollup.distance_km, Some(d("12.5")));
    let module = &rollup.modules[0];
    assert_eq!(module.material_lines[0].id, 700);
    assert_eq!(module.material_lines[0].tax_rate_percent, Some(d("16")));
    assert_eq!(module.labor_lines[0].id, 701);
    assert_eq!(rollup.modules_composite[0].composite_id, 90);
    assert_eq!(rollup.extra["projectName"], "Warehouse retrofit");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projectdetails/42/costs"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = backend_for(&server).fetch_costs(42).await.unwrap_err();
    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projectdetails/42/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = backend_for(&server).fetch_costs(42).await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn save_puts_the_whole_rollup() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/projectdetails/42/costs"))
        .and(body_partial_json(serde_json::json!({
            "profitMargin": 10.0,
            "projectName": "Warehouse retrofit"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend_for(&server)
        .save_costs(42, &fixture_rollup())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["modules"][0]["moduleMaterials"][0]["supplierId"], 3);
    assert_eq!(body["modulesComposite"][0]["compositeDetails"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn save_writes_back_what_fetch_received() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projectdetails/42/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_payload()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/projectdetails/42/costs"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let rollup = backend.fetch_costs(42).await.unwrap();
    backend.save_costs(42, &rollup).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: Value = requests[1].body_json().unwrap();

    // Same keys, same nesting, same numbers
    assert_eq!(normalized(body), normalized(backend_payload()));
}

#[test]
fn model_field_names_are_accepted_and_rewritten() {
    let rollup: ProjectRollup = serde_json::from_value(serde_json::json!({
        "modules": [{
            "moduleId": 1,
            "quantity": 1,
            "materialLines": [{ "id": 11, "quantity": 2, "unitPrice": 3, "taxRatePercent": 5 }],
            "laborLines": [{ "id": 12, "quantity": 1, "hourlyRate": 4, "hoursRequired": 1 }]
        }],
        "modulesComposite": [{ "compositeId": 2, "quantity": 1 }],
        "profitMarginPercent": 7,
        "distanceKm": 3
    }))
    .unwrap();

    assert_eq!(rollup.modules[0].material_lines[0].id, 11);
    assert_eq!(rollup.modules[0].material_lines[0].tax_rate_percent, Some(d("5")));
    assert_eq!(rollup.modules[0].labor_lines[0].id, 12);
    assert_eq!(rollup.modules_composite[0].composite_id, 2);
    assert_eq!(rollup.profit_margin_percent, Some(d("7")));

    let written = serde_json::to_value(&rollup).unwrap();
    let module = &written["modules"][0];
    assert_eq!(module["moduleMaterials"][0]["projectMaterialId"], 11);
    assert_eq!(module["moduleMaterials"][0]["taxRate"], 5.0);
    assert_eq!(module["moduleLabors"][0]["moduleLaborId"], 12);
    assert!(module.get("materialLines").is_none());
    assert_eq!(written["modulesComposite"][0]["moduleCompositeId"], 2);
    assert_eq!(written["profitMargin"], 7.0);
    assert_eq!(written["distance"], 3.0);
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_error() {
    let backend = HttpCostsBackend::new(&BackendSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: Some(2),
    });

    let err = backend.fetch_costs(1).await.unwrap_err();
    assert!(matches!(err, BackendError::Connection(_)));
}
