mod common;
mod http_helpers;

use axum::http::StatusCode;
use common::{CLIENT_ONE, CLIENT_TWO, memory_app, read_json};
use diagnosis_api::store::DiagnosisStore;
use diagnosis_common::{ClientId, CreateDiagnosisRequest};
use http_helpers::{get_request, json_request};
use serde_json::json;
use std::str::FromStr;
use tower::ServiceExt;

fn mdd_payload() -> serde_json::Value {
    json!({
        "diagnosisName": "Major Depressive Disorder",
        "justification": "Persistent depressed mood for 6 weeks; PHQ-9 of 18."
    })
}

#[tokio::test]
async fn first_post_creates_and_second_post_overwrites() {
    let (app, _store) = memory_app();
    let uri = format!("/api/diagnoses/{CLIENT_ONE}");

    let response = app
        .clone()
        .oneshot(json_request("POST", &uri, mdd_payload()))
        .await
        .expect("first post");
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = read_json(response).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["message"], "Diagnosis created successfully");
    assert_eq!(first["data"]["clientId"], CLIENT_ONE);
    assert!(first["data"]["challengedDiagnosis"].is_null());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            json!({
                "diagnosisName": "Persistent Depressive Disorder",
                "justification": "Symptoms span more than two years.",
                "challengedDiagnosis": "Adjustment Disorder"
            }),
        ))
        .await
        .expect("second post");
    assert_eq!(response.status(), StatusCode::OK);
    let second = read_json(response).await;
    assert_eq!(second["message"], "Diagnosis updated successfully");
    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["predictedDate"], first["data"]["predictedDate"]);

    let response = app
        .clone()
        .oneshot(get_request(&format!("{uri}/history")))
        .await
        .expect("history");
    assert_eq!(response.status(), StatusCode::OK);
    let history = read_json(response).await;
    assert_eq!(history["data"].as_array().expect("items").len(), 1);

    let response = app.oneshot(get_request(&uri)).await.expect("latest");
    assert_eq!(response.status(), StatusCode::OK);
    let latest = read_json(response).await;
    assert_eq!(latest["message"], "Diagnosis retrieved successfully");
    assert_eq!(
        latest["data"]["diagnosisName"],
        "Persistent Depressive Disorder"
    );
    assert_eq!(latest["data"]["challengedDiagnosis"], "Adjustment Disorder");
}

#[tokio::test]
async fn major_depressive_disorder_walkthrough() {
    let (app, _store) = memory_app();
    let uri = format!("/api/diagnoses/{CLIENT_ONE}");

    let created = read_json(
        app.clone()
            .oneshot(json_request("POST", &uri, mdd_payload()))
            .await
            .expect("post"),
    )
    .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();
    assert!(id.starts_with('c'));

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/diagnoses/{id}"),
            json!({
                "challengedDiagnosis": "Adjustment Disorder with Depressed Mood",
                "challengedJustification": "Onset follows a recent bereavement."
            }),
        ))
        .await
        .expect("put");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["message"], "Diagnosis updated successfully");
    assert_eq!(updated["data"]["diagnosisName"], "Major Depressive Disorder");

    let response = app
        .oneshot(get_request(&format!("/api/diagnoses/by-id/{id}")))
        .await
        .expect("by id");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json(response).await;
    assert_eq!(
        fetched["data"]["challengedDiagnosis"],
        "Adjustment Disorder with Depressed Mood"
    );
    assert_eq!(fetched["data"]["clientId"], CLIENT_ONE);
}

#[tokio::test]
async fn empty_put_is_rejected() {
    let (app, _store) = memory_app();
    let created = read_json(
        app.clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/diagnoses/{CLIENT_ONE}"),
                mdd_payload(),
            ))
            .await
            .expect("post"),
    )
    .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(json_request("PUT", &format!("/api/diagnoses/{id}"), json!({})))
        .await
        .expect("put");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No fields to update");

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/diagnoses/cmissing0000000000000000",
            json!({ "justification": "Updated" }),
        ))
        .await
        .expect("put missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["message"], "Diagnosis not found");
}

#[tokio::test]
async fn history_pages_newest_first() {
    let (app, store) = memory_app();
    let client = ClientId::from_str(CLIENT_TWO).expect("client");
    for n in 0..12 {
        store
            .create(
                &client,
                CreateDiagnosisRequest {
                    diagnosis_name: format!("D{n:02}"),
                    justification: "recorded".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("create");
    }

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/diagnoses/{CLIENT_TWO}/history?page=1&limit=5"
        )))
        .await
        .expect("history");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let names: Vec<_> = body["data"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item["diagnosisName"].as_str().expect("name").to_string())
        .collect();
    assert_eq!(names, vec!["D11", "D10", "D09", "D08", "D07"]);
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 5, "total": 5 }));
    assert_eq!(body["message"], "Diagnosis history retrieved successfully");

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/diagnoses/{CLIENT_TWO}/history?page=3&limit=5"
        )))
        .await
        .expect("history page 3");
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().expect("items").len(), 2);
    assert_eq!(body["pagination"]["total"], 2);

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/diagnoses/{CLIENT_TWO}/history?page=0&limit=500"
        )))
        .await
        .expect("clamped");
    let body = read_json(response).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["data"].as_array().expect("items").len(), 12);

    let response = app
        .oneshot(get_request(&format!(
            "/api/diagnoses/{CLIENT_TWO}/history"
        )))
        .await
        .expect("defaults");
    let body = read_json(response).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 10);
}

#[tokio::test]
async fn malformed_client_id_is_rejected_with_detail() {
    let (app, _store) = memory_app();
    for request in [
        get_request("/api/diagnoses/not-a-uuid"),
        json_request("POST", "/api/diagnoses/not-a-uuid", mdd_payload()),
        get_request("/api/diagnoses/not-a-uuid/history"),
    ] {
        let response = app.clone().oneshot(request).await.expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Validation error");
        assert_eq!(
            body["details"],
            json!([{ "field": "clientId", "message": "Invalid client ID format" }])
        );
    }
}

#[tokio::test]
async fn path_is_checked_before_body() {
    let (app, _store) = memory_app();
    let response = app
        .oneshot(json_request("POST", "/api/diagnoses/bogus", json!({})))
        .await
        .expect("post");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["details"][0]["field"], "clientId");
    assert_eq!(body["details"].as_array().expect("details").len(), 1);
}

#[tokio::test]
async fn malformed_diagnosis_id_is_rejected() {
    let (app, _store) = memory_app();
    let response = app
        .clone()
        .oneshot(get_request("/api/diagnoses/by-id/x-123"))
        .await
        .expect("by id");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(
        body["details"],
        json!([{ "field": "id", "message": "Invalid diagnosis ID format" }])
    );

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/diagnoses/x-123",
            json!({ "justification": "x" }),
        ))
        .await
        .expect("put");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["details"][0]["field"], "id");
}

#[tokio::test]
async fn missing_records_return_not_found() {
    let (app, _store) = memory_app();
    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/diagnoses/{CLIENT_ONE}")))
        .await
        .expect("latest");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["message"], "No diagnosis found for this client");

    let response = app
        .oneshot(get_request("/api/diagnoses/by-id/cmissing0000000000000000"))
        .await
        .expect("by id");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Diagnosis not found");
}

#[tokio::test]
async fn body_validation_reports_each_field() {
    let (app, store) = memory_app();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/diagnoses/{CLIENT_ONE}"),
            json!({
                "diagnosisName": "",
                "justification": "j".repeat(2001),
                "challengedDiagnosis": "c".repeat(501)
            }),
        ))
        .await
        .expect("post");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(
        body["details"],
        json!([
            { "field": "diagnosisName", "message": "Diagnosis name is required" },
            { "field": "justification", "message": "Justification too long" },
            { "field": "challengedDiagnosis", "message": "Challenged diagnosis too long" }
        ])
    );
    assert_eq!(store.count().await.expect("count"), 0);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/diagnoses/{CLIENT_ONE}"),
            json!({ "diagnosisName": 7, "justification": "ok" }),
        ))
        .await
        .expect("post");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["details"][0]["field"], "diagnosisName");
}

#[tokio::test]
async fn non_json_body_is_a_validation_error() {
    let (app, _store) = memory_app();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/diagnoses/{CLIENT_ONE}"))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("post");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Validation error");
    assert_eq!(body["details"][0]["field"], "body");
}

#[tokio::test]
async fn request_strings_are_sanitized() {
    let (app, _store) = memory_app();
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/diagnoses/{CLIENT_ONE}"),
            json!({
                "diagnosisName": "  Insomnia<script>alert('x')</script> ",
                "justification": "javascript:Sleep onset delay"
            }),
        ))
        .await
        .expect("post");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["data"]["diagnosisName"], "Insomnia");
    assert_eq!(body["data"]["justification"], "Sleep onset delay");
}

#[tokio::test]
async fn script_only_name_fails_required_rule() {
    let (app, _store) = memory_app();
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/diagnoses/{CLIENT_ONE}"),
            json!({
                "diagnosisName": "<script>x</script>",
                "justification": "fine"
            }),
        ))
        .await
        .expect("post");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["details"][0]["message"], "Diagnosis name is required");
}

#[tokio::test]
async fn non_integer_history_params_are_rejected() {
    let (app, _store) = memory_app();
    let response = app
        .oneshot(get_request(&format!(
            "/api/diagnoses/{CLIENT_ONE}/history?page=two"
        )))
        .await
        .expect("history");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(
        body["details"],
        json!([{ "field": "page", "message": "Page must be an integer" }])
    );
}

#[tokio::test]
async fn unsupported_methods_get_the_json_not_found_envelope() {
    let (app, _store) = memory_app();
    let cases = [
        ("DELETE", format!("/api/diagnoses/{CLIENT_ONE}")),
        ("POST", "/api/diagnoses/health".to_string()),
        ("PATCH", format!("/api/diagnoses/{CLIENT_ONE}/history")),
        ("DELETE", "/health".to_string()),
    ];
    for (method, uri) in cases {
        let response = app
            .clone()
            .oneshot(json_request(method, &uri, json!({})))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["message"], format!("Cannot {method} {uri}"));
    }
}
