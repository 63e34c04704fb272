//! End-to-end gateway behaviour, driven in-process through the router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, request::Parts, Method, Request, StatusCode},
    response::Response,
};
use serde_json::json;
use tower::ServiceExt;

use secure_gateway::config::{CorsConfig, GatewayConfig, ImageUrlPolicy, RateLimitPartition};
use secure_gateway::gateway::{HandlerError, SanitizedBody};

mod common;
use common::*;

fn contact_config() -> GatewayConfig {
    GatewayConfig::builder("contact")
        .required_fields(["name", "email", "message"])
        .cors(CorsConfig {
            allowed_origins: vec!["https://salon.example".into()],
            ..Default::default()
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_contact_form_is_trimmed_and_delivered() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));

    let body = json!({
        "name": "  Ana  ",
        "email": "ana@example.com ",
        "message": "\tHello\n",
        "honeypot": ""
    });
    let response = app.oneshot(json_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["received"]["name"], "Ana");
    assert_eq!(json["received"]["email"], "ana@example.com");
    assert_eq!(json["received"]["message"], "Hello");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_honeypot_rejects_without_calling_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));

    let body = json!({
        "name": "Bot",
        "email": "bot@example.com",
        "message": "spam",
        "honeypot": "http://spam.example"
    });
    let response = app.oneshot(json_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = read_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "Request rejected");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_field_is_named() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));

    let body = json!({ "name": "Ana", "email": "   ", "message": "Hi" });
    let response = app.oneshot(json_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Missing required field: email");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rate_limit_trips_on_request_over_max() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));
    let body = json!({ "name": "Ana", "email": "ana@example.com", "message": "Hi" });

    for i in 0..30 {
        let response = app
            .clone()
            .oneshot(json_request_from("198.51.100.1", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
    }

    let response = app
        .clone()
        .oneshot(json_request_from("198.51.100.1", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(read_json(response).await["error"], "Too many requests");
    assert_eq!(calls.load(Ordering::SeqCst), 30);

    // Another client is counted separately.
    let response = app
        .oneshot(json_request_from("198.51.100.2", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversize_body_rejected_before_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig::builder("contact")
        .max_body_bytes(64)
        .build()
        .unwrap();
    let app = gateway_router(&config, &dev_env(), echo_handler(calls.clone()));

    let body = json!({ "message": "x".repeat(200) });
    let response = app.oneshot(json_request(body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Request body exceeds 64 bytes");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_json_and_non_object() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig::builder("contact").build().unwrap();
    let app = gateway_router(&config, &dev_env(), echo_handler(calls.clone()));

    let response = app.clone().oneshot(json_request("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Invalid JSON payload");

    let response = app.oneshot(json_request("[1, 2, 3]")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "JSON payload must be an object");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_content_type_is_415() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));

    let request = Request::builder()
        .method(Method::POST)
        .uri(PATH)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("name=Ana"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_preflight_answers_without_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls.clone()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(PATH)
        .header(header::ORIGIN, "https://salon.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://salon.example");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_origin_is_not_echoed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls));

    let mut request = json_request(json!({"name": "A", "email": "a@b.c", "message": "m"}).to_string());
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "null");
}

#[tokio::test]
async fn test_bearer_auth() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig::builder("try-on")
        .require_auth(true)
        .rate_limit(RateLimitPartition::ByToken, 60_000, 30)
        .build()
        .unwrap();
    let app = gateway_router(&config, &dev_env(), echo_handler(calls.clone()));

    let response = app.clone().oneshot(json_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(read_json(response).await["error"], "Missing bearer token");

    let mut request = json_request("{}");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer wrong-token".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "Unauthorized");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let mut request = json_request("{}");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {SECRET}").parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_auth_without_configured_secret_rejects_everything() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig::builder("try-on").require_auth(true).build().unwrap();
    let env = secure_gateway::RuntimeEnv::new(None, secure_gateway::RuntimeMode::Development);
    let app = gateway_router(&config, &env, echo_handler(calls.clone()));

    let mut request = json_request("{}");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer anything".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_error_detail_only_in_development() {
    let config = GatewayConfig::builder("contact").build().unwrap();

    let app = gateway_router(&config, &dev_env(), failing_handler("smtp relay down"));
    let response = app.oneshot(json_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert_eq!(json["debug"], "smtp relay down");

    let app = gateway_router(&config, &prod_env(), failing_handler("smtp relay down"));
    let response = app.oneshot(json_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert!(json.get("debug").is_none());
}

#[tokio::test]
async fn test_handler_panic_becomes_500() {
    let config = GatewayConfig::builder("contact").build().unwrap();
    let handler = |_parts: Parts, _body: SanitizedBody| async move {
        if true {
            panic!("template missing");
        }
        Ok::<Response, HandlerError>(Response::default())
    };
    let app = gateway_router(&config, &prod_env(), handler);

    let response = app.oneshot(json_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(read_json(response).await["ok"], false);
}

#[tokio::test]
async fn test_image_url_policy_blocks_private_hosts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = GatewayConfig::builder("try-on")
        .required_fields(["imageUrl"])
        .image_url_policy(ImageUrlPolicy::default())
        .build()
        .unwrap();
    let app = gateway_router(&config, &dev_env(), echo_handler(calls.clone()));

    for url in [
        "https://127.0.0.1/photo.png",
        "https://10.0.0.5/photo.png",
        "https://169.254.169.254/latest/meta-data.png",
        "http://cdn.example.com/photo.png",
        "https://cdn.example.com/photo.gif",
    ] {
        let response = app
            .clone()
            .oneshot(json_request(json!({ "imageUrl": url }).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{url} should be rejected");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = app
        .oneshot(json_request(
            json!({ "imageUrl": " https://cdn.example.com/photo.PNG " }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_security_headers_on_success_and_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = gateway_router(&contact_config(), &dev_env(), echo_handler(calls));

    let ok = app
        .clone()
        .oneshot(json_request(json!({"name": "A", "email": "a@b.c", "message": "m"}).to_string()))
        .await
        .unwrap();
    let rejected = app.oneshot(json_request("{}")).await.unwrap();

    for response in [ok, rejected] {
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
        assert!(headers[header::STRICT_TRANSPORT_SECURITY]
            .to_str()
            .unwrap()
            .starts_with("max-age="));
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert_eq!(headers[header::VARY], "Origin");
    }
}
