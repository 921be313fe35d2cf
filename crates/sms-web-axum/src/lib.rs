use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sms_core::{Headers, WebhookResponse};
use sms_relay::RelayProcessor;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub processor: RelayProcessor,
}

/// Copy axum headers into the framework-neutral representation.
pub fn to_generic_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Turn a framework-neutral response into an axum response.
pub fn from_webhook_response(response: WebhookResponse) -> Response {
    let status = StatusCode::from_u16(response.status.as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = HeaderValue::from_str(&response.content_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}

/// GET /
pub async fn liveness() -> &'static str {
    "SMS relay is running"
}

/// POST /start-webhook
pub async fn start_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    from_webhook_response(state.processor.process_start(&body).await)
}

/// POST /send-message
pub async fn send_message(State(state): State<AppState>, body: Bytes) -> Response {
    from_webhook_response(state.processor.process_send(&body).await)
}

/// POST /twilio-reply
pub async fn twilio_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let generic_headers = to_generic_headers(&headers);
    from_webhook_response(state.processor.process_reply(&generic_headers, &body).await)
}

/// GET /father-response
pub async fn father_response(State(state): State<AppState>) -> Response {
    from_webhook_response(state.processor.process_latest().await)
}

/// CORS restricted to `allowed_origins`, GET/POST only, no credentials.
///
/// `*` is not an origin; it is dropped with a warning.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter_map(|origin| {
            if origin == "*" {
                warn!("Ignoring wildcard CORS origin, list explicit origins instead");
                return None;
            }
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(false)
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/start-webhook", post(start_webhook))
        .route("/send-message", post(send_message))
        .route("/twilio-reply", post(twilio_reply))
        .route("/father-response", get(father_response))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sms_relay::test_util::{FakeSms, MemoryStore};
    use sms_relay::RelaySettings;
    use sms_twilio::TwilioClient;
    use std::sync::Arc;
    use tower::ServiceExt;

    const ORIGINS: [&str; 2] = ["http://localhost:5173", "https://app.example.com"];

    fn app(store: Arc<MemoryStore>) -> Router {
        let processor = RelayProcessor::new(
            Arc::new(FakeSms::default()),
            Arc::new(TwilioClient::new("AC123", "secret")),
            store,
            RelaySettings {
                destination: "+15550002222".into(),
                sender: "+15550001111".into(),
                ..RelaySettings::default()
            },
        );
        let origins: Vec<String> = ORIGINS.iter().map(|o| o.to_string()).collect();
        router(AppState { processor }, &origins)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "SMS relay is running");
    }

    #[tokio::test]
    async fn start_webhook_returns_json_receipt() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::post("/start-webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"courseId":"c-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "sent");
        assert_eq!(body["to"], "+15550002222");
    }

    #[tokio::test]
    async fn send_message_relays_text() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::post("/send-message")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"to":"+15550003333","message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["sid"], "SM-fake-1");
    }

    #[tokio::test]
    async fn send_message_without_destination_is_400() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::post("/send-message")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wildcard_origin_is_dropped_not_fatal() {
        let processor = RelayProcessor::new(
            Arc::new(FakeSms::default()),
            Arc::new(TwilioClient::new("AC123", "secret")),
            Arc::new(MemoryStore::default()),
            RelaySettings::default(),
        );
        let origins = vec!["*".to_string(), ORIGINS[0].to_string()];
        let app = router(AppState { processor }, &origins);

        let response = app
            .clone()
            .oneshot(
                Request::get("/")
                    .header(header::ORIGIN, ORIGINS[0])
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGINS[0]);

        let response = app
            .oneshot(
                Request::get("/")
                    .header(header::ORIGIN, "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn reply_webhook_answers_with_twiml() {
        let store = Arc::new(MemoryStore::default());
        let response = app(store.clone())
            .oneshot(
                Request::post("/twilio-reply")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("From=%2B15550002222&Body=+b+"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        assert!(body_string(response).await.contains("<Response><Message>"));
        assert_eq!(store.statements()[0].response(), Some("B"));
    }

    #[tokio::test]
    async fn reply_webhook_store_failure_is_500() {
        let response = app(Arc::new(MemoryStore::failing_writes()))
            .oneshot(
                Request::post("/twilio-reply")
                    .body(Body::from("From=%2B15550002222&Body=a"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_string(response).await.contains("<Response>"));
    }

    #[tokio::test]
    async fn father_response_round_trip() {
        let store = Arc::new(MemoryStore::default());
        let app = app(store);

        let response = app
            .clone()
            .oneshot(Request::get("/father-response").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_string(response).await,
            r#"{"response":"No response yet"}"#
        );

        app.clone()
            .oneshot(
                Request::post("/twilio-reply")
                    .body(Body::from("From=%2B15550002222&Body=c"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/father-response").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["response"], "Call me when you're done");
        assert_eq!(body["raw"], "C");
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(Request::get("/twilio-reply").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn cors_allows_listed_origin() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/start-webhook")
                    .header(header::ORIGIN, ORIGINS[1])
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGINS[1]);
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("GET") && methods.contains("POST"));
        assert!(!methods.contains("DELETE"));
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[tokio::test]
    async fn cors_ignores_unlisted_origin() {
        let response = app(Arc::new(MemoryStore::default()))
            .oneshot(
                Request::get("/")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
