//! A filter-backed axum route, driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use filterkit_core::{
    CatalogTranslator, FilterProvider, FilterRegistry, FilterType, ProviderConfig, Rule,
    RuleValidator, Setter,
};
use filterkit_http::{validate_request, HttpConfig, RequestFilterError};
use http::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Clone)]
struct AppState {
    provider: FilterProvider,
    config: Arc<HttpConfig>,
}

async fn create_user(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, RequestFilterError> {
    let filter = validate_request(&state.provider, "UserFilter", request, &state.config).await?;
    Ok(Json(json!({ "created": Value::from(filter.value()) })))
}

fn app() -> Router {
    let registry = Arc::new(FilterRegistry::new());
    registry
        .register(
            FilterType::builder("AddressFilter")
                .field("city", "post:city")
                .validator(RuleValidator::new().rule("city", Rule::Required))
                .build(),
        )
        .unwrap();
    registry
        .register(
            FilterType::builder("UserFilter")
                .field("name", "post:name")
                .field("age", "post:age")
                .field("page", "query:page")
                .nested("address", "AddressFilter")
                .setter("name", Setter::Trim)
                .setter("age", Setter::Integer)
                .validator(
                    RuleValidator::new()
                        .rule("name", Rule::Required)
                        .rule("age", Rule::Integer)
                        .rule("age", Rule::Min(18.0)),
                )
                .build(),
        )
        .unwrap();
    let config = HttpConfig::default();
    let provider = FilterProvider::new(registry, config.provider.clone())
        .unwrap()
        .with_translator(Arc::new(
            CatalogTranslator::new().with("This field is required", "is required"),
        ));
    let state = AppState {
        provider,
        config: Arc::new(config),
    };
    Router::new().route("/users", post(create_user)).with_state(state)
}

async fn send(uri: &str, body: Value) -> (StatusCode, Value) {
    let request = http::Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn valid_request_is_accepted() {
    let (status, body) = send(
        "/users?page=2",
        json!({ "name": "  Ann ", "age": "41", "address": { "city": "Oslo" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "created": { "name": "Ann", "age": 41, "page": "2", "address": { "city": "Oslo" } } })
    );
}

#[tokio::test]
async fn invalid_request_lists_nested_and_translated_errors() {
    let (status, body) = send("/users", json!({ "age": "12", "address": {} })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({
            "status": 422,
            "errors": {
                "name": "is required",
                "age": "Value is too small",
                "address": { "city": "is required" },
            }
        })
    );
}

#[test]
fn provider_config_is_shared_with_http_config() {
    let config = HttpConfig::default();
    assert_eq!(config.provider, ProviderConfig::default());
}
