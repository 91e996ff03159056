//! Router configuration for the mail API.

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto::{AwardResponse, ClaimResponse, InboxMailResponse, MailUserRequest, MarkResponse};
use super::handlers::{self, claim_award, delete_mail, get_mail, list_mails, mark_read, AppState};
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// OpenAPI document for the mail API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::mail::list_mails,
        handlers::mail::get_mail,
        handlers::mail::mark_read,
        handlers::mail::claim_award,
        handlers::mail::delete_mail,
    ),
    components(schemas(
        MailUserRequest,
        InboxMailResponse,
        AwardResponse,
        ClaimResponse,
        MarkResponse
    )),
    modifiers(&BearerAuth),
    servers((url = "/api")),
    tags((name = "mail", description = "Player inbox and reward claims"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
    request_timeout: Duration,
) -> Router {
    let mail_routes = Router::new()
        .route("/list", post(list_mails))
        .route("/detail/:id", post(get_mail))
        .route("/read/:id", post(mark_read))
        .route("/getaward/:id", post(claim_award))
        .route("/delete/:id", post(delete_mail));

    let api_routes = Router::new().nest("/mail", mail_routes);

    // Clone jwt_state for the middleware closure
    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Create the router serving the OpenAPI document.
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
