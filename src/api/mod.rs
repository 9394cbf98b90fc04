use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{Modify, OpenApi};
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::utils::middleware::request_id_middleware;

pub mod routes;
pub mod types;

/// Multipart bodies carry up to `max_files` files plus form overhead.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::register,
        routes::login,
        routes::logout,
        routes::current_user,
        routes::chat,
        routes::onboarding_chat,
        routes::upload_documents,
        routes::credit_score,
        routes::create_credit_report,
        routes::upload_credit_report,
        routes::create_dispute,
        routes::list_disputes,
        routes::update_dispute,
        routes::transaction_summary,
        routes::create_transaction,
        routes::list_subscriptions,
        routes::create_subscription,
        routes::cancel_subscription,
        routes::create_link_token,
        routes::exchange_public_token,
        routes::sync_transactions,
        routes::list_bank_accounts,
        routes::health,
    ),
    components(
        schemas(
            types::RegisterRequest,
            types::RegisterResponse,
            types::LoginRequest,
            types::LoginResponse,
            types::MessageResponse,
            types::ErrorResponse,
            types::HealthResponse,
            types::ChatRequest,
            types::ChatResponse,
            types::UploadResponse,
            types::UploadErrorResponse,
            types::CreditReportRequest,
            types::CreditUploadResponse,
            types::CreateDisputeRequest,
            types::UpdateDisputeRequest,
            types::TransactionSummaryResponse,
            types::CreateTransactionRequest,
            types::LinkTokenResponse,
            types::ExchangeTokenRequest,
            types::ExchangeTokenResponse,
            types::SyncResponse,
            types::AccountsResponse,
            types::SubscriptionsResponse,
            types::CreateSubscriptionRequest,
            types::OnboardingRequest,
            types::OnboardingResponse,
            crate::models::user::UserResponse,
            crate::models::user::UserSummary,
            crate::models::transaction::Transaction,
            crate::models::transaction::TransactionType,
            crate::models::credit_report::CreditScoreResponse,
            crate::models::credit_report::CreditRating,
            crate::models::dispute::Dispute,
            crate::models::dispute::DisputeStatus,
            crate::models::bank_account::BankAccount,
            crate::models::subscription::Subscription,
            crate::models::subscription::BillingFrequency,
            crate::services::finance::TrendPoint,
            crate::services::onboarding::OnboardingData,
            crate::services::onboarding::OnboardingStep,
            crate::services::uploads::StoredFile,
        )
    ),
    tags(
        (name = "Auth", description = "Registration and sessions. Paste the login token into Authorize as a bearer token."),
        (name = "Assistant", description = "Andy AI chat, onboarding and document analysis"),
        (name = "Credit", description = "Credit score, credit reports and dispute letters"),
        (name = "Finance", description = "Transactions, balance summary and subscriptions"),
        (name = "Plaid", description = "Bank account linking and transaction sync"),
        (name = "Meta", description = "Service health")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityRequirement, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.security = Some(vec![SecurityRequirement::new("bearerAuth", Vec::<String>::new())]);
    }
}

/// Builds the full application: API routes, docs, CORS and request ids.
pub fn router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();
    let upload_limit = state
        .uploads
        .max_files()
        .saturating_mul(state.uploads.max_file_bytes())
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(routes::auth_router(state.clone()))
        .merge(routes::chat_router())
        .merge(routes::upload_router().layer(DefaultBodyLimit::max(upload_limit)))
        .merge(routes::credit_router())
        .merge(routes::finance_router())
        .merge(routes::plaid_router())
        .route("/api/health", get(routes::health))
        .with_state(state)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", openapi.clone()))
        .merge(Redoc::with_url("/api/redoc", openapi))
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
}

/// Serves the API on `0.0.0.0:PORT` until the process stops.
pub async fn start_http_server(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(action = "server_started", addr = %addr, docs = "/api/docs");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::InternalError(format!("HTTP server stopped: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/login",
            "/api/chat/upload",
            "/api/credit/score",
            "/api/disputes/{id}",
            "/api/transactions/summary",
            "/api/plaid/sync-transactions",
            "/api/subscriptions",
            "/api/onboarding/chat",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc["components"]["securitySchemes"]["bearerAuth"].is_object());
    }
}
