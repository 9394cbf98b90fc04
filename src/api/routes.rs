use axum::{
    async_trait,
    extract::{multipart::MultipartRejection, FromRequest, FromRequestParts, Multipart, Path, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::api::types::*;
use crate::errors::{AppError, Result};
use crate::models::bank_account::BankAccount;
use crate::models::credit_report::{is_valid_score, CreditScoreResponse, NewCreditReport};
use crate::models::dispute::{Dispute, DisputeStatus, NewDispute};
use crate::models::subscription::{monthly_total, BillingFrequency, NewSubscription, Subscription};
use crate::models::transaction::{NewTransaction, Transaction, TransactionType};
use crate::models::user::{UserResponse, UserSummary};
use crate::services::credit::{detect_bureau, detect_score, parse_factors};
use crate::services::documents::{self, DocumentKind};
use crate::services::finance;
use crate::services::jwt::AuthenticatedUser;
use crate::services::llm::ChatMessage;
use crate::services::onboarding::{self, OnboardingStep};
use crate::services::plaid::{self, sync_window};
use crate::services::prompts;
use crate::services::uploads::{self, IncomingFile, StoredFile};
use crate::services::user_service::Registration;
use crate::state::AppState;
use crate::utils::middleware::rate_limit_middleware;
use crate::utils::validation::Validator;

/// JSON body extractor whose rejections use the API's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// The caller behind a valid `Authorization: Bearer` session.
pub struct AuthUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::AuthenticationError("Not authenticated".to_string()))?;

        match state.auth.validate_token(token).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(AppError::DatabaseError(e)) => Err(AppError::DatabaseError(e)),
            Err(e) => {
                info!(action = "auth_rejected", uri = %parts.uri, error = %e);
                Err(AppError::AuthenticationError("Not authenticated".to_string()))
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Login and register sit behind the per-IP rate limiter.
pub fn auth_router(state: AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware));

    Router::new()
        .merge(limited)
        .route("/api/logout", post(logout))
        .route("/api/user", get(current_user))
}

pub fn chat_router() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/onboarding/chat", post(onboarding_chat))
}

pub fn upload_router() -> Router<AppState> {
    Router::new()
        .route("/api/chat/upload", post(upload_documents))
        .route("/api/credit/upload-report", post(upload_credit_report))
}

pub fn credit_router() -> Router<AppState> {
    Router::new()
        .route("/api/credit/score", get(credit_score))
        .route("/api/credit/reports", post(create_credit_report))
        .route("/api/disputes", post(create_dispute).get(list_disputes))
        .route("/api/disputes/:id", patch(update_dispute))
}

pub fn finance_router() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", post(create_transaction))
        .route("/api/transactions/summary", get(transaction_summary))
        .route("/api/subscriptions", get(list_subscriptions).post(create_subscription))
        .route("/api/subscriptions/:id", delete(cancel_subscription))
}

pub fn plaid_router() -> Router<AppState> {
    Router::new()
        .route("/api/plaid/create-link-token", post(create_link_token))
        .route("/api/plaid/exchange-public-token", post(exchange_public_token))
        .route("/api/plaid/sync-transactions", post(sync_transactions))
        .route("/api/plaid/accounts", get(list_bank_accounts))
}

// Auth

#[utoipa::path(post, path = "/api/register", tag = "Auth", request_body = RegisterRequest,
    responses((status = 200, body = RegisterResponse), (status = 400, body = ErrorResponse), (status = 409, body = ErrorResponse), (status = 429, body = ErrorResponse)))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let user = state
        .users
        .register(Registration {
            username: req.username,
            password: req.password,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
        })
        .await?;
    let issued = state.auth.start_session(&user).await?;

    Ok(Json(RegisterResponse {
        message: "User registered successfully".to_string(),
        token: issued.token,
        expires_in: state.auth.session_ttl_seconds(),
        user: UserSummary::from(&user),
    }))
}

#[utoipa::path(post, path = "/api/login", tag = "Auth", request_body = LoginRequest,
    responses((status = 200, body = LoginResponse), (status = 400, body = ErrorResponse), (status = 401, body = ErrorResponse), (status = 429, body = ErrorResponse)))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let username = req.username.as_deref().map(str::trim).unwrap_or_default();
    let password = req.password.as_deref().unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::ValidationError("Username and password are required".to_string()));
    }

    match state.auth.login(username, password).await {
        Ok((user, issued)) => {
            info!(action = "login_success", user_id = user.id, user = %user.username);
            Ok(Json(LoginResponse {
                ok: true,
                message: "Login successful".to_string(),
                token: issued.token,
                expires_in: state.auth.session_ttl_seconds(),
                user: UserSummary::from(&user),
            }))
        }
        Err(e) => {
            warn!(action = "login_failed", user = %username, error = %e);
            Err(e)
        }
    }
}

#[utoipa::path(post, path = "/api/logout", tag = "Auth",
    responses((status = 200, body = MessageResponse), (status = 401, body = ErrorResponse)))]
pub async fn logout(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<MessageResponse>> {
    state.auth.logout(&user).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

#[utoipa::path(get, path = "/api/user", tag = "Auth",
    responses((status = 200, body = UserResponse), (status = 401, body = ErrorResponse)))]
pub async fn current_user(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<UserResponse>> {
    let user = state.users.get_user(user.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

// Assistant

#[utoipa::path(post, path = "/api/chat", tag = "Assistant", request_body = ChatRequest,
    responses((status = 200, body = ChatResponse), (status = 400, body = ErrorResponse), (status = 502, body = ErrorResponse)))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let message = req.message.trim();
    Validator::require_non_empty("Message", message)?;

    let profile = state.users.get_user(user.user_id).await?;
    let messages = [
        ChatMessage::system(prompts::chat_persona(&profile.first_name)),
        ChatMessage::user(message),
    ];
    let response = state.llm.complete(&messages, prompts::CHAT_OPTIONS).await?;

    info!(action = "chat_reply", user_id = user.user_id);
    Ok(Json(ChatResponse { response }))
}

#[utoipa::path(post, path = "/api/onboarding/chat", tag = "Assistant", request_body = OnboardingRequest,
    responses((status = 200, body = OnboardingResponse), (status = 400, body = ErrorResponse), (status = 502, body = ErrorResponse)))]
pub async fn onboarding_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<OnboardingRequest>,
) -> Result<Json<OnboardingResponse>> {
    let message = req.message.trim();
    Validator::require_non_empty("Message", message)?;

    let step = OnboardingStep::parse(req.current_step.as_deref());
    let data = req.onboarding_data.unwrap_or_default();
    let profile = state.users.get_user(user.user_id).await?;

    let messages = [
        ChatMessage::system(prompts::ONBOARDING),
        ChatMessage::system(onboarding::state_message(step, Some(&profile.first_name), &data)),
        ChatMessage::user(message),
    ];
    let response = state.llm.complete(&messages, prompts::ONBOARDING_OPTIONS).await?;
    let progress = onboarding::advance(step, data, message);

    info!(
        action = "onboarding_step",
        user_id = user.user_id,
        step = step.as_str(),
        next_step = progress.next_step.as_str()
    );
    Ok(Json(OnboardingResponse {
        response,
        next_step: progress.next_step,
        updated_data: progress.data,
    }))
}

// Uploads

/// Multipart upload of up to five documents in the `files` field, analysed together.
#[utoipa::path(post, path = "/api/chat/upload", tag = "Assistant",
    responses((status = 200, body = UploadResponse), (status = 400, body = UploadErrorResponse), (status = 502, body = UploadErrorResponse)))]
pub async fn upload_documents(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let result = match multipart {
        Ok(multipart) => analyze_upload(&state, user.user_id, multipart).await,
        Err(rejection) => Err(rejection.into()),
    };

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => upload_failure(user.user_id, e),
    }
}

async fn analyze_upload(state: &AppState, user_id: i64, multipart: Multipart) -> Result<UploadResponse> {
    let files = read_files(multipart, "files").await?;
    let stored = state.uploads.save_all(&files).await?;

    match analyze_documents(state, files, &stored).await {
        Ok(analysis) => {
            info!(action = "upload_analyzed", user_id, files = stored.len());
            Ok(UploadResponse {
                success: true,
                files: stored,
                analysis,
            })
        }
        Err(e) => {
            uploads::cleanup(&stored).await;
            Err(e)
        }
    }
}

async fn analyze_documents(state: &AppState, files: Vec<IncomingFile>, stored: &[StoredFile]) -> Result<String> {
    let kinds = stored.iter().map(|file| file.kind).collect();
    let texts = extract_texts(files, kinds).await?;
    let messages = [
        ChatMessage::system(prompts::DOCUMENT_ANALYSIS),
        ChatMessage::user(prompts::document_analysis_request(&texts)),
    ];
    state.llm.complete(&messages, prompts::ANALYSIS_OPTIONS).await
}

/// Text extraction is CPU bound, so it runs off the async workers.
async fn extract_texts(files: Vec<IncomingFile>, kinds: Vec<DocumentKind>) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || {
        files
            .iter()
            .zip(kinds)
            .map(|(file, kind)| {
                documents::extract_text(kind, &file.file_name, &file.bytes)
                    .map(|text| format!("--- {} ---\n{}", file.file_name, text))
            })
            .collect::<Result<Vec<_>>>()
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Document extraction task failed: {}", e)))?
}

async fn read_files(mut multipart: Multipart, field_name: &str) -> Result<Vec<IncomingFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        files.push(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

fn upload_failure(user_id: i64, err: AppError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(action = "upload_failed", user_id, status = %status, error = %err);
    } else {
        warn!(action = "upload_rejected", user_id, error = %err);
    }
    (
        status,
        Json(UploadErrorResponse {
            success: false,
            error: err.public_message(),
        }),
    )
        .into_response()
}

// Credit

#[utoipa::path(get, path = "/api/credit/score", tag = "Credit",
    responses((status = 200, body = CreditScoreResponse), (status = 401, body = ErrorResponse), (status = 404, body = ErrorResponse)))]
pub async fn credit_score(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<CreditScoreResponse>> {
    let report = state
        .db
        .get_latest_credit_report(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No credit report found".to_string()))?;
    Ok(Json(CreditScoreResponse::from(report)))
}

#[utoipa::path(post, path = "/api/credit/reports", tag = "Credit", request_body = CreditReportRequest,
    responses((status = 201, body = CreditScoreResponse), (status = 400, body = ErrorResponse)))]
pub async fn create_credit_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreditReportRequest>,
) -> Result<impl IntoResponse> {
    if !is_valid_score(req.score) {
        return Err(AppError::ValidationError("Credit score must be between 300 and 850".to_string()));
    }
    let bureau = req.bureau.trim();
    Validator::require_non_empty("Bureau", bureau)?;

    let report = state
        .db
        .insert_credit_report(&NewCreditReport {
            user_id: user.user_id,
            score: req.score,
            bureau: bureau.to_string(),
            factors: req.factors,
            report_data: req.report_data,
        })
        .await?;

    info!(action = "credit_report_created", user_id = user.user_id, report_id = report.id);
    Ok((StatusCode::CREATED, Json(CreditScoreResponse::from(report))))
}

/// Multipart upload of one credit report in the `file` field.
#[utoipa::path(post, path = "/api/credit/upload-report", tag = "Credit",
    responses((status = 201, body = CreditUploadResponse), (status = 400, body = ErrorResponse), (status = 502, body = ErrorResponse)))]
pub async fn upload_credit_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let files = read_files(multipart?, "file").await?;
    if files.len() > 1 {
        return Err(AppError::UploadError("Upload a single credit report".to_string()));
    }
    let stored = state.uploads.save_all(&files).await?;

    match import_credit_report(&state, user.user_id, files, &stored).await {
        Ok((report, factors)) => Ok((
            StatusCode::CREATED,
            Json(CreditUploadResponse {
                report,
                factors,
                file: stored.into_iter().next().ok_or_else(|| {
                    AppError::InternalError("Stored credit report is missing".to_string())
                })?,
            }),
        )),
        Err(e) => {
            uploads::cleanup(&stored).await;
            Err(e)
        }
    }
}

async fn import_credit_report(
    state: &AppState,
    user_id: i64,
    files: Vec<IncomingFile>,
    stored: &[StoredFile],
) -> Result<(CreditScoreResponse, Vec<String>)> {
    let kinds = stored.iter().map(|file| file.kind).collect();
    let text = extract_texts(files, kinds).await?.join("\n");

    let score = detect_score(&text)
        .ok_or_else(|| AppError::ValidationError("Could not find a credit score in the report".to_string()))?;
    let bureau = detect_bureau(&text);

    let messages = [
        ChatMessage::system(prompts::CREDIT_FACTORS),
        ChatMessage::user(text.clone()),
    ];
    let factors = parse_factors(&state.llm.complete(&messages, prompts::ANALYSIS_OPTIONS).await?);

    let report = state
        .db
        .insert_credit_report(&NewCreditReport {
            user_id,
            score,
            bureau,
            factors: (!factors.is_empty()).then(|| factors.join("\n")),
            report_data: Some(text),
        })
        .await?;

    info!(action = "credit_report_imported", user_id, report_id = report.id, score);
    Ok((CreditScoreResponse::from(report), factors))
}

#[utoipa::path(post, path = "/api/disputes", tag = "Credit", request_body = CreateDisputeRequest,
    responses((status = 201, body = Dispute), (status = 400, body = ErrorResponse), (status = 502, body = ErrorResponse)))]
pub async fn create_dispute(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateDisputeRequest>,
) -> Result<impl IntoResponse> {
    let creditor = req.creditor.trim();
    let reason = req.reason.trim();
    Validator::require_non_empty("Creditor", creditor)?;
    Validator::require_non_empty("Reason", reason)?;
    let account_number = req
        .account_number
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    let profile = state.users.get_user(user.user_id).await?;
    let full_name = format!("{} {}", profile.first_name, profile.last_name);
    let messages = [
        ChatMessage::system(prompts::DISPUTE_LETTER),
        ChatMessage::user(prompts::dispute_request(&full_name, creditor, account_number.as_deref(), reason)),
    ];
    let letter = state.llm.complete(&messages, prompts::ANALYSIS_OPTIONS).await?;

    let dispute = state
        .db
        .create_dispute(&NewDispute {
            user_id: user.user_id,
            creditor: creditor.to_string(),
            account_number,
            reason: reason.to_string(),
            letter_content: Some(letter),
        })
        .await?;

    info!(action = "dispute_created", user_id = user.user_id, dispute_id = dispute.id);
    Ok((StatusCode::CREATED, Json(dispute)))
}

#[utoipa::path(get, path = "/api/disputes", tag = "Credit", responses((status = 200, body = [Dispute])))]
pub async fn list_disputes(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Vec<Dispute>>> {
    Ok(Json(state.db.get_user_disputes(user.user_id).await?))
}

#[utoipa::path(patch, path = "/api/disputes/{id}", tag = "Credit", request_body = UpdateDisputeRequest,
    params(("id" = i64, Path, description = "Dispute id")),
    responses((status = 200, body = Dispute), (status = 400, body = ErrorResponse), (status = 404, body = ErrorResponse)))]
pub async fn update_dispute(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateDisputeRequest>,
) -> Result<Json<Dispute>> {
    let next: DisputeStatus = req.status.trim().parse()?;
    let not_found = || AppError::NotFound("Dispute not found".to_string());

    let dispute = state.db.get_dispute(user.user_id, id).await?.ok_or_else(not_found)?;
    if !dispute.status.can_transition_to(next) {
        return Err(AppError::ValidationError(format!(
            "Cannot move a {} dispute to {}",
            dispute.status.as_str(),
            next.as_str()
        )));
    }

    if !state
        .db
        .update_dispute_status(user.user_id, id, dispute.status, next)
        .await?
    {
        return Err(AppError::ValidationError(
            "Dispute was updated by another request; reload and try again".to_string(),
        ));
    }
    info!(action = "dispute_status_changed", user_id = user.user_id, dispute_id = id, status = next.as_str());

    let updated = state.db.get_dispute(user.user_id, id).await?.ok_or_else(not_found)?;
    Ok(Json(updated))
}

// Transactions and subscriptions

#[utoipa::path(get, path = "/api/transactions/summary", tag = "Finance",
    responses((status = 200, body = TransactionSummaryResponse), (status = 401, body = ErrorResponse)))]
pub async fn transaction_summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<TransactionSummaryResponse>> {
    let transactions = state.db.get_user_transactions(user.user_id).await?;
    let totals = finance::totals(&transactions)?;
    let trends = finance::balance_trend(&transactions)?;

    Ok(Json(TransactionSummaryResponse {
        balance: totals.balance,
        income: totals.income,
        expenses: totals.expenses,
        transactions,
        trends,
    }))
}

#[utoipa::path(post, path = "/api/transactions", tag = "Finance", request_body = CreateTransactionRequest,
    responses((status = 201, body = Transaction), (status = 400, body = ErrorResponse)))]
pub async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateTransactionRequest>,
) -> Result<impl IntoResponse> {
    let transaction_type: TransactionType = req.transaction_type.trim().parse()?;
    Validator::validate_amount(req.amount)?;
    if let Some(date) = &req.date {
        Validator::validate_date("Date", date)?;
    }

    let transaction = state
        .db
        .insert_transaction(&NewTransaction {
            user_id: user.user_id,
            transaction_type,
            amount: req.amount,
            category: req.category.filter(|c| !c.trim().is_empty()),
            description: req.description.filter(|d| !d.trim().is_empty()),
            date: req.date.unwrap_or_else(chrono::Utc::now),
            plaid_id: None,
            merchant_name: None,
            account_id: None,
            pending: false,
        })
        .await?;

    info!(action = "transaction_created", user_id = user.user_id, transaction_id = transaction.id);
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[utoipa::path(get, path = "/api/subscriptions", tag = "Finance",
    responses((status = 200, body = SubscriptionsResponse)))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SubscriptionsResponse>> {
    let subscriptions = state.db.get_user_subscriptions(user.user_id).await?;
    Ok(Json(SubscriptionsResponse {
        monthly_total: monthly_total(&subscriptions)?,
        subscriptions,
    }))
}

#[utoipa::path(post, path = "/api/subscriptions", tag = "Finance", request_body = CreateSubscriptionRequest,
    responses((status = 201, body = Subscription), (status = 400, body = ErrorResponse)))]
pub async fn create_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse> {
    let name = req.name.trim();
    Validator::require_non_empty("Name", name)?;
    Validator::validate_amount(req.amount)?;
    if let Some(next_billing) = &req.next_billing {
        Validator::validate_date("Next billing date", next_billing)?;
    }
    let frequency: BillingFrequency = req.frequency.trim().parse()?;

    let subscription = state
        .db
        .create_subscription(&NewSubscription {
            user_id: user.user_id,
            name: name.to_string(),
            amount: req.amount,
            frequency,
            next_billing: req.next_billing,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

#[utoipa::path(delete, path = "/api/subscriptions/{id}", tag = "Finance",
    params(("id" = i64, Path, description = "Subscription id")),
    responses((status = 200, body = MessageResponse), (status = 404, body = ErrorResponse)))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    if !state.db.deactivate_subscription(user.user_id, id).await? {
        return Err(AppError::NotFound("Subscription not found".to_string()));
    }
    info!(action = "subscription_cancelled", user_id = user.user_id, subscription_id = id);
    Ok(Json(MessageResponse {
        message: "Subscription cancelled".to_string(),
    }))
}

// Plaid

#[utoipa::path(post, path = "/api/plaid/create-link-token", tag = "Plaid",
    responses((status = 200, body = LinkTokenResponse), (status = 502, body = ErrorResponse)))]
pub async fn create_link_token(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<LinkTokenResponse>> {
    let link_token = state.bank_data.create_link_token(user.user_id).await?;
    Ok(Json(LinkTokenResponse { link_token }))
}

#[utoipa::path(post, path = "/api/plaid/exchange-public-token", tag = "Plaid", request_body = ExchangeTokenRequest,
    responses((status = 200, body = ExchangeTokenResponse), (status = 400, body = ErrorResponse), (status = 502, body = ErrorResponse)))]
pub async fn exchange_public_token(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ExchangeTokenRequest>,
) -> Result<Json<ExchangeTokenResponse>> {
    let public_token = req.public_token.trim();
    Validator::require_non_empty("Public token", public_token)?;
    let institution_name = req
        .institution_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let item = state.bank_data.exchange_public_token(public_token).await?;
    state
        .db
        .store_plaid_item(user.user_id, &item.item_id, &item.access_token, institution_name.as_deref())
        .await?;

    let linked = state.bank_data.get_accounts(&item.access_token).await?;
    let institution = institution_name.as_deref().unwrap_or("Unknown institution");
    for account in &linked {
        state
            .db
            .upsert_bank_account(&plaid::to_new_bank_account(user.user_id, institution, account))
            .await?;
    }

    let linked_ids: HashSet<&str> = linked.iter().map(|a| a.account_id.as_str()).collect();
    let accounts: Vec<BankAccount> = state
        .db
        .get_user_bank_accounts(user.user_id)
        .await?
        .into_iter()
        .filter(|a| a.plaid_account_id.as_deref().is_some_and(|id| linked_ids.contains(id)))
        .collect();

    info!(action = "plaid_item_linked", user_id = user.user_id, item_id = %item.item_id, accounts = accounts.len());
    Ok(Json(ExchangeTokenResponse {
        item_id: item.item_id,
        accounts,
    }))
}

#[utoipa::path(post, path = "/api/plaid/sync-transactions", tag = "Plaid",
    responses((status = 200, body = SyncResponse), (status = 502, body = ErrorResponse)))]
pub async fn sync_transactions(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<SyncResponse>> {
    let (start, end) = sync_window(plaid::today());
    let mut synced = 0;

    for item in state.db.get_user_plaid_items(user.user_id).await? {
        let transactions = state
            .bank_data
            .get_transactions(&item.access_token, start, end)
            .await?;
        for tx in &transactions {
            if state
                .db
                .upsert_plaid_transaction(&plaid::to_new_transaction(user.user_id, tx))
                .await?
            {
                synced += 1;
            }
        }
    }

    info!(action = "plaid_sync", user_id = user.user_id, synced);
    Ok(Json(SyncResponse { synced }))
}

#[utoipa::path(get, path = "/api/plaid/accounts", tag = "Plaid",
    responses((status = 200, body = AccountsResponse)))]
pub async fn list_bank_accounts(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<AccountsResponse>> {
    let accounts = state.db.get_user_bank_accounts(user.user_id).await?;
    Ok(Json(AccountsResponse { accounts }))
}

// Meta

#[utoipa::path(get, path = "/api/health", tag = "Meta", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
