//! Simple REST API server example for the ticket engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Register a graduate account
//! - `POST /sessions` - Graduate sign-in
//! - `POST /tickets` - Generate a ticket
//! - `POST /validations` - Validate a ticket code
//! - `GET /accounts` - List all accounts
//! - `GET /accounts/:name` - Get an account by name
//! - `GET /tickets` - List all tickets
//!
//! ## Example Usage
//!
//! ```bash
//! # Register
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Maria Gonzalez", "password": "capandgown"}'
//!
//! # Generate a family ticket
//! curl -X POST http://localhost:3000/tickets \
//!   -H "Content-Type: application/json" \
//!   -d '{"account": "Maria Gonzalez", "type": "family", "guest_name": "Juan Gonzalez"}'
//!
//! # Validate a code
//! curl -X POST http://localhost:3000/validations \
//!   -H "Content-Type: application/json" \
//!   -d '{"code": "ABC123XY", "validator": "VAL001"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gradpass::{
    AccountSnapshot, Engine, Ticket, TicketError, TicketRequest, TicketType, Validation, Validator,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub account: String,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub guest_name: Option<String>,
    pub notes: Option<String>,
}

impl GenerateRequest {
    fn into_ticket_request(self) -> TicketRequest {
        let mut request = match self.ticket_type {
            TicketType::Graduate => TicketRequest::graduate(),
            TicketType::Family => TicketRequest::family(self.guest_name.unwrap_or_default()),
        };
        if let Some(notes) = self.notes {
            request = request.with_notes(notes);
        }
        request
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub validator: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the ticket engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `TicketError` into HTTP responses.
pub struct AppError(TicketError);

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            TicketError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
            TicketError::DuplicateAccount => (StatusCode::CONFLICT, "DUPLICATE_ACCOUNT"),
            TicketError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            TicketError::CredentialMismatch => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            TicketError::ValidatorNotFound => (StatusCode::UNAUTHORIZED, "VALIDATOR_NOT_FOUND"),
            TicketError::QuotaExceeded => (StatusCode::UNPROCESSABLE_ENTITY, "QUOTA_EXCEEDED"),
            TicketError::DuplicateGraduateTicket => {
                (StatusCode::CONFLICT, "DUPLICATE_GRADUATE_TICKET")
            }
            TicketError::DuplicateCode => (StatusCode::CONFLICT, "DUPLICATE_CODE"),
            TicketError::LedgerUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Wall-clock millis, nudged forward so concurrent requests never share a
/// timestamp. Keeps same-account codes distinct within one millisecond.
fn now_millis() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut tick = now;
    let _ = LAST.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        tick = now.max(last + 1);
        Some(tick)
    });
    tick
}

// === Handlers ===

/// POST /accounts - Register a graduate account.
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountSnapshot>), AppError> {
    let snapshot = state.engine.register(&request.name, &request.password)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// POST /sessions - Graduate sign-in.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let snapshot = state.engine.login(&request.name, &request.password)?;
    Ok(Json(snapshot))
}

/// POST /tickets - Generate a ticket.
async fn generate_ticket(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let account = request.account.clone();
    let ticket = state
        .engine
        .generate(&account, request.into_ticket_request(), now_millis())?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// POST /validations - Validate a ticket code.
async fn validate_ticket(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<Validation>, AppError> {
    let validator = state.engine.validator_login(&request.validator)?;
    let outcome = state
        .engine
        .validate(&request.code, validator.code(), now_millis())?;
    Ok(Json(outcome))
}

/// GET /accounts/:name - Get account by name.
async fn get_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AccountSnapshot>, AppError> {
    state
        .engine
        .account(&name)?
        .map(Json)
        .ok_or(AppError(TicketError::AccountNotFound))
}

/// GET /accounts - List all accounts.
async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountSnapshot>>, AppError> {
    Ok(Json(state.engine.accounts()?))
}

/// GET /tickets - List all tickets.
async fn list_tickets(State(state): State<AppState>) -> Result<Json<Vec<Ticket>>, AppError> {
    Ok(Json(state.engine.tickets()?))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(register).get(list_accounts))
        .route("/accounts/{name}", get(get_account))
        .route("/sessions", post(login))
        .route("/tickets", post(generate_ticket).get(list_tickets))
        .route("/validations", post(validate_ticket))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let engine = Engine::in_memory();
    // Demo gate crew; a deployment would seed these from configuration.
    engine.register_validator(Validator::new("VAL001", "Main gate"));
    engine.register_validator(Validator::new("VAL002", "Side entrance"));

    let state = AppState {
        engine: Arc::new(engine),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Gradpass API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /accounts     - Register a graduate account");
    println!("  POST /sessions     - Graduate sign-in");
    println!("  POST /tickets      - Generate a ticket");
    println!("  POST /validations  - Validate a ticket code");
    println!("  GET  /accounts     - List all accounts");
    println!("  GET  /tickets      - List all tickets");

    axum::serve(listener, app).await.unwrap();
}
