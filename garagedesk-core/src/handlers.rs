//! Thin HTTP surface: axum handlers delegating to the core modules, plus
//! the router wiring. All domain decisions live in the modules; handlers
//! only extract, delegate and serialize.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, patch, post, put};
use axum::{middleware, Extension, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::error::AppError;
use crate::invoice::composer::InvoiceDetail;
use crate::ledger::AdjustStockRequest;
use crate::models::admin::{AdminResponse, CreateAdmin, LoginRequest, LoginResponse, UpdateRole};
use crate::models::invoice::{CreateInvoiceRequest, InvoiceSummary, UpdateStatusRequest};
use crate::models::item::{CreateItem, UpdateItem};
use crate::models::{Invoice, InventoryItem, StockAdjustmentLog};
use crate::{admin, dashboard, inventory, invoice, ledger, AppState};

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "garagedesk-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(admin::verify_login(&state, request).await?))
}

async fn create_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    let detail = invoice::create_invoice(&state, request, &actor).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    Ok(Json(invoice::list_invoices(&state).await?))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    Ok(Json(invoice::get_invoice(&state, invoice_id).await?))
}

async fn update_invoice_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Invoice>, AppError> {
    let updated = invoice::update_status(&state, invoice_id, request.status, &actor).await?;
    Ok(Json(updated))
}

async fn create_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateItem>,
) -> Result<(StatusCode, Json<InventoryItem>), AppError> {
    let item = inventory::create_item(&state, request, &actor).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_items(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(inventory::list_items(&state).await?))
}

async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItem>, AppError> {
    Ok(Json(inventory::get_item(&state, item_id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateItem>,
) -> Result<Json<InventoryItem>, AppError> {
    Ok(Json(
        inventory::update_item(&state, item_id, request, &actor).await?,
    ))
}

async fn deactivate_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItem>, AppError> {
    Ok(Json(
        inventory::deactivate_item(&state, item_id, &actor).await?,
    ))
}

async fn delete_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    inventory::delete_item(&state, item_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_stock(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(item_id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<StockAdjustmentLog>, AppError> {
    Ok(Json(ledger::adjust(&state, item_id, request, &actor).await?))
}

async fn stock_history(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Vec<StockAdjustmentLog>>, AppError> {
    Ok(Json(ledger::history(&state, item_id).await?))
}

async fn dashboard_summary(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(dashboard::summary(&state).await?))
}

async fn create_admin(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAdmin>,
) -> Result<(StatusCode, Json<AdminResponse>), AppError> {
    let created = admin::create_admin(&state, request, &actor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_admins(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<AdminResponse>>, AppError> {
    Ok(Json(admin::list_admins(&state, &actor).await?))
}

async fn update_admin_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(admin_id): Path<Uuid>,
    Json(request): Json<UpdateRole>,
) -> Result<Json<AdminResponse>, AppError> {
    Ok(Json(
        admin::update_role(&state, admin_id, request.role, &actor).await?,
    ))
}

async fn delete_admin(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(admin_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    admin::delete_admin(&state, admin_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates the application router: public health/login routes plus the
/// JWT-protected API.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/invoices", post(create_invoice).get(list_invoices))
        .route("/api/invoices/:id", get(get_invoice))
        .route("/api/invoices/:id/status", patch(update_invoice_status))
        .route("/api/inventory", post(create_item).get(list_items))
        .route(
            "/api/inventory/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/api/inventory/:id/deactivate", post(deactivate_item))
        .route("/api/inventory/:id/adjust", post(adjust_stock))
        .route("/api/inventory/:id/history", get(stock_history))
        .route("/api/dashboard", get(dashboard_summary))
        .route("/api/admins", post(create_admin).get(list_admins))
        .route("/api/admins/:id", delete(delete_admin))
        .route("/api/admins/:id/role", put(update_admin_role))
        .route_layer(middleware::from_fn(auth::jwt_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/api/login", post(login))
        .merge(protected)
        .with_state(state)
}
