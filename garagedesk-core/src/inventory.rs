//! Inventory CRUD. Everything except quantity: stock levels only move
//! through the ledger, including the opening stock of a new item.

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, Actor, Role};
use crate::cache::{self, keys};
use crate::error::AppError;
use crate::ledger;
use crate::models::item::{CreateItem, UpdateItem};
use crate::models::{InventoryItem, StockAction};
use crate::AppState;

fn validate_create(request: &CreateItem) -> Result<(), AppError> {
    if request.sku.trim().is_empty() {
        return Err(AppError::Validation("SKU is required".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if request.cost_price < Decimal::ZERO || request.selling_price < Decimal::ZERO {
        return Err(AppError::Validation("prices cannot be negative".to_string()));
    }
    if request.min_stock_level < 0 || request.initial_quantity < 0 {
        return Err(AppError::Validation(
            "stock levels cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Creates an item, gated at `Admin`. The item starts at quantity 0; any
/// opening stock is recorded through the ledger so the audit history is
/// complete from the first unit.
pub async fn create_item(
    state: &AppState,
    request: CreateItem,
    actor: &Actor,
) -> Result<InventoryItem, AppError> {
    auth::require(Some(actor), Role::Admin)?;
    validate_create(&request)?;

    let mut tx = state.db.begin().await?;

    let mut item = sqlx::query_as::<_, InventoryItem>(
        r#"
        INSERT INTO inventory_items (sku, name, quantity, cost_price, selling_price, min_stock_level)
        VALUES ($1, $2, 0, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(request.sku.trim())
    .bind(request.name.trim())
    .bind(request.cost_price)
    .bind(request.selling_price)
    .bind(request.min_stock_level)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::or_conflict(e, "SKU already exists"))?;

    if request.initial_quantity > 0 {
        let log = ledger::apply_adjustment(
            &mut tx,
            item.id,
            StockAction::Add,
            request.initial_quantity,
            Some("initial stock".to_string()),
            None,
            actor,
        )
        .await?;
        item.quantity = log.new_quantity;
    }

    tx.commit().await?;

    state.cache.invalidate(keys::INVENTORY_LIST);
    state.cache.invalidate(keys::DASHBOARD_SUMMARY);

    info!("Created inventory item {} ({})", item.sku, item.id);
    Ok(item)
}

/// Updates item metadata and prices. Quantity is not touchable here.
pub async fn update_item(
    state: &AppState,
    item_id: Uuid,
    request: UpdateItem,
    actor: &Actor,
) -> Result<InventoryItem, AppError> {
    auth::require(Some(actor), Role::Admin)?;

    let item = sqlx::query_as::<_, InventoryItem>(
        r#"
        UPDATE inventory_items
        SET
            name = COALESCE($2, name),
            cost_price = COALESCE($3, cost_price),
            selling_price = COALESCE($4, selling_price),
            min_stock_level = COALESCE($5, min_stock_level),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(request.name)
    .bind(request.cost_price)
    .bind(request.selling_price)
    .bind(request.min_stock_level)
    .bind(request.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("inventory item".to_string()))?;

    state.cache.invalidate(keys::INVENTORY_LIST);
    state.cache.invalidate(keys::DASHBOARD_SUMMARY);

    Ok(item)
}

/// Soft-deactivates an item so it stays in history but can no longer be
/// sold. Gated at `SuperAdmin`.
pub async fn deactivate_item(
    state: &AppState,
    item_id: Uuid,
    actor: &Actor,
) -> Result<InventoryItem, AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    let item = sqlx::query_as::<_, InventoryItem>(
        "UPDATE inventory_items SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(item_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("inventory item".to_string()))?;

    state.cache.invalidate(keys::INVENTORY_LIST);
    state.cache.invalidate(keys::DASHBOARD_SUMMARY);

    info!("Deactivated inventory item {}", item.sku);
    Ok(item)
}

/// Hard-deletes an item and (by cascade) its ledger history. Gated at
/// `SuperAdmin`; invoice lines keep their denormalized data and lose only
/// the weak stock reference.
pub async fn delete_item(state: &AppState, item_id: Uuid, actor: &Actor) -> Result<(), AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
        .bind(item_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("inventory item".to_string()));
    }

    state.cache.invalidate(keys::INVENTORY_LIST);
    state.cache.invalidate(keys::DASHBOARD_SUMMARY);

    info!("Deleted inventory item {}", item_id);
    Ok(())
}

pub async fn get_item(state: &AppState, item_id: Uuid) -> Result<InventoryItem, AppError> {
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("inventory item".to_string()))?;
    Ok(item)
}

/// Lists all items, served read-through from the response cache under
/// `inventory:list`; every write path above invalidates it.
pub async fn list_items(state: &AppState) -> Result<Value, AppError> {
    cache::get_or_compute(
        state.cache.as_ref(),
        keys::INVENTORY_LIST,
        state.cache_ttl,
        || async {
            let items = sqlx::query_as::<_, InventoryItem>(
                "SELECT * FROM inventory_items ORDER BY sku",
            )
            .fetch_all(&state.db)
            .await?;
            serde_json::to_value(items).map_err(|e| AppError::Internal(e.to_string()))
        },
    )
    .await
}
