use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stockable unit (part) in the shop's inventory.
///
/// Maps to the `inventory_items` table. `quantity` is the authoritative
/// quantity-on-hand and is mutated only through the stock ledger, never
/// written directly by CRUD updates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    /// Unique identifier for the item
    pub id: Uuid,

    /// Stock keeping unit (unique)
    pub sku: String,

    /// Display name
    pub name: String,

    /// Quantity on hand (never negative)
    pub quantity: i32,

    /// Purchase cost per unit
    pub cost_price: Decimal,

    /// Selling price per unit
    pub selling_price: Decimal,

    /// Threshold below which the item appears in low-stock alerts
    pub min_stock_level: i32,

    /// Whether the item is active (soft-deactivated items stay in history)
    pub is_active: bool,

    /// Timestamp when the item was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the item was last updated
    pub updated_at: DateTime<Utc>,
}

/// Inventory item creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItem {
    pub sku: String,
    pub name: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub min_stock_level: i32,
    /// Opening stock, recorded through the ledger as an initial `add` entry
    #[serde(default)]
    pub initial_quantity: i32,
}

/// Inventory item update request. Quantity is deliberately absent:
/// stock levels only move through ledger adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub min_stock_level: Option<i32>,
    pub is_active: Option<bool>,
}
