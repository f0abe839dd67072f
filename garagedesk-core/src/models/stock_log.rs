use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Kind of stock mutation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    /// Add `quantity` units to the current level
    #[sqlx(rename = "add")]
    Add,

    /// Remove `quantity` units from the current level
    #[sqlx(rename = "remove")]
    Remove,

    /// Set the level to `quantity` verbatim
    #[sqlx(rename = "adjust")]
    Adjust,

    /// Subtraction driven by invoice creation; reserved for the composer
    #[sqlx(rename = "invoice_deduct")]
    InvoiceDeduct,
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockAction::Add => write!(f, "add"),
            StockAction::Remove => write!(f, "remove"),
            StockAction::Adjust => write!(f, "adjust"),
            StockAction::InvoiceDeduct => write!(f, "invoice_deduct"),
        }
    }
}

/// Immutable audit record for one stock mutation.
///
/// Maps to the `inventory_logs` table. Append-only: rows are created once
/// per mutation and never updated or deleted. For every row,
/// `new_quantity = previous_quantity + quantity_change`, and `new_quantity`
/// equals the item's stored quantity immediately after the paired update.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockAdjustmentLog {
    /// Unique identifier for the log entry
    pub id: Uuid,

    /// The inventory item this entry belongs to
    pub item_id: Uuid,

    /// Kind of mutation
    pub action: StockAction,

    /// Signed delta applied to the quantity
    pub quantity_change: i32,

    /// Quantity before the mutation
    pub previous_quantity: i32,

    /// Quantity after the mutation
    pub new_quantity: i32,

    /// Optional human reason (synthesized for invoice deductions)
    pub reason: Option<String>,

    /// Invoice reference when the mutation was invoice-driven
    pub invoice_id: Option<Uuid>,

    /// The acting user
    pub performed_by: Uuid,

    /// Timestamp when the entry was created
    pub created_at: DateTime<Utc>,
}
