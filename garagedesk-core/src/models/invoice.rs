use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Invoice status enumeration.
///
/// The lifecycle is a small one-way state machine: an invoice starts `Due`
/// and may move to `Paid` or `Cancelled`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sqlx(rename = "due")]
    Due,

    #[sqlx(rename = "paid")]
    Paid,

    #[sqlx(rename = "cancelled")]
    Cancelled,
}

impl InvoiceStatus {
    /// Whether a transition from `self` to `target` is allowed.
    ///
    /// Only `Due -> Paid` and `Due -> Cancelled` are legal; a paid invoice
    /// never regresses to due, and same-status "transitions" are rejected.
    pub fn can_transition(self, target: InvoiceStatus) -> bool {
        matches!(
            (self, target),
            (InvoiceStatus::Due, InvoiceStatus::Paid)
                | (InvoiceStatus::Due, InvoiceStatus::Cancelled)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Due => write!(f, "due"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Line item type: a physical part (may reference stock) or a labor/service charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    #[sqlx(rename = "part")]
    Part,

    #[sqlx(rename = "service")]
    Service,
}

/// A snapshot-complete bill, mapping to the `invoices` table.
///
/// Customer and vehicle fields are denormalized at creation time, and
/// `settings_snapshot` + `billed_by_name` are frozen copies, so a historical
/// invoice renders identically regardless of later record or settings changes.
/// All monetary fields are derived: `tax_amount = subtotal * tax_rate / 100`
/// and `total = subtotal + tax_amount - discount_amount`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: Uuid,

    /// Generated invoice number (unique)
    pub invoice_number: String,

    /// Customer name captured at creation time
    pub customer_name: String,

    /// Customer phone captured at creation time
    pub customer_phone: Option<String>,

    /// Vehicle registration captured at creation time
    pub vehicle_reg: String,

    /// Vehicle model captured at creation time
    pub vehicle_model: Option<String>,

    /// Sum of all line totals
    pub subtotal: Decimal,

    /// Tax rate in percent
    pub tax_rate: Decimal,

    /// Derived tax amount
    pub tax_amount: Decimal,

    /// Flat discount applied after tax
    pub discount_amount: Decimal,

    /// Grand total
    pub total: Decimal,

    /// Invoice status
    pub status: InvoiceStatus,

    /// Frozen copy of invoice-appearance settings at creation time
    pub settings_snapshot: Value,

    /// Display name of the creating user, frozen at creation time
    pub billed_by_name: String,

    /// ID of the creating user
    pub created_by: Uuid,

    /// Timestamp when the invoice was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the invoice was last updated
    pub updated_at: DateTime<Utc>,
}

/// One priced line within an invoice, mapping to the `invoice_items` table.
///
/// Owned exclusively by its invoice. `line_total` is stored redundantly
/// (`quantity * unit_price`) for historical stability.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    /// Unique identifier for the line
    pub id: Uuid,

    /// Owning invoice
    pub invoice_id: Uuid,

    /// Part or service
    pub item_type: LineType,

    /// Weak reference to the stock item (parts only, nullable)
    pub inventory_item_id: Option<Uuid>,

    /// Line description
    pub description: String,

    /// Quantity (>= 1)
    pub quantity: i32,

    /// Price per unit
    pub unit_price: Decimal,

    /// Stored `quantity * unit_price`
    pub line_total: Decimal,

    /// Free-text model number for parts with physical identity
    pub model_number: Option<String>,

    /// Free-text serial number for parts with physical identity
    pub serial_number: Option<String>,

    /// Timestamp when the line was created
    pub created_at: DateTime<Utc>,
}

/// One requested line within an invoice creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineRequest {
    pub item_type: LineType,

    /// Stock reference; meaningful for `Part` lines only
    pub inventory_item_id: Option<Uuid>,

    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
}

/// Invoice creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub vehicle_reg: String,
    pub vehicle_model: Option<String>,

    /// Tax rate in percent
    pub tax_rate: Decimal,

    /// Flat discount
    #[serde(default)]
    pub discount_amount: Decimal,

    pub items: Vec<InvoiceLineRequest>,
}

/// Invoice status update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: InvoiceStatus,
}

/// Listing projection for invoices (one record type per select shape).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub vehicle_reg: String,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_to_paid_allowed() {
        assert!(InvoiceStatus::Due.can_transition(InvoiceStatus::Paid));
    }

    #[test]
    fn test_due_to_cancelled_allowed() {
        assert!(InvoiceStatus::Due.can_transition(InvoiceStatus::Cancelled));
    }

    #[test]
    fn test_paid_is_terminal() {
        assert!(!InvoiceStatus::Paid.can_transition(InvoiceStatus::Due));
        assert!(!InvoiceStatus::Paid.can_transition(InvoiceStatus::Cancelled));
        assert!(!InvoiceStatus::Paid.can_transition(InvoiceStatus::Paid));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        assert!(!InvoiceStatus::Cancelled.can_transition(InvoiceStatus::Due));
        assert!(!InvoiceStatus::Cancelled.can_transition(InvoiceStatus::Paid));
    }

    #[test]
    fn test_same_status_rejected() {
        assert!(!InvoiceStatus::Due.can_transition(InvoiceStatus::Due));
    }
}
