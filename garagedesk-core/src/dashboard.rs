//! Dashboard aggregate: revenue by status and low-stock alerts, served
//! read-through from the response cache.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::cache::{self, keys};
use crate::error::AppError;
use crate::models::InvoiceStatus;
use crate::AppState;

/// One row of the revenue-by-status aggregate.
#[derive(Debug, FromRow)]
struct StatusTotalRow {
    status: InvoiceStatus,
    invoice_count: i64,
    amount: Decimal,
}

/// An active item at or below its minimum stock threshold.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LowStockItem {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub min_stock_level: i32,
}

/// Dashboard summary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Revenue across paid invoices
    pub revenue_paid: Decimal,

    /// Total still outstanding on due invoices
    pub outstanding_due: Decimal,

    pub paid_count: i64,
    pub due_count: i64,
    pub cancelled_count: i64,

    pub low_stock: Vec<LowStockItem>,
}

/// Computes (or serves from cache) the dashboard summary. Cached under
/// `dashboard:summary`; invalidated by every invoice and stock mutation.
pub async fn summary(state: &AppState) -> Result<Value, AppError> {
    cache::get_or_compute(
        state.cache.as_ref(),
        keys::DASHBOARD_SUMMARY,
        state.cache_ttl,
        || async {
            let computed = compute_summary(state).await?;
            serde_json::to_value(computed).map_err(|e| AppError::Internal(e.to_string()))
        },
    )
    .await
}

async fn compute_summary(state: &AppState) -> Result<DashboardSummary, AppError> {
    let rows = sqlx::query_as::<_, StatusTotalRow>(
        r#"
        SELECT status, COUNT(*) AS invoice_count, COALESCE(SUM(total), 0) AS amount
        FROM invoices GROUP BY status
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let mut summary = DashboardSummary {
        revenue_paid: Decimal::ZERO,
        outstanding_due: Decimal::ZERO,
        paid_count: 0,
        due_count: 0,
        cancelled_count: 0,
        low_stock: Vec::new(),
    };

    for row in rows {
        match row.status {
            InvoiceStatus::Paid => {
                summary.revenue_paid = row.amount;
                summary.paid_count = row.invoice_count;
            }
            InvoiceStatus::Due => {
                summary.outstanding_due = row.amount;
                summary.due_count = row.invoice_count;
            }
            InvoiceStatus::Cancelled => {
                summary.cancelled_count = row.invoice_count;
            }
        }
    }

    summary.low_stock = sqlx::query_as::<_, LowStockItem>(
        r#"
        SELECT id, sku, name, quantity, min_stock_level
        FROM inventory_items
        WHERE is_active = TRUE AND quantity <= min_stock_level
        ORDER BY quantity
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(summary)
}
