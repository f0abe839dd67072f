//! Invoice composer: turns a caller-submitted invoice request into a durable
//! invoice plus consistent stock state, or rejects it entirely.
//!
//! Header, line items, stock deductions and their audit rows are written in
//! one transaction; any failure rolls everything back, so an invoice never
//! exists without its items and stock is never partially deducted.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, Actor, Role};
use crate::cache::keys;
use crate::error::AppError;
use crate::ledger;
use crate::models::invoice::{
    CreateInvoiceRequest, Invoice, InvoiceItem, InvoiceLineRequest, InvoiceStatus, InvoiceSummary,
    LineType,
};
use crate::AppState;

/// Derived monetary fields for an invoice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// An invoice with its owned line items.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Projection of a locked part row during the stock pre-check.
#[derive(Debug, FromRow)]
struct PartStockRow {
    sku: String,
    quantity: i32,
    is_active: bool,
}

/// Structural validation of the request shape. Runs before any data access;
/// a failure here guarantees zero side effects.
fn validate(request: &CreateInvoiceRequest) -> Result<(), AppError> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if request.vehicle_reg.trim().is_empty() {
        return Err(AppError::Validation(
            "vehicle registration is required".to_string(),
        ));
    }
    if request.items.is_empty() {
        return Err(AppError::Validation(
            "invoice must have at least one line item".to_string(),
        ));
    }
    if request.tax_rate < Decimal::ZERO {
        return Err(AppError::Validation("tax rate cannot be negative".to_string()));
    }
    if request.discount_amount < Decimal::ZERO {
        return Err(AppError::Validation(
            "discount cannot be negative".to_string(),
        ));
    }

    for line in &request.items {
        if line.quantity < 1 {
            return Err(AppError::Validation(format!(
                "line \"{}\": quantity must be at least 1",
                line.description
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "line \"{}\": unit price cannot be negative",
                line.description
            )));
        }
        if line.description.trim().is_empty() {
            return Err(AppError::Validation(
                "line description is required".to_string(),
            ));
        }
        if line.item_type == LineType::Service && line.inventory_item_id.is_some() {
            return Err(AppError::Validation(format!(
                "line \"{}\": service lines cannot reference stock",
                line.description
            )));
        }
    }

    Ok(())
}

/// Computes subtotal, tax and grand total with decimal arithmetic,
/// rounded to the currency's minimum unit. A discount larger than
/// `subtotal + tax_amount` would produce a negative bill and is rejected.
fn compute_totals(request: &CreateInvoiceRequest) -> Result<Totals, AppError> {
    let subtotal: Decimal = request.items.iter().map(line_total).sum();
    let tax_amount = (subtotal * request.tax_rate / Decimal::ONE_HUNDRED).round_dp(2);

    if request.discount_amount > subtotal + tax_amount {
        return Err(AppError::Validation(format!(
            "discount {} exceeds the billable amount {}",
            request.discount_amount,
            subtotal + tax_amount
        )));
    }

    let total = subtotal + tax_amount - request.discount_amount;

    Ok(Totals {
        subtotal,
        tax_amount,
        total,
    })
}

fn line_total(line: &InvoiceLineRequest) -> Decimal {
    (line.unit_price * Decimal::from(line.quantity)).round_dp(2)
}

/// Requested deduction per referenced stock item, summed across lines so
/// two part lines against the same item are checked cumulatively.
///
/// Entries are sorted by item id: every transaction acquires its row locks
/// in the same global order, so two invoices sharing parts queue behind
/// each other instead of deadlocking.
fn requested_per_item(request: &CreateInvoiceRequest) -> Vec<(Uuid, i32)> {
    let mut requested: HashMap<Uuid, i32> = HashMap::new();
    for line in &request.items {
        if line.item_type == LineType::Part {
            if let Some(item_id) = line.inventory_item_id {
                *requested.entry(item_id).or_insert(0) += line.quantity;
            }
        }
    }

    let mut entries: Vec<(Uuid, i32)> = requested.into_iter().collect();
    entries.sort_by_key(|(item_id, _)| *item_id);
    entries
}

/// Creates an invoice: gate, validate, pre-check stock under row locks,
/// persist header + items, deduct stock through the ledger, all in one
/// transaction; then invalidate the affected cache keys.
pub async fn create_invoice(
    state: &AppState,
    request: CreateInvoiceRequest,
    actor: &Actor,
) -> Result<InvoiceDetail, AppError> {
    auth::require(Some(actor), Role::Admin)?;
    validate(&request)?;

    let totals = compute_totals(&request)?;
    let invoice_number = state.numbering.next_number();

    let mut tx = state.db.begin().await?;

    // Lock every referenced part row and assert availability before writing
    // anything. The locks are held until commit, so the checked quantities
    // cannot be deducted from underneath us by a concurrent invoice.
    for (item_id, requested) in requested_per_item(&request) {
        let part = sqlx::query_as::<_, PartStockRow>(
            "SELECT sku, quantity, is_active FROM inventory_items WHERE id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("inventory item".to_string()))?;

        if !part.is_active {
            return Err(AppError::Validation(format!(
                "item {} is no longer active",
                part.sku
            )));
        }
        if part.quantity < requested {
            return Err(AppError::InsufficientStock {
                sku: part.sku,
                available: part.quantity,
                requested,
            });
        }
    }

    // Freeze current invoice-appearance settings onto the header.
    let settings_snapshot = sqlx::query_scalar::<_, Value>(
        "SELECT settings FROM invoice_settings ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or_else(|| serde_json::json!({}));

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            invoice_number, customer_name, customer_phone, vehicle_reg,
            vehicle_model, subtotal, tax_rate, tax_amount, discount_amount,
            total, status, settings_snapshot, billed_by_name, created_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(&invoice_number)
    .bind(request.customer_name.trim())
    .bind(&request.customer_phone)
    .bind(request.vehicle_reg.trim())
    .bind(&request.vehicle_model)
    .bind(totals.subtotal)
    .bind(request.tax_rate)
    .bind(totals.tax_amount)
    .bind(request.discount_amount)
    .bind(totals.total)
    .bind(InvoiceStatus::Due)
    .bind(&settings_snapshot)
    .bind(&actor.display_name)
    .bind(actor.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::or_conflict(e, "invoice number already exists"))?;

    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (
                invoice_id, item_type, inventory_item_id, description,
                quantity, unit_price, line_total, model_number, serial_number
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(line.item_type)
        .bind(line.inventory_item_id)
        .bind(line.description.trim())
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line_total(line))
        .bind(&line.model_number)
        .bind(&line.serial_number)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    // Deduct stock per part line; each deduction appends its own ledger row
    // tagged with this invoice. Any failure rolls the whole invoice back.
    for line in &request.items {
        if line.item_type == LineType::Part {
            if let Some(item_id) = line.inventory_item_id {
                ledger::deduct_for_invoice(
                    &mut tx,
                    item_id,
                    line.quantity,
                    invoice.id,
                    &invoice.invoice_number,
                    actor,
                )
                .await?;
            }
        }
    }

    tx.commit().await?;

    state.cache.invalidate(keys::DASHBOARD_SUMMARY);
    state.cache.invalidate(keys::INVENTORY_LIST);

    info!(
        "Created invoice {} for {} (total {})",
        invoice.invoice_number, invoice.customer_name, invoice.total
    );

    Ok(InvoiceDetail { invoice, items })
}

/// Moves an invoice along its status state machine.
///
/// `Due -> Paid` and `Due -> Cancelled` are the only legal transitions;
/// anything else, including a same-status update, is `InvalidTransition`.
pub async fn update_status(
    state: &AppState,
    invoice_id: Uuid,
    new_status: InvoiceStatus,
    actor: &Actor,
) -> Result<Invoice, AppError> {
    auth::require(Some(actor), Role::Admin)?;

    let mut tx = state.db.begin().await?;

    let current = sqlx::query_scalar::<_, InvoiceStatus>(
        "SELECT status FROM invoices WHERE id = $1 FOR UPDATE",
    )
    .bind(invoice_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("invoice".to_string()))?;

    if !current.can_transition(new_status) {
        return Err(AppError::InvalidTransition {
            from: current.to_string(),
            to: new_status.to_string(),
        });
    }

    let invoice = sqlx::query_as::<_, Invoice>(
        "UPDATE invoices SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(new_status)
    .bind(invoice_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    // Aggregate revenue depends on status, same keys as creation.
    state.cache.invalidate(keys::DASHBOARD_SUMMARY);
    state.cache.invalidate(keys::INVENTORY_LIST);

    info!(
        "Invoice {} status {} -> {}",
        invoice.invoice_number, current, new_status
    );

    Ok(invoice)
}

/// Loads an invoice with its line items.
pub async fn get_invoice(state: &AppState, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
    let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
        .bind(invoice_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("invoice".to_string()))?;

    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY created_at",
    )
    .bind(invoice_id)
    .fetch_all(&state.db)
    .await?;

    Ok(InvoiceDetail { invoice, items })
}

/// Lists invoices, newest first.
pub async fn list_invoices(state: &AppState) -> Result<Vec<InvoiceSummary>, AppError> {
    let invoices = sqlx::query_as::<_, InvoiceSummary>(
        r#"
        SELECT id, invoice_number, customer_name, vehicle_reg, total, status, created_at
        FROM invoices ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(invoices)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(
        item_type: LineType,
        quantity: i32,
        unit_price: &str,
        inventory_item_id: Option<Uuid>,
    ) -> InvoiceLineRequest {
        InvoiceLineRequest {
            item_type,
            inventory_item_id,
            description: "Test line".to_string(),
            quantity,
            unit_price: dec(unit_price),
            model_number: None,
            serial_number: None,
        }
    }

    fn request(items: Vec<InvoiceLineRequest>) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            customer_name: "A. Motorist".to_string(),
            customer_phone: None,
            vehicle_reg: "KA-01-1234".to_string(),
            vehicle_model: Some("Corolla".to_string()),
            tax_rate: dec("5"),
            discount_amount: dec("10"),
            items,
        }
    }

    #[test]
    fn test_totals_service_plus_part() {
        // One service line (1 x 100.00) and one part line (2 x 25.00),
        // tax 5%, discount 10.
        let req = request(vec![
            line(LineType::Service, 1, "100.00", None),
            line(LineType::Part, 2, "25.00", Some(Uuid::new_v4())),
        ]);

        let totals = compute_totals(&req).unwrap();
        assert_eq!(totals.subtotal, dec("150.00"));
        assert_eq!(totals.tax_amount, dec("7.50"));
        assert_eq!(totals.total, dec("147.50"));
    }

    #[test]
    fn test_tax_rounds_to_currency_unit() {
        let mut req = request(vec![line(LineType::Service, 3, "33.33", None)]);
        req.tax_rate = dec("7.5");
        req.discount_amount = Decimal::ZERO;

        let totals = compute_totals(&req).unwrap();
        // 99.99 * 7.5% = 7.49925 -> 7.50
        assert_eq!(totals.subtotal, dec("99.99"));
        assert_eq!(totals.tax_amount, dec("7.50"));
        assert_eq!(totals.total, dec("107.49"));
    }

    #[test]
    fn test_total_equals_subtotal_plus_tax_minus_discount() {
        let req = request(vec![
            line(LineType::Service, 2, "49.99", None),
            line(LineType::Part, 4, "12.75", None),
        ]);
        let totals = compute_totals(&req).unwrap();
        assert_eq!(
            totals.total,
            totals.subtotal + totals.tax_amount - req.discount_amount
        );
    }

    #[test]
    fn test_discount_beyond_billable_amount_rejected() {
        // 10.00 + 5% tax = 10.50 billable; a 50.00 discount would drive the
        // total negative.
        let mut req = request(vec![line(LineType::Service, 1, "10.00", None)]);
        req.discount_amount = dec("50.00");
        assert!(matches!(
            compute_totals(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_discount_equal_to_billable_amount_allowed() {
        let mut req = request(vec![line(LineType::Service, 1, "100.00", None)]);
        req.tax_rate = Decimal::ZERO;
        req.discount_amount = dec("100.00");
        let totals = compute_totals(&req).unwrap();
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_validate_rejects_empty_item_list() {
        let req = request(vec![]);
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let req = request(vec![line(LineType::Service, 0, "10.00", None)]);
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let req = request(vec![line(LineType::Service, 1, "-1.00", None)]);
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_blank_description() {
        let mut bad = line(LineType::Service, 1, "10.00", None);
        bad.description = "   ".to_string();
        let req = request(vec![bad]);
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_missing_customer() {
        let mut req = request(vec![line(LineType::Service, 1, "10.00", None)]);
        req.customer_name = "".to_string();
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_missing_vehicle_reg() {
        let mut req = request(vec![line(LineType::Service, 1, "10.00", None)]);
        req.vehicle_reg = " ".to_string();
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_service_line_with_stock_ref() {
        let req = request(vec![line(
            LineType::Service,
            1,
            "10.00",
            Some(Uuid::new_v4()),
        )]);
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_requested_quantities_sum_across_lines() {
        let shared = Uuid::new_v4();
        let req = request(vec![
            line(LineType::Part, 2, "5.00", Some(shared)),
            line(LineType::Part, 3, "5.00", Some(shared)),
            line(LineType::Part, 1, "5.00", None),
            line(LineType::Service, 1, "40.00", None),
        ]);

        let requested = requested_per_item(&req);
        assert_eq!(requested, vec![(shared, 5)]);
    }

    #[test]
    fn test_lock_order_is_independent_of_line_order() {
        // Two requests naming the same parts in opposite line order must
        // lock them in the same order, or they can deadlock each other.
        let part_a = Uuid::new_v4();
        let part_b = Uuid::new_v4();

        let forward = request(vec![
            line(LineType::Part, 1, "5.00", Some(part_a)),
            line(LineType::Part, 1, "5.00", Some(part_b)),
        ]);
        let reversed = request(vec![
            line(LineType::Part, 1, "5.00", Some(part_b)),
            line(LineType::Part, 1, "5.00", Some(part_a)),
        ]);

        let forward_ids: Vec<Uuid> =
            requested_per_item(&forward).into_iter().map(|(id, _)| id).collect();
        let reversed_ids: Vec<Uuid> =
            requested_per_item(&reversed).into_iter().map(|(id, _)| id).collect();

        assert_eq!(forward_ids, reversed_ids);
        let mut sorted = forward_ids.clone();
        sorted.sort();
        assert_eq!(forward_ids, sorted);
    }
}
