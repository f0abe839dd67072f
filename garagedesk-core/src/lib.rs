//! GarageDesk back-office core: stock ledger, invoice composition with
//! atomic inventory deduction, role-gated admin management, and a cached
//! dashboard aggregate, over a Postgres store.

pub mod admin;
pub mod auth;
pub mod cache;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod invoice;
pub mod ledger;
pub mod models;

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::invoice::numbering::InvoiceNumberGenerator;

/// Application state containing shared resources.
///
/// Holds the database connection pool plus the injected collaborators:
/// the response cache (real or no-op) and the invoice number generator.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,

    /// Response cache for aggregate reads
    pub cache: Arc<dyn ResponseCache>,

    /// Invoice number source (opaque unique strings)
    pub numbering: Arc<dyn InvoiceNumberGenerator>,

    /// TTL applied to cached aggregate reads
    pub cache_ttl: Duration,
}

impl AppState {
    /// Assembles state from a pool and collaborators, reading the cache TTL
    /// from `CACHE_TTL_SECONDS` (default 60).
    pub fn new(
        db: PgPool,
        cache: Arc<dyn ResponseCache>,
        numbering: Arc<dyn InvoiceNumberGenerator>,
    ) -> Self {
        let cache_ttl = std::env::var("CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        AppState {
            db,
            cache,
            numbering,
            cache_ttl,
        }
    }
}
