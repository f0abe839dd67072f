use chrono::Utc;
use uuid::Uuid;

/// Source of invoice numbers: opaque unique strings, one per call.
///
/// Uniqueness is assumed by the composer and ultimately enforced only by
/// the column's unique constraint.
pub trait InvoiceNumberGenerator: Send + Sync {
    fn next_number(&self) -> String;
}

/// Default generator: `INV-YYYYMMDD-XXXXXX` with a random hex suffix.
pub struct DatePrefixedGenerator;

impl InvoiceNumberGenerator for DatePrefixedGenerator {
    fn next_number(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
        format!("INV-{}-{}", Utc::now().format("%Y%m%d"), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format() {
        let number = DatePrefixedGenerator.next_number();
        assert!(number.starts_with("INV-"));
        // INV- + 8 date digits + - + 6 hex chars
        assert_eq!(number.len(), 19);
    }

    #[test]
    fn test_consecutive_numbers_differ() {
        let gen = DatePrefixedGenerator;
        assert_ne!(gen.next_number(), gen.next_number());
    }
}
