pub mod composer;
pub mod numbering;


pub use composer::{create_invoice, get_invoice, list_invoices, update_status};
pub use numbering::{DatePrefixedGenerator, InvoiceNumberGenerator};
