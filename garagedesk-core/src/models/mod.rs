pub mod admin;
pub mod invoice;
pub mod item;
pub mod stock_log;

pub use admin::AdminUser;
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus, LineType};
pub use item::InventoryItem;
pub use stock_log::{StockAction, StockAdjustmentLog};
