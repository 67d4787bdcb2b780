pub mod change_event;
pub mod price_record;
pub mod product;

// Re-exports for convenience
pub use change_event::*;
pub use price_record::*;
pub use product::*;
