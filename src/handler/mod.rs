//! Request handler module
//!
//! Request dispatch and the firmware image handler.

pub mod image;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
