//! HTTP protocol layer module
//!
//! Protocol helpers kept apart from the image handler: response builders,
//! `ETag` handling and byte-range parsing.

pub mod cache;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{resolve_range, ByteRange, RangeOutcome};
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_500_response, build_health_response, build_image_response, build_options_response,
    build_partial_response, IMAGE_CONTENT_TYPE,
};
