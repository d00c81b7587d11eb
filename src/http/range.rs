//! HTTP Range request parsing module
//!
//! Single byte-range support (RFC 7233) so interrupted image downloads can resume.

/// Inclusive byte range resolved against a known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn length(&self) -> usize {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self, total_size: usize) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// What the handler should send for a given `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable Range header: send the whole body
    Full,
    /// Send only these bytes with 206
    Partial(ByteRange),
    /// Range lies outside the body: 416
    Unsatisfiable,
}

/// Resolve a `Range` header against a body of `size` bytes
///
/// Supported forms are `bytes=start-end`, `bytes=start-` and `bytes=-suffix`.
/// Multiple ranges, other units and malformed values are ignored.
///
/// # Examples
/// ```
/// use ota_image_server::http::range::{resolve_range, ByteRange, RangeOutcome};
///
/// assert_eq!(
///     resolve_range(Some("bytes=0-99"), 1000),
///     RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
/// );
/// assert_eq!(resolve_range(None, 1000), RangeOutcome::Full);
/// ```
pub fn resolve_range(header: Option<&str>, size: usize) -> RangeOutcome {
    let Some(byte_ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if byte_ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = byte_ranges.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return match last.parse::<usize>() {
            Ok(0) => RangeOutcome::Unsatisfiable,
            Ok(_) if size == 0 => RangeOutcome::Unsatisfiable,
            Ok(suffix) => RangeOutcome::Partial(ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            }),
            Err(_) => RangeOutcome::Full,
        };
    }

    let Ok(start) = first.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    if start >= size {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<usize>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return RangeOutcome::Full,
        }
    };

    RangeOutcome::Partial(ByteRange { start, end })
}
