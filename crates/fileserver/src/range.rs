//! Single byte-range parsing for `Range: bytes=<start>-<end>`

/// How a request should be answered given its `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range header, serve the whole file
    Full,
    /// Serve the inclusive byte span `start..=end`
    Partial { start: u64, end: u64 },
    /// The range falls outside the file
    Unsatisfiable,
}

impl RangeOutcome {
    /// Evaluate a raw `Range` header value against the current file size
    ///
    /// Only a single `bytes=<digits>-<digits>` range is understood, either bound
    /// may be omitted. Anything else is ignored and the full file is served.
    /// An omitted start means 0 and an omitted end means the last byte.
    pub fn evaluate(header: Option<&str>, file_size: u64) -> Self {
        let Some((start_text, end_text)) = header.and_then(split_range) else {
            return RangeOutcome::Full;
        };

        if file_size == 0 {
            return RangeOutcome::Unsatisfiable;
        }

        let start = parse_bound(start_text).unwrap_or(0);
        let end = parse_bound(end_text).unwrap_or(file_size - 1);

        if start >= file_size || end >= file_size || start > end {
            RangeOutcome::Unsatisfiable
        } else {
            RangeOutcome::Partial { start, end }
        }
    }
}

fn split_range(header: &str) -> Option<(&str, &str)> {
    let byte_range = header.strip_prefix("bytes=")?;
    let (start, end) = byte_range.split_once('-')?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    (digits(start) && digits(end)).then_some((start, end))
}

/// Parse one bound; digit strings too large for u64 saturate so they are out of range
fn parse_bound(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    Some(text.parse().unwrap_or(u64::MAX))
}

/// `Content-Range` value for a served span
pub fn content_range(start: u64, end: u64, file_size: u64) -> String {
    format!("bytes {}-{}/{}", start, end, file_size)
}

/// `Content-Range` value for a 416 response
pub fn unsatisfied_range(file_size: u64) -> String {
    format!("bytes */{}", file_size)
}
