//! Byte ranges: the wire syntax the server parses and the chunk plan the
//! client fetches against.
//!
//! Both fetch orchestrators consume the exact same plan produced by
//! [`plan_chunks`]; they differ only in scheduling, never in range
//! computation.

use crate::error::{Error, Result};

/// One inclusive `[start, end]` span of a resource's bytes.
///
/// Invariant: `start <= end < size_bytes` of the resource the range was
/// produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered, `end - start + 1`. Never zero: ends are
    /// inclusive.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for a `Range` request header, e.g. `bytes=0-999`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Value for a `Content-Range` response header, e.g. `bytes 0-999/2500`.
    pub fn content_range_value(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// Parse a request `Range` header of the strict form `bytes=<start>-<end>`.
///
/// Anything else is [`Error::RangeParse`]: missing `bytes=` prefix,
/// non-numeric positions, an absent start or end, `start > end`, or an end
/// at or past `total_size`. Suffix (`bytes=-100`) and multi-range forms are
/// rejected too; this server only ever hands out the single spans it was
/// asked for.
pub fn parse_range_header(header: &str, total_size: u64) -> Result<ByteRange> {
    let malformed = || Error::RangeParse(header.to_string());

    let spec = header.strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = spec.split_once('-').ok_or_else(malformed)?;

    let start: u64 = start.trim().parse().map_err(|_| malformed())?;
    let end: u64 = end.trim().parse().map_err(|_| malformed())?;

    if start > end || end >= total_size {
        return Err(malformed());
    }

    Ok(ByteRange::new(start, end))
}

/// Compute the ordered chunk plan covering `[0, total_size)` exactly once.
///
/// Every range is `max_chunk_size` long except possibly the last, which is
/// truncated to end at `total_size - 1`. The plan has
/// `ceil(total_size / max_chunk_size)` entries.
pub fn plan_chunks(total_size: u64, max_chunk_size: u64) -> Result<Vec<ByteRange>> {
    if total_size == 0 {
        return Err(Error::InvalidInput("total size must be positive".into()));
    }
    if max_chunk_size == 0 {
        return Err(Error::InvalidInput("max chunk size must be positive".into()));
    }

    let mut ranges = Vec::with_capacity(total_size.div_ceil(max_chunk_size) as usize);
    let mut start = 0;
    while start < total_size {
        let end = std::cmp::min(start + max_chunk_size, total_size) - 1;
        ranges.push(ByteRange::new(start, end));
        start = end + 1;
    }

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plan_covers_exactly_once() {
        for (total, chunk) in [(1, 1), (10, 3), (10, 10), (10, 100), (2500, 999)] {
            let plan = plan_chunks(total, chunk).unwrap();
            assert_eq!(plan.len() as u64, total.div_ceil(chunk));
            assert_eq!(plan[0].start, 0);
            assert_eq!(plan.last().unwrap().end, total - 1);
            for pair in plan.windows(2) {
                assert_eq!(pair[1].start, pair[0].end + 1);
            }
            assert_eq!(plan.iter().map(ByteRange::len).sum::<u64>(), total);
        }
    }

    #[test]
    fn plan_matches_demo_scenario() {
        let plan = plan_chunks(2_500_000, 1_000_000).unwrap();
        assert_eq!(
            plan,
            vec![
                ByteRange::new(0, 999_999),
                ByteRange::new(1_000_000, 1_999_999),
                ByteRange::new(2_000_000, 2_499_999),
            ]
        );
    }

    #[test]
    fn plan_rejects_non_positive_inputs() {
        assert_matches!(plan_chunks(0, 100), Err(Error::InvalidInput(_)));
        assert_matches!(plan_chunks(100, 0), Err(Error::InvalidInput(_)));
    }

    #[test]
    fn parse_accepts_exact_spans() {
        assert_eq!(parse_range_header("bytes=0-9", 100).unwrap(), ByteRange::new(0, 9));
        assert_eq!(parse_range_header("bytes=99-99", 100).unwrap(), ByteRange::new(99, 99));
    }

    #[test]
    fn parse_rejects_start_after_end() {
        assert_matches!(parse_range_header("bytes=5-2", 100), Err(Error::RangeParse(_)));
    }

    #[test]
    fn parse_rejects_end_past_size() {
        assert_matches!(parse_range_header("bytes=0-100", 100), Err(Error::RangeParse(_)));
    }

    #[test]
    fn parse_rejects_malformed_syntax() {
        for header in ["bytes=a-9", "bytes=0-b", "bytes=5", "bytes=-5", "bytes=5-", "0-9", "bleets=0-9", "bytes=0-4,9-10"] {
            assert_matches!(parse_range_header(header, 100), Err(Error::RangeParse(_)), "{header}");
        }
    }

    #[test]
    fn header_values_round_out() {
        let range = ByteRange::new(0, 999_999);
        assert_eq!(range.header_value(), "bytes=0-999999");
        assert_eq!(range.content_range_value(2_500_000), "bytes 0-999999/2500000");
        assert_eq!(range.len(), 1_000_000);
    }
}
