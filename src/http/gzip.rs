//! `Accept-Encoding` negotiation and gzip compression of response bodies.

use flate2::{write::GzEncoder, Compression};
use std::{collections::HashMap, io, io::Write};

const GZIP: &[u8] = b"gzip";

/// `true` if the `Accept-Encoding` header is present and contains `gzip`,
/// ignoring ASCII case.
///
/// This is a substring test, not a token list parse: `deflate, GZIP` and
/// `xgzipy` both count. The header name itself is matched exactly.
#[inline]
pub fn accepts_gzip(headers: &HashMap<String, String>) -> bool {
    headers
        .get("Accept-Encoding")
        .is_some_and(|value| contains_gzip(value.as_bytes()))
}

#[inline]
fn contains_gzip(value: &[u8]) -> bool {
    value
        .windows(GZIP.len())
        .any(|window| window.eq_ignore_ascii_case(GZIP))
}

/// Compresses `data` into a single gzip member.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
