//! HTTP response value and its wire serialization.

use crate::{errors::Error, http::types::StatusCode};
use std::borrow::Cow;

type HeaderField = (Cow<'static, str>, Cow<'static, str>);

/// An HTTP/1.1 response, built once per request and serialized right away.
///
/// `Content-Length` is never stored: it is computed from the body when the
/// response is written, after any compression, and always comes last.
/// A `Content-Length` added through [`with_header`](Response::with_header) is
/// dropped on output.
///
/// # Examples
/// ```
/// use tinyserve::{Response, StatusCode};
///
/// let bytes = Response::new(StatusCode::Ok)
///     .with_header("Content-Type", "text/plain")
///     .with_body("abc")
///     .into_bytes();
///
/// assert_eq!(
///     bytes,
///     b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<HeaderField>,
    body: Vec<u8>,
}

impl Response {
    #[inline]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header. Headers are written in the order they were added.
    #[inline]
    pub fn with_header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[inline]
    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    #[inline(always)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// First value of a header, comparing names ASCII case-insensitively.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }

    #[inline]
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_ref(), v.as_ref()))
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends the wire form of the response to `buffer`.
    #[inline]
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        write_response(
            buffer,
            self.status,
            self.headers().map(|(n, v)| (n.as_bytes(), v.as_bytes())),
            &self.body,
        );
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.estimated_len());
        self.write_to(&mut buffer);
        buffer
    }

    #[inline]
    fn estimated_len(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(n, v)| n.len() + v.len() + 4)
            .sum();

        // status line + headers + `Content-Length: N\r\n\r\n` + body
        32 + headers + 40 + self.body.len()
    }
}

/// Serializes a response from a raw status code.
///
/// Headers are written in the given order, then `Content-Length` computed
/// from `body`, then the empty line and the body.
///
/// # Errors
///
/// [`Error::UnknownStatus`] for anything but `200`, `201` and `404`.
///
/// # Examples
/// ```
/// let bytes = tinyserve::build(404, [], b"").unwrap();
/// assert_eq!(bytes, b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
///
/// assert!(tinyserve::build(500, [], b"").is_err());
/// ```
pub fn build<'a, I>(status: u16, headers: I, body: &[u8]) -> Result<Vec<u8>, Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let status = StatusCode::try_from(status)?;

    let mut buffer = Vec::with_capacity(128 + body.len());
    write_response(
        &mut buffer,
        status,
        headers
            .into_iter()
            .map(|(n, v)| (n.as_bytes(), v.as_bytes())),
        body,
    );

    Ok(buffer)
}

#[inline]
fn write_response<'a, I>(buffer: &mut Vec<u8>, status: StatusCode, headers: I, body: &[u8])
where
    I: Iterator<Item = (&'a [u8], &'a [u8])>,
{
    buffer.extend_from_slice(status.first_line());

    for (name, value) in headers {
        if name.eq_ignore_ascii_case(b"content-length") {
            continue;
        }

        buffer.extend_from_slice(name);
        buffer.extend_from_slice(b": ");
        buffer.extend_from_slice(value);
        buffer.extend_from_slice(b"\r\n");
    }

    buffer.extend_from_slice(b"Content-Length: ");
    let (arr, start) = number_to_bytes(body.len());
    buffer.extend_from_slice(&arr[start..]);
    buffer.extend_from_slice(b"\r\n\r\n");

    buffer.extend_from_slice(body);
}

#[inline]
const fn number_to_bytes(mut n: usize) -> ([u8; 20], usize) {
    let mut buffer = [b'0'; 20];
    let mut i = 20;

    if n == 0 {
        return (buffer, 19);
    }

    while n > 0 {
        i -= 1;
        buffer[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }

    (buffer, i)
}
