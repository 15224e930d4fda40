use crate::{
    errors::{Error, Malformed},
    http::types::{self, Method},
    limits::ReqLimits,
};
use memchr::memmem;
use std::{collections::HashMap, io, iter, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::{sleep_until, Instant},
};

const CRLF: &[u8] = b"\r\n";
const END_HEAD: &[u8] = b"\r\n\r\n";

/// A parsed HTTP request.
///
/// # Accepted format
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: `"\r\n"`, **exactly this sequence**, a bare `\n` is not a line end
///
/// ```text
/// [METHOD] SP [PATH] SP [VERSION] CRLF
/// ([NAME] ": " [VALUE] CRLF)*
/// CRLF
/// [BODY]
/// ```
///
/// The three request-line tokens must be non-empty and separated by exactly one
/// space. A header line is split at its first `": "`; the name must be
/// non-empty, the value is kept as is (it may be empty or contain `": "`).
/// Everything after the empty line is the body, kept as raw bytes.
///
/// Header names keep the case they were received with and lookups through
/// [`header`](Request::header) are exact. When a name repeats, the last value wins.
///
/// The request line and headers must be UTF-8. The body can be anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    path: String,
    version: String,

    headers: HashMap<String, String>,

    body: Vec<u8>,
}

// Public API
impl Request {
    /// The method token exactly as received.
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The method, if it is one of the [`Method`] variants (ASCII case ignored).
    #[inline]
    pub fn known_method(&self) -> Option<Method> {
        Method::from_token(&self.method)
    }

    /// The request target, e.g. `/echo/abc`.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The protocol token, e.g. `HTTP/1.1`. Not interpreted.
    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the header value for an exact (case-sensitive) name.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    #[inline(always)]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Raw body bytes. Empty when the request has none.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Parses one complete request out of `buffer`.
///
/// The buffer is taken as the whole message: nothing is read to fill a
/// declared `Content-Length`, so a short buffer gives a truncated body.
///
/// # Errors
///
/// [`Error::Malformed`] when there is no empty line ending the head, when the
/// head is not UTF-8, when the request line is not three single-space separated
/// tokens, or when a header line has no `": "`.
///
/// # Examples
/// ```
/// let req = tinyserve::parse(b"GET /echo/abc HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
///
/// assert_eq!(req.method(), "GET");
/// assert_eq!(req.path(), "/echo/abc");
/// assert_eq!(req.header("Host"), Some("x"));
/// assert!(req.body().is_empty());
/// ```
pub fn parse(buffer: &[u8]) -> Result<Request, Error> {
    let end_head = memmem::find(buffer, END_HEAD).ok_or(Malformed::Unterminated)?;

    let head = simdutf8::basic::from_utf8(&buffer[..end_head]).map_err(|_| Malformed::Encoding)?;
    let mut lines = split_lines(head);

    // `split_lines` always yields at least one (maybe empty) line
    let (method, path, version) = parse_request_line(lines.next().unwrap_or_default())?;

    let mut headers = HashMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(": ")
            .filter(|(name, _)| !name.is_empty())
            .ok_or(Malformed::Header)?;

        headers.insert(name.to_owned(), value.to_owned());
    }

    Ok(Request {
        method: method.to_owned(),
        path: path.to_owned(),
        version: version.to_owned(),
        headers,
        body: buffer[end_head + END_HEAD.len()..].to_vec(),
    })
}

/// Total length the request in `buffer` claims to have: head, empty line and
/// the declared `Content-Length` (0 if absent or unreadable).
///
/// `None` while the head terminator has not arrived yet.
pub fn framed_len(buffer: &[u8]) -> Option<usize> {
    let end_head = memmem::find(buffer, END_HEAD)?;
    let head = &buffer[..end_head];

    let mut start = 0;
    let declared = memmem::find_iter(head, CRLF)
        .chain(iter::once(head.len()))
        .map(|end| {
            let line = &head[start..end];
            start = end + CRLF.len();
            line
        })
        .skip(1)
        .find_map(content_length);

    Some((end_head + END_HEAD.len()).saturating_add(declared.unwrap_or(0)))
}

#[inline]
fn content_length(line: &[u8]) -> Option<usize> {
    const NAME: &[u8] = b"content-length: ";

    let (name, value) = line.split_at_checked(NAME.len())?;
    if !name.eq_ignore_ascii_case(NAME) {
        return None;
    }

    types::slice_to_usize(value.trim_ascii())
}

#[inline]
fn split_lines(head: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;

    // CRLF is ASCII, so every offset here is a char boundary
    memmem::find_iter(head.as_bytes(), CRLF)
        .chain(iter::once(head.len()))
        .map(move |end| {
            let line = &head[start..end];
            start = end + CRLF.len();
            line
        })
}

#[inline]
fn parse_request_line(line: &str) -> Result<(&str, &str, &str), Malformed> {
    let mut parts = line.split(' ');

    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None)
            if !method.is_empty() && !path.is_empty() && !version.is_empty() =>
        {
            Ok((method, path, version))
        }
        _ => Err(Malformed::RequestLine),
    }
}

//

/// Per-worker read buffer.
#[derive(Debug)]
pub(crate) struct Parser {
    len: usize,
    buffer: Box<[u8]>,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let buffer = vec![0; limits.buffer_size].into_boxed_slice();

        Parser { len: 0, buffer }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.len = 0;
    }

    #[inline(always)]
    pub(crate) fn filled(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Reads until the request is framed (head plus declared body), the buffer
    /// is full, the peer stops sending, or `time` runs out.
    ///
    /// Running out of time with nothing read is an error. Otherwise whatever
    /// arrived is kept and left to [`parse`] to judge.
    pub(crate) async fn fill_buffer<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        time: Duration,
    ) -> Result<usize, io::Error> {
        let deadline = Instant::now() + time;

        while self.len < self.buffer.len() {
            let read = tokio::select! {
                biased;

                read_result = stream.read(&mut self.buffer[self.len..]) => Some(read_result?),
                _ = sleep_until(deadline) => None,
            };

            match read {
                Some(0) => break,
                Some(n) => self.len += n,
                None if self.len > 0 => break,
                None => return Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout")),
            }

            if framed_len(self.filled()).is_some_and(|total| self.len >= total) {
                break;
            }
        }

        Ok(self.len)
    }
}
