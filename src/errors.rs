use std::io;
use thiserror::Error;

/// Everything that can go wrong while serving one connection.
///
/// Each variant (except [`Error::Io`]) has a fixed answer that is written to
/// the client before the connection is closed.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The request head could not be split into its parts.
    #[error("malformed request: {0}")]
    Malformed(#[from] Malformed),

    /// A route needs a header the request does not carry.
    #[error("missing required header `{0}`")]
    MissingHeader(&'static str),

    /// Writing (or, outside of `GET`, reading) a file under the file root failed.
    #[error("file access failed: {0}")]
    FileAccess(IoError),

    /// The response builder only knows `200`, `201` and `404`.
    #[error("unsupported status code {0}")]
    UnknownStatus(u16),

    /// The admission queue is full.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// The socket failed or timed out. Nothing is sent back.
    #[error("i/o error: {0}")]
    Io(IoError),
}

/// Why [`parse`](crate::parse) rejected a buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    #[error("request line is not `METHOD PATH VERSION`")]
    RequestLine,
    #[error("header line has no `: ` separator")]
    Header,
    #[error("header section is not terminated by an empty line")]
    Unterminated,
    #[error("request head is not valid UTF-8")]
    Encoding,
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        /// The bytes sent to the client for this error, or `None` when the
        /// connection is simply dropped.
        pub(crate) const fn as_http(&self, json: bool) -> Option<&'static [u8]> {
            let answer = match (json, self) {
                (_, Self::Io(_)) => return None,
                $(
                (true, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "Connection: close\r\n",
                    "Content-Type: application/json\r\n",
                    "Content-Length: ", $len, "\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "Connection: close\r\n",
                    "Content-Length: 0\r\n\r\n",
                ),
                )*
            };

            Some(answer.as_bytes())
        }
    };
}

impl Error {
    http_errors! {
        Malformed: "400 Bad Request", "56"
            => r#"{"error":"Malformed request","code":"MALFORMED_REQUEST"}"#;
        MissingHeader: "400 Bad Request", "59"
            => r#"{"error":"Missing required header","code":"MISSING_HEADER"}"#;

        FileAccess: "500 Internal Server Error", "51"
            => r#"{"error":"File access failed","code":"FILE_ACCESS"}"#;
        UnknownStatus: "500 Internal Server Error", "59"
            => r#"{"error":"Unsupported status code","code":"UNKNOWN_STATUS"}"#;

        ServiceUnavailable: "503 Service Unavailable", "72"
            => r#"{"error":"Service temporarily unavailable","code":"SERVICE_UNAVAILABLE"}"#;
    }

    pub(crate) fn file_access(err: io::Error) -> Self {
        Error::FileAccess(IoError(err))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(IoError(err))
    }
}

/// [`io::Error`] compared by [`kind`](io::Error::kind) only.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct IoError(pub io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    fn all_answering() -> [Error; 5] {
        [
            Error::Malformed(Malformed::Header),
            Error::MissingHeader("User-Agent"),
            Error::file_access(io::Error::from(io::ErrorKind::PermissionDenied)),
            Error::UnknownStatus(500),
            Error::ServiceUnavailable,
        ]
    }

    #[test]
    fn status_lines() {
        let cases = [
            "HTTP/1.1 400 Bad Request\r\n",
            "HTTP/1.1 400 Bad Request\r\n",
            "HTTP/1.1 500 Internal Server Error\r\n",
            "HTTP/1.1 500 Internal Server Error\r\n",
            "HTTP/1.1 503 Service Unavailable\r\n",
        ];

        for (err, first_line) in all_answering().iter().zip(cases) {
            for json in [true, false] {
                let answer = str_op(err.as_http(json).unwrap());
                assert!(answer.starts_with(first_line), "{err:?}: {answer}");
            }
        }
    }

    #[test]
    fn json_length_matches_body() {
        for err in all_answering() {
            let answer = str_op(err.as_http(true).unwrap());
            let (head, body) = answer.split_once("\r\n\r\n").unwrap();

            let declared = head
                .lines()
                .find_map(|line| line.strip_prefix("Content-Length: "))
                .unwrap();
            assert_eq!(declared.parse::<usize>().unwrap(), body.len(), "{err:?}");
        }
    }

    #[test]
    fn plain_has_empty_body() {
        for err in all_answering() {
            let answer = str_op(err.as_http(false).unwrap());
            assert!(answer.ends_with("Content-Length: 0\r\n\r\n"), "{err:?}");
        }
    }

    #[test]
    fn io_is_silent() {
        let err = Error::from(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err.as_http(true), None);
        assert_eq!(err.as_http(false), None);
    }

    #[test]
    fn io_compared_by_kind() {
        assert_eq!(
            Error::from(io::Error::new(io::ErrorKind::TimedOut, "read timeout")),
            Error::from(io::Error::from(io::ErrorKind::TimedOut)),
        );
        assert_ne!(
            Error::from(io::Error::from(io::ErrorKind::TimedOut)),
            Error::from(io::Error::from(io::ErrorKind::BrokenPipe)),
        );
    }
}
