//! Core HTTP protocol types and utilities

use crate::errors::Error;

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// METHOD

/// HTTP request methods the router branches on
///
/// The parser accepts any method token; [`Method::from_token`] maps the ones
/// listed here and returns `None` for the rest.
///
/// # References
///
/// - [RFC 9110, Section 9.3](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    Get,
    /// POST method - resource-specific processing of the request payload
    Post,
}

impl Method {
    const ALL: [Method; 2] = [Method::Get, Method::Post];

    /// Maps a request-line token, ignoring ASCII case (`get` is [`Method::Get`]).
    #[inline]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(token))
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// Status codes the response builder can produce
        ///
        /// Any other code is refused with [`Error::UnknownStatus`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            // Returns the status line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn first_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            #[inline]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }
        }

        impl TryFrom<u16> for StatusCode {
            type Error = Error;

            #[inline]
            fn try_from(code: u16) -> Result<Self, Self::Error> {
                match code {
                    $( $num => Ok(StatusCode::$name), )+
                    other => Err(Error::UnknownStatus(other)),
                }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)]
    Created = (201, "Created");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
}
