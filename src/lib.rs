//! tinyserve - minimal HTTP/1.1 server with a fixed set of routes
//!
//! Every connection carries exactly one request and is closed after the
//! answer. Routes:
//!
//! - `/` - `200` with an empty body
//! - `/user-agent` - the `User-Agent` header echoed back
//! - `/echo/<text>` - `<text>` echoed back
//! - `/files/<name>` - `GET` reads, `POST` writes a file under the file root
//! - anything else - `404`
//!
//! Bodies of the echo, user-agent and file-read answers are gzip-encoded
//! when `Accept-Encoding` mentions `gzip`.
//!
//! # Examples
//!
//! Serving the routes:
//! ```no_run
//! use tinyserve::{Router, Server};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("localhost:4221").await.unwrap())
//!         .handler(Router::new("/tmp/files"))
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//! Using the pieces without a socket:
//! ```
//! use tinyserve::{build, parse, accepts_gzip};
//!
//! let req = parse(b"GET /echo/hi HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n").unwrap();
//! assert_eq!(req.path(), "/echo/hi");
//! assert!(accepts_gzip(req.headers()));
//!
//! let bytes = build(200, [("Content-Type", "text/plain")], b"hi").unwrap();
//! assert!(bytes.ends_with(b"Content-Length: 2\r\n\r\nhi"));
//! ```

pub(crate) mod http {
    pub(crate) mod gzip;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod router;

pub use crate::{
    errors::{Error, IoError, Malformed},
    http::{
        gzip::{accepts_gzip, compress},
        request::{framed_len, parse, Request},
        response::{build, Response},
        types::{Method, StatusCode},
    },
    router::{respond, route, FileRoot, RouteOutcome, Router},
    server::server_impl::{Handler, Server, ServerBuilder},
};
