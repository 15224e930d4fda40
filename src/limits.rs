//! Server configuration limits and timeouts
//!
//! Every struct has public fields, a [`Default`] and a hidden `_priv` field,
//! so construction goes through struct update syntax:
//!
//! ```no_run
//! use tinyserve::{Router, Server, limits::{ConnLimits, ServerLimits}};
//! use tokio::net::TcpListener;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:4221").await.unwrap())
//!         .handler(Router::new("."))
//!         .server_limits(ServerLimits {
//!             max_connections: 500,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(1),
//!             ..ConnLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency and overload behavior.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue has room? | ====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [--------]   Yes   /--------------------------\   No   [------]
/// [ Worker ] <====== |  Is there a free worker? | =====> [ Wait ]
/// [--------]         \--------------------------/        [------]
/// ```
///
/// A worker owns its read and write buffers and serves exactly one request
/// per connection before going back to the pool.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of connections served at the same time (default: `100`).
    ///
    /// Exactly this many workers are allocated when the server is built.
    pub max_connections: usize,

    /// Accepted connections allowed to wait for a worker (default: `250`).
    ///
    /// Past this, new connections get an immediate `503` and are closed.
    pub max_pending_connections: usize,

    /// How the dispatcher waits for a free worker or a new stream
    /// (default: `Sleep(50µs)`).
    pub wait_strategy: WaitStrategy,

    /// Format of the fixed error answers (default: `false`)
    ///
    /// If `true`, a malformed request gets:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// Connection: close\r
    /// Content-Type: application/json\r
    /// Content-Length: 56\r
    /// \r
    /// {"error":"Malformed request","code":"MALFORMED_REQUEST"}
    /// ```
    /// If `false`:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// Connection: close\r
    /// Content-Length: 0\r
    /// \r
    /// ```
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            json_errors: false,

            _priv: (),
        }
    }
}

/// Strategy for the dispatcher when no worker or no stream is available.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// Uses [`tokio::task::yield_now()`]. Keeps latency low at the price of a
    /// busy CPU.
    Yield,

    /// Uses [`tokio::time::sleep()`] with the given duration.
    Sleep(Duration),
}

/// Per-connection timeouts.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Time allowed for the whole request to arrive (default: `5 seconds`)
    ///
    /// Bounds slow or idle clients. When it expires with nothing read, the
    /// connection is closed without an answer. When it expires mid-request,
    /// the bytes read so far are parsed, and an incomplete head gets `400`.
    pub socket_read_timeout: Duration,

    /// Time allowed for writing the response (default: `5 seconds`)
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(5),
            socket_write_timeout: Duration::from_secs(5),

            _priv: (),
        }
    }
}

/// Request buffering limits.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size of the per-worker read buffer (default: `64 KiB`)
    ///
    /// The whole request (head and body) has to fit. Reading stops once the
    /// buffer is full; a longer body is handed to the router truncated.
    pub buffer_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,

            _priv: (),
        }
    }
}

/// Response buffer management.
///
/// Each worker keeps one output buffer:
/// ```rust
/// # use tinyserve::limits::RespLimits;
/// # let limits = RespLimits::default();
/// # let mut buffer: Vec<u8> = Vec::with_capacity(limits.default_capacity);
/// if buffer.capacity() > limits.max_capacity {
///     buffer = Vec::with_capacity(limits.default_capacity);
/// } else {
///     buffer.clear();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the output buffer (default: `1024 B`)
    pub default_capacity: usize,
    /// Capacity above which the buffer is reallocated instead of reused
    /// (default: `64 KiB`)
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 64 * 1024,

            _priv: (),
        }
    }
}
