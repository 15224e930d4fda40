use crate::{
    errors::Error,
    http::{request::Request, response::Response},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits, WaitStrategy},
    server::connection::{writer, HttpConnection},
};
use crossbeam::queue::SegQueue;
use std::{
    future::Future,
    marker::{Send, Sync},
    net::SocketAddr,
    sync::Arc,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};
use tracing::{debug, info, warn};

/// Turns a parsed request into a response.
///
/// An `Err` is answered with the fixed response of the error (see
/// [`Error`]) and the connection is closed.
///
/// # Examples
///
/// ```
/// use tinyserve::{Error, Handler, Request, Response, StatusCode};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, req: &Request) -> Result<Response, Error> {
///         match req.path() {
///             "/hello" => Ok(Response::new(StatusCode::Ok).with_body("Hello!")),
///             _ => Ok(Response::new(StatusCode::NotFound)),
///         }
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    fn handle(&self, request: &Request) -> impl Future<Output = Result<Response, Error>> + Send;
}

/// An HTTP server answering one request per connection.
///
/// Workers are allocated when the server is built. Accepted connections wait
/// in a queue for a free worker; when the queue is full they get a `503`.
///
/// # Examples
///
/// ```no_run
/// use tinyserve::{Router, Server};
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(TcpListener::bind("localhost:4221").await.unwrap())
///         .handler(Router::new("."))
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    stream_queue: TcpQueue,
    error_queue: TcpQueue,
    server_limits: ServerLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder<H: Handler>() -> ServerBuilder<H> {
        ServerBuilder {
            listener: None,
            handler: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
            response_limits: None,
        }
    }

    /// Address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    #[inline]
    pub async fn launch(self) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "accepting connections");
        }

        loop {
            let value = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };

            debug!(peer = %value.1, "connection accepted");

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push(value),
                false => self.error_queue.push(value),
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder<H: Handler> {
    listener: Option<TcpListener>,
    handler: Option<Arc<H>>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the request handler, usually a [`Router`](crate::Router).
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Configures concurrency and overload behavior.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use tinyserve::{Router, Server, limits::ServerLimits};
    /// use tokio::net::TcpListener;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:4221").await.unwrap())
    ///     .handler(Router::new("."))
    ///     .server_limits(ServerLimits {
    ///         max_connections: 2500,
    ///         max_pending_connections: 10000,
    ///         ..ServerLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures socket timeouts.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures the read buffer.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures reuse of the output buffer.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder and spawns the workers.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when:
    /// - The `listener` method was not called.
    /// - The `handler` method was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, handler, limits) = self.get_all_parts();

        let stream_queue = Arc::new(SegQueue::new());
        let error_queue = Arc::new(SegQueue::new());

        for _ in 0..limits.0.max_connections {
            Self::spawn_worker(&stream_queue, &limits, &handler);
        }
        Self::spawn_alarmist(&error_queue, &limits);

        Server {
            listener,
            stream_queue,
            error_queue,
            server_limits: limits.0,
        }
    }

    /// Spawns a worker under a supervisor task that starts a fresh one if it
    /// panics, so the pool keeps `max_connections` workers.
    #[inline]
    fn spawn_worker(queue: &TcpQueue, limits: &AllLimits, handler: &Arc<H>) {
        let queue = queue.clone();
        let limits = limits.clone();
        let handler = handler.clone();

        tokio::spawn(async move {
            loop {
                let worker = tokio::spawn(run_worker(
                    queue.clone(),
                    limits.clone(),
                    handler.clone(),
                ));

                match worker.await {
                    Err(err) if err.is_panic() => warn!("worker panicked, restarting"),
                    _ => break,
                }
            }
        });
    }

    #[inline]
    fn spawn_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, conn_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, addr) =
                    Server::get_stream(&queue, &server_limits.wait_strategy).await;

                warn!(peer = %addr, "pending queue full, rejecting");

                let _ = writer::send_error(
                    &mut stream,
                    &Error::ServiceUnavailable,
                    server_limits.json_errors,
                    &conn_limits,
                )
                .await;
            }
        });
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Arc<H>, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.handler
                .expect("The `handler` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        )
    }
}

async fn run_worker<H: Handler>(queue: TcpQueue, limits: AllLimits, handler: Arc<H>) {
    let (server_limits, conn_limits, req_limits, resp_limits) = limits;
    let mut conn = HttpConnection::new(
        handler,
        conn_limits,
        &req_limits,
        resp_limits,
        server_limits.json_errors,
    );

    loop {
        let (mut stream, addr) = Server::get_stream(&queue, &server_limits.wait_strategy).await;

        match conn.run(&mut stream).await {
            Ok(()) => debug!(peer = %addr, "connection closed"),
            Err(err) => warn!(peer = %addr, %err, "connection failed"),
        }
    }
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
type AllLimits = (ServerLimits, ConnLimits, ReqLimits, RespLimits);
