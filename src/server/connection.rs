use crate::{
    errors::Error,
    http::request::{parse, Parser},
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::server_impl::Handler,
};
use std::{io, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// One worker's state. Serves a single request per connection and is reused
/// for the next connection.
pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,

    parser: Parser,
    output: Vec<u8>,

    conn_limits: ConnLimits,
    resp_limits: RespLimits,
    json_errors: bool,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(
        handler: Arc<H>,
        conn_limits: ConnLimits,
        req_limits: &ReqLimits,
        resp_limits: RespLimits,
        json_errors: bool,
    ) -> Self {
        Self {
            handler,

            parser: Parser::new(req_limits),
            output: Vec::with_capacity(resp_limits.default_capacity),

            conn_limits,
            resp_limits,
            json_errors,
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.parser.reset();

        if self.output.capacity() > self.resp_limits.max_capacity {
            self.output = Vec::with_capacity(self.resp_limits.default_capacity);
        } else {
            self.output.clear();
        }
    }

    /// Reads one request, answers it and closes the write side.
    ///
    /// Errors with a fixed answer are written before closing. Socket errors
    /// are returned without writing anything.
    pub(crate) async fn run<S>(&mut self, stream: &mut S) -> Result<(), io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.reset();

        let result = match self.impl_run(stream).await {
            Ok(()) => Ok(()),
            Err(Error::Io(e)) => Err(e.0),
            Err(err) => {
                warn!(%err, "request failed");
                self.send_error(stream, &err).await
            }
        };

        let _ = stream.shutdown().await;
        result
    }

    #[inline(always)]
    async fn impl_run<S>(&mut self, stream: &mut S) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = self
            .parser
            .fill_buffer(stream, self.conn_limits.socket_read_timeout)
            .await?;

        if read == 0 {
            debug!("peer closed before sending a request");
            return Ok(());
        }

        let request = parse(self.parser.filled())?;
        let response = self.handler.handle(&request).await?;

        debug!(
            method = request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            body_len = response.body().len(),
            gzip = response.header("Content-Encoding").is_some(),
            "request served"
        );

        response.write_to(&mut self.output);
        writer::write_bytes(stream, &self.output, &self.conn_limits).await?;

        Ok(())
    }

    #[inline]
    async fn send_error<S>(&self, stream: &mut S, err: &Error) -> Result<(), io::Error>
    where
        S: AsyncWrite + Unpin,
    {
        writer::send_error(stream, err, self.json_errors, &self.conn_limits).await
    }
}

pub(crate) mod writer {
    use crate::{errors::Error, limits::ConnLimits};
    use std::io;
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::timeout,
    };

    /// Writes the fixed answer of `error`, if it has one.
    #[inline]
    pub(crate) async fn send_error<S: AsyncWrite + Unpin>(
        stream: &mut S,
        error: &Error,
        json: bool,
        limits: &ConnLimits,
    ) -> Result<(), io::Error> {
        match error.as_http(json) {
            Some(answer) => write_bytes(stream, answer, limits).await,
            None => Ok(()),
        }
    }

    #[inline(always)]
    pub(crate) async fn write_bytes<S: AsyncWrite + Unpin>(
        stream: &mut S,
        bytes: &[u8],
        limits: &ConnLimits,
    ) -> Result<(), io::Error> {
        timeout(limits.socket_write_timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::{request::Request, response::Response},
        tools::*,
        Router, StatusCode,
    };
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    type Answer = fn() -> Result<Response, Error>;

    struct Fixed(Answer);

    impl Handler for Fixed {
        async fn handle(&self, _: &Request) -> Result<Response, Error> {
            (self.0)()
        }
    }

    fn connection<H: Handler>(handler: H, json_errors: bool) -> HttpConnection<H> {
        HttpConnection::new(
            Arc::new(handler),
            ConnLimits {
                socket_read_timeout: Duration::from_millis(200),
                ..ConnLimits::default()
            },
            &ReqLimits::default(),
            RespLimits::default(),
            json_errors,
        )
    }

    async fn exchange<H: Handler>(conn: &mut HttpConnection<H>, raw: &[u8]) -> Vec<u8> {
        let (mut client, mut server) = duplex(128 * 1024);
        client.write_all(raw).await.unwrap();

        let _ = conn.run(&mut server).await;
        drop(server);

        let mut answer = Vec::new();
        client.read_to_end(&mut answer).await.unwrap();
        answer
    }

    #[tokio::test]
    async fn serves_one_request() {
        let mut conn = connection(Router::new("/nonexistent"), false);
        let answer = exchange(&mut conn, b"GET /echo/abc HTTP/1.1\r\nHost: x\r\n\r\n").await;

        assert_eq!(
            str_op(&answer),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc"
        );
    }

    #[tokio::test]
    async fn one_request_per_connection() {
        let mut conn = connection(Router::new("/nonexistent"), false);
        let answer = exchange(
            &mut conn,
            b"GET /echo/one HTTP/1.1\r\n\r\nGET /echo/two HTTP/1.1\r\n\r\n",
        )
        .await;

        assert!(str_op(&answer).ends_with("\r\n\r\none"), "{}", str_op(&answer));
    }

    #[tokio::test]
    async fn worker_is_reused() {
        let mut conn = connection(Router::new("/nonexistent"), false);

        for message in ["first-and-longer", "second"] {
            let raw = format!("GET /echo/{message} HTTP/1.1\r\n\r\n");
            let answer = exchange(&mut conn, raw.as_bytes()).await;
            assert!(str_op(&answer).ends_with(message));
            assert_eq!(str_op(&answer).matches("HTTP/1.1").count(), 1);
        }
    }

    #[tokio::test]
    async fn malformed_gets_400() {
        let cases: [&[u8]; 3] = [
            b"GARBAGE\r\n\r\n",
            b"GET / HTTP/1.1\r\nNoSeparator\r\n\r\n",
            b"GET / HTTP/1.1\r\nX: \xff\r\n\r\n",
        ];

        for raw in cases {
            let mut conn = connection(Router::new("/nonexistent"), false);
            assert_eq!(
                str_op(&exchange(&mut conn, raw).await),
                "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
            );
        }
    }

    #[tokio::test]
    async fn unterminated_head_at_eof() {
        let mut conn = connection(Router::new("/nonexistent"), false);
        let (mut client, mut server) = duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        conn.run(&mut server).await.unwrap();
        drop(server);

        let mut answer = Vec::new();
        client.read_to_end(&mut answer).await.unwrap();
        assert!(str_op(&answer).starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn json_error_answers() {
        let mut conn = connection(Router::new("/nonexistent"), true);
        let answer = exchange(&mut conn, b"GET /user-agent HTTP/1.1\r\n\r\n").await;

        assert!(str_op(&answer).starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(str_op(&answer).ends_with(r#""code":"MISSING_HEADER"}"#));
    }

    #[tokio::test]
    async fn handler_errors_are_answered() {
        let cases: [(Answer, &str); 3] = [
            (
                || Err(Error::UnknownStatus(302)),
                "HTTP/1.1 500 Internal Server Error\r\n",
            ),
            (
                || Err(Error::file_access(io::Error::from(io::ErrorKind::NotFound))),
                "HTTP/1.1 500 Internal Server Error\r\n",
            ),
            (
                || Err(Error::ServiceUnavailable),
                "HTTP/1.1 503 Service Unavailable\r\n",
            ),
        ];

        for (answer, first_line) in cases {
            let mut conn = connection(Fixed(answer), false);
            let answer = exchange(&mut conn, b"GET / HTTP/1.1\r\n\r\n").await;
            assert!(str_op(&answer).starts_with(first_line));
        }
    }

    #[tokio::test]
    async fn io_errors_are_silent() {
        let mut conn = connection(
            Fixed(|| Err(io::Error::from(io::ErrorKind::BrokenPipe).into())),
            false,
        );

        assert!(exchange(&mut conn, b"GET / HTTP/1.1\r\n\r\n").await.is_empty());
    }

    #[tokio::test]
    async fn idle_connections_close_silently() {
        let mut conn = connection(Fixed(|| Ok(Response::new(StatusCode::Ok))), false);

        let (client, mut server) = duplex(1024);
        drop(client);
        assert!(conn.run(&mut server).await.is_ok());

        let (mut client, mut server) = duplex(1024);
        let err = conn.run(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        drop(server);
        let mut answer = Vec::new();
        client.read_to_end(&mut answer).await.unwrap();
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn partial_head_times_out_with_400() {
        let cases: [&[u8]; 2] = [b"GET / HT", b"GET / HTTP/1.1\nHost: x\n\n"];

        for raw in cases {
            let mut conn = connection(Fixed(|| Ok(Response::new(StatusCode::Ok))), false);
            let (mut client, mut server) = duplex(1024);
            client.write_all(raw).await.unwrap();

            conn.run(&mut server).await.unwrap();
            drop(server);

            let mut answer = Vec::new();
            client.read_to_end(&mut answer).await.unwrap();
            assert_eq!(
                str_op(&answer),
                "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
                "{:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[tokio::test]
    async fn oversized_output_buffer_is_dropped() {
        let mut conn = connection(
            Fixed(|| Ok(Response::new(StatusCode::Ok).with_body(vec![b'x'; 8 * 1024]))),
            false,
        );
        conn.resp_limits = RespLimits {
            default_capacity: 256,
            max_capacity: 1024,
            ..RespLimits::default()
        };

        exchange(&mut conn, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(conn.output.capacity() > 1024);

        conn.reset();
        assert!(conn.output.capacity() <= 1024);
        assert!(conn.output.is_empty());
    }
}
