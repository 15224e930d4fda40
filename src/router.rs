//! The five fixed routes: `/`, `/user-agent`, `/echo/<rest>`, `/files/<name>`
//! and everything else.

use crate::{
    errors::Error,
    http::{gzip, request::Request, response::Response, types::Method},
    server::server_impl::Handler,
    StatusCode,
};
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tokio::fs;
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

/// Base directory of the `/files/` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRoot {
    dir: PathBuf,
}

impl FileRoot {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[inline(always)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Joins `name` onto the root.
    ///
    /// Returns `None` when `name` is absolute, has a `..`, a root or a prefix
    /// component, or names nothing at all (`""`, `.`).
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let mut named = false;

        for component in relative.components() {
            match component {
                Component::Normal(_) => named = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        named.then(|| self.dir.join(relative))
    }
}

/// What a request resolved to, before it is turned into a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// `/`
    Root,
    /// `/echo/<message>`
    Echo(String),
    /// `/user-agent`, with the header value
    UserAgent(String),
    /// `GET /files/<name>` of an existing regular file
    FileGet(Vec<u8>),
    /// `POST /files/<name>` stored the body
    FileCreated,
    /// `GET /files/<name>` with nothing readable there
    FileNotFound,
    /// No route, or a method the file route does not serve
    NotFound,
}

impl RouteOutcome {
    /// Builds the response. With `encode`, the body of the echo, user-agent and
    /// file-read outcomes is compressed and `Content-Encoding: gzip` is added.
    pub fn into_response(self, encode: bool) -> Result<Response, Error> {
        let (content_type, body) = match self {
            RouteOutcome::Root => return Ok(Response::new(StatusCode::Ok)),
            RouteOutcome::FileCreated => return Ok(Response::new(StatusCode::Created)),
            RouteOutcome::FileNotFound | RouteOutcome::NotFound => {
                return Ok(Response::new(StatusCode::NotFound))
            }

            RouteOutcome::Echo(message) => (TEXT_PLAIN, message.into_bytes()),
            RouteOutcome::UserAgent(value) => (TEXT_PLAIN, value.into_bytes()),
            RouteOutcome::FileGet(bytes) => (OCTET_STREAM, bytes),
        };

        let response = Response::new(StatusCode::Ok).with_header("Content-Type", content_type);

        if encode {
            let packed = gzip::compress(&body)?;
            Ok(response
                .with_header("Content-Encoding", "gzip")
                .with_body(packed))
        } else {
            Ok(response.with_body(body))
        }
    }
}

/// Matches the request against the routes, first match wins.
///
/// Touches the file system only for `GET`/`POST /files/<name>`.
///
/// # Errors
///
/// - [`Error::MissingHeader`] for `/user-agent` without a `User-Agent` header
/// - [`Error::FileAccess`] when a `POST` cannot write its file, or its name
///   leaves the file root
pub async fn route(request: &Request, files: &FileRoot) -> Result<RouteOutcome, Error> {
    let outcome = match request.path() {
        "/" => RouteOutcome::Root,
        "/user-agent" => {
            let value = request
                .header("User-Agent")
                .ok_or(Error::MissingHeader("User-Agent"))?;

            RouteOutcome::UserAgent(value.to_owned())
        }
        path => {
            if let Some(message) = tail(path, "/echo/") {
                RouteOutcome::Echo(message.to_owned())
            } else if let Some(name) = tail(path, "/files/") {
                file_route(request, files, name).await?
            } else {
                RouteOutcome::NotFound
            }
        }
    };

    Ok(outcome)
}

/// Routes `request` and builds its response, gzip-encoded when the client
/// asks for it.
///
/// # Examples
/// ```no_run
/// # #[tokio::main]
/// # async fn main() {
/// use tinyserve::{parse, respond, FileRoot, StatusCode};
///
/// let req = parse(b"GET /echo/abc HTTP/1.1\r\n\r\n").unwrap();
/// let resp = respond(&req, &FileRoot::new("/tmp")).await.unwrap();
///
/// assert_eq!(resp.status(), StatusCode::Ok);
/// assert_eq!(resp.body(), b"abc");
/// # }
/// ```
pub async fn respond(request: &Request, files: &FileRoot) -> Result<Response, Error> {
    let encode = gzip::accepts_gzip(request.headers());

    route(request, files).await?.into_response(encode)
}

#[inline]
fn tail<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

async fn file_route(
    request: &Request,
    files: &FileRoot,
    name: &str,
) -> Result<RouteOutcome, Error> {
    match request.known_method() {
        Some(Method::Get) => {
            let Some(path) = files.resolve(name) else {
                debug!(name, "file name rejected");
                return Ok(RouteOutcome::FileNotFound);
            };

            Ok(match read_regular_file(&path).await {
                Some(bytes) => RouteOutcome::FileGet(bytes),
                None => RouteOutcome::FileNotFound,
            })
        }
        Some(Method::Post) => {
            let path = files.resolve(name).ok_or_else(|| {
                Error::file_access(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "file name leaves the file root",
                ))
            })?;

            fs::write(&path, request.body())
                .await
                .map_err(Error::file_access)?;

            Ok(RouteOutcome::FileCreated)
        }
        _ => Ok(RouteOutcome::NotFound),
    }
}

async fn read_regular_file(path: &Path) -> Option<Vec<u8>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return None,
    }

    fs::read(path)
        .await
        .inspect_err(|err| debug!(path = %path.display(), %err, "file read failed"))
        .ok()
}

/// The server [`Handler`] serving the fixed routes out of one [`FileRoot`].
///
/// # Examples
/// ```no_run
/// use tinyserve::{Router, Server};
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     Server::builder()
///         .listener(TcpListener::bind("localhost:4221").await.unwrap())
///         .handler(Router::new("/tmp/files"))
///         .build()
///         .launch()
///         .await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    files: FileRoot,
}

impl Router {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            files: FileRoot::new(dir),
        }
    }

    #[inline(always)]
    pub fn files(&self) -> &FileRoot {
        &self.files
    }
}

impl Handler for Router {
    async fn handle(&self, req: &Request) -> Result<Response, Error> {
        respond(req, &self.files).await
    }
}


#[cfg(test)]
mod outcome_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn empty_answers_never_encoded() {
        let cases = [
            (RouteOutcome::Root, StatusCode::Ok),
            (RouteOutcome::FileCreated, StatusCode::Created),
            (RouteOutcome::FileNotFound, StatusCode::NotFound),
            (RouteOutcome::NotFound, StatusCode::NotFound),
        ];

        for (outcome, status) in cases {
            for gzip in [false, true] {
                let resp = outcome.clone().into_response(gzip).unwrap();

                assert_eq!(resp.status(), status);
                assert_eq!(resp.headers().count(), 0, "{outcome:?}");
                assert!(resp.body().is_empty());
            }
        }
    }

    #[test]
    fn content_types() {
        let cases = [
            (RouteOutcome::Echo("abc".into()), TEXT_PLAIN, &b"abc"[..]),
            (RouteOutcome::UserAgent("curl/8".into()), TEXT_PLAIN, &b"curl/8"[..]),
            (RouteOutcome::FileGet(vec![0, 1, 2]), OCTET_STREAM, &[0u8, 1, 2][..]),
        ];

        for (outcome, content_type, body) in cases {
            let plain = outcome.clone().into_response(false).unwrap();
            assert_eq!(plain.header("Content-Type"), Some(content_type));
            assert_eq!(plain.header("Content-Encoding"), None);
            assert_eq!(plain.body(), body);

            let packed = outcome.into_response(true).unwrap();
            let headers: Vec<_> = packed.headers().collect();
            assert_eq!(
                headers,
                [("Content-Type", content_type), ("Content-Encoding", "gzip")]
            );
            assert_eq!(gunzip(packed.body()), body);
        }
    }
}
