use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use backdex_engine::StoreError;
use backdex_indexer::DispatchError;
use log::{debug, error, info};
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::state::DaemonState;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// A response before it is handed to tiny_http.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub json: bool,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            json: false,
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status: 200,
                body,
                json: true,
            },
            Err(err) => Self::failure(err),
        }
    }

    fn failure(err: impl std::fmt::Display) -> Self {
        Self::text(500, format!("An error has occurred: {err}"))
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    fn store_error(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => Self::text(404, format!("Not indexed: {path}")),
            other => Self::failure(other),
        }
    }

    fn dispatch_error(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(err) => Self::store_error(err),
            other => Self::failure(other),
        }
    }
}

fn query_params(url: &str) -> Option<(String, HashMap<String, String>)> {
    let parsed = url::Url::parse(&format!("http://localhost{url}")).ok()?;
    let params = parsed.query_pairs().into_owned().collect();
    Some((parsed.path().to_string(), params))
}

/// Missing or non-numeric pages are page 1.
fn page_param(params: &HashMap<String, String>) -> usize {
    params
        .get("page")
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(1)
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, Reply> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Reply::text(400, format!("Missing query parameter: {name}")))
}

/// Map one request onto daemon operations.
pub fn route(state: &DaemonState, method: &Method, url: &str) -> Reply {
    let Some((path, params)) = query_params(url) else {
        return Reply::text(400, "Bad Request");
    };

    let allowed: &[Method] = match path.as_str() {
        "/files" | "/search" | "/file" | "/dir" => &[Method::Get],
        "/backup" => &[Method::Get, Method::Post],
        "/rescan" => &[Method::Post],
        _ => return Reply::not_found(),
    };
    if !allowed.contains(method) {
        return Reply::text(405, "Method Not Allowed");
    }

    match path.as_str() {
        "/files" => match state.dispatcher.list_files(page_param(&params)) {
            Ok(page) => Reply::json(&page),
            Err(err) => Reply::dispatch_error(err),
        },
        "/search" => {
            let query = params.get("query").map(String::as_str).unwrap_or_default();
            match state.dispatcher.search_files(query, page_param(&params)) {
                Ok(result) => Reply::json(&result),
                Err(err) => Reply::dispatch_error(err),
            }
        }
        "/backup" => match state.dispatcher.backup_file() {
            Ok(status) => Reply::text(200, status),
            Err(err) => Reply::dispatch_error(err),
        },
        "/file" => match required(&params, "path") {
            Ok(p) => state.store.get(p).map_or_else(Reply::store_error, |r| Reply::json(&r)),
            Err(reply) => reply,
        },
        "/dir" => match required(&params, "path") {
            Ok(p) => state
                .store
                .directory_listing(p)
                .map_or_else(Reply::store_error, |l| Reply::json(&l)),
            Err(reply) => reply,
        },
        "/rescan" => match required(&params, "path") {
            Ok(p) => match state.rescan(p) {
                Ok(summary) => Reply::json(&summary),
                Err(err) => Reply::failure(format!("{err:#}")),
            },
            Err(reply) => reply,
        },
        _ => Reply::not_found(),
    }
}

fn respond(state: &DaemonState, request: Request) {
    let reply = route(state, request.method(), request.url());
    debug!(
        "[http] {} {} -> {}",
        request.method(),
        request.url(),
        reply.status
    );

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    let content_type: &[u8] = if reply.json {
        b"application/json"
    } else {
        b"text/plain; charset=utf-8"
    };
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type) {
        response = response.with_header(header);
    }

    if let Err(err) = request.respond(response) {
        debug!("[http] client went away: {err}");
    }
}

pub struct HttpServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl HttpServer {
    pub fn spawn(state: Arc<DaemonState>, addr: SocketAddr) -> anyhow::Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
        let addr = server.server_addr().to_ip().unwrap_or(addr);
        info!("[http] listening on http://{addr}");

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || serve(server, state, &shutdown))
        };

        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            error!("[http] server thread panicked");
        }
        info!("[http] stopped");
    }
}

fn serve(server: Server, state: Arc<DaemonState>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        match server.recv_timeout(ACCEPT_POLL) {
            Ok(Some(request)) => {
                let state = Arc::clone(&state);
                thread::spawn(move || respond(&state, request));
            }
            Ok(None) => continue,
            Err(err) => {
                error!("[http] accept error: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
