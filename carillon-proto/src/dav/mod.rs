mod codec;
mod controller;
mod middleware;
mod node;
mod report;
mod resource;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use http_body_util::BodyExt;
use hyper::server::conn::http1 as http;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;

use carillon_store::Store;

pub use codec::{HttpBody, HttpResponse};
pub use controller::Controller;

/// How far the server goes when a referenced principal does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autocreate {
    /// Nothing is created implicitly
    None,
    /// The principal collection is created on first reference
    Principal,
    /// The principal plus a default calendar and addressbook
    Defaults,
}

#[derive(Debug, Clone)]
pub struct DavConfig {
    /// Leading URI path to strip before routing, no trailing slash
    pub route_prefix: String,
    pub autocreate: Autocreate,
    /// Principal path assumed when no identity was forwarded
    pub current_user_principal: Option<String>,
    /// When false, minor client protocol deviations are tolerated
    pub strict: bool,
    /// Collection size above which queries consult the index first
    pub index_threshold: usize,
}

impl Default for DavConfig {
    fn default() -> Self {
        Self {
            route_prefix: String::new(),
            autocreate: Autocreate::None,
            current_user_principal: None,
            strict: false,
            index_threshold: 16,
        }
    }
}

/// Everything a request handler needs.
pub struct Context {
    pub store: Arc<Store>,
    pub config: Arc<DavConfig>,
    /// The pre-authenticated identity, absent for anonymous requests
    pub principal: Option<String>,
}

pub struct Server {
    bind_addr: SocketAddr,
    store: Arc<Store>,
    config: Arc<DavConfig>,
}

impl Server {
    pub fn new(bind_addr: SocketAddr, store: Arc<Store>, config: DavConfig) -> Self {
        Self {
            bind_addr,
            store,
            config: Arc::new(config),
        }
    }

    pub async fn run(self: Self, mut must_exit: watch::Receiver<bool>) -> Result<()> {
        let tcp = TcpListener::bind(self.bind_addr).await?;
        tracing::info!("DAV server listening on {:#}", self.bind_addr);

        let mut connections = FuturesUnordered::new();
        while !*must_exit.borrow() {
            let wait_conn_finished = async {
                if connections.is_empty() {
                    futures::future::pending().await
                } else {
                    connections.next().await
                }
            };
            let (socket, remote_addr) = tokio::select! {
                a = tcp.accept() => a?,
                _ = wait_conn_finished => continue,
                _ = must_exit.changed() => continue,
            };
            tracing::debug!("accepted connection from {}", remote_addr);

            let store = self.store.clone();
            let config = self.config.clone();
            let conn = tokio::spawn(async move {
                match http::Builder::new()
                    .serve_connection(
                        TokioIo::new(socket),
                        service_fn(move |req: Request<hyper::body::Incoming>| {
                            let store = store.clone();
                            let config = config.clone();
                            tracing::info!("{:?} {:?}", req.method(), req.uri());
                            async move {
                                match dispatch(store, config, req).await {
                                    Ok(v) => Ok::<_, hyper::http::Error>(v),
                                    Err(e) => {
                                        tracing::error!(err=?e, "internal error");
                                        Response::builder()
                                            .status(500)
                                            .body(codec::text_body("Internal error"))
                                    }
                                }
                            }
                        }),
                    )
                    .await
                {
                    Err(e) => tracing::warn!(err=?e, "connection failed"),
                    Ok(()) => tracing::trace!("connection terminated with success"),
                }
            });
            connections.push(conn);
        }
        drop(tcp);

        tracing::info!("Server shutting down, draining remaining connections...");
        while connections.next().await.is_some() {}

        Ok(())
    }
}

async fn dispatch(
    store: Arc<Store>,
    config: Arc<DavConfig>,
    req: Request<hyper::body::Incoming>,
) -> Result<HttpResponse> {
    // service discovery, before anything else
    if let Some(redirect) = well_known(&config, req.uri().path()) {
        return Ok(Response::builder()
            .status(301)
            .header("Location", redirect)
            .body(codec::text_body(""))?);
    }

    let principal = middleware::principal_of(&config, &req);
    let ctx = Context {
        store,
        config,
        principal,
    };

    let req = req.map(|body| {
        body.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed_unsync()
    });
    Controller::route(ctx, req).await
}

/// RFC 6764 bootstrapping: both well-known endpoints answer with a
/// permanent redirect towards the configured principal (or the root,
/// which advertises `current-user-principal`).
fn well_known(config: &DavConfig, path: &str) -> Option<String> {
    match path {
        "/.well-known/caldav" | "/.well-known/carddav" => Some(match &config.current_user_principal {
            Some(principal) => format!("{}{}", config.route_prefix, principal),
            None => format!("{}/", config.route_prefix),
        }),
        _ => None,
    }
}
