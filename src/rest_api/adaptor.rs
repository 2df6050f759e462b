//! # REST Service Adaptor
//!
//! Exposes queries, commands and find-by-id lookups as HTTP routes.
//! Every `expose_*` call resolves the names it references immediately and
//! fails if any is unknown, so a misconfigured route never reaches traffic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::binder::{Binder, BinderRegistry, Document};
use crate::config::{parse_method, DocflowConfig, RouteDecl, ServerConfig};
use crate::cqrs::CqrsManager;
use crate::observability::{Event, MetricsRegistry};
use crate::platform::Platform;
use crate::runtime::ContextPool;

use super::driver::{stream_query, StreamSettings};
use super::errors::{RestError, RestResult};
use super::routes::observability_routes;

const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// HTTP surface over a platform
pub struct RestServiceAdaptor {
    cqrs: Arc<CqrsManager>,
    binders: Arc<BinderRegistry>,
    metrics: Arc<MetricsRegistry>,
    pool: Arc<ContextPool>,
    server: ServerConfig,
    settings: StreamSettings,
    routes: BTreeMap<String, MethodRouter>,
    exposed: BTreeSet<(String, String)>,
}

impl RestServiceAdaptor {
    /// Create an adaptor with no routes over `platform`
    pub fn new(platform: &Platform, pool: Arc<ContextPool>) -> Self {
        Self {
            cqrs: Arc::clone(platform.cqrs()),
            binders: Arc::clone(platform.binders()),
            metrics: Arc::clone(platform.metrics()),
            pool,
            server: ServerConfig::default(),
            settings: StreamSettings::default(),
            routes: BTreeMap::new(),
            exposed: BTreeSet::new(),
        }
    }

    /// Create an adaptor with the config's server settings, flow control and routes
    pub fn from_config(
        platform: &Platform,
        config: &DocflowConfig,
        pool: Arc<ContextPool>,
    ) -> RestResult<Self> {
        let mut adaptor = Self::new(platform, pool)
            .with_server(config.server.clone())
            .with_settings(StreamSettings::from_config(&config.flow_control)?);
        for route in &config.routes {
            adaptor.expose(route)?;
        }
        Ok(adaptor)
    }

    /// Listener and CORS settings
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Flow control for streamed queries
    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Expose one declared route
    pub fn expose(&mut self, route: &RouteDecl) -> RestResult<()> {
        match route {
            RouteDecl::Query { query, uri } => self.expose_query(query, uri),
            RouteDecl::Command {
                command,
                uri,
                method,
            } => self.expose_command(command, uri, parse_method(method)?),
            RouteDecl::FindById { binder, uri } => self.expose_find_by_id(binder, uri),
        }
    }

    /// `GET uri` streams `query_name` as a JSON array.
    ///
    /// Path parameters are bound into the query context by name.
    pub fn expose_query(&mut self, query_name: &str, uri: &str) -> RestResult<()> {
        let query = self
            .cqrs
            .resolve_query(query_name)
            .map_err(|_| RestError::QueryNotFound(query_name.to_string()))?;
        let pool = Arc::clone(&self.pool);
        let metrics = Arc::clone(&self.metrics);
        let settings = self.settings;

        let handler = move |params: Option<Path<HashMap<String, String>>>| {
            let query = Arc::clone(&query);
            let pool = Arc::clone(&pool);
            let metrics = Arc::clone(&metrics);
            async move {
                let params = path_params(params);
                stream_query(&pool, query, params, settings, metrics)
            }
        };
        self.add_route(Method::GET, uri, get(handler))
    }

    /// `method uri` invokes `command_name` with the request body.
    ///
    /// Success is an empty 200. Handler failure is an empty 500.
    pub fn expose_command(&mut self, command_name: &str, uri: &str, method: Method) -> RestResult<()> {
        if !self.cqrs.has_command(command_name) {
            return Err(RestError::CommandNotFound(command_name.to_string()));
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RestError::InvalidRoute(format!("unsupported method {method}")))?;
        let cqrs = Arc::clone(&self.cqrs);
        let metrics = Arc::clone(&self.metrics);
        let command = command_name.to_string();

        let handler = move |body: Bytes| {
            let cqrs = Arc::clone(&cqrs);
            let metrics = Arc::clone(&metrics);
            let command = command.clone();
            async move { invoke_command(&cqrs, &metrics, &command, body).await }
        };
        self.add_route(method, uri, on(filter, handler))
    }

    /// `GET uri?id=...` returns the binder document stored under `id`
    pub fn expose_find_by_id(&mut self, binder_name: &str, uri: &str) -> RestResult<()> {
        let binder = self
            .binders
            .get(binder_name)
            .map_err(|_| RestError::BinderNotFound(binder_name.to_string()))?;
        let metrics = Arc::clone(&self.metrics);

        let handler = move |Query(params): Query<HashMap<String, String>>| {
            let binder = Arc::clone(&binder);
            let metrics = Arc::clone(&metrics);
            async move { find_by_id(binder, &metrics, params.get("id")).await }
        };
        self.add_route(Method::GET, uri, get(handler))
    }

    fn add_route(&mut self, method: Method, uri: &str, route: MethodRouter) -> RestResult<()> {
        if !uri.starts_with('/') {
            return Err(RestError::InvalidRoute(format!("uri must start with '/': {uri}")));
        }
        let conflict = || RestError::RouteConflict {
            method: method.to_string(),
            uri: uri.to_string(),
        };
        if RESERVED_PATHS.contains(&uri) {
            return Err(conflict());
        }
        // Paths differing only in parameter names cannot coexist in the router
        let shape = route_shape(uri);
        if self
            .routes
            .keys()
            .any(|existing| existing != uri && route_shape(existing) == shape)
        {
            return Err(conflict());
        }
        if !self.exposed.insert((method.to_string(), uri.to_string())) {
            return Err(conflict());
        }

        let merged = match self.routes.remove(uri) {
            Some(existing) => existing.merge(route),
            None => route,
        };
        self.routes.insert(uri.to_string(), merged);
        tracing::info!(event = %Event::RouteRegistered, %method, uri, "route exposed");
        Ok(())
    }

    /// Exposed (method, uri) pairs
    pub fn routes(&self) -> Vec<(String, String)> {
        self.exposed.iter().cloned().collect()
    }

    /// Build the router: exposed routes plus `/health` and `/metrics`
    pub fn router(&self) -> Router {
        let mut router = observability_routes(Arc::clone(&self.metrics));
        for (uri, route) in &self.routes {
            router = router.route(uri, route.clone());
        }
        router
            .layer(TraceLayer::new_for_http())
            .layer(self.cors())
    }

    fn cors(&self) -> CorsLayer {
        let origin = if self.server.cors_origins.is_empty() {
            AllowOrigin::any()
        } else {
            let origins: Vec<_> = self
                .server
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            AllowOrigin::list(origins)
        };
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> RestResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.server.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RestError::Bind {
                addr: addr.clone(),
                source,
            })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> RestResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.server.socket_addr());
        tracing::info!(
            event = %Event::Serving,
            addr = %addr,
            routes = self.exposed.len(),
            "serving"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(RestError::Serve)?;

        tracing::info!(event = %Event::ShutdownComplete, "server stopped");
        Ok(())
    }
}

fn path_params(params: Option<Path<HashMap<String, String>>>) -> Document {
    let mut doc = Document::new();
    if let Some(Path(params)) = params {
        for (name, value) in params {
            doc.insert(name, value);
        }
    }
    doc
}

/// Literal segments kept, parameter names erased
fn route_shape(uri: &str) -> Vec<&str> {
    uri.split('/')
        .map(|seg| {
            if seg.starts_with(':') {
                ":"
            } else if seg.starts_with('*') {
                "*"
            } else {
                seg
            }
        })
        .collect()
}

async fn invoke_command(
    cqrs: &CqrsManager,
    metrics: &MetricsRegistry,
    command: &str,
    body: Bytes,
) -> Response {
    let payload = if body.is_empty() {
        Document::new()
    } else {
        match Document::from_slice(&body) {
            Ok(doc) => doc,
            Err(e) => return RestError::InvalidBody(e.to_string()).into_response(),
        }
    };

    match cqrs.invoke_command(command, payload).await {
        Ok(()) => {
            metrics.increment_commands_succeeded();
            tracing::debug!(event = %Event::CommandHandled, command, "command handled");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            metrics.increment_commands_failed();
            tracing::warn!(event = %Event::CommandFailed, command, error = %e, "command failed");
            RestError::Internal.into_response()
        }
    }
}

async fn find_by_id(
    binder: Arc<dyn Binder>,
    metrics: &MetricsRegistry,
    id: Option<&String>,
) -> Response {
    let Some(id) = id else {
        return RestError::NotFound.into_response();
    };
    match binder.get(id).await {
        Ok(Some(doc)) => ([(header::CONTENT_TYPE, "application/json")], doc.encode()).into_response(),
        Ok(None) => RestError::NotFound.into_response(),
        Err(e) => {
            metrics.increment_lookups_failed();
            tracing::error!(
                event = %Event::LookupFailed,
                binder = binder.name(),
                id = %id,
                error = %e,
                "failed to look up document"
            );
            RestError::Internal.into_response()
        }
    }
}
