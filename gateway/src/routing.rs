// gateway/src/routing.rs
//! Ordered route tables composed from independent matcher stages.
//!
//! Every matcher implements [`Stage`]: it either answers the request or hands
//! it back untouched as [`Dispatch::Unclaimed`] so the next stage can try.

use actix_web::{dev::Payload, error::PayloadError, http::Method, web::{Bytes, BytesMut}, Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;

/// An inbound request together with its unread body stream
pub struct Inbound {
    pub req: HttpRequest,
    pub payload: Payload,
}

impl Inbound {
    pub fn new(req: HttpRequest, payload: Payload) -> Self {
        Self { req, payload }
    }

    pub fn method(&self) -> &Method {
        self.req.method()
    }

    pub fn path(&self) -> &str {
        self.req.path()
    }
}

/// Result of offering a request to a stage
pub enum Dispatch {
    Handled(HttpResponse),
    Unclaimed(Inbound),
}

/// A matcher that may claim a request.
///
/// Futures are not `Send`: stages run on the actix worker that accepted the
/// connection.
#[async_trait(?Send)]
pub trait Stage: Send + Sync {
    async fn handle(&self, inbound: Inbound) -> Result<Dispatch, Error>;
}

/// Path predicate of a route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `*`
    Any,
    /// `/prefix/*`, stored without the trailing `/*`
    Prefix(String),
    Exact(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            PathPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            PathPattern::Prefix(prefix.to_string())
        } else {
            PathPattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(exact) => exact == path,
            // "/api/team/*" claims "/api/team" and everything below it, but not "/api/teams"
            PathPattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Any => write!(f, "*"),
            PathPattern::Prefix(prefix) => write!(f, "{}/*", prefix),
            PathPattern::Exact(exact) => write!(f, "{}", exact),
        }
    }
}

/// Method predicate of a route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(only) => only == method,
        }
    }
}

pub struct Route {
    method: MethodFilter,
    pattern: PathPattern,
    target: Arc<dyn Stage>,
}

impl Route {
    pub fn new(method: MethodFilter, pattern: &str, target: Arc<dyn Stage>) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
            target,
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method) && self.pattern.matches(path)
    }
}

/// Ordered list of route entries evaluated by first structural match.
///
/// Once an entry matches, its outcome is the table's outcome: if the target
/// declines, the whole table declines and no later entry is tried.
pub struct RouteTable {
    name: String,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, method: MethodFilter, pattern: &str, target: Arc<dyn Stage>) -> Self {
        self.routes.push(Route::new(method, pattern, target));
        self
    }

    /// Entry matching any method
    pub fn all(self, pattern: &str, target: Arc<dyn Stage>) -> Self {
        self.route(MethodFilter::Any, pattern, target)
    }

    pub fn get(self, pattern: &str, target: Arc<dyn Stage>) -> Self {
        self.route(MethodFilter::Only(Method::GET), pattern, target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[async_trait(?Send)]
impl Stage for RouteTable {
    async fn handle(&self, inbound: Inbound) -> Result<Dispatch, Error> {
        let matched = self
            .routes
            .iter()
            .find(|route| route.matches(inbound.method(), inbound.path()));

        match matched {
            Some(route) => {
                tracing::debug!(
                    "{} table: {} {} matched {}",
                    self.name, inbound.method(), inbound.path(), route.pattern
                );
                route.target.handle(inbound).await
            },
            None => {
                tracing::trace!("{} table: no entry for {} {}", self.name, inbound.method(), inbound.path());
                Ok(Dispatch::Unclaimed(inbound))
            }
        }
    }
}

/// Collect a request body, refusing anything larger than `limit` bytes
pub async fn read_body(mut payload: Payload, limit: usize) -> Result<Bytes, PayloadError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(PayloadError::Overflow);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, test::TestRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with a fixed body and counts calls
    struct Reply {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl Reply {
        fn new(body: &'static str) -> Arc<Self> {
            Arc::new(Self { body, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait(?Send)]
    impl Stage for Reply {
        async fn handle(&self, _inbound: Inbound) -> Result<Dispatch, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Dispatch::Handled(HttpResponse::Ok().body(self.body)))
        }
    }

    struct Decline;

    #[async_trait(?Send)]
    impl Stage for Decline {
        async fn handle(&self, inbound: Inbound) -> Result<Dispatch, Error> {
            Ok(Dispatch::Unclaimed(inbound))
        }
    }

    fn inbound(method: Method, uri: &str) -> Inbound {
        let (req, payload) = TestRequest::default().method(method).uri(uri).to_http_parts();
        Inbound::new(req, payload)
    }

    async fn body_of(dispatch: Dispatch) -> String {
        match dispatch {
            Dispatch::Handled(resp) => {
                let bytes = to_bytes(resp.into_body()).await.unwrap();
                String::from_utf8(bytes.to_vec()).unwrap()
            },
            Dispatch::Unclaimed(inbound) => panic!("{} was not claimed", inbound.path()),
        }
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!(PathPattern::parse("*"), PathPattern::Any);
        assert_eq!(PathPattern::parse("/trpc/*"), PathPattern::Prefix("/trpc".into()));
        assert_eq!(PathPattern::parse("/api/ws"), PathPattern::Exact("/api/ws".into()));
        assert_eq!(PathPattern::parse("/api/team/*").to_string(), "/api/team/*");
    }

    #[test]
    fn test_prefix_matching() {
        let pattern = PathPattern::parse("/api/team/*");
        assert!(pattern.matches("/api/team"));
        assert!(pattern.matches("/api/team/"));
        assert!(pattern.matches("/api/team/4/shops/9"));
        assert!(!pattern.matches("/api/teams"));
        assert!(!pattern.matches("/api"));
        assert!(!pattern.matches("/other/api/team/1"));
    }

    #[test]
    fn test_exact_and_any_matching() {
        let exact = PathPattern::parse("/api/ws");
        assert!(exact.matches("/api/ws"));
        assert!(!exact.matches("/api/ws/"));
        assert!(!exact.matches("/api/wss"));

        let any = PathPattern::parse("*");
        assert!(any.matches("/"));
        assert!(any.matches("/anything/at/all"));
    }

    #[test]
    fn test_method_filter() {
        assert!(MethodFilter::Any.matches(&Method::DELETE));
        assert!(MethodFilter::Only(Method::GET).matches(&Method::GET));
        assert!(!MethodFilter::Only(Method::GET).matches(&Method::POST));
    }

    #[test]
    fn test_table_builder() {
        let table = RouteTable::new("team");
        assert!(table.is_empty());
        assert_eq!(table.name(), "team");

        let table = table.get("/api/team/list", Reply::new("list")).all("/api/team/*", Reply::new("rest"));
        assert!(!table.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[actix_web::test]
    async fn test_first_match_wins() {
        let first = Reply::new("first");
        let second = Reply::new("second");
        let table = RouteTable::new("test")
            .all("/api/*", first.clone())
            .all("/api/team/*", second.clone());

        let dispatch = table.handle(inbound(Method::GET, "/api/team/1")).await.unwrap();
        assert_eq!(body_of(dispatch).await, "first");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_method_mismatch_skips_entry() {
        let get_only = Reply::new("get");
        let fallback = Reply::new("fallback");
        let table = RouteTable::new("test")
            .get("/api/ws", get_only.clone())
            .all("*", fallback.clone());

        let dispatch = table.handle(inbound(Method::POST, "/api/ws")).await.unwrap();
        assert_eq!(body_of(dispatch).await, "fallback");
        assert_eq!(get_only.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_no_match_hands_request_back() {
        let table = RouteTable::new("test").get("/api/ws", Reply::new("ws"));

        match table.handle(inbound(Method::PUT, "/api/shop/3?x=1")).await.unwrap() {
            Dispatch::Unclaimed(rest) => {
                assert_eq!(rest.method(), &Method::PUT);
                assert_eq!(rest.path(), "/api/shop/3");
                assert_eq!(rest.req.query_string(), "x=1");
            },
            Dispatch::Handled(_) => panic!("request should be unclaimed"),
        }
    }

    #[actix_web::test]
    async fn test_declining_target_ends_table() {
        let later = Reply::new("later");
        let table = RouteTable::new("test")
            .all("/api/team/*", Arc::new(Decline))
            .all("*", later.clone());

        let dispatch = table.handle(inbound(Method::GET, "/api/team/1")).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Unclaimed(_)));
        assert_eq!(later.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_read_body_limit() {
        let (_, payload) = TestRequest::default().set_payload("0123456789").to_http_parts();
        assert_eq!(read_body(payload, 64).await.unwrap(), Bytes::from_static(b"0123456789"));

        let (_, payload) = TestRequest::default().set_payload("0123456789").to_http_parts();
        assert!(matches!(read_body(payload, 4).await, Err(PayloadError::Overflow)));
    }
}
