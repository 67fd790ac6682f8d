// gateway/src/middleware/observe.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, StatusCode},
    Error,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};

/// What the observability hook learns about one request
#[derive(Debug, Clone)]
pub struct Outcome {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// Sink for request outcomes (error tracking, telemetry)
pub trait Reporter: Send + Sync {
    /// Called once per request, whatever the result
    fn request_completed(&self, outcome: &Outcome);

    /// Called before `request_completed` when the request failed
    fn request_failed(&self, outcome: &Outcome, error: &str);
}

/// Reports through `tracing`, tagged with the running release
pub struct TracingReporter {
    release: String,
}

impl TracingReporter {
    pub fn new(release: impl Into<String>) -> Self {
        Self { release: release.into() }
    }
}

impl Reporter for TracingReporter {
    fn request_completed(&self, outcome: &Outcome) {
        tracing::info!(
            "[{}] {} {} -> {} in {:?}",
            self.release, outcome.method, outcome.path, outcome.status.as_u16(), outcome.elapsed
        );
    }

    fn request_failed(&self, outcome: &Outcome, error: &str) {
        tracing::error!(
            "[{}] {} {} failed with {}: {}",
            self.release, outcome.method, outcome.path, outcome.status.as_u16(), error
        );
    }
}

/// Wraps the whole dispatch and reports every outcome without changing it
#[derive(Clone)]
pub struct Observe {
    reporter: Arc<dyn Reporter>,
}

impl Observe {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Observe
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ObserveMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ObserveMiddleware {
            service,
            reporter: self.reporter.clone(),
        }))
    }
}

pub struct ObserveMiddleware<S> {
    service: S,
    reporter: Arc<dyn Reporter>,
}

impl<S, B> Service<ServiceRequest> for ObserveMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_string();
        let started = Instant::now();
        let reporter = self.reporter.clone();

        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;

            let (status, failure) = match &result {
                Ok(res) => {
                    // Handler errors arrive already rendered, with the error attached
                    let failure = match res.response().error() {
                        Some(err) => Some(err.to_string()),
                        None if res.status().is_server_error() => Some("server error".to_string()),
                        None => None,
                    };
                    (res.status(), failure)
                },
                Err(err) => (err.as_response_error().status_code(), Some(err.to_string())),
            };

            let outcome = Outcome {
                method,
                path,
                status,
                elapsed: started.elapsed(),
            };

            if let Some(error) = failure {
                reporter.request_failed(&outcome, &error);
            }
            reporter.request_completed(&outcome);

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        completed: Mutex<Vec<u16>>,
        failed: Mutex<Vec<String>>,
    }

    impl Reporter for Recorder {
        fn request_completed(&self, outcome: &Outcome) {
            self.completed.lock().unwrap().push(outcome.status.as_u16());
        }

        fn request_failed(&self, _outcome: &Outcome, error: &str) {
            self.failed.lock().unwrap().push(error.to_string());
        }
    }

    #[actix_web::test]
    async fn test_reports_success_and_failure() {
        let recorder = Arc::new(Recorder::default());
        let app = test::init_service(
            App::new()
                .wrap(Observe::new(recorder.clone()))
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route("/missing", web::get().to(|| async { HttpResponse::NotFound().finish() }))
                .route("/fault", web::get().to(|| async {
                    Err::<HttpResponse, Error>(actix_web::error::ErrorBadGateway("upstream reset"))
                })),
        )
        .await;

        for uri in ["/ok", "/missing", "/fault"] {
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        }

        assert_eq!(*recorder.completed.lock().unwrap(), vec![200, 404, 502]);
        assert_eq!(*recorder.failed.lock().unwrap(), vec!["upstream reset".to_string()]);
    }

    #[actix_web::test]
    async fn test_does_not_alter_response() {
        let recorder = Arc::new(Recorder::default());
        let app = test::init_service(
            App::new()
                .wrap(Observe::new(recorder))
                .route("/teapot", web::get().to(|| async { HttpResponse::ImATeapot().body("short and stout") })),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/teapot").to_request()).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(test::read_body(resp).await, "short and stout");
    }
}
