use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::Error;
use log::{info, log, Level};
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::logger::{level_colour, RESET};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// The caller's request id when it is usable, a fresh uuid otherwise.
pub fn request_id(incoming: Option<&HeaderValue>) -> String {
    incoming
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn completion_level(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::Error
    } else if status.is_client_error() {
        Level::Warn
    } else {
        Level::Info
    }
}

fn log_completion(request_id: &str, status: StatusCode, method: &Method, path: &str, elapsed: Duration) {
    let level = completion_level(status);
    log!(
        level,
        "← [{}] {}{}{} {} {} in {:.2?}",
        request_id,
        level_colour(level),
        status,
        RESET,
        method,
        path,
        elapsed
    );
}

// Logs every request and response and tags both with an X-Request-Id
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + 'static>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .map(|s| s.to_owned())
            .unwrap_or_else(|| String::from("unknown"));
        let request_id = request_id(req.headers().get(REQUEST_ID_HEADER));

        info!("→ [{}] \x1B[1;34m{} {}{} from {}", request_id, method, path, RESET, client_ip);

        let service = self.service.clone();

        Box::pin(async move {
            let start = Instant::now();
            let mut res = service.call(req).await?;
            let elapsed = start.elapsed();

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            log_completion(&request_id, res.status(), &method, &path, elapsed);
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_request_id_is_echoed() {
        let value = HeaderValue::from_static("abc-123");
        assert_eq!(request_id(Some(&value)), "abc-123");
    }

    #[test]
    fn missing_or_blank_request_id_gets_a_uuid() {
        assert!(Uuid::parse_str(&request_id(None)).is_ok());
        let blank = HeaderValue::from_static("   ");
        assert!(Uuid::parse_str(&request_id(Some(&blank))).is_ok());
    }

    #[test]
    fn oversized_request_id_is_replaced() {
        let long = HeaderValue::from_str(&"x".repeat(MAX_REQUEST_ID_LEN + 1)).unwrap();
        assert!(Uuid::parse_str(&request_id(Some(&long))).is_ok());
    }

    #[test]
    fn failures_log_louder_than_successes() {
        assert_eq!(completion_level(StatusCode::OK), Level::Info);
        assert_eq!(completion_level(StatusCode::NOT_FOUND), Level::Warn);
        assert_eq!(completion_level(StatusCode::SERVICE_UNAVAILABLE), Level::Error);
    }
}
