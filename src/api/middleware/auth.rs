use crate::config::AppConfig;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse, ResponseError,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};
use thiserror::Error;
use tracing::warn;

/// 401 with the Basic challenge header. Everything that is not an exact
/// credential match ends up here: missing header, bad base64, wrong pair.
#[derive(Debug, Error)]
#[error("Authentication required.")]
pub struct AuthChallenge;

impl ResponseError for AuthChallenge {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized()
            .insert_header((header::WWW_AUTHENTICATE, r#"Basic realm="Local AI""#))
            .body("Authentication required.")
    }
}

/// HTTP Basic auth against the single configured principal. Wraps the whole
/// app, so unauthenticated callers reach no handler: no subprocess spawn, no
/// transcript write, no wallet decryption.
pub struct BasicAuth;

impl<S, B> Transform<S, ServiceRequest> for BasicAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = BasicAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BasicAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct BasicAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BasicAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        let config = match req.app_data::<actix_web::web::Data<AppConfig>>() {
            Some(c) => c,
            None => {
                warn!("AppConfig missing in app_data");
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError("Configuration error"))
                });
            }
        };

        let valid = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(decode_basic)
            .map(|(login, password)| {
                login == config.auth.user && password == config.auth.password
            })
            .unwrap_or(false);

        if !valid {
            let (req, _payload) = req.into_parts();
            let res = AuthChallenge.error_response().map_into_right_body();
            return Box::pin(async move { Ok(ServiceResponse::new(req, res)) });
        }

        Box::pin(async move {
            let res = srv.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Decode `Basic <base64(login:password)>`; None for anything malformed.
fn decode_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (login, password) = text.split_once(':')?;
    Some((login.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_well_formed_header() {
        // base64("loop:6677788")
        let header = format!("Basic {}", BASE64.encode("loop:6677788"));
        assert_eq!(
            decode_basic(&header),
            Some(("loop".to_string(), "6677788".to_string()))
        );
    }

    #[test]
    fn password_may_contain_colons() {
        let header = format!("Basic {}", BASE64.encode("loop:a:b:c"));
        assert_eq!(
            decode_basic(&header),
            Some(("loop".to_string(), "a:b:c".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(decode_basic("Bearer abc"), None);
        assert_eq!(decode_basic("Basic !!!not-base64!!!"), None);
        let no_colon = format!("Basic {}", BASE64.encode("loop6677788"));
        assert_eq!(decode_basic(&no_colon), None);
    }
}
