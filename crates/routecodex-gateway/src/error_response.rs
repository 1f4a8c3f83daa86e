use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use routecodex_common::{ErrorSeries, RouteCodexError};
use routecodex_router::{FailoverError, RouterError};
use serde::Serialize;

/// The surface-visible error kinds of §7, in the order they're checked.
/// Only used to pick a status code / `Retry-After`; the wire body is always
/// the flat envelope from [`ErrorBody`].
#[derive(Debug, Clone, Copy)]
enum ErrorKind {
    RouteUnavailable,
    UpstreamRateLimited,
    UpstreamUnavailable,
    BadRequest,
    AuthFailure,
    ConfigError,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempt: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<i64>,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::RouteUnavailable => "RouteUnavailable",
            Self::UpstreamRateLimited => "UpstreamRateLimited",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::BadRequest => "BadRequest",
            Self::AuthFailure => "AuthFailure",
            Self::ConfigError => "ConfigError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::RouteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::AuthFailure => StatusCode::UNAUTHORIZED,
            Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders a [`FailoverError`] as the flat error envelope of §6/§7. `router`
/// routing failures never reach here as `FailoverError` (the gateway checks
/// `RouterError` separately, see [`route_unavailable_response`]), so this
/// only classifies `Exhausted`/`Fatal`.
pub fn failover_error_response(err: FailoverError) -> Response {
    match err {
        FailoverError::Exhausted(last) => match last {
            Some(error) => exhausted_response(&error),
            None => kind_response(ErrorKind::RouteUnavailable, "ROUTE_UNAVAILABLE", "no eligible provider", None, None, None),
        },
        FailoverError::Fatal(error) => fatal_response(&error),
    }
}

pub fn route_unavailable_response(_err: RouterError) -> Response {
    kind_response(
        ErrorKind::RouteUnavailable,
        "ROUTE_UNAVAILABLE",
        "no eligible provider for the requested route",
        None,
        None,
        None,
    )
}

pub fn bad_request_response(message: &str) -> Response {
    kind_response(ErrorKind::BadRequest, "BAD_REQUEST", message, None, None, None)
}

fn exhausted_response(error: &RouteCodexError) -> Response {
    let provider_id = error.provider_key.as_ref().map(|k| k.to_string());
    match error.series {
        ErrorSeries::E429 => kind_response(
            ErrorKind::UpstreamRateLimited,
            &error.code,
            &error.message,
            provider_id,
            None,
            error.details.get("retryAfterMs").and_then(|v| v.parse().ok()),
        ),
        ErrorSeries::E5xx | ErrorSeries::Enet | ErrorSeries::Eother => kind_response(
            ErrorKind::UpstreamUnavailable,
            &error.code,
            &error.message,
            provider_id,
            None,
            None,
        ),
        ErrorSeries::Efatal => fatal_response(error),
    }
}

fn fatal_response(error: &RouteCodexError) -> Response {
    let provider_id = error.provider_key.as_ref().map(|k| k.to_string());
    if matches!(error.code.as_str(), "AUTH" | "MISSING_CREDENTIAL") {
        kind_response(ErrorKind::AuthFailure, &error.code, &error.message, provider_id, None, None)
    } else {
        kind_response(ErrorKind::ConfigError, &error.code, &error.message, provider_id, None, None)
    }
}

fn kind_response(
    kind: ErrorKind,
    code: &str,
    message: &str,
    provider_id: Option<String>,
    attempt: Option<usize>,
    retry_after_ms: Option<i64>,
) -> Response {
    let status = kind.status();
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: kind.as_str(),
            code,
            message,
            provider_id,
            attempt,
            retry_after_ms,
        },
    };

    let mut response = (status, Json(body)).into_response();
    if let (StatusCode::TOO_MANY_REQUESTS, Some(ms)) = (status, retry_after_ms) {
        let seconds = ((ms.max(0) as u64) + 999) / 1000;
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
