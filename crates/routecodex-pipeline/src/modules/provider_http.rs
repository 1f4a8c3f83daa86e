use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use routecodex_common::{ErrorSeries, RouteCodexError};
use serde_json::Value;

use crate::dto::ClientRequest;
use crate::errors::ModuleError;
use crate::module::{
    HttpMethod, ModuleContext, PipelineModule, StageOutcome, UpstreamHttpRequest, UpstreamHttpResponse,
};

const MAX_ERROR_SNIPPET_BYTES: usize = 2 * 1024;

/// C4's `ProviderHTTP` slot (§4.4 item 4): the only module that performs
/// network I/O. Input is the request `Provider` already shaped and
/// stamped; output is either a buffered JSON response or a streaming byte
/// source handed straight to the gateway.
pub struct HttpProviderHttp {
    ctx: OnceLock<ModuleContext>,
}

impl Default for HttpProviderHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProviderHttp {
    pub fn new() -> Self {
        Self { ctx: OnceLock::new() }
    }

    fn ctx(&self) -> Result<&ModuleContext, ModuleError> {
        self.ctx.get().ok_or_else(|| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "providerHttp module not initialized")
        })
    }
}

#[async_trait]
impl PipelineModule for HttpProviderHttp {
    fn slot_name(&self) -> &'static str {
        "providerHttp"
    }

    async fn initialize(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.ctx
            .set(ctx.clone())
            .map_err(|_| RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "providerHttp module double-initialized"))
    }

    async fn process_incoming(&self, dto: ClientRequest) -> Result<StageOutcome, ModuleError> {
        let ctx = self.ctx()?;
        let target = dto.upstream_target.clone().ok_or_else(|| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "providerHttp saw no upstream_target")
        })?;

        let body = serde_json::to_vec(&dto.data).map_err(|err| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", format!("request body not serializable: {err}"))
        })?;

        let request = UpstreamHttpRequest {
            method: HttpMethod::Post,
            url: target.endpoint.clone(),
            headers: target.headers.clone(),
            body: Bytes::from(body),
            want_stream: dto.metadata.stream,
            connect_timeout_ms: target.connect_timeout_ms,
            headers_timeout_ms: target.headers_timeout_ms,
            stream_idle_timeout_ms: target.stream_idle_timeout_ms,
        };

        let response = ctx.http_client.send(request).await.map_err(|mut err| {
            err.provider_key = err
                .provider_key
                .or_else(|| Some(dto.route.provider_id.clone().into()));
            err
        })?;

        match response {
            UpstreamHttpResponse::Buffered { status, body } => {
                if status >= 400 {
                    return Err(classify_http_error(status, &body, &dto.route.provider_id));
                }
                let parsed: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&body).into_owned())
                });
                let mut dto = dto;
                dto.data = parsed;
                Ok(StageOutcome::UpstreamBuffered(dto))
            }
            UpstreamHttpResponse::Streaming { status, body } => {
                if status >= 400 {
                    // Headers-only rejection on a streaming call; no body bytes to
                    // inspect yet, so the classification is status-driven only.
                    return Err(RouteCodexError::new(
                        classify_status_series(status),
                        "HTTP_ERROR",
                        format!("upstream returned {status}"),
                    )
                    .with_http_status(status)
                    .with_provider_key(dto.route.provider_id.clone().into()));
                }
                let mut head = dto;
                head.data = Value::Null;
                Ok(StageOutcome::UpstreamStream(head, body))
            }
        }
    }

    async fn process_outgoing(&self, dto: ClientRequest) -> Result<ClientRequest, ModuleError> {
        Ok(dto)
    }
}

fn classify_status_series(status: u16) -> ErrorSeries {
    if status == 429 {
        ErrorSeries::E429
    } else if (500..600).contains(&status) {
        ErrorSeries::E5xx
    } else if status == 401 || status == 403 {
        ErrorSeries::Efatal
    } else {
        ErrorSeries::Eother
    }
}

fn classify_http_error(status: u16, body: &Bytes, provider_id: &str) -> RouteCodexError {
    let snippet_len = body.len().min(MAX_ERROR_SNIPPET_BYTES);
    let snippet = String::from_utf8_lossy(&body[..snippet_len]).into_owned();
    let code = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("code").or_else(|| e.get("type")))
                .and_then(|c| c.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP_{status}"));

    RouteCodexError::new(classify_status_series(status), code, format!("upstream http {status}"))
        .with_http_status(status)
        .with_provider_key(provider_id.into())
        .with_detail("snippet", snippet)
}
