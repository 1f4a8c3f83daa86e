use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use routecodex_common::{ErrorSeries, RouteCodexError};
use routecodex_pipeline::{
    ByteStream, HttpMethod, UpstreamHttpClient, UpstreamHttpRequest, UpstreamHttpResponse,
};
use tokio::sync::Mutex;

/// The sole concrete [`UpstreamHttpClient`]: one `reqwest::Client` per
/// distinct outbound proxy, cached the way the reference proxy's
/// `WreqUpstreamClient` keys its client cache by normalized proxy string
/// (SPEC_FULL §5). `reqwest` substitutes the reference's `wreq` fork, which
/// exists there for TLS fingerprint evasion this gateway has no use for.
pub struct ReqwestUpstreamClient {
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl Default for ReqwestUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestUpstreamClient {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client_for(&self, request: &UpstreamHttpRequest, proxy: Option<&str>) -> Result<reqwest::Client, RouteCodexError> {
        let key = proxy.map(str::to_string);
        let mut guard = self.clients.lock().await;
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(request.connect_timeout_ms))
            .timeout(Duration::from_millis(request.headers_timeout_ms.max(request.connect_timeout_ms)));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", err.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", err.to_string()))?;
        guard.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl UpstreamHttpClient for ReqwestUpstreamClient {
    async fn send(&self, request: UpstreamHttpRequest) -> Result<UpstreamHttpResponse, RouteCodexError> {
        let client = self.client_for(&request, None).await?;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = client.request(method, &request.url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|err| classify_reqwest_error(&err))?;
        let status = response.status().as_u16();

        if !request.want_stream || !(200..300).contains(&status) {
            let body = response.bytes().await.map_err(|err| classify_reqwest_error(&err))?;
            return Ok(UpstreamHttpResponse::Buffered { status, body });
        }

        let idle_timeout = Duration::from_millis(request.stream_idle_timeout_ms);
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            let mut upstream = response.bytes_stream();
            loop {
                let next = tokio::time::timeout(idle_timeout, upstream.next()).await;
                let item = match next {
                    Ok(item) => item,
                    Err(_) => {
                        let _ = tx
                            .send(Err(RouteCodexError::new(
                                ErrorSeries::Enet,
                                "UPSTREAM_STREAM_IDLE_TIMEOUT",
                                "upstream stream idle timeout",
                            )))
                            .await;
                        break;
                    }
                };
                match item {
                    Some(Ok(chunk)) => {
                        if tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        let _ = tx.send(Err(classify_reqwest_error(&err))).await;
                        break;
                    }
                    None => break,
                }
            }
        });

        let stream: ByteStream = Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
        Ok(UpstreamHttpResponse::Streaming { status, body: stream })
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> RouteCodexError {
    if err.is_timeout() {
        return network_error("UPSTREAM_HEADERS_TIMEOUT", &err.to_string());
    }
    if err.is_connect() {
        return network_error("ECONNREFUSED", &err.to_string());
    }
    network_error("ECONNRESET", &err.to_string())
}

fn network_error(code: &str, message: &str) -> RouteCodexError {
    RouteCodexError::new(ErrorSeries::Enet, code, message)
}
