//! The concrete [`Origin`] implementation the core's resolver forwards
//! through: a shared `reqwest::Client`, GETting (or otherwise requesting)
//! the URL the caller already rewrote.
//!
//! The rewrite hook itself — host from the client's `Host` header, scheme
//! defaulted to `https`, path and query preserved — lives in [`crate::app`],
//! where the incoming request is translated into an [`OriginRequest`]. This
//! module only knows how to issue that already-rewritten request.

use async_trait::async_trait;
use proxycache::resolver::{Origin, OriginRequest, OriginResponse};
use proxycache_types::{HeaderEntries, ProxyError, Result};

/// Forwards requests to the origin named by each request's rewritten URL,
/// over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestOrigin {
    client: reqwest::Client,
}

impl ReqwestOrigin {
    /// Wraps an already-configured `reqwest::Client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Origin for ReqwestOrigin {
    async fn forward(&self, req: &OriginRequest) -> Result<OriginResponse> {
        let response = self
            .client
            .request(req.method.clone(), &req.url)
            .send()
            .await
            .map_err(|e| ProxyError::General(anyhow::anyhow!(e)))?;

        let status = response.status();
        let cache_control = response
            .headers()
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let headers = HeaderEntries::from_header_map(response.headers());
        let body =
            response.bytes().await.map_err(|e| ProxyError::General(anyhow::anyhow!(e)))?;

        Ok(OriginResponse { status, cache_control, headers, body })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http::Method;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn forwards_and_captures_cacheable_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "immutable")
                    .set_body_string("hello"),
            )
            .mount(&server)
            .await;

        let origin = ReqwestOrigin::new(reqwest::Client::new());
        let req = OriginRequest {
            method: Method::GET,
            host: "x.example".to_string(),
            url: format!("{}/a", server.uri()),
            cache_control: String::new(),
        };

        let rsp = origin.forward(&req).await.unwrap();
        assert_eq!(rsp.status, http::StatusCode::OK);
        assert_eq!(rsp.cache_control, "immutable");
        assert_eq!(rsp.body, bytes::Bytes::from_static(b"hello"));
    }
}
