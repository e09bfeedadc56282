//! # Reqwest Executor
//!
//! The default [`RequestExecutor`], registered under [`crate::config::DEFAULT_EXECUTOR`].
//!
//! The connect and read timeouts of the [`ClientConfig`] are applied as is. The whole exchange is
//! bounded by the sum of the connect, write and read timeouts.
use super::executor::{ExecuteError, HttpRequest, RawResponse, RequestExecutor};
use crate::config::ClientConfig;
use futures_util::{FutureExt, future::BoxFuture};
use http::{HeaderValue, Uri, header::CONTENT_TYPE};

#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.total_timeout())
            .build()?;

        Ok(Self { client })
    }

    /// Uses an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: HttpRequest) -> Result<RawResponse, ExecuteError> {
        let HttpRequest {
            verb,
            url,
            mut headers,
            body,
        } = request;

        let mut builder = self.client.request(verb, url.to_string());

        if let Some(body) = body {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            builder = builder.body(body);
        }

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ExecuteError::Body {
                url: url.clone(),
                source: e.into(),
            })?;

        Ok(RawResponse { status, body })
    }
}

impl RequestExecutor for ReqwestExecutor {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<RawResponse, ExecuteError>> {
        self.send(request).boxed()
    }
}

fn classify(url: &Uri, error: reqwest::Error) -> ExecuteError {
    let url = url.clone();
    if error.is_timeout() {
        ExecuteError::Timeout { url }
    } else if error.is_connect() {
        ExecuteError::Connect {
            url,
            source: error.into(),
        }
    } else {
        ExecuteError::Transport {
            url,
            source: error.into(),
        }
    }
}
