use futures_util::future::BoxFuture;
use hrpc_core::http::{ExecuteError, HttpRequest, RawResponse, RequestExecutor};
use hrpc_core::http_types::StatusCode;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&HttpRequest) -> RawResponse + Send + Sync>;

// An in-process executor that records every request and answers with a canned response.
pub struct RecordingExecutor {
    requests: Mutex<Vec<HttpRequest>>,
    responder: Responder,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn new(responder: impl Fn(&HttpRequest) -> RawResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    pub fn json(status: StatusCode, body: serde_json::Value) -> Arc<Self> {
        Self::new(move |_| RawResponse::new(status, body.to_string()))
    }

    pub fn text(status: StatusCode, body: &'static str) -> Arc<Self> {
        Self::new(move |_| RawResponse::new(status, body))
    }

    /// Answers with the request URL as a JSON string.
    pub fn echo_url() -> Arc<Self> {
        Self::new(|request| {
            RawResponse::new(
                StatusCode::OK,
                serde_json::Value::String(request.url.to_string()).to_string(),
            )
        })
    }

    /// Answers with the request body, or `null`.
    pub fn echo_body(status: StatusCode) -> Arc<Self> {
        Self::new(move |request| {
            let body = request.body.clone().unwrap_or_else(|| "null".into());
            RawResponse::new(status, body)
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.to_string()).collect()
    }
}

impl RequestExecutor for RecordingExecutor {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<RawResponse, ExecuteError>> {
        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);

        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(response)
        })
    }
}
