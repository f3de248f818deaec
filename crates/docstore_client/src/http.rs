//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the transaction client.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, ureq, etc.).

use crate::config::{ClientConfig, RetryConfig};
use crate::transport::{CallContext, Transport};
use docstore_protocol::{
    decode_reply, encode, BatchGetDocumentsRequest, BatchGetDocumentsResponse,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse, RpcCode,
    RpcError, RpcMethod, RpcResult, RollbackRequest, RunQueryRequest, RunQueryResponse,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Header carrying the request tag.
pub const REQUEST_TAG_HEADER: &str = "x-docstore-request-tag";

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    ///
    /// An `Err` means no response body was obtained (connection failure,
    /// timeout); server-side failures travel inside the body.
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, String>;
}

/// HTTP-based transaction transport.
///
/// Uses CBOR encoding for request/response bodies. Calls marked idempotent
/// are re-sent on transient status codes according to `retry`.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the server (e.g., "https://docs.example.com").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Retry policy for idempotent calls.
    retry: RetryConfig,
    /// Per-request timeout.
    timeout: Duration,
    /// Connection state.
    open: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            retry: RetryConfig::new(3),
            timeout: Duration::from_secs(60),
            open: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Creates a transport from a client configuration: base URL, RPC retry
    /// policy and timeout.
    pub fn from_config(config: &ClientConfig, client: C) -> Self {
        Self::new(config.base_url.clone(), client)
            .with_retry(config.rpc_retry.clone())
            .with_timeout(config.timeout)
    }

    /// Sets the retry policy for idempotent calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Closes the transport; further calls fail with `CANCELLED`.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn call<Req, Res>(
        &self,
        method: RpcMethod,
        database: &str,
        request: &Req,
        context: &CallContext,
    ) -> RpcResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        if !self.is_open() {
            return Err(RpcError::new(RpcCode::Cancelled, "transport is closed"));
        }

        let body = encode(request)
            .map_err(|e| RpcError::internal(format!("failed to encode request: {e}")))?;
        let url = format!(
            "{}/v1/{}/documents:{}",
            self.base_url,
            database,
            method.as_str()
        );

        let max_attempts = if context.idempotent {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            match self.post_once(&url, body.clone(), context) {
                Err(e) if e.code.is_transient() && attempt + 1 < max_attempts => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        method = method.as_str(),
                        request_tag = %context.request_tag,
                        attempt,
                        ?delay,
                        error = %e,
                        "retrying idempotent call"
                    );
                    std::thread::sleep(delay);
                }
                result => return result,
            }
        }
    }

    fn post_once<Res: DeserializeOwned>(
        &self,
        url: &str,
        body: Vec<u8>,
        context: &CallContext,
    ) -> RpcResult<Res> {
        let headers = [(REQUEST_TAG_HEADER, context.request_tag.as_str())];
        let response_body = self
            .client
            .post(url, &headers, body, self.timeout)
            .map_err(|e| {
                self.set_error(&e);
                RpcError::unavailable(e)
            })?;

        self.clear_error();

        decode_reply::<Res>(&response_body)
            .map_err(|e| RpcError::internal(format!("failed to decode response: {e}")))?
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
        context: &CallContext,
    ) -> RpcResult<BeginTransactionResponse> {
        self.call(
            RpcMethod::BeginTransaction,
            &request.database,
            request,
            context,
        )
    }

    fn commit(&self, request: &CommitRequest, context: &CallContext) -> RpcResult<CommitResponse> {
        self.call(RpcMethod::Commit, &request.database, request, context)
    }

    fn rollback(&self, request: &RollbackRequest, context: &CallContext) -> RpcResult<()> {
        self.call(RpcMethod::Rollback, &request.database, request, context)
    }

    fn batch_get_documents(
        &self,
        request: &BatchGetDocumentsRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>> {
        self.call(
            RpcMethod::BatchGetDocuments,
            &request.database,
            request,
            context,
        )
    }

    fn run_query(
        &self,
        request: &RunQueryRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<RunQueryResponse>> {
        self.call(RpcMethod::RunQuery, &request.database, request, context)
    }
}

/// A loopback HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request to `path` and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

impl<F> LoopbackServer for F
where
    F: Fn(&str, &[u8]) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        self(path, body)
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, String> {
        // Extract path from URL
        let path = url.find("/v1/").map(|i| &url[i..]).unwrap_or(url);

        self.server.handle_post(path, &body)
    }
}
