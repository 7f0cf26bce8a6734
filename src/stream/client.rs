//! Stream client: session creation, the control channel, and the receive loop.
//!
//! The client opens a long-lived `create_session` response, parses the session
//! header, then hands the rest of the body to a background task that
//! classifies every line. `LOOP` makes the same task rebind a fresh stream to
//! the session; every other terminal token (or a dropped connection) clears the
//! session and its tables.
//!
//! Listeners run inline on the receive task. A listener that blocks stalls
//! delivery for the whole session; there is no internal queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::retry::{retry_async, with_timeout, RetryPolicy};
use crate::stream::lines::LineReader;
use crate::stream::proto::{
    control_response_line, non_empty_params, parse_update_line, ControlOp, SessionHeader,
    StreamLine, TableId, BIND_SESSION_PATH, CONTROL_PATH, CREATE_SESSION_PATH, OK_CMD,
};
use crate::stream::session::Session;
use crate::stream::subscription::Subscription;

/// Client identifier sent as `LS_cid` unless overridden.
pub const DEFAULT_CLIENT_ID: &str = "mgQkwtwdysogQz2BJ4Ji kOj2Bg";
const MAX_DIAGNOSTIC_LINES: usize = 64;
const DIAGNOSTIC_WINDOW: Duration = Duration::from_millis(500);
const ERROR_BODY_SNIPPET_LEN: usize = 220;

/// Default timeout values used by [`StreamClientOptions::default`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamDefaults;

impl StreamDefaults {
    /// TCP/TLS connect timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Budget for the status line and header block of a create/bind response.
    pub const SESSION_TIMEOUT: Duration = Duration::from_secs(10);
    /// Budget for one control request.
    pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
    /// Wait for the receive loop to finish on destroy/disconnect.
    pub const DESTROY_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Timeouts and protocol options for a [`StreamClient`].
#[derive(Clone, Debug)]
pub struct StreamClientOptions {
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout: Duration,
    /// Deadline for reading the header block of a create/bind response.
    pub session_timeout: Duration,
    /// Deadline for a whole control request.
    pub control_timeout: Duration,
    /// How long `destroy()`/`disconnect()` wait for the receive loop to end
    /// before cancelling it.
    pub destroy_timeout: Duration,
    /// Value sent as `LS_cid`.
    pub client_id: String,
    /// Retries applied to session creation on connect/timeout failures.
    pub retry_policy: RetryPolicy,
    /// Route requests through the proxies configured in the environment.
    pub use_system_proxy: bool,
}

impl Default for StreamClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: StreamDefaults::CONNECT_TIMEOUT,
            session_timeout: StreamDefaults::SESSION_TIMEOUT,
            control_timeout: StreamDefaults::CONTROL_TIMEOUT,
            destroy_timeout: StreamDefaults::DESTROY_TIMEOUT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            retry_policy: RetryPolicy::session_setup(),
            use_system_proxy: false,
        }
    }
}

/// Lifecycle of the stream connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Session header parsed, receive loop not yet running.
    Bound,
    Receiving,
    /// `LOOP` received, a bind request is in flight.
    Rebinding,
    Terminated,
}

impl ConnectionState {
    fn is_live(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Bound | Self::Receiving | Self::Rebinding
        )
    }
}

/// Errors produced by stream transport and protocol handling.
#[derive(Debug, Error)]
pub enum StreamClientError {
    /// Network-level HTTP failure.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// Session create/bind response was rejected or malformed. Carries the
    /// server diagnostic text.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Control request answered with something other than `OK`.
    #[error("control request rejected: {0}")]
    ControlRejected(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no active session")]
    NotConnected,

    #[error("a stream connection is already active")]
    AlreadyConnected,

    /// The stream was closed locally while a read was pending.
    #[error("stream connection was cancelled")]
    Cancelled,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

impl StreamClientError {
    /// Whether a session creation attempt that failed this way may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect() || err.is_timeout(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Why one stream connection stopped being read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StreamOutcome {
    Rebind,
    ServerError,
    SyncError,
    Ended,
    Closed,
    Cancelled,
}

struct ReceiveWorker {
    handle: JoinHandle<()>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ReceiveWorker {
    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

struct ClientInner {
    http: Client,
    base_url: Url,
    adapter_set: String,
    user: String,
    password: SecretString,
    options: StreamClientOptions,
    session: Mutex<Session>,
    state: Mutex<ConnectionState>,
    worker: Mutex<Option<ReceiveWorker>>,
    bind_count: AtomicUsize,
}

/// Client for one logical streaming session at a time.
///
/// Dropping the client cancels its receive loop.
pub struct StreamClient {
    inner: Arc<ClientInner>,
}

impl StreamClient {
    /// Creates a client with default options. No request is made until
    /// [`connect`](Self::connect).
    pub fn new(
        base_url: &str,
        adapter_set: impl Into<String>,
        user: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, StreamClientError> {
        Self::with_options(
            base_url,
            adapter_set,
            user,
            password,
            StreamClientOptions::default(),
        )
    }

    /// Creates a client with explicit options.
    pub fn with_options(
        base_url: &str,
        adapter_set: impl Into<String>,
        user: impl Into<String>,
        password: SecretString,
        options: StreamClientOptions,
    ) -> Result<Self, StreamClientError> {
        let base_url = Url::parse(base_url.trim())?;
        let mut builder = Client::builder().connect_timeout(options.connect_timeout);
        if !options.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(StreamClientError::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                adapter_set: adapter_set.into(),
                user: user.into(),
                password,
                options,
                session: Mutex::new(Session::default()),
                state: Mutex::new(ConnectionState::Disconnected),
                worker: Mutex::new(None),
                bind_count: AtomicUsize::new(0),
            }),
        })
    }

    /// Creates a new session and starts the receive loop.
    ///
    /// Fails with [`StreamClientError::Protocol`] when the server answers with
    /// anything but `OK`; the error carries the server's diagnostic lines.
    pub async fn connect(&self) -> Result<(), StreamClientError> {
        self.inner.begin_connect()?;

        match self.inner.create_session().await {
            Ok(reader) => {
                self.inner.set_state(ConnectionState::Bound);
                self.spawn_receiver(reader);
                Ok(())
            }
            Err(err) => {
                self.inner.session().clear();
                self.inner.set_state(ConnectionState::Terminated);
                Err(err)
            }
        }
    }

    fn spawn_receiver(&self, reader: LineReader) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.set_state(ConnectionState::Receiving);
        let handle = tokio::spawn(inner.receive_loop(reader, cancel_rx));
        *self.inner.worker() = Some(ReceiveWorker {
            handle,
            cancel: Some(cancel_tx),
        });
    }

    /// Sends a control request with `LS_session` injected and returns the
    /// first line of the response.
    pub async fn control(
        &self,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, StreamClientError> {
        self.inner.control(params).await
    }

    /// Registers `subscription` under the next table id and asks the server to
    /// activate it.
    ///
    /// The table stays registered even when the server rejects it or the
    /// request fails; `success` reports the outcome and the caller may
    /// `unsubscribe` the id.
    pub async fn subscribe(
        &self,
        subscription: Arc<Subscription>,
    ) -> Result<(TableId, bool), StreamClientError> {
        let table_id = {
            let mut session = self.inner.session();
            if !session.is_active() {
                return Err(StreamClientError::NotConnected);
            }
            session.register(Arc::clone(&subscription))
        };

        let mut params = vec![
            ("LS_table", table_id.to_string()),
            ("LS_op", ControlOp::Add.as_str().to_string()),
            ("LS_mode", subscription.mode().to_string()),
            ("LS_schema", subscription.field_names().join(" ")),
            ("LS_id", subscription.item_names().join(" ")),
            (
                "LS_data_adapter",
                subscription.adapter().unwrap_or_default().to_string(),
            ),
        ];
        if let Some(snapshot) = subscription.snapshot() {
            params.push(("LS_snapshot", snapshot.to_string()));
        }

        let success = match self.inner.control(params).await {
            Ok(response) if response == OK_CMD => true,
            Ok(response) => {
                warn!(event = "subscribe_rejected", table_id, response = %response);
                false
            }
            Err(err) => {
                warn!(event = "subscribe_failed", table_id, error = %err);
                false
            }
        };
        debug!(
            event = "subscribe",
            table_id,
            items = %subscription.item_names().join(" "),
            success
        );
        Ok((table_id, success))
    }

    /// Deletes a table. The registration is removed only when the server
    /// answers `OK`; returns whether it was removed.
    pub async fn unsubscribe(&self, table_id: TableId) -> bool {
        let known = self.inner.session().contains(table_id);
        if !known {
            warn!(event = "unsubscribe_unknown_table", table_id);
            return false;
        }

        let params = vec![
            ("LS_table", table_id.to_string()),
            ("LS_op", ControlOp::Delete.as_str().to_string()),
        ];
        match self.inner.control(params).await {
            Ok(response) if response == OK_CMD => {
                self.inner.session().remove(table_id);
                debug!(event = "unsubscribed", table_id);
                true
            }
            Ok(response) => {
                warn!(event = "unsubscribe_rejected", table_id, response = %response);
                false
            }
            Err(err) => {
                warn!(event = "unsubscribe_failed", table_id, error = %err);
                false
            }
        }
    }

    /// Asks the server to close the session, then waits for the receive loop
    /// to observe the end of the stream.
    ///
    /// The wait is bounded by `destroy_timeout`; past it the loop is cancelled.
    pub async fn destroy(&self) -> Result<(), StreamClientError> {
        let active = self.inner.session().is_active();
        if !active {
            warn!(event = "destroy_without_session");
            return Ok(());
        }

        let params = vec![("LS_op", ControlOp::Destroy.as_str().to_string())];
        let response = self.inner.control(params).await?;
        if response != OK_CMD {
            warn!(event = "destroy_rejected", response = %response);
            return Err(StreamClientError::ControlRejected(response));
        }

        self.inner.join_worker().await;
        Ok(())
    }

    /// Closes the stream connection locally. A pending read is unblocked and
    /// the session is terminated without a rebind.
    pub async fn disconnect(&self) {
        let worker = self.inner.worker().take();
        match worker {
            Some(mut worker) if !worker.handle.is_finished() => {
                worker.cancel();
                self.inner.await_worker(worker).await;
                info!(event = "stream_disconnected");
            }
            _ => warn!(event = "disconnect_without_stream"),
        }
    }

    /// Current connection lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state()
    }

    /// Server-assigned session id, `None` without a live session.
    pub fn session_id(&self) -> Option<String> {
        self.inner.session().session_id().map(str::to_string)
    }

    /// Value of a raw session header parameter.
    pub fn session_param(&self, key: &str) -> Option<String> {
        self.inner.session().param(key).map(str::to_string)
    }

    /// Address used for control and bind requests.
    pub fn control_url(&self) -> Option<Url> {
        self.inner.session().control_url().cloned()
    }

    /// Address used for session creation.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Subscription registered under `table_id`.
    pub fn subscription(&self, table_id: TableId) -> Option<Arc<Subscription>> {
        self.inner.session().table(table_id)
    }

    /// Whether `table_id` is still registered.
    pub fn is_subscribed(&self, table_id: TableId) -> bool {
        self.inner.session().contains(table_id)
    }

    /// Registered table ids in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.inner.session().table_ids()
    }

    /// Number of successful rebinds since the client was created.
    pub fn bind_count(&self) -> usize {
        self.inner.bind_count.load(Ordering::SeqCst)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(mut worker) = self.inner.worker().take() {
            worker.cancel();
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("user", &self.inner.user)
            .field("state", &self.state())
            .finish()
    }
}

impl ClientInner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker(&self) -> MutexGuard<'_, Option<ReceiveWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state();
        if *state != next {
            debug!(event = "state_changed", from = ?*state, to = ?next);
            *state = next;
        }
    }

    fn begin_connect(&self) -> Result<(), StreamClientError> {
        let mut state = self.state();
        let worker_running = self
            .worker()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished());
        if state.is_live() || worker_running {
            return Err(StreamClientError::AlreadyConnected);
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    async fn create_session(&self) -> Result<LineReader, StreamClientError> {
        let url = self.base_url.join(CREATE_SESSION_PATH)?;
        let params = non_empty_params(vec![
            ("LS_op2", "create".to_string()),
            ("LS_cid", self.options.client_id.clone()),
            ("LS_adapter_set", self.adapter_set.clone()),
            ("LS_user", self.user.clone()),
            ("LS_password", self.password.expose_secret().to_string()),
        ]);

        let response = retry_async(
            &self.options.retry_policy,
            |attempt| {
                let url = url.clone();
                let params = params.clone();
                async move {
                    debug!(event = "create_session_attempt", attempt, url = %url);
                    self.open_stream(url, &params).await
                }
            },
            StreamClientError::is_retryable,
        )
        .await?;

        let mut reader = LineReader::from_response(response);
        let header = self.read_header(&mut reader).await?;
        let session_id = {
            let mut session = self.session();
            session.clear();
            session
                .apply_header(header, &self.base_url)
                .map_err(StreamClientError::Protocol)?;
            session.session_id().unwrap_or_default().to_string()
        };
        info!(event = "session_created", session_id = %session_id);
        Ok(reader)
    }

    /// Reattaches a fresh stream to the current session. Tables and values
    /// are left untouched.
    async fn bind_session(&self) -> Result<LineReader, StreamClientError> {
        let (control_url, session_id) = self.session_endpoint()?;
        let url = control_url.join(BIND_SESSION_PATH)?;
        let response = self
            .open_stream(url, &[("LS_session", session_id.clone())])
            .await?;

        let mut reader = LineReader::from_response(response);
        let header = self.read_header(&mut reader).await?;
        self.session()
            .apply_header(header, &self.base_url)
            .map_err(StreamClientError::Protocol)?;
        let binds = self.bind_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(event = "session_rebound", session_id = %session_id, binds);
        Ok(reader)
    }

    async fn open_stream(
        &self,
        url: Url,
        params: &[(&'static str, String)],
    ) -> Result<Response, StreamClientError> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(StreamClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamClientError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }
        Ok(response)
    }

    async fn read_header(&self, reader: &mut LineReader) -> Result<SessionHeader, StreamClientError> {
        read_session_header(reader, self.options.session_timeout).await
    }

    fn session_endpoint(&self) -> Result<(Url, String), StreamClientError> {
        let session = self.session();
        match (session.control_url(), session.session_id()) {
            (Some(url), Some(id)) => Ok((url.clone(), id.to_string())),
            _ => Err(StreamClientError::NotConnected),
        }
    }

    async fn control(
        &self,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, StreamClientError> {
        let (control_url, session_id) = self.session_endpoint()?;
        params.retain(|(key, _)| *key != "LS_session");
        params.insert(0, ("LS_session", session_id));
        let url = control_url.join(CONTROL_PATH)?;

        let response = self
            .http
            .post(url)
            .timeout(self.options.control_timeout)
            .form(&non_empty_params(params))
            .send()
            .await
            .map_err(StreamClientError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(StreamClientError::Transport)?;

        if !status.is_success() {
            return Err(StreamClientError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }

        let line = control_response_line(&body);
        debug!(event = "control_response", response = %line);
        Ok(line)
    }

    async fn receive_loop(self: Arc<Self>, reader: LineReader, mut cancel: oneshot::Receiver<()>) {
        let mut reader = reader;
        loop {
            let outcome = self.drain_stream(&mut reader, &mut cancel).await;
            if outcome != StreamOutcome::Rebind {
                debug!(event = "receive_loop_finished", outcome = ?outcome);
                break;
            }

            self.set_state(ConnectionState::Rebinding);
            let rebound = tokio::select! {
                biased;
                _ = &mut cancel => Err(StreamClientError::Cancelled),
                result = self.bind_session() => result,
            };
            match rebound {
                Ok(next) => {
                    reader = next;
                    self.set_state(ConnectionState::Receiving);
                }
                Err(err) => {
                    warn!(event = "rebind_failed", error = %err);
                    break;
                }
            }
        }
        self.terminate();
    }

    async fn drain_stream(
        &self,
        reader: &mut LineReader,
        cancel: &mut oneshot::Receiver<()>,
    ) -> StreamOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = &mut *cancel => return StreamOutcome::Cancelled,
                line = reader.next_line() => line,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!(event = "stream_closed_by_peer");
                    return StreamOutcome::Closed;
                }
                Err(err) => {
                    warn!(event = "stream_read_failed", error = %err);
                    return StreamOutcome::Closed;
                }
            };

            match StreamLine::classify(&line) {
                StreamLine::Probe => debug!(event = "probe"),
                StreamLine::Preamble | StreamLine::Blank => {}
                StreamLine::Error(detail) => {
                    error!(event = "server_error", detail = %detail);
                    return StreamOutcome::ServerError;
                }
                StreamLine::Loop => {
                    debug!(event = "loop_received");
                    return StreamOutcome::Rebind;
                }
                StreamLine::SyncError => {
                    error!(event = "sync_error");
                    return StreamOutcome::SyncError;
                }
                StreamLine::End(cause) => {
                    info!(event = "session_closed_by_server", cause = cause.unwrap_or(""));
                    return StreamOutcome::Ended;
                }
                StreamLine::Update(update) => self.forward_update(update),
            }
        }
    }

    fn forward_update(&self, line: &str) {
        let (table_id, payload) = match parse_update_line(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(event = "malformed_update", error = %err, line = %line);
                return;
            }
        };

        let subscription = self.session().table(table_id);
        let Some(subscription) = subscription else {
            warn!(event = "update_for_unknown_table", table_id);
            return;
        };
        if let Err(err) = subscription.notify_update(payload) {
            warn!(event = "update_decode_failed", table_id, error = %err);
        }
    }

    fn terminate(&self) {
        self.session().clear();
        self.set_state(ConnectionState::Terminated);
        info!(event = "session_terminated");
    }

    async fn join_worker(&self) {
        let worker = self.worker().take();
        if let Some(worker) = worker {
            self.await_worker(worker).await;
        }
    }

    /// Waits for the receive loop, cancelling and finally aborting it when it
    /// outlives `destroy_timeout`.
    async fn await_worker(&self, mut worker: ReceiveWorker) {
        let limit = self.options.destroy_timeout;
        if with_timeout(limit, &mut worker.handle).await.is_ok() {
            return;
        }

        warn!(
            event = "receive_loop_join_timeout",
            timeout_ms = limit.as_millis() as u64
        );
        worker.cancel();
        if with_timeout(limit, &mut worker.handle).await.is_err() {
            worker.handle.abort();
            self.terminate();
        }
    }
}

/// Reads the response status line and the header block. Both must arrive
/// within `limit`.
///
/// A rejection is answered with the status line plus whatever diagnostic
/// lines the server sends within a short window, even when it keeps the body
/// open.
async fn read_session_header(
    reader: &mut LineReader,
    limit: Duration,
) -> Result<SessionHeader, StreamClientError> {
    let deadline = Instant::now() + limit;
    let first = next_header_line(reader, deadline).await?.ok_or_else(|| {
        StreamClientError::Protocol("stream closed before the session response".to_string())
    })?;

    if first.trim_end() != OK_CMD {
        let mut lines = vec![first];
        lines.extend(
            reader
                .collect_remaining(MAX_DIAGNOSTIC_LINES, DIAGNOSTIC_WINDOW)
                .await,
        );
        let diagnostic = lines.join("\n");
        error!(event = "session_rejected", diagnostic = %diagnostic);
        return Err(StreamClientError::Protocol(diagnostic));
    }

    let mut header = SessionHeader::default();
    loop {
        match next_header_line(reader, deadline).await? {
            Some(line) if line.is_empty() => break,
            Some(line) => header
                .push_line(&line)
                .map_err(StreamClientError::Protocol)?,
            None => {
                return Err(StreamClientError::Protocol(
                    "stream ended inside the session header".to_string(),
                ))
            }
        }
    }

    if header.session_id().is_none() {
        return Err(StreamClientError::Protocol(
            "session header has no SessionId".to_string(),
        ));
    }
    Ok(header)
}

async fn next_header_line(
    reader: &mut LineReader,
    deadline: Instant,
) -> Result<Option<String>, StreamClientError> {
    timeout_at(deadline, reader.next_line())
        .await
        .map_err(|_| StreamClientError::Timeout("session header"))?
}

fn summarize_error_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
