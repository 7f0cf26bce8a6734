//! One-call helpers over [`StreamClient`] for callers that already hold
//! stream credentials.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::stream::client::{StreamClient, StreamClientError, StreamClientOptions};
use crate::stream::proto::TableId;
use crate::stream::subscription::{Subscription, UpdateEvent};

/// Endpoint and login material for one streaming session.
#[derive(Clone, Debug)]
pub struct StreamCredentials {
    pub endpoint_url: String,
    pub account_id: String,
    pub password: SecretString,
}

impl StreamCredentials {
    pub fn new(
        endpoint_url: impl Into<String>,
        account_id: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            account_id: account_id.into(),
            password,
        }
    }

    /// Builds credentials from a trading API login: the stream password is
    /// `CST-<cst>|XST-<xst>`.
    pub fn from_session_tokens(
        endpoint_url: impl Into<String>,
        account_id: impl Into<String>,
        cst: &str,
        xst: &str,
    ) -> Self {
        Self::new(
            endpoint_url,
            account_id,
            SecretString::new(format!("CST-{cst}|XST-{xst}")),
        )
    }
}

/// Supplies stream credentials, typically after a login against an upstream API.
pub trait CredentialSource {
    fn stream_credentials(&self) -> Result<StreamCredentials, StreamClientError>;
}

impl CredentialSource for StreamCredentials {
    fn stream_credentials(&self) -> Result<StreamCredentials, StreamClientError> {
        Ok(self.clone())
    }
}

/// Polling bounds for [`StreamingFacade::fetch_one`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOneOptions {
    pub max_polls: usize,
    pub poll_interval: Duration,
}

impl Default for FetchOneOptions {
    fn default() -> Self {
        Self {
            max_polls: 1000,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Connected [`StreamClient`] plus the polling bounds used by `fetch_one`.
#[derive(Debug)]
pub struct StreamingFacade {
    client: StreamClient,
    fetch: FetchOneOptions,
}

impl StreamingFacade {
    /// Creates a client for `credentials` and opens the session.
    pub async fn connect(
        credentials: StreamCredentials,
        options: StreamClientOptions,
    ) -> Result<Self, StreamClientError> {
        let client = StreamClient::with_options(
            &credentials.endpoint_url,
            "",
            credentials.account_id,
            credentials.password,
            options,
        )?;
        client.connect().await?;
        Ok(Self {
            client,
            fetch: FetchOneOptions::default(),
        })
    }

    /// Asks `source` for credentials, then connects like [`connect`](Self::connect).
    pub async fn connect_with<S>(
        source: &S,
        options: StreamClientOptions,
    ) -> Result<Self, StreamClientError>
    where
        S: CredentialSource + ?Sized,
    {
        let credentials = source.stream_credentials()?;
        Self::connect(credentials, options).await
    }

    /// Replaces the polling bounds used by `fetch_one`.
    pub fn with_fetch_options(mut self, fetch: FetchOneOptions) -> Self {
        self.fetch = fetch;
        self
    }

    /// Attaches `listener` to the table and subscribes it.
    pub async fn subscribe<F>(
        &self,
        subscription: Arc<Subscription>,
        listener: F,
    ) -> Result<(TableId, bool), StreamClientError>
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        subscription.add_listener(listener);
        self.client.subscribe(subscription).await
    }

    /// Deletes the table; `true` only when the server accepted it.
    pub async fn unsubscribe(&self, table_id: TableId) -> bool {
        self.client.unsubscribe(table_id).await
    }

    /// Subscribes, waits for the first update, then unsubscribes.
    ///
    /// Returns `None` when the server rejects the table or nothing arrives
    /// within `max_polls * poll_interval`.
    pub async fn fetch_one(
        &self,
        subscription: Arc<Subscription>,
    ) -> Result<Option<UpdateEvent>, StreamClientError> {
        let (table_id, accepted) = self
            .subscribe(Arc::clone(&subscription), |_| {})
            .await?;

        let mut first = None;
        if accepted {
            for _ in 0..self.fetch.max_polls {
                first = subscription.first_event();
                if first.is_some() {
                    break;
                }
                tokio::time::sleep(self.fetch.poll_interval).await;
            }
        }

        self.client.unsubscribe(table_id).await;
        Ok(first)
    }

    /// Closes the stream locally.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Asks the server to close the session.
    pub async fn destroy(&self) -> Result<(), StreamClientError> {
        self.client.destroy().await
    }

    /// Underlying stream client.
    pub fn client(&self) -> &StreamClient {
        &self.client
    }
}
