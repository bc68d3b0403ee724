//! Upstream event sources.
//!
//! An [`EventSource`] opens one connection and yields its messages until the
//! connection ends. Reconnecting is the ingestion loop's job, not the
//! source's.

use crate::error::IngestError;
use crate::event::StreamMessage;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

/// Messages from one upstream connection, in arrival order.
pub type MessageStream = BoxStream<'static, Result<StreamMessage, IngestError>>;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens a fresh connection.
    async fn connect(&self) -> Result<MessageStream, IngestError>;

    /// Where this source reads from, for logging.
    fn describe(&self) -> String;
}

/// Server-sent events over HTTP.
pub struct SseSource {
    client: Client,
    url: String,
}

impl SseSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EventSource for SseSource {
    async fn connect(&self) -> Result<MessageStream, IngestError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Connection(format!(
                "upstream answered {} for {}",
                status, self.url
            )));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        yield Ok(StreamMessage::from(event));
                    }
                    Err(e) => {
                        yield Err(IngestError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
