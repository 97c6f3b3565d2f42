//! Networked transport: one `POST` per turn to the agent's URL.
//!
//! The whole exchange (connect, send, read body) runs inside
//! `tokio::time::timeout`. When the deadline fires the request future is
//! dropped, which aborts the underlying connection.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::contract::TimeoutCause;
use crate::domain::{AgentId, HashmatchError, Result};
use crate::gateway::{
    Delivery, DeliveryRequest, GatewayConfig, Transport, TranscriptEntry, TranscriptRecorder,
    PROTOCOL_VERSION,
};

/// Body posted to a remote agent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest<'a, O> {
    pub protocol_version: &'static str,
    pub match_id: &'a str,
    pub agent_id: &'a AgentId,
    pub turn: u32,
    pub deadline_ms: u64,
    pub observation: &'a O,
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoints: BTreeMap<AgentId, String>,
    config: GatewayConfig,
    transcript: TranscriptRecorder,
}

impl HttpTransport {
    pub fn new(endpoints: BTreeMap<AgentId, String>, config: GatewayConfig) -> Result<Self> {
        if let Some((id, _)) = endpoints.iter().find(|(_, url)| url.trim().is_empty()) {
            return Err(HashmatchError::InvalidConfig(format!(
                "empty agent URL for {id}"
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HashmatchError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoints,
            config,
            transcript: TranscriptRecorder::disabled(),
        })
    }

    pub fn with_transcript(mut self) -> Self {
        self.transcript = TranscriptRecorder::enabled();
        self
    }

    async fn fetch<O: Serialize + Sync>(
        &self,
        url: &str,
        body: &TurnRequest<'_, O>,
    ) -> std::result::Result<Vec<u8>, TimeoutCause> {
        let limit = self.config.max_response_bytes;
        let mut response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|_| TimeoutCause::Network)?;
        if !response.status().is_success() {
            return Err(TimeoutCause::Network);
        }
        if response.content_length().is_some_and(|len| len as usize > limit) {
            return Err(TimeoutCause::ResponseTooLarge);
        }

        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|_| TimeoutCause::Network)? {
            if buf.len() + chunk.len() > limit {
                return Err(TimeoutCause::ResponseTooLarge);
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

/// Accept `{"action": {...}}` or a bare action object.
pub fn decode_action<A: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<A, TimeoutCause> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| TimeoutCause::Malformed)?;
    let candidate = match value {
        Value::Object(mut map) if map.contains_key("action") => {
            map.remove("action").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(candidate).map_err(|_| TimeoutCause::Malformed)
}

#[async_trait]
impl<O, A> Transport<O, A> for HttpTransport
where
    O: Serialize + Sync,
    A: DeserializeOwned + Send,
{
    async fn deliver(&mut self, request: DeliveryRequest<'_, O>) -> Delivery<A> {
        let started = Instant::now();
        let Some(url) = self.endpoints.get(request.agent_id).cloned() else {
            self.transcript.record(
                request.agent_id,
                request.turn,
                Some(TimeoutCause::Network),
                started,
                None,
            );
            return Delivery::TimedOut(TimeoutCause::Network);
        };
        let body = TurnRequest {
            protocol_version: PROTOCOL_VERSION,
            match_id: request.match_id,
            agent_id: request.agent_id,
            turn: request.turn,
            deadline_ms: request.deadline.as_millis() as u64,
            observation: request.observation,
        };

        let fetched = tokio::time::timeout(request.deadline, self.fetch(&url, &body)).await;
        let (delivery, bytes) = match fetched {
            Err(_elapsed) => (Delivery::TimedOut(TimeoutCause::Deadline), None),
            Ok(Err(cause)) => (Delivery::TimedOut(cause), None),
            Ok(Ok(raw)) => {
                let len = Some(raw.len() as u64);
                match decode_action::<A>(&raw) {
                    Ok(action) => (Delivery::Action(action), len),
                    Err(cause) => (Delivery::TimedOut(cause), len),
                }
            }
        };
        let cause = match &delivery {
            Delivery::Action(_) => None,
            Delivery::TimedOut(c) => Some(*c),
        };
        debug!(
            agent_id = %request.agent_id,
            turn = request.turn,
            outcome = cause.map_or("action", |c| c.as_str()),
            "http delivery"
        );
        self.transcript
            .record(request.agent_id, request.turn, cause, started, bytes);
        delivery
    }

    fn take_transcript(&mut self) -> Vec<TranscriptEntry> {
        self.transcript.take()
    }
}
