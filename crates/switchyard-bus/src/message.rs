//! Messages delivered to subscription handlers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::frame::Frame;

/// Field that names the kind of a structured message.
pub const DISCRIMINATOR_FIELD: &str = "status";

/// Payload of a delivered message.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    /// Body parsed as JSON.
    Structured(Value),
    /// Body that is not JSON, delivered as-is.
    Raw(String),
}

/// One message received on a topic.
#[derive(Clone, Debug, PartialEq)]
pub struct BusMessage {
    topic: String,
    headers: BTreeMap<String, String>,
    text: String,
    body: MessageBody,
}

impl BusMessage {
    /// Build a message from its topic and body text.
    pub fn new(topic: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(value) => MessageBody::Structured(value),
            Err(_) => MessageBody::Raw(text.clone()),
        };
        Self {
            topic: topic.into(),
            headers: BTreeMap::new(),
            text,
            body,
        }
    }

    /// Build from a MESSAGE frame delivered on `topic`.
    pub fn from_frame(topic: impl Into<String>, frame: &Frame) -> Self {
        let mut message = Self::new(topic, frame.body.clone());
        for (name, value) in &frame.headers {
            // first occurrence wins, matching `Frame::header`
            let _ = message
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        message
    }

    /// Topic the message arrived on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Broker headers.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// One broker header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Body text exactly as received.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed body.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Whether the body parsed as JSON.
    pub fn is_structured(&self) -> bool {
        matches!(self.body, MessageBody::Structured(_))
    }

    /// Value of the `status` field of a structured JSON object body.
    pub fn discriminator(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Structured(value) => value.get(DISCRIMINATOR_FIELD)?.as_str(),
            MessageBody::Raw(_) => None,
        }
    }

    /// Decode the body into a typed payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            MessageBody::Structured(value) => T::deserialize(value),
            MessageBody::Raw(text) => serde_json::from_str(text),
        }
    }
}
