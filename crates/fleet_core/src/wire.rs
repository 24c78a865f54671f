//! Wire contract between the simulation and an optimizer.
//!
//! Every message is two frames: a topic from a fixed table and a payload.
//! Payloads are one [`WIRE_VERSION`] byte followed by the bincode encoding of
//! the topic's schema type. Anything else is a [`ProtocolError`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instance::ProblemInstance;
use crate::plan::Plan;
use crate::problem::Problem;
use crate::result::SimulationResult;

pub const WIRE_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Problem,
    Solution,
    SimResult,
    Start,
}

const TOPICS: [(&str, Topic); 4] = [
    ("problem", Topic::Problem),
    ("solution", Topic::Solution),
    ("simresult", Topic::SimResult),
    ("start", Topic::Start),
];

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Problem => "problem",
            Topic::Solution => "solution",
            Topic::SimResult => "simresult",
            Topic::Start => "start",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        TOPICS
            .iter()
            .find(|(literal, _)| literal.as_bytes() == bytes)
            .map(|(_, topic)| *topic)
            .ok_or_else(|| ProtocolError::UnknownTopic(String::from_utf8_lossy(bytes).into_owned()))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("unknown topic {0:?}")]
    UnknownTopic(String),

    #[error("empty payload on topic {topic}")]
    EmptyPayload { topic: &'static str },

    #[error("unsupported wire version {found} on topic {topic} (expected {WIRE_VERSION})")]
    UnsupportedVersion { topic: &'static str, found: u8 },

    #[error("malformed {topic} payload: {source}")]
    Payload {
        topic: &'static str,
        #[source]
        source: Arc<bincode::ErrorKind>,
    },

    #[error("failed to encode {topic} payload: {source}")]
    Encode {
        topic: &'static str,
        #[source]
        source: Arc<bincode::ErrorKind>,
    },

    #[error("expected topic {expected}, got {found}")]
    UnexpectedTopic {
        expected: &'static str,
        found: &'static str,
    },
}

/// Payload of the `start` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSimulation {
    pub allow_fast_simulation: bool,
    pub instance: ProblemInstance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Problem(Problem),
    Solution(Plan),
    SimResult(SimulationResult),
    Start(StartSimulation),
}

/// A message as it travels: topic frame and payload frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frames {
    pub topic: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn topic(&self) -> Topic {
        match self {
            Message::Problem(_) => Topic::Problem,
            Message::Solution(_) => Topic::Solution,
            Message::SimResult(_) => Topic::SimResult,
            Message::Start(_) => Topic::Start,
        }
    }

    pub fn encode(&self) -> Result<Frames, ProtocolError> {
        let topic = self.topic();
        let mut payload = vec![WIRE_VERSION];
        let encoded = match self {
            Message::Problem(problem) => bincode::serialize_into(&mut payload, problem),
            Message::Solution(plan) => bincode::serialize_into(&mut payload, plan),
            Message::SimResult(result) => bincode::serialize_into(&mut payload, result),
            Message::Start(start) => bincode::serialize_into(&mut payload, start),
        };
        encoded.map_err(|source| ProtocolError::Encode {
            topic: topic.as_str(),
            source: source.into(),
        })?;
        Ok(Frames {
            topic: topic.as_str().as_bytes().to_vec(),
            payload,
        })
    }

    pub fn decode(frames: &Frames) -> Result<Self, ProtocolError> {
        let topic = Topic::from_bytes(&frames.topic)?;
        let name = topic.as_str();
        let (&version, body) = frames
            .payload
            .split_first()
            .ok_or(ProtocolError::EmptyPayload { topic: name })?;
        if version != WIRE_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                topic: name,
                found: version,
            });
        }

        let payload_error = |source: bincode::Error| ProtocolError::Payload {
            topic: name,
            source: source.into(),
        };
        let message = match topic {
            Topic::Problem => Message::Problem(bincode::deserialize(body).map_err(payload_error)?),
            Topic::Solution => Message::Solution(bincode::deserialize(body).map_err(payload_error)?),
            Topic::SimResult => {
                Message::SimResult(bincode::deserialize(body).map_err(payload_error)?)
            }
            Topic::Start => Message::Start(bincode::deserialize(body).map_err(payload_error)?),
        };
        Ok(message)
    }

    /// Decode and require a specific topic.
    pub fn decode_expecting(frames: &Frames, expected: Topic) -> Result<Self, ProtocolError> {
        let message = Self::decode(frames)?;
        if message.topic() != expected {
            return Err(ProtocolError::UnexpectedTopic {
                expected: expected.as_str(),
                found: message.topic().as_str(),
            });
        }
        Ok(message)
    }
}
