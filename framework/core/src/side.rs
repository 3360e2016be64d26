use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two endpoints of a scheme under test.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[display("sender")]
    Sender,
    #[display("receiver")]
    Receiver,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Sender => Side::Receiver,
            Side::Receiver => Side::Sender,
        }
    }

    /// The wrapper sub-command that starts this endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Sender => "sender",
            Side::Receiver => "receiver",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Expected 'sender' or 'receiver', got '{0}'")]
pub struct ParseSideError(String);

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sender" => Ok(Side::Sender),
            "receiver" => Ok(Side::Receiver),
            other => Err(ParseSideError(other.to_string())),
        }
    }
}

/// Which endpoint is started first, and so listens, for a scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOrder {
    pub first: Side,
}

impl RunOrder {
    pub fn new(first: Side) -> Self {
        Self { first }
    }

    pub fn second(&self) -> Side {
        self.first.opposite()
    }

    /// Whether the receiver listens and the sender connects to it.
    pub fn receiver_first(&self) -> bool {
        self.first == Side::Receiver
    }
}
