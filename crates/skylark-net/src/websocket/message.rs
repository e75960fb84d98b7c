//! Connection state and close status types.

use std::fmt;

/// Lifecycle of a WebSocket connection.
///
/// A client moves `Disconnected → Handshaking → Open → Closed` and never
/// goes back; a failed handshake also ends in `Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WebSocketState {
    /// Created, `connect` not yet called.
    #[default]
    Disconnected,
    /// Opening handshake in progress.
    Handshaking,
    /// Handshake accepted; frames may be sent and received.
    Open,
    /// Closed locally, by the peer, or by a failure.
    Closed,
}

impl fmt::Display for WebSocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Handshaking => "handshaking",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Close status codes from RFC 6455 section 7.4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000, the purpose of the connection was fulfilled.
    #[default]
    Normal,
    /// 1001, endpoint going away.
    Away,
    /// 1002
    Protocol,
    /// 1003, received a data type it cannot accept.
    Unsupported,
    /// 1005, reserved: no status code was present.
    NoStatus,
    /// 1006, reserved: closed without a Close frame.
    Abnormal,
    /// 1007, payload inconsistent with the message type.
    Invalid,
    /// 1008
    Policy,
    /// 1009
    TooBig,
    /// 1010, expected extension not negotiated.
    Extension,
    /// 1011, unexpected server condition.
    Error,
    /// 1012
    Restart,
    /// 1013
    Again,
    /// Any other code, including the 4000-4999 application range.
    Custom(u16),
}

impl CloseCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::Away => 1001,
            Self::Protocol => 1002,
            Self::Unsupported => 1003,
            Self::NoStatus => 1005,
            Self::Abnormal => 1006,
            Self::Invalid => 1007,
            Self::Policy => 1008,
            Self::TooBig => 1009,
            Self::Extension => 1010,
            Self::Error => 1011,
            Self::Restart => 1012,
            Self::Again => 1013,
            Self::Custom(code) => *code,
        }
    }

    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::Away,
            1002 => Self::Protocol,
            1003 => Self::Unsupported,
            1005 => Self::NoStatus,
            1006 => Self::Abnormal,
            1007 => Self::Invalid,
            1008 => Self::Policy,
            1009 => Self::TooBig,
            1010 => Self::Extension,
            1011 => Self::Error,
            1012 => Self::Restart,
            1013 => Self::Again,
            code => Self::Custom(code),
        }
    }

    /// Whether the code may be sent in a Close frame.
    ///
    /// Defined codes other than 1004-1006 and 1015, plus the registered
    /// (3000-3999) and private (4000-4999) ranges.
    pub fn is_sendable(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

/// Status code and optional text of a Close frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseReason {
    pub code: CloseCode,
    pub reason: Option<String>,
}

impl CloseReason {
    pub fn new(code: CloseCode) -> Self {
        Self { code, reason: None }
    }

    pub fn with_reason(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Some(reason.into()),
        }
    }

    /// A 1000 close without text.
    pub fn normal() -> Self {
        Self::new(CloseCode::Normal)
    }
}
