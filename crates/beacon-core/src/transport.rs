//! Request/response transport contract and result codes

use alloc::string::String;

use thiserror_no_std::Error;

use crate::endpoint::Endpoint;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub status: u16,
    /// Response body, passed through as text.
    pub body: String,
}

impl Exchange {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failed exchange, numbered the way the HTTP client library numbers its
/// result codes. Every variant maps to a code `<= 0`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("send header failed")]
    SendHeaderFailed,
    #[error("send payload failed")]
    SendPayloadFailed,
    #[error("not connected")]
    NotConnected,
    #[error("connection lost")]
    ConnectionLost,
    #[error("no stream")]
    NoStream,
    #[error("no HTTP server")]
    NoHttpServer,
    #[error("too less ram")]
    OutOfMemory,
    #[error("Transfer-Encoding not supported")]
    UnsupportedEncoding,
    #[error("Stream write error")]
    StreamWrite,
    #[error("read Timeout")]
    ReadTimeout,
}

impl RequestError {
    pub const fn code(self) -> i32 {
        match self {
            RequestError::ConnectionRefused => -1,
            RequestError::SendHeaderFailed => -2,
            RequestError::SendPayloadFailed => -3,
            RequestError::NotConnected => -4,
            RequestError::ConnectionLost => -5,
            RequestError::NoStream => -6,
            RequestError::NoHttpServer => -7,
            RequestError::OutOfMemory => -8,
            RequestError::UnsupportedEncoding => -9,
            RequestError::StreamWrite => -10,
            RequestError::ReadTimeout => -11,
        }
    }
}

/// Something that can open sessions to an endpoint.
pub trait Transport {
    type Session<'s>: Session
    where
        Self: 's;

    /// Acquire a session bound to `endpoint`. The connection is released
    /// when the session is dropped.
    fn open<'s>(&'s mut self, endpoint: &'s Endpoint) -> Self::Session<'s>;
}

/// One open connection to an endpoint.
pub trait Session {
    fn post(
        &mut self,
        content_type: &str,
        body: &[u8],
    ) -> impl Future<Output = Result<Exchange, RequestError>>;
}
