//! HTTPS transport over embassy-net and reqwless
//!
//! One TCP socket is shared by every request. A session resolves, connects
//! and runs the TLS handshake inside `post`; everything it borrowed is
//! released before `post` returns, so dropping the session leaves no
//! connection behind.

use alloc::string::String;

use beacon_core::endpoint::Endpoint;
use beacon_core::transport::{Exchange, RequestError, Session, Transport};
use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_time::{Duration, with_timeout};
use esp_hal::rng::Rng;
use log::debug;
use reqwless::Error as HttpError;
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::{Method, RequestBuilder};
use static_cell::ConstStaticCell;

/// Largest TLS record plus overhead.
const TLS_BUFFER_SIZE: usize = 16_640;
const RESPONSE_BUFFER_SIZE: usize = 4096;
const SOCKET_BUFFER_SIZE: usize = 4096;

type ClientState = TcpClientState<1, SOCKET_BUFFER_SIZE, SOCKET_BUFFER_SIZE>;
type Client = TcpClient<'static, 1, SOCKET_BUFFER_SIZE, SOCKET_BUFFER_SIZE>;

pub struct HttpsBuffers {
    tls_read: [u8; TLS_BUFFER_SIZE],
    tls_write: [u8; TLS_BUFFER_SIZE],
    response: [u8; RESPONSE_BUFFER_SIZE],
}

impl HttpsBuffers {
    const fn new() -> Self {
        Self {
            tls_read: [0; TLS_BUFFER_SIZE],
            tls_write: [0; TLS_BUFFER_SIZE],
            response: [0; RESPONSE_BUFFER_SIZE],
        }
    }
}

static CLIENT_STATE: ConstStaticCell<ClientState> = ConstStaticCell::new(ClientState::new());
static BUFFERS: ConstStaticCell<HttpsBuffers> = ConstStaticCell::new(HttpsBuffers::new());

/// Where a request was when it failed; picks the code for errors the client
/// library does not classify.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Connect,
    Send,
    Receive,
}

pub struct HttpsTransport {
    tcp: Client,
    dns: DnsSocket<'static>,
    buffers: &'static mut HttpsBuffers,
    rng: Rng,
    timeout: Duration,
}

impl HttpsTransport {
    /// Claims the static socket state and buffers; call once.
    pub fn new(stack: Stack<'static>, rng: Rng, request_timeout_ms: u32) -> Self {
        let mut tcp = TcpClient::new(stack, CLIENT_STATE.take());
        tcp.set_timeout(Some(Duration::from_millis(u64::from(request_timeout_ms))));

        Self {
            tcp,
            dns: DnsSocket::new(stack),
            buffers: BUFFERS.take(),
            rng,
            timeout: Duration::from_millis(u64::from(request_timeout_ms)),
        }
    }
}

pub struct HttpsSession<'s> {
    transport: &'s mut HttpsTransport,
    endpoint: &'s Endpoint,
}

impl Transport for HttpsTransport {
    type Session<'s>
        = HttpsSession<'s>
    where
        Self: 's;

    fn open<'s>(&'s mut self, endpoint: &'s Endpoint) -> Self::Session<'s> {
        HttpsSession {
            transport: self,
            endpoint,
        }
    }
}

impl Session for HttpsSession<'_> {
    async fn post(&mut self, content_type: &str, body: &[u8]) -> Result<Exchange, RequestError> {
        let timeout = self.transport.timeout;
        match with_timeout(timeout, self.exchange(content_type, body)).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::ReadTimeout),
        }
    }
}

impl HttpsSession<'_> {
    async fn exchange(
        &mut self,
        content_type: &str,
        body: &[u8],
    ) -> Result<Exchange, RequestError> {
        let HttpsTransport {
            tcp,
            dns,
            buffers,
            rng,
            ..
        } = &mut *self.transport;
        let HttpsBuffers {
            tls_read,
            tls_write,
            response,
        } = &mut **buffers;

        let seed = (rng.random() as u64) << 32 | rng.random() as u64;
        let tls = TlsConfig::new(seed, tls_read, tls_write, TlsVerify::None);
        let mut client = HttpClient::new_with_tls(&*tcp, &*dns, tls);

        let headers = [("Content-Type", content_type)];
        let mut request = client
            .request(Method::POST, self.endpoint.as_str())
            .await
            .map_err(|err| map_error(err, Phase::Connect))?
            .headers(&headers)
            .body(body);

        let mut response = request
            .send(response)
            .await
            .map_err(|err| map_error(err, Phase::Send))?;
        let status = response.status.0;

        let payload = response
            .body()
            .read_to_end()
            .await
            .map_err(|err| map_error(err, Phase::Receive))?;

        Ok(Exchange::new(status, String::from_utf8_lossy(payload)))
    }
}

fn map_error(err: HttpError, phase: Phase) -> RequestError {
    debug!("https {:?} err={:?}", phase, err);
    match err {
        HttpError::Dns => RequestError::ConnectionRefused,
        HttpError::BufferTooSmall => RequestError::OutOfMemory,
        HttpError::Codec => RequestError::NoHttpServer,
        HttpError::ConnectionAborted => RequestError::ConnectionLost,
        _ => match phase {
            Phase::Connect => RequestError::ConnectionRefused,
            Phase::Send => RequestError::SendHeaderFailed,
            Phase::Receive => RequestError::ConnectionLost,
        },
    }
}
