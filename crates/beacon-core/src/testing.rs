//! In-memory link, transport, delay and logger used by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::endpoint::Endpoint;
use crate::link::{Connectivity, LinkError, LinkStatus};
use crate::transport::{Exchange, RequestError, Session, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Associate,
    BeginAssociation,
    Open(String),
    Post { content_type: String, body: Vec<u8> },
    Release,
    Wait(u32),
}

pub type Events = Rc<RefCell<Vec<Event>>>;

fn record(events: &Option<Events>, event: Event) {
    if let Some(events) = events {
        events.borrow_mut().push(event);
    }
}

pub struct ScriptedLink {
    /// Failures left before `associate` succeeds; `None` never succeeds.
    failures_left: Option<u32>,
    failure: LinkError,
    associated: bool,
    /// Whether `begin_association` restores the link immediately.
    restore_on_begin: bool,
    pub associate_calls: u32,
    pub begin_calls: u32,
    events: Option<Events>,
}

impl ScriptedLink {
    pub fn joining_after(failures: u32) -> Self {
        Self {
            failures_left: Some(failures),
            failure: LinkError::Timeout,
            associated: false,
            restore_on_begin: false,
            associate_calls: 0,
            begin_calls: 0,
            events: None,
        }
    }

    pub fn never_joining(failure: LinkError) -> Self {
        Self {
            failures_left: None,
            failure,
            ..Self::joining_after(0)
        }
    }

    pub fn up() -> Self {
        Self {
            associated: true,
            ..Self::joining_after(0)
        }
    }

    pub fn down() -> Self {
        Self::never_joining(LinkError::Timeout)
    }

    pub fn restoring_on_begin(mut self) -> Self {
        self.restore_on_begin = true;
        self
    }

    pub fn with_events(mut self, events: &Events) -> Self {
        self.events = Some(events.clone());
        self
    }

    pub fn drop_link(&mut self) {
        self.associated = false;
    }
}

impl Connectivity for ScriptedLink {
    async fn associate(&mut self) -> Result<(), LinkError> {
        self.associate_calls += 1;
        record(&self.events, Event::Associate);
        match self.failures_left.as_mut() {
            Some(0) => {
                self.associated = true;
                Ok(())
            }
            Some(left) => {
                *left -= 1;
                Err(self.failure)
            }
            None => Err(self.failure),
        }
    }

    fn begin_association(&mut self) {
        self.begin_calls += 1;
        record(&self.events, Event::BeginAssociation);
        if self.restore_on_begin {
            self.associated = true;
        }
    }

    fn status(&self) -> LinkStatus {
        if self.associated {
            LinkStatus::Associated
        } else {
            LinkStatus::NotAssociated
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.associated.then_some(Ipv4Addr::new(192, 168, 4, 2))
    }
}

/// Replays queued results; answers `200 OK` once the queue runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Result<Exchange, RequestError>>,
    pub opened: u32,
    pub released: u32,
    pub posts: Vec<(String, Vec<u8>)>,
    events: Option<Events>,
}

impl ScriptedTransport {
    pub fn replying(responses: impl IntoIterator<Item = Result<Exchange, RequestError>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: &Events) -> Self {
        self.events = Some(events.clone());
        self
    }
}

pub struct ScriptedSession<'s> {
    transport: &'s mut ScriptedTransport,
}

impl Transport for ScriptedTransport {
    type Session<'s>
        = ScriptedSession<'s>
    where
        Self: 's;

    fn open<'s>(&'s mut self, endpoint: &'s Endpoint) -> Self::Session<'s> {
        self.opened += 1;
        record(&self.events, Event::Open(endpoint.as_str().to_string()));
        ScriptedSession { transport: self }
    }
}

impl Session for ScriptedSession<'_> {
    async fn post(&mut self, content_type: &str, body: &[u8]) -> Result<Exchange, RequestError> {
        let transport = &mut *self.transport;
        transport
            .posts
            .push((content_type.to_string(), body.to_vec()));
        record(
            &transport.events,
            Event::Post {
                content_type: content_type.to_string(),
                body: body.to_vec(),
            },
        );
        transport
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(Exchange::new(200, "OK")))
    }
}

impl Drop for ScriptedSession<'_> {
    fn drop(&mut self) {
        self.transport.released += 1;
        record(&self.transport.events, Event::Release);
    }
}

#[derive(Default)]
pub struct RecordingDelay {
    pub waits_ms: Vec<u32>,
    events: Option<Events>,
}

impl RecordingDelay {
    pub fn with_events(events: &Events) -> Self {
        Self {
            waits_ms: Vec::new(),
            events: Some(events.clone()),
        }
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
        record(&self.events, Event::Wait(ms));
    }
}

/// Logger that keeps each test thread's records apart.
struct CaptureLogger;

std::thread_local! {
    static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

static LOGGER: CaptureLogger = CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = std::format!("{}", record.args());
        CAPTURED.with(|captured| captured.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

/// Install the capturing logger (once) and clear this thread's buffer.
pub fn capture_logs() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

pub fn captured_logs() -> Vec<String> {
    CAPTURED.with(|captured| captured.borrow().clone())
}
