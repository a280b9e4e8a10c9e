//! In-memory fakes shared by the broker integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;

use robodispatch_broker::{
    BrokerError, BrokerSession, Connector, DeliveryStream, InboundMessage, JobHandler,
    QueueSubscription,
};
use robodispatch_core::JobDescriptor;
use robodispatch_events::{AlertError, AlertSink, FailureAlert};
use robodispatch_launcher::DispatchError;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ack,
    Requeue,
}

/// Every ack / requeue in the order it happened.
pub type ActionLog = Arc<Mutex<Vec<(String, Action)>>>;

pub struct FakeMessage {
    pub body: Vec<u8>,
    pub log: ActionLog,
    pub fail_ack: bool,
}

impl FakeMessage {
    pub fn new(body: &str, log: &ActionLog) -> Self {
        Self {
            body: body.as_bytes().to_vec(),
            log: Arc::clone(log),
            fail_ack: false,
        }
    }

    fn record(&self, action: Action) -> Result<(), BrokerError> {
        if self.fail_ack {
            return Err(BrokerError::Ack("channel closed".into()));
        }
        let body = String::from_utf8_lossy(&self.body).into_owned();
        self.log.lock().unwrap().push((body, action));
        Ok(())
    }
}

#[async_trait]
impl InboundMessage for FakeMessage {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.record(Action::Ack)
    }

    async fn requeue(&self) -> Result<(), BrokerError> {
        self.record(Action::Requeue)
    }
}

pub fn stream_of(items: Vec<Result<FakeMessage, BrokerError>>) -> DeliveryStream<FakeMessage> {
    futures::stream::iter(items).boxed()
}

pub fn actions(log: &ActionLog) -> Vec<Action> {
    log.lock().unwrap().iter().map(|(_, action)| *action).collect()
}

// ---------------------------------------------------------------------------
// Job handler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeHandler {
    pub calls: Mutex<Vec<(String, serde_json::Value, Instant)>>,
    pub fail: bool,
}

impl FakeHandler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn robots(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, job, _)| job["Robo"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl JobHandler for FakeHandler {
    async fn handle_job(&self, worker: &str, job: JobDescriptor) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push((
            worker.to_string(),
            serde_json::Value::Object(job.as_map().clone()),
            Instant::now(),
        ));
        if self.fail {
            return Err(DispatchError::InvalidRobotName("boom".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeAlerts {
    pub sent: Mutex<Vec<(FailureAlert, Instant)>>,
}

impl FakeAlerts {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSink for FakeAlerts {
    async fn send(&self, alert: &FailureAlert) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((alert.clone(), Instant::now()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sessions and connector
// ---------------------------------------------------------------------------

/// A scripted session: each queue yields a fixed list of deliveries.
#[derive(Default)]
pub struct FakeSession {
    pub queues: Mutex<HashMap<String, Vec<Result<FakeMessage, BrokerError>>>>,
    pub subscribe_error: Option<BrokerError>,
    pub connected: AtomicBool,
    pub closed: Arc<AtomicBool>,
    pub subscriptions: Arc<Mutex<Vec<QueueSubscription>>>,
}

impl FakeSession {
    /// A session that stays connected and whose queues are all empty.
    pub fn idle() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// A session whose connection dropped: streams end, link is down.
    pub fn dropped() -> Self {
        Self::default()
    }

    pub fn with_queue(self, queue: &str, items: Vec<Result<FakeMessage, BrokerError>>) -> Self {
        self.queues.lock().unwrap().insert(queue.to_string(), items);
        self
    }
}

#[async_trait]
impl BrokerSession for FakeSession {
    type Message = FakeMessage;

    async fn subscribe(
        &self,
        subscription: &QueueSubscription,
    ) -> Result<DeliveryStream<FakeMessage>, BrokerError> {
        if let Some(e) = &self.subscribe_error {
            return Err(e.clone());
        }
        self.subscriptions.lock().unwrap().push(subscription.clone());
        let items = self
            .queues
            .lock()
            .unwrap()
            .remove(&subscription.queue)
            .unwrap_or_default();
        Ok(stream_of(items))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Hands out scripted connection results in order; once the script is
/// exhausted every attempt yields an idle session.
#[derive(Default)]
pub struct FakeConnector {
    pub script: Mutex<VecDeque<Result<FakeSession, BrokerError>>>,
    pub attempts: AtomicUsize,
    pub attempt_times: Mutex<Vec<Instant>>,
}

impl FakeConnector {
    pub fn scripted(script: Vec<Result<FakeSession, BrokerError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, BrokerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FakeSession::idle()))
    }
}

pub fn refused() -> Result<FakeSession, BrokerError> {
    Err(BrokerError::Connection("connection refused".into()))
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Collects formatted log lines written through a `tracing` subscriber.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a thread-local subscriber writing into this capture.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn count(&self, needle: &str) -> usize {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf).matches(needle).count()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
