//! A real [`JobLauncher`] behind the consumer and supervisor, with only the
//! process spawner, side channel and broker faked.

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use robodispatch_broker::{ConnectionSupervisor, QueueConsumer, SupervisorConfig};
use robodispatch_core::JobDescriptor;
use robodispatch_launcher::{
    JobLauncher, LauncherConfig, NotifyError, ProcessOutput, RobotCommand, RobotProcess,
    RobotSpawner, SideChannel, SpawnLock,
};

use common::{actions, Action, ActionLog, FakeAlerts, FakeConnector, FakeMessage, FakeSession};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct IdleProcess;

#[async_trait]
impl RobotProcess for IdleProcess {
    fn id(&self) -> Option<u32> {
        Some(7)
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    async fn drain(&mut self) -> std::io::Result<ProcessOutput> {
        Ok(ProcessOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct RecordingSpawner {
    spawned: Mutex<Vec<RobotCommand>>,
}

#[async_trait]
impl RobotSpawner for RecordingSpawner {
    async fn spawn(&self, command: &RobotCommand) -> std::io::Result<Box<dyn RobotProcess>> {
        self.spawned.lock().unwrap().push(command.clone());
        Ok(Box::new(IdleProcess))
    }
}

#[derive(Default)]
struct RecordingChannel {
    delivered: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl SideChannel for RecordingChannel {
    async fn deliver(&self, job: &JobDescriptor) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap()
            .push(serde_json::Value::Object(job.as_map().clone()));
        Ok(())
    }
}

struct Pipeline {
    spawner: Arc<RecordingSpawner>,
    channel: Arc<RecordingChannel>,
    supervisor: ConnectionSupervisor<FakeConnector>,
}

fn pipeline(session: FakeSession) -> Pipeline {
    let spawner = Arc::new(RecordingSpawner::default());
    let channel = Arc::new(RecordingChannel::default());
    let launcher = JobLauncher::new(
        LauncherConfig {
            robots_root: PathBuf::from("/opt/rpa"),
            handshake_delay: Duration::from_secs(10),
        },
        SpawnLock::new(),
        spawner.clone(),
        channel.clone(),
    );
    let consumer = QueueConsumer::new("vm-01", Arc::new(launcher));
    let supervisor = ConnectionSupervisor::new(
        FakeConnector::scripted(vec![Ok(session)]),
        Arc::new(consumer),
        Arc::new(FakeAlerts::default()),
        SupervisorConfig {
            worker: "vm-01".to_string(),
            queues: vec!["billing".to_string()],
        },
    );
    Pipeline {
        spawner,
        channel,
        supervisor,
    }
}

// ---------------------------------------------------------------------------
// Test: a job travels from the queue to the robot with the worker injected
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn job_reaches_robot_with_worker_identity() {
    let log = ActionLog::default();
    let session = FakeSession::idle().with_queue(
        "billing",
        vec![Ok(FakeMessage::new(r#"{"id": 1, "Robo": "Billing"}"#, &log))],
    );
    let pipeline = pipeline(session);

    pipeline.supervisor.run().await.unwrap();

    let spawned = pipeline.spawner.spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].robot, "Billing");
    assert_eq!(spawned[0].workdir, PathBuf::from("/opt/rpa").join("Billing"));

    assert_eq!(
        *pipeline.channel.delivered.lock().unwrap(),
        vec![json!({"id": 1, "Robo": "Billing", "worker": "vm-01"})]
    );
    assert_eq!(actions(&log), vec![Action::Ack]);
}

// ---------------------------------------------------------------------------
// Test: mixed traffic gets the right fate per message
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn each_message_gets_its_own_fate() {
    let log = ActionLog::default();
    let session = FakeSession::idle().with_queue(
        "billing",
        vec![
            Ok(FakeMessage::new(r#"{"id": 1, "Robo": "Billing"}"#, &log)),
            Ok(FakeMessage::new(r#"{"id": 2}"#, &log)),
            Ok(FakeMessage::new(r#"{"id": 3, "Robo": "../../bin"}"#, &log)),
            Ok(FakeMessage::new("garbage", &log)),
            Ok(FakeMessage::new(r#"{"id": 4, "Robo": 42}"#, &log)),
            Ok(FakeMessage::new(r#"{"id": 5, "Robo": "   "}"#, &log)),
        ],
    );
    let pipeline = pipeline(session);

    pipeline.supervisor.run().await.unwrap();

    assert_eq!(pipeline.spawner.spawned.lock().unwrap().len(), 1);
    assert_eq!(
        actions(&log),
        vec![
            Action::Ack,
            Action::Requeue,
            Action::Ack,
            Action::Requeue,
            Action::Ack,
            Action::Ack,
        ]
    );
}
