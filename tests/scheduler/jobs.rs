use async_trait::async_trait;
use scriptcron::scheduler::{
    AgentEngine, ChatSender, MemoryScheduleStore, Message, Response, ResponseStream, RunStatus,
    Schedule, ScheduleStore, Scheduler, SchedulerConfig, Session,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::harness;

#[derive(Default)]
struct Outbox {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatSender for Outbox {
    async fn send_via_provider(&self, _provider: &str, _target: &str, content: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

struct EchoEngine;

#[async_trait]
impl AgentEngine for EchoEngine {
    async fn create_session(&self) -> anyhow::Result<Session> {
        Ok(Session { id: "echo".into() })
    }

    async fn send(
        &self,
        _ctx: &CancellationToken,
        _session_id: &str,
        messages: Vec<Message>,
    ) -> anyhow::Result<ResponseStream> {
        let text = messages.into_iter().map(|m| m.content).collect::<Vec<_>>().join(" ");
        let chunks = vec![
            Ok(Response { content: String::new() }),
            Ok(Response { content: format!("echo: {text}") }),
        ];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

async fn scheduler_with(schedules: Vec<Schedule>) -> (harness::ScriptDir, Arc<MemoryScheduleStore>, Scheduler) {
    let dir = harness::script_dir(&[
        ("hello", r#"let result = "hello from script";"#),
        ("world", r#"fn main() { "hello world" }"#),
    ])
    .await;
    let store = Arc::new(MemoryScheduleStore::seeded(schedules).await.unwrap());
    let scheduler = Scheduler::new(store.clone(), dir.runner.clone(), SchedulerConfig::default());
    (dir, store, scheduler)
}

#[tokio::test]
async fn approved_script_job_records_its_output() {
    let (_dir, store, scheduler) =
        scheduler_with(vec![Schedule::script("greeting", "0 8 * * *", "hello").with_id("g")]).await;
    scheduler.run_now("g").await.unwrap().await.unwrap();

    let record = store.get("g").await.unwrap().unwrap();
    assert_eq!(record.last_run_status, Some(RunStatus::Success));
    assert_eq!(record.last_run_output.as_deref(), Some("hello from script"));
}

#[tokio::test]
async fn successful_output_is_delivered_exactly_once() {
    let (_dir, store, scheduler) = scheduler_with(vec![
        Schedule::script("world", "0 8 * * *", "world")
            .with_id("w")
            .deliver_to("slack", "C0"),
    ])
    .await;
    let outbox = Arc::new(Outbox::default());
    scheduler.set_chat(outbox.clone());

    let schedule = store.get("w").await.unwrap().unwrap();
    let outcome = scheduler.execute_job(schedule).await;
    assert_eq!(outcome.status, RunStatus::Success);

    let messages = outbox.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("hello world"));
}

#[tokio::test]
async fn agent_job_without_engine_fails_descriptively() {
    let (_dir, store, scheduler) =
        scheduler_with(vec![Schedule::agent("brief", "@daily", "status?").with_id("a")]).await;
    scheduler.run_now("a").await.unwrap().await.unwrap();

    let record = store.get("a").await.unwrap().unwrap();
    assert_eq!(record.last_run_status, Some(RunStatus::Error));
    assert!(!record.last_run_error.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn engine_wired_after_construction_is_used() {
    let (_dir, store, scheduler) =
        scheduler_with(vec![Schedule::agent("brief", "@daily", "status?").with_id("a")]).await;
    scheduler.set_engine(Arc::new(EchoEngine));
    scheduler.run_now("a").await.unwrap().await.unwrap();

    let record = store.get("a").await.unwrap().unwrap();
    assert_eq!(record.last_run_status, Some(RunStatus::Success));
    assert_eq!(record.last_run_output.as_deref(), Some("echo: status?"));
}

#[tokio::test]
async fn run_once_disables_after_one_execution() {
    let (_dir, store, scheduler) = scheduler_with(vec![
        Schedule::script("once", "0 8 * * *", "hello").with_id("ok").run_once(),
        Schedule::script("once-bad", "0 8 * * *", "missing").with_id("bad").run_once(),
    ])
    .await;
    scheduler.start().await.unwrap();

    for id in ["ok", "bad"] {
        scheduler.run_now(id).await.unwrap().await.unwrap();
        let record = store.get(id).await.unwrap().expect("record kept");
        assert!(!record.enabled, "{id} still enabled");
        assert!(record.last_run_status.is_some());
    }
    assert!(scheduler.registered_ids().is_empty());
    assert_eq!(store.list().await.unwrap().len(), 2);
    scheduler.stop();
}
