//! Cron-driven job scheduler.
//!
//! Registrations mirror enabled schedule records one to one. Each firing
//! spawns [`Scheduler::execute_job`], which runs a script through the
//! [`ScriptRunner`] or a prompt through the [`AgentEngine`], writes the
//! outcome back to the store, disables run-once jobs, and posts the output to
//! chat when a target is set.

pub mod collaborators;
pub mod delivery;
pub mod expression;
mod runner;
pub mod store;
pub mod types;

pub use collaborators::{AgentEngine, ChatSender, Message, Response, ResponseStream, Role, Session};
pub use store::{MemoryScheduleStore, ScheduleStore};
pub use types::{JobType, OutputTarget, RunOutcome, RunStatus, Schedule};

use crate::error::SchedulerError;
use crate::scripts::ScriptRunner;
use anyhow::Context;
use futures_util::{FutureExt, StreamExt};
use runner::{CronRunner, Trigger};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub script_timeout: Duration,
    pub agent_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            script_timeout: Duration::from_secs(5 * 60),
            agent_timeout: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Default, Clone)]
struct Collaborators {
    engine: Option<Arc<dyn AgentEngine>>,
    chat: Option<Arc<dyn ChatSender>>,
}

struct Inner {
    store: Arc<dyn ScheduleStore>,
    scripts: ScriptRunner,
    collaborators: RwLock<Collaborators>,
    runner: Mutex<CronRunner>,
    config: SchedulerConfig,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registered", &self.registered_ids())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(store: Arc<dyn ScheduleStore>, scripts: ScriptRunner, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                scripts,
                collaborators: RwLock::new(Collaborators::default()),
                runner: Mutex::new(CronRunner::default()),
                config,
            }),
        }
    }

    pub fn set_engine(&self, engine: Arc<dyn AgentEngine>) {
        self.inner
            .collaborators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .engine = Some(engine);
    }

    pub fn set_chat(&self, chat: Arc<dyn ChatSender>) {
        self.inner
            .collaborators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .chat = Some(chat);
    }

    fn collaborators(&self) -> Collaborators {
        self.inner
            .collaborators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_runner(&self) -> MutexGuard<'_, CronRunner> {
        self.inner
            .runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register every enabled record and start firing. Returns the number registered.
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        let registered = self.reload().await?;
        self.lock_runner().start();
        tracing::info!(registered, "scheduler started");
        Ok(registered)
    }

    /// Stop firing. Jobs already running are left to finish.
    pub fn stop(&self) {
        self.lock_runner().stop();
        tracing::info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_runner().is_running()
    }

    /// Drop every registration and rebuild from the store.
    pub async fn reload(&self) -> Result<usize, SchedulerError> {
        let records = self
            .inner
            .store
            .list()
            .await
            .map_err(|e| SchedulerError::Store(format!("{e:#}")))?;

        let mut runner = self.lock_runner();
        runner.clear();
        let mut registered = 0;
        for record in records.iter().filter(|r| r.enabled) {
            match self.add_cron_entry_locked(&mut runner, record) {
                Ok(()) => registered += 1,
                Err(e) => {
                    tracing::warn!(job_id = %record.id, name = %record.name, error = %e, "skipping schedule");
                }
            }
        }
        tracing::debug!(registered, total = records.len(), "schedules reloaded");
        Ok(registered)
    }

    /// Active registrations, sorted by id.
    pub fn registered_ids(&self) -> Vec<String> {
        self.lock_runner().ids()
    }

    /// Run a job now on its own task, whatever its enabled state. The cron
    /// registration is not touched.
    pub async fn run_now(&self, id: &str) -> Result<JoinHandle<()>, SchedulerError> {
        let schedule = self.fetch(id).await?;
        let scheduler = self.clone();
        Ok(tokio::spawn(async move {
            scheduler.execute_job(schedule).await;
        }))
    }

    pub async fn enable(&self, id: &str) -> Result<(), SchedulerError> {
        let mut schedule = self.fetch(id).await?;
        schedule.enabled = true;
        self.save(schedule.clone()).await?;
        let mut runner = self.lock_runner();
        self.add_cron_entry_locked(&mut runner, &schedule)
    }

    pub async fn disable(&self, id: &str) -> Result<(), SchedulerError> {
        let mut schedule = self.fetch(id).await?;
        schedule.enabled = false;
        self.save(schedule).await?;
        self.lock_runner().remove(id);
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Schedule, SchedulerError> {
        self.inner
            .store
            .get(id)
            .await
            .map_err(|e| SchedulerError::Store(format!("{e:#}")))?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    async fn save(&self, schedule: Schedule) -> Result<(), SchedulerError> {
        self.inner
            .store
            .update(schedule)
            .await
            .map_err(|e| SchedulerError::Store(format!("{e:#}")))
    }

    /// Register `schedule`, replacing any existing entry with the same id.
    fn add_cron_entry_locked(&self, runner: &mut CronRunner, schedule: &Schedule) -> Result<(), SchedulerError> {
        let cron = expression::parse(&schedule.cron_expr)?;
        let weak = Arc::downgrade(&self.inner);
        let snapshot = schedule.clone();
        let trigger: Trigger = Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let scheduler = Scheduler { inner };
            if snapshot.run_once {
                // Unregister before the run starts so a slow job cannot fire again.
                scheduler.lock_runner().remove(&snapshot.id);
                tracing::debug!(job_id = %snapshot.id, "run-once entry unregistered");
            }
            let job = snapshot.clone();
            tokio::spawn(async move {
                scheduler.execute_job(job).await;
            });
        });
        runner.add(&schedule.id, cron, trigger);
        Ok(())
    }

    /// Run one job to completion and record its outcome. Never panics outward.
    pub async fn execute_job(&self, schedule: Schedule) -> RunOutcome {
        let started = Instant::now();
        tracing::info!(job_id = %schedule.id, name = %schedule.name, kind = schedule.job_type.as_str(), "job started");

        let outcome = match AssertUnwindSafe(self.run_job(&schedule)).catch_unwind().await {
            Ok(Ok(output)) => RunOutcome::success(output),
            Ok(Err(e)) => RunOutcome::failure(self.sanitize(&format!("{e:#}")), String::new()),
            Err(payload) => RunOutcome::failure(
                self.sanitize(&format!("panic: {}", panic_message(payload.as_ref()))),
                String::new(),
            ),
        };

        if let Err(e) = self.persist(&schedule.id, &outcome).await {
            tracing::warn!(job_id = %schedule.id, error = %e, "failed to persist run outcome");
        }
        let fresh = self.auto_disable(&schedule.id).await;
        self.deliver(fresh.as_ref().unwrap_or(&schedule), &outcome).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome.error {
            None => tracing::info!(job_id = %schedule.id, elapsed_ms, "job succeeded"),
            Some(error) => tracing::warn!(job_id = %schedule.id, elapsed_ms, error = %error, "job failed"),
        }
        outcome
    }

    async fn run_job(&self, schedule: &Schedule) -> anyhow::Result<String> {
        match schedule.job_type {
            JobType::Script => self.run_script_job(schedule).await,
            JobType::Agent => self.run_agent_job(schedule).await,
        }
    }

    async fn run_script_job(&self, schedule: &Schedule) -> anyhow::Result<String> {
        let name = required(schedule, schedule.script_name.as_deref(), "scriptName")?;
        let timeout = self.inner.config.script_timeout;

        // Cancels the sandbox when this future is dropped by the timeout.
        let ctx = CancellationToken::new();
        let _guard = ctx.clone().drop_guard();

        let result = tokio::time::timeout(timeout, self.inner.scripts.run(&ctx, name, None, Vec::new()))
            .await
            .map_err(|_| SchedulerError::Timeout {
                kind: "script",
                secs: timeout.as_secs(),
            })??;

        match result.error {
            Some(error) => Err(anyhow::anyhow!(error)),
            None => Ok(result.output_text()),
        }
    }

    async fn run_agent_job(&self, schedule: &Schedule) -> anyhow::Result<String> {
        let prompt = required(schedule, schedule.prompt.as_deref(), "prompt")?;
        let engine = self
            .collaborators()
            .engine
            .ok_or(SchedulerError::EngineUnavailable)?;
        let timeout = self.inner.config.agent_timeout;

        let ctx = CancellationToken::new();
        let _guard = ctx.clone().drop_guard();

        let run = async {
            let session = engine
                .create_session()
                .await
                .context("failed to create agent session")?;
            let mut stream = engine
                .send(&ctx, &session.id, vec![Message::user(prompt)])
                .await
                .context("failed to send prompt")?;

            let mut last = String::new();
            while let Some(chunk) = stream.next().await {
                let response = chunk.context("agent response stream failed")?;
                if !response.content.is_empty() {
                    last = response.content;
                }
            }
            Ok::<_, anyhow::Error>(last)
        };

        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| SchedulerError::Timeout {
                kind: "agent",
                secs: timeout.as_secs(),
            })?
    }

    fn sanitize(&self, text: &str) -> String {
        self.inner.scripts.sandbox().secrets().sanitize_text(text)
    }

    async fn persist(&self, id: &str, outcome: &RunOutcome) -> Result<(), SchedulerError> {
        let mut record = self.fetch(id).await?;
        record.record(outcome);
        self.save(record).await
    }

    /// Re-read the record and disable it if it is a run-once job that is still enabled.
    async fn auto_disable(&self, id: &str) -> Option<Schedule> {
        let mut record = match self.fetch(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "could not re-read schedule after run");
                return None;
            }
        };
        if record.run_once && record.enabled {
            record.enabled = false;
            if let Err(e) = self.save(record.clone()).await {
                tracing::warn!(job_id = %id, error = %e, "failed to disable run-once schedule");
            }
            self.lock_runner().remove(id);
            tracing::info!(job_id = %id, "run-once schedule disabled");
        }
        Some(record)
    }

    async fn deliver(&self, schedule: &Schedule, outcome: &RunOutcome) {
        let Some(target) = &schedule.output_target else {
            return;
        };
        if outcome.output.is_empty() {
            return;
        }
        let Some(chat) = self.collaborators().chat else {
            tracing::warn!(job_id = %schedule.id, "output target set but no chat sender configured");
            return;
        };

        let message = delivery::format_message(&schedule.name, outcome);
        if let Err(e) = chat
            .send_via_provider(&target.provider, &target.channel_id, &message)
            .await
        {
            tracing::warn!(
                job_id = %schedule.id,
                provider = %target.provider,
                error = %e,
                "failed to deliver job output"
            );
        }
    }
}

fn required<'a>(schedule: &Schedule, value: Option<&'a str>, field: &'static str) -> Result<&'a str, SchedulerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SchedulerError::MissingField {
            id: schedule.id.clone(),
            field,
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
