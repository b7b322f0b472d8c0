use chrono::Utc;
use cron::Schedule as CronSchedule;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fired on each occurrence. Must not block; it spawns the job.
pub(crate) type Trigger = Arc<dyn Fn() + Send + Sync>;

struct CronEntry {
    schedule: CronSchedule,
    trigger: Trigger,
    token: Option<CancellationToken>,
}

impl CronEntry {
    fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

/// Registered cron entries, one sleeping task per entry while running.
#[derive(Default)]
pub(crate) struct CronRunner {
    entries: HashMap<String, CronEntry>,
    running: Option<CancellationToken>,
}

impl CronRunner {
    /// Register `id`, replacing any previous entry so an id never fires twice.
    pub(crate) fn add(&mut self, id: &str, schedule: CronSchedule, trigger: Trigger) {
        self.remove(id);
        let mut entry = CronEntry {
            schedule,
            trigger,
            token: None,
        };
        if let Some(root) = &self.running {
            entry.token = Some(spawn_entry(id, &entry, root));
        }
        self.entries.insert(id.to_string(), entry);
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(mut entry) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.cancel();
        }
        self.entries.clear();
    }

    pub(crate) fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let root = CancellationToken::new();
        for (id, entry) in &mut self.entries {
            entry.token = Some(spawn_entry(id, entry, &root));
        }
        self.running = Some(root);
    }

    /// Stop firing. Jobs already spawned keep running.
    pub(crate) fn stop(&mut self) {
        if let Some(root) = self.running.take() {
            root.cancel();
        }
        for entry in self.entries.values_mut() {
            entry.token = None;
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn spawn_entry(id: &str, entry: &CronEntry, root: &CancellationToken) -> CancellationToken {
    let token = root.child_token();
    let cancelled = token.clone();
    let schedule = entry.schedule.clone();
    let trigger = Arc::clone(&entry.trigger);
    let id = id.to_string();

    tokio::spawn(async move {
        let mut after = Utc::now();
        loop {
            let Some(next) = schedule.after(&after).next() else {
                tracing::debug!(job_id = %id, "no further occurrences");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                () = cancelled.cancelled() => break,
                () = tokio::time::sleep(wait) => {
                    tracing::debug!(job_id = %id, scheduled_for = %next, "cron entry fired");
                    trigger();
                    after = next.max(Utc::now());
                }
            }
        }
    });

    token
}
