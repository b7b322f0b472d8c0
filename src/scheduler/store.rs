use super::types::Schedule;
use anyhow::{Result, bail};
use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

/// Persistence for schedule records. Implementations live outside this crate;
/// [`MemoryScheduleStore`] is the in-process reference.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Schedule>>;
    async fn get(&self, id: &str) -> Result<Option<Schedule>>;
    /// Stores a new record, assigning an id when it has none.
    async fn create(&self, schedule: Schedule) -> Result<Schedule>;
    async fn update(&self, schedule: Schedule) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    records: RwLock<IndexMap<String, Schedule>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `schedules`, in order.
    pub async fn seeded(schedules: impl IntoIterator<Item = Schedule>) -> Result<Self> {
        let store = Self::new();
        for schedule in schedules {
            store.create(schedule).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn list(&self) -> Result<Vec<Schedule>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Schedule>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn create(&self, mut schedule: Schedule) -> Result<Schedule> {
        if schedule.id.is_empty() {
            schedule.id = uuid::Uuid::new_v4().to_string();
        }
        let mut records = self.records.write().await;
        if records.contains_key(&schedule.id) {
            bail!("schedule {} already exists", schedule.id);
        }
        records.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn update(&self, schedule: Schedule) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&schedule.id) {
            Some(existing) => {
                *existing = schedule;
                Ok(())
            }
            None => bail!("schedule {} not found", schedule.id),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.shift_remove(id).is_some())
    }
}
