use scriptcron::scheduler::{MemoryScheduleStore, Schedule, ScheduleStore, Scheduler, SchedulerConfig};
use std::sync::Arc;

use crate::harness;

async fn scheduler(schedules: Vec<Schedule>) -> (harness::ScriptDir, Arc<MemoryScheduleStore>, Scheduler) {
    let dir = harness::script_dir(&[("noop", "let result = ();")]).await;
    let store = Arc::new(MemoryScheduleStore::seeded(schedules).await.unwrap());
    let scheduler = Scheduler::new(store.clone(), dir.runner.clone(), SchedulerConfig::default());
    (dir, store, scheduler)
}

#[tokio::test]
async fn disabled_schedules_are_never_registered() {
    let (_dir, store, scheduler) = scheduler(vec![
        Schedule::script("a", "*/5 * * * *", "noop").with_id("a"),
        Schedule::script("b", "*/5 * * * *", "noop").with_id("b").disabled(),
        Schedule::agent("c", "@weekly", "p").with_id("c").disabled(),
    ])
    .await;

    scheduler.start().await.unwrap();
    assert_eq!(scheduler.registered_ids(), ["a"]);

    let mut a = store.get("a").await.unwrap().unwrap();
    a.enabled = false;
    store.update(a).await.unwrap();
    scheduler.reload().await.unwrap();
    assert!(scheduler.registered_ids().is_empty());

    scheduler.stop();
}

#[tokio::test]
async fn deleted_schedules_drop_out_on_reload() {
    let (_dir, store, scheduler) = scheduler(vec![
        Schedule::script("a", "*/5 * * * *", "noop").with_id("a"),
        Schedule::script("b", "0 0 1 1 *", "noop").with_id("b"),
    ])
    .await;
    scheduler.start().await.unwrap();
    store.delete("a").await.unwrap();

    assert_eq!(scheduler.reload().await.unwrap(), 1);
    assert_eq!(scheduler.registered_ids(), ["b"]);
    scheduler.stop();
}

#[tokio::test]
async fn generated_ids_are_registered() {
    let (_dir, store, scheduler) = scheduler(vec![Schedule::script("anon", "@hourly", "noop")]).await;
    scheduler.start().await.unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].id.is_empty());
    assert_eq!(scheduler.registered_ids(), [records[0].id.clone()]);
    scheduler.stop();
}
