use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse a crontab expression into a schedule.
///
/// Five fields are standard crontab and get a leading `0` seconds field; six
/// or seven fields are passed through. `@hourly`, `@daily`, `@weekly`,
/// `@monthly`, `@yearly` and `@annually` are accepted as well.
pub fn parse(expression: &str) -> Result<CronSchedule, SchedulerError> {
    let normalized = normalize_expression(expression)?;
    CronSchedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

pub fn next_run_for(expression: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
    parse(expression)?
        .after(&from)
        .next()
        .ok_or_else(|| SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            reason: "no future occurrence".to_string(),
        })
}

fn normalize_expression(expression: &str) -> Result<String, SchedulerError> {
    let expression = expression.trim();
    if expression.starts_with('@') {
        return Ok(expression.to_string());
    }
    let field_count = expression.split_whitespace().count();

    match field_count {
        // standard crontab syntax: minute hour day month weekday
        5 => Ok(format!("0 {expression}")),
        // crate-native syntax includes seconds (+ optional year)
        6 | 7 => Ok(expression.to_string()),
        _ => Err(SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            reason: format!("expected 5, 6, or 7 fields, got {field_count}"),
        }),
    }
}
