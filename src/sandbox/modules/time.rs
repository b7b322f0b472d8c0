use super::{ModuleContext, ScriptResult};
use chrono::{SecondsFormat, Utc};
use rhai::{FLOAT, INT, Module};
use std::time::Duration;

/// Upper bound for a single `time::sleep` call, whatever the script asks for.
pub const MAX_SLEEP: Duration = Duration::from_secs(5);

/// `time::now`, `time::unix`, `time::sleep`.
pub fn module(ctx: &ModuleContext) -> Module {
    let mut module = Module::new();

    module.set_native_fn("now", || -> ScriptResult<String> { Ok(now()) });
    module.set_native_fn("unix", || -> ScriptResult<INT> { Ok(Utc::now().timestamp()) });

    let int_ctx = ctx.clone();
    module.set_native_fn("sleep", move |seconds: INT| -> ScriptResult<()> {
        #[allow(clippy::cast_precision_loss)]
        int_ctx.sleep(capped_sleep(seconds as FLOAT));
        Ok(())
    });
    let float_ctx = ctx.clone();
    module.set_native_fn("sleep", move |seconds: FLOAT| -> ScriptResult<()> {
        float_ctx.sleep(capped_sleep(seconds));
        Ok(())
    });

    module
}

/// Current UTC wall-clock time in RFC 3339 with second precision.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn capped_sleep(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds)
        .unwrap_or(MAX_SLEEP)
        .min(MAX_SLEEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_is_capped_at_five_seconds() {
        assert_eq!(capped_sleep(3600.0), MAX_SLEEP);
        assert_eq!(capped_sleep(1e300), MAX_SLEEP);
        assert_eq!(capped_sleep(0.25), Duration::from_millis(250));
    }

    #[test]
    fn negative_and_nan_sleep_are_zero() {
        assert_eq!(capped_sleep(-1.0), Duration::ZERO);
        assert_eq!(capped_sleep(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn now_is_rfc3339_utc() {
        let stamp = now();
        assert!(stamp.ends_with('Z'), "{stamp}");
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
