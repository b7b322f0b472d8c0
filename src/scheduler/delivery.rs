use super::types::{RunOutcome, RunStatus};

/// Output beyond this many characters is cut to fit common chat message limits.
pub const MAX_OUTPUT_CHARS: usize = 1800;

/// Status line plus a fenced block of (possibly truncated) output.
pub fn format_message(schedule_name: &str, outcome: &RunOutcome) -> String {
    let status = match outcome.status {
        RunStatus::Success => format!("Schedule \"{schedule_name}\" completed"),
        RunStatus::Error => format!(
            "Schedule \"{schedule_name}\" failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    };
    format!("{status}\n```\n{}\n```", truncate(&outcome.output))
}

fn truncate(output: &str) -> String {
    match output.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((cut, _)) => format!("{}\n... (truncated)", &output[..cut]),
        None => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_fenced_verbatim() {
        let message = format_message("digest", &RunOutcome::success("hello world".into()));
        assert_eq!(message, "Schedule \"digest\" completed\n```\nhello world\n```");
    }

    #[test]
    fn long_output_is_truncated_on_char_boundary() {
        let output = "é".repeat(MAX_OUTPUT_CHARS + 50);
        let message = format_message("big", &RunOutcome::success(output));
        let body = message
            .split("```\n")
            .nth(1)
            .unwrap()
            .trim_end_matches("\n```");
        assert!(body.ends_with("... (truncated)"));
        assert_eq!(body.chars().filter(|c| *c == 'é').count(), MAX_OUTPUT_CHARS);
    }

    #[test]
    fn failure_status_line_carries_error() {
        let outcome = RunOutcome::failure("boom".into(), "partial".into());
        assert!(format_message("x", &outcome).starts_with("Schedule \"x\" failed: boom\n"));
    }
}
