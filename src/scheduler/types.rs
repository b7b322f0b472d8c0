use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Script,
    Agent,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Where a job's output is posted after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub provider: String,
    #[serde(rename = "channelID")]
    pub channel_id: String,
}

/// One persisted schedule record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub cron_expr: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub run_once: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_target: Option<OutputTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl Schedule {
    pub fn script(name: impl Into<String>, cron_expr: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            script_name: Some(script.into()),
            ..Self::blank(name.into(), cron_expr.into(), JobType::Script)
        }
    }

    pub fn agent(name: impl Into<String>, cron_expr: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::blank(name.into(), cron_expr.into(), JobType::Agent)
        }
    }

    fn blank(name: String, cron_expr: String, job_type: JobType) -> Self {
        Self {
            id: String::new(),
            name,
            cron_expr,
            job_type,
            enabled: true,
            run_once: false,
            script_name: None,
            prompt: None,
            output_target: None,
            last_run_status: None,
            last_run_error: None,
            last_run_output: None,
            last_run_at: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn run_once(mut self) -> Self {
        self.run_once = true;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn deliver_to(mut self, provider: impl Into<String>, channel_id: impl Into<String>) -> Self {
        self.output_target = Some(OutputTarget {
            provider: provider.into(),
            channel_id: channel_id.into(),
        });
        self
    }

    pub fn record(&mut self, outcome: &RunOutcome) {
        self.last_run_status = Some(outcome.status);
        self.last_run_error = outcome.error.clone();
        self.last_run_output = Some(outcome.output.clone());
        self.last_run_at = Some(outcome.at);
    }
}

/// Result of one job run, as written back to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub error: Option<String>,
    pub output: String,
    pub at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn success(output: String) -> Self {
        Self {
            status: RunStatus::Success,
            error: None,
            output,
            at: Utc::now(),
        }
    }

    pub fn failure(error: String, output: String) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(error),
            output,
            at: Utc::now(),
        }
    }
}
