use crate::error::ApprovalError;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Decides whether a script file may run. Approval state and its UI live
/// outside this crate; the scheduler and CLI only ask the question.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// `script_file` is the file name, e.g. `report.rhai`.
    async fn can_execute(&self, script_file: &str) -> Result<(), ApprovalError>;
}

/// Approves exactly the listed script files.
#[derive(Debug, Clone, Default)]
pub struct AllowListApproval {
    approved: BTreeSet<String>,
}

impl AllowListApproval {
    pub fn new<I, S>(approved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            approved: approved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn approve(&mut self, script_file: impl Into<String>) {
        self.approved.insert(script_file.into());
    }

    pub fn revoke(&mut self, script_file: &str) -> bool {
        self.approved.remove(script_file)
    }
}

#[async_trait]
impl ApprovalGate for AllowListApproval {
    async fn can_execute(&self, script_file: &str) -> Result<(), ApprovalError> {
        if self.approved.contains(script_file) {
            Ok(())
        } else {
            Err(ApprovalError::Denied {
                script: script_file.to_string(),
            })
        }
    }
}

/// Approves everything. Development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllApproval;

#[async_trait]
impl ApprovalGate for AllowAllApproval {
    async fn can_execute(&self, _script_file: &str) -> Result<(), ApprovalError> {
        Ok(())
    }
}
