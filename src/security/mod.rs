pub mod approval;
pub mod redact;
pub mod secrets;
pub mod url_validation;

pub use approval::{AllowAllApproval, AllowListApproval, ApprovalGate};
pub use redact::{MIN_SECRET_LEN, Redactor};
pub use secrets::SecretProvider;
pub use url_validation::validate_script_url;
