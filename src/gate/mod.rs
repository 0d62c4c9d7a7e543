//! Gates a run must pass: human approval, unit test coverage and org
//! quota.

pub mod approval;
pub mod coverage;
pub mod limits;

pub use approval::{
    authorize, ApprovalDecision, ApprovalOutcome, ApprovalRequest, ApprovalSource, PromptApproval,
    StoreApproval, Verdict,
};
pub use coverage::{check_coverage, parse_coverage, read_coverage};
pub use limits::{breaches, parse_limits, OrgLimit};
