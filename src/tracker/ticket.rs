//! Ticket ids and the transitions applied after a deploy.

use regex::Regex;

use crate::config::TicketStates;
use crate::environment::Environment;
use crate::error::{PromoteError, Result};

/// Compile the configured ticket pattern.
pub fn ticket_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PromoteError::ConfigValidationError {
        message: format!("tracker.ticket_pattern is not a valid regex: {}", e),
    })
}

/// First ticket id in a commit message.
pub fn extract_ticket(message: &str, pattern: &Regex) -> Option<String> {
    pattern.find(message).map(|m| m.as_str().to_string())
}

/// A transition plus comment to post on a ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketUpdate {
    pub ticket: String,
    pub environment: Environment,
    pub state: String,
    pub comment: String,
}

impl TicketUpdate {
    /// Update moving `ticket` to the state configured for `environment`.
    pub fn new(
        ticket: &str,
        environment: Environment,
        states: &TicketStates,
        run_id: &str,
        log_link: &str,
    ) -> Self {
        Self {
            ticket: ticket.to_string(),
            environment,
            state: states.for_environment(environment).to_string(),
            comment: format!(
                "Deployed to {} by sfpromote run {}. Logs: {}",
                environment, run_id, log_link
            ),
        }
    }
}
