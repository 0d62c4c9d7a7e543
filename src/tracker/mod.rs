//! Tracking ticket updates after a deploy.
//!
//! The ticket id comes from the latest commit message; the target state
//! depends on the environment that was deployed.

pub mod client;
pub mod ticket;

pub use client::{tracker_from_config, HttpTracker, LogTracker, TicketTracker};
pub use ticket::{extract_ticket, ticket_regex, TicketUpdate};
