//! Org authentication.
//!
//! Secrets never touch disk beyond a private file that lives for the
//! duration of one login command.

pub mod credentials;
pub mod session;

pub use credentials::{credential_for, read_secret, remove_credential_file, write_credential_file};
pub use session::{LoginTarget, OrgSession};
