//! Social relationship and messaging authorization engine.
//!
//! Every operation takes the acting user explicitly; there is no ambient
//! session. Operations are synchronous and talk to the store directly, so
//! async callers should run them on a blocking thread.

pub mod accounts;
pub mod conversation;
pub mod error;
pub mod follow;
pub mod gateway;
pub mod moderation;
pub mod posts;
pub mod relationship;

mod rows;

pub use error::{CoreError, CoreResult};

use mutuals_db::Database;
use mutuals_db::models::Toggled;
use tracing::warn;

/// A toggle that lost a race is retried this many times in total before the
/// conflict is reported.
const TOGGLE_ATTEMPTS: usize = 2;

pub struct Engine {
    db: Database,
}

impl Engine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

/// Runs a store toggle, retrying when it reports a lost race.
pub(crate) fn toggle_with_retry<F>(what: &str, mut toggle: F) -> CoreResult<Toggled>
where
    F: FnMut() -> anyhow::Result<Toggled>,
{
    for attempt in 1..=TOGGLE_ATTEMPTS {
        match toggle()? {
            Toggled::Raced => warn!("{} toggle lost a race (attempt {})", what, attempt),
            outcome => return Ok(outcome),
        }
    }
    Err(CoreError::Conflict(format!(
        "Concurrent {} update, please retry",
        what
    )))
}
