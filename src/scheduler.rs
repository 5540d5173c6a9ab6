//! Narrow interface to an external batch scheduler, used to defer a restore
//! while a glacier retrieval is pending (§4.10). Out of core: froster never
//! talks to a scheduler directly, only through this trait.

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(pub String);

pub trait JobScheduler: Send + Sync {
    /// Submit `command` to run later and return an opaque job id.
    fn submit(&self, command: &str) -> Result<JobId>;
}
