//! Query dispatch: blocking gets and asynchronous interest registration.
//!
//! The dispatcher issues interests on behalf of its callers. A blocking
//! [`QueryDispatcher::get`] waits up to a timeout for one matching fragment.
//! An expressed interest stays pending until cancelled or until its listener
//! stops asking: each batch of results is handed to the listener, and the
//! interest the listener returns (usually the same query with a grown
//! exclusion filter) is re-issued in place of the old one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netobject_core::{Fragment, Interest};

use crate::error::Result;

/// Identifies one expressed interest for later cancellation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterestId(pub u64);

impl fmt::Debug for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterestId({})", self.0)
    }
}

impl fmt::Display for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receives result batches for an expressed interest.
#[async_trait]
pub trait ContentListener: Send + Sync {
    /// Handle a batch of fragments that matched `interest`.
    ///
    /// Returning `Some` re-issues the returned interest under the same id;
    /// returning `None` retires the registration.
    async fn handle_content(
        &self,
        id: InterestId,
        results: Vec<Fragment>,
        interest: &Interest,
    ) -> Option<Interest>;
}

/// Issues interests and delivers their results.
#[async_trait]
pub trait QueryDispatcher: Send + Sync {
    /// Fetch one fragment matching `interest`, waiting up to `timeout`.
    ///
    /// A timeout is not an error: it yields `Ok(None)`.
    async fn get(&self, interest: &Interest, timeout: Duration) -> Result<Option<Fragment>>;

    /// Register an interest and return immediately.
    ///
    /// The listener is never invoked before this call returns.
    fn express_interest(
        &self,
        interest: Interest,
        listener: Arc<dyn ContentListener>,
    ) -> Result<InterestId>;

    /// Withdraw an interest. Returns whether it was still pending.
    fn cancel_interest(&self, id: InterestId) -> bool;
}
