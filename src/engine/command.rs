//! Uniform shape for every optimistic mutation: apply locally, commit to the
//! record server, roll back on failure.

use async_trait::async_trait;

use crate::{
    client::AnnouncementApi,
    domain::Announcement,
    engine::working_set::WorkingSet,
    error::Result,
    sync::OutboundHint,
};

/// What `apply` decided.
#[derive(Debug)]
pub enum Applied<T> {
    /// Local state changed; commit must follow.
    Proceed,
    /// Nothing to send. The command is finished with this output.
    Done(T),
}

#[async_trait]
pub trait Command: Send + Sync {
    type Output: Send;

    /// Optimistic mutation. Runs under the store's write lock, so it sees
    /// every earlier command's optimistic state.
    fn apply(&mut self, working: &mut WorkingSet) -> Result<Applied<Self::Output>>;

    /// The network write. Runs without any lock held.
    async fn commit(&self, api: &dyn AnnouncementApi) -> Result<Option<Announcement>>;

    /// Undo exactly what `apply` did.
    fn rollback(&self, working: &mut WorkingSet);

    /// Local bookkeeping after a successful commit, before the server's copy
    /// is merged.
    fn committed(&self, _working: &mut WorkingSet) {}

    /// Output reported after a successful commit.
    fn settled(&self) -> Self::Output;

    fn hints(&self) -> Vec<OutboundHint> {
        Vec::new()
    }
}
