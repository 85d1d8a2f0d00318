//! crates/essay_core/src/optimistic.rs
//!
//! The canonical conflict-free write pattern for this core: apply a state
//! change locally on user intent, issue the persistence call, and on
//! failure apply the inverse change so the observable state equals what it
//! was before the action started. Status changes and annotation
//! resolution share this one helper instead of hand-rolling rollback at
//! each call site.

use std::future::Future;

use crate::ports::PortResult;

/// Applies `apply` to `state`, awaits `call`, and on failure restores the
/// prior state via `revert` before returning the error for the caller to
/// surface as a notice.
///
/// The remote future must be constructed before the call (it typically
/// borrows only an `Arc`'d store), so the local state is free to be
/// mutated while the request is in flight.
pub async fn optimistic_write<S, Fut>(
    state: &mut S,
    apply: impl FnOnce(&mut S),
    revert: impl FnOnce(&mut S),
    call: Fut,
) -> PortResult<()>
where
    Fut: Future<Output = PortResult<()>>,
{
    apply(state);
    match call.await {
        Ok(()) => Ok(()),
        Err(e) => {
            revert(state);
            Err(e)
        }
    }
}
