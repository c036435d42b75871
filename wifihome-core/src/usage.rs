//! Reconciles the persisted tracking flag with the live tracker and applies start/stop.

use crate::error::CoreError;
use crate::model::SnapshotState;
use crate::services::{Storage, Tracker};

/// Make the persisted flag match the live tracker, which is ground truth.
/// Saves only when a correction was made; returns whether it was.
pub fn reconcile(
    state: &mut SnapshotState,
    tracker: &dyn Tracker,
    storage: &mut dyn Storage,
) -> Result<bool, CoreError> {
    let live = tracker.is_tracking()?;
    if state.is_tracking() == live {
        return Ok(false);
    }
    let snapshot = state.get_or_default();
    snapshot.is_tracking = live;
    storage.save_usage_data(snapshot)?;
    tracing::info!(tracking = live, "persisted tracking flag corrected from tracker");
    Ok(true)
}

/// Flip tracking: stop if tracking, start otherwise. Persists the new flag.
/// An unloaded snapshot is loaded from storage first (or defaulted).
///
/// Not transactional: a failure after commanding the tracker leaves the flag
/// stale until the next [`reconcile`].
pub fn toggle(
    state: &mut SnapshotState,
    tracker: &mut dyn Tracker,
    storage: &mut dyn Storage,
) -> Result<bool, CoreError> {
    if let SnapshotState::Uninitialized = state {
        *state = SnapshotState::from_option(storage.load_usage_data()?);
    }
    let snapshot = state.get_or_default();
    if snapshot.is_tracking {
        tracker.stop_tracking()?;
        snapshot.is_tracking = false;
    } else {
        tracker.start_tracking()?;
        snapshot.is_tracking = true;
    }
    storage.save_usage_data(snapshot)?;
    tracing::info!(tracking = snapshot.is_tracking, "tracking toggled");
    Ok(snapshot.is_tracking)
}
