//! Enter a profile and get back out again
//!
//! [`enter`] and [`restore`] are the two halves used by separate CLI
//! invocations. [`Session`] ties them together for a single scope and
//! restores on every exit path, including unwinding.

use crate::error::Result;
use crate::host::Host;
use crate::profile::{Profile, ProfileTuning};
use crate::snapshot::{Snapshot, SnapshotStore};
use tracing::{error, info, warn};

/// Record the current state, then apply `profile`.
///
/// Nothing is mutated unless the snapshot was captured and saved. If the
/// profile fails part-way the snapshot stays on disk for [`restore`].
pub fn enter(
    host: &Host,
    store: &SnapshotStore,
    profile: Profile,
    tuning: &ProfileTuning,
) -> Result<Snapshot> {
    let snapshot = record(host, store)?;
    profile.apply(host, tuning)?;
    Ok(snapshot)
}

/// Capture the host state and save it, without applying anything.
pub fn record(host: &Host, store: &SnapshotStore) -> Result<Snapshot> {
    let snapshot = Snapshot::capture(host)?;
    store.save(&snapshot)?;
    Ok(snapshot)
}

/// Put the host back into the recorded state and delete the snapshot.
///
/// Fails with `SnapshotMissing` before touching the host if there is no
/// snapshot. The file is kept when restoring fails so the operator can retry.
pub fn restore(host: &Host, store: &SnapshotStore) -> Result<Snapshot> {
    let snapshot = store.load()?;
    info!("restoring snapshot from {}", store.path().display());
    snapshot.restore(host)?;
    store.remove()?;
    Ok(snapshot)
}

/// A profile that is active for as long as this value lives.
pub struct Session<'a> {
    host: &'a Host,
    store: &'a SnapshotStore,
    profile: Profile,
    snapshot: Option<Snapshot>,
}

impl<'a> Session<'a> {
    /// Snapshot and apply `profile`. When applying fails the host is restored
    /// before the error is returned.
    pub fn enter(
        host: &'a Host,
        store: &'a SnapshotStore,
        profile: Profile,
        tuning: &ProfileTuning,
    ) -> Result<Self> {
        let snapshot = Snapshot::capture(host)?;
        store.save(&snapshot)?;

        let mut session = Self {
            host,
            store,
            profile,
            snapshot: Some(snapshot),
        };

        if let Err(e) = profile.apply(host, tuning) {
            warn!("entering {} failed, restoring: {}", profile, e);
            if let Err(restore_err) = session.close() {
                error!("restore after failed enter also failed: {}", restore_err);
            }
            return Err(e);
        }

        Ok(session)
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// The state that will be restored
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Restore now and report the outcome.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(());
        };
        snapshot.restore(self.host)?;
        self.store.remove()?;
        info!("{} environment left, original state restored", self.profile);
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            if let Err(e) = self.close() {
                error!(
                    "failed to restore host on scope exit: {} (snapshot kept at {})",
                    e,
                    self.store.path().display()
                );
            }
        }
    }
}
