//! Unit of work: one transactional scope per handler invocation.

use std::sync::Arc;

use domain::{Capec, Cve, Cwe, Device, Event, Manufacturer, Patch, User};
use store::{Session, Store, StoreError};

use crate::error::RepositoryError;
use crate::repository::{Repository, RepositoryState};

/// Owns one repository per aggregate type and opens transactional scopes.
///
/// Each call to [`UnitOfWork::begin`] opens a fresh store session and resets
/// every repository. The tracked aggregates outlive the scope, so
/// [`UnitOfWork::collect_new_events`] still sees them after it has closed;
/// events not yet collected when the next scope opens are kept for it.
pub struct UnitOfWork {
    store: Arc<dyn Store>,
    users: RepositoryState<User>,
    manufacturers: RepositoryState<Manufacturer>,
    devices: RepositoryState<Device>,
    patches: RepositoryState<Patch>,
    cves: RepositoryState<Cve>,
    cwes: RepositoryState<Cwe>,
    capecs: RepositoryState<Capec>,
    pending: Vec<Event>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            users: RepositoryState::new(),
            manufacturers: RepositoryState::new(),
            devices: RepositoryState::new(),
            patches: RepositoryState::new(),
            cves: RepositoryState::new(),
            cwes: RepositoryState::new(),
            capecs: RepositoryState::new(),
            pending: Vec::new(),
        }
    }

    /// Opens a new scope with its own session.
    ///
    /// The scope rolls back unless [`UnitOfWorkScope::commit`] succeeds.
    pub async fn begin(&mut self) -> Result<UnitOfWorkScope<'_>, StoreError> {
        let session = self.store.begin().await?;

        let mut pending = std::mem::take(&mut self.pending);
        self.drain_tracked_into(&mut pending);
        self.pending = pending;

        self.users = RepositoryState::new();
        self.manufacturers = RepositoryState::new();
        self.devices = RepositoryState::new();
        self.patches = RepositoryState::new();
        self.cves = RepositoryState::new();
        self.cwes = RepositoryState::new();
        self.capecs = RepositoryState::new();

        tracing::debug!("unit of work opened");
        Ok(UnitOfWorkScope {
            uow: self,
            session,
            committed: false,
            closed: false,
        })
    }

    /// Drains the pending events of every aggregate touched since the last
    /// call, earlier scopes first.
    ///
    /// Within a scope, repositories are visited in a fixed order (users,
    /// manufacturers, devices, patches, cves, cwes, capecs) and aggregates in
    /// the order they were tracked. Each event is returned once; a second call returns
    /// nothing new.
    pub fn collect_new_events(&mut self) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.pending);
        self.drain_tracked_into(&mut events);
        events
    }

    fn drain_tracked_into(&mut self, events: &mut Vec<Event>) {
        self.users.drain_events_into(events);
        self.manufacturers.drain_events_into(events);
        self.devices.drain_events_into(events);
        self.patches.drain_events_into(events);
        self.cves.drain_events_into(events);
        self.cwes.drain_events_into(events);
        self.capecs.drain_events_into(events);
    }
}

/// An open transactional scope.
///
/// Dropping the scope without committing rolls it back.
pub struct UnitOfWorkScope<'a> {
    uow: &'a mut UnitOfWork,
    session: Box<dyn Session>,
    committed: bool,
    closed: bool,
}

impl UnitOfWorkScope<'_> {
    pub fn users(&mut self) -> Repository<'_, User> {
        Repository::new(&mut self.uow.users, self.session.as_mut())
    }

    pub fn manufacturers(&mut self) -> Repository<'_, Manufacturer> {
        Repository::new(&mut self.uow.manufacturers, self.session.as_mut())
    }

    pub fn devices(&mut self) -> Repository<'_, Device> {
        Repository::new(&mut self.uow.devices, self.session.as_mut())
    }

    pub fn patches(&mut self) -> Repository<'_, Patch> {
        Repository::new(&mut self.uow.patches, self.session.as_mut())
    }

    pub fn cves(&mut self) -> Repository<'_, Cve> {
        Repository::new(&mut self.uow.cves, self.session.as_mut())
    }

    pub fn cwes(&mut self) -> Repository<'_, Cwe> {
        Repository::new(&mut self.uow.cwes, self.session.as_mut())
    }

    pub fn capecs(&mut self) -> Repository<'_, Capec> {
        Repository::new(&mut self.uow.capecs, self.session.as_mut())
    }

    /// Flushes every repository and commits the session.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&mut self) -> Result<(), RepositoryError> {
        let session = self.session.as_mut();
        self.uow.users.flush(&mut *session).await?;
        self.uow.manufacturers.flush(&mut *session).await?;
        self.uow.devices.flush(&mut *session).await?;
        self.uow.patches.flush(&mut *session).await?;
        self.uow.cves.flush(&mut *session).await?;
        self.uow.cwes.flush(&mut *session).await?;
        self.uow.capecs.flush(&mut *session).await?;
        session.commit().await?;

        self.committed = true;
        metrics::counter!("unit_of_work_commits_total").increment(1);
        tracing::debug!("unit of work committed");
        Ok(())
    }

    /// Returns whether [`commit`](Self::commit) succeeded.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Closes the scope, rolling back if it was not committed.
    pub async fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        if !self.committed {
            record_rollback();
        }
        self.session.close().await
    }
}

impl Drop for UnitOfWorkScope<'_> {
    fn drop(&mut self) {
        // Dropping the session discards its transaction.
        if !self.closed && !self.committed {
            record_rollback();
        }
    }
}

fn record_rollback() {
    metrics::counter!("unit_of_work_rollbacks_total").increment(1);
    tracing::debug!("unit of work rolled back");
}
