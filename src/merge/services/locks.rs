//! Per-repository merge serialization.

use crate::task::domain::{RepoName, TeamName};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<(TeamName, RepoName), Arc<AsyncMutex<()>>>;

/// One async lock per (team, repository).
///
/// Locks for several repositories are always taken in name order, so two
/// multi-repository merges cannot deadlock.
#[derive(Debug, Clone, Default)]
pub struct RepositoryLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held repository locks; dropping releases them.
#[derive(Debug)]
pub struct RepositoryGuards {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RepositoryLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for every lock of `repositories` in sorted order.
    pub async fn acquire<'a>(
        &self,
        team: &TeamName,
        repositories: impl IntoIterator<Item = &'a RepoName>,
    ) -> RepositoryGuards {
        let ordered: BTreeSet<&RepoName> = repositories.into_iter().collect();
        let handles: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            ordered
                .into_iter()
                .map(|repository| {
                    Arc::clone(
                        table
                            .entry((team.clone(), repository.clone()))
                            .or_default(),
                    )
                })
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        RepositoryGuards { _guards: guards }
    }
}
