//! In-memory agent directory, mailbox and process monitor.

use crate::dispatch::domain::{AgentRecord, MailMessage, MessageId};
use crate::dispatch::ports::{
    AgentDirectory, AgentDirectoryError, AgentDirectoryResult, Mailbox, MailboxError,
    MailboxResult, ProcessMonitor,
};
use crate::task::domain::{AgentName, TeamName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

fn directory_lock_error(err: impl std::fmt::Display) -> AgentDirectoryError {
    AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
}

fn mailbox_lock_error(err: impl std::fmt::Display) -> MailboxError {
    MailboxError::persistence(std::io::Error::other(err.to_string()))
}

type AgentKey = (TeamName, AgentName);

/// Thread-safe in-memory agent directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentDirectory {
    state: Arc<RwLock<BTreeMap<AgentKey, AgentRecord>>>,
}

impl InMemoryAgentDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDirectoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn register(&self, agent: AgentRecord) -> AgentDirectoryResult<()> {
        let mut agents = self.state.write().map_err(directory_lock_error)?;
        agents.insert((agent.team().clone(), agent.name().clone()), agent);
        Ok(())
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn list(&self, team: &TeamName) -> AgentDirectoryResult<Vec<AgentRecord>> {
        let agents = self.state.read().map_err(directory_lock_error)?;
        Ok(agents
            .values()
            .filter(|agent| agent.team() == team)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        team: &TeamName,
        name: &AgentName,
    ) -> AgentDirectoryResult<Option<AgentRecord>> {
        let agents = self.state.read().map_err(directory_lock_error)?;
        Ok(agents.get(&(team.clone(), name.clone())).cloned())
    }

    async fn mark_busy(
        &self,
        team: &TeamName,
        name: &AgentName,
        pid: u32,
        since: DateTime<Utc>,
    ) -> AgentDirectoryResult<()> {
        let mut agents = self.state.write().map_err(directory_lock_error)?;
        let agent = agents
            .get_mut(&(team.clone(), name.clone()))
            .ok_or_else(|| AgentDirectoryError::NotFound(name.clone()))?;
        agent.mark_busy(pid, since);
        Ok(())
    }

    async fn mark_idle(&self, team: &TeamName, name: &AgentName) -> AgentDirectoryResult<()> {
        let mut agents = self.state.write().map_err(directory_lock_error)?;
        let agent = agents
            .get_mut(&(team.clone(), name.clone()))
            .ok_or_else(|| AgentDirectoryError::NotFound(name.clone()))?;
        agent.mark_idle();
        Ok(())
    }
}

/// Thread-safe in-memory mailbox.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailbox {
    state: Arc<RwLock<Vec<MailMessage>>>,
}

impl InMemoryMailbox {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message ever delivered, in delivery order.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Persistence`] when the lock is poisoned.
    pub fn messages(&self) -> MailboxResult<Vec<MailMessage>> {
        let messages = self.state.read().map_err(mailbox_lock_error)?;
        Ok(messages.clone())
    }

    fn stamp(
        &self,
        ids: &[MessageId],
        apply: impl Fn(&mut MailMessage),
    ) -> MailboxResult<()> {
        let mut messages = self.state.write().map_err(mailbox_lock_error)?;
        messages
            .iter_mut()
            .filter(|message| ids.contains(&message.id()))
            .for_each(apply);
        Ok(())
    }
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn has_unread(&self, agent: &AgentName) -> MailboxResult<bool> {
        let messages = self.state.read().map_err(mailbox_lock_error)?;
        Ok(messages
            .iter()
            .any(|message| message.recipient() == agent && message.is_unprocessed()))
    }

    async fn unprocessed(&self, agent: &AgentName) -> MailboxResult<Vec<MailMessage>> {
        let messages = self.state.read().map_err(mailbox_lock_error)?;
        Ok(messages
            .iter()
            .filter(|message| message.recipient() == agent && message.is_unprocessed())
            .cloned()
            .collect())
    }

    async fn deliver(&self, message: MailMessage) -> MailboxResult<()> {
        let mut messages = self.state.write().map_err(mailbox_lock_error)?;
        messages.push(message);
        Ok(())
    }

    async fn mark_seen(&self, ids: &[MessageId], at: DateTime<Utc>) -> MailboxResult<()> {
        self.stamp(ids, |message| message.mark_seen(at))
    }

    async fn mark_processed(&self, ids: &[MessageId], at: DateTime<Utc>) -> MailboxResult<()> {
        self.stamp(ids, |message| message.mark_processed(at))
    }
}

/// Process monitor over an explicit set of live PIDs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessMonitor {
    alive: Arc<RwLock<HashSet<u32>>>,
}

impl InMemoryProcessMonitor {
    /// Creates a monitor that reports every PID dead.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pid` alive.
    pub fn start(&self, pid: u32) {
        self.alive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid);
    }

    /// Marks `pid` dead.
    pub fn stop(&self, pid: u32) {
        self.alive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
    }
}

impl ProcessMonitor for InMemoryProcessMonitor {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&pid)
    }
}
