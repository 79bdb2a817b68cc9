//! Coordinator wiring shared by integration tests.

use atelier::audit::adapters::memory::{InMemoryEventLog, InMemoryNotifier};
use atelier::audit::domain::AuditEventKind;
use atelier::audit::services::AuditTrail;
use atelier::config::CoordinatorConfig;
use atelier::dispatch::adapters::memory::InMemoryAgentDirectory;
use atelier::dispatch::domain::{AgentRecord, AgentRole};
use atelier::engine::domain::TransitionRequest;
use atelier::engine::hooks::{HookSet, StageServices};
use atelier::engine::services::TransitionEngine;
use atelier::merge::adapters::memory::{InMemoryGit, ScriptedTestRunner};
use atelier::merge::ports::{GitOps, TestRunner};
use atelier::merge::services::MergePipeline;
use atelier::task::adapters::memory::InMemoryTaskRepository;
use atelier::task::domain::{AgentName, BranchName, RepoName, Task, TaskId, TeamName};
use atelier::task::ports::TaskRepository;
use atelier::task::services::{CreateTaskRequest, TaskLifecycleService};
use atelier::workflow::domain::{StageKey, WorkflowVersion};
use atelier::workflow::services::{STANDARD_WORKFLOW, WorkflowRegistry, register_standard};
use atelier::workspace::adapters::{DirectoryLayout, GitWorktreeManager};
use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result, WrapErr, eyre};
use mockable::DefaultClock;
use std::sync::Arc;

/// Team every test coordinator serves.
pub const TEAM: &str = "platform";
/// The human escalation contact.
pub const HUMAN: &str = "alice";
/// Worker agents, in name order.
pub const WORKERS: [&str; 2] = ["worker-a", "worker-b"];
/// The reviewer agent.
pub const REVIEWER: &str = "reviewer-r";

/// Parses an agent name used by a test.
pub fn agent(name: &str) -> Result<AgentName> {
    AgentName::new(name).wrap_err_with(|| format!("invalid agent name {name}"))
}

/// Parses a stage key used by a test.
pub fn stage(key: &str) -> Result<StageKey> {
    StageKey::new(key).wrap_err_with(|| format!("invalid stage key {key}"))
}

/// A coordinator over in-memory storage with pluggable git and tests.
pub struct Coordinator {
    /// Served team.
    pub team: TeamName,
    /// Repository and worktree paths.
    pub layout: DirectoryLayout,
    /// Task storage.
    pub tasks: InMemoryTaskRepository,
    /// Registered agents.
    pub agents: InMemoryAgentDirectory,
    /// Recorded audit events.
    pub log: InMemoryEventLog,
    /// Delivered notifications.
    pub notifier: InMemoryNotifier,
    /// Audit trail shared by every service.
    pub audit: AuditTrail,
    /// Task creation.
    pub lifecycle: TaskLifecycleService<InMemoryTaskRepository, DefaultClock>,
    /// Transition engine over the standard workflow.
    pub engine: Arc<TransitionEngine<DefaultClock>>,
    /// Coordinator settings.
    pub config: Arc<CoordinatorConfig>,
}

impl Coordinator {
    /// Wires a coordinator rooted at `root`.
    pub fn new(
        root: Utf8PathBuf,
        git: Arc<dyn GitOps>,
        tests: Arc<dyn TestRunner>,
    ) -> Result<Self> {
        let team = TeamName::new(TEAM)?;
        let layout = DirectoryLayout::new(root.clone());

        let agents = InMemoryAgentDirectory::new();
        agents.register(AgentRecord::new(agent(HUMAN)?, team.clone(), AgentRole::Human))?;
        for worker in WORKERS {
            agents.register(AgentRecord::new(agent(worker)?, team.clone(), AgentRole::Worker))?;
        }
        agents.register(AgentRecord::new(agent(REVIEWER)?, team.clone(), AgentRole::Reviewer))?;

        let registry = WorkflowRegistry::new();
        register_standard(&registry, WorkflowVersion::new(1)?)?;

        let log = InMemoryEventLog::new();
        let notifier = InMemoryNotifier::new();
        let audit = AuditTrail::new(
            Arc::new(log.clone()),
            Arc::new(notifier.clone()),
            Arc::new(DefaultClock),
        );
        let config = Arc::new(CoordinatorConfig::new(team.clone(), root, agent(HUMAN)?));
        let tasks = InMemoryTaskRepository::new();
        let merge = MergePipeline::new(
            Arc::clone(&git),
            tests,
            Arc::new(layout.clone()),
            Arc::clone(&config),
        );
        let services = StageServices {
            agents: Arc::new(agents.clone()),
            tasks: Arc::new(tasks.clone()),
            worktrees: Arc::new(GitWorktreeManager::new(layout.clone(), Arc::clone(&git))),
            git,
            resolver: Arc::new(layout.clone()),
            merge,
            audit: audit.clone(),
            config: Arc::clone(&config),
        };
        let engine = TransitionEngine::new(
            registry.clone(),
            HookSet::standard(),
            Arc::new(services),
            Arc::new(DefaultClock),
        );
        let lifecycle = TaskLifecycleService::new(
            Arc::new(tasks.clone()),
            registry,
            audit.clone(),
            Arc::new(DefaultClock),
        );

        Ok(Self {
            team,
            layout,
            tasks,
            agents,
            log,
            notifier,
            audit,
            lifecycle,
            engine: Arc::new(engine),
            config,
        })
    }

    /// Wires a coordinator over an in-memory git with `api` and `web`
    /// repositories on `main`.
    pub fn in_memory() -> Result<(Self, InMemoryGit, ScriptedTestRunner)> {
        let git = InMemoryGit::new();
        let tests = ScriptedTestRunner::new();
        let coordinator = Self::new(
            Utf8PathBuf::from("/srv/atelier"),
            Arc::new(git.clone()),
            Arc::new(tests.clone()),
        )?;
        let main = BranchName::new("main")?;
        for name in ["api", "web"] {
            git.init_repository(&coordinator.repo_path(name)?, &main);
        }
        Ok((coordinator, git, tests))
    }

    /// Returns the checkout path of a repository.
    pub fn repo_path(&self, name: &str) -> Result<Utf8PathBuf> {
        Ok(self.layout.repository_path(&self.team, &RepoName::new(name)?))
    }

    /// Returns the worktree path of a task's repository.
    pub fn worktree_path(&self, name: &str, task_id: TaskId) -> Result<Utf8PathBuf> {
        Ok(self.layout.worktree_path(&self.team, &RepoName::new(name)?, task_id))
    }

    /// Creates a task in the standard workflow.
    pub async fn create_task(&self, repos: &[&str]) -> Result<Task> {
        let request = CreateTaskRequest::new(
            TEAM,
            "Add health endpoint",
            STANDARD_WORKFLOW,
            repos.iter().map(|name| (*name).to_owned()),
        );
        Ok(self.lifecycle.create(request).await?)
    }

    /// Moves a task through the engine.
    pub async fn move_to(&self, task_id: TaskId, target: &str) -> Result<Task> {
        let outcome = self
            .engine
            .transition(TransitionRequest::new(task_id, stage(target)?))
            .await
            .wrap_err_with(|| format!("transition to {target}"))?;
        Ok(outcome.into_task())
    }

    /// Loads the stored task.
    pub async fn reload(&self, task_id: TaskId) -> Result<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| eyre!("task {task_id} not found"))
    }

    /// Returns the kinds of every recorded audit event.
    pub fn audit_kinds(&self) -> Result<Vec<AuditEventKind>> {
        Ok(self.log.events()?.iter().map(|event| event.kind()).collect())
    }

    /// Returns the number of notifications sent.
    pub fn notification_count(&self) -> Result<usize> {
        Ok(self.notifier.sent()?.len())
    }
}

/// Adds a commit on each of the task's feature branches.
pub fn commit_work(coordinator: &Coordinator, git: &InMemoryGit, task: &Task) -> Result<()> {
    for binding in task.repositories() {
        let repo: &Utf8Path = &coordinator.repo_path(binding.repository().as_str())?;
        git.commit(repo, binding.branch())?;
    }
    Ok(())
}
