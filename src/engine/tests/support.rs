//! In-memory coordinator wiring shared by engine and dispatch tests.

use crate::audit::{
    adapters::memory::{InMemoryEventLog, InMemoryNotifier},
    domain::AuditEventKind,
    services::AuditTrail,
};
use crate::config::CoordinatorConfig;
use crate::dispatch::adapters::memory::InMemoryAgentDirectory;
use crate::dispatch::domain::{AgentRecord, AgentRole};
use crate::engine::domain::TransitionRequest;
use crate::engine::hooks::{HookSet, StageServices};
use crate::engine::services::TransitionEngine;
use crate::merge::adapters::memory::{InMemoryGit, ScriptedTestRunner};
use crate::merge::services::MergePipeline;
use crate::task::adapters::memory::InMemoryTaskRepository;
use crate::task::domain::{AgentName, BranchName, RepoName, Task, TeamName};
use crate::task::ports::TaskRepository;
use crate::task::services::{CreateTaskRequest, TaskLifecycleService};
use crate::workflow::domain::{StageKey, WorkflowVersion};
use crate::workflow::services::{STANDARD_WORKFLOW, WorkflowRegistry, register_standard};
use crate::workspace::adapters::{DirectoryLayout, GitWorktreeManager};
use camino::Utf8PathBuf;
use mockable::DefaultClock;
use std::sync::Arc;

pub(crate) const ROOT: &str = "/srv/atelier";
pub(crate) const HUMAN: &str = "alice";
pub(crate) const WORKERS: [&str; 2] = ["worker-a", "worker-b"];
pub(crate) const REVIEWER: &str = "reviewer-r";

pub(crate) fn stage(key: &str) -> StageKey {
    StageKey::new(key).expect("valid stage key")
}

pub(crate) fn agent(name: &str) -> AgentName {
    AgentName::new(name).expect("valid agent name")
}

/// A coordinator wired entirely from in-memory adapters.
pub(crate) struct Coordinator {
    pub(crate) team: TeamName,
    pub(crate) main: BranchName,
    pub(crate) layout: DirectoryLayout,
    pub(crate) git: InMemoryGit,
    pub(crate) tests: ScriptedTestRunner,
    pub(crate) tasks: InMemoryTaskRepository,
    pub(crate) agents: InMemoryAgentDirectory,
    pub(crate) log: InMemoryEventLog,
    pub(crate) notifier: InMemoryNotifier,
    pub(crate) registry: WorkflowRegistry,
    pub(crate) lifecycle: TaskLifecycleService<InMemoryTaskRepository, DefaultClock>,
    pub(crate) engine: TransitionEngine<DefaultClock>,
    pub(crate) config: Arc<CoordinatorConfig>,
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Self::with_hooks(HookSet::standard())
    }

    pub(crate) fn with_hooks(hooks: HookSet) -> Self {
        let team = TeamName::new("platform").expect("valid team");
        let main = BranchName::new("main").expect("valid branch");
        let layout = DirectoryLayout::new(Utf8PathBuf::from(ROOT));
        let git = InMemoryGit::new();
        for name in ["api", "web"] {
            let repo = layout.repository_path(&team, &RepoName::new(name).expect("valid repo"));
            git.init_repository(&repo, &main);
        }

        let agents = InMemoryAgentDirectory::new();
        agents
            .register(AgentRecord::new(agent(HUMAN), team.clone(), AgentRole::Human))
            .expect("register human");
        for worker in WORKERS {
            agents
                .register(AgentRecord::new(agent(worker), team.clone(), AgentRole::Worker))
                .expect("register worker");
        }
        agents
            .register(AgentRecord::new(agent(REVIEWER), team.clone(), AgentRole::Reviewer))
            .expect("register reviewer");

        let registry = WorkflowRegistry::new();
        register_standard(&registry, WorkflowVersion::new(1).expect("valid version"))
            .expect("standard workflow should register");

        let log = InMemoryEventLog::new();
        let notifier = InMemoryNotifier::new();
        let audit = AuditTrail::new(
            Arc::new(log.clone()),
            Arc::new(notifier.clone()),
            Arc::new(DefaultClock),
        );
        let config = Arc::new(CoordinatorConfig::new(
            team.clone(),
            Utf8PathBuf::from(ROOT),
            agent(HUMAN),
        ));
        let tasks = InMemoryTaskRepository::new();
        let tests = ScriptedTestRunner::new();
        let merge = MergePipeline::new(
            Arc::new(git.clone()),
            Arc::new(tests.clone()),
            Arc::new(layout.clone()),
            Arc::clone(&config),
        );
        let services = StageServices {
            agents: Arc::new(agents.clone()),
            tasks: Arc::new(tasks.clone()),
            worktrees: Arc::new(GitWorktreeManager::new(layout.clone(), Arc::new(git.clone()))),
            git: Arc::new(git.clone()),
            resolver: Arc::new(layout.clone()),
            merge,
            audit: audit.clone(),
            config: Arc::clone(&config),
        };
        let engine = TransitionEngine::new(
            registry.clone(),
            hooks,
            Arc::new(services),
            Arc::new(DefaultClock),
        );
        let lifecycle = TaskLifecycleService::new(
            Arc::new(tasks.clone()),
            registry.clone(),
            audit,
            Arc::new(DefaultClock),
        );

        Self {
            team,
            main,
            layout,
            git,
            tests,
            tasks,
            agents,
            log,
            notifier,
            registry,
            lifecycle,
            engine,
            config,
        }
    }

    pub(crate) fn repo_path(&self, name: &str) -> Utf8PathBuf {
        self.layout
            .repository_path(&self.team, &RepoName::new(name).expect("valid repo"))
    }

    pub(crate) async fn create(&self, request: CreateTaskRequest) -> Task {
        self.lifecycle
            .create(request)
            .await
            .expect("task should be created")
    }

    pub(crate) async fn create_task(&self, repos: &[&str]) -> Task {
        self.create(CreateTaskRequest::new(
            self.team.as_str(),
            "Add health endpoint",
            STANDARD_WORKFLOW,
            repos.iter().map(|name| (*name).to_owned()),
        ))
        .await
    }

    pub(crate) async fn reload(&self, task: &Task) -> Task {
        self.tasks
            .find_by_id(task.id())
            .await
            .expect("lookup should succeed")
            .expect("task should exist")
    }

    pub(crate) async fn move_to(&self, task: &Task, target: &str) -> Task {
        self.engine
            .transition(TransitionRequest::new(task.id(), stage(target)))
            .await
            .expect("transition should succeed")
            .into_task()
    }

    /// Adds a commit on the task's feature branch in every repository.
    pub(crate) fn commit_work(&self, task: &Task) {
        for binding in task.repositories() {
            self.git
                .commit(
                    &self.repo_path(binding.repository().as_str()),
                    binding.branch(),
                )
                .expect("commit should succeed");
        }
    }

    /// Creates a task and drives it to the merge stage with one commit per
    /// repository.
    pub(crate) async fn task_ready_to_merge(&self, repos: &[&str]) -> Task {
        let task = self.create_task(repos).await;
        let in_progress = self.move_to(&task, "in_progress").await;
        self.commit_work(&in_progress);
        let in_review = self.move_to(&in_progress, "in_review").await;
        self.move_to(&in_review, "merging").await
    }

    pub(crate) fn audit_kinds(&self) -> Vec<AuditEventKind> {
        self.log
            .events()
            .expect("events should be readable")
            .iter()
            .map(crate::audit::domain::AuditEvent::kind)
            .collect()
    }

    pub(crate) fn notification_count(&self) -> usize {
        self.notifier.sent().expect("notifications readable").len()
    }
}
