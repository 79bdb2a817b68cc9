//! Compiled, immutable workflow graph.

use super::{
    Stage, StageDefinition, StageKey, StageKind, WorkflowName, WorkflowRef,
    WorkflowValidationError, WorkflowVersion,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// A validated, versioned workflow graph.
///
/// Built only through [`WorkflowDef::compile`]; once constructed it is never
/// mutated. Invariants held by every instance:
///
/// - at least one terminal stage exists;
/// - every non-terminal stage has at least one outgoing transition;
/// - every transition target is a key of the stage map;
/// - stage keys are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDef {
    name: WorkflowName,
    version: WorkflowVersion,
    order: Vec<StageKey>,
    stage_map: BTreeMap<StageKey, Stage>,
    transitions: BTreeMap<StageKey, BTreeSet<StageKey>>,
    initial: StageKey,
    terminals: BTreeSet<StageKey>,
    error_stage: Option<StageKey>,
    digest: String,
}

impl WorkflowDef {
    /// Validates stage definitions and compiles them into a workflow graph.
    ///
    /// Stages without explicit transitions receive the synthesized default:
    /// the next stage in declared order plus every terminal stage.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError`] when the definitions violate any
    /// structural rule (empty list, duplicate keys, missing labels, no
    /// terminal stage, dangling or missing transitions, flag conflicts).
    pub fn compile(
        name: WorkflowName,
        version: WorkflowVersion,
        definitions: &[StageDefinition],
    ) -> Result<Self, WorkflowValidationError> {
        let first = definitions
            .first()
            .ok_or(WorkflowValidationError::EmptyStageList)?;

        let mut order = Vec::with_capacity(definitions.len());
        let mut stage_map = BTreeMap::new();
        for definition in definitions {
            if definition.label.trim().is_empty() {
                return Err(WorkflowValidationError::MissingLabel(definition.key.clone()));
            }
            if stage_map.contains_key(&definition.key) {
                return Err(WorkflowValidationError::DuplicateStageKey(
                    definition.key.clone(),
                ));
            }
            stage_map.insert(definition.key.clone(), Stage::from_definition(definition));
            order.push(definition.key.clone());
        }

        let terminals: BTreeSet<StageKey> = definitions
            .iter()
            .filter(|definition| definition.terminal)
            .map(|definition| definition.key.clone())
            .collect();
        if terminals.is_empty() {
            return Err(WorkflowValidationError::NoTerminalStage);
        }
        if first.terminal {
            return Err(WorkflowValidationError::TerminalInitialStage(first.key.clone()));
        }

        for definition in definitions {
            check_flags(definition)?;
        }

        let mut transitions = BTreeMap::new();
        for (index, definition) in definitions.iter().enumerate() {
            let targets = if definition.terminal {
                BTreeSet::new()
            } else {
                let next = definitions.get(index + 1).map(|next| &next.key);
                resolve_targets(definition, next, &terminals, &stage_map)?
            };
            transitions.insert(definition.key.clone(), targets);
        }

        let error_stage = definitions
            .iter()
            .find(|definition| definition.kind == StageKind::Error)
            .map(|definition| definition.key.clone());
        let digest = compute_digest(&name, version, &order, &stage_map, &transitions);

        Ok(Self {
            name,
            version,
            order,
            stage_map,
            transitions,
            initial: first.key.clone(),
            terminals,
            error_stage,
            digest,
        })
    }

    /// Returns the workflow name.
    #[must_use]
    pub const fn name(&self) -> &WorkflowName {
        &self.name
    }

    /// Returns the workflow version.
    #[must_use]
    pub const fn version(&self) -> WorkflowVersion {
        self.version
    }

    /// Returns the (name, version) reference tasks pin to.
    #[must_use]
    pub fn workflow_ref(&self) -> WorkflowRef {
        WorkflowRef::new(self.name.clone(), self.version)
    }

    /// Returns stages in declared order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.order.iter().filter_map(|key| self.stage_map.get(key))
    }

    /// Looks up a stage by key.
    #[must_use]
    pub fn stage(&self, key: &StageKey) -> Option<&Stage> {
        self.stage_map.get(key)
    }

    /// Returns `true` when the key names a stage of this workflow.
    #[must_use]
    pub fn contains(&self, key: &StageKey) -> bool {
        self.stage_map.contains_key(key)
    }

    /// Returns the allowed next stages for `key`.
    #[must_use]
    pub fn transitions_from(&self, key: &StageKey) -> Option<&BTreeSet<StageKey>> {
        self.transitions.get(key)
    }

    /// Returns `true` when `from → to` is an edge of the graph.
    #[must_use]
    pub fn allows(&self, from: &StageKey, to: &StageKey) -> bool {
        self.transitions
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Returns the stage new tasks start in.
    #[must_use]
    pub const fn initial_stage(&self) -> &StageKey {
        &self.initial
    }

    /// Returns the set of terminal stage keys.
    #[must_use]
    pub const fn terminal_stages(&self) -> &BTreeSet<StageKey> {
        &self.terminals
    }

    /// Returns `true` when `key` is a terminal stage.
    #[must_use]
    pub fn is_terminal(&self, key: &StageKey) -> bool {
        self.terminals.contains(key)
    }

    /// Returns `true` when `key` is a scheduler-driven stage.
    #[must_use]
    pub fn is_auto(&self, key: &StageKey) -> bool {
        self.stage_map.get(key).is_some_and(Stage::is_auto)
    }

    /// Returns the stage ActionErrors are routed to, if the workflow has one.
    #[must_use]
    pub const fn error_stage(&self) -> Option<&StageKey> {
        self.error_stage.as_ref()
    }

    /// Returns the first stage, in declared order, with the given kind.
    #[must_use]
    pub fn first_stage_of_kind(&self, kind: StageKind) -> Option<&Stage> {
        self.stages().find(|stage| stage.kind() == kind)
    }

    /// Returns the hex-encoded SHA-256 digest of the compiled graph.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn check_flags(definition: &StageDefinition) -> Result<(), WorkflowValidationError> {
    if definition.terminal {
        let declares_targets = definition
            .transitions
            .as_ref()
            .is_some_and(|targets| !targets.is_empty());
        if declares_targets {
            return Err(WorkflowValidationError::TerminalWithTransitions(
                definition.key.clone(),
            ));
        }
        if definition.auto {
            return Err(WorkflowValidationError::TerminalAuto(definition.key.clone()));
        }
    }
    if definition.auto && !definition.kind.has_action() {
        return Err(WorkflowValidationError::AutoWithoutAction {
            stage: definition.key.clone(),
            kind: definition.kind,
        });
    }
    Ok(())
}

fn resolve_targets(
    definition: &StageDefinition,
    next: Option<&StageKey>,
    terminals: &BTreeSet<StageKey>,
    stage_map: &BTreeMap<StageKey, Stage>,
) -> Result<BTreeSet<StageKey>, WorkflowValidationError> {
    let targets: BTreeSet<StageKey> = match &definition.transitions {
        Some(explicit) => {
            if explicit.contains(&definition.key) {
                return Err(WorkflowValidationError::SelfTransition(
                    definition.key.clone(),
                ));
            }
            explicit.iter().cloned().collect()
        }
        None => next
            .into_iter()
            .chain(terminals.iter())
            .filter(|key| **key != definition.key)
            .cloned()
            .collect(),
    };

    if let Some(missing) = targets.iter().find(|target| !stage_map.contains_key(*target)) {
        return Err(WorkflowValidationError::UnknownTransitionTarget {
            from: definition.key.clone(),
            to: missing.clone(),
        });
    }
    if targets.is_empty() {
        return Err(WorkflowValidationError::NoTransitions(definition.key.clone()));
    }
    Ok(targets)
}

fn compute_digest(
    name: &WorkflowName,
    version: WorkflowVersion,
    order: &[StageKey],
    stage_map: &BTreeMap<StageKey, Stage>,
    transitions: &BTreeMap<StageKey, BTreeSet<StageKey>>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_str().as_bytes());
    hasher.update(version.to_string().as_bytes());
    for stage in order.iter().filter_map(|key| stage_map.get(key)) {
        hasher.update(b"\x1fstage\x1f");
        hasher.update(stage.key().as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(stage.label().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(stage.kind().as_str().as_bytes());
        hasher.update([u8::from(stage.is_terminal()), u8::from(stage.is_auto())]);
        for target in transitions.get(stage.key()).into_iter().flatten() {
            hasher.update(b"\x1e");
            hasher.update(target.as_str().as_bytes());
        }
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
