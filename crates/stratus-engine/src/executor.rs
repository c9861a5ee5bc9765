//! Plan executor
//!
//! Applies a validated graph level-by-level: within a level nodes run
//! concurrently up to a bounded worker limit, resolving their references
//! against the outputs of already-applied producers. A node enters applying
//! only when every producer applied; nodes downstream of a failure are
//! blocked, never attempted. Between sibling nodes only concurrency, not
//! order, is guaranteed.
//!
//! State is written by exactly one writer: worker tasks hand their results
//! back through the join set and the executor folds them into the run state
//! between levels. Outputs land in a shared map exactly once per node.

use crate::error::{EngineError, Result};
use crate::facts::FactResolver;
use crate::graph::Graph;
use crate::reconcile;
use crate::template;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use stratus_cloud::{
    ActionKind, ApplyReport, GlobalState, NodeOutcome, Outputs, Plan, PlannedAction, Provider,
    ResourceRecord, SecretStore,
};
use stratus_core::{Reference, ResourceSpec, reference};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Placeholder recorded during planning for values only known after apply.
const COMPUTED: &str = "<computed>";

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Worker limit for intra-level parallelism
    pub parallelism: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

/// Drives reconciliation and application of a resource graph.
pub struct Executor {
    provider: Arc<dyn Provider>,
    secrets: Arc<dyn SecretStore>,
    facts: Arc<FactResolver>,
}

impl Executor {
    pub fn new(provider: Arc<dyn Provider>, secrets: Arc<dyn SecretStore>) -> Self {
        let facts = Arc::new(FactResolver::new(provider.clone()));
        Self {
            provider,
            secrets,
            facts,
        }
    }

    /// The run's fact resolver, shared so topology expansion and node
    /// resolution memoize the same fetches.
    pub fn facts(&self) -> &Arc<FactResolver> {
        &self.facts
    }

    /// Compute intended actions without applying anything.
    ///
    /// References resolve against outputs recorded in prior state; outputs
    /// of nodes that have never been applied show up as `<computed>`.
    /// Secrets stay symbolic, so planning needs no credentials.
    pub async fn plan(&self, graph: &Graph, state: &GlobalState) -> Result<Plan> {
        let mut actions = Vec::new();
        for id in graph.topo_order() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let facts = resolve_facts(&node.spec, &self.facts).await?;
            let lookup = OutputLookup::Prior(state);
            let (recorded, _) =
                substitute_properties(&node.spec.properties, &lookup, &facts, None, true)?;
            let hash = reconcile::spec_hash(&node.spec.resource_type, &recorded);
            let (kind, reason) =
                reconcile::decide(&node.spec.immutable, &recorded, &hash, state.resource(id));
            actions.push(PlannedAction {
                node_id: id.clone(),
                resource_type: node.spec.resource_type.clone(),
                kind,
                reason,
            });
        }

        // Resources that left the specification get an explicit teardown
        for (id, record) in &state.resources {
            if !graph.contains(id) {
                actions.push(PlannedAction {
                    node_id: id.clone(),
                    resource_type: record.resource_type.clone(),
                    kind: ActionKind::Delete,
                    reason: Some("removed from specification".to_string()),
                });
            }
        }

        Ok(Plan::new(actions))
    }

    /// Apply the graph, mutating `state` as nodes land.
    #[tracing::instrument(skip_all, fields(nodes = graph.len()))]
    pub async fn apply(
        &self,
        graph: &Graph,
        state: &mut GlobalState,
        options: &ExecutorOptions,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let started = Instant::now();
        let outputs: Arc<DashMap<String, Outputs>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
        let mut report = ApplyReport::new();
        // Nodes whose outputs will never exist this run, with the reason
        let mut unavailable: HashMap<String, String> = HashMap::new();

        for level in graph.levels() {
            let mut join_set: JoinSet<(String, Result<TaskSuccess>)> = JoinSet::new();

            for id in level {
                let Some(node) = graph.node(id) else {
                    continue;
                };

                if cancel.is_cancelled() {
                    let message = "run cancelled".to_string();
                    report.outcomes.push(NodeOutcome::blocked(
                        id,
                        &node.spec.resource_type,
                        message.clone(),
                    ));
                    unavailable.insert(id.clone(), message);
                    continue;
                }

                if let Some(dep) = node
                    .dependencies
                    .iter()
                    .find(|d| unavailable.contains_key(d.as_str()))
                {
                    let message = format!("dependency '{dep}' did not apply");
                    report.outcomes.push(NodeOutcome::blocked(
                        id,
                        &node.spec.resource_type,
                        message.clone(),
                    ));
                    unavailable.insert(id.clone(), message);
                    continue;
                }

                join_set.spawn(
                    NodeTask {
                        spec: node.spec.clone(),
                        prior: state.resource(id).cloned(),
                        provider: self.provider.clone(),
                        secrets: self.secrets.clone(),
                        facts: self.facts.clone(),
                        outputs: outputs.clone(),
                        semaphore: semaphore.clone(),
                        cancel: cancel.clone(),
                    }
                    .run(),
                );
            }

            while let Some(joined) = join_set.join_next().await {
                let (id, result) = joined.map_err(|join_err| EngineError::Apply {
                    node_id: "<worker>".to_string(),
                    message: format!("node task panicked: {join_err}"),
                })?;
                let resource_type = graph
                    .node(&id)
                    .map(|n| n.spec.resource_type.clone())
                    .unwrap_or_default();

                match result {
                    Ok(TaskSuccess::Applied {
                        action,
                        recorded,
                        hash,
                        outputs: node_outputs,
                    }) => {
                        let record = ResourceRecord::new(
                            &resource_type,
                            hash,
                            recorded,
                            node_outputs.clone(),
                        );
                        let record = match state.resource(&id) {
                            Some(prior) => record.updated_from(prior),
                            None => record,
                        };
                        state.set_resource(&id, record);
                        report.outcomes.push(NodeOutcome::applied(
                            &id,
                            &resource_type,
                            action,
                            node_outputs,
                        ));
                    }
                    Ok(TaskSuccess::Cancelled) => {
                        let message = "run cancelled".to_string();
                        report.outcomes.push(NodeOutcome::blocked(
                            &id,
                            &resource_type,
                            message.clone(),
                        ));
                        unavailable.insert(id, message);
                    }
                    Err(err) => {
                        warn!(node = %id, error = %err, "node failed to apply");
                        let message = err.to_string();
                        report.outcomes.push(NodeOutcome::failed(
                            &id,
                            &resource_type,
                            message.clone(),
                        ));
                        unavailable.insert(id, message);
                    }
                }
            }
        }

        self.delete_stale(graph, state, cancel, &mut report).await;

        report.cancelled = cancel.is_cancelled();
        report.duration_ms = started.elapsed().as_millis() as u64;
        debug!(summary = %report.summary(), "apply finished");
        Ok(report)
    }

    /// Tear down state entries whose node left the specification.
    async fn delete_stale(
        &self,
        graph: &Graph,
        state: &mut GlobalState,
        cancel: &CancellationToken,
        report: &mut ApplyReport,
    ) {
        let stale: Vec<String> = state
            .resources
            .keys()
            .filter(|id| !graph.contains(id))
            .cloned()
            .collect();

        for id in stale {
            if cancel.is_cancelled() {
                break;
            }
            let Some(record) = state.resource(&id).cloned() else {
                continue;
            };
            match self.provider.delete(&record.resource_type, &id).await {
                Ok(()) => {
                    state.remove_resource(&id);
                    report.outcomes.push(NodeOutcome::applied(
                        &id,
                        &record.resource_type,
                        ActionKind::Delete,
                        Outputs::new(),
                    ));
                }
                Err(err) => {
                    warn!(node = %id, error = %err, "teardown failed");
                    report.outcomes.push(NodeOutcome::failed(
                        &id,
                        &record.resource_type,
                        err.to_string(),
                    ));
                }
            }
        }
    }
}

enum TaskSuccess {
    Applied {
        action: ActionKind,
        recorded: Map<String, Value>,
        hash: String,
        outputs: Outputs,
    },
    Cancelled,
}

/// Bundled parameters for a single node application task.
struct NodeTask {
    spec: ResourceSpec,
    prior: Option<ResourceRecord>,
    provider: Arc<dyn Provider>,
    secrets: Arc<dyn SecretStore>,
    facts: Arc<FactResolver>,
    outputs: Arc<DashMap<String, Outputs>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl NodeTask {
    async fn run(self) -> (String, Result<TaskSuccess>) {
        let id = self.spec.id.clone();
        let result = self.execute().await;
        (id, result)
    }

    async fn execute(self) -> Result<TaskSuccess> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Apply {
                node_id: self.spec.id.clone(),
                message: "worker pool closed".to_string(),
            })?;

        if self.cancel.is_cancelled() {
            return Ok(TaskSuccess::Cancelled);
        }

        // Resolving: facts first, then reference substitution
        debug!(node = %self.spec.id, "resolving");
        let facts = resolve_facts(&self.spec, &self.facts).await?;
        let lookup = OutputLookup::Applied(&self.outputs);
        let (recorded, effective) = substitute_properties(
            &self.spec.properties,
            &lookup,
            &facts,
            Some(self.secrets.as_ref()),
            false,
        )?;

        // Applying: reconcile against prior state, call the provider
        let hash = reconcile::spec_hash(&self.spec.resource_type, &recorded);
        let (action, reason) =
            reconcile::decide(&self.spec.immutable, &recorded, &hash, self.prior.as_ref());
        debug!(node = %self.spec.id, action = %action, reason = ?reason, "reconciled");

        let apply_err = |e: stratus_cloud::CloudError| EngineError::Apply {
            node_id: self.spec.id.clone(),
            message: e.to_string(),
        };
        let ty = &self.spec.resource_type;
        let id = &self.spec.id;
        let node_outputs = match action {
            ActionKind::NoOp => self
                .prior
                .as_ref()
                .map(|p| p.outputs.clone())
                .unwrap_or_default(),
            ActionKind::Create => self
                .provider
                .create(ty, id, &effective)
                .await
                .map_err(apply_err)?,
            ActionKind::Update => self
                .provider
                .update(ty, id, &effective)
                .await
                .map_err(apply_err)?,
            ActionKind::Replace => self
                .provider
                .replace(ty, id, &effective)
                .await
                .map_err(apply_err)?,
            // Reconciliation of a declared node never yields Delete
            ActionKind::Delete => Outputs::new(),
        };

        // Write-once: each node inserts its own outputs exactly once
        self.outputs.insert(self.spec.id.clone(), node_outputs.clone());

        Ok(TaskSuccess::Applied {
            action,
            recorded,
            hash,
            outputs: node_outputs,
        })
    }
}

/// Where producer outputs come from during substitution.
enum OutputLookup<'a> {
    /// This run's applied outputs (apply phase)
    Applied(&'a DashMap<String, Outputs>),
    /// Outputs recorded in prior state (plan phase)
    Prior(&'a GlobalState),
}

impl OutputLookup<'_> {
    fn node_outputs(&self, id: &str) -> Option<Outputs> {
        match self {
            OutputLookup::Applied(map) => map.get(id).map(|entry| entry.value().clone()),
            OutputLookup::Prior(state) => state.resource(id).map(|r| r.outputs.clone()),
        }
    }
}

/// Resolve every fact a spec references, through the shared memoized resolver.
async fn resolve_facts(
    spec: &ResourceSpec,
    resolver: &FactResolver,
) -> Result<HashMap<String, Value>> {
    let mut keys = Vec::new();
    reference::scan_properties(&spec.properties, &mut |r| {
        if let Reference::Fact { key } = r {
            keys.push(key);
        }
    });

    let mut resolved = HashMap::new();
    for key in keys {
        let value = resolver.resolve(&key).await?;
        resolved.insert(key, value);
    }
    Ok(resolved)
}

/// Substitute references in a property mapping.
///
/// Returns `(recorded, effective)`: the recorded form keeps secrets
/// symbolic and is what gets hashed and persisted; the effective form is
/// what the provider receives. In lenient (planning) mode, outputs that do
/// not exist yet become `<computed>` instead of an error.
fn substitute_properties(
    properties: &Map<String, Value>,
    lookup: &OutputLookup<'_>,
    facts: &HashMap<String, Value>,
    secrets: Option<&dyn SecretStore>,
    lenient: bool,
) -> Result<(Map<String, Value>, Map<String, Value>)> {
    let mut recorded = Map::new();
    let mut effective = Map::new();
    for (key, value) in properties {
        let (r, e) = substitute_value(value, lookup, facts, secrets, lenient)?;
        recorded.insert(key.clone(), r);
        effective.insert(key.clone(), e);
    }
    Ok((recorded, effective))
}

fn substitute_value(
    value: &Value,
    lookup: &OutputLookup<'_>,
    facts: &HashMap<String, Value>,
    secrets: Option<&dyn SecretStore>,
    lenient: bool,
) -> Result<(Value, Value)> {
    match value {
        Value::String(s) => substitute_string(s, lookup, facts, secrets, lenient),
        Value::Array(items) => {
            let mut recorded = Vec::with_capacity(items.len());
            let mut effective = Vec::with_capacity(items.len());
            for item in items {
                let (r, e) = substitute_value(item, lookup, facts, secrets, lenient)?;
                recorded.push(r);
                effective.push(e);
            }
            Ok((Value::Array(recorded), Value::Array(effective)))
        }
        Value::Object(map) => {
            let mut recorded = Map::new();
            let mut effective = Map::new();
            for (key, item) in map {
                let (r, e) = substitute_value(item, lookup, facts, secrets, lenient)?;
                recorded.insert(key.clone(), r);
                effective.insert(key.clone(), e);
            }
            Ok((Value::Object(recorded), Value::Object(effective)))
        }
        other => Ok((other.clone(), other.clone())),
    }
}

fn substitute_string(
    s: &str,
    lookup: &OutputLookup<'_>,
    facts: &HashMap<String, Value>,
    secrets: Option<&dyn SecretStore>,
    lenient: bool,
) -> Result<(Value, Value)> {
    if let Some(parsed) = Reference::parse(s) {
        return match parsed {
            Reference::Output { node, output } => {
                let resolved = lookup
                    .node_outputs(&node)
                    .and_then(|outputs| outputs.get(&output).cloned());
                match resolved {
                    Some(v) => Ok((v.clone(), v)),
                    None if lenient => Ok((json!(COMPUTED), json!(COMPUTED))),
                    None => Err(EngineError::Reference { node, output }),
                }
            }
            Reference::Fact { key } => {
                let v = facts
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EngineError::Resolution {
                        key: key.clone(),
                        message: "fact was not resolved before substitution".to_string(),
                    })?;
                Ok((v.clone(), v))
            }
            Reference::Secret { name } => {
                let recorded = Value::String(s.to_string());
                let effective = match secrets {
                    Some(store) => Value::String(store.resolve(&name)?),
                    None => recorded.clone(),
                };
                Ok((recorded, effective))
            }
        };
    }

    if reference::is_template(s) {
        let mut nodes: BTreeMap<String, Outputs> = BTreeMap::new();
        for (node, _) in reference::template_refs(s) {
            if let Some(outputs) = lookup.node_outputs(&node) {
                nodes.insert(node, outputs);
            }
        }
        return match template::render(s, &nodes) {
            Ok(rendered) => Ok((Value::String(rendered.clone()), Value::String(rendered))),
            Err(EngineError::Reference { .. }) if lenient => {
                Ok((json!(COMPUTED), json!(COMPUTED)))
            }
            Err(err) => Err(err),
        };
    }

    Ok((Value::String(s.to_string()), Value::String(s.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_cloud::{MemoryProvider, NodeState, StaticSecretStore};
    use stratus_core::spec_from_yaml;

    fn executor(provider: Arc<MemoryProvider>) -> Executor {
        let secrets = Arc::new(StaticSecretStore::new().with_secret("db-password", "hunter2"));
        Executor::new(provider, secrets)
    }

    async fn apply(
        executor: &Executor,
        graph: &Graph,
        state: &mut GlobalState,
    ) -> ApplyReport {
        executor
            .apply(
                graph,
                state,
                &ExecutorOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    const LINEAR: &str = r#"
name: demo
resources:
  - id: vpc
    type: network
    properties: {cidr_block: 10.0.0.0/16}
    immutable: [cidr_block]
  - id: igw
    type: gateway
    properties: {network: "ref(vpc, id)"}
"#;

    #[tokio::test]
    async fn applies_in_dependency_order() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let report = apply(&executor, &graph, &mut state).await;
        assert!(report.is_clean());

        let calls = provider.apply_calls();
        assert_eq!(calls, vec!["create network:vpc", "create gateway:igw"]);

        // The consumer saw the producer's real output, not the reference
        let igw = state.resource("igw").unwrap();
        assert_eq!(igw.properties["network"], json!("mem-network-vpc"));
    }

    #[tokio::test]
    async fn reapply_unchanged_is_all_noop() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        let mut state = GlobalState::new();

        apply(&executor, &graph, &mut state).await;
        let calls_after_first = provider.apply_calls().len();

        let report = apply(&executor, &graph, &mut state).await;
        assert!(report.is_clean());
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.action == Some(ActionKind::NoOp)));
        assert_eq!(provider.apply_calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn failure_blocks_dependents_but_not_siblings() {
        let yaml = r#"
name: demo
resources:
  - id: db
    type: database
    properties: {engine: postgres}
  - id: app
    type: instance
    properties: {database: "ref(db, id)"}
  - id: worker
    type: instance
    properties: {database: "ref(db, id)"}
  - id: bucket
    type: storage
    properties: {}
"#;
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_on("database", "db");
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(yaml).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let report = apply(&executor, &graph, &mut state).await;
        assert!(!report.is_clean());
        assert!(report.is_partial());

        assert_eq!(report.outcome("db").unwrap().state, NodeState::Failed);
        assert_eq!(report.outcome("app").unwrap().state, NodeState::Blocked);
        assert_eq!(report.outcome("worker").unwrap().state, NodeState::Blocked);
        assert_eq!(report.outcome("bucket").unwrap().state, NodeState::Applied);

        // Blocked nodes were never attempted
        let calls = provider.apply_calls();
        assert!(!calls.iter().any(|c| c.contains("instance")));
    }

    #[tokio::test]
    async fn template_renders_from_applied_outputs() {
        let yaml = r##"
name: demo
resources:
  - id: db
    type: database
    properties: {engine: postgres}
  - id: web
    type: instance
    properties:
      user_data: "#!/bin/sh\nexport DB={{ nodes.db.endpoint }}\n"
"##;
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(yaml).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let report = apply(&executor, &graph, &mut state).await;
        assert!(report.is_clean());

        let web = state.resource("web").unwrap();
        assert_eq!(
            web.properties["user_data"],
            json!("#!/bin/sh\nexport DB=db.database.stratus.internal\n")
        );
    }

    #[tokio::test]
    async fn failed_fact_blocks_only_its_branch() {
        let yaml = r#"
name: demo
resources:
  - id: app
    type: instance
    properties: {image: "fact(latest_image)"}
  - id: alias
    type: dns-record
    properties: {target: "ref(app, id)"}
  - id: bucket
    type: storage
    properties: {}
"#;
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(yaml).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let report = apply(&executor, &graph, &mut state).await;
        assert_eq!(report.outcome("app").unwrap().state, NodeState::Failed);
        assert!(report
            .outcome("app")
            .unwrap()
            .error
            .as_ref()
            .unwrap()
            .contains("latest_image"));
        assert_eq!(report.outcome("alias").unwrap().state, NodeState::Blocked);
        assert_eq!(report.outcome("bucket").unwrap().state, NodeState::Applied);
    }

    #[tokio::test]
    async fn cancelled_run_blocks_everything_without_side_effects() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = executor
            .apply(&graph, &mut state, &ExecutorOptions::default(), &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.state == NodeState::Blocked));
        assert!(provider.apply_calls().is_empty());
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn update_and_replace_follow_property_mutability() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let mut state = GlobalState::new();

        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        apply(&executor, &graph, &mut state).await;

        // Mutable change on igw -> update
        let changed = LINEAR.replace(
            "properties: {network: \"ref(vpc, id)\"}",
            "properties: {network: \"ref(vpc, id)\", name: edge}",
        );
        let graph = Graph::build(&spec_from_yaml(&changed).unwrap()).unwrap();
        let report = apply(&executor, &graph, &mut state).await;
        assert_eq!(
            report.outcome("igw").unwrap().action,
            Some(ActionKind::Update)
        );

        // Immutable change on vpc -> replace
        let changed = changed.replace("10.0.0.0/16", "10.1.0.0/16");
        let graph = Graph::build(&spec_from_yaml(&changed).unwrap()).unwrap();
        let report = apply(&executor, &graph, &mut state).await;
        assert_eq!(
            report.outcome("vpc").unwrap().action,
            Some(ActionKind::Replace)
        );
    }

    #[tokio::test]
    async fn secrets_reach_provider_but_not_state() {
        let yaml = r#"
name: demo
resources:
  - id: db
    type: database
    properties:
      engine: postgres
      password: "secret(db-password)"
"#;
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(yaml).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let report = apply(&executor, &graph, &mut state).await;
        assert!(report.is_clean());

        // State keeps the symbolic form only
        let db = state.resource("db").unwrap();
        assert_eq!(db.properties["password"], json!("secret(db-password)"));
    }

    #[tokio::test]
    async fn plan_then_apply_then_plan_again() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        let mut state = GlobalState::new();

        let plan = executor.plan(&graph, &state).await.unwrap();
        assert!(plan.has_changes);
        assert!(plan.actions.iter().all(|a| a.kind == ActionKind::Create));

        apply(&executor, &graph, &mut state).await;

        let plan = executor.plan(&graph, &state).await.unwrap();
        assert!(!plan.has_changes);

        // Dropping igw from the spec plans a delete
        let shrunk = spec_from_yaml(
            "name: demo\nresources:\n  - id: vpc\n    type: network\n    properties: {cidr_block: 10.0.0.0/16}\n    immutable: [cidr_block]\n",
        )
        .unwrap();
        let graph = Graph::build(&shrunk).unwrap();
        let plan = executor.plan(&graph, &state).await.unwrap();
        let delete = plan
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::Delete)
            .unwrap();
        assert_eq!(delete.node_id, "igw");
    }

    #[tokio::test]
    async fn removed_resource_is_torn_down_on_apply() {
        let provider = Arc::new(MemoryProvider::new());
        let executor = executor(provider.clone());
        let mut state = GlobalState::new();

        let graph = Graph::build(&spec_from_yaml(LINEAR).unwrap()).unwrap();
        apply(&executor, &graph, &mut state).await;
        assert!(provider.has_resource("gateway", "igw"));

        let shrunk = spec_from_yaml(
            "name: demo\nresources:\n  - id: vpc\n    type: network\n    properties: {cidr_block: 10.0.0.0/16}\n    immutable: [cidr_block]\n",
        )
        .unwrap();
        let graph = Graph::build(&shrunk).unwrap();
        let report = apply(&executor, &graph, &mut state).await;

        assert!(report.is_clean());
        assert_eq!(
            report.outcome("igw").unwrap().action,
            Some(ActionKind::Delete)
        );
        assert!(!provider.has_resource("gateway", "igw"));
        assert!(state.resource("igw").is_none());
    }
}
