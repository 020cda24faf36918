//! In-memory DAG engine: the state machine driving one pipeline run's
//! jobs from `pending` through to a terminal status.

use std::collections::{HashMap, HashSet};

use zephyr_core::entities::JobStatus;
use zephyr_core::id::JobId;
use zephyr_core::{Error, Result};

/// One node in the DAG, derived from a `Job` row at scheduling time.
#[derive(Debug, Clone)]
pub struct JobNode {
    pub id: JobId,
    pub name: String,
    pub depends_on: Vec<JobId>,
    pub status: JobStatus,
    pub dependents: Vec<JobId>,
}

impl JobNode {
    pub fn new(id: JobId, name: impl Into<String>, depends_on: Vec<JobId>) -> Self {
        Self {
            id,
            name: name.into(),
            depends_on,
            status: JobStatus::Pending,
            dependents: Vec::new(),
        }
    }
}

/// The DAG over one pipeline run's jobs. Scheduler-local: never shared
/// across drivers, rebuilt from store rows whenever the scheduler needs
/// a fresh view of readiness.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: HashMap<JobId, JobNode>,
    order: Vec<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

impl Dag {
    /// Build a DAG from job nodes. Fails with `CyclicDependency` on a
    /// dangling `depends_on` reference or on any cycle (including
    /// self-loops); the offending node is named in the error.
    pub fn build(mut nodes: Vec<JobNode>) -> Result<Self> {
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.clone()) {
                return Err(Error::CyclicDependency(format!(
                    "duplicate job id {}",
                    node.id
                )));
            }
        }

        let ids: HashSet<JobId> = nodes.iter().map(|n| n.id.clone()).collect();
        for node in &nodes {
            for dep in &node.depends_on {
                if !ids.contains(dep) {
                    return Err(Error::CyclicDependency(format!(
                        "job {} depends on unknown job {dep}",
                        node.id
                    )));
                }
            }
        }

        detect_cycle(&nodes)?;

        for node in &mut nodes {
            node.status = if node.depends_on.is_empty() {
                JobStatus::Ready
            } else {
                JobStatus::Pending
            };
        }

        let order: Vec<JobId> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut map: HashMap<JobId, JobNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        for id in &order {
            let deps = map[id].depends_on.clone();
            for dep in deps {
                if let Some(dep_node) = map.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Ok(Self { nodes: map, order })
    }

    pub fn get(&self, id: &JobId) -> Option<&JobNode> {
        self.nodes.get(id)
    }

    /// Every node currently at `status`, in insertion order. Used by
    /// callers that need to mirror a DAG-only transition (e.g. the
    /// cascade from [`Dag::skip_descendants`]) into a separate system
    /// of record.
    pub fn ids_with_status(&self, status: JobStatus) -> Vec<JobId> {
        self.order
            .iter()
            .filter(|id| self.nodes[*id].status == status)
            .cloned()
            .collect()
    }

    /// Transition a node from `ready` to `running`.
    pub fn mark_running(&mut self, id: &JobId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if node.status != JobStatus::Ready {
            return Err(Error::IllegalTransition(format!(
                "job {id} is {:?}, not ready",
                node.status
            )));
        }
        node.status = JobStatus::Running;
        Ok(())
    }

    /// Record a terminal result for a running node and propagate
    /// readiness (on success) or skip (on failure) to its dependents.
    /// Returns the ids newly flipped to `ready`.
    pub fn mark_completed(&mut self, id: &JobId, success: bool) -> Result<Vec<JobId>> {
        {
            let node = self
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            node.status = if success {
                JobStatus::Success
            } else {
                JobStatus::Failure
            };
        }

        if success {
            Ok(self.promote_ready_dependents(id))
        } else {
            self.skip_descendants(id);
            Ok(Vec::new())
        }
    }

    fn promote_ready_dependents(&mut self, id: &JobId) -> Vec<JobId> {
        let dependents = self.nodes[id].dependents.clone();
        let mut newly_ready = Vec::new();
        for dependent in dependents {
            let all_deps_succeeded = self.nodes[&dependent]
                .depends_on
                .iter()
                .all(|dep| self.nodes[dep].status == JobStatus::Success);
            let node = self.nodes.get_mut(&dependent).unwrap();
            if node.status == JobStatus::Pending && all_deps_succeeded {
                node.status = JobStatus::Ready;
                newly_ready.push(dependent);
            }
        }
        newly_ready
    }

    fn skip_descendants(&mut self, id: &JobId) {
        let mut stack = self.nodes[id].dependents.clone();
        while let Some(next) = stack.pop() {
            let node = self.nodes.get_mut(&next).unwrap();
            if matches!(node.status, JobStatus::Pending | JobStatus::Ready) {
                node.status = JobStatus::Skipped;
                stack.extend(node.dependents.clone());
            }
        }
    }

    /// Cancel every node still waiting; `running` nodes are left for
    /// the executor to cancel and transition on completion.
    pub fn cancel_all(&mut self) {
        for node in self.nodes.values_mut() {
            if matches!(node.status, JobStatus::Pending | JobStatus::Ready) {
                node.status = JobStatus::Cancelled;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.values().all(|n| n.status.is_terminal())
    }

    pub fn has_failures(&self) -> bool {
        self.nodes.values().any(|n| n.status == JobStatus::Failure)
    }

    /// A linear extension of `depends_on`, ties broken by insertion
    /// order. Assumes the DAG already passed cycle detection in `build`.
    pub fn topological_order(&self) -> Vec<JobId> {
        let mut visited: HashSet<JobId> = HashSet::new();
        let mut result = Vec::with_capacity(self.order.len());
        for id in &self.order {
            self.topo_visit(id, &mut visited, &mut result);
        }
        result
    }

    fn topo_visit(&self, id: &JobId, visited: &mut HashSet<JobId>, result: &mut Vec<JobId>) {
        if visited.contains(id) {
            return;
        }
        visited.insert(id.clone());
        for dep in &self.nodes[id].depends_on {
            self.topo_visit(dep, visited, result);
        }
        result.push(id.clone());
    }

    /// Successive antichains: each layer holds every node whose
    /// dependencies all lie in earlier layers, in insertion order.
    pub fn parallel_layers(&self) -> Vec<Vec<JobId>> {
        let mut placed: HashSet<JobId> = HashSet::new();
        let mut layers = Vec::new();

        while placed.len() < self.order.len() {
            let layer: Vec<JobId> = self
                .order
                .iter()
                .filter(|id| !placed.contains(*id))
                .filter(|id| {
                    self.nodes[*id]
                        .depends_on
                        .iter()
                        .all(|dep| placed.contains(dep))
                })
                .cloned()
                .collect();

            if layer.is_empty() {
                break;
            }
            placed.extend(layer.iter().cloned());
            layers.push(layer);
        }

        layers
    }
}

/// Three-colour DFS cycle detection. Reports the first grey node
/// encountered a second time.
fn detect_cycle(nodes: &[JobNode]) -> Result<()> {
    let by_id: HashMap<&JobId, &JobNode> = nodes.iter().map(|n| (&n.id, n)).collect();
    let mut colour: HashMap<JobId, Colour> =
        nodes.iter().map(|n| (n.id.clone(), Colour::White)).collect();

    for node in nodes {
        if colour[&node.id] == Colour::White {
            visit(&node.id, &by_id, &mut colour)?;
        }
    }
    Ok(())
}

fn visit(
    id: &JobId,
    by_id: &HashMap<&JobId, &JobNode>,
    colour: &mut HashMap<JobId, Colour>,
) -> Result<()> {
    colour.insert(id.clone(), Colour::Grey);
    for dep in &by_id[id].depends_on {
        match colour[dep] {
            Colour::Grey => {
                return Err(Error::CyclicDependency(format!(
                    "cycle detected involving job {dep}"
                )));
            }
            Colour::White => visit(dep, by_id, colour)?,
            Colour::Black => {}
        }
    }
    colour.insert(id.clone(), Colour::Black);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id(run: &str, name: &str) -> JobId {
        format!("{run}:{name}").into()
    }

    fn node(run: &str, name: &str, deps: &[&str]) -> JobNode {
        JobNode::new(
            job_id(run, name),
            name,
            deps.iter().map(|d| job_id(run, d)).collect(),
        )
    }

    #[test]
    fn linear_chain_ready_and_completion() {
        let nodes = vec![
            node("r1", "a", &[]),
            node("r1", "b", &["a"]),
            node("r1", "c", &["b"]),
        ];
        let mut dag = Dag::build(nodes).unwrap();
        assert_eq!(dag.get(&job_id("r1", "a")).unwrap().status, JobStatus::Ready);
        assert_eq!(dag.get(&job_id("r1", "b")).unwrap().status, JobStatus::Pending);

        dag.mark_running(&job_id("r1", "a")).unwrap();
        let newly_ready = dag.mark_completed(&job_id("r1", "a"), true).unwrap();
        assert_eq!(newly_ready, vec![job_id("r1", "b")]);

        assert_eq!(
            dag.topological_order(),
            vec![job_id("r1", "a"), job_id("r1", "b"), job_id("r1", "c")]
        );
        assert_eq!(
            dag.parallel_layers(),
            vec![
                vec![job_id("r1", "a")],
                vec![job_id("r1", "b")],
                vec![job_id("r1", "c")],
            ]
        );
    }

    #[test]
    fn diamond_with_one_failure_skips_descendant() {
        let nodes = vec![
            node("r1", "a", &[]),
            node("r1", "b", &["a"]),
            node("r1", "c", &["a"]),
            node("r1", "d", &["b", "c"]),
        ];
        let mut dag = Dag::build(nodes).unwrap();

        dag.mark_running(&job_id("r1", "a")).unwrap();
        dag.mark_completed(&job_id("r1", "a"), true).unwrap();

        dag.mark_running(&job_id("r1", "b")).unwrap();
        dag.mark_completed(&job_id("r1", "b"), false).unwrap();

        dag.mark_running(&job_id("r1", "c")).unwrap();
        dag.mark_completed(&job_id("r1", "c"), true).unwrap();

        assert_eq!(dag.get(&job_id("r1", "d")).unwrap().status, JobStatus::Skipped);
        assert!(dag.is_complete());
        assert!(dag.has_failures());
    }

    #[test]
    fn self_loop_is_cyclic() {
        let nodes = vec![node("r1", "a", &["a"])];
        let err = Dag::build(nodes).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn longer_cycle_is_detected() {
        let nodes = vec![
            node("r1", "a", &["c"]),
            node("r1", "b", &["a"]),
            node("r1", "c", &["b"]),
        ];
        let err = Dag::build(nodes).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn dangling_dependency_is_cyclic_error() {
        let nodes = vec![node("r1", "a", &["ghost"])];
        let err = Dag::build(nodes).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn cancel_all_leaves_running_untouched() {
        let nodes = vec![node("r1", "a", &[]), node("r1", "b", &["a"])];
        let mut dag = Dag::build(nodes).unwrap();
        dag.mark_running(&job_id("r1", "a")).unwrap();
        dag.cancel_all();
        assert_eq!(dag.get(&job_id("r1", "a")).unwrap().status, JobStatus::Running);
        assert_eq!(dag.get(&job_id("r1", "b")).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn mark_running_rejects_non_ready_node() {
        let nodes = vec![node("r1", "a", &[]), node("r1", "b", &["a"])];
        let mut dag = Dag::build(nodes).unwrap();
        let err = dag.mark_running(&job_id("r1", "b")).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition(_)));
    }
}
