//! The resource graph: a directed graph of named nodes with cycle
//! detection, topological close ordering, and a monotonic logical clock.

use crate::error::GraphError;
use crate::node::{GraphNode, NodeState, NodeStatus};
use crate::name::ResourceName;
use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

struct Inner {
    /// Edges point child -> parent: the child depends on the parent.
    graph: StableDiGraph<GraphNode, ()>,
    index: HashMap<ResourceName, NodeIndex>,
}

impl Inner {
    fn idx(&self, name: &ResourceName) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }
}

/// Directed graph of named resource nodes.
///
/// All mutating operations take an internal write lock; the logical clock
/// is a separate atomic so readers can observe "has anything changed since
/// I last looked" without taking that lock.
pub struct ResourceGraph {
    inner: RwLock<Inner>,
    clock: AtomicI64,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                graph: StableDiGraph::new(),
                index: HashMap::new(),
            }),
            clock: AtomicI64::new(0),
        }
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current logical clock value. Strictly increases across any two
    /// mutations.
    pub fn logical_clock(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Insert a new node. Fails with [`GraphError::AlreadyExists`] if the
    /// name is already present.
    pub fn add_node(&self, node: GraphNode) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let name = node.name().clone();
        if inner.index.contains_key(&name) {
            return Err(GraphError::AlreadyExists(name));
        }
        let idx = inner.graph.add_node(node);
        inner.index.insert(name, idx);
        drop(inner);
        self.tick();
        Ok(())
    }

    /// Add an edge `child -> parent` (child depends on parent).
    ///
    /// Rejected with [`GraphError::CycleDetected`] only when the edge would
    /// create a cycle *and* both endpoints are already `Configured` — a
    /// transient cycle among not-yet-configured nodes is allowed so that
    /// [`Self::resolve_dependencies`] can detect and report it instead.
    pub fn add_child(&self, child: &ResourceName, parent: &ResourceName) -> Result<(), GraphError> {
        if child == parent {
            return Err(GraphError::SelfDependency(child.clone()));
        }
        let mut inner = self.inner.write();
        let child_idx = inner.idx(child).ok_or_else(|| GraphError::NotFound(child.clone()))?;
        let parent_idx = inner.idx(parent).ok_or_else(|| GraphError::NotFound(parent.clone()))?;

        if inner.graph.contains_edge(child_idx, parent_idx) {
            return Ok(());
        }

        let both_configured = inner.graph[child_idx].state().is_configured()
            && inner.graph[parent_idx].state().is_configured();

        inner.graph.add_edge(child_idx, parent_idx, ());
        if would_create_cycle(&inner.graph, child_idx) {
            if both_configured {
                inner.graph.remove_edge(inner.graph.find_edge(child_idx, parent_idx).unwrap());
                return Err(GraphError::CycleDetected {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
        }
        drop(inner);
        self.tick();
        Ok(())
    }

    /// Snapshot of a node by name.
    pub fn node(&self, name: &ResourceName) -> Option<GraphNode> {
        let inner = self.inner.read();
        inner.idx(name).map(|i| inner.graph[i].clone())
    }

    /// Mutate a node in place under the graph's lock, bumping the logical
    /// clock. Returns `None` if the name isn't present.
    pub fn with_node_mut<R>(&self, name: &ResourceName, f: impl FnOnce(&mut GraphNode) -> R) -> Option<R> {
        let mut inner = self.inner.write();
        let idx = inner.idx(name)?;
        let r = f(&mut inner.graph[idx]);
        drop(inner);
        self.tick();
        Some(r)
    }

    /// Direct dependencies of `name` (the nodes it points to).
    pub fn get_all_parents_of(&self, name: &ResourceName) -> Vec<ResourceName> {
        let inner = self.inner.read();
        let Some(idx) = inner.idx(name) else { return Vec::new() };
        inner
            .graph
            .edges(idx)
            .map(|e| inner.graph[e.target()].name().clone())
            .collect()
    }

    /// Direct dependents of `name` (the nodes that point to it).
    pub fn get_all_children_of(&self, name: &ResourceName) -> Vec<ResourceName> {
        let inner = self.inner.read();
        let Some(idx) = inner.idx(name) else { return Vec::new() };
        inner
            .graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|e| inner.graph[e.source()].name().clone())
            .collect()
    }

    /// All node names currently in the graph.
    pub fn names(&self) -> Vec<ResourceName> {
        let inner = self.inner.read();
        inner.graph.node_weights().map(|n| n.name().clone()).collect()
    }

    /// Edges as `(child, parent)` pairs.
    pub fn edges(&self) -> Vec<(ResourceName, ResourceName)> {
        let inner = self.inner.read();
        inner
            .graph
            .edge_references()
            .map(|e| {
                (
                    inner.graph[e.source()].name().clone(),
                    inner.graph[e.target()].name().clone(),
                )
            })
            .collect()
    }

    /// Snapshot of every node's name, state, last-updated stamp, and last
    /// error.
    pub fn status(&self) -> Vec<NodeStatus> {
        let inner = self.inner.read();
        inner.graph.node_weights().map(NodeStatus::from).collect()
    }

    /// Transitively mark each named node and all of its dependents
    /// (everything that would break if it disappeared), returning the full
    /// set in child-first order (dependents before dependencies). Idempotent.
    pub fn mark_removed(&self, names: &[ResourceName]) -> Vec<ResourceName> {
        let mut inner = self.inner.write();
        let mut to_mark: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        for name in names {
            if let Some(idx) = inner.idx(name) {
                if to_mark.insert(idx) {
                    queue.push_back(idx);
                }
            }
        }
        while let Some(idx) = queue.pop_front() {
            let children: Vec<NodeIndex> = inner
                .graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .map(|e| e.source())
                .collect();
            for c in children {
                if to_mark.insert(c) {
                    queue.push_back(c);
                }
            }
        }

        // Child-first order: a plain topological sort of the marked subset
        // along existing child->parent edges already visits every child
        // before the parents it points to.
        let order = topo_order_subset(&inner.graph, &to_mark);

        for idx in &to_mark {
            let node = &mut inner.graph[*idx];
            if !matches!(node.state(), NodeState::Removed | NodeState::Removing) {
                node.set_state(NodeState::MarkedForRemoval, 0);
            }
        }
        drop(inner);
        self.tick();
        order
    }

    /// Remove a node entirely (after it has been closed). Returns the
    /// removed node, if present.
    pub fn remove_node(&self, name: &ResourceName) -> Option<GraphNode> {
        let mut inner = self.inner.write();
        let idx = inner.index.remove(name)?;
        let node = inner.graph.remove_node(idx);
        drop(inner);
        self.tick();
        node
    }

    /// For each `Configuring` node, resolve declared dependency names
    /// against the graph, filling `unresolved_dependencies` for any that
    /// aren't present yet and wiring edges for any that are. Detects
    /// circular dependencies explicitly, reporting both endpoints, and
    /// marks the involved nodes `Unhealthy`.
    pub fn resolve_dependencies(&self) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let configuring: Vec<NodeIndex> = inner
            .graph
            .node_indices()
            .filter(|i| inner.graph[*i].state() == NodeState::Configuring)
            .collect();

        for idx in configuring {
            let deps: Vec<ResourceName> = inner.graph[idx]
                .config()
                .all_depends_on()
                .cloned()
                .collect();
            let mut unresolved = Vec::new();
            for dep in deps {
                match inner.idx(&dep) {
                    Some(parent_idx) => {
                        if !inner.graph.contains_edge(idx, parent_idx) {
                            inner.graph.add_edge(idx, parent_idx, ());
                        }
                    }
                    None => unresolved.push(dep),
                }
            }
            inner.graph[idx].set_unresolved(unresolved, 0);
        }

        if let Some((a_idx, b_idx)) = find_cycle_edge(&inner.graph) {
            let a = inner.graph[a_idx].name().clone();
            let b = inner.graph[b_idx].name().clone();
            inner.graph[a_idx].set_unhealthy(
                format!("circular dependency between {a} and {b}"),
                0,
            );
            inner.graph[b_idx].set_unhealthy(
                format!("circular dependency between {a} and {b}"),
                0,
            );
            drop(inner);
            self.tick();
            return Err(GraphError::CircularDependency { a, b });
        }
        drop(inner);
        self.tick();
        Ok(())
    }
}

/// DFS from `start` to see whether it can reach itself — used right after
/// speculatively inserting an edge `start -> ...`.
fn would_create_cycle(graph: &StableDiGraph<GraphNode, ()>, start: NodeIndex) -> bool {
    let mut stack = vec![start];
    let mut visited = HashSet::new();
    while let Some(n) = stack.pop() {
        for e in graph.edges(n) {
            let target = e.target();
            if target == start {
                return true;
            }
            if visited.insert(target) {
                stack.push(target);
            }
        }
    }
    false
}

/// Find one edge that closes a cycle anywhere in the graph, returning its
/// two endpoints. Used by `resolve_dependencies` to report circular
/// dependencies with both names.
fn find_cycle_edge(graph: &StableDiGraph<GraphNode, ()>) -> Option<(NodeIndex, NodeIndex)> {
    #[derive(PartialEq, Clone, Copy)]
    enum Mark {
        InStack,
        Done,
    }
    let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();

    fn visit(
        graph: &StableDiGraph<GraphNode, ()>,
        n: NodeIndex,
        marks: &mut HashMap<NodeIndex, Mark>,
    ) -> Option<(NodeIndex, NodeIndex)> {
        marks.insert(n, Mark::InStack);
        for e in graph.edges(n) {
            let t = e.target();
            match marks.get(&t) {
                Some(Mark::InStack) => return Some((n, t)),
                Some(Mark::Done) => continue,
                None => {
                    if let Some(found) = visit(graph, t, marks) {
                        return Some(found);
                    }
                }
            }
        }
        marks.insert(n, Mark::Done);
        None
    }

    for n in graph.node_indices() {
        if marks.contains_key(&n) {
            continue;
        }
        if let Some(found) = visit(graph, n, &mut marks) {
            return Some(found);
        }
    }
    None
}

/// Reverse-Kahn topological order of the given subset of nodes, restricted
/// to edges whose both endpoints lie in the subset.
fn topo_order_subset(
    graph: &StableDiGraph<GraphNode, ()>,
    subset: &HashSet<NodeIndex>,
) -> Vec<ResourceName> {
    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for &n in subset {
        in_degree.insert(n, 0);
    }
    for &n in subset {
        for e in graph.edges(n) {
            if subset.contains(&e.target()) {
                *in_degree.get_mut(&e.target()).unwrap() += 1;
            }
        }
    }

    let mut queue: VecDeque<NodeIndex> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    let mut order = Vec::with_capacity(subset.len());

    while let Some(n) = queue.pop_front() {
        order.push(graph[n].name().clone());
        for e in graph.edges(n) {
            let t = e.target();
            if let Some(deg) = in_degree.get_mut(&t) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(t);
                }
            }
        }
    }
    // Any leftover nodes (shouldn't happen outside of transient cycles)
    // are appended so the caller still sees every marked name.
    if order.len() < subset.len() {
        for &n in subset {
            let name = graph[n].name().clone();
            if !order.contains(&name) {
                order.push(name);
            }
        }
    }
    order
}

/// Structural equality for tests: same names, same state per name, same
/// applied config per name. Ignores node insertion order and internal
/// indices.
pub fn graphs_equal(a: &ResourceGraph, b: &ResourceGraph) -> bool {
    let mut a_names = a.names();
    let mut b_names = b.names();
    a_names.sort();
    b_names.sort();
    if a_names != b_names {
        return false;
    }
    for name in a_names {
        let na = a.node(&name).unwrap();
        let nb = b.node(&name).unwrap();
        if na.state() != nb.state() {
            return false;
        }
        if serde_json::to_string(na.config()).ok() != serde_json::to_string(nb.config()).ok() {
            return false;
        }
    }
    true
}
