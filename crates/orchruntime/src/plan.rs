use orchcore::{Binding, Reference, StepId, WorkflowDefinition, WorkflowError};
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A step with its dependencies resolved to indices and its inputs parsed.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStep {
    pub id: StepId,
    pub agent_id: String,
    /// Indices into `ExecutionPlan::steps`, deduplicated
    pub dependencies: Vec<usize>,
    pub inputs: Vec<(String, Binding)>,
}

/// A validated workflow: definition plus everything derived from it once.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    definition: WorkflowDefinition,
    steps: Vec<CompiledStep>,
    order: Vec<usize>,
    outputs: Vec<(String, Reference)>,
}

impl ExecutionPlan {
    /// Validate `definition` and precompute its topological order.
    pub fn compile(definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, step) in definition.steps.iter().enumerate() {
            if step.id.is_empty() {
                return Err(WorkflowError::EmptyStepId);
            }
            if index.insert(step.id.as_str(), i).is_some() {
                return Err(WorkflowError::DuplicateStep(step.id.clone()));
            }
        }

        let graph = build_graph(&definition, &index)?;
        let order = topological_order(&graph)?;

        let mut steps = Vec::with_capacity(definition.steps.len());
        for (i, step) in definition.steps.iter().enumerate() {
            let node = NodeIndex::new(i);
            let mut dependencies: Vec<usize> = graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|n| n.index())
                .collect();
            dependencies.sort_unstable();

            let mut inputs = Vec::with_capacity(step.inputs.len());
            for (name, raw) in &step.inputs {
                let location = || format!("step '{}' input '{}'", step.id, name);
                let binding = Binding::from_value(raw).map_err(|e| WorkflowError::InvalidReference {
                    location: location(),
                    reason: e.to_string(),
                })?;

                if let Some(source) = binding.reference().and_then(|r| r.step_id()) {
                    let upstream = match index.get(source) {
                        Some(&upstream) if upstream != i => upstream,
                        Some(_) => {
                            return Err(WorkflowError::InvalidReference {
                                location: location(),
                                reason: "a step cannot read its own output".to_string(),
                            })
                        }
                        None => {
                            return Err(WorkflowError::InvalidReference {
                                location: location(),
                                reason: format!("unknown step '{}'", source),
                            })
                        }
                    };
                    if !has_path_connecting(&graph, NodeIndex::new(upstream), node, None) {
                        return Err(WorkflowError::InvalidReference {
                            location: location(),
                            reason: format!(
                                "step '{}' is not a dependency of '{}'",
                                source, step.id
                            ),
                        });
                    }
                }
                inputs.push((name.clone(), binding));
            }

            steps.push(CompiledStep {
                id: step.id.clone(),
                agent_id: step.agent_id.clone(),
                dependencies,
                inputs,
            });
        }

        let mut outputs = Vec::with_capacity(definition.outputs.len());
        for (key, expression) in &definition.outputs {
            let location = format!("output '{}'", key);
            if !Reference::is_expression(expression) {
                return Err(WorkflowError::InvalidReference {
                    location,
                    reason: format!("'{}' is not a reference expression", expression),
                });
            }
            let reference = Reference::parse(expression).map_err(|e| WorkflowError::InvalidReference {
                location: location.clone(),
                reason: e.to_string(),
            })?;
            if let Some(source) = reference.step_id() {
                if !index.contains_key(source) {
                    return Err(WorkflowError::InvalidReference {
                        location,
                        reason: format!("unknown step '{}'", source),
                    });
                }
            }
            outputs.push((key.clone(), reference));
        }

        Ok(Self {
            definition,
            steps,
            order,
            outputs,
        })
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Step ids in the order the scheduler considers them.
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.steps[i].id.as_str()).collect()
    }

    pub(crate) fn steps(&self) -> &[CompiledStep] {
        &self.steps
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn outputs(&self) -> &[(String, Reference)] {
        &self.outputs
    }
}

/// One node per step, in definition order, and an edge from each dependency
/// to its dependent.
fn build_graph(
    definition: &WorkflowDefinition,
    index: &HashMap<&str, usize>,
) -> Result<DiGraph<StepId, ()>, WorkflowError> {
    let mut graph = DiGraph::with_capacity(definition.steps.len(), 0);
    for step in &definition.steps {
        graph.add_node(step.id.clone());
    }

    for (i, step) in definition.steps.iter().enumerate() {
        for dependency in &step.depends_on {
            let from = index
                .get(dependency.as_str())
                .ok_or_else(|| WorkflowError::DanglingDependency {
                    step: step.id.clone(),
                    dependency: dependency.clone(),
                })?;
            let (from, to) = (NodeIndex::new(*from), NodeIndex::new(i));
            if !graph.contains_edge(from, to) {
                graph.add_edge(from, to, ());
            }
        }
    }

    Ok(graph)
}

/// Kahn's algorithm. Among steps that become ready together, the one
/// declared first goes first.
fn topological_order(graph: &DiGraph<StepId, ()>) -> Result<Vec<usize>, WorkflowError> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for next in graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    if order.len() == graph.node_count() {
        return Ok(order);
    }

    // Leftover nodes include steps merely downstream of a cycle; report only
    // the ones on it.
    let mut on_cycle: Vec<usize> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|n| n.index())
        .collect();
    on_cycle.sort_unstable();

    Err(WorkflowError::CyclicDependency {
        steps: on_cycle.into_iter().map(|i| graph[NodeIndex::new(i)].clone()).collect(),
    })
}
