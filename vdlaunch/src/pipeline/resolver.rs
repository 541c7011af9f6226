//! Dependency resolution: validate the graph and linearize it.

use super::error::GraphError;
use super::feature::BoxedFeature;
use std::collections::HashMap;

/// A validated feature graph with its execution order.
///
/// `order` holds indices of enabled features only; every feature appears
/// after all of its enabled dependencies.
pub struct ExecutionPlan {
    pub(crate) features: Vec<BoxedFeature>,
    pub(crate) order: Vec<usize>,
    /// Enabled dependencies of each feature, by index.
    pub(crate) deps: Vec<Vec<usize>>,
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("order", &self.order_names())
            .field("skipped", &self.skipped())
            .finish()
    }
}

impl ExecutionPlan {
    /// Feature names in execution order.
    pub fn order_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.features[i].name())
            .collect()
    }

    /// Disabled features, in registration order.
    pub fn skipped(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| !f.enabled())
            .map(|f| f.name())
            .collect()
    }

    /// Enabled dependencies of `name` that gate its setup.
    pub fn dependencies_of(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.features.iter().position(|f| f.name() == name)?;
        Some(
            self.deps[index]
                .iter()
                .map(|&d| self.features[d].name())
                .collect(),
        )
    }

    /// Number of features that will be set up.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Validate `features` and compute the execution order.
///
/// Checks run in a fixed order: unknown references, required dependencies
/// on disabled features, then cycles among enabled features.
pub(crate) fn resolve(
    features: Vec<BoxedFeature>,
    index: HashMap<String, usize>,
) -> Result<ExecutionPlan, GraphError> {
    let enabled: Vec<bool> = features.iter().map(|f| f.enabled()).collect();

    // (dependency index, required)
    let mut declared: Vec<Vec<(usize, bool)>> = Vec::with_capacity(features.len());
    for feature in &features {
        let mut refs = Vec::new();
        for dep in feature.dependencies() {
            let target = index
                .get(dep.name())
                .copied()
                .ok_or_else(|| GraphError::UnknownDependency {
                    feature: feature.name().to_string(),
                    dependency: dep.name().to_string(),
                })?;
            refs.push((target, dep.is_required()));
        }
        declared.push(refs);
    }

    for (i, refs) in declared.iter().enumerate() {
        if !enabled[i] {
            continue;
        }
        if let Some(&(target, _)) = refs
            .iter()
            .find(|&&(target, required)| required && !enabled[target])
        {
            return Err(GraphError::UnsatisfiedDependency {
                feature: features[i].name().to_string(),
                dependency: features[target].name().to_string(),
            });
        }
    }

    let deps: Vec<Vec<usize>> = declared
        .iter()
        .enumerate()
        .map(|(i, refs)| {
            let mut edges = Vec::new();
            if enabled[i] {
                for &(target, _) in refs {
                    if enabled[target] && !edges.contains(&target) {
                        edges.push(target);
                    }
                }
            }
            edges
        })
        .collect();

    let order = topological_order(&features, &enabled, &deps)?;

    tracing::debug!(
        order = ?order.iter().map(|&i| features[i].name()).collect::<Vec<_>>(),
        "Resolved feature order"
    );

    Ok(ExecutionPlan {
        features,
        order,
        deps,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first post-order over enabled features.
///
/// Roots are visited in registration order and dependencies in declaration
/// order, which makes the result deterministic.
fn topological_order(
    features: &[BoxedFeature],
    enabled: &[bool],
    deps: &[Vec<usize>],
) -> Result<Vec<usize>, GraphError> {
    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), Vec<usize>> {
        marks[node] = Mark::InProgress;
        stack.push(node);

        for &dep in &deps[node] {
            match marks[dep] {
                Mark::InProgress => {
                    let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(dep);
                    return Err(cycle);
                }
                Mark::Unvisited => visit(dep, deps, marks, stack, order)?,
                Mark::Done => {}
            }
        }

        stack.pop();
        marks[node] = Mark::Done;
        order.push(node);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; features.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(features.len());

    for node in 0..features.len() {
        if !enabled[node] || marks[node] != Mark::Unvisited {
            continue;
        }
        visit(node, deps, &mut marks, &mut stack, &mut order).map_err(|cycle| {
            GraphError::CyclicDependency {
                cycle: cycle
                    .into_iter()
                    .map(|i| features[i].name().to_string())
                    .collect(),
            }
        })?;
    }

    Ok(order)
}
