//! Kahn's algorithm over the step dependency graph.
//!
//! Batch K contains exactly the steps whose dependencies are all satisfied by
//! batches `< K`. The number of batches equals the graph's longest-path
//! length.

use std::collections::{HashMap, HashSet, VecDeque};

use corecache_core::ConfigError;

use crate::step::Step;

pub fn validate_and_batch(steps: &[Step]) -> Result<Vec<Vec<String>>, ConfigError> {
    let mut seen_names = HashSet::new();
    for step in steps {
        if !seen_names.insert(step.name.clone()) {
            return Err(ConfigError::DuplicateStep { name: step.name.clone() });
        }
    }

    let names: HashSet<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    for step in steps {
        for dep in &step.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut in_degree: HashMap<&str, usize> = steps.iter().map(|s| (s.name.as_str(), s.depends_on.len())).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in steps {
        for dep in &step.depends_on {
            dependents.entry(dep.as_str()).or_default().push(step.name.as_str());
        }
    }

    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut frontier: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&name, _)| name)
        .collect();
    let mut resolved = 0usize;

    while !frontier.is_empty() {
        let mut batch: Vec<String> = frontier.iter().map(|s| s.to_string()).collect();
        batch.sort();
        resolved += batch.len();
        let mut next_frontier = VecDeque::new();
        for name in frontier.drain(..) {
            if let Some(deps) = dependents.get(name) {
                for &dependent in deps {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        next_frontier.push_back(dependent);
                    }
                }
            }
        }
        batches.push(batch);
        frontier = next_frontier;
    }

    if resolved < steps.len() {
        let cycle_steps: Vec<String> = in_degree
            .iter()
            .filter(|(_, &deg)| deg > 0)
            .map(|(&name, _)| name.to_string())
            .collect();
        return Err(ConfigError::Cycle { steps: cycle_steps });
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use std::sync::Arc;

    fn step(name: &str, deps: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            kind: StepKind::Compute { compute: Arc::new(|_, _, _| Box::pin(async { Ok(serde_json::Value::Null) })) },
            retries: None,
            timeout_ms: None,
            undo: None,
        }
    }

    #[test]
    fn linear_chain_produces_one_batch_per_step() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])];
        let batches = validate_and_batch(&steps).unwrap();
        assert_eq!(batches, vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn independent_steps_share_one_batch() {
        let steps = vec![step("a", &[]), step("b", &[])];
        let batches = validate_and_batch(&steps).unwrap();
        assert_eq!(batches, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn cycle_is_reported_with_its_member_steps() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        let err = validate_and_batch(&steps).unwrap_err();
        match err {
            ConfigError::Cycle { mut steps } => {
                steps.sort();
                assert_eq!(steps, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let steps = vec![step("a", &["missing"])];
        assert!(matches!(validate_and_batch(&steps), Err(ConfigError::UnknownDependency { .. })));
    }

    #[test]
    fn duplicate_step_name_is_rejected() {
        let steps = vec![step("a", &[]), step("a", &[])];
        assert!(matches!(validate_and_batch(&steps), Err(ConfigError::DuplicateStep { .. })));
    }
}
