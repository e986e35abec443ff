// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawWorkflowFile, WorkflowFile};
use crate::errors::{DrmflowError, Result};
use crate::types::format_tags;

impl TryFrom<RawWorkflowFile> for WorkflowFile {
    type Error = DrmflowError;

    fn try_from(raw: RawWorkflowFile) -> std::result::Result<Self, Self::Error> {
        let order = validate_workflow(&raw)?;
        Ok(WorkflowFile::new_unchecked(raw.execution, raw.stage, order))
    }
}

/// Run every check and return the stage names in dependency order.
pub fn validate_workflow(cfg: &RawWorkflowFile) -> Result<Vec<String>> {
    ensure_has_stages(cfg)?;
    validate_execution_section(cfg)?;
    validate_stage_dependencies(cfg)?;
    validate_tasks(cfg)?;
    stage_order(cfg)
}

fn ensure_has_stages(cfg: &RawWorkflowFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(DrmflowError::ConfigError(
            "workflow must contain at least one [stage.<name>] section".to_string(),
        ));
    }
    for (name, stage) in cfg.stage.iter() {
        if stage.task.is_empty() {
            return Err(DrmflowError::ConfigError(format!(
                "stage '{name}' has no [[stage.{name}.task]] entries"
            )));
        }
    }
    Ok(())
}

fn validate_execution_section(cfg: &RawWorkflowFile) -> Result<()> {
    if cfg.execution.max_attempts == 0 {
        return Err(DrmflowError::ConfigError(
            "[execution].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_stage_dependencies(cfg: &RawWorkflowFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        for dep in stage.after.iter() {
            if !cfg.stage.contains_key(dep) {
                return Err(DrmflowError::ConfigError(format!(
                    "stage '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
            if dep == name {
                return Err(DrmflowError::ConfigError(format!(
                    "stage '{name}' cannot depend on itself in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawWorkflowFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        let mut seen = BTreeSet::new();
        for (idx, task) in stage.task.iter().enumerate() {
            let has_cmd = task.cmd.as_deref().is_some_and(|c| !c.trim().is_empty());
            if !task.noop && !has_cmd {
                return Err(DrmflowError::ConfigError(format!(
                    "task #{idx} of stage '{name}' needs a `cmd` (or `noop = true`)"
                )));
            }
            if !seen.insert(&task.tags) {
                return Err(DrmflowError::DuplicateTags {
                    stage: name.clone(),
                    tags: format_tags(&task.tags),
                });
            }
        }
    }
    Ok(())
}

fn stage_order(cfg: &RawWorkflowFile) -> Result<Vec<String>> {
    // Edge direction: upstream -> stage.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.stage.keys() {
        graph.add_node(name.as_str());
    }

    for (name, stage) in cfg.stage.iter() {
        for dep in stage.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(DrmflowError::DagCycle(format!(
            "cycle detected in stage graph involving stage '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_str;

    fn validate(toml: &str) -> Result<WorkflowFile> {
        WorkflowFile::try_from(parse_str(toml)?)
    }

    #[test]
    fn upstream_stages_come_first() {
        let wf = validate(
            r#"
            [stage.report]
            after = ["call"]
            [[stage.report.task]]
            cmd = "report"

            [stage.align]
            [[stage.align.task]]
            cmd = "align"

            [stage.call]
            after = ["align"]
            [[stage.call.task]]
            cmd = "call"
            "#,
        )
        .unwrap();

        let names: Vec<_> = wf.stages_in_order().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["align", "call", "report"]);
    }

    #[test]
    fn stage_cycles_are_rejected() {
        let err = validate(
            r#"
            [stage.a]
            after = ["b"]
            [[stage.a.task]]
            cmd = "a"

            [stage.b]
            after = ["a"]
            [[stage.b.task]]
            cmd = "b"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DrmflowError::DagCycle(_)));
    }

    #[test]
    fn duplicate_tags_within_a_stage_are_rejected() {
        let err = validate(
            r#"
            [stage.a]
            [[stage.a.task]]
            cmd = "x"
            tags = { sample = "A" }
            [[stage.a.task]]
            cmd = "y"
            tags = { sample = "A" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DrmflowError::DuplicateTags { .. }));
    }

    #[test]
    fn tasks_need_a_command_unless_noop() {
        let missing = validate(
            r#"
            [stage.a]
            [[stage.a.task]]
            tags = { n = "1" }
            "#,
        );
        assert!(matches!(missing, Err(DrmflowError::ConfigError(_))));

        let noop = validate(
            r#"
            [stage.a]
            [[stage.a.task]]
            noop = true
            "#,
        );
        assert!(noop.is_ok());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = validate(
            r#"
            [execution]
            max_attempts = 0
            [stage.a]
            [[stage.a.task]]
            cmd = "a"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
