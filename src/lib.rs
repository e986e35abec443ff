// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod execution;
pub mod fs;
pub mod logging;
pub mod model;
pub mod store;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::WorkflowFile;
use crate::config::loader::load_and_validate;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::LocalBackend;
use crate::execution::Execution;
use crate::fs::RealFileSystem;
use crate::types::{StoreMode, format_tags};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the workflow, builds the execution and runs it with
/// the local backend until nothing more can run. Returns `true` if no stage
/// failed and every task finished.
pub async fn run(args: CliArgs) -> Result<bool> {
    let workflow_path = PathBuf::from(&args.workflow);
    let mut workflow = load_and_validate(&workflow_path)?;

    if let Some(max_attempts) = args.max_attempts {
        if max_attempts == 0 {
            anyhow::bail!("--max-attempts must be >= 1");
        }
        workflow.execution.max_attempts = max_attempts;
    }

    if args.dry_run {
        let mut preview = workflow.clone();
        preview.execution.store = StoreMode::Memory;
        let execution = Execution::from_workflow(&preview, Arc::new(RealFileSystem))?;
        print_dry_run(&preview, &execution);
        return Ok(true);
    }

    let execution = Execution::from_workflow(&workflow, Arc::new(RealFileSystem))?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = LocalBackend::new(rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        fail_fast: workflow.execution.fail_fast,
    };
    let core = CoreRuntime::new(execution, options);
    let execution = Runtime::new(core, rt_rx, backend).run().await?;

    Ok(summarize(&execution))
}

/// Log the final state of every stage and return whether the run succeeded.
pub fn summarize(execution: &Execution) -> bool {
    for stage in execution.stages() {
        let tasks: Vec<_> = execution.tasks_of_stage(stage.id()).collect();
        let successful = tasks.iter().filter(|t| t.successful()).count();
        info!(
            stage = stage.name(),
            status = %stage.status(),
            successful,
            total = tasks.len(),
            "stage summary"
        );
    }

    !execution.has_failed_stage() && execution.tasks().all(|t| t.finished())
}

/// Print stages, tasks, tags and edges without running anything.
fn print_dry_run(workflow: &WorkflowFile, execution: &Execution) {
    println!("drmflow dry-run: {}", execution.name());
    println!("  execution.max_attempts = {}", execution.max_attempts());
    println!("  execution.drm = {}", workflow.execution.drm);
    println!("  execution.fail_fast = {}", workflow.execution.fail_fast);
    println!();

    println!(
        "stages ({}), tasks ({}), edges ({}):",
        execution.stages().len(),
        execution.tasks().count(),
        execution.graph().edges().count()
    );
    for stage in execution.stages() {
        println!("  - {}", stage.name());
        if let Some(cfg) = workflow.stage.get(stage.name()) {
            if !cfg.after.is_empty() {
                println!("      after: {:?}", cfg.after);
            }
        }
        for task in execution.tasks_of_stage(stage.id()) {
            println!("      {}", task.label());
            if task.is_noop() {
                println!("          noop");
            } else if let Some(cmd) = task.cmd() {
                println!("          cmd: {cmd}");
            }
            if !task.tags().is_empty() {
                println!("          tags: {}", format_tags(task.tags()));
            }
            let parents = execution.parents_of(task.id());
            if !parents.is_empty() {
                let ids: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
                println!("          after tasks: [{}]", ids.join(", "));
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
