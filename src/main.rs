// =============================================================================
//  HTN Planner - Demo CLI
//  File: main.rs
//
//  Description:
//  Wires a small robot-navigation domain through `htn-core`'s plan/execute
//  and, for the `temporal` subcommand, through `htn-temporal`'s scheduler
//  and tick loop. Not part of the planner's public contract — a worked
//  example a caller can read alongside the library docs.
//
//  Author:      Alex Roussinov
//  Created:     2025-12-23
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use anyhow::Result;
use clap::{Parser, Subcommand};
use htn_core::{plan, tree_stats, ActionResult, Domain, ExecutionOutcome, MethodResult, PlannerOpts, State, Todo, Value};

#[derive(Parser)]
#[command(name = "htn-planner", about = "Demo CLI for the re-entrant HTN planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plans and executes a short robot-navigation goal, demonstrating
    /// method backtracking and replan-on-execution-failure.
    Demo,
    /// Runs the same domain through the temporal scheduler: a `move`
    /// action with a real duration, followed by an `interrupt` intent
    /// that cancels it mid-flight.
    Temporal,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Temporal => temporal::run_temporal_demo(),
    }
}

/// A two-method `travel` task: `direct` tries a door that always jams at
/// execution time, `around` always works. Demonstrates the executor
/// noticing the runtime failure, blacklisting `go_direct`, and replanning
/// through the second method.
fn robot_domain() -> Domain {
    let mut domain = Domain::new();

    domain.register_action("go_direct", |_state, _args| ActionResult::Failure("door jammed".to_string()));
    domain.register_action("go_around", |state, _args| {
        let mut s = state.clone();
        s.set("location", "robot", Value::Text("workshop".to_string()));
        ActionResult::Ok(s)
    });
    domain.register_action("pick_up", |state, args| {
        let mut s = state.clone();
        if let Some(Value::Text(item)) = args.first() {
            s.set("holding", "robot", Value::Text(item.clone()));
        }
        ActionResult::Ok(s)
    });

    domain.register_task_method("travel", "direct", |_state, _args| {
        MethodResult::ok(vec![Todo::action("go_direct", vec![])])
    });
    domain.register_task_method("travel", "around", |_state, _args| {
        MethodResult::ok(vec![Todo::action("go_around", vec![])])
    });
    domain.register_task_method("fetch_part", "fetch", |_state, args| {
        MethodResult::ok(vec![
            Todo::task("travel", vec![]),
            Todo::action("pick_up", args.to_vec()),
        ])
    });

    domain
}

fn run_demo() -> Result<()> {
    let domain = robot_domain();
    let initial_state = State::new().with("location", "robot", Value::Text("bay".to_string()));
    let todos = vec![Todo::task("fetch_part", vec![Value::Text("capacitor".to_string())])];

    println!("Planning fetch_part(capacitor) from bay...");
    let tree = plan(&domain, initial_state.clone(), todos, PlannerOpts::default())?;
    let stats = tree_stats(&tree);
    println!(
        "Plan built: {} nodes, {} expanded, {} primitive actions, depth {}",
        stats.total_nodes, stats.expanded_nodes, stats.primitive_actions, stats.max_depth
    );

    let outcome = htn_core::execute(&domain, tree, initial_state, PlannerOpts::default())?;
    match outcome {
        ExecutionOutcome::Completed { final_state, actions_executed, tree } => {
            println!("Execution completed after {actions_executed} actions (replanned around the jammed door).");
            println!("Final location: {:?}", final_state.get("location", "robot"));
            println!("Final holding: {:?}", final_state.get("holding", "robot"));
            println!("Blacklisted commands: {:?}", tree.blacklisted_commands);
        }
        ExecutionOutcome::Failed { reason, .. } => {
            println!("Execution failed: {reason}");
        }
    }
    Ok(())
}

mod temporal {
    use super::robot_domain;
    use anyhow::Result;
    use htn_core::{plan, PlannerOpts, State, Todo, Value};
    use htn_temporal::{Intent, IntentEnvelope, TemporalScheduler, TickLoop, TokioQueue};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::mpsc;

    pub fn run_temporal_demo() -> Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let domain = robot_domain();
            let state = State::new().with("location", "robot", Value::Pair(0.0, 0.0));
            let tree = plan(&domain, state.clone(), vec![Todo::task("travel", vec![])], PlannerOpts::default())?;

            let (queue, completions) = TokioQueue::new(Instant::now());
            let mut scheduler = TemporalScheduler::new(queue);
            scheduler.register_duration(
                "go_around",
                Arc::new(|_s, _args| 2.0),
            );

            let (node_id, name, args) = tree.extract_actions()[0].clone();
            let timed = scheduler.assign(&state, node_id, "robot", &name, args, vec![], 0.0);
            scheduler.dispatch(timed.id).await?;
            println!("Dispatched `{name}` at t={:.1}, ending at t={:.1}", timed.start_time, timed.end_time);

            let (intent_tx, intent_rx) = mpsc::unbounded_channel();
            intent_tx.send(IntentEnvelope {
                intent: Intent::Interrupt { agent_id: "robot".to_string() },
                arrived_at: 1.0,
            })?;
            drop(intent_tx);

            let tick_loop = TickLoop::new(scheduler, domain, tree, state, PlannerOpts::default(), intent_rx, completions);
            let final_state = tick_loop.run(200).await?;
            println!("Interrupted mid-flight; final location: {:?}", final_state.get("location", "robot"));
            Ok(())
        })
    }
}
