//! Full run against scripted capabilities: every agent call uses each of the
//! condition's tool servers once and every verdict is the fixed default.

use super::super::args::DryRunArgs;
use super::load_inputs;
use crate::exit_codes;
use evalgrid_core::model::ToolInvocation;
use evalgrid_core::observer::{CompositeObserver, TracingObserver};
use evalgrid_core::providers::fake::{agent_outcome_with_tools, FakeAgentFactory, FakeJudgeFactory};
use evalgrid_core::report::{aggregate, condition_stats, console, write_run_outputs};
use evalgrid_core::Runner;
use std::sync::Arc;

pub async fn run(args: DryRunArgs) -> anyhow::Result<i32> {
    let (cfg, dataset) = match load_inputs(&args.config) {
        Ok(inputs) => inputs,
        Err(code) => return Ok(code),
    };
    tracing::info!(
        agent = %cfg.agent.kind,
        model = %cfg.agent.model,
        "dry run: agent and judge are scripted"
    );

    let agents = FakeAgentFactory::scripted(|call| {
        Ok(agent_outcome_with_tools(
            format!("dry-run answer for {}", call.sample_id),
            call.tool_servers
                .iter()
                .map(|s| ToolInvocation::ok(format!("{}_query", s.name)))
                .collect(),
        ))
    });

    let mut observer = CompositeObserver::default().with(Arc::new(TracingObserver));
    if !args.quiet {
        observer = observer.with(Arc::new(console::ConsoleProgress::default()));
    }

    let summary = match Runner::new(Arc::new(agents), Arc::new(FakeJudgeFactory::default()))
        .with_observer(Arc::new(observer))
        .run_config(&cfg, &dataset)
        .await
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("run failed [{}]: {e}", e.kind());
            return Ok(exit_codes::for_run_error(&e));
        }
    };

    let outputs = match write_run_outputs(&summary, &args.out_dir, chrono::Utc::now()) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("report error: {e}");
            return Ok(exit_codes::RUN_FAILED);
        }
    };

    print!(
        "{}",
        console::format_condition_table(&condition_stats(&aggregate(&summary.runs)))
    );
    println!("summary:   {}", outputs.summary.display());
    println!("aggregate: {}", outputs.aggregate.display());
    Ok(exit_codes::OK)
}
