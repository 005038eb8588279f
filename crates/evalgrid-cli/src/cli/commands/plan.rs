use super::super::args::PlanArgs;
use super::load_inputs;
use crate::exit_codes;
use evalgrid_core::RunPlan;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PlanView {
    config_name: String,
    dataset_sha256: String,
    samples: usize,
    conditions: Vec<ConditionView>,
    repetitions: u32,
    total_trials: usize,
    max_concurrent: usize,
    max_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ConditionView {
    name: String,
    tool_servers: Vec<String>,
    require_tool_use: bool,
    require_tool_success: bool,
}

pub fn run(args: PlanArgs) -> anyhow::Result<i32> {
    let (cfg, loaded) = match load_inputs(&args.config) {
        Ok(inputs) => inputs,
        Err(code) => return Ok(code),
    };
    let plan = match RunPlan::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("config error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let view = PlanView {
        config_name: plan.config_name.clone(),
        dataset_sha256: loaded.sha256.clone(),
        samples: loaded.samples.len(),
        conditions: plan
            .conditions
            .iter()
            .map(|c| ConditionView {
                name: c.name.clone(),
                tool_servers: c.tool_servers.iter().map(|s| s.name.clone()).collect(),
                require_tool_use: c.require_tool_use,
                require_tool_success: c.require_tool_success,
            })
            .collect(),
        repetitions: plan.repetitions,
        total_trials: plan.total_trials(loaded.samples.len()),
        max_concurrent: plan.settings.max_concurrent,
        max_attempts: plan.settings.retry.max_attempts,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(exit_codes::OK);
    }

    println!("config:       {}", view.config_name);
    println!("dataset:      {} samples (sha256 {})", view.samples, view.dataset_sha256);
    println!("repetitions:  {}", view.repetitions);
    println!("concurrency:  {}", view.max_concurrent);
    println!("attempts:     {}", view.max_attempts);
    println!("conditions:");
    for c in &view.conditions {
        let mut flags = Vec::new();
        if c.require_tool_use {
            flags.push("require_tool_use");
        }
        if c.require_tool_success {
            flags.push("require_tool_success");
        }
        let servers = if c.tool_servers.is_empty() {
            "-".to_string()
        } else {
            c.tool_servers.join(",")
        };
        println!("  {:<20} tools={} {}", c.name, servers, flags.join(" "));
    }
    println!("trials:       {}", view.total_trials);
    Ok(exit_codes::OK)
}
