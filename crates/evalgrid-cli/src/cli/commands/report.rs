use super::super::args::ReportArgs;
use crate::exit_codes;
use evalgrid_core::report::{
    aggregate, console, json::write_aggregate, read_summary, AggregateReport,
};

pub fn run(args: ReportArgs) -> anyhow::Result<i32> {
    let summary = match read_summary(&args.summary) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("report error: {e}");
            return Ok(exit_codes::RUN_FAILED);
        }
    };
    let report = AggregateReport::build(&summary, chrono::Utc::now());

    println!(
        "run {} ({}): {} runs",
        report.run_id, report.config_name, report.total_runs
    );
    print!("{}", console::format_condition_table(&report.conditions));
    if args.groups {
        print!("{}", console::format_group_lines(&aggregate(&summary.runs)));
    }

    if let Some(out) = &args.out {
        if let Err(e) = write_aggregate(&report, out) {
            eprintln!("report error: {e}");
            return Ok(exit_codes::RUN_FAILED);
        }
        tracing::info!(path = %out.display(), "aggregate report written");
    }
    Ok(exit_codes::OK)
}
