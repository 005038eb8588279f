//! Process exit codes. Part of the CLI contract.

use evalgrid_core::RunError;

pub const OK: i32 = 0;
pub const RUN_FAILED: i32 = 1; // A trial failed for good, or a report could not be produced
pub const CONFIG_ERROR: i32 = 2; // Invalid config or dataset; nothing was run

pub fn for_run_error(err: &RunError) -> i32 {
    if err.is_setup_error() {
        CONFIG_ERROR
    } else {
        RUN_FAILED
    }
}
