//! free - show execution context usage

use crate::interpreter::context_pool::{lock_pool, PoolStats};
use crate::interpreter::types::{ExecEnv, ExecResult};

pub fn handle_free(env: &ExecEnv) -> ExecResult {
    let stats = match &env.pool {
        Some(pool) => lock_pool(pool).stats(),
        None => PoolStats { capacity: 0, available: 0, in_use: 0, temporary: 0 },
    };
    ExecResult::output(format_stats(&stats))
}

fn format_stats(stats: &PoolStats) -> String {
    format!(
        "{:<10}{:>8}{:>8}{:>8}{:>11}\n{:<10}{:>8}{:>8}{:>8}{:>11}\n",
        "", "total", "used", "free", "temporary",
        "contexts", stats.capacity, stats.in_use, stats.available, stats.temporary,
    )
}
