// src/model/usage.rs

//! Resource-usage counters reported by a backend for one attempt.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed profile report: a flat JSON object keyed by counter name.
pub type Profile = Map<String, Value>;

/// Usage counters absorbed from a profile report.
///
/// Every field stays `None` until a report containing it has been ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub exit_status: Option<i64>,
    pub percent_cpu: Option<i64>,
    pub wall_time: Option<i64>,

    pub cpu_time: Option<i64>,
    pub user_time: Option<i64>,
    pub system_time: Option<i64>,

    pub avg_rss_mem_kb: Option<i64>,
    pub max_rss_mem_kb: Option<i64>,
    pub avg_vms_mem_kb: Option<i64>,
    pub max_vms_mem_kb: Option<i64>,

    pub io_read_count: Option<i64>,
    pub io_write_count: Option<i64>,
    pub io_read_kb: Option<i64>,
    pub io_write_kb: Option<i64>,

    pub ctx_switch_voluntary: Option<i64>,
    pub ctx_switch_involuntary: Option<i64>,

    pub avg_num_threads: Option<i64>,
    pub max_num_threads: Option<i64>,

    pub avg_num_fds: Option<i64>,
    pub max_num_fds: Option<i64>,
}

impl ResourceUsage {
    /// Assign a profile entry to the counter of the same name.
    ///
    /// Returns `false` for unknown keys and for values that are not numbers;
    /// those are left for newer readers of the report.
    pub fn assign(&mut self, key: &str, value: &Value) -> bool {
        let slot = match key {
            "exit_status" => &mut self.exit_status,
            "percent_cpu" => &mut self.percent_cpu,
            "wall_time" => &mut self.wall_time,
            "cpu_time" => &mut self.cpu_time,
            "user_time" => &mut self.user_time,
            "system_time" => &mut self.system_time,
            "avg_rss_mem_kb" => &mut self.avg_rss_mem_kb,
            "max_rss_mem_kb" => &mut self.max_rss_mem_kb,
            "avg_vms_mem_kb" => &mut self.avg_vms_mem_kb,
            "max_vms_mem_kb" => &mut self.max_vms_mem_kb,
            "io_read_count" => &mut self.io_read_count,
            "io_write_count" => &mut self.io_write_count,
            "io_read_kb" => &mut self.io_read_kb,
            "io_write_kb" => &mut self.io_write_kb,
            "ctx_switch_voluntary" => &mut self.ctx_switch_voluntary,
            "ctx_switch_involuntary" => &mut self.ctx_switch_involuntary,
            "avg_num_threads" => &mut self.avg_num_threads,
            "max_num_threads" => &mut self.max_num_threads,
            "avg_num_fds" => &mut self.avg_num_fds,
            "max_num_fds" => &mut self.max_num_fds,
            _ => return false,
        };

        match as_integer(value) {
            Some(n) => {
                *slot = Some(n);
                true
            }
            None => false,
        }
    }
}

/// Integer view of a counter. Values that don't fit in an `i64` are skipped
/// rather than saturated.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if value.is_u64() {
        return None;
    }
    let f = value.as_f64()?.round();
    (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}
