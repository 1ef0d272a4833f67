//! Human-readable sizes and durations

use std::time::Duration;

/// Size in 1024-based units, one decimal: `0B`, `512.0B`, `1.5K`, `3.2M`, `1.0T`.
pub fn human_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut num = bytes as f64;
    for unit in ["B", "K", "M", "G"] {
        if num < 1024.0 {
            return format!("{:.1}{}", num, unit);
        }
        num /= 1024.0;
    }
    format!("{:.1}T", num)
}

/// `"<m> min <s> sec"`, whole seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{} min {} sec", total / 60, total % 60)
}
