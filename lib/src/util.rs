use chrono::Local;

/// Human-readable wall-clock timestamp used for process bookkeeping and
/// report headers, e.g. `10/30/2026, 09:15:04 AM`.
pub fn current_timestamp() -> String {
    Local::now().format("%m/%d/%Y, %I:%M:%S %p").to_string()
}
