// Worker constants (no magic values)
use std::time::Duration;

/// Sleep after a dispatch error before resuming intake (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How long `stop_all` waits for a worker task to wind down (5s)
pub const STOP_ALL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default outbound callback timeout when a subscriber sets none (10s)
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Warn threshold for slow facade calls (300ms, from the dispatch bridge's
/// operational baseline)
pub const SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(300);
