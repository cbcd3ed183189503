use std::time::Duration;

/// The timeout after which a pending request is considered lost.
///
/// Responses arriving after this are treated as stale and dropped.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The amount of times a timed-out connection-point probe is re-sent before the
/// search is abandoned and the peer is no longer considered for syncing.
pub(crate) const MAX_PROBE_RETRIES: u32 = 1;
