use std::time::Duration;

pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
/// Peer relay is best effort; a slow peer is dropped after this long.
pub(crate) const PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
