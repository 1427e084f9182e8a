//! Provider error classification
//!
//! Decides whether a failed provider operation is worth retrying. The
//! decision reads the rendered error chain (providers surface well-known
//! message substrings and wrapped OS errors) plus `std::io::Error` kinds
//! found anywhere in the chain.
//!
//! Permanent markers win over everything else; an error nothing matches
//! is treated as transient, preferring to keep trying over giving up.

use std::io;

/// Retry-relevant classification of a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retrying cannot succeed without operator action
    Permanent,
    /// The next retry has a reasonable chance of succeeding
    Transient,
}

/// Message markers for errors that no retry can fix
const PERMANENT_MARKERS: &[&str] = &[
    "invalid_grant",
    "permission denied",
    "folder not found",
    "invalid folder",
    "403 forbidden",
];

/// Message markers for recognizably transient failures
///
/// Classification does not depend on this list (anything non-permanent is
/// retried), but a hit here is logged as a recognized network condition
/// rather than an assumed-transient unknown.
const TRANSIENT_MARKERS: &[&str] = &[
    "econnreset",
    "etimedout",
    "enotfound",
    "eai_again",
    "econnrefused",
    "enetunreach",
    "ehostunreach",
    "ehostdown",
    "enetdown",
    "epipe",
    "network",
    "offline",
    "timeout",
    "connection",
    "authentication failed",
    "auth",
    "token expired",
];

fn rendered(err: &anyhow::Error) -> String {
    format!("{err:#}").to_lowercase()
}

/// Classifies a provider error as permanent or transient
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    let text = rendered(err);
    if PERMANENT_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorClass::Permanent
    } else {
        ErrorClass::Transient
    }
}

/// Whether the error matches a recognized transient signature
///
/// Checks the marker list and any `std::io::Error` in the chain.
pub fn is_known_transient(err: &anyhow::Error) -> bool {
    let text = rendered(err);
    if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }

    err.chain().any(|cause| {
        cause.downcast_ref::<io::Error>().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        })
    })
}

/// Whether a failed delta call means the persisted token is stale
///
/// A stale token is neither retried nor terminal: the caller clears it
/// and falls back to a full scan in the same cycle.
pub fn is_stale_delta_token(err: &anyhow::Error) -> bool {
    let text = rendered(err);
    text.contains("410") || text.contains("gone") || text.contains("resync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_is_permanent() {
        let err = anyhow::anyhow!("token endpoint returned invalid_grant");
        assert_eq!(classify(&err), ErrorClass::Permanent);
    }

    #[test]
    fn permission_and_folder_errors_are_permanent() {
        for msg in [
            "Permission Denied while listing drive",
            "graph request failed: 403 Forbidden: access denied",
            "scan failed: folder not found",
            "invalid folder id supplied",
        ] {
            assert_eq!(classify(&anyhow::anyhow!("{msg}")), ErrorClass::Permanent, "{msg}");
        }
    }

    #[test]
    fn permanent_markers_match_through_context_chains() {
        let root = anyhow::anyhow!("invalid_grant: refresh token revoked");
        let wrapped = root.context("provider initialization failed");
        assert_eq!(classify(&wrapped), ErrorClass::Permanent);
    }

    #[test]
    fn network_errors_are_transient() {
        for msg in [
            "connect ETIMEDOUT 93.184.216.34:443",
            "getaddrinfo ENOTFOUND graph.microsoft.com",
            "read ECONNRESET",
            "network is unreachable",
            "authentication failed: token expired",
        ] {
            let err = anyhow::anyhow!("{msg}");
            assert_eq!(classify(&err), ErrorClass::Transient, "{msg}");
            assert!(is_known_transient(&err), "{msg}");
        }
    }

    #[test]
    fn io_error_kinds_are_recognized_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err = anyhow::Error::from(io_err).context("download failed");
        assert_eq!(classify(&err), ErrorClass::Transient);
        assert!(is_known_transient(&err));
    }

    #[test]
    fn unknown_errors_default_to_transient() {
        let err = anyhow::anyhow!("something nobody has seen before");
        assert_eq!(classify(&err), ErrorClass::Transient);
        assert!(!is_known_transient(&err));
    }

    #[test]
    fn stale_delta_token_is_detected() {
        assert!(is_stale_delta_token(&anyhow::anyhow!(
            "graph request failed: 410 Gone: resyncRequired"
        )));
        assert!(!is_stale_delta_token(&anyhow::anyhow!("connect ETIMEDOUT")));
    }
}
