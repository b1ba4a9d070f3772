//! Process-wide network interceptor.
//!
//! Installed as a scope by the guard: while any command scope is active,
//! every outbound connect in the process must route through
//! [`guarded_connect`], which records the attempt and refuses it unless an
//! unexpired egress trust token authorized it at scope entry.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use mnemon_core::errors::PolicyError;
use mnemon_core::MnemonResult;

static ACTIVE_SCOPES: AtomicUsize = AtomicUsize::new(0);
static EGRESS_ALLOWED: AtomicBool = AtomicBool::new(false);
static ATTEMPTED_CONNECTS: AtomicU64 = AtomicU64::new(0);

/// RAII installation of the interceptor. Held by the guard scope; removed
/// on every exit path including unwinds.
pub(crate) struct InterceptorScope;

pub(crate) fn install(egress_allowed: bool) -> InterceptorScope {
    ACTIVE_SCOPES.fetch_add(1, Ordering::SeqCst);
    EGRESS_ALLOWED.store(egress_allowed, Ordering::SeqCst);
    InterceptorScope
}

impl Drop for InterceptorScope {
    fn drop(&mut self) {
        if ACTIVE_SCOPES.fetch_sub(1, Ordering::SeqCst) == 1 {
            EGRESS_ALLOWED.store(false, Ordering::SeqCst);
        }
    }
}

pub fn guard_active() -> bool {
    ACTIVE_SCOPES.load(Ordering::SeqCst) > 0
}

pub fn attempted_connects() -> u64 {
    ATTEMPTED_CONNECTS.load(Ordering::SeqCst)
}

/// The single choke point for outbound sockets. Records every attempt;
/// refuses with `EgressBlocked` unless the current scope authorized egress.
pub fn guarded_connect(target: &str) -> MnemonResult<TcpStream> {
    ATTEMPTED_CONNECTS.fetch_add(1, Ordering::SeqCst);
    if !EGRESS_ALLOWED.load(Ordering::SeqCst) {
        tracing::warn!(target, "outbound connect refused");
        return Err(PolicyError::EgressBlocked {
            target: target.to_string(),
        }
        .into());
    }
    tracing::info!(target, "outbound connect authorized by trust token");
    Ok(TcpStream::connect(target)?)
}

/// Proxy environment variables imply an intent to route traffic; the
/// offline proof surfaces their presence.
pub fn proxies_present() -> bool {
    ["http_proxy", "https_proxy", "all_proxy", "HTTP_PROXY", "HTTPS_PROXY", "ALL_PROXY"]
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_refused_and_recorded_without_token() {
        let _scope = install(false);
        let before = attempted_connects();
        let err = guarded_connect("127.0.0.1:1").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(attempted_connects(), before + 1);
    }

    #[test]
    fn scope_activates_and_deactivates_guard() {
        assert!(!guard_active() || ACTIVE_SCOPES.load(Ordering::SeqCst) > 0);
        {
            let _scope = install(false);
            assert!(guard_active());
        }
    }
}
