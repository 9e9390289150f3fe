//! System identity resolution (user, host, pid).

use crate::application::ports::{IdentityProvider, SystemIdentity};

/// Resolves identity from the operating system.
///
/// The hostname is shortened to its first label so events stay readable
/// in multi-domain fleets; the user name comes from the conventional
/// environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentityProvider;

impl SystemIdentityProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }
}

impl IdentityProvider for SystemIdentityProvider {
    fn resolve(&self) -> SystemIdentity {
        SystemIdentity {
            user_name: resolve_user(),
            hostname: resolve_short_hostname(),
            process_id: std::process::id(),
        }
    }
}

fn resolve_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
}

fn resolve_short_hostname() -> Option<String> {
    let host = hostname::get().ok()?.to_string_lossy().into_owned();
    let short = host.split('.').next().unwrap_or(&host).trim().to_string();
    if short.is_empty() {
        None
    } else {
        Some(short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_current_pid() {
        let identity = SystemIdentityProvider::new().resolve();
        assert_eq!(identity.process_id, std::process::id());
    }

    #[test]
    fn test_hostname_has_no_domain() {
        if let Some(host) = SystemIdentityProvider::new().resolve().hostname {
            assert!(!host.contains('.'), "hostname {host} must be short");
        }
    }
}
