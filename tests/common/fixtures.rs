//! Common test fixtures and constants.

use rsnmp::{Oid, oid};

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

// =============================================================================
// Subtree roots (for walks)
// =============================================================================

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// Interfaces subtree root: 1.3.6.1.2.1.2
pub fn interfaces_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2)
}

/// First scalar of the interfaces subtree: ifNumber.0
pub fn if_number() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 1, 0)
}

// =============================================================================
// Credentials
// =============================================================================

/// Auth password for all V3 users
pub const AUTH_PASSWORD: &str = "authpass123";
/// Privacy password for all V3 users
pub const PRIV_PASSWORD: &str = "privpass123";

/// V2c read-only community
pub const COMMUNITY_RO: &[u8] = b"public";

/// V3 usernames configured on the simulated agent
pub mod users {
    pub const NOAUTH_USER: &str = "noauth_user";
    pub const AUTHSHA1_USER: &str = "authsha1_user";
    pub const PRIVAES128_USER: &str = "privaes128_user";
    pub const PRIVDES_USER: &str = "privdes_user";
}
