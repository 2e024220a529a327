//! Session-related types.
//!
//! Key names match what the browser client historically kept in local
//! storage, so support tooling can read either.

/// Session keys for authentication and inventory state.
pub mod keys {
    /// Cached profile of the signed-in user.
    pub const USER: &str = "user";

    /// Bearer token issued by the backend at sign-in.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Legacy alias of the access token, still honored on read.
    pub const AUTH_TOKEN: &str = "authToken";

    /// When the cached profile was last fetched from the backend.
    pub const USER_REFRESHED_AT: &str = "userRefreshedAt";

    /// Last inventory query, restored when `/inventory` is opened without parameters.
    pub const INVENTORY_QUERY: &str = "inventoryQuery";

    /// Every key removed on sign-out.
    pub const AUTH_KEYS: [&str; 5] = [
        USER,
        ACCESS_TOKEN,
        AUTH_TOKEN,
        USER_REFRESHED_AT,
        INVENTORY_QUERY,
    ];
}

/// Cookie older clients set alongside the session; expired on sign-out.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
