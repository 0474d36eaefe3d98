/// Application name
pub const APP_NAME: &str = "Hirelink";

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Prefix for client-assigned temporary message ids. Server ids are bare
/// UUIDs, so the prefix guarantees the two spaces never collide.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Prefix for the derived id of the synthesized proposal pseudo-message.
pub const PROPOSAL_ID_PREFIX: &str = "application_";

/// Default HTTP API / gateway port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Lifetime of issued bearer tokens, in hours
pub const TOKEN_TTL_HOURS: i64 = 24;
