use uuid::Uuid;

/// Application name
pub const APP_NAME: &str = "Huddle";

/// Maximum message length in characters
pub const MAX_MESSAGE_LEN: usize = 4_096;

/// Maximum group name length in characters
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Capacity of each per-chat live broadcast channel
pub const STREAM_BUFFER_SIZE: usize = 100;

/// Namespace for UUIDv5 direct chat ids derived from the participant pair.
pub const DIRECT_CHAT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x3c, 0x52, 0x9a, 0x0e, 0x4d, 0x7b, 0x8c, 0x21, 0x5e, 0x90, 0x47, 0xd3, 0xa8, 0x16,
]);

/// Placeholder names used when a profile has no display data.
pub const FALLBACK_SELF_NAME: &str = "User";
pub const FALLBACK_PEER_NAME: &str = "Contact";
pub const FALLBACK_MEMBER_NAME: &str = "Member";
pub const FALLBACK_UNKNOWN_NAME: &str = "Unknown User";
