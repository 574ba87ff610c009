use md5::{Digest, Md5};
use uuid::Uuid;

/// Offline-mode player UUID: a name-based (v3) UUID over
/// `"OfflinePlayer:" + name`, matching what offline servers compute.
pub fn offline_uuid(player_name: &str) -> String {
    let digest = Md5::digest(format!("OfflinePlayer:{}", player_name).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes).hyphenated().to_string()
}
