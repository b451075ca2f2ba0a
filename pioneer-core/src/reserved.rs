//! Reserved-key safety net: filenames a storage client manages internally
//! and a normal put/get/remove call may never target directly.
//!
//! Any caller operation naming one of these through the public surface must
//! fail with [`PioneerError::Reserved`](crate::PioneerError::Reserved);
//! internal machinery (header maintenance, lease refresh) bypasses the
//! safety wrapper to touch them directly.

/// Per-directory listing file. Named `._head.json`, the spelling used by
/// the header and external-interface sections describing this file;
/// the reserved-name enumeration elsewhere spells it `._header.json`
/// instead. The two disagree on the source this was built from, and
/// `._head.json` is the one carried here.
pub const HEADER_FILE: &str = "._head.json";
/// Per-client identity record, written once on first access.
pub const INFO_FILE: &str = "._info.json";
/// Storage-wide lease token written by the locking wrapper.
pub const LOCK_FILE: &str = "._lock.json";
/// Per-mount configuration file for the filesystem surface.
pub const MOUNT_FILE: &str = "._mount.json";
pub const ROOT_FILE: &str = "._root.json";

pub const RESERVED_NAMES: &[&str] = &[
    HEADER_FILE,
    INFO_FILE,
    LOCK_FILE,
    MOUNT_FILE,
    ROOT_FILE,
];

/// True if `name` (the final path segment) is a reserved key name.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_file_is_reserved() {
        assert!(is_reserved_name(HEADER_FILE));
    }

    #[test]
    fn ordinary_name_is_not_reserved() {
        assert!(!is_reserved_name("document.json"));
    }
}
