use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::NAME_LEN;

/// A path component as stored in a directory entry: at most 11 bytes,
/// zero padded. Longer input is silently truncated, so two names sharing
/// their first 11 bytes refer to the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Name([u8; NAME_LEN]);

impl Name {
    pub fn new(component: &str) -> Self {
        let bytes = component.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        let mut name = [0; NAME_LEN];
        name[..len].copy_from_slice(&bytes[..len]);
        Self(name)
    }

    pub fn from_bytes(bytes: [u8; NAME_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    fn trimmed(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.0[..len]
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.trimmed()))
    }
}

/// Split `path` on `/`, dropping empty segments.
///
/// `"//a"` parses the same as `"/a"`, and a trailing slash is ignored.
pub(crate) fn to_path_parts(path: &str) -> Vec<Name> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(Name::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(to_path_parts("/a/b"), to_path_parts("//a//b/"));
        assert_eq!(to_path_parts("a/b"), to_path_parts("/a/b"));
        assert!(to_path_parts("/").is_empty());
        assert!(to_path_parts("").is_empty());
    }

    #[test]
    fn long_components_truncate_to_eleven_bytes() {
        assert_eq!(Name::new("averylongname1"), Name::new("averylongname2"));
        assert_ne!(Name::new("abcdefghijk"), Name::new("abcdefghijX"));
    }

    #[test]
    fn short_names_are_zero_padded() {
        let name = Name::new("a");
        assert_eq!(&name.as_bytes()[..2], b"a\0");
        assert_eq!(alloc::format!("{name}"), "a");
    }
}
