//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Package import path, the unique key of a package within one resolution run.
    #[derive(Default)]
    ImportPath
);

string_newtype!(
    /// Hex-encoded blake3 digest of a finished archive.
    ArchiveDigest
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_path_display_and_as_ref() {
        let p = ImportPath::new("github.com/u-root/u-root/cmds/ls");
        assert_eq!(p.to_string(), "github.com/u-root/u-root/cmds/ls");
        assert_eq!(p.as_str(), "github.com/u-root/u-root/cmds/ls");
        assert_eq!(AsRef::<str>::as_ref(&p), "github.com/u-root/u-root/cmds/ls");
    }

    #[test]
    fn import_path_serde_is_transparent() {
        let p = ImportPath::new("fmt");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"fmt\"");
        let back: ImportPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn import_path_joins_as_path() {
        let p = ImportPath::from("os/exec");
        let joined = std::path::Path::new("src").join(&p);
        assert_eq!(joined, std::path::Path::new("src/os/exec"));
    }

    #[test]
    fn digest_into_inner() {
        let d = ArchiveDigest::new("abc".to_owned());
        assert_eq!(d.into_inner(), "abc");
    }
}
