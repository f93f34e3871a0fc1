//! Strongly typed names used throughout the linked IR
//!
//! Names are kept exactly as the linker produced them. [`encode_name`] turns a
//! dotted name into the identifier-safe form used inside generated identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Identifier-safe encoding of this name
            pub fn encoded(&self) -> String {
                encode_name(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type!(
    /// Fully qualified class name, e.g. `lang.Object`
    ClassName
);
name_type!(
    /// Method name including its signature suffix, e.g. `hashCode__I`
    MethodName
);
name_type!(
    /// Field name, unique within its class
    FieldName
);
name_type!(
    /// Stable module id handed over by the module splitter
    ModuleId
);

/// The universal root class
pub const ROOT_CLASS: &str = "lang.Object";

/// The root of the throwable hierarchy, rewired onto the host `Error` type
pub const THROWABLE_CLASS: &str = "lang.Throwable";

/// The host constructor throwables are rewired to extend
pub const HOST_ERROR_CLASS: &str = "Error";

impl ClassName {
    pub fn root() -> Self {
        ClassName::new(ROOT_CLASS)
    }

    pub fn throwable() -> Self {
        ClassName::new(THROWABLE_CLASS)
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_CLASS
    }

    pub fn is_throwable(&self) -> bool {
        self.0 == THROWABLE_CLASS
    }
}

/// `typeof` result for hijacked primitive wrapper classes
///
/// Instances of these classes are host primitives, so instance tests use
/// `typeof` instead of the class data.
pub fn hijacked_typeof(class: &ClassName) -> Option<&'static str> {
    match class.as_str() {
        "lang.Boolean" => Some("boolean"),
        "lang.Byte" | "lang.Short" | "lang.Integer" | "lang.Float" | "lang.Double" => {
            Some("number")
        }
        "lang.String" => Some("string"),
        "lang.Void" => Some("undefined"),
        _ => None,
    }
}

/// Encode a name so it can be embedded in a generated identifier
///
/// ASCII alphanumerics are kept, `.` becomes `_`, `_` is escaped as `$_` and
/// anything else becomes `$u` followed by the hex code point.
///
/// # Examples
/// ```
/// use tessera_core::names::encode_name;
/// assert_eq!(encode_name("lang.Object"), "lang_Object");
/// assert_eq!(encode_name("hashCode__I"), "hashCode$_$_I");
/// ```
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '.' => out.push('_'),
            '_' => out.push_str("$_"),
            other => out.push_str(&format!("$u{:04x}", other as u32)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_dotted_names_distinct() {
        assert_eq!(encode_name("a.b"), "a_b");
        assert_eq!(encode_name("a_b"), "a$_b");
        assert_ne!(encode_name("a.b"), encode_name("a_b"));
    }

    #[test]
    fn test_encode_escapes_other_chars() {
        assert_eq!(encode_name("a-b"), "a$u002db");
        assert_eq!(encode_name("<init>"), "$u003cinit$u003e");
    }

    #[test]
    fn test_well_known_classes() {
        assert!(ClassName::root().is_root());
        assert!(ClassName::throwable().is_throwable());
        assert!(!ClassName::from("app.Main").is_root());
    }

    #[test]
    fn test_hijacked_typeof() {
        assert_eq!(hijacked_typeof(&"lang.Integer".into()), Some("number"));
        assert_eq!(hijacked_typeof(&"lang.String".into()), Some("string"));
        assert_eq!(hijacked_typeof(&"app.Point".into()), None);
    }
}
