//! Closed sets of canonical string values.
//!
//! # Design
//! A closed set is declared once with `closed_set!`, which expands to a plain
//! Rust enum plus a `ClosedSet` impl. Membership and conversion share a single
//! generated `lookup` match, so `contains` and `from_value` cannot disagree.
//! Because every declaration is its own type, two sets with identical members
//! never compare equal.

use std::fmt;
use std::hash::Hash;

use crate::error::InvalidValueError;

/// A fixed, finite set of named members, each with a unique canonical value.
pub trait ClosedSet: Copy + Eq + Hash + fmt::Debug + 'static {
    /// Name of the declaring type, reported in `InvalidValueError`.
    const TYPE_NAME: &'static str;

    /// All members in declaration order.
    fn members() -> &'static [Self];

    /// Declared member name.
    fn name(self) -> &'static str;

    /// Canonical wire value.
    fn value(self) -> &'static str;

    /// The member whose canonical value is exactly `raw`.
    fn lookup(raw: &str) -> Option<Self>;

    fn from_value(raw: &str) -> Result<Self, InvalidValueError> {
        Self::lookup(raw).ok_or_else(|| InvalidValueError {
            type_name: Self::TYPE_NAME,
            raw: raw.to_string(),
            allowed: Self::values(),
        })
    }

    fn contains(raw: &str) -> bool {
        Self::lookup(raw).is_some()
    }

    fn values() -> Vec<&'static str> {
        Self::members().iter().map(|member| member.value()).collect()
    }

    /// `(name, value)` pairs in declaration order.
    fn entries() -> Vec<(&'static str, &'static str)> {
        Self::members()
            .iter()
            .map(|member| (member.name(), member.value()))
            .collect()
    }
}

/// Shape description used in validation violations.
pub fn describe<S: ClosedSet>() -> String {
    format!("one of {:?}", S::values())
}

/// Whether no two canonical values are equal. Evaluated at compile time by
/// `closed_set!`.
#[doc(hidden)]
pub const fn values_are_unique(values: &[&str]) -> bool {
    let mut i = 0;
    while i < values.len() {
        let mut j = i + 1;
        while j < values.len() {
            if same_bytes(values[i].as_bytes(), values[j].as_bytes()) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn same_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Declares a closed set.
///
/// Canonical values must be unique; a repeated value fails to compile:
///
/// ```compile_fail
/// cloud_core::closed_set! {
///     enum Twice {
///         First => "same",
///         Second => "same",
///     }
/// }
/// ```
///
/// ```
/// cloud_core::closed_set! {
///     /// Power state of a machine.
///     pub enum Power {
///         On => "on",
///         Off => "off",
///     }
/// }
///
/// use cloud_core::ClosedSet;
/// assert_eq!(Power::from_value("on").unwrap(), Power::On);
/// assert!(!Power::contains("standby"));
/// ```
#[macro_export]
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        const _: () = ::std::assert!(
            $crate::closed_set::values_are_unique(&[$( $value ),+]),
            ::std::concat!("duplicate canonical value in closed set ", ::std::stringify!($name)),
        );

        impl $crate::closed_set::ClosedSet for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn members() -> &'static [Self] {
                &[$( $name::$variant ),+]
            }

            fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant) ),+
                }
            }

            fn value(self) -> &'static str {
                match self {
                    $( $name::$variant => $value ),+
                }
            }

            fn lookup(raw: &str) -> ::std::option::Option<Self> {
                match raw {
                    $( $value => ::std::option::Option::Some($name::$variant), )+
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::closed_set::ClosedSet::value(*self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::InvalidValueError;

            fn from_str(raw: &str) -> ::std::result::Result<Self, Self::Err> {
                <Self as $crate::closed_set::ClosedSet>::from_value(raw)
            }
        }

        impl $crate::model::FieldValue for $name {
            fn expected() -> ::std::string::String {
                $crate::closed_set::describe::<Self>()
            }

            fn from_field(
                raw: &$crate::model::Value,
                path: &str,
                violations: &mut ::std::vec::Vec<$crate::error::Violation>,
            ) -> ::std::option::Option<Self> {
                $crate::model::closed_set_field(raw, path, violations)
            }

            fn to_field(&self) -> $crate::model::Value {
                $crate::model::Value::from($crate::closed_set::ClosedSet::value(*self))
            }
        }
    };
}
