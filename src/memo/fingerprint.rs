//! Call Fingerprints
//!
//! Deterministic cache keys for memoized calls.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Fingerprint ==
/// Identifies one call by receiver identity, operation name and arguments.
///
/// The triple is encoded as a JSON array, so the encoding is unambiguous:
/// argument order and values always change the fingerprint, and
/// structurally equal arguments always agree (map entries are sorted).
/// Arguments pass through MessagePack first, which keeps values JSON
/// cannot tell apart (`NaN`, infinities and `None`) distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds the fingerprint of `operation(args)` called on `identity`.
    ///
    /// # Errors
    /// `CacheError::Serialization` if `args` cannot be serialized.
    pub fn new<A>(identity: &str, operation: &str, args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        let packed = rmp_serde::to_vec_named(args).map_err(serialization_error)?;
        let args: CanonicalArg = rmp_serde::from_slice(&packed).map_err(serialization_error)?;
        let encoded = serde_json::to_string(&(identity, operation, args))?;
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity derived from a receiver's type name.
pub fn identity_of<S: ?Sized>() -> &'static str {
    std::any::type_name::<S>()
}

fn serialization_error<E: fmt::Display>(err: E) -> CacheError {
    CacheError::Serialization(serde::ser::Error::custom(err))
}

// == Canonical Arguments ==
/// Self-describing argument tree with one spelling per value.
///
/// Floats are kept as their `Debug` text (`NaN`, `inf`, `-0.0`) and every
/// variant is tagged in the JSON output, so a float never reads like a
/// string or a null.
#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
enum CanonicalArg {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(String),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<CanonicalArg>),
    /// Entries sorted by key
    Map(Vec<(CanonicalArg, CanonicalArg)>),
}

impl<'de> Deserialize<'de> for CanonicalArg {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CanonicalVisitor)
    }
}

struct CanonicalVisitor;

impl<'de> Visitor<'de> for CanonicalVisitor {
    type Value = CanonicalArg;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any MessagePack value")
    }

    fn visit_unit<E>(self) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Nil)
    }

    fn visit_none<E>(self) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Nil)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<CanonicalArg, D::Error>
    where
        D: Deserializer<'de>,
    {
        CanonicalArg::deserialize(deserializer)
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Int(value))
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::UInt(value))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Float(format!("{value:?}")))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Str(value.to_owned()))
    }

    fn visit_bytes<E>(self, value: &[u8]) -> std::result::Result<CanonicalArg, E> {
        Ok(CanonicalArg::Bytes(value.to_vec()))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<CanonicalArg, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(CanonicalArg::Seq(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<CanonicalArg, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        entries.sort();
        Ok(CanonicalArg::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_same_call_same_fingerprint() {
        let a = Fingerprint::new("Repo", "find", &(1, "x")).unwrap();
        let b = Fingerprint::new("Repo", "find", &(1, "x")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_argument_order_matters() {
        let a = Fingerprint::new("Repo", "find", &[1, 2]).unwrap();
        let b = Fingerprint::new("Repo", "find", &[2, 1]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_separators_cannot_collide() {
        let a = Fingerprint::new("a#b", "c", &()).unwrap();
        let b = Fingerprint::new("a", "b#c", &()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_and_operation_matter() {
        let base = Fingerprint::new("Repo", "find", &[1]).unwrap();
        assert_ne!(base, Fingerprint::new("Other", "find", &[1]).unwrap());
        assert_ne!(base, Fingerprint::new("Repo", "list", &[1]).unwrap());
    }

    #[test]
    fn test_map_arguments_are_order_independent() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = HashMap::new();
        second.insert("a", 1);
        second.insert("b", 2);

        assert_eq!(
            Fingerprint::new("Repo", "query", &first).unwrap(),
            Fingerprint::new("Repo", "query", &second).unwrap()
        );
    }

    #[test]
    fn test_non_string_map_keys_are_accepted() {
        let mut args = HashMap::new();
        args.insert((1, 2), "pair");

        assert!(Fingerprint::new("Repo", "query", &args).is_ok());
    }

    #[test]
    fn test_unserializable_args_fail() {
        struct Opaque;

        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque handle"))
            }
        }

        let err = Fingerprint::new("Repo", "query", &Opaque).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_non_finite_floats_and_none_stay_distinct() {
        let nan = Fingerprint::new("Repo", "f", &[f64::NAN]).unwrap();
        let inf = Fingerprint::new("Repo", "f", &[f64::INFINITY]).unwrap();
        let neg_inf = Fingerprint::new("Repo", "f", &[f64::NEG_INFINITY]).unwrap();
        let none = Fingerprint::new("Repo", "f", &[None::<f64>]).unwrap();

        assert_ne!(nan, none);
        assert_ne!(nan, inf);
        assert_ne!(inf, neg_inf);
        assert_ne!(inf, none);
        assert_eq!(nan, Fingerprint::new("Repo", "f", &[f64::NAN]).unwrap());
    }

    #[test]
    fn test_float_is_not_confused_with_its_text() {
        let float = Fingerprint::new("Repo", "f", &[f64::NAN]).unwrap();
        let text = Fingerprint::new("Repo", "f", &["NaN"]).unwrap();

        assert_ne!(float, text);
    }

    #[test]
    fn test_identity_of_uses_type_name() {
        struct Repo;
        assert!(identity_of::<Repo>().ends_with("Repo"));
    }

    proptest! {
        #[test]
        fn prop_distinct_args_distinct_fingerprints(a in any::<Vec<i64>>(), b in any::<Vec<i64>>()) {
            let fa = Fingerprint::new("Repo", "find", &a).unwrap();
            let fb = Fingerprint::new("Repo", "find", &b).unwrap();
            prop_assert_eq!(a == b, fa == fb);
        }
    }
}
