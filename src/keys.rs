//! Deterministic cache key generation.
//!
//! Arguments are serialised to a `serde_json::Value` and encoded by shape:
//! primitives and short records keep a human-readable form for
//! debuggability, while long or unordered inputs collapse to a hex
//! SHA-256 digest so keys stay bounded in size with negligible collision
//! probability. Maps always hash because their iteration order is not
//! reliable across producers; records have a fixed field order and keep
//! their JSON text when short, like sequences.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::ser::Impossible;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{CacheError, MarshalJsonError};

/// Maximum length of an encoded key before it collapses to a digest
pub(crate) const MAX_KEY_LEN: usize = 100;

const NIL_KEY: &str = "nil";
const CONTEXT_KEY: &str = "context";

/// Marker argument for request-scoped values that carry no cacheable
/// identity. Every call with this argument fingerprints to the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpaqueContext;

/// Builds a deterministic string key for the given argument.
///
/// Equal arguments always produce equal keys; string-keyed maps with the
/// same content produce equal keys regardless of insertion order. Fails
/// with [`CacheError::BuildKey`] when the argument cannot be serialised.
pub(crate) fn build_key<K, E>(arg: &K) -> Result<String, CacheError<E>>
where
    K: Serialize + 'static,
{
    let any: &dyn Any = arg;
    if any.is::<OpaqueContext>() {
        return Ok(CONTEXT_KEY.to_string());
    }

    let value = serde_json::to_value(arg).map_err(|err| CacheError::BuildKey {
        details: "operation: building cache key".to_string(),
        source: MarshalJsonError {
            details: format!("operation: encoding value to build cache key; error: {err}"),
            source: Arc::new(err),
        },
    })?;

    // A JSON object can come from either a map or a record; only the map
    // shape takes the always-hash rule.
    let from_map = matches!(value, Value::Object(_)) && serialises_as_map(arg);

    Ok(cap_len(encode_value(&value, from_map)))
}

fn encode_value(value: &Value, from_map: bool) -> String {
    match value {
        Value::Null => NIL_KEY.to_string(),
        Value::Bool(flag) => format!("b:{flag}"),
        Value::Number(number) => number.to_string(),
        Value::String(text) => format!("s:{text}"),
        // Map keys carry no reliable order across producers, so map JSON
        // always collapses to a digest.
        Value::Object(_) if from_map => hash_bytes(value.to_string().as_bytes()),
        Value::Object(_) | Value::Array(_) => value.to_string(),
    }
}

fn cap_len(encoded: String) -> String {
    if encoded.len() > MAX_KEY_LEN {
        hash_bytes(encoded.as_bytes())
    } else {
        encoded
    }
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// True when the argument's top-level serialisation is map-shaped. serde
/// reports maps and structs through different serializer channels even
/// though both become JSON objects, so probing the serialisation keeps
/// the record/map distinction that `serde_json::to_value` erases.
fn serialises_as_map<K: Serialize>(arg: &K) -> bool {
    arg.serialize(MapProbe).is_ok()
}

/// Serializer that answers one question: does the value serialise as a
/// map? `Option` and newtype wrappers are classified by their payload;
/// every other shape fails the probe.
struct MapProbe;

#[derive(Debug)]
struct NotAMap;

impl fmt::Display for NotAMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("value does not serialise as a map")
    }
}

impl std::error::Error for NotAMap {}

impl serde::ser::Error for NotAMap {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        NotAMap
    }
}

/// Map entries are irrelevant to the probe; they are accepted and ignored.
struct MapEntries;

impl serde::ser::SerializeMap for MapEntries {
    type Ok = ();
    type Error = NotAMap;

    fn serialize_key<T>(&mut self, _key: &T) -> Result<(), NotAMap>
    where
        T: ?Sized + Serialize,
    {
        Ok(())
    }

    fn serialize_value<T>(&mut self, _value: &T) -> Result<(), NotAMap>
    where
        T: ?Sized + Serialize,
    {
        Ok(())
    }

    fn end(self) -> Result<(), NotAMap> {
        Ok(())
    }
}

impl serde::Serializer for MapProbe {
    type Ok = ();
    type Error = NotAMap;

    type SerializeSeq = Impossible<(), NotAMap>;
    type SerializeTuple = Impossible<(), NotAMap>;
    type SerializeTupleStruct = Impossible<(), NotAMap>;
    type SerializeTupleVariant = Impossible<(), NotAMap>;
    type SerializeMap = MapEntries;
    type SerializeStruct = Impossible<(), NotAMap>;
    type SerializeStructVariant = Impossible<(), NotAMap>;

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, NotAMap> {
        Ok(MapEntries)
    }

    fn serialize_some<T>(self, value: &T) -> Result<(), NotAMap>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<(), NotAMap>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_i8(self, _v: i8) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_i16(self, _v: i16) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_i32(self, _v: i32) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_i64(self, _v: i64) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_u8(self, _v: u8) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_u16(self, _v: u16) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_u32(self, _v: u32) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_u64(self, _v: u64) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_f32(self, _v: f32) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_f64(self, _v: f64) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_char(self, _v: char) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_str(self, _v: &str) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_none(self) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_unit(self) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), NotAMap> {
        Err(NotAMap)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), NotAMap>
    where
        T: ?Sized + Serialize,
    {
        Err(NotAMap)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, NotAMap> {
        Err(NotAMap)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, NotAMap> {
        Err(NotAMap)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, NotAMap> {
        Err(NotAMap)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, NotAMap> {
        Err(NotAMap)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, NotAMap> {
        Err(NotAMap)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, NotAMap> {
        Err(NotAMap)
    }
}
