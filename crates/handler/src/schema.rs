//! Decoding of query strings and form bodies into typed structures.
//!
//! The decoder is a serde [`Deserializer`] over the key/value pairs of an url encoded document.
//! It follows the rules of classic form decoders rather than the strict rules of a
//! self-describing format:
//!
//! * a declared field with no value gets the zero value of its type (`0`, `false`, `""`,
//!   `None`, an empty sequence, a zero valued nested struct)
//! * sequence fields collect every value of their key, scalar fields use the first one
//! * nested structs read dotted keys, `address.city=Paris`
//! * a value that fails to convert is recorded and decoding carries on, so one request
//!   reports all of its bad fields at once

use crate::BoxError;
use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserializer;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Several fields failed, sorted by key.
    #[error("{}", join_errors(.0))]
    Multi(Vec<(String, SchemaError)>),

    #[error("cannot convert {value:?} to {target}: {source}")]
    Conversion {
        key: String,
        value: String,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("unknown field: {key}")]
    UnknownKey { key: String },

    #[error("{0}")]
    Custom(String),
}

impl SchemaError {
    pub fn conversion(key: &str, value: &str, target: &str, source: impl Into<BoxError>) -> Self {
        Self::Conversion { key: key.to_string(), value: value.to_string(), target: target.to_string(), source: source.into() }
    }
}

impl de::Error for SchemaError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

fn join_errors(errors: &[(String, SchemaError)]) -> String {
    errors.iter().map(|(key, e)| format!("{key}: {e}")).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Error)]
#[error("invalid boolean literal")]
pub(crate) struct InvalidBool;

/// Parses the boolean literals `1 t T TRUE true True 0 f F FALSE false False`.
pub(crate) fn parse_bool(s: &str) -> Result<bool, InvalidBool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(InvalidBool),
    }
}

/// The decode rules applied to query strings and form bodies.
#[derive(Debug, Clone)]
pub struct SchemaDecoder {
    ignore_unknown_keys: bool,
}

impl Default for SchemaDecoder {
    fn default() -> Self {
        Self { ignore_unknown_keys: true }
    }
}

impl SchemaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// When disabled, a key that matches no declared field fails with [`SchemaError::UnknownKey`].
    #[must_use]
    pub fn with_ignore_unknown_keys(mut self, ignore: bool) -> Self {
        self.ignore_unknown_keys = ignore;
        self
    }

    pub fn ignore_unknown_keys(&self) -> bool {
        self.ignore_unknown_keys
    }

    /// Decodes an url encoded document such as a query string.
    pub fn decode_str<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, SchemaError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(encoded).map_err(|e| SchemaError::Custom(e.to_string()))?;
        self.decode(pairs)
    }

    /// Decodes already split key/value pairs, keys may repeat.
    pub fn decode<T, I>(&self, pairs: I) -> Result<T, SchemaError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            values.entry(key).or_default().push(value);
        }

        let decoding = Decoding { values, ignore_unknown_keys: self.ignore_unknown_keys, errors: RefCell::default() };
        let value = T::deserialize(Node::root(&decoding))?;

        let mut errors = decoding.errors.into_inner();
        match errors.len() {
            0 => Ok(value),
            1 => Err(errors.remove(0).1),
            _ => {
                errors.sort_by(|a, b| a.0.cmp(&b.0));
                Err(SchemaError::Multi(errors))
            }
        }
    }
}

struct Decoding {
    values: BTreeMap<String, Vec<String>>,
    ignore_unknown_keys: bool,
    errors: RefCell<Vec<(String, SchemaError)>>,
}

impl Decoding {
    fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Keys starting with `prefix`, paired with the remainder after it.
    fn keys_under<'s>(&'s self, prefix: &'s str) -> impl Iterator<Item = (&'s str, &'s str)> + 's {
        self.values
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key.as_str())
            .take_while(move |key| key.starts_with(prefix))
            .map(move |key| (&key[prefix.len()..], key))
    }

    fn record(&self, key: &str, err: SchemaError) {
        self.errors.borrow_mut().push((key.to_string(), err));
    }
}

/// Deserializes the value stored under one key, or the whole document for the root node.
struct Node<'a> {
    decoding: &'a Decoding,
    key: String,
    values: Option<&'a [String]>,
    root: bool,
}

impl<'a> Node<'a> {
    fn root(decoding: &'a Decoding) -> Self {
        Self { decoding, key: String::new(), values: None, root: true }
    }

    fn child(decoding: &'a Decoding, key: String) -> Self {
        let values = decoding.get(&key);
        Self { decoding, key, values, root: false }
    }

    fn prefix(&self) -> String {
        if self.root { String::new() } else { format!("{}.", self.key) }
    }

    fn first(&self) -> Option<&'a str> {
        self.values.and_then(|values| values.first()).map(String::as_str)
    }

    fn has_nested(&self) -> bool {
        let prefix = self.prefix();
        self.decoding.keys_under(&prefix).next().is_some()
    }

    /// Parses the first value, recording a failure and falling back to the zero value.
    fn parse<T>(&self, target: &str) -> T
    where
        T: FromStr + Default,
        T::Err: Into<BoxError>,
    {
        match self.first() {
            None | Some("") => T::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e: T::Err| {
                self.decoding.record(&self.key, SchemaError::conversion(&self.key, raw, target, e));
                T::default()
            }),
        }
    }

    fn parse_bool(&self) -> bool {
        match self.first() {
            None | Some("") => false,
            Some("on") => true,
            Some(raw) => parse_bool(raw).unwrap_or_else(|e| {
                self.decoding.record(&self.key, SchemaError::conversion(&self.key, raw, "bool", e));
                false
            }),
        }
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident($ty:ty);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                visitor.$visit(self.parse::<$ty>(stringify!($ty)))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for Node<'_> {
    type Error = SchemaError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.root {
            return self.deserialize_map(visitor);
        }
        match self.first() {
            Some(value) => visitor.visit_str(value),
            None if self.has_nested() => self.deserialize_map(visitor),
            None => visitor.visit_unit(),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bool(self.parse_bool())
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8(i8);
        deserialize_i16 => visit_i16(i16);
        deserialize_i32 => visit_i32(i32);
        deserialize_i64 => visit_i64(i64);
        deserialize_i128 => visit_i128(i128);
        deserialize_u8 => visit_u8(u8);
        deserialize_u16 => visit_u16(u16);
        deserialize_u32 => visit_u32(u32);
        deserialize_u64 => visit_u64(u64);
        deserialize_u128 => visit_u128(u128);
        deserialize_f32 => visit_f32(f32);
        deserialize_f64 => visit_f64(f64);
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.first() {
            None | Some("") => visitor.visit_char('\0'),
            Some(_) => visitor.visit_char(self.parse::<char>("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str(self.first().unwrap_or_default())
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bytes(self.first().unwrap_or_default().as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let present = self.values.is_some_and(|values| values.iter().any(|v| !v.is_empty()));
        if present || (!self.root && self.has_nested()) { visitor.visit_some(self) } else { visitor.visit_none() }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let values = self.values.unwrap_or_default();
        visitor.visit_seq(Elements { decoding: self.decoding, key: self.key, values: values.iter() })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let prefix = self.prefix();
        let entries = self
            .decoding
            .keys_under(&prefix)
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, key)| (name.to_string(), key.to_string()))
            .collect::<Vec<_>>();
        visitor.visit_map(Entries { decoding: self.decoding, entries: entries.into_iter(), pending: None })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let prefix = self.prefix();

        if !self.decoding.ignore_unknown_keys {
            for (rest, key) in self.decoding.keys_under(&prefix) {
                let name = rest.split('.').next().unwrap_or(rest);
                if !fields.contains(&name) {
                    self.decoding.record(key, SchemaError::UnknownKey { key: key.to_string() });
                }
            }
        }

        let entries = fields.iter().map(|field| ((*field).to_string(), format!("{prefix}{field}"))).collect::<Vec<_>>();
        visitor.visit_map(Entries { decoding: self.decoding, entries: entries.into_iter(), pending: None })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.first() {
            None | Some("") => Err(SchemaError::Custom(format!("missing value for field {:?}", self.key))),
            Some(raw) => {
                let variant: StringDeserializer<SchemaError> = raw.to_string().into_deserializer();
                visitor.visit_enum(variant).map_err(|e| SchemaError::conversion(&self.key, raw, name, e))
            }
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct Elements<'a> {
    decoding: &'a Decoding,
    key: String,
    values: std::slice::Iter<'a, String>,
}

impl<'de> SeqAccess<'de> for Elements<'_> {
    type Error = SchemaError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error> {
        let Some(value) = self.values.next() else {
            return Ok(None);
        };
        let node =
            Node { decoding: self.decoding, key: self.key.clone(), values: Some(std::slice::from_ref(value)), root: false };
        seed.deserialize(node).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

struct Entries<'a> {
    decoding: &'a Decoding,
    entries: std::vec::IntoIter<(String, String)>,
    pending: Option<String>,
}

impl<'de> MapAccess<'de> for Entries<'_> {
    type Error = SchemaError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error> {
        let Some((name, key)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(key);
        let name: StringDeserializer<SchemaError> = name.into_deserializer();
        seed.deserialize(name).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let key = self.pending.take().ok_or_else(|| SchemaError::Custom("value requested before its key".into()))?;
        seed.deserialize(Node::child(self.decoding, key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}
