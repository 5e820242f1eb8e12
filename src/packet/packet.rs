// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable, reference-counted, timestamped values.
//!
//! A [`Packet`] is a cheap handle: cloning it clones an `Arc`, never the
//! payload. Re-stamping with [`Packet::at`] returns a new handle that shares
//! the same payload. Payloads are a closed set of common variants plus a
//! [`Payload::Custom`] escape hatch checked by `TypeId` at read time.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::errors::PacketError;
use crate::packet::Timestamp;

/// Type-erased value for payloads outside the built-in variants.
#[derive(Clone)]
pub struct CustomPayload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CustomPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.value.as_ref().type_id()
    }
}

/// The value carried by a packet.
#[derive(Clone)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Custom(CustomPayload),
}

impl Payload {
    /// The declared type this payload satisfies.
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Bool(_) => PayloadType::Bool,
            Payload::Int(_) => PayloadType::Int,
            Payload::Float(_) => PayloadType::Float,
            Payload::Text(_) => PayloadType::Text,
            Payload::Bytes(_) => PayloadType::Bytes,
            Payload::Json(_) => PayloadType::Json,
            Payload::Custom(custom) => PayloadType::Custom(custom.type_name.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Bool(_) => std::any::type_name::<bool>(),
            Payload::Int(_) => std::any::type_name::<i64>(),
            Payload::Float(_) => std::any::type_name::<f64>(),
            Payload::Text(_) => std::any::type_name::<String>(),
            Payload::Bytes(_) => std::any::type_name::<Vec<u8>>(),
            Payload::Json(_) => std::any::type_name::<serde_json::Value>(),
            Payload::Custom(custom) => custom.type_name,
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Payload::Bool(v) => v,
            Payload::Int(v) => v,
            Payload::Float(v) => v,
            Payload::Text(v) => v,
            Payload::Bytes(v) => v,
            Payload::Json(v) => v,
            Payload::Custom(custom) => custom.value.as_ref(),
        }
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Bool(v) => write!(f, "Bool({})", v),
            Payload::Int(v) => write!(f, "Int({})", v),
            Payload::Float(v) => write!(f, "Float({})", v),
            Payload::Text(v) => write!(f, "Text({:?})", v),
            Payload::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Payload::Json(v) => write!(f, "Json({})", v),
            Payload::Custom(custom) => write!(f, "Custom({})", custom.type_name),
        }
    }
}

macro_rules! payload_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::$variant(value)
                }
            }
        )*
    };
}

payload_from! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

/// Declared type of a stream or side-packet port.
///
/// Parsed from the lowercase names `any`, `bool`, `int`, `float`, `text`,
/// `bytes`, `json`; any other name is treated as a custom type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PayloadType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Json,
    Custom(String),
}

impl PayloadType {
    /// Declared type for a custom Rust type.
    pub fn custom<T: Any>() -> Self {
        PayloadType::Custom(std::any::type_name::<T>().to_string())
    }

    /// Two declarations are compatible when they are equal or either is `Any`.
    pub fn is_compatible_with(&self, other: &PayloadType) -> bool {
        matches!(self, PayloadType::Any) || matches!(other, PayloadType::Any) || self == other
    }

    /// True when `payload` may travel on a port declared with this type.
    pub fn accepts(&self, payload: &Payload) -> bool {
        self.is_compatible_with(&payload.payload_type())
    }
}

impl From<String> for PayloadType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "any" => PayloadType::Any,
            "bool" => PayloadType::Bool,
            "int" => PayloadType::Int,
            "float" => PayloadType::Float,
            "text" => PayloadType::Text,
            "bytes" => PayloadType::Bytes,
            "json" => PayloadType::Json,
            _ => PayloadType::Custom(value),
        }
    }
}

impl From<PayloadType> for String {
    fn from(value: PayloadType) -> Self {
        value.to_string()
    }
}

impl Display for PayloadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadType::Any => write!(f, "any"),
            PayloadType::Bool => write!(f, "bool"),
            PayloadType::Int => write!(f, "int"),
            PayloadType::Float => write!(f, "float"),
            PayloadType::Text => write!(f, "text"),
            PayloadType::Bytes => write!(f, "bytes"),
            PayloadType::Json => write!(f, "json"),
            PayloadType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A timestamped, shared, immutable value.
///
/// # Example
/// ```
/// use streamgraph::packet::{Packet, Timestamp};
///
/// let packet = Packet::new("x").at(Timestamp::new(1));
/// assert_eq!(packet.get::<String>().unwrap(), "x");
/// assert!(packet.get::<i64>().is_err());
/// ```
#[derive(Clone)]
pub struct Packet {
    payload: Option<Arc<Payload>>,
    timestamp: Timestamp,
}

impl Packet {
    /// A packet holding `value`, with an unset timestamp.
    pub fn new(value: impl Into<Payload>) -> Self {
        Self {
            payload: Some(Arc::new(value.into())),
            timestamp: Timestamp::UNSET,
        }
    }

    /// A packet holding a value of any `Send + Sync` type.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(Payload::Custom(CustomPayload::new(value)))
    }

    /// A packet without payload. Used to fill absent inputs and to seed back-edges.
    pub fn empty() -> Self {
        Self {
            payload: None,
            timestamp: Timestamp::UNSET,
        }
    }

    /// Returns a packet sharing this payload, stamped with `timestamp`.
    pub fn at(&self, timestamp: Timestamp) -> Self {
        Self {
            payload: self.payload.clone(),
            timestamp,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_deref()
    }

    pub fn payload_type(&self) -> Option<PayloadType> {
        self.payload.as_ref().map(|payload| payload.payload_type())
    }

    /// Borrows the payload as `T`.
    pub fn get<T: Any>(&self) -> Result<&T, PacketError> {
        let payload = self.payload.as_deref().ok_or(PacketError::Empty {
            expected: std::any::type_name::<T>(),
        })?;
        payload
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| PacketError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual: payload.type_name(),
            })
    }

    /// Number of live handles to the payload; zero for empty packets.
    pub fn holders(&self) -> usize {
        self.payload.as_ref().map(Arc::strong_count).unwrap_or(0)
    }
}

impl Debug for Packet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("timestamp", &self.timestamp)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Frame {
        width: u32,
    }

    #[test]
    fn test_typed_read() {
        let packet = Packet::new(42i64).at(Timestamp::new(3));
        assert_eq!(*packet.get::<i64>().unwrap(), 42);
        assert_eq!(packet.timestamp(), Timestamp::new(3));
        assert_eq!(packet.payload_type(), Some(PayloadType::Int));
    }

    #[test]
    fn test_type_mismatch() {
        let packet = Packet::new("hello");
        match packet.get::<f64>() {
            Err(PacketError::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, "f64");
                assert_eq!(actual, std::any::type_name::<String>());
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_packet_read_fails() {
        let packet = Packet::empty();
        assert!(packet.is_empty());
        assert!(matches!(packet.get::<i64>(), Err(PacketError::Empty { .. })));
    }

    #[test]
    fn test_custom_payload() {
        let packet = Packet::custom(Frame { width: 640 });
        assert_eq!(packet.get::<Frame>().unwrap(), &Frame { width: 640 });
        assert_eq!(packet.payload_type(), Some(PayloadType::custom::<Frame>()));
        assert!(packet.get::<String>().is_err());
    }

    #[test]
    fn test_restamping_shares_payload() {
        let original = Packet::new(vec![1u8, 2, 3]).at(Timestamp::new(1));
        let restamped = original.at(Timestamp::new(2));
        assert_eq!(original.timestamp(), Timestamp::new(1));
        assert_eq!(restamped.timestamp(), Timestamp::new(2));
        assert_eq!(original.holders(), 2);
        drop(restamped);
        assert_eq!(original.holders(), 1);
    }

    #[test]
    fn test_payload_type_parsing() {
        assert_eq!(PayloadType::from("text".to_string()), PayloadType::Text);
        assert_eq!(PayloadType::from("any".to_string()), PayloadType::Any);
        assert_eq!(
            PayloadType::from("my::Frame".to_string()),
            PayloadType::Custom("my::Frame".to_string())
        );
        assert!(PayloadType::Any.is_compatible_with(&PayloadType::Json));
        assert!(!PayloadType::Int.is_compatible_with(&PayloadType::Float));
    }
}
