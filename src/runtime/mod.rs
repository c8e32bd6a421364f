//! Script value model shared by every window
//!
//! This module provides the value types that cross window boundaries and
//! the structured clone codec that moves them.

pub mod structured_clone;
mod value;

pub use structured_clone::{
    structured_clone, CloneCodec, CloneError, CloneOptions, DeserializedRecord, SerializedRecord,
    SerializedValue, StructuredCloneCodec, TransferDataHolder,
};
pub use value::{ArrayBufferData, MessagePortData, Object, ObjectKind, PortId, Value};
