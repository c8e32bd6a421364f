//! Structured Clone Algorithm Implementation
//!
//! Serializes script values into a realm-independent [`SerializedRecord`]
//! and rebuilds them on the other side of a window boundary. Transferable
//! objects (ArrayBuffer, MessagePort) move instead of being copied: the
//! originals are detached once serialization has succeeded.
//!
//! Supports: primitives, objects, arrays, Date, Error, ArrayBuffer (with
//! transfer), MessagePort (transfer only) and circular references.

use crate::runtime::value::{ArrayBufferData, Object, ObjectKind, PortId, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Error during a structured clone operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloneError {
    /// Value type cannot be cloned (functions, symbols, ports outside the transfer list)
    #[error("Cannot clone {0}")]
    NotCloneable(String),
    /// Maximum depth exceeded (prevent stack overflow)
    #[error("Max clone depth {0} exceeded")]
    MaxDepthExceeded(usize),
    /// Transfer of non-transferable value
    #[error("Cannot transfer {0}")]
    NotTransferable(String),
    /// The same object appears twice in the transfer list
    #[error("Transfer list contains duplicate entries")]
    DuplicateTransfer,
    /// Object already transferred (detached)
    #[error("Object already transferred")]
    AlreadyTransferred,
    /// Serialized record does not describe a valid value graph
    #[error("Malformed serialized record: {0}")]
    Malformed(String),
}

/// Options for structured clone
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Maximum depth for nested objects (default: 1000)
    pub max_depth: usize,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self { max_depth: 1000 }
    }
}

/// Realm-independent form of a value graph. Object nodes carry an id so that
/// later occurrences of the same object can be written as a [`Reference`].
///
/// [`Reference`]: SerializedValue::Reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SerializedValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object {
        id: u32,
        properties: Vec<(String, SerializedValue)>,
    },
    Array {
        id: u32,
        elements: Vec<SerializedValue>,
        properties: Vec<(String, SerializedValue)>,
    },
    Date {
        id: u32,
        timestamp: f64,
    },
    Error {
        id: u32,
        name: String,
        message: String,
    },
    ArrayBuffer {
        id: u32,
        bytes: Vec<u8>,
    },
    /// An object moved through the transfer list; `index` points into
    /// [`SerializedRecord::transfer_data_holders`]
    Transferred {
        id: u32,
        index: usize,
    },
    /// Back-reference to an object serialized earlier in the same record
    Reference(u32),
}

/// Data carried for one transferred object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferDataHolder {
    ArrayBuffer { bytes: Vec<u8> },
    MessagePort { port_id: u64 },
}

/// Result of StructuredSerializeWithTransfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRecord {
    pub serialized: SerializedValue,
    pub transfer_data_holders: Vec<TransferDataHolder>,
}

impl SerializedRecord {
    /// JSON form of the record, for diagnostics
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::type_error(format!("record is not JSON-representable: {}", e))
        })
    }
}

/// Result of StructuredDeserializeWithTransfer
#[derive(Debug, Clone)]
pub struct DeserializedRecord {
    pub deserialized: Value,
    /// Newly created transferred objects, in transfer-list order
    pub transferred_values: Vec<Value>,
}

/// The clone codec contract consumed by the message pipeline
pub trait CloneCodec {
    /// Serialize `value`, moving every object in `transfer`
    fn serialize_with_transfer(
        &self,
        value: &Value,
        transfer: &[Value],
    ) -> Result<SerializedRecord, CloneError>;

    /// Rebuild a serialized record in the receiving realm
    fn deserialize_with_transfer(
        &self,
        record: &SerializedRecord,
    ) -> Result<DeserializedRecord, CloneError>;
}

/// Default codec implementing the HTML structured clone algorithm
#[derive(Debug, Clone, Default)]
pub struct StructuredCloneCodec {
    options: CloneOptions,
}

impl StructuredCloneCodec {
    pub fn new(options: CloneOptions) -> Self {
        Self { options }
    }
}

impl CloneCodec for StructuredCloneCodec {
    fn serialize_with_transfer(
        &self,
        value: &Value,
        transfer: &[Value],
    ) -> Result<SerializedRecord, CloneError> {
        let mut serializer = Serializer::new(&self.options);
        for (index, transferable) in transfer.iter().enumerate() {
            serializer.register_transferable(transferable, index)?;
        }

        let serialized = serializer.serialize(value)?;

        // Every entry was validated above, so detaching cannot fail half-way.
        let transfer_data_holders = transfer
            .iter()
            .map(detach_transferable)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SerializedRecord {
            serialized,
            transfer_data_holders,
        })
    }

    fn deserialize_with_transfer(
        &self,
        record: &SerializedRecord,
    ) -> Result<DeserializedRecord, CloneError> {
        let transferred_values: Vec<Value> = record
            .transfer_data_holders
            .iter()
            .map(|holder| match holder {
                TransferDataHolder::ArrayBuffer { bytes } => Value::new_array_buffer(bytes.clone()),
                TransferDataHolder::MessagePort { port_id } => {
                    Value::new_message_port_with_id(PortId(*port_id))
                }
            })
            .collect();

        let mut deserializer = Deserializer::new(&self.options, &transferred_values);
        let deserialized = deserializer.deserialize(&record.serialized)?;

        Ok(DeserializedRecord {
            deserialized,
            transferred_values,
        })
    }
}

struct Serializer<'a> {
    options: &'a CloneOptions,
    /// Maps object identity to the id it was serialized under
    memory: FxHashMap<usize, u32>,
    /// Maps object identity to its index in the transfer list
    transfer_indices: FxHashMap<usize, usize>,
    next_id: u32,
    depth: usize,
}

impl<'a> Serializer<'a> {
    fn new(options: &'a CloneOptions) -> Self {
        Self {
            options,
            memory: FxHashMap::default(),
            transfer_indices: FxHashMap::default(),
            next_id: 0,
            depth: 0,
        }
    }

    fn register_transferable(&mut self, value: &Value, index: usize) -> Result<(), CloneError> {
        let Value::Object(rc) = value else {
            return Err(CloneError::NotTransferable(value.type_name().to_string()));
        };
        match &rc.borrow().kind {
            ObjectKind::ArrayBuffer(buffer) if buffer.detached => {
                return Err(CloneError::AlreadyTransferred)
            }
            ObjectKind::MessagePort(port) if port.shipped => {
                return Err(CloneError::AlreadyTransferred)
            }
            ObjectKind::ArrayBuffer(_) | ObjectKind::MessagePort(_) => {}
            _ => return Err(CloneError::NotTransferable(rc.borrow().type_name().to_string())),
        }

        let identity = Rc::as_ptr(rc) as usize;
        if self.transfer_indices.insert(identity, index).is_some() {
            return Err(CloneError::DuplicateTransfer);
        }
        Ok(())
    }

    fn allocate_id(&mut self, identity: usize) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.memory.insert(identity, id);
        id
    }

    fn serialize(&mut self, value: &Value) -> Result<SerializedValue, CloneError> {
        match value {
            Value::Undefined => Ok(SerializedValue::Undefined),
            Value::Null => Ok(SerializedValue::Null),
            Value::Boolean(b) => Ok(SerializedValue::Boolean(*b)),
            Value::Number(n) => Ok(SerializedValue::Number(*n)),
            Value::String(s) => Ok(SerializedValue::String(s.clone())),
            Value::Symbol(_) => Err(CloneError::NotCloneable("symbol".to_string())),
            Value::Object(rc) => self.serialize_object(rc),
        }
    }

    fn serialize_object(
        &mut self,
        rc: &Rc<RefCell<Object>>,
    ) -> Result<SerializedValue, CloneError> {
        let identity = Rc::as_ptr(rc) as usize;

        if let Some(id) = self.memory.get(&identity) {
            return Ok(SerializedValue::Reference(*id));
        }

        if let Some(&index) = self.transfer_indices.get(&identity) {
            let id = self.allocate_id(identity);
            return Ok(SerializedValue::Transferred { id, index });
        }

        if self.depth >= self.options.max_depth {
            return Err(CloneError::MaxDepthExceeded(self.options.max_depth));
        }

        let obj = rc.borrow();
        match &obj.kind {
            ObjectKind::Function { .. } => Err(CloneError::NotCloneable("function".to_string())),
            ObjectKind::MessagePort(_) => Err(CloneError::NotCloneable(
                "MessagePort outside the transfer list".to_string(),
            )),
            ObjectKind::ArrayBuffer(ArrayBufferData { detached: true, .. }) => {
                Err(CloneError::NotCloneable("detached ArrayBuffer".to_string()))
            }
            ObjectKind::ArrayBuffer(buffer) => {
                let bytes = buffer.bytes.clone();
                drop(obj);
                let id = self.allocate_id(identity);
                Ok(SerializedValue::ArrayBuffer { id, bytes })
            }
            ObjectKind::Date(timestamp) => {
                let timestamp = *timestamp;
                drop(obj);
                let id = self.allocate_id(identity);
                Ok(SerializedValue::Date { id, timestamp })
            }
            ObjectKind::Error { name, message } => {
                let name = name.clone();
                let message = message.clone();
                drop(obj);
                let id = self.allocate_id(identity);
                Ok(SerializedValue::Error { id, name, message })
            }
            ObjectKind::Array(elements) => {
                let elements = elements.clone();
                drop(obj);
                // Register before recursing so cycles become references
                let id = self.allocate_id(identity);
                self.depth += 1;
                let elements = elements
                    .iter()
                    .map(|element| self.serialize(element))
                    .collect::<Result<Vec<_>, _>>()?;
                let properties = self.serialize_properties(rc)?;
                self.depth -= 1;
                Ok(SerializedValue::Array {
                    id,
                    elements,
                    properties,
                })
            }
            ObjectKind::Ordinary => {
                drop(obj);
                let id = self.allocate_id(identity);
                self.depth += 1;
                let properties = self.serialize_properties(rc)?;
                self.depth -= 1;
                Ok(SerializedValue::Object { id, properties })
            }
        }
    }

    fn serialize_properties(
        &mut self,
        rc: &Rc<RefCell<Object>>,
    ) -> Result<Vec<(String, SerializedValue)>, CloneError> {
        let mut entries: Vec<(String, Value)> = rc
            .borrow()
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .into_iter()
            .map(|(key, value)| Ok((key, self.serialize(&value)?)))
            .collect()
    }
}

fn detach_transferable(value: &Value) -> Result<TransferDataHolder, CloneError> {
    let Value::Object(rc) = value else {
        return Err(CloneError::NotTransferable(value.type_name().to_string()));
    };
    let mut obj = rc.borrow_mut();
    let type_name = obj.type_name();
    match &mut obj.kind {
        ObjectKind::ArrayBuffer(buffer) => {
            buffer.detached = true;
            Ok(TransferDataHolder::ArrayBuffer {
                bytes: std::mem::take(&mut buffer.bytes),
            })
        }
        ObjectKind::MessagePort(port) => {
            port.shipped = true;
            Ok(TransferDataHolder::MessagePort { port_id: port.id.0 })
        }
        _ => Err(CloneError::NotTransferable(type_name.to_string())),
    }
}

struct Deserializer<'a> {
    options: &'a CloneOptions,
    transferred: &'a [Value],
    memory: FxHashMap<u32, Value>,
    depth: usize,
}

impl<'a> Deserializer<'a> {
    fn new(options: &'a CloneOptions, transferred: &'a [Value]) -> Self {
        Self {
            options,
            transferred,
            memory: FxHashMap::default(),
            depth: 0,
        }
    }

    fn remember(&mut self, id: u32, value: Value) -> Value {
        self.memory.insert(id, value.clone());
        value
    }

    fn deserialize(&mut self, serialized: &SerializedValue) -> Result<Value, CloneError> {
        if self.depth > self.options.max_depth {
            return Err(CloneError::MaxDepthExceeded(self.options.max_depth));
        }

        match serialized {
            SerializedValue::Undefined => Ok(Value::Undefined),
            SerializedValue::Null => Ok(Value::Null),
            SerializedValue::Boolean(b) => Ok(Value::Boolean(*b)),
            SerializedValue::Number(n) => Ok(Value::Number(*n)),
            SerializedValue::String(s) => Ok(Value::String(s.clone())),
            SerializedValue::Reference(id) => self
                .memory
                .get(id)
                .cloned()
                .ok_or_else(|| CloneError::Malformed(format!("unknown reference {}", id))),
            SerializedValue::Transferred { id, index } => {
                let value = self.transferred.get(*index).cloned().ok_or_else(|| {
                    CloneError::Malformed(format!("transfer index {} out of range", index))
                })?;
                Ok(self.remember(*id, value))
            }
            SerializedValue::Date { id, timestamp } => {
                Ok(self.remember(*id, Value::new_date(*timestamp)))
            }
            SerializedValue::Error { id, name, message } => {
                Ok(self.remember(*id, Value::new_error(name, message)))
            }
            SerializedValue::ArrayBuffer { id, bytes } => {
                Ok(self.remember(*id, Value::new_array_buffer(bytes.clone())))
            }
            SerializedValue::Array {
                id,
                elements,
                properties,
            } => {
                let array = self.remember(*id, Value::new_array(Vec::new()));
                self.depth += 1;
                let elements = elements
                    .iter()
                    .map(|element| self.deserialize(element))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Value::Object(rc) = &array {
                    rc.borrow_mut().kind = ObjectKind::Array(elements);
                }
                self.deserialize_properties_into(&array, properties)?;
                self.depth -= 1;
                Ok(array)
            }
            SerializedValue::Object { id, properties } => {
                let object = self.remember(*id, Value::new_object());
                self.depth += 1;
                self.deserialize_properties_into(&object, properties)?;
                self.depth -= 1;
                Ok(object)
            }
        }
    }

    fn deserialize_properties_into(
        &mut self,
        target: &Value,
        properties: &[(String, SerializedValue)],
    ) -> Result<(), CloneError> {
        for (key, serialized) in properties {
            let value = self.deserialize(serialized)?;
            target.set_property(key, value);
        }
        Ok(())
    }
}

/// Perform a structured clone of a value (equivalent to JS `structuredClone()`)
pub fn structured_clone(value: &Value) -> Result<Value, CloneError> {
    let codec = StructuredCloneCodec::default();
    let record = codec.serialize_with_transfer(value, &[])?;
    Ok(codec.deserialize_with_transfer(&record)?.deserialized)
}
