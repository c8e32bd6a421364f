//! Script value types
//!
//! The subset of the script value model that crosses a window boundary:
//! primitives, plain objects and arrays, dates, errors, array buffers and
//! message ports. Functions and symbols exist so that the clone codec has
//! something to refuse.

use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A script value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes arrays, buffers, ports, ...)
    Object(Rc<RefCell<Object>>),
    /// Symbol
    Symbol(u64),
}

/// Identity of a message port entanglement. A transferred port keeps its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u64);

static PORT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl PortId {
    fn next() -> Self {
        Self(PORT_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

/// Backing store of an ArrayBuffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayBufferData {
    pub bytes: Vec<u8>,
    /// Set once the buffer has been transferred away
    pub detached: bool,
}

/// State of a MessagePort object
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePortData {
    pub id: PortId,
    /// Set once the port has been transferred away
    pub shipped: bool,
}

/// The different kinds of objects
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Array
    Array(Vec<Value>),
    /// Date (milliseconds since the epoch)
    Date(f64),
    /// Error object
    Error { name: String, message: String },
    /// ArrayBuffer (transferable)
    ArrayBuffer(ArrayBufferData),
    /// MessagePort (transferable)
    MessagePort(MessagePortData),
    /// Function (neither cloneable nor transferable)
    Function { name: Option<String> },
}

/// Script object
#[derive(Debug, Clone)]
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Own properties
    pub properties: HashMap<String, Value>,
}

impl Object {
    /// Create an object of the given kind with no properties
    pub fn with_kind(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: HashMap::default(),
        }
    }

    /// Get a property
    pub fn get_property(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }

        match &self.kind {
            ObjectKind::Array(arr) => {
                if key == "length" {
                    return Some(Value::Number(arr.len() as f64));
                }
                key.parse::<usize>().ok().and_then(|i| arr.get(i).cloned())
            }
            ObjectKind::ArrayBuffer(buffer) if key == "byteLength" => {
                Some(Value::Number(buffer.bytes.len() as f64))
            }
            ObjectKind::Error { name, .. } if key == "name" => Some(Value::String(name.clone())),
            ObjectKind::Error { message, .. } if key == "message" => {
                Some(Value::String(message.clone()))
            }
            _ => None,
        }
    }

    /// Human-readable type name, used in clone error messages
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Date(_) => "Date",
            ObjectKind::Error { .. } => "Error",
            ObjectKind::ArrayBuffer(_) => "ArrayBuffer",
            ObjectKind::MessagePort(_) => "MessagePort",
            ObjectKind::Function { .. } => "function",
        }
    }
}

impl Value {
    fn from_kind(kind: ObjectKind) -> Self {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(kind))))
    }

    /// Create a new empty ordinary object
    pub fn new_object() -> Self {
        Self::from_kind(ObjectKind::Ordinary)
    }

    /// Create an ordinary object with the given properties
    pub fn new_object_with_properties(properties: HashMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Ordinary,
            properties,
        })))
    }

    /// Create an array
    pub fn new_array(elements: Vec<Value>) -> Self {
        Self::from_kind(ObjectKind::Array(elements))
    }

    /// Create a Date
    pub fn new_date(timestamp: f64) -> Self {
        Self::from_kind(ObjectKind::Date(timestamp))
    }

    /// Create an Error object
    pub fn new_error(name: &str, message: &str) -> Self {
        Self::from_kind(ObjectKind::Error {
            name: name.to_string(),
            message: message.to_string(),
        })
    }

    /// Create an ArrayBuffer holding `bytes`
    pub fn new_array_buffer(bytes: Vec<u8>) -> Self {
        Self::from_kind(ObjectKind::ArrayBuffer(ArrayBufferData {
            bytes,
            detached: false,
        }))
    }

    /// Create a fresh MessagePort with a new entanglement id
    pub fn new_message_port() -> Self {
        Self::new_message_port_with_id(PortId::next())
    }

    /// Create a MessagePort object for an existing entanglement id
    pub fn new_message_port_with_id(id: PortId) -> Self {
        Self::from_kind(ObjectKind::MessagePort(MessagePortData { id, shipped: false }))
    }

    /// Create a function object
    pub fn new_function(name: Option<&str>) -> Self {
        Self::from_kind(ObjectKind::Function {
            name: name.map(str::to_string),
        })
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is an object
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Check if value is a MessagePort object
    pub fn is_message_port(&self) -> bool {
        self.message_port_id().is_some()
    }

    /// The entanglement id of a MessagePort value
    pub fn message_port_id(&self) -> Option<PortId> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::MessagePort(port) => Some(port.id),
                _ => None,
            },
            _ => None,
        }
    }

    /// Copy of an ArrayBuffer's bytes, `None` for other values
    pub fn array_buffer_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::ArrayBuffer(buffer) => Some(buffer.bytes.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether this is an ArrayBuffer that has been detached, or a port that has been shipped
    pub fn is_detached(&self) -> bool {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::ArrayBuffer(buffer) => buffer.detached,
                ObjectKind::MessagePort(port) => port.shipped,
                _ => false,
            },
            _ => false,
        }
    }

    /// Get a property from an object value
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().get_property(key),
            Value::String(s) if key == "length" => Some(Value::Number(s.chars().count() as f64)),
            _ => None,
        }
    }

    /// Set a property on an object value. Non-objects ignore the write.
    pub fn set_property(&self, key: &str, value: Value) {
        if let Value::Object(obj) = self {
            obj.borrow_mut().properties.insert(key.to_string(), value);
        }
    }

    /// Type name as reported by `typeof`-like diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(obj) => obj.borrow().type_name(),
        }
    }

    /// Identity of an object value (its allocation address)
    pub fn object_identity(&self) -> Option<usize> {
        match self {
            Value::Object(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }

    /// Strict equality: primitives by value, objects by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Symbol(id) => write!(f, "Symbol({})", id),
            Value::Object(obj) => {
                let obj = obj.borrow();
                match &obj.kind {
                    ObjectKind::Ordinary => write!(f, "{{...}}"),
                    ObjectKind::Array(arr) => write!(f, "{:?}", arr),
                    ObjectKind::Date(ts) => write!(f, "Date({})", ts),
                    ObjectKind::Error { name, message } => write!(f, "{}: {}", name, message),
                    ObjectKind::ArrayBuffer(buffer) => {
                        write!(f, "ArrayBuffer({} bytes)", buffer.bytes.len())
                    }
                    ObjectKind::MessagePort(port) => write!(f, "MessagePort({})", port.id.0),
                    ObjectKind::Function { name } => {
                        write!(f, "[Function: {}]", name.as_deref().unwrap_or("anonymous"))
                    }
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Ordinary) => {
                write!(f, "[object Object]")
            }
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
