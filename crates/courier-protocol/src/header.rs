//! The envelope header and the routing key derived from it.
//!
//! A header is a loose JSON object. Three fields are well known:
//!
//! | field     | meaning                                    |
//! |-----------|--------------------------------------------|
//! | `id`      | correlation id chosen by the client        |
//! | `version` | API version, optional                      |
//! | `action`  | the operation to run                       |
//!
//! Everything else is carried through untouched and echoed back in the
//! response, so clients can attach their own fields and handlers can add
//! fields to the reply.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HEADER_FIELD_ID: &str = "id";
pub const HEADER_FIELD_VERSION: &str = "version";
pub const HEADER_FIELD_ACTION: &str = "action";

/// Field name → value map carried in every envelope.
///
/// `#[serde(transparent)]` makes a `Header` serialize as the bare object,
/// not wrapped in another layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(Map<String, Value>);

impl Header {
    /// Creates an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header with `version` and `action` set, the usual shape
    /// of a handler declaration. An empty version is left out.
    pub fn route(version: &str, action: &str) -> Self {
        let mut header = Self::new();
        if !version.is_empty() {
            header.set_version(version);
        }
        header.set_action(action);
        header
    }

    /// The routing key: `"version/action"`, or just `"action"` when the
    /// version is empty.
    ///
    /// Missing or non-string fields count as empty; no error is raised
    /// here. A key nobody registered simply fails the lookup later.
    ///
    /// ```rust
    /// use courier_protocol::Header;
    ///
    /// assert_eq!(Header::route("v1", "echo").key(), "v1/echo");
    /// assert_eq!(Header::route("", "ping").key(), "ping");
    /// assert_eq!(Header::new().key(), "");
    /// ```
    pub fn key(&self) -> String {
        let (version, action) = (self.version(), self.action());
        if version.is_empty() {
            return action.to_string();
        }
        format!("{version}/{action}")
    }

    pub fn id(&self) -> &str {
        self.get_str(HEADER_FIELD_ID).unwrap_or_default()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set(HEADER_FIELD_ID, id.into());
    }

    pub fn version(&self) -> &str {
        self.get_str(HEADER_FIELD_VERSION).unwrap_or_default()
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.set(HEADER_FIELD_VERSION, version.into());
    }

    pub fn action(&self) -> &str {
        self.get_str(HEADER_FIELD_ACTION).unwrap_or_default()
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.set(HEADER_FIELD_ACTION, action.into());
    }

    /// Returns the raw value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a field if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Returns a field converted to `T`, or `None` if it is missing or
    /// has a different shape.
    ///
    /// ```rust
    /// use courier_protocol::Header;
    ///
    /// let mut header = Header::new();
    /// header.set("retries", 3);
    /// assert_eq!(header.get_as::<u8>("retries"), Some(3));
    /// assert_eq!(header.get_as::<String>("retries"), None);
    /// ```
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        let value = self.0.get(field)?;
        T::deserialize(value).ok()
    }

    /// Sets a field, returning the previous value.
    pub fn set(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn delete(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Header {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Header> for Value {
    fn from(header: Header) -> Self {
        Value::Object(header.0)
    }
}
