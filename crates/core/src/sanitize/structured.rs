//! Recursive sanitization of nested API payloads.
//!
//! [`ApiData`] models dynamically typed request data whose arrays and objects
//! are shared handles, so the same container can appear in several places or
//! contain itself. [`sanitize_api_data`] turns such a value into a plain,
//! acyclic [`serde_json::Value`]:
//!
//! - strings are cleaned with the text sanitizer, or the email sanitizer when
//!   the key they sit under contains `email` (case-insensitive);
//! - keys in [`FORBIDDEN_KEYS`] are never copied;
//! - a container reached again while it is still being walked is replaced by
//!   [`CIRCULAR_SENTINEL`];
//! - anything nested deeper than [`MAX_SANITIZE_DEPTH`] is replaced by
//!   [`MAX_DEPTH_SENTINEL`].

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::primitives::{email_str, text_str};
use super::FORBIDDEN_KEYS;

/// Substituted for a container that refers back to one of its ancestors.
pub const CIRCULAR_SENTINEL: &str = "[Circular Reference]";

/// Substituted for values nested deeper than [`MAX_SANITIZE_DEPTH`].
pub const MAX_DEPTH_SENTINEL: &str = "[Max Depth Exceeded]";

/// Maximum container nesting walked by the structured sanitizer.
pub const MAX_SANITIZE_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// ApiData
// ---------------------------------------------------------------------------

/// A dynamically typed value with shared, mutable containers.
///
/// Cloning an `ApiData` clones the handle, not the container. Reference
/// cycles built through handles are not reclaimed until one of the
/// containers is cleared.
#[derive(Clone, Debug, Default)]
pub enum ApiData {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(ArrayHandle),
    Object(ObjectHandle),
}

/// Shared handle to an array.
#[derive(Clone, Default)]
pub struct ArrayHandle(Rc<RefCell<Vec<ApiData>>>);

/// Shared handle to an object with string keys.
#[derive(Clone, Default)]
pub struct ObjectHandle(Rc<RefCell<BTreeMap<String, ApiData>>>);

impl ArrayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<ApiData>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Remove every element, breaking any cycle that runs through them.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl ObjectHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<ApiData>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    /// Fetch a field (the returned value shares containers with this one).
    pub fn get(&self, key: &str) -> Option<ApiData> {
        self.0.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Remove every field, breaking any cycle that runs through them.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

// Containers may be cyclic, so Debug prints identity and size only.
impl fmt::Debug for ArrayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayHandle({:#x}, len={})", self.identity(), self.len())
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({:#x}, len={})", self.identity(), self.len())
    }
}

impl ApiData {
    /// Deep-copy a JSON tree into fresh, unshared containers.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ApiData::Null,
            Value::Bool(b) => ApiData::Bool(*b),
            Value::Number(n) => ApiData::Number(n.clone()),
            Value::String(s) => ApiData::String(s.clone()),
            Value::Array(items) => {
                let handle = ArrayHandle::new();
                for item in items {
                    handle.push(ApiData::from_json(item));
                }
                ApiData::Array(handle)
            }
            Value::Object(map) => {
                let handle = ObjectHandle::new();
                for (key, item) in map {
                    handle.insert(key.clone(), ApiData::from_json(item));
                }
                ApiData::Object(handle)
            }
        }
    }
}

impl From<ArrayHandle> for ApiData {
    fn from(handle: ArrayHandle) -> Self {
        ApiData::Array(handle)
    }
}

impl From<ObjectHandle> for ApiData {
    fn from(handle: ObjectHandle) -> Self {
        ApiData::Object(handle)
    }
}

impl From<&str> for ApiData {
    fn from(s: &str) -> Self {
        ApiData::String(s.to_string())
    }
}

impl From<String> for ApiData {
    fn from(s: String) -> Self {
        ApiData::String(s)
    }
}

impl From<bool> for ApiData {
    fn from(b: bool) -> Self {
        ApiData::Bool(b)
    }
}

impl From<i64> for ApiData {
    fn from(n: i64) -> Self {
        ApiData::Number(n.into())
    }
}

impl From<f64> for ApiData {
    /// Non-finite floats become `Null`, matching JSON serialization.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(ApiData::Null, ApiData::Number)
    }
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Sanitize a nested payload. Always terminates, never panics.
pub fn sanitize_api_data(data: &ApiData) -> Value {
    let mut walker = Walker::default();
    let value = walker.visit(data, None, 0);
    if walker.cycles > 0 || walker.dropped_keys > 0 || walker.truncated > 0 {
        tracing::debug!(
            cycles = walker.cycles,
            dropped_keys = walker.dropped_keys,
            truncated = walker.truncated,
            "Sanitized structured payload"
        );
    }
    value
}

/// Sanitize a plain JSON tree with the same rules as [`sanitize_api_data`].
pub fn sanitize_json_value(value: &Value) -> Value {
    sanitize_api_data(&ApiData::from_json(value))
}

#[derive(Default)]
struct Walker {
    /// Identities of the containers on the current descent path.
    on_path: HashSet<usize>,
    cycles: usize,
    dropped_keys: usize,
    truncated: usize,
}

impl Walker {
    fn visit(&mut self, data: &ApiData, parent_key: Option<&str>, depth: usize) -> Value {
        match data {
            ApiData::Null => Value::Null,
            ApiData::Bool(b) => Value::Bool(*b),
            ApiData::Number(n) => Value::Number(n.clone()),
            ApiData::String(s) => Value::String(sanitize_string(s, parent_key)),
            ApiData::Array(handle) => {
                if depth >= MAX_SANITIZE_DEPTH {
                    self.truncated += 1;
                    return Value::String(MAX_DEPTH_SENTINEL.to_string());
                }
                let id = handle.identity();
                if !self.on_path.insert(id) {
                    self.cycles += 1;
                    return Value::String(CIRCULAR_SENTINEL.to_string());
                }
                let items = handle.0.borrow();
                let out = items
                    .iter()
                    .map(|item| self.visit(item, parent_key, depth + 1))
                    .collect();
                self.on_path.remove(&id);
                Value::Array(out)
            }
            ApiData::Object(handle) => {
                if depth >= MAX_SANITIZE_DEPTH {
                    self.truncated += 1;
                    return Value::String(MAX_DEPTH_SENTINEL.to_string());
                }
                let id = handle.identity();
                if !self.on_path.insert(id) {
                    self.cycles += 1;
                    return Value::String(CIRCULAR_SENTINEL.to_string());
                }
                let fields = handle.0.borrow();
                let mut out = Map::new();
                for (key, item) in fields.iter() {
                    if FORBIDDEN_KEYS.contains(&key.as_str()) {
                        self.dropped_keys += 1;
                        continue;
                    }
                    out.insert(key.clone(), self.visit(item, Some(key.as_str()), depth + 1));
                }
                self.on_path.remove(&id);
                Value::Object(out)
            }
        }
    }
}

fn sanitize_string(s: &str, parent_key: Option<&str>) -> String {
    let is_email = parent_key.is_some_and(|k| k.to_ascii_lowercase().contains("email"));
    if is_email {
        email_str(s)
    } else {
        text_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- prototype pollution -------------------------------------------------

    #[test]
    fn forbidden_keys_are_dropped() {
        let input: Value =
            serde_json::from_str(r#"{"__proto__":{"admin":true},"name":"Jo"}"#).unwrap();
        let out = sanitize_json_value(&input);
        assert_eq!(out, json!({"name": "Jo"}));
        assert!(out.get("admin").is_none());
    }

    #[test]
    fn forbidden_keys_are_dropped_when_nested() {
        let input = json!({"a": {"constructor": {"x": 1}, "prototype": 2, "ok": "y"}});
        assert_eq!(sanitize_json_value(&input), json!({"a": {"ok": "y"}}));
    }

    // -- cycles --------------------------------------------------------------

    #[test]
    fn self_reference_becomes_sentinel() {
        let a = ObjectHandle::new();
        a.insert("name", "Acme");
        a.insert("self", a.clone());

        let out = sanitize_api_data(&ApiData::from(a.clone()));
        assert_eq!(out, json!({"name": "Acme", "self": CIRCULAR_SENTINEL}));
        a.clear();
    }

    #[test]
    fn indirect_cycle_through_array_terminates() {
        let parent = ObjectHandle::new();
        let children = ArrayHandle::new();
        let child = ObjectHandle::new();
        child.insert("parent", parent.clone());
        children.push(child);
        parent.insert("children", children.clone());

        let out = sanitize_api_data(&ApiData::from(parent.clone()));
        assert_eq!(out, json!({"children": [{"parent": CIRCULAR_SENTINEL}]}));
        parent.clear();
    }

    #[test]
    fn shared_acyclic_reference_is_copied() {
        let address = ObjectHandle::new();
        address.insert("city", "  Berlin ");
        let contact = ObjectHandle::new();
        contact.insert("billing", address.clone());
        contact.insert("shipping", address);

        let out = sanitize_api_data(&ApiData::from(contact));
        assert_eq!(
            out,
            json!({"billing": {"city": "Berlin"}, "shipping": {"city": "Berlin"}})
        );
    }

    // -- strings -------------------------------------------------------------

    #[test]
    fn email_keys_use_email_sanitizer() {
        let input = json!({"primaryEmail": " JO@EXAMPLE.COM ", "note": "  hi   there "});
        let out = sanitize_json_value(&input);
        assert_eq!(out["primaryEmail"], "jo@example.com");
        assert_eq!(out["note"], "hi there");
    }

    #[test]
    fn array_elements_inherit_parent_key() {
        let input = json!({"EMAILS": ["A@B.COM", "C@D.COM "]});
        assert_eq!(
            sanitize_json_value(&input),
            json!({"EMAILS": ["a@b.com", "c@d.com"]})
        );
    }

    #[test]
    fn scalars_pass_through() {
        let input = json!({"n": 3, "f": 1.5, "b": false, "z": null});
        assert_eq!(sanitize_json_value(&input), input);
    }

    // -- depth ---------------------------------------------------------------

    #[test]
    fn deep_nesting_is_truncated() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_SANITIZE_DEPTH + 10) {
            value = json!([value]);
        }
        let out = sanitize_json_value(&value);
        let rendered = serde_json::to_string(&out).unwrap();
        assert!(rendered.contains(MAX_DEPTH_SENTINEL));
    }

    #[test]
    fn debug_output_does_not_recurse_into_cycles() {
        let a = ObjectHandle::new();
        a.insert("self", a.clone());
        let rendered = format!("{:?}", ApiData::from(a.clone()));
        assert!(rendered.starts_with("Object(ObjectHandle("));
        a.clear();
    }
}
