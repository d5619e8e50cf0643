//! Key flattening for backends with a single flat keyspace.
//!
//! Each component is length-prefixed, so no choice of storage name or
//! identifier value can make two distinct keys flatten to the same string.

use kvo_types::Identifier;

/// Encode an identifier as a flat string: `<len>:<json>` per component.
///
/// Values use their JSON text, so the string `"1"` and the number `1` stay
/// distinct.
pub fn encode_identifier(id: &Identifier) -> String {
    let mut out = String::new();
    for value in id.values() {
        push_component(&mut out, &value.to_string());
    }
    out
}

/// Flatten a storage name and identifier into one key string.
pub fn flatten_key(storage_name: &str, id: &Identifier) -> String {
    let mut out = String::new();
    push_component(&mut out, storage_name);
    out.push_str(&encode_identifier(id));
    out
}

fn push_component(out: &mut String, component: &str) {
    out.push_str(&component.len().to_string());
    out.push(':');
    out.push_str(component);
}
