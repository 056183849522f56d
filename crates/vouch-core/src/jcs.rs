//! JSON Canonicalization Scheme (RFC 8785) for signed payloads.
//!
//! Uses `serde_jcs`: sorted keys, no whitespace, ECMAScript number
//! formatting. Two runs that produce the same statement sign the same bytes.

use serde::Serialize;

/// Serialize a value to JCS canonical JSON bytes.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_without_whitespace() {
        let value = json!({"b": 2, "a": {"d": 1, "c": [true, null]}});
        let bytes = to_vec(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"c":[true,null],"d":1},"b":2}"#
        );
    }
}
