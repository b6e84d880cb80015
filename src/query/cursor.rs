//! Opaque pagination cursors
//!
//! A cursor is the base64 encoding of the offset of the next item.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{Error, ErrorCode, Result};

pub fn encode_cursor(offset: usize) -> String {
    BASE64.encode(offset.to_string())
}

/// Offset encoded in `cursor`; no cursor means the first item.
pub fn decode_cursor(cursor: Option<&str>) -> Result<usize> {
    let Some(cursor) = cursor else {
        return Ok(0);
    };
    let invalid = || {
        Error::operation(
            ErrorCode::InvalidCursor,
            "Could not decode the pagination cursor.",
            serde_json::json!({ "cursor": cursor }),
        )
    };
    let bytes = BASE64.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.trim().parse::<usize>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        assert_eq!(decode_cursor(None).unwrap(), 0);
        let cursor = encode_cursor(50);
        assert_eq!(cursor, "NTA=");
        assert_eq!(decode_cursor(Some(&cursor)).unwrap(), 50);
    }

    #[test]
    fn test_invalid_cursor() {
        assert_eq!(decode_cursor(Some("%%%")).unwrap_err().code(), "INVALID_CURSOR");
        let not_a_number = BASE64.encode("abc");
        assert!(decode_cursor(Some(&not_a_number)).is_err());
    }
}
