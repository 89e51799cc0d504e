//! H2C upgrade wire encoding (§6 "Wire-level compatibility").
//!
//! The `HTTP2-Settings` header carries the client's initial SETTINGS frame
//! as base64url-without-padding over the concatenation of 6-byte entries
//! `(uint16 id, uint32 value)`, one per configured setting.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::config::Http2Config;

/// SETTINGS identifiers, per RFC 7540 §6.5.2 (only the ones this crate's
/// [`Http2Config`] exposes).
const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

/// Encode the local HTTP/2 settings as the `HTTP2-Settings` header value.
pub(crate) fn encode_settings_header(config: &Http2Config) -> String {
    let mut payload = Vec::with_capacity(6 * 5);
    let mut push = |id: u16, value: u32| {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    };

    if let Some(v) = config.header_table_size {
        push(SETTINGS_HEADER_TABLE_SIZE, v);
    }
    if let Some(v) = config.max_concurrent_streams {
        push(SETTINGS_MAX_CONCURRENT_STREAMS, v);
    }
    if let Some(v) = config.initial_window_size {
        push(SETTINGS_INITIAL_WINDOW_SIZE, v);
    }
    if let Some(v) = config.max_frame_size {
        push(SETTINGS_MAX_FRAME_SIZE, v);
    }
    if let Some(v) = config.max_header_list_size {
        push(SETTINGS_MAX_HEADER_LIST_SIZE, v);
    }

    URL_SAFE_NO_PAD.encode(payload)
}

/// Decoded `(id, value)` pairs from an `HTTP2-Settings` header value. Used
/// only by the test server to assert what a real client produced; the
/// connection driver itself never needs to decode its own header back.
#[cfg(test)]
pub(crate) fn decode_settings_header(value: &str) -> Option<Vec<(u16, u32)>> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    if bytes.len() % 6 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(6)
            .map(|chunk| {
                let id = u16::from_be_bytes([chunk[0], chunk[1]]);
                let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
                (id, value)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_configured_settings() {
        let config = Http2Config {
            max_concurrent_streams: Some(100),
            header_table_size: Some(4096),
            initial_window_size: Some(65535),
            max_frame_size: None,
            max_header_list_size: None,
            validate_headers: true,
        };
        let header = encode_settings_header(&config);
        assert!(!header.contains('='), "must be unpadded");

        let decoded = decode_settings_header(&header).unwrap();
        assert_eq!(
            decoded,
            vec![
                (SETTINGS_HEADER_TABLE_SIZE, 4096),
                (SETTINGS_MAX_CONCURRENT_STREAMS, 100),
                (SETTINGS_INITIAL_WINDOW_SIZE, 65535),
            ]
        );
    }

    #[test]
    fn empty_config_encodes_to_empty_payload() {
        let config = Http2Config {
            max_concurrent_streams: None,
            header_table_size: None,
            initial_window_size: None,
            max_frame_size: None,
            max_header_list_size: None,
            validate_headers: true,
        };
        assert_eq!(encode_settings_header(&config), "");
    }
}
