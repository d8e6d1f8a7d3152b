//! Gmail payload normalization
//!
//! Converts a full Gmail API message into the transient domain value
//! consumed by the classifier.

use base64::prelude::*;

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::UnreadMessage;

/// Convert an API message into an [`UnreadMessage`].
///
/// The body is the first text/plain part found; a decode that yields
/// nothing is treated the same as a missing part.
pub fn to_unread_message(message: GmailMessage) -> UnreadMessage {
    let body = message
        .payload
        .as_ref()
        .and_then(extract_plain_text_body)
        .filter(|body| !body.is_empty());

    UnreadMessage {
        snippet: message.snippet,
        body,
    }
}

/// Extract the plain-text body from a message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    // Simple (non-multipart) message carrying the text directly
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
    {
        return decode_base64_body(data);
    }

    // Multipart: first text/plain part wins
    if let Some(parts) = &payload.parts
        && let Some(text) = find_plain_text_in_parts(parts)
    {
        return Some(text);
    }

    None
}

/// Recursively search message parts for text/plain content
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        // Recursively check nested parts
        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data.
///
/// Gmail uses URL-safe base64 but padding can vary, so several decoders
/// are tried. Bytes that are not valid UTF-8 are substituted rather
/// than failing the message.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders
        .iter()
        .find_map(|decoder| decoder.decode(data).ok())
        .map(|decoded| String::from_utf8_lossy(&decoded).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::MessageBody;

    fn encode(text: &[u8]) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(text)
    }

    fn text_part(mime_type: &str, data: Option<String>) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: data.map(|data| MessageBody {
                size: Some(data.len() as u32),
                data: Some(data),
            }),
            parts: None,
        }
    }

    fn multipart_message(parts: Vec<MessagePart>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            snippet: "snippet".to_string(),
            payload: Some(MessagePayload {
                mime_type: Some("multipart/alternative".to_string()),
                body: None,
                parts: Some(parts),
            }),
        }
    }

    #[test]
    fn test_simple_plain_text_message() {
        let message = GmailMessage {
            id: "m1".to_string(),
            snippet: "hola".to_string(),
            payload: Some(MessagePayload {
                mime_type: Some("text/plain".to_string()),
                body: Some(MessageBody {
                    size: Some(4),
                    data: Some(encode(b"Hola")),
                }),
                parts: None,
            }),
        };

        let unread = to_unread_message(message);
        assert_eq!(unread.snippet, "hola");
        assert_eq!(unread.body.as_deref(), Some("Hola"));
    }

    #[test]
    fn test_first_plain_text_part_wins() {
        let message = multipart_message(vec![
            text_part("text/plain", Some(encode(b"primero"))),
            text_part("text/plain", Some(encode(b"segundo"))),
        ]);

        let unread = to_unread_message(message);
        assert_eq!(unread.body.as_deref(), Some("primero"));
    }

    #[test]
    fn test_html_only_message_has_no_body() {
        let message = multipart_message(vec![text_part(
            "text/html",
            Some(encode(b"<p>Hola</p>")),
        )]);

        let unread = to_unread_message(message);
        assert_eq!(unread.body, None);
    }

    #[test]
    fn test_plain_text_found_in_nested_parts() {
        let nested = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            body: None,
            parts: Some(vec![
                text_part("text/html", Some(encode(b"<p>Hola</p>"))),
                text_part("text/plain", Some(encode(b"Hola anidado"))),
            ]),
        };
        let message = multipart_message(vec![nested]);

        let unread = to_unread_message(message);
        assert_eq!(unread.body.as_deref(), Some("Hola anidado"));
    }

    #[test]
    fn test_missing_payload_has_no_body() {
        let message = GmailMessage {
            id: "m1".to_string(),
            snippet: "solo snippet".to_string(),
            payload: None,
        };

        let unread = to_unread_message(message);
        assert_eq!(unread.snippet, "solo snippet");
        assert_eq!(unread.body, None);
    }

    #[test]
    fn test_empty_decoded_body_is_none() {
        let message = multipart_message(vec![text_part("text/plain", Some(String::new()))]);

        let unread = to_unread_message(message);
        assert_eq!(unread.body, None);
    }

    #[test]
    fn test_invalid_utf8_is_substituted() {
        let message = multipart_message(vec![text_part(
            "text/plain",
            Some(BASE64_URL_SAFE_NO_PAD.encode([b'H', b'o', 0xFF, b'l', b'a'])),
        )]);

        let unread = to_unread_message(message);
        let body = unread.body.unwrap();
        assert!(body.starts_with("Ho"));
        assert!(body.contains('\u{FFFD}'));
    }

    #[test]
    fn test_standard_base64_with_padding_also_decodes() {
        // "Hola?" encoded with standard alphabet and padding
        use base64::engine::general_purpose::STANDARD;
        let message = multipart_message(vec![text_part(
            "text/plain",
            Some(STANDARD.encode(b"Hola?")),
        )]);

        let unread = to_unread_message(message);
        assert_eq!(unread.body.as_deref(), Some("Hola?"));
    }
}
