//! Frame structure for the crossroad radio protocol
//!
//! Frame = Reserved (2) + Tag (2) + Payload + Link trailer (2)

use crossroad_core::{CrossroadError, CrossroadResult, Payload};

/// Total frame size on the air
pub const FRAME_SIZE: usize = 20;

/// Offset of the protocol tag
pub const TAG_OFFSET: usize = 2;

/// Protocol tag identifying crossroad controllers
pub const PROTOCOL_TAG: [u8; 2] = *b"yi";

/// Offset of the payload text
pub const PAYLOAD_OFFSET: usize = TAG_OFFSET + PROTOCOL_TAG.len();

/// Bytes at the end of the frame owned by the link layer
pub const LINK_TRAILER_SIZE: usize = 2;

/// Payload capacity including its NUL terminator
pub const PAYLOAD_CAPACITY: usize = FRAME_SIZE - PAYLOAD_OFFSET - LINK_TRAILER_SIZE;

const GREEN_TEXT: &[u8] = b"green";
const RED_TEXT: &[u8] = b"red";
const SOS_TEXT: &[u8] = b"SOS";

/// What a received frame means to the protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Controller frame carrying the `"yi"` tag
    Tagged(Payload),
    /// Untagged emergency vehicle beacon
    Beacon,
    /// Anything else: too short, foreign, or corrupt
    Noise,
}

/// Complete crossroad frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Reserved header bytes (left to the link layer)
    pub reserved: [u8; TAG_OFFSET],
    /// Decoded meaning
    pub message: Message,
}

impl Frame {
    /// Tagged controller frame
    pub fn tagged(payload: Payload) -> Self {
        Frame {
            reserved: [0; TAG_OFFSET],
            message: Message::Tagged(payload),
        }
    }

    /// Emergency beacon frame
    pub fn beacon() -> Self {
        Frame {
            reserved: [0; TAG_OFFSET],
            message: Message::Beacon,
        }
    }

    /// Parse a frame from received bytes
    ///
    /// Never fails: anything unrecognisable becomes `Message::Noise`.
    pub fn parse(buf: &[u8]) -> Self {
        let mut reserved = [0u8; TAG_OFFSET];
        let n = buf.len().min(TAG_OFFSET);
        reserved[..n].copy_from_slice(&buf[..n]);

        let message = if buf.len() < PAYLOAD_OFFSET {
            Message::Noise
        } else if buf[TAG_OFFSET..PAYLOAD_OFFSET] == PROTOCOL_TAG {
            Message::Tagged(parse_payload(&buf[PAYLOAD_OFFSET..]))
        } else if buf[TAG_OFFSET..].starts_with(SOS_TEXT) {
            Message::Beacon
        } else {
            Message::Noise
        };

        Frame { reserved, message }
    }

    /// Serialize to the fixed on-air layout
    pub fn serialize(&self) -> CrossroadResult<[u8; FRAME_SIZE]> {
        let mut buf = [0u8; FRAME_SIZE];
        buf[..TAG_OFFSET].copy_from_slice(&self.reserved);

        match &self.message {
            Message::Tagged(payload) => {
                if !payload.is_transmittable() {
                    return Err(CrossroadError::InvalidWireFormat(
                        "Unrecognized payload cannot be sent".into(),
                    ));
                }
                let text = payload.to_string();
                // Keep room for the NUL terminator
                if text.len() >= PAYLOAD_CAPACITY {
                    return Err(CrossroadError::InvalidWireFormat(format!(
                        "Payload too long: {} >= {}",
                        text.len(),
                        PAYLOAD_CAPACITY
                    )));
                }
                buf[TAG_OFFSET..PAYLOAD_OFFSET].copy_from_slice(&PROTOCOL_TAG);
                buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + text.len()].copy_from_slice(text.as_bytes());
            }
            Message::Beacon => {
                buf[TAG_OFFSET..TAG_OFFSET + SOS_TEXT.len()].copy_from_slice(SOS_TEXT);
            }
            Message::Noise => {
                return Err(CrossroadError::InvalidWireFormat(
                    "Noise has no wire form".into(),
                ));
            }
        }

        Ok(buf)
    }
}

/// Classify tagged payload text by prefix
fn parse_payload(text: &[u8]) -> Payload {
    if text.starts_with(GREEN_TEXT) {
        Payload::Green
    } else if text.starts_with(RED_TEXT) {
        Payload::Red
    } else if text.starts_with(SOS_TEXT) {
        Payload::Sos
    } else {
        match parse_leading_int(text) {
            0 => Payload::Unrecognized,
            n => Payload::Roll(n),
        }
    }
}

/// Leading decimal integer with optional whitespace and sign, 0 if none
fn parse_leading_int(text: &[u8]) -> i32 {
    let mut iter = text
        .iter()
        .copied()
        .skip_while(|b| matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r'))
        .peekable();

    let negative = match iter.peek() {
        Some(b'-') => {
            iter.next();
            true
        }
        Some(b'+') => {
            iter.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for b in iter.take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(tag: &[u8], body: &[u8]) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[TAG_OFFSET..TAG_OFFSET + tag.len()].copy_from_slice(tag);
        buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + body.len()].copy_from_slice(body);
        buf
    }

    #[test]
    fn test_layout() {
        let bytes = Frame::tagged(Payload::Green).serialize().unwrap();
        assert_eq!(bytes.len(), FRAME_SIZE);
        assert_eq!(&bytes[0..2], &[0, 0]);
        assert_eq!(&bytes[2..4], b"yi");
        assert_eq!(&bytes[4..9], b"green");
        assert!(bytes[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_roll_frame() {
        let bytes = Frame::tagged(Payload::Roll(45)).serialize().unwrap();
        assert_eq!(&bytes[4..7], b"45\0");
        assert_eq!(Frame::parse(&bytes).message, Message::Tagged(Payload::Roll(45)));
    }

    #[test]
    fn test_beacon_is_untagged() {
        let bytes = Frame::beacon().serialize().unwrap();
        assert_eq!(&bytes[2..5], b"SOS");
        assert_eq!(Frame::parse(&bytes).message, Message::Beacon);
    }

    #[test]
    fn test_relay_echo_is_tagged() {
        let bytes = Frame::tagged(Payload::Sos).serialize().unwrap();
        assert_eq!(&bytes[2..7], b"yiSOS");
        assert_eq!(Frame::parse(&bytes).message, Message::Tagged(Payload::Sos));
    }

    #[test]
    fn test_prefix_matching() {
        let frame = Frame::parse(&raw(b"yi", b"greenish"));
        assert_eq!(frame.message, Message::Tagged(Payload::Green));
        let frame = Frame::parse(&raw(b"yi", b"redo"));
        assert_eq!(frame.message, Message::Tagged(Payload::Red));
    }

    #[test]
    fn test_roll_parsing_like_atoi() {
        assert_eq!(parse_payload(b" 67xyz"), Payload::Roll(67));
        assert_eq!(parse_payload(b"-12"), Payload::Roll(-12));
        assert_eq!(parse_payload(b"+7"), Payload::Roll(7));
        assert_eq!(parse_payload(b"0"), Payload::Unrecognized);
        assert_eq!(parse_payload(b"hello"), Payload::Unrecognized);
        assert_eq!(parse_payload(b"99999999999999"), Payload::Roll(i32::MAX));
    }

    #[test]
    fn test_noise() {
        assert_eq!(Frame::parse(&[]).message, Message::Noise);
        assert_eq!(Frame::parse(&[0, 0, b'y']).message, Message::Noise);
        assert_eq!(Frame::parse(&raw(b"zz", b"green")).message, Message::Noise);
    }

    #[test]
    fn test_reserved_bytes_preserved() {
        let mut bytes = raw(b"yi", b"red");
        bytes[0] = 0xAB;
        bytes[1] = 0xCD;
        let frame = Frame::parse(&bytes);
        assert_eq!(frame.reserved, [0xAB, 0xCD]);
        assert_eq!(frame.serialize().unwrap()[..2], [0xAB, 0xCD]);
    }

    #[test]
    fn test_untransmittable() {
        assert!(Frame::tagged(Payload::Unrecognized).serialize().is_err());
        assert!(Frame::tagged(Payload::Roll(i32::MIN)).serialize().is_ok());
        let noise = Frame {
            reserved: [0; 2],
            message: Message::Noise,
        };
        assert!(noise.serialize().is_err());
    }

    proptest! {
        #[test]
        fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Frame::parse(&bytes);
        }

        #[test]
        fn own_rolls_survive_the_air(n in 10i32..=98) {
            let bytes = Frame::tagged(Payload::Roll(n)).serialize().unwrap();
            prop_assert_eq!(Frame::parse(&bytes).message, Message::Tagged(Payload::Roll(n)));
        }
    }
}
