//! Binary encoding of [`Envelope`]s.
//!
//! The codec uses `bincode`'s serde integration with a fixed configuration:
//!
//! - integers are fixed-width and big-endian,
//! - enum variants are a `u32` index,
//! - sequences (including [`RawData`](crate::message::RawData)) carry a `u64`
//!   length prefix,
//! - every `Option` is a one-byte presence flag (`0x00` / `0x01`) immediately
//!   followed by the value when present.
//!
//! Decoding is bounded by [`MAX_MESSAGE_SIZE`] and rejects trailing bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::message::Envelope;
use crate::ProtocolError;

/// Upper bound on the bytes a single envelope may claim while decoding.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// The bincode configuration every peer must share.
pub fn wire_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<MAX_MESSAGE_SIZE>()
}

/// Encode one envelope.
pub fn encode<D: Serialize>(envelope: &Envelope<D>) -> Result<Vec<u8>, ProtocolError> {
    let bytes = bincode::serde::encode_to_vec(envelope, wire_config())?;
    trace!(
        scope = envelope.scope.0,
        object = envelope.object.0,
        kind = envelope.message.kind(),
        len = bytes.len(),
        "encoded envelope"
    );
    Ok(bytes)
}

/// Decode exactly one envelope from `bytes`.
pub fn decode<D: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<D>, ProtocolError> {
    let (envelope, read): (Envelope<D>, usize) =
        bincode::serde::decode_from_slice(bytes, wire_config())?;
    if read != bytes.len() {
        return Err(ProtocolError::TrailingBytes {
            read,
            total: bytes.len(),
        });
    }
    Ok(envelope)
}

/// Encode a batch of envelopes, one buffer each, preserving order.
pub fn encode_all<D: Serialize>(envelopes: &[Envelope<D>]) -> Result<Vec<Vec<u8>>, ProtocolError> {
    envelopes.iter().map(encode).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EntityHandle, ObjectId, ScopeId};
    use crate::message::{Attachment, Message, ObjectRefreshed, ObjectSpawned, RawData};
    use netrose_grid::prelude::*;

    fn handle() -> EntityHandle {
        EntityHandle::new(ScopeId(1), ObjectId(2))
    }

    // -- 1. Exact layout -------------------------------------------------------

    #[test]
    fn ids_and_coordinates_are_fixed_width_big_endian() {
        let env: Envelope = Envelope::new(handle(), Message::MovementFinished { x: 6, y: 5 });
        let bytes = encode(&env).unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 1, // scope
                0, 0, 0, 2, // object
                0, 0, 0, 8, // variant: MovementFinished
                0, 6, // x
                0, 5, // y
            ]
        );
    }

    #[test]
    fn absent_optional_is_a_single_zero_flag() {
        let env: Envelope = Envelope::new(
            handle(),
            Message::Refreshed(ObjectRefreshed {
                data: vec![0xAA],
                attachment: None,
                movement: Some(Direction::Left),
            }),
        );
        let bytes = encode(&env).unwrap();
        assert_eq!(
            &bytes[8..],
            &[
                0, 0, 0, 1, // variant: Refreshed
                0, 0, 0, 0, 0, 0, 0, 1, // data length
                0xAA, // data
                0x00, // attachment: absent
                0x01, // movement: present
                0, 0, 0, 2, // Direction::Left
            ]
        );
    }

    #[test]
    fn present_optional_is_flag_then_value() {
        let env: Envelope = Envelope::new(
            handle(),
            Message::Refreshed(ObjectRefreshed {
                data: vec![],
                attachment: Some(Attachment::new(MapId(2), 10, 10)),
                movement: None,
            }),
        );
        let bytes = encode(&env).unwrap();
        assert_eq!(
            &bytes[12..],
            &[
                0, 0, 0, 0, 0, 0, 0, 0, // data length
                0x01, // attachment: present
                0, 0, 0, 2, // map id
                0, 10, 0, 10, // position
                0x00, // movement: absent
            ]
        );
    }

    // -- 2. Decoding -----------------------------------------------------------

    #[test]
    fn schema_known_payloads_are_supported() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Skin {
            sprite: u16,
            tint: Option<u32>,
        }

        let env = Envelope::new(
            handle(),
            Message::Spawned(ObjectSpawned {
                data: Skin { sprite: 7, tint: None },
                orientation: Direction::Down,
                speed: 2,
                attachment: None,
                movement: None,
            }),
        );
        let decoded: Envelope<Skin> = decode(&encode(&env).unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn truncated_buffer_is_a_decode_error() {
        let env: Envelope = Envelope::new(handle(), Message::Teleported { x: 1, y: 2 });
        let bytes = encode(&env).unwrap();
        let result: Result<Envelope<RawData>, _> = decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let env: Envelope = Envelope::new(handle(), Message::Detached);
        let mut bytes = encode(&env).unwrap();
        bytes.push(0);
        let result: Result<Envelope<RawData>, _> = decode(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::TrailingBytes { read: 12, total: 13 })
        ));
    }

    #[test]
    fn invalid_presence_flag_is_rejected() {
        let env: Envelope = Envelope::new(
            handle(),
            Message::Refreshed(ObjectRefreshed {
                data: vec![],
                attachment: None,
                movement: None,
            }),
        );
        let mut bytes = encode(&env).unwrap();
        let flag = bytes.len() - 2;
        bytes[flag] = 7;
        let result: Result<Envelope<RawData>, _> = decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn encode_all_preserves_order() {
        let envs: Vec<Envelope> = vec![
            Envelope::new(handle(), Message::SpeedChanged { speed: 3 }),
            Envelope::new(handle(), Message::OrientationChanged { direction: Direction::Up }),
        ];
        let encoded = encode_all(&envs).unwrap();
        let decoded: Vec<Envelope> = encoded.iter().map(|b| decode(b).unwrap()).collect();
        assert_eq!(decoded, envs);
    }
}
