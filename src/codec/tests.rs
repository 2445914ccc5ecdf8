//! MQTT Codec Tests
//!
//! Byte-level checks for the v3.1.1 packets the bridge sends and receives.

use bytes::{Bytes, BytesMut};
use pretty_assertions::assert_eq;
use test_case::test_case;

use crate::codec::{read_variable_int, write_variable_int, Decoder, Encoder};
use crate::protocol::{
    ConnAck, Connect, ConnectReturnCode, DecodeError, EncodeError, Packet, PubAck, Publish, QoS,
    SubAck, Subscribe, SubscribeReturnCode, Subscription,
};

fn encode_packet(packet: &Packet) -> BytesMut {
    let mut buf = BytesMut::new();
    Encoder::new().encode(packet, &mut buf).unwrap();
    buf
}

fn decode_packet(buf: &[u8]) -> Result<Packet, DecodeError> {
    match Decoder::new().decode(buf)? {
        Some((packet, consumed)) => {
            assert_eq!(consumed, buf.len());
            Ok(packet)
        }
        None => Err(DecodeError::InsufficientData),
    }
}

// ============================================================================
// Variable Byte Integer
// ============================================================================

#[test_case(0, &[0x00] ; "zero")]
#[test_case(127, &[0x7F] ; "one byte max")]
#[test_case(128, &[0x80, 0x01] ; "two byte min")]
#[test_case(16_383, &[0xFF, 0x7F] ; "two byte max")]
#[test_case(2_097_152, &[0x80, 0x80, 0x80, 0x01] ; "four byte min")]
#[test_case(268_435_455, &[0xFF, 0xFF, 0xFF, 0x7F] ; "four byte max")]
fn test_variable_int_encoding(value: u32, expected: &[u8]) {
    let mut buf = BytesMut::new();
    let written = write_variable_int(&mut buf, value).unwrap();
    assert_eq!(&buf[..], expected);
    assert_eq!(written, expected.len());
    assert_eq!(read_variable_int(expected).unwrap(), (value, expected.len()));
}

#[test]
fn test_variable_int_too_large() {
    let mut buf = BytesMut::new();
    assert_eq!(
        write_variable_int(&mut buf, 268_435_456),
        Err(EncodeError::PacketTooLarge)
    );
    assert_eq!(
        read_variable_int(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Err(DecodeError::InvalidRemainingLength)
    );
}

#[test]
fn test_variable_int_incomplete() {
    assert_eq!(
        read_variable_int(&[0x80, 0x80]),
        Err(DecodeError::InsufficientData)
    );
}

// ============================================================================
// CONNECT / CONNACK
// ============================================================================

#[test]
fn test_connect_with_credentials_layout() {
    let packet = Packet::Connect(Box::new(Connect {
        client_id: "c1".to_string(),
        clean_session: true,
        keep_alive: 60,
        username: Some("app".to_string()),
        password: Some(Bytes::from_static(b"pw")),
    }));

    let encoded = encode_packet(&packet);
    let expected: &[u8] = &[
        0x10, 0x17, // fixed header, remaining length 23
        0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
        0x04, // protocol level 4
        0xC2, // username + password + clean session
        0x00, 0x3C, // keep alive 60
        0x00, 0x02, b'c', b'1', // client id
        0x00, 0x03, b'a', b'p', b'p', // username
        0x00, 0x02, b'p', b'w', // password
    ];
    assert_eq!(&encoded[..], expected);
    assert_eq!(decode_packet(&encoded).unwrap(), packet);
}

#[test]
fn test_connect_username_without_password() {
    let packet = Packet::Connect(Box::new(Connect {
        client_id: "bridge".to_string(),
        username: Some("app".to_string()),
        ..Default::default()
    }));

    let encoded = encode_packet(&packet);
    // username flag + clean session only
    assert_eq!(encoded[9], 0x82);
    assert_eq!(decode_packet(&encoded).unwrap(), packet);
}

#[test]
fn test_connect_password_requires_username() {
    let packet = Packet::Connect(Box::new(Connect {
        password: Some(Bytes::from_static(b"secret")),
        ..Default::default()
    }));
    let mut buf = BytesMut::new();
    assert_eq!(
        Encoder::new().encode(&packet, &mut buf),
        Err(EncodeError::PasswordWithoutUsername)
    );
}

#[test]
fn test_connect_rejects_other_protocol_level() {
    let mut encoded = encode_packet(&Packet::Connect(Box::default()));
    encoded[8] = 5;
    assert_eq!(
        decode_packet(&encoded),
        Err(DecodeError::InvalidProtocolVersion(5))
    );
}

#[test]
fn test_connack_return_codes() {
    assert_eq!(
        decode_packet(&[0x20, 0x02, 0x01, 0x00]).unwrap(),
        Packet::ConnAck(ConnAck {
            session_present: true,
            return_code: ConnectReturnCode::Accepted,
        })
    );
    assert_eq!(
        decode_packet(&[0x20, 0x02, 0x00, 0x05]).unwrap(),
        Packet::ConnAck(ConnAck {
            session_present: false,
            return_code: ConnectReturnCode::NotAuthorized,
        })
    );
    assert_eq!(
        decode_packet(&[0x20, 0x02, 0x00, 0x06]),
        Err(DecodeError::InvalidReturnCode(0x06))
    );
}

#[test]
fn test_connack_reserved_flags() {
    assert_eq!(
        decode_packet(&[0x20, 0x02, 0x02, 0x00]),
        Err(DecodeError::InvalidFlags)
    );
}

// ============================================================================
// PUBLISH / PUBACK
// ============================================================================

#[test]
fn test_publish_qos0_layout() {
    let packet = Packet::Publish(Publish {
        topic: "a/b".to_string(),
        payload: Bytes::from_static(b"{}"),
        ..Default::default()
    });

    let encoded = encode_packet(&packet);
    assert_eq!(
        &encoded[..],
        &[0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'{', b'}']
    );
    assert_eq!(decode_packet(&encoded).unwrap(), packet);
}

#[test]
fn test_publish_qos1_carries_packet_id() {
    let raw = [
        0x33, 0x08, 0x00, 0x01, b't', 0x00, 0x2A, b'1', b'2', b'3',
    ];
    match decode_packet(&raw).unwrap() {
        Packet::Publish(publish) => {
            assert_eq!(publish.qos, QoS::AtLeastOnce);
            assert!(publish.retain);
            assert!(!publish.dup);
            assert_eq!(publish.topic, "t");
            assert_eq!(publish.packet_id, Some(42));
            assert_eq!(&publish.payload[..], b"123");
        }
        other => panic!("Expected PUBLISH, got {:?}", other),
    }
}

#[test]
fn test_publish_qos1_without_packet_id_fails_to_encode() {
    let packet = Packet::Publish(Publish {
        qos: QoS::AtLeastOnce,
        topic: "t".to_string(),
        ..Default::default()
    });
    let mut buf = BytesMut::new();
    assert_eq!(
        Encoder::new().encode(&packet, &mut buf),
        Err(EncodeError::MissingPacketId)
    );
}

#[test]
fn test_publish_rejects_wildcard_topic() {
    let raw = [0x30, 0x03, 0x00, 0x01, b'#'];
    assert_eq!(
        decode_packet(&raw),
        Err(DecodeError::MalformedPacket("topic contains wildcard"))
    );
}

#[test]
fn test_publish_rejects_zero_packet_id() {
    let raw = [0x32, 0x05, 0x00, 0x01, b't', 0x00, 0x00];
    assert_eq!(
        decode_packet(&raw),
        Err(DecodeError::MalformedPacket("packet id cannot be 0"))
    );
}

#[test]
fn test_publish_invalid_qos() {
    let raw = [0x36, 0x05, 0x00, 0x01, b't', 0x00, 0x01];
    assert_eq!(decode_packet(&raw), Err(DecodeError::InvalidQoS(3)));
}

#[test]
fn test_puback_layout() {
    let encoded = encode_packet(&Packet::PubAck(PubAck::new(0x1234)));
    assert_eq!(&encoded[..], &[0x40, 0x02, 0x12, 0x34]);
    assert_eq!(
        decode_packet(&encoded).unwrap(),
        Packet::PubAck(PubAck::new(0x1234))
    );
}

// ============================================================================
// SUBSCRIBE / SUBACK
// ============================================================================

#[test]
fn test_subscribe_layout() {
    let packet = Packet::Subscribe(Subscribe {
        packet_id: 7,
        subscriptions: vec![Subscription {
            filter: "s/#".to_string(),
            qos: QoS::AtLeastOnce,
        }],
    });

    let encoded = encode_packet(&packet);
    assert_eq!(
        &encoded[..],
        &[0x82, 0x08, 0x00, 0x07, 0x00, 0x03, b's', b'/', b'#', 0x01]
    );
    assert_eq!(decode_packet(&encoded).unwrap(), packet);
}

#[test]
fn test_subscribe_requires_flags() {
    let raw = [0x80, 0x06, 0x00, 0x01, 0x00, 0x01, b'a', 0x00];
    assert_eq!(decode_packet(&raw), Err(DecodeError::InvalidFlags));
}

#[test]
fn test_suback_with_failure_code() {
    let raw = [0x90, 0x04, 0x00, 0x03, 0x01, 0x80];
    assert_eq!(
        decode_packet(&raw).unwrap(),
        Packet::SubAck(SubAck {
            packet_id: 3,
            return_codes: vec![
                SubscribeReturnCode::Granted(QoS::AtLeastOnce),
                SubscribeReturnCode::Failure,
            ],
        })
    );
}

#[test]
fn test_suback_invalid_return_code() {
    let raw = [0x90, 0x03, 0x00, 0x03, 0x03];
    assert_eq!(decode_packet(&raw), Err(DecodeError::InvalidReturnCode(3)));
}

// ============================================================================
// Empty packets
// ============================================================================

#[test_case(Packet::PingReq, [0xC0, 0x00] ; "pingreq")]
#[test_case(Packet::PingResp, [0xD0, 0x00] ; "pingresp")]
#[test_case(Packet::Disconnect, [0xE0, 0x00] ; "disconnect")]
fn test_empty_packets(packet: Packet, expected: [u8; 2]) {
    let encoded = encode_packet(&packet);
    assert_eq!(&encoded[..], &expected);
    assert_eq!(decode_packet(&encoded).unwrap(), packet);
}

#[test]
fn test_pingresp_with_flags_rejected() {
    assert_eq!(decode_packet(&[0xD1, 0x00]), Err(DecodeError::InvalidFlags));
}

// ============================================================================
// Streaming behaviour
// ============================================================================

#[test]
fn test_partial_packet_returns_none() {
    let encoded = encode_packet(&Packet::Publish(Publish {
        topic: "sensors/room1/temp".to_string(),
        payload: Bytes::from_static(b"{\"value\": 42}"),
        ..Default::default()
    }));

    let decoder = Decoder::new();
    for end in 0..encoded.len() {
        assert_eq!(decoder.decode(&encoded[..end]).unwrap(), None);
    }
    assert!(decoder.decode(&encoded).unwrap().is_some());
}

#[test]
fn test_back_to_back_packets() {
    let mut buf = encode_packet(&Packet::PingResp);
    buf.extend_from_slice(&encode_packet(&Packet::PubAck(PubAck::new(9))));

    let decoder = Decoder::new();
    let (first, consumed) = decoder.decode(&buf).unwrap().unwrap();
    assert_eq!(first, Packet::PingResp);
    assert_eq!(consumed, 2);

    let (second, consumed) = decoder.decode(&buf[2..]).unwrap().unwrap();
    assert_eq!(second, Packet::PubAck(PubAck::new(9)));
    assert_eq!(consumed, 4);
}

#[test]
fn test_unsupported_packet_type() {
    // PUBREC is outside the bridge's QoS 0/1 vocabulary
    assert_eq!(
        decode_packet(&[0x50, 0x02, 0x00, 0x01]),
        Err(DecodeError::InvalidPacketType(5))
    );
}

#[test]
fn test_truncated_body_is_malformed() {
    // Remaining length 1 cannot hold a topic length prefix
    assert_eq!(
        decode_packet(&[0x30, 0x01, 0x00]),
        Err(DecodeError::MalformedPacket(
            "packet shorter than its remaining length"
        ))
    );
}

#[test]
fn test_packet_too_large() {
    let decoder = Decoder::new().with_max_packet_size(4);
    assert_eq!(
        decoder.decode(&[0x30, 0x05, 0x00, 0x01, b't', b'x', b'y']),
        Err(DecodeError::PacketTooLarge)
    );
}
