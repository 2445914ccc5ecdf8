//! MQTT Packet Decoder
//!
//! Decodes MQTT v3.1.1 packets from a byte stream.

use bytes::Bytes;

use super::{read_binary, read_string, read_u16, read_variable_int, DEFAULT_MAX_PACKET_SIZE};
use crate::protocol::{
    ConnAck, Connect, ConnectReturnCode, DecodeError, Packet, PacketType, PubAck, Publish, QoS,
    SubAck, Subscribe, SubscribeReturnCode, Subscription, PROTOCOL_LEVEL, PROTOCOL_NAME,
};

/// MQTT Packet Decoder
pub struct Decoder {
    /// Maximum accepted remaining length
    max_packet_size: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.min(super::MAX_REMAINING_LENGTH);
        self
    }

    /// Decode one packet from the front of the buffer.
    ///
    /// Returns `Ok(None)` until the buffer holds a complete packet, then
    /// `(packet, bytes_consumed)`. The buffer is never modified, so callers
    /// can keep appending to it and retry.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Packet, usize)>, DecodeError> {
        if buf.len() < 2 {
            return Ok(None);
        }

        // Parse fixed header
        let first_byte = buf[0];
        let type_bits = first_byte >> 4;
        let flags = first_byte & 0x0F;

        let (remaining_length, len_bytes) = match read_variable_int(&buf[1..]) {
            Ok(r) => r,
            Err(DecodeError::InsufficientData) => return Ok(None),
            Err(e) => return Err(e),
        };

        if remaining_length as usize > self.max_packet_size {
            return Err(DecodeError::PacketTooLarge);
        }

        let total_len = 1 + len_bytes + remaining_length as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        let body = &buf[1 + len_bytes..total_len];
        let packet_type =
            PacketType::from_u8(type_bits).ok_or(DecodeError::InvalidPacketType(type_bits))?;

        let packet = match packet_type {
            PacketType::Connect => Self::decode_connect(flags, body),
            PacketType::ConnAck => Self::decode_connack(flags, body),
            PacketType::Publish => Self::decode_publish(flags, body),
            PacketType::PubAck => Self::decode_puback(flags, body),
            PacketType::Subscribe => Self::decode_subscribe(flags, body),
            PacketType::SubAck => Self::decode_suback(flags, body),
            PacketType::PingReq => Self::decode_empty(flags, body, Packet::PingReq),
            PacketType::PingResp => Self::decode_empty(flags, body, Packet::PingResp),
            PacketType::Disconnect => Self::decode_empty(flags, body, Packet::Disconnect),
        }
        .map_err(|e| match e {
            // The whole packet is buffered, so running out of bytes means
            // the remaining length lied about the content.
            DecodeError::InsufficientData => {
                DecodeError::MalformedPacket("packet shorter than its remaining length")
            }
            e => e,
        })?;

        Ok(Some((packet, total_len)))
    }

    fn decode_empty(flags: u8, body: &[u8], packet: Packet) -> Result<Packet, DecodeError> {
        if flags != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        if !body.is_empty() {
            return Err(DecodeError::MalformedPacket("unexpected packet body"));
        }
        Ok(packet)
    }

    fn decode_connect(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        if flags != 0 {
            return Err(DecodeError::InvalidFlags);
        }

        let mut pos = 0;

        let (protocol_name, len) = read_string(body)?;
        pos += len;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName);
        }

        let level = *body.get(pos).ok_or(DecodeError::InsufficientData)?;
        pos += 1;
        if level != PROTOCOL_LEVEL {
            return Err(DecodeError::InvalidProtocolVersion(level));
        }

        let connect_flags = *body.get(pos).ok_or(DecodeError::InsufficientData)?;
        pos += 1;

        // Reserved bit must be 0; the bridge never sends a will
        if connect_flags & 0x01 != 0 || connect_flags & 0x3C != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        let clean_session = connect_flags & 0x02 != 0;
        let password_flag = connect_flags & 0x40 != 0;
        let username_flag = connect_flags & 0x80 != 0;

        // [MQTT-3.1.2-22] If username flag is 0, password flag must be 0
        if password_flag && !username_flag {
            return Err(DecodeError::InvalidFlags);
        }

        let keep_alive = read_u16(&body[pos..])?;
        pos += 2;

        let (client_id, len) = read_string(&body[pos..])?;
        pos += len;

        let username = if username_flag {
            let (s, len) = read_string(&body[pos..])?;
            pos += len;
            Some(s.to_string())
        } else {
            None
        };

        let password = if password_flag {
            let (data, _) = read_binary(&body[pos..])?;
            Some(Bytes::copy_from_slice(data))
        } else {
            None
        };

        Ok(Packet::Connect(Box::new(Connect {
            client_id: client_id.to_string(),
            clean_session,
            keep_alive,
            username,
            password,
        })))
    }

    fn decode_connack(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        if flags != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        if body.len() != 2 {
            return Err(DecodeError::MalformedPacket("CONNACK must be 2 bytes"));
        }

        // Only bit 0 (session present) may be set
        if body[0] & 0xFE != 0 {
            return Err(DecodeError::InvalidFlags);
        }

        let return_code =
            ConnectReturnCode::from_u8(body[1]).ok_or(DecodeError::InvalidReturnCode(body[1]))?;

        Ok(Packet::ConnAck(ConnAck {
            session_present: body[0] & 0x01 != 0,
            return_code,
        }))
    }

    fn decode_publish(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        let dup = flags & 0x08 != 0;
        let qos_bits = (flags >> 1) & 0x03;
        let retain = flags & 0x01 != 0;

        let qos = QoS::from_u8(qos_bits).ok_or(DecodeError::InvalidQoS(qos_bits))?;

        if qos == QoS::AtMostOnce && dup {
            return Err(DecodeError::MalformedPacket("DUP must be 0 for QoS 0"));
        }

        let (topic, mut pos) = read_string(body)?;

        if topic.contains(['+', '#']) {
            return Err(DecodeError::MalformedPacket("topic contains wildcard"));
        }

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            let id = read_u16(&body[pos..])?;
            if id == 0 {
                return Err(DecodeError::MalformedPacket("packet id cannot be 0"));
            }
            pos += 2;
            Some(id)
        };

        Ok(Packet::Publish(Publish {
            dup,
            qos,
            retain,
            topic: topic.to_string(),
            packet_id,
            payload: Bytes::copy_from_slice(&body[pos..]),
        }))
    }

    fn decode_puback(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        if flags != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        if body.len() != 2 {
            return Err(DecodeError::MalformedPacket("PUBACK must be 2 bytes"));
        }
        Ok(Packet::PubAck(PubAck::new(read_u16(body)?)))
    }

    fn decode_subscribe(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        // [MQTT-3.8.1-1] fixed header flags are 0010
        if flags != 0x02 {
            return Err(DecodeError::InvalidFlags);
        }

        let packet_id = read_u16(body)?;
        let mut pos = 2;
        let mut subscriptions = Vec::new();

        while pos < body.len() {
            let (filter, len) = read_string(&body[pos..])?;
            pos += len;

            let options = *body.get(pos).ok_or(DecodeError::InsufficientData)?;
            pos += 1;
            if options & 0xFC != 0 {
                return Err(DecodeError::MalformedPacket("reserved subscription bits set"));
            }
            let qos = QoS::from_u8(options).ok_or(DecodeError::InvalidQoS(options))?;

            subscriptions.push(Subscription {
                filter: filter.to_string(),
                qos,
            });
        }

        if subscriptions.is_empty() {
            return Err(DecodeError::MalformedPacket("SUBSCRIBE without topic filters"));
        }

        Ok(Packet::Subscribe(Subscribe {
            packet_id,
            subscriptions,
        }))
    }

    fn decode_suback(flags: u8, body: &[u8]) -> Result<Packet, DecodeError> {
        if flags != 0 {
            return Err(DecodeError::InvalidFlags);
        }

        let packet_id = read_u16(body)?;
        let return_codes = body[2..]
            .iter()
            .map(|&b| SubscribeReturnCode::from_u8(b).ok_or(DecodeError::InvalidReturnCode(b)))
            .collect::<Result<Vec<_>, _>>()?;

        if return_codes.is_empty() {
            return Err(DecodeError::MalformedPacket("SUBACK without return codes"));
        }

        Ok(Packet::SubAck(SubAck {
            packet_id,
            return_codes,
        }))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
