//! ICMPv4 echo framing on top of `pnet_packet`.

use std::net::Ipv4Addr;
use std::time::Duration;

use pnet_packet::icmp::{self, echo_request, IcmpCode, IcmpPacket, IcmpTypes};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet;

use crate::error::Error;

/// Size of the ICMP header: type, code, checksum and the 4 byte rest-of-header.
pub const HEADER_SIZE: usize = 8;

/// Receive buffer size, one ethernet MTU.
pub const MAX_PACKET_SIZE: usize = 1500;

const IPV4_VERSION: u8 = 4;
const MIN_IPV4_HEADER_SIZE: usize = 20;

/// How a received ICMP message is classified for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Echo Reply with code 0.
    EchoReply,
    /// Code 1, host unreachable.
    DestinationUnreachable,
    /// Any other type/code pair, carrying the raw code.
    Other(u8),
}

/// EchoReply is a decoded inbound ICMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReply {
    pub kind: ReplyKind,
    /// Raw ICMP type of the message.
    pub icmp_type: u8,
    pub code: u8,
    /// First half of the rest-of-header, the identifier for echo messages.
    pub identifier: u16,
    /// Second half of the rest-of-header, the sequence number for echo messages.
    pub sequence: u16,
    pub source: Ipv4Addr,
    pub rtt: Duration,
    /// Length of the ICMP message, without any IP header.
    pub raw_length: usize,
}

impl EchoReply {
    pub fn is_echo_reply_type(&self) -> bool {
        self.icmp_type == IcmpTypes::EchoReply.0
    }
}

/// Build an Echo Request (type 8, code 0) with a valid checksum.
pub fn encode(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0; HEADER_SIZE + payload.len()];
    let mut packet = echo_request::MutableEchoRequestPacket::new(&mut buf[..])
        .ok_or_else(|| Error::Encoding(format!("buffer of {} bytes is too small", HEADER_SIZE + payload.len())))?;
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(echo_request::IcmpCodes::NoCode);
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence);
    packet.set_payload(payload);

    let icmp_packet = IcmpPacket::new(packet.packet())
        .ok_or_else(|| Error::Encoding("echo request is not a valid icmp packet".to_string()))?;
    let checksum = icmp::checksum(&icmp_packet);
    packet.set_checksum(checksum);

    Ok(buf)
}

/// Parse an ICMP message, verify its checksum and classify it.
pub fn decode(buf: &[u8], source: Ipv4Addr, rtt: Duration) -> Result<EchoReply, Error> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::Decoding(format!(
            "message of {} bytes is shorter than the {} byte header",
            buf.len(),
            HEADER_SIZE
        )));
    }

    let packet = IcmpPacket::new(buf)
        .ok_or_else(|| Error::Decoding("not an icmp packet".to_string()))?;

    let expected = packet.get_checksum();
    let actual = icmp::checksum(&packet);
    if actual != expected {
        return Err(Error::Decoding(format!(
            "checksum is incorrect: actual = {:04x}, expect = {:04x}",
            actual, expected
        )));
    }

    let icmp_type = packet.get_icmp_type();
    let IcmpCode(code) = packet.get_icmp_code();

    let kind = match (icmp_type, code) {
        (IcmpTypes::EchoReply, 0) => ReplyKind::EchoReply,
        (_, 1) => ReplyKind::DestinationUnreachable,
        (_, code) => ReplyKind::Other(code),
    };

    Ok(EchoReply {
        kind,
        icmp_type: icmp_type.0,
        code,
        identifier: u16::from_be_bytes([buf[4], buf[5]]),
        sequence: u16::from_be_bytes([buf[6], buf[7]]),
        source,
        rtt,
        raw_length: buf.len(),
    })
}

/// Drop a leading IPv4 header if the buffer carries one. Raw sockets always
/// deliver it, datagram sockets only on some platforms.
pub fn strip_ip_header(buf: &[u8]) -> Result<&[u8], Error> {
    match buf.first() {
        Some(first) if first >> 4 == IPV4_VERSION => {}
        _ => return Ok(buf),
    }

    let ipv4 = Ipv4Packet::new(buf)
        .ok_or_else(|| Error::Decoding(format!("truncated ipv4 header of {} bytes", buf.len())))?;
    let header_len = ipv4.get_header_length() as usize * 4;
    if header_len < MIN_IPV4_HEADER_SIZE || header_len > buf.len() {
        return Err(Error::Decoding(format!(
            "invalid ipv4 header length {} for {} bytes",
            header_len,
            buf.len()
        )));
    }

    Ok(&buf[header_len..])
}

/// Tell whether a received ICMP message may answer our request. Our own
/// looped back requests, replies to other pingers and errors about datagrams
/// other than our echo requests are not candidates.
/// Anything unparsable is passed on so decoding can report it.
pub fn is_reply_candidate(buf: &[u8], identifier: u16, check_identifier: bool) -> bool {
    let packet = match IcmpPacket::new(buf) {
        Some(packet) => packet,
        None => return true,
    };

    match packet.get_icmp_type() {
        IcmpTypes::EchoRequest => false,
        IcmpTypes::EchoReply if check_identifier && buf.len() >= HEADER_SIZE => {
            u16::from_be_bytes([buf[4], buf[5]]) == identifier
        }
        IcmpTypes::DestinationUnreachable | IcmpTypes::TimeExceeded | IcmpTypes::ParameterProblem
            if check_identifier =>
        {
            embedded_echo_identifier(buf) == Some(identifier)
        }
        _ => true,
    }
}

// Error messages quote the IP header and first 8 bytes of the datagram that
// caused them. Returns the identifier if that datagram was an echo request.
fn embedded_echo_identifier(buf: &[u8]) -> Option<u16> {
    let quoted = buf.get(HEADER_SIZE..)?;
    let ipv4 = Ipv4Packet::new(quoted)?;
    let header_len = ipv4.get_header_length() as usize * 4;
    if header_len < MIN_IPV4_HEADER_SIZE {
        return None;
    }

    let echo = quoted.get(header_len..header_len + HEADER_SIZE)?;
    if echo[0] != IcmpTypes::EchoRequest.0 {
        return None;
    }

    Some(u16::from_be_bytes([echo[4], echo[5]]))
}

/// Human readable name of an ICMP type.
pub fn type_name(icmp_type: u8) -> String {
    match icmp_type {
        0 => "echo reply".to_string(),
        3 => "destination unreachable".to_string(),
        4 => "source quench".to_string(),
        5 => "redirect".to_string(),
        8 => "echo request".to_string(),
        11 => "time exceeded".to_string(),
        12 => "parameter problem".to_string(),
        13 => "timestamp".to_string(),
        14 => "timestamp reply".to_string(),
        other => format!("type {}", other),
    }
}
