//! Link Layer Discovery Protocol (IEEE 802.1AB) frames.
//!
//! Only the TLVs the daemon cares about are decoded. Everything else is
//! skipped by length.

use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherType, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use thiserror::Error;

pub const LLDP_ETHERTYPE: EtherType = EtherType(0x88cc);

/// Nearest-bridge multicast group, destination of every LLDPDU we expect.
pub const LLDP_MULTICAST: MacAddr = MacAddr(0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e);

const ETH_HDR_LEN: usize = 14;
const TLV_HDR_LEN: usize = 2;

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;
const TLV_PORT_DESCRIPTION: u8 = 4;
const TLV_SYSTEM_NAME: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LldpError {
    #[error("not an LLDP frame")]
    NotLldp,

    #[error("truncated LLDPDU at offset {0}")]
    Truncated(usize),

    #[error("mandatory TLV {0} missing")]
    MissingTlv(&'static str),
}

/// Chassis or port identifier: subtype plus opaque value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub subtype: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lldpdu {
    pub chassis_id: Identifier,
    pub port_id: Identifier,
    pub ttl: u16,
    pub port_description: Option<String>,
    pub system_name: Option<String>,
}

/// An LLDPDU together with the hardware address that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub source: MacAddr,
    pub lldpdu: Lldpdu,
}

pub fn is_lldp_frame(frame: &[u8]) -> bool {
    EthernetPacket::new(frame).is_some_and(|eth| eth.get_ethertype() == LLDP_ETHERTYPE)
}

/// Decodes an Ethernet frame carrying an LLDPDU.
pub fn parse_frame(frame: &[u8]) -> Result<Neighbor, LldpError> {
    let eth: EthernetPacket = EthernetPacket::new(frame).ok_or(LldpError::NotLldp)?;
    if eth.get_ethertype() != LLDP_ETHERTYPE {
        return Err(LldpError::NotLldp);
    }

    let lldpdu: Lldpdu = parse_lldpdu(eth.payload())?;
    Ok(Neighbor {
        source: eth.get_source(),
        lldpdu,
    })
}

pub fn parse_lldpdu(data: &[u8]) -> Result<Lldpdu, LldpError> {
    let mut chassis_id: Option<Identifier> = None;
    let mut port_id: Option<Identifier> = None;
    let mut ttl: Option<u16> = None;
    let mut port_description: Option<String> = None;
    let mut system_name: Option<String> = None;

    let mut cursor: usize = 0;
    while cursor < data.len() {
        if cursor + TLV_HDR_LEN > data.len() {
            return Err(LldpError::Truncated(cursor));
        }
        let header: u16 = u16::from_be_bytes([data[cursor], data[cursor + 1]]);
        let tlv_type: u8 = (header >> 9) as u8;
        let len: usize = (header & 0x01ff) as usize;
        cursor += TLV_HDR_LEN;

        if cursor + len > data.len() {
            return Err(LldpError::Truncated(cursor));
        }
        let value: &[u8] = &data[cursor..cursor + len];
        cursor += len;

        match tlv_type {
            TLV_END => break,
            TLV_CHASSIS_ID => chassis_id = Some(identifier(value, cursor)?),
            TLV_PORT_ID => port_id = Some(identifier(value, cursor)?),
            TLV_TTL => {
                if value.len() < 2 {
                    return Err(LldpError::Truncated(cursor));
                }
                ttl = Some(u16::from_be_bytes([value[0], value[1]]));
            }
            TLV_PORT_DESCRIPTION => port_description = Some(text(value)),
            TLV_SYSTEM_NAME => system_name = Some(text(value)),
            _ => {}
        }
    }

    Ok(Lldpdu {
        chassis_id: chassis_id.ok_or(LldpError::MissingTlv("chassis id"))?,
        port_id: port_id.ok_or(LldpError::MissingTlv("port id"))?,
        ttl: ttl.ok_or(LldpError::MissingTlv("ttl"))?,
        port_description,
        system_name,
    })
}

fn identifier(value: &[u8], offset: usize) -> Result<Identifier, LldpError> {
    let (subtype, rest) = value.split_first().ok_or(LldpError::Truncated(offset))?;
    Ok(Identifier {
        subtype: *subtype,
        value: rest.to_vec(),
    })
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// Builds a complete LLDP frame addressed to the nearest-bridge group.
pub fn build_frame(source: MacAddr, lldpdu: &Lldpdu) -> Vec<u8> {
    let mut payload: Vec<u8> = Vec::new();

    push_identifier(&mut payload, TLV_CHASSIS_ID, &lldpdu.chassis_id);
    push_identifier(&mut payload, TLV_PORT_ID, &lldpdu.port_id);
    push_tlv(&mut payload, TLV_TTL, &lldpdu.ttl.to_be_bytes());
    if let Some(description) = &lldpdu.port_description {
        push_tlv(&mut payload, TLV_PORT_DESCRIPTION, description.as_bytes());
    }
    if let Some(name) = &lldpdu.system_name {
        push_tlv(&mut payload, TLV_SYSTEM_NAME, name.as_bytes());
    }
    push_tlv(&mut payload, TLV_END, &[]);

    let mut buffer: Vec<u8> = vec![0u8; ETH_HDR_LEN + payload.len()];
    if let Some(mut eth) = MutableEthernetPacket::new(&mut buffer) {
        eth.set_destination(LLDP_MULTICAST);
        eth.set_source(source);
        eth.set_ethertype(LLDP_ETHERTYPE);
        eth.set_payload(&payload);
    }
    buffer
}

fn push_identifier(buffer: &mut Vec<u8>, tlv_type: u8, id: &Identifier) {
    let mut value: Vec<u8> = Vec::with_capacity(id.value.len() + 1);
    value.push(id.subtype);
    value.extend_from_slice(&id.value);
    push_tlv(buffer, tlv_type, &value);
}

fn push_tlv(buffer: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    let len: u16 = value.len().min(0x01ff) as u16;
    let header: u16 = (u16::from(tlv_type) << 9) | len;
    buffer.extend_from_slice(&header.to_be_bytes());
    buffer.extend_from_slice(&value[..len as usize]);
}
