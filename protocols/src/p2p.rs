//! Point-to-point addressing derived from a neighbor's advertisement.
//!
//! The neighbor advertises its own address inside a `/30`. A `/30` has exactly
//! two usable hosts (network + 1 and network + 2), so the local end is simply
//! the other one. Both ends run the same rule with complementary roles.

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;

/// The only prefix length with a defined local address.
pub const POINT_TO_POINT_PREFIX: u8 = 30;

/// Low bits selecting a host inside a `/30`.
const HOST_MASK: u32 = 0b11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("no IPv4 CIDR found in discovery text")]
    NoCidr,

    #[error("unsupported prefix length /{prefix} for peer {peer}, only /30 is supported")]
    UnsupportedPrefix { peer: Ipv4Addr, prefix: u8 },

    #[error("peer {peer} is not a usable host address of its /30")]
    NotAHostAddress { peer: Ipv4Addr },
}

impl DeriveError {
    /// Peer address parsed before derivation failed, if any.
    pub fn peer(&self) -> Option<Ipv4Addr> {
        match self {
            DeriveError::NoCidr => None,
            DeriveError::UnsupportedPrefix { peer, .. } => Some(*peer),
            DeriveError::NotAHostAddress { peer } => Some(*peer),
        }
    }
}

/// Both ends of a point-to-point link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointToPoint {
    pub peer: Ipv4Addr,
    pub local: Ipv4Addr,
}

impl PointToPoint {
    /// The local address with its `/30` prefix, as assigned to the link.
    pub fn local_network(&self) -> Ipv4Network {
        with_p2p_prefix(self.local)
    }
}

/// Finds the first `a.b.c.d/len` token in free text.
///
/// Leading annotation tokens such as `no-alert` are skipped.
pub fn find_cidr(text: &str) -> Option<(Ipv4Addr, u8)> {
    text.split_whitespace().find_map(parse_cidr_token)
}

fn parse_cidr_token(token: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = token.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    if prefix > 32 {
        return None;
    }
    Some((addr, prefix))
}

/// Derives the local address from the discovery text of one link.
pub fn derive(text: &str) -> Result<PointToPoint, DeriveError> {
    let (peer, prefix) = find_cidr(text).ok_or(DeriveError::NoCidr)?;

    if prefix != POINT_TO_POINT_PREFIX {
        return Err(DeriveError::UnsupportedPrefix { peer, prefix });
    }

    let host: u32 = u32::from(peer) & HOST_MASK;
    if host == 0 || host == HOST_MASK {
        return Err(DeriveError::NotAHostAddress { peer });
    }

    let local = Ipv4Addr::from(u32::from(peer) ^ HOST_MASK);
    Ok(PointToPoint { peer, local })
}

/// `addr` carrying the `/30` prefix, host bits kept. Use
/// [`Ipv4Network::network`] for the network address itself.
pub fn with_p2p_prefix(addr: Ipv4Addr) -> Ipv4Network {
    match Ipv4Network::new(addr, POINT_TO_POINT_PREFIX) {
        Ok(net) => net,
        Err(_) => unreachable!("/30 is a valid IPv4 prefix"),
    }
}

/// Netmask matching [`POINT_TO_POINT_PREFIX`].
pub fn point_to_point_mask() -> Ipv4Addr {
    with_p2p_prefix(Ipv4Addr::UNSPECIFIED).mask()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_should_pick_other_host_of_slash_30() {
        let pair = derive("no-alert 10.210.8.122/30").unwrap();
        assert_eq!(pair.peer, Ipv4Addr::new(10, 210, 8, 122));
        assert_eq!(pair.local, Ipv4Addr::new(10, 210, 8, 121));

        let pair = derive("no-alert 10.210.8.125/30").unwrap();
        assert_eq!(pair.local, Ipv4Addr::new(10, 210, 8, 126));
    }

    #[test]
    fn derive_should_be_symmetric() {
        let a = derive("10.0.0.1/30").unwrap();
        let b = derive(&format!("{}/30", a.local)).unwrap();
        assert_eq!(b.local, a.peer);
        assert_eq!(b.peer, a.local);
    }

    #[test]
    fn derived_pair_shares_network_and_differs_in_host_bits() {
        for last in [1u8, 2, 5, 6, 9, 10, 253, 254] {
            let text = format!("192.168.7.{last}/30");
            let pair = derive(&text).unwrap();
            assert_ne!(pair.local, pair.peer);
            assert_eq!(
                with_p2p_prefix(pair.local).network(),
                with_p2p_prefix(pair.peer).network()
            );
            assert_eq!(u32::from(pair.local) ^ u32::from(pair.peer), HOST_MASK);
        }
    }

    #[test]
    fn derive_should_fail_on_other_prefix_but_keep_peer() {
        let err = derive("no-alert 10.210.8.122/16").unwrap_err();
        assert_eq!(
            err,
            DeriveError::UnsupportedPrefix {
                peer: Ipv4Addr::new(10, 210, 8, 122),
                prefix: 16
            }
        );
        assert_eq!(err.peer(), Some(Ipv4Addr::new(10, 210, 8, 122)));
    }

    #[test]
    fn derive_should_fail_without_cidr() {
        let err = derive("unexpected port description").unwrap_err();
        assert_eq!(err, DeriveError::NoCidr);
        assert_eq!(err.peer(), None);

        assert_eq!(derive(""), Err(DeriveError::NoCidr));
        assert_eq!(derive("10.210.8.122"), Err(DeriveError::NoCidr));
        assert_eq!(derive("10.210.8.122/33"), Err(DeriveError::NoCidr));
    }

    #[test]
    fn derive_should_reject_network_and_broadcast() {
        assert_eq!(
            derive("10.0.0.4/30"),
            Err(DeriveError::NotAHostAddress {
                peer: Ipv4Addr::new(10, 0, 0, 4)
            })
        );
        assert!(matches!(
            derive("10.0.0.7/30"),
            Err(DeriveError::NotAHostAddress { .. })
        ));
    }

    #[test]
    fn with_p2p_prefix_keeps_host_bits() {
        let net = with_p2p_prefix(Ipv4Addr::new(192, 168, 7, 2));
        assert_eq!(net.ip(), Ipv4Addr::new(192, 168, 7, 2));
        assert_eq!(net.prefix(), POINT_TO_POINT_PREFIX);
        assert_eq!(net.network(), Ipv4Addr::new(192, 168, 7, 0));
    }

    #[test]
    fn find_cidr_skips_annotations() {
        assert_eq!(
            find_cidr("no-alert foo/bar 172.16.0.2/30 10.0.0.1/30"),
            Some((Ipv4Addr::new(172, 16, 0, 2), 30))
        );
    }

    #[test]
    fn point_to_point_mask_is_255_255_255_252() {
        assert_eq!(point_to_point_mask(), Ipv4Addr::new(255, 255, 255, 252));
        assert_eq!(
            derive("10.1.1.1/30").unwrap().local_network().to_string(),
            "10.1.1.2/30"
        );
    }
}
