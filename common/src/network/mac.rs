use pnet::util::MacAddr;

/// Builds a MAC address from a raw hardware address attribute.
///
/// Anything that is not exactly six bytes (e.g. InfiniBand GUIDs, tunnels) has
/// no Ethernet address.
pub fn from_bytes(bytes: &[u8]) -> Option<MacAddr> {
    match bytes {
        [a, b, c, d, e, f] => Some(MacAddr::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}
