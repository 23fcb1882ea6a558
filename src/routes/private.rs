// RFC1918 range classification

use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::LazyLock;

static RFC1918_BLOCKS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]
        .iter()
        .filter_map(|block| block.parse().ok())
        .collect()
});

/// Returns true when the address sits inside a reserved private block.
/// Addresses for which this holds never get a registry lookup.
pub fn is_private(addr: IpAddr) -> bool {
    RFC1918_BLOCKS
        .iter()
        .any(|block| block.contains(&addr))
}
