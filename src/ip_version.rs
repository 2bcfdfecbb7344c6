//! Address family of an xdb file.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Address family an xdb file was built for.
///
/// Addresses of either family are carried as a `u128` internally so the
/// search loop is shared; IPv4 addresses occupy the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IpVersion {
    #[default]
    #[serde(rename = "v4", alias = "ipv4")]
    V4,
    #[serde(rename = "v6", alias = "ipv6")]
    V6,
}

impl IpVersion {
    /// Width of an address in bytes.
    pub fn ip_bytes(self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }

    /// Size of one IndexBlock record: start + end + data_len (u16) + data_ptr (u32).
    pub fn segment_index_size(self) -> usize {
        self.ip_bytes() * 2 + 6
    }

    /// Map the header's ip version field.
    pub fn from_header_id(id: u16) -> Option<Self> {
        match id {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }

    /// Value stored in the header's ip version field.
    pub fn header_id(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Parse a textual address of this family.
    ///
    /// An address of the other family is rejected.
    pub fn parse_addr(self, ip: &str) -> Result<u128> {
        match self {
            IpVersion::V4 => ip
                .parse::<Ipv4Addr>()
                .map(|v4| u32::from(v4) as u128)
                .map_err(|_| Error::InvalidAddress(format!("{:?} is not an IPv4 address", ip))),
            IpVersion::V6 => ip
                .parse::<Ipv6Addr>()
                .map(u128::from)
                .map_err(|_| Error::InvalidAddress(format!("{:?} is not an IPv6 address", ip))),
        }
    }

    /// Convert a parsed address, rejecting the other family.
    pub fn addr_from_ip(self, ip: IpAddr) -> Result<u128> {
        match (self, ip) {
            (IpVersion::V4, IpAddr::V4(v4)) => Ok(u32::from(v4) as u128),
            (IpVersion::V6, IpAddr::V6(v6)) => Ok(u128::from(v6)),
            (_, other) => Err(Error::InvalidAddress(format!(
                "{} does not belong to an {} database",
                other, self
            ))),
        }
    }

    /// Render an address of this family.
    pub fn to_ip(self, addr: u128) -> IpAddr {
        match self {
            IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(addr as u32)),
            IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(addr)),
        }
    }

    /// Largest address of this family.
    pub fn max_addr(self) -> u128 {
        match self {
            IpVersion::V4 => u32::MAX as u128,
            IpVersion::V6 => u128::MAX,
        }
    }

    /// Vector index key: the first two bytes of the address in network order.
    pub fn shard_key(self, addr: u128) -> usize {
        let shift = (self.ip_bytes() - 2) * 8;
        ((addr >> shift) & 0xFFFF) as usize
    }

    /// Decode an address stored in an IndexBlock record.
    ///
    /// IPv4 addresses are stored little-endian, IPv6 addresses in network order.
    /// `bytes` must hold at least [`ip_bytes`](Self::ip_bytes) bytes.
    pub fn decode_addr(self, bytes: &[u8]) -> u128 {
        match self {
            IpVersion::V4 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                u32::from_le_bytes(raw) as u128
            }
            IpVersion::V6 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&bytes[..16]);
                u128::from_be_bytes(raw)
            }
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IpVersion::V4 => "v4",
            IpVersion::V6 => "v6",
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(IpVersion::V4),
            "v6" | "ipv6" | "6" => Ok(IpVersion::V6),
            _ => Err(Error::InvalidIpVersion(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_sizes() {
        assert_eq!(IpVersion::V4.segment_index_size(), 14);
        assert_eq!(IpVersion::V6.segment_index_size(), 38);
    }

    #[test]
    fn test_parse_v4() {
        assert_eq!(IpVersion::V4.parse_addr("1.2.3.4").unwrap(), 0x01020304);
        assert_eq!(
            IpVersion::V4.parse_addr("255.255.255.255").unwrap(),
            u32::MAX as u128
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1.2.3", "1.2.3.256", "a.b.c.d", " 1.2.3.4", "1.2.3.4.5"] {
            assert!(
                matches!(IpVersion::V4.parse_addr(bad), Err(Error::InvalidAddress(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_rejects_wrong_family() {
        assert!(matches!(
            IpVersion::V4.parse_addr("2001:db8::1"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            IpVersion::V6.parse_addr("1.2.3.4"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(IpVersion::V4
            .addr_from_ip("::1".parse().unwrap())
            .is_err());
    }

    #[test]
    fn test_shard_key() {
        assert_eq!(IpVersion::V4.shard_key(0x01020304), 0x0102);
        let v6 = IpVersion::V6.parse_addr("2604:bc80::1").unwrap();
        assert_eq!(IpVersion::V6.shard_key(v6), 0x2604);
    }

    #[test]
    fn test_decode_addr() {
        assert_eq!(IpVersion::V4.decode_addr(&[4, 3, 2, 1]), 0x01020304);
        let mut v6 = [0u8; 16];
        v6[0] = 0x20;
        v6[15] = 1;
        assert_eq!(IpVersion::V6.decode_addr(&v6), (0x20u128 << 120) | 1);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ipv4".parse::<IpVersion>().unwrap(), IpVersion::V4);
        assert_eq!("V6".parse::<IpVersion>().unwrap(), IpVersion::V6);
        assert!(matches!(
            "v5".parse::<IpVersion>(),
            Err(Error::InvalidIpVersion(_))
        ));
    }
}
