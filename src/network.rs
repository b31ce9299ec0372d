//! CIDR network literals
//!
//! `Network` is the parsed form of a `1.2.3.0/24` style line. Parsing is
//! strict: the prefix length is mandatory, whitespace inside the literal is
//! rejected, and host bits are cleared so `10.1.2.3/8` becomes `10.0.0.0/8`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP network: base address plus prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Network {
    addr: IpAddr,
    prefix_len: u8,
}

/// Why a CIDR literal was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNetworkError(String);

impl fmt::Display for ParseNetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseNetworkError {}

impl Network {
    /// Build a network, masking off host bits
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, ParseNetworkError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(ParseNetworkError(format!(
                "prefix length {} exceeds {}",
                prefix_len, max
            )));
        }

        let addr = match addr {
            IpAddr::V4(v4) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
            }
            IpAddr::V6(v6) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
            }
        };

        Ok(Self { addr, prefix_len })
    }

    /// Network base address (host bits zero)
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, prefix_str) = s
            .split_once('/')
            .ok_or_else(|| ParseNetworkError("missing prefix length".to_string()))?;

        let addr = addr_str
            .parse::<IpAddr>()
            .map_err(|_| ParseNetworkError(format!("invalid address {:?}", addr_str)))?;

        // u8::from_str accepts a leading '+', CIDR notation does not
        if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseNetworkError(format!(
                "invalid prefix length {:?}",
                prefix_str
            )));
        }
        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| ParseNetworkError(format!("invalid prefix length {:?}", prefix_str)))?;

        Network::new(addr, prefix_len)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}
