//! Target parsing: IPv4 ranges for network sweeps
//!
//! This module turns user input into an [`IpRange`]:
//! - start/end address pairs (`10.0.0.1` .. `10.0.0.254`)
//! - same-subnet shorthand, where the end is only a last octet (`10.0.0.1` .. `254`)
//! - range strings (`10.0.0.1-10.0.0.254`, `10.0.0.1-254`)
//! - CIDR notation (`10.0.0.0/24`)
//!
//! Addresses are compared and enumerated as `u32`, so a range may cross
//! octet boundaries.

use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::fmt;
use std::iter::FusedIterator;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::ScanError;

/// End of a range as given by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAddress {
    /// A complete dotted-quad address
    Full(Ipv4Addr),
    /// Only the last octet; the first three octets come from the start address
    LastOctet(u8),
}

impl EndAddress {
    /// Resolve against the start address of the range
    pub fn resolve(self, start: Ipv4Addr) -> Ipv4Addr {
        match self {
            EndAddress::Full(addr) => addr,
            EndAddress::LastOctet(octet) => {
                let [a, b, c, _] = start.octets();
                Ipv4Addr::new(a, b, c, octet)
            }
        }
    }
}

impl FromStr for EndAddress {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('.') {
            parse_ipv4(s).map(EndAddress::Full)
        } else {
            s.parse::<u8>()
                .map(EndAddress::LastOctet)
                .map_err(|_| ScanError::InvalidRange(format!("Invalid last octet: {}", s)))
        }
    }
}

/// An inclusive, ascending IPv4 address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IpRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl IpRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> crate::Result<Self> {
        if u32::from(start) > u32::from(end) {
            return Err(ScanError::InvalidRange(format!(
                "Start address {} is greater than end address {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A range holding exactly one address
    pub fn single(addr: Ipv4Addr) -> Self {
        Self { start: addr, end: addr }
    }

    /// Build a range from textual start and end; the end may be a last octet
    pub fn from_endpoints(start: &str, end: &str) -> crate::Result<Self> {
        let start = parse_ipv4(start)?;
        let end: EndAddress = end.parse()?;
        Self::new(start, end.resolve(start))
    }

    /// Parse a range string: `a.b.c.d-e.f.g.h`, `a.b.c.d-n`, `a.b.c.d/nn` or a single address
    pub fn parse(input: &str) -> crate::Result<Self> {
        let input = input.trim();

        if let Some((start, end)) = input.split_once('-') {
            return Self::from_endpoints(start, end);
        }

        if input.contains('/') {
            return Self::from_cidr(input);
        }

        parse_ipv4(input).map(Self::single)
    }

    /// Host addresses of a CIDR block; network and broadcast are excluded below /31
    pub fn from_cidr(input: &str) -> crate::Result<Self> {
        let network = Ipv4Network::from_str(input.trim())?;
        let first = u32::from(network.network());
        let last = u32::from(network.broadcast());

        if network.prefix() < 31 {
            Self::new(Ipv4Addr::from(first + 1), Ipv4Addr::from(last - 1))
        } else {
            Self::new(Ipv4Addr::from(first), Ipv4Addr::from(last))
        }
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Number of addresses in the range
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    /// A range always holds at least one address
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let value = u32::from(addr);
        value >= u32::from(self.start) && value <= u32::from(self.end)
    }

    /// Normalized key identifying this range, e.g. `10.0.0.1-10.0.0.254`
    pub fn key(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    /// Fresh ascending iterator over every address; may be called any number of times
    pub fn iter(&self) -> IpRangeIter {
        IpRangeIter {
            next: u64::from(u32::from(self.start)),
            end: u64::from(u32::from(self.end)),
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for IpRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IpRange::parse(s)
    }
}

impl IntoIterator for IpRange {
    type Item = Ipv4Addr;
    type IntoIter = IpRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &IpRange {
    type Item = Ipv4Addr;
    type IntoIter = IpRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over an [`IpRange`]
#[derive(Debug, Clone)]
pub struct IpRangeIter {
    // u64 so that 255.255.255.255 terminates without overflow
    next: u64,
    end: u64,
}

impl Iterator for IpRangeIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let addr = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Saturates on targets where usize cannot hold 2^32
        let remaining = usize::try_from((self.end + 1).saturating_sub(self.next)).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IpRangeIter {}
impl FusedIterator for IpRangeIter {}

/// Validate and expand a start/end pair into a restartable range
pub fn expand(start: &str, end: &str) -> crate::Result<IpRange> {
    IpRange::from_endpoints(start, end)
}

/// Parse a dotted-quad IPv4 address with octets 0-255
pub fn parse_ipv4(input: &str) -> crate::Result<Ipv4Addr> {
    let input = input.trim();
    let octets: Vec<&str> = input.split('.').collect();
    if octets.len() != 4 {
        return Err(ScanError::InvalidRange(format!("Invalid IPv4 address: {}", input)));
    }

    let mut parsed = [0u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(&octets) {
        if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ScanError::InvalidRange(format!("Invalid IPv4 address: {}", input)));
        }
        *slot = octet
            .parse()
            .map_err(|_| ScanError::InvalidRange(format!("Octet out of range in {}", input)))?;
    }

    Ok(Ipv4Addr::from(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(range: &IpRange) -> Vec<String> {
        range.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_single_address_range() {
        let range = expand("10.0.0.1", "10.0.0.1").unwrap();
        assert_eq!(addrs(&range), vec!["10.0.0.1"]);
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(matches!(expand("10.0.0.254", "10.0.0.1"), Err(ScanError::InvalidRange(_))));
    }

    #[test]
    fn test_last_octet_shorthand() {
        let range = expand("10.0.0.1", "3").unwrap();
        assert_eq!(addrs(&range), vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

        assert!(expand("10.0.0.5", "3").is_err());
        assert!(expand("10.0.0.5", "256").is_err());
    }

    #[test]
    fn test_range_crosses_octet_boundary() {
        let range = expand("10.0.0.254", "10.0.1.1").unwrap();
        assert_eq!(addrs(&range), vec!["10.0.0.254", "10.0.0.255", "10.0.1.0", "10.0.1.1"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let range = expand("192.168.1.10", "20").unwrap();
        let first: Vec<_> = range.iter().collect();
        let second: Vec<_> = range.into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 11);
        assert_eq!(range.iter().len(), 11);
    }

    #[test]
    fn test_top_of_address_space_terminates() {
        let range = expand("255.255.255.254", "255.255.255.255").unwrap();
        assert_eq!(range.iter().count(), 2);
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in ["10.0.0", "10.0.0.256", "10.0.0.-1", "a.b.c.d", "10..0.1", "1.2.3.4.5", ""] {
            assert!(parse_ipv4(bad).is_err(), "{} should be rejected", bad);
        }
        assert_eq!(parse_ipv4(" 10.0.0.7 ").unwrap(), Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn test_parse_range_strings() {
        let full = IpRange::parse("192.168.1.1-192.168.1.3").unwrap();
        let short = IpRange::parse("192.168.1.1-3").unwrap();
        assert_eq!(full, short);
        assert_eq!(full.key(), "192.168.1.1-192.168.1.3");

        let single = IpRange::parse("192.168.1.9").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.to_string(), "192.168.1.9");

        assert!(IpRange::parse("192.168.1.1-").is_err());
        assert!(IpRange::parse("not-a-range").is_err());
    }

    #[test]
    fn test_cidr_excludes_network_and_broadcast() {
        let range = IpRange::parse("192.168.1.0/24").unwrap();
        assert_eq!(range.start(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(range.end(), Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(range.len(), 254);

        let pair = IpRange::parse("10.0.0.4/31").unwrap();
        assert_eq!(pair.len(), 2);

        let host = IpRange::parse("10.0.0.4/32").unwrap();
        assert_eq!(host.len(), 1);

        assert!(IpRange::parse("10.0.0.0/33").is_err());
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let mut iter = expand("255.255.255.250", "255.255.255.255").unwrap().iter();
        assert_eq!(iter.size_hint(), (6, Some(6)));
        iter.nth(4);
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next(), Some(Ipv4Addr::BROADCAST));
        assert_eq!(iter.size_hint(), (0, Some(0)));

        let full = expand("0.0.0.0", "255.255.255.255").unwrap().iter();
        let expected = usize::try_from(1u64 << 32).unwrap_or(usize::MAX);
        assert_eq!(full.size_hint(), (expected, Some(expected)));
    }

    #[test]
    fn test_contains() {
        let range = expand("10.0.0.10", "20").unwrap();
        assert!(range.contains(Ipv4Addr::new(10, 0, 0, 15)));
        assert!(!range.contains(Ipv4Addr::new(10, 0, 0, 21)));
    }
}
