//! Property tests for IPv4 range expansion

use devscan::{expand, IpRange, ScanError};
use proptest::prelude::*;
use std::net::Ipv4Addr;

proptest! {
    #[test]
    fn expansion_is_inclusive_and_ascending(start in any::<u32>(), span in 0u32..512) {
        let end = start.saturating_add(span);
        let range = expand(&Ipv4Addr::from(start).to_string(), &Ipv4Addr::from(end).to_string()).unwrap();

        let addresses: Vec<u32> = range.iter().map(u32::from).collect();
        prop_assert_eq!(addresses.len() as u64, range.len());
        prop_assert_eq!(addresses.first().copied(), Some(start));
        prop_assert_eq!(addresses.last().copied(), Some(end));
        prop_assert!(addresses.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn reversed_endpoints_are_rejected(a in any::<u32>(), b in any::<u32>()) {
        prop_assume!(a != b);
        let (low, high) = (a.min(b), a.max(b));
        let result = expand(&Ipv4Addr::from(high).to_string(), &Ipv4Addr::from(low).to_string());
        prop_assert!(matches!(result, Err(ScanError::InvalidRange(_))));
    }

    #[test]
    fn last_octet_matches_full_address(prefix in any::<[u8; 3]>(), first in any::<u8>(), last in any::<u8>()) {
        prop_assume!(first <= last);
        let start = Ipv4Addr::new(prefix[0], prefix[1], prefix[2], first);
        let full = Ipv4Addr::new(prefix[0], prefix[1], prefix[2], last);

        let short = expand(&start.to_string(), &last.to_string()).unwrap();
        let long = expand(&start.to_string(), &full.to_string()).unwrap();
        prop_assert_eq!(short, long);
    }

    #[test]
    fn iteration_is_repeatable(start in any::<u32>(), span in 0u32..64) {
        let range = IpRange::new(Ipv4Addr::from(start), Ipv4Addr::from(start.saturating_add(span))).unwrap();
        let first: Vec<Ipv4Addr> = range.iter().collect();
        let second: Vec<Ipv4Addr> = range.iter().collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn range_key_round_trips(start in any::<u32>(), span in 0u32..1024) {
        let range = IpRange::new(Ipv4Addr::from(start), Ipv4Addr::from(start.saturating_add(span))).unwrap();
        prop_assert_eq!(IpRange::parse(&range.key()).unwrap(), range);
    }
}

#[test]
fn full_address_space_length() {
    let range = expand("0.0.0.0", "255.255.255.255").unwrap();
    assert_eq!(range.len(), 1u64 << 32);
    assert_eq!(range.end(), Ipv4Addr::new(255, 255, 255, 255));
    let expected = usize::try_from(1u64 << 32).unwrap_or(usize::MAX);
    assert_eq!(range.iter().len(), expected);
}
