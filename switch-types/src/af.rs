// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Address family markers.
//!
//! `Ipv4` and `Ipv6` are zero-sized types that discriminate generic
//! containers at compile time. Structures generic over a family carry a
//! `PhantomData<A>` or use `A::Addr` directly; there is no runtime
//! dispatch between families.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP address family.
///
/// Implemented by the [Ipv4] and [Ipv6] markers only.
pub trait Af:
    Copy + Clone + Debug + Eq + PartialEq + Ord + PartialOrd + Hash + Send + Sync + 'static
{
    type Addr: Copy
        + Clone
        + Debug
        + Display
        + Eq
        + PartialEq
        + Ord
        + PartialOrd
        + Hash
        + Send
        + Sync
        + FromStr
        + Serialize
        + DeserializeOwned
        + 'static;

    /// Bit width of an address in this family.
    const WIDTH: u8;

    /// Short family name for diagnostics.
    const NAME: &'static str;

    /// The all-zeros address.
    fn unspecified() -> Self::Addr;

    /// Clear all bits of `addr` beyond `length`.
    fn apply_mask(addr: Self::Addr, length: u8) -> Self::Addr;

    /// True if the first `length` bits of `addr` and `network` agree.
    fn contains(network: Self::Addr, length: u8, addr: Self::Addr) -> bool;

    fn from_ip(ip: IpAddr) -> Option<Self::Addr>;
    fn to_ip(addr: Self::Addr) -> IpAddr;

    /// Wrap a prefix of this family into the family-erased sum.
    fn wrap_prefix(prefix: crate::prefix::Prefix<Self>) -> crate::prefix::IpPrefix;
}

/// IPv4 address family marker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv4;

/// IPv6 address family marker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ipv6;

impl Af for Ipv4 {
    type Addr = Ipv4Addr;

    const WIDTH: u8 = 32;
    const NAME: &'static str = "v4";

    fn unspecified() -> Ipv4Addr {
        Ipv4Addr::UNSPECIFIED
    }

    fn apply_mask(addr: Ipv4Addr, length: u8) -> Ipv4Addr {
        let mask = match length {
            0 => 0,
            _ => (!0u32) << (32 - length),
        };
        Ipv4Addr::from_bits(addr.to_bits() & mask)
    }

    fn contains(network: Ipv4Addr, length: u8, addr: Ipv4Addr) -> bool {
        Self::apply_mask(addr, length) == network
    }

    fn from_ip(ip: IpAddr) -> Option<Ipv4Addr> {
        match ip {
            IpAddr::V4(a) => Some(a),
            IpAddr::V6(_) => None,
        }
    }

    fn to_ip(addr: Ipv4Addr) -> IpAddr {
        IpAddr::V4(addr)
    }

    fn wrap_prefix(
        prefix: crate::prefix::Prefix<Ipv4>,
    ) -> crate::prefix::IpPrefix {
        crate::prefix::IpPrefix::V4(prefix)
    }
}

impl Af for Ipv6 {
    type Addr = Ipv6Addr;

    const WIDTH: u8 = 128;
    const NAME: &'static str = "v6";

    fn unspecified() -> Ipv6Addr {
        Ipv6Addr::UNSPECIFIED
    }

    fn apply_mask(addr: Ipv6Addr, length: u8) -> Ipv6Addr {
        let mask = match length {
            0 => 0,
            _ => (!0u128) << (128 - length),
        };
        Ipv6Addr::from_bits(addr.to_bits() & mask)
    }

    fn contains(network: Ipv6Addr, length: u8, addr: Ipv6Addr) -> bool {
        Self::apply_mask(addr, length) == network
    }

    fn from_ip(ip: IpAddr) -> Option<Ipv6Addr> {
        match ip {
            IpAddr::V6(a) => Some(a),
            IpAddr::V4(_) => None,
        }
    }

    fn to_ip(addr: Ipv6Addr) -> IpAddr {
        IpAddr::V6(addr)
    }

    fn wrap_prefix(
        prefix: crate::prefix::Prefix<Ipv6>,
    ) -> crate::prefix::IpPrefix {
        crate::prefix::IpPrefix::V6(prefix)
    }
}

/// True for addresses that require interface scoping on next hops:
/// `fe80::/10` for v6 and `169.254.0.0/16` for v4.
pub fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(a) => a.is_link_local(),
        IpAddr::V6(a) => a.is_unicast_link_local(),
    }
}
