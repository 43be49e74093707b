// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network prefixes, generic over address family.

use crate::af::{Af, Ipv4, Ipv6};
use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

/// A network prefix in family `A`.
///
/// Invariant: all bits of `network` beyond `length` are zero. The
/// constructors canonicalize, so a `Prefix` obtained through them always
/// satisfies this.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(bound = "")]
pub struct Prefix<A: Af> {
    pub network: A::Addr,
    pub length: u8,
}

pub type Prefix4 = Prefix<Ipv4>;
pub type Prefix6 = Prefix<Ipv6>;

impl<A: Af> Prefix<A> {
    /// Create a new prefix, clearing host bits.
    ///
    /// ```
    /// use switch_types::Prefix4;
    /// use std::net::Ipv4Addr;
    /// let p = Prefix4::new(Ipv4Addr::new(10, 0, 0, 10), 24);
    /// assert_eq!(p.network, Ipv4Addr::new(10, 0, 0, 0));
    /// ```
    pub fn new(addr: A::Addr, length: u8) -> Self {
        Self { network: A::apply_mask(addr, length), length }
    }

    /// The all-zeros default prefix for this family.
    pub fn default_route() -> Self {
        Self { network: A::unspecified(), length: 0 }
    }

    pub fn is_default_route(&self) -> bool {
        self.length == 0
    }

    /// True if `addr` falls inside this prefix.
    pub fn contains(&self, addr: A::Addr) -> bool {
        A::contains(self.network, self.length, addr)
    }

    pub fn host_bits_are_unset(&self) -> bool {
        A::apply_mask(self.network, self.length) == self.network
    }

    /// This prefix as the family-erased sum type.
    pub fn to_ip_prefix(&self) -> IpPrefix {
        A::wrap_prefix(*self)
    }
}

// Prefixes sort by length first so that an ordered container groups all
// prefixes of one specificity together.
impl<A: Af> PartialOrd for Prefix<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<A: Af> Ord for Prefix<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.length != other.length {
            return self.length.cmp(&other.length);
        }
        self.network.cmp(&other.network)
    }
}

impl<A: Af> fmt::Display for Prefix<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.length)
    }
}

impl<A: Af> FromStr for Prefix<A> {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, length) = s.split_once('/').ok_or(TypeError::Cidr)?;
        let addr = addr
            .parse::<A::Addr>()
            .map_err(|_| TypeError::Addr(addr.to_string()))?;
        let length = length
            .parse::<u8>()
            .map_err(|_| TypeError::Cidr)?;
        if length > A::WIDTH {
            return Err(TypeError::Length {
                family: A::NAME,
                length,
                max: A::WIDTH,
            });
        }
        Ok(Self::new(addr, length))
    }
}

/// A prefix of either family, used at API boundaries where the family is
/// not known statically. Orders by (family, length, network).
#[derive(
    Debug,
    Copy,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
pub enum IpPrefix {
    V4(Prefix4),
    V6(Prefix6),
}

impl IpPrefix {
    /// Create a prefix from an address of either family, clearing host
    /// bits. Fails when `length` exceeds the family width.
    pub fn new(addr: IpAddr, length: u8) -> Result<Self, TypeError> {
        match addr {
            IpAddr::V4(a) => {
                if length > 32 {
                    return Err(TypeError::Length {
                        family: "v4",
                        length,
                        max: 32,
                    });
                }
                Ok(Self::V4(Prefix4::new(a, length)))
            }
            IpAddr::V6(a) => {
                if length > 128 {
                    return Err(TypeError::Length {
                        family: "v6",
                        length,
                        max: 128,
                    });
                }
                Ok(Self::V6(Prefix6::new(a, length)))
            }
        }
    }

    pub fn network(&self) -> IpAddr {
        match self {
            Self::V4(p) => IpAddr::V4(p.network),
            Self::V6(p) => IpAddr::V6(p.network),
        }
    }

    pub fn length(&self) -> u8 {
        match self {
            Self::V4(p) => p.length,
            Self::V6(p) => p.length,
        }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (Self::V4(p), IpAddr::V4(a)) => p.contains(a),
            (Self::V6(p), IpAddr::V6(a)) => p.contains(a),
            _ => false,
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(p) => p.fmt(f),
            Self::V6(p) => p.fmt(f),
        }
    }
}

impl From<Prefix4> for IpPrefix {
    fn from(value: Prefix4) -> Self {
        Self::V4(value)
    }
}

impl From<Prefix6> for IpPrefix {
    fn from(value: Prefix6) -> Self {
        Self::V6(value)
    }
}

impl FromStr for IpPrefix {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, _) = s.split_once('/').ok_or(TypeError::Cidr)?;
        if addr.contains(':') {
            Ok(Self::V6(s.parse()?))
        } else {
            Ok(Self::V4(s.parse()?))
        }
    }
}
