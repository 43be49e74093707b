// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed identifiers for switch objects.
//!
//! Thin newtypes so that a VLAN id cannot be passed where a router id is
//! expected. All of them serialize as their underlying integer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $repr:ty) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Copy,
            Clone,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
            Serialize,
            Deserialize,
            JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// A VRF / routing table namespace identifier.
    RouterId, u32
);
id_type!(
    /// A layer-3 interface identifier.
    InterfaceId, u32
);
id_type!(
    /// A VLAN identifier.
    VlanId, u16
);
id_type!(
    /// A physical port identifier.
    PortId, u32
);
id_type!(
    /// A link-aggregation group identifier.
    AggregatePortId, u32
);
id_type!(
    /// An ACL entry identifier.
    AclEntryId, u32
);
id_type!(
    /// An external route producer. Lower ids take precedence when several
    /// clients advertise next hops for the same prefix.
    ClientId, u16
);

impl RouterId {
    /// The default VRF.
    pub const DEFAULT: RouterId = RouterId(0);
}
