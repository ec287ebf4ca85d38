// Copyright 2021 Rayhaan Jaufeerally.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

// Address families a filter program is generated for. Every table, pipe,
// filter and protocol name carries the family suffix.
#[derive(
    Eq, PartialEq, Debug, Copy, Clone, Serialize, Deserialize, Hash, PartialOrd, Ord,
)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// Suffix used in generated names, e.g. `t_bgp4`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Ipv4 => "4",
            Self::Ipv6 => "6",
        }
    }

    /// Channel keyword in the routing daemon configuration.
    pub fn channel(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        }
    }

    pub fn default_route(self) -> &'static str {
        match self {
            Self::Ipv4 => "0.0.0.0/0",
            Self::Ipv6 => "::/0",
        }
    }

    /// Value of `net.type` for routes of this family.
    pub fn net_type(self) -> &'static str {
        match self {
            Self::Ipv4 => "NET_IP4",
            Self::Ipv6 => "NET_IP6",
        }
    }

    pub fn master_table(self) -> &'static str {
        match self {
            Self::Ipv4 => "master4",
            Self::Ipv6 => "master6",
        }
    }
}

impl From<&IpNet> for AddressFamily {
    fn from(net: &IpNet) -> Self {
        match net {
            IpNet::V4(_) => AddressFamily::Ipv4,
            IpNet::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "Ipv4"),
            Self::Ipv6 => write!(f, "Ipv6"),
        }
    }
}
