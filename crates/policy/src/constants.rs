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

//! Named constants and lists referenced by the filter programs.

use crate::family::AddressFamily;
use crate::statement::{render, SetGroup, Statement};

pub const PREFIX_MAXLEN4: u8 = 24;
pub const PREFIX_MINLEN4: u8 = 8;
pub const PREFIX_MAXLEN6: u8 = 48;
pub const PREFIX_MINLEN6: u8 = 16;
pub const PATH_MAXLEN: u32 = 100;
pub const PATH_MINLEN: u32 = 1;
pub const COMMUNITY_MAX: u32 = 100;

const BOGONS_V4: &[&str] = &[
    "0.0.0.0/8+",
    "10.0.0.0/8+",
    "100.64.0.0/10+",
    "127.0.0.0/8+",
    "169.254.0.0/16+",
    "172.16.0.0/12+",
    "192.0.0.0/24+",
    "192.0.2.0/24+",
    "192.168.0.0/16+",
    "198.18.0.0/15+",
    "198.51.100.0/24+",
    "203.0.113.0/24+",
    "224.0.0.0/4+",
    "240.0.0.0/4+",
];

const BOGONS_V6: &[&str] = &[
    "::/8+",
    "0100::/64+",
    "2001:2::/48+",
    "2001:10::/28+",
    "2001:db8::/32+",
    "2002::/16+",
    "3ffe::/16+",
    "fc00::/7+",
    "fe80::/10+",
    "fec0::/10+",
    "ff00::/8+",
];

const BOGON_ASNS: &[&str] = &[
    "0",
    "23456",
    "64496..64511",
    "64512..65534",
    "65535",
    "65536..65551",
    "65552..131071",
    "4200000000..4294967294",
    "4294967295",
];

/// Networks that never buy transit. Seeing one of them behind a customer or
/// a peer means the route leaked.
const TRANSIT_FREE_ASNS: &[u32] = &[
    174, 209, 701, 702, 1239, 1299, 2914, 3257, 3320, 3356, 3491, 5511, 6453, 6461, 6762, 6830,
    7018, 12956,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    Static,
    Irr(String),
}

/// Items of a list that came from the same place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSource {
    pub provenance: Provenance,
    pub items: Vec<String>,
}

impl ListSource {
    fn comment(&self) -> String {
        match &self.provenance {
            Provenance::Static => format!("{} statically defined", self.items.len()),
            Provenance::Irr(object) => {
                format!("{} from IRR object {}", self.items.len(), object)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedList {
    pub name: String,
    pub sources: Vec<ListSource>,
}

impl NamedList {
    pub fn new(name: impl Into<String>, sources: Vec<ListSource>) -> Self {
        NamedList {
            name: name.into(),
            sources,
        }
    }

    fn statically(name: &str, items: impl IntoIterator<Item = String>) -> Self {
        NamedList::new(
            name,
            vec![ListSource {
                provenance: Provenance::Static,
                items: items.into_iter().collect(),
            }],
        )
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|s| s.items.is_empty())
    }
}

/// Name of the set of origin ASNs allowed from a peer.
pub fn peer_asn_list(peer: &str) -> String {
    format!("BGP_PEER_{}_ASNS", peer.to_uppercase())
}

/// Name of the set of prefixes of `family` allowed from a peer.
pub fn peer_prefix_list(peer: &str, family: AddressFamily) -> String {
    format!("BGP_PEER_{}_PREFIXES{}", peer.to_uppercase(), family.suffix())
}

pub struct ConstantsEmitter;

impl ConstantsEmitter {
    /// One `define` per non-empty list, in the order given.
    pub fn statements(lists: &[NamedList]) -> Vec<Statement> {
        lists
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| Statement::DefineSet {
                name: l.name.clone(),
                groups: l
                    .sources
                    .iter()
                    .filter(|s| !s.items.is_empty())
                    .map(|s| SetGroup {
                        comment: s.comment(),
                        items: s.items.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn emit(lists: &[NamedList]) -> String {
        render(&Self::statements(lists))
    }
}

/// Constants shared by every peer.
pub fn global_constants(asn: u32) -> Vec<Statement> {
    let scalars = [
        ("BGP_ASN", asn.to_string()),
        ("BGP_PREFIX_MAXLEN4", PREFIX_MAXLEN4.to_string()),
        ("BGP_PREFIX_MINLEN4", PREFIX_MINLEN4.to_string()),
        ("BGP_PREFIX_MAXLEN6", PREFIX_MAXLEN6.to_string()),
        ("BGP_PREFIX_MINLEN6", PREFIX_MINLEN6.to_string()),
        ("BGP_PATH_MAXLEN", PATH_MAXLEN.to_string()),
        ("BGP_PATH_MINLEN", PATH_MINLEN.to_string()),
        ("BGP_COMMUNITY_MAX", COMMUNITY_MAX.to_string()),
    ];
    let mut out: Vec<Statement> = scalars
        .into_iter()
        .map(|(name, value)| Statement::Define {
            name: name.to_owned(),
            value,
        })
        .collect();
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    out.extend(ConstantsEmitter::statements(&[
        NamedList::statically("BOGONS_V4", owned(BOGONS_V4)),
        NamedList::statically("BOGONS_V6", owned(BOGONS_V6)),
        NamedList::statically("BOGON_ASNS", owned(BOGON_ASNS)),
        NamedList::statically(
            "TRANSIT_FREE_ASNS",
            TRANSIT_FREE_ASNS.iter().map(|a| a.to_string()),
        ),
    ]));
    out
}
