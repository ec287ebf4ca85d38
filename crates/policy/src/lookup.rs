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

//! Results of PeeringDB and IRR lookups.
//!
//! The compiler never performs network I/O. Whatever fetches the data
//! (rate limiting, timeouts and caching included) must finish before
//! compilation starts and hand the results over through [`ExternalLookup`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{PolicyError, Result};

/// Prefix counts a network registered in PeeringDB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringDbInfo {
    pub info_prefixes4: Option<u32>,
    pub info_prefixes6: Option<u32>,
}

/// Expansion of an IRR object such as an as-set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrObject {
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub ipv6: Vec<String>,
    #[serde(default)]
    pub asns: Vec<u32>,
}

pub trait ExternalLookup {
    /// PeeringDB data for `asn`. Always `None` for private ASNs.
    fn peeringdb(&self, asn: u32) -> Option<PeeringDbInfo>;
    /// The expansion of the IRR object `name`, if it was resolved.
    fn irr(&self, name: &str) -> Option<IrrObject>;
}

/// ASNs reserved for private use never have registry data.
pub fn is_private_asn(asn: u32) -> bool {
    (64512..=65534).contains(&asn) || (4200000000..=4294967294).contains(&asn)
}

/// Lookup results loaded from a JSON document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticLookup {
    #[serde(default)]
    pub peeringdb: BTreeMap<u32, PeeringDbInfo>,
    #[serde(default)]
    pub irr: BTreeMap<String, IrrObject>,
}

impl StaticLookup {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| PolicyError::config("lookup", e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| PolicyError::config("lookup", e.to_string()))
    }
}

impl ExternalLookup for StaticLookup {
    fn peeringdb(&self, asn: u32) -> Option<PeeringDbInfo> {
        if is_private_asn(asn) {
            return None;
        }
        self.peeringdb.get(&asn).copied()
    }

    fn irr(&self, name: &str) -> Option<IrrObject> {
        self.irr.get(name).cloned()
    }
}
