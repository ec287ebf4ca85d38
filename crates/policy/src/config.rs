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

use serde::de::value::MapAccessDeserializer;
use serde::de::{self, IntoDeserializer, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{PolicyError, Result};
use crate::peer_policy::PeerType;
use crate::rules::RuleDirection;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Our own autonomous system number.
    pub asn: u32,

    pub router_id: Option<Ipv4Addr>,

    // Required as soon as one peer is a route reflector client.
    pub cluster_id: Option<Ipv4Addr>,

    /// Which non-BGP routes from the master tables enter the BGP tables.
    #[serde(default)]
    pub import: ImportSettings,

    /// Prefixes we originate ourselves.
    #[serde(default)]
    pub originate: Vec<String>,

    // Peers are kept sorted by name so the output is reproducible.
    #[serde(default)]
    pub peers: BTreeMap<String, PeerConfig>,
}

impl RouterConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| PolicyError::config("config", e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| PolicyError::config("config", e.to_string()))
    }
}

/// BGP-wide import flags.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSettings {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub kernel: bool,
    #[serde(default, rename = "static")]
    pub static_routes: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    #[serde(rename = "type")]
    pub peer_type: PeerType,

    /// Autonomous system number of the peer.
    pub asn: u32,

    pub description: Option<String>,

    pub neighbor4: Option<Ipv4Addr>,
    pub source_address4: Option<Ipv4Addr>,
    pub neighbor6: Option<Ipv6Addr>,
    pub source_address6: Option<Ipv6Addr>,

    /// Subtracted from the local preference of routes learned from this peer.
    #[serde(default)]
    pub cost: u32,

    pub prefix_limit4: Option<u32>,
    pub prefix_limit6: Option<u32>,

    // Only listen for the session, never connect out.
    #[serde(default)]
    pub passive: bool,

    #[serde(default)]
    pub redistribute: RedistributeSettings,

    #[serde(default)]
    pub accept: AcceptSettings,

    #[serde(default)]
    pub filter: FilterSettings,

    /// Large communities added to every route received from the peer.
    #[serde(default, rename = "incoming-large-communities")]
    pub incoming_large_communities: Vec<String>,

    /// Large communities added to every route sent to the peer.
    #[serde(default, rename = "outgoing-large-communities")]
    pub outgoing_large_communities: Vec<String>,

    /// Tag everything received as quarantined so nothing gets exported.
    #[serde(default)]
    pub quarantine: bool,

    #[serde(default)]
    pub actions: Vec<RuleConfig>,
}

/// A redistribution flag is either a plain boolean or an object listing the
/// large communities to add to routes exported through it.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RedistributeValue {
    Enabled(bool),
    Tagged(TaggedRedistribute),
}

// Deserialized by hand so unknown fields inside the object form are reported
// by name.
impl<'de> Deserialize<'de> for RedistributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RedistributeVisitor;

        impl<'de> Visitor<'de> for RedistributeVisitor {
            type Value = RedistributeValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a boolean or an object with large_communities")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
                Ok(RedistributeValue::Enabled(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Self::Value, A::Error> {
                TaggedRedistribute::deserialize(MapAccessDeserializer::new(map))
                    .map(RedistributeValue::Tagged)
            }
        }

        deserializer.deserialize_any(RedistributeVisitor)
    }
}

impl RedistributeValue {
    pub fn enabled(&self) -> bool {
        match self {
            RedistributeValue::Enabled(enabled) => *enabled,
            RedistributeValue::Tagged(_) => true,
        }
    }

    pub fn large_communities(&self) -> &[String] {
        match self {
            RedistributeValue::Enabled(_) => &[],
            RedistributeValue::Tagged(t) => &t.large_communities,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaggedRedistribute {
    #[serde(default)]
    pub large_communities: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedistributeSettings {
    pub default: Option<RedistributeValue>,
    pub connected: Option<RedistributeValue>,
    pub kernel: Option<RedistributeValue>,
    #[serde(rename = "static")]
    pub static_routes: Option<RedistributeValue>,
    pub originated: Option<RedistributeValue>,
    pub bgp: Option<RedistributeValue>,
    pub bgp_own: Option<RedistributeValue>,
    pub bgp_customer: Option<RedistributeValue>,
    pub bgp_peering: Option<RedistributeValue>,
    pub bgp_transit: Option<RedistributeValue>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptSettings {
    pub default: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSettings {
    /// Origin ASNs allowed from this peer.
    #[serde(default)]
    pub asns: Vec<u32>,
    /// Prefix patterns allowed from this peer, both families mixed.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// IRR objects whose prefixes and ASNs are allowed.
    #[serde(default, rename = "as-set")]
    pub as_sets: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub direction: RuleDirection,

    /// All present matchers must match for the action to be executed.
    #[serde(default, rename = "matches")]
    pub matcher: FilterMatcher,

    pub action: FilterAction,
}

/// A list of values to match, optionally negated with `{"not": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchList<T> {
    Any(Vec<T>),
    Not { not: Vec<T> },
}

impl<T> MatchList<T> {
    pub fn values(&self) -> &[T] {
        match self {
            MatchList::Any(values) => values,
            MatchList::Not { not } => not,
        }
    }

    pub fn negated(&self) -> bool {
        matches!(self, MatchList::Not { .. })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterMatcher {
    pub origin_asn: Option<MatchList<u32>>,
    pub prefix: Option<MatchList<String>>,
    pub community: Option<MatchList<String>>,
    pub extended_community: Option<MatchList<String>>,
    pub large_community: Option<MatchList<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKeyword {
    Reject,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum FilterAction {
    Keyword(ActionKeyword),
    Update(UpdateAction),
}

impl<'de> Deserialize<'de> for FilterAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ActionVisitor;

        impl<'de> Visitor<'de> for ActionVisitor {
            type Value = FilterAction;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"reject\" or an update object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                ActionKeyword::deserialize(v.into_deserializer()).map(FilterAction::Keyword)
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Self::Value, A::Error> {
                UpdateAction::deserialize(MapAccessDeserializer::new(map)).map(FilterAction::Update)
            }
        }

        deserializer.deserialize_any(ActionVisitor)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAction {
    pub community: Option<CommunityUpdate>,
    pub extended_community: Option<CommunityUpdate>,
    pub large_community: Option<CommunityUpdate>,
    pub prepend: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityUpdate {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}
