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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{debug, info};

use crate::community::{LargeCommunity, NoExportTarget, RelationTag};
use crate::config::{ImportSettings, PeerConfig, RedistributeSettings, RedistributeValue, RouterConfig};
use crate::constants::{ListSource, Provenance};
use crate::error::{PolicyError, Result};
use crate::family::AddressFamily;
use crate::lookup::ExternalLookup;
use crate::prefix::PrefixPattern;
use crate::rules::{Rule, RuleDirection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeerType {
    Customer,
    Peer,
    Transit,
    #[serde(rename = "routeserver")]
    RouteServer,
    #[serde(rename = "routecollector")]
    RouteCollector,
    #[serde(rename = "rrclient")]
    RrClient,
    #[serde(rename = "rrserver")]
    RrServer,
    #[serde(rename = "rrserver-rrserver")]
    #[strum(serialize = "rrserver-rrserver")]
    RrServerRrServer,
}

/// How own-ASN communities on received routes are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommunityStrip {
    /// Remove every own community.
    All,
    /// Remove everything except the action communities a customer may set.
    InternalOnly,
    /// Keep them, the peer is part of our own network.
    Keep,
}

impl PeerType {
    pub fn is_route_reflector(self) -> bool {
        matches!(
            self,
            PeerType::RrClient | PeerType::RrServer | PeerType::RrServerRrServer
        )
    }

    pub fn is_external(self) -> bool {
        !self.is_route_reflector()
    }

    /// Route reflector sessions we act as a reflector for need a cluster ID.
    pub fn needs_cluster_id(self) -> bool {
        matches!(self, PeerType::RrClient | PeerType::RrServerRrServer)
    }

    pub fn relation(self) -> Option<RelationTag> {
        match self {
            PeerType::Customer => Some(RelationTag::Customer),
            PeerType::Peer => Some(RelationTag::Peer),
            PeerType::Transit => Some(RelationTag::Transit),
            PeerType::RouteServer => Some(RelationTag::RouteServer),
            _ => None,
        }
    }

    pub fn allows_accept_default(self) -> bool {
        self.is_route_reflector()
    }

    pub fn allows_redistribute_default(self) -> bool {
        self == PeerType::Customer || self.is_route_reflector()
    }

    /// Peer types whose prefix limits fall back to PeeringDB.
    pub fn uses_peeringdb_limits(self) -> bool {
        matches!(self, PeerType::Customer | PeerType::Peer)
    }

    pub fn community_strip(self) -> CommunityStrip {
        match self {
            PeerType::Customer => CommunityStrip::InternalOnly,
            t if t.is_route_reflector() => CommunityStrip::Keep,
            _ => CommunityStrip::All,
        }
    }

    pub fn no_export_target(self) -> Option<NoExportTarget> {
        match self {
            PeerType::Customer => Some(NoExportTarget::NoCustomer),
            PeerType::Peer | PeerType::RouteServer => Some(NoExportTarget::NoPeer),
            PeerType::Transit => Some(NoExportTarget::NoTransit),
            _ => None,
        }
    }

    /// Local preference of routes learned from this type of peer, before
    /// the peer cost is subtracted. Internal sessions keep what they carry.
    pub fn base_local_pref(self) -> Option<u32> {
        match self {
            PeerType::Customer => Some(750),
            PeerType::Peer => Some(470),
            PeerType::RouteServer => Some(450),
            PeerType::Transit => Some(150),
            PeerType::RouteCollector => Some(0),
            _ => None,
        }
    }

    pub fn checks_first_as(self) -> bool {
        matches!(
            self,
            PeerType::Customer | PeerType::Peer | PeerType::Transit | PeerType::RouteCollector
        )
    }

    pub fn checks_next_hop(self) -> bool {
        matches!(self, PeerType::Customer | PeerType::Peer | PeerType::Transit)
    }

    pub fn checks_transit_free(self) -> bool {
        matches!(self, PeerType::Customer | PeerType::Peer)
    }
}

/// A redistribution flag, in the order export filters test them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RedistributeSource {
    Default,
    Connected,
    Kernel,
    Static,
    Originated,
    Bgp,
    BgpOwn,
    BgpCustomer,
    BgpPeering,
    BgpTransit,
}

impl RedistributeSource {
    fn setting(self, settings: &RedistributeSettings) -> Option<&RedistributeValue> {
        match self {
            RedistributeSource::Default => settings.default.as_ref(),
            RedistributeSource::Connected => settings.connected.as_ref(),
            RedistributeSource::Kernel => settings.kernel.as_ref(),
            RedistributeSource::Static => settings.static_routes.as_ref(),
            RedistributeSource::Originated => settings.originated.as_ref(),
            RedistributeSource::Bgp => settings.bgp.as_ref(),
            RedistributeSource::BgpOwn => settings.bgp_own.as_ref(),
            RedistributeSource::BgpCustomer => settings.bgp_customer.as_ref(),
            RedistributeSource::BgpPeering => settings.bgp_peering.as_ref(),
            RedistributeSource::BgpTransit => settings.bgp_transit.as_ref(),
        }
    }

    /// The BGP-wide import flag required to redistribute this source.
    fn required_import(self, import: &ImportSettings) -> Option<(&'static str, bool)> {
        match self {
            RedistributeSource::Connected => Some(("import.connected", import.connected)),
            RedistributeSource::Kernel => Some(("import.kernel", import.kernel)),
            RedistributeSource::Static => Some(("import.static", import.static_routes)),
            _ => None,
        }
    }

    /// Relation tags a BGP route must carry to be covered by this source.
    pub fn relations(self) -> &'static [RelationTag] {
        match self {
            RedistributeSource::BgpOwn => &[RelationTag::Own],
            RedistributeSource::BgpCustomer => &[RelationTag::Customer],
            RedistributeSource::BgpPeering => &[RelationTag::Peer, RelationTag::RouteServer],
            RedistributeSource::BgpTransit => &[RelationTag::Transit],
            _ => &[],
        }
    }
}

/// Which routes are exported to a peer. Built once from the peer type and
/// the explicit overrides, never modified afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedistributionSet {
    default: bool,
    connected: bool,
    kernel: bool,
    static_routes: bool,
    originated: bool,
    bgp: bool,
    bgp_own: bool,
    bgp_customer: bool,
    bgp_peering: bool,
    bgp_transit: bool,
    communities: BTreeMap<RedistributeSource, Vec<LargeCommunity>>,
}

impl RedistributionSet {
    /// The canonical defaults of a peer type.
    pub fn for_peer_type(peer_type: PeerType) -> Self {
        use PeerType::*;
        let reflector = peer_type.is_route_reflector();
        let relation_routes = matches!(
            peer_type,
            Customer | RouteCollector | RouteServer | Peer | Transit
        );
        let customer = peer_type == Customer;
        RedistributionSet {
            bgp: reflector,
            bgp_own: relation_routes,
            bgp_customer: relation_routes,
            bgp_peering: customer,
            bgp_transit: customer,
            ..Default::default()
        }
    }

    fn flag_mut(&mut self, source: RedistributeSource) -> &mut bool {
        match source {
            RedistributeSource::Default => &mut self.default,
            RedistributeSource::Connected => &mut self.connected,
            RedistributeSource::Kernel => &mut self.kernel,
            RedistributeSource::Static => &mut self.static_routes,
            RedistributeSource::Originated => &mut self.originated,
            RedistributeSource::Bgp => &mut self.bgp,
            RedistributeSource::BgpOwn => &mut self.bgp_own,
            RedistributeSource::BgpCustomer => &mut self.bgp_customer,
            RedistributeSource::BgpPeering => &mut self.bgp_peering,
            RedistributeSource::BgpTransit => &mut self.bgp_transit,
        }
    }

    /// Returns a copy with one flag overridden.
    pub fn with_override(
        mut self,
        source: RedistributeSource,
        enabled: bool,
        communities: Vec<LargeCommunity>,
    ) -> Self {
        *self.flag_mut(source) = enabled;
        if communities.is_empty() {
            self.communities.remove(&source);
        } else {
            self.communities.insert(source, communities);
        }
        self
    }

    pub fn is_enabled(&self, source: RedistributeSource) -> bool {
        match source {
            RedistributeSource::Default => self.default,
            RedistributeSource::Connected => self.connected,
            RedistributeSource::Kernel => self.kernel,
            RedistributeSource::Static => self.static_routes,
            RedistributeSource::Originated => self.originated,
            RedistributeSource::Bgp => self.bgp,
            RedistributeSource::BgpOwn => self.bgp_own,
            RedistributeSource::BgpCustomer => self.bgp_customer,
            RedistributeSource::BgpPeering => self.bgp_peering,
            RedistributeSource::BgpTransit => self.bgp_transit,
        }
    }

    /// Communities added to routes exported through `source`.
    pub fn communities(&self, source: RedistributeSource) -> &[LargeCommunity] {
        self.communities
            .get(&source)
            .map(|c| c.as_slice())
            .unwrap_or_default()
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = RedistributeSource> + '_ {
        RedistributeSource::iter().filter(|s| self.is_enabled(*s))
    }
}

/// Router-wide settings a peer policy is resolved against.
#[derive(Clone, Debug)]
pub struct GlobalContext {
    pub asn: u32,
    pub cluster_id: Option<Ipv4Addr>,
    pub import: ImportSettings,
}

impl From<&RouterConfig> for GlobalContext {
    fn from(config: &RouterConfig) -> Self {
        GlobalContext {
            asn: config.asn,
            cluster_id: config.cluster_id,
            import: config.import,
        }
    }
}

/// The resolved, validated policy of one peer.
#[derive(Clone, Debug)]
pub struct PeerPolicy {
    name: String,
    peer_type: PeerType,
    asn: u32,
    description: String,
    neighbor4: Option<Ipv4Addr>,
    source_address4: Option<Ipv4Addr>,
    neighbor6: Option<Ipv6Addr>,
    source_address6: Option<Ipv6Addr>,
    passive: bool,
    local_pref: Option<u32>,
    redistribute: RedistributionSet,
    accept_default: bool,
    prefix_limit4: Option<u32>,
    prefix_limit6: Option<u32>,
    cluster_id: Option<Ipv4Addr>,
    asn_sources: Vec<ListSource>,
    prefix_sources4: Vec<ListSource>,
    prefix_sources6: Vec<ListSource>,
    incoming_large_communities: Vec<LargeCommunity>,
    outgoing_large_communities: Vec<LargeCommunity>,
    quarantine: bool,
    import_rules: Vec<Rule>,
    export_rules: Vec<Rule>,
}

fn valid_peer_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn parse_large_communities(key: &str, values: &[String]) -> Result<Vec<LargeCommunity>> {
    values
        .iter()
        .map(|v| v.parse::<LargeCommunity>().map_err(|e| PolicyError::config(key, e)))
        .collect()
}

/// Splits prefix patterns into IPv4 and IPv6 lists, sorted and deduplicated.
fn split_prefixes(key: &str, values: &[String]) -> Result<(Vec<String>, Vec<String>)> {
    let mut patterns = values
        .iter()
        .map(|v| v.parse::<PrefixPattern>().map_err(|e| PolicyError::config(key, e)))
        .collect::<Result<Vec<PrefixPattern>>>()?;
    patterns.sort();
    patterns.dedup();
    let (v4, v6): (Vec<PrefixPattern>, Vec<PrefixPattern>) = patterns
        .into_iter()
        .partition(|p| p.family() == AddressFamily::Ipv4);
    Ok((
        v4.iter().map(|p| p.to_string()).collect(),
        v6.iter().map(|p| p.to_string()).collect(),
    ))
}

fn sorted_asns(asns: &[u32]) -> Vec<String> {
    let mut asns = asns.to_vec();
    asns.sort_unstable();
    asns.dedup();
    asns.iter().map(|a| a.to_string()).collect()
}

fn push_source(sources: &mut Vec<ListSource>, provenance: Provenance, items: Vec<String>) {
    if !items.is_empty() {
        sources.push(ListSource { provenance, items });
    }
}

impl PeerPolicy {
    /// Resolves the configuration of peer `name`, applying the peer type
    /// defaults and then the explicit overrides.
    pub fn from_config(
        name: &str,
        config: &PeerConfig,
        context: &GlobalContext,
        lookup: &dyn ExternalLookup,
    ) -> Result<Self> {
        let key = format!("peers.{}", name);
        let peer_type = config.peer_type;

        if !valid_peer_name(name) {
            return Err(PolicyError::config(
                &key,
                "peer names may only contain lowercase letters, digits and underscores",
            ));
        }
        if config.neighbor4.is_none() && config.neighbor6.is_none() {
            return Err(PolicyError::config(
                format!("{}.neighbor4", key),
                "at least one of neighbor4 and neighbor6 must be set",
            ));
        }
        if peer_type.is_route_reflector() != (config.asn == context.asn) {
            return Err(PolicyError::config(
                format!("{}.asn", key),
                if peer_type.is_route_reflector() {
                    format!("route reflector sessions must use our own AS{}", context.asn)
                } else {
                    format!("peers of type {} may not use our own AS{}", peer_type, context.asn)
                },
            ));
        }
        if peer_type.needs_cluster_id() && context.cluster_id.is_none() {
            return Err(PolicyError::config(
                "cluster_id",
                format!("peer `{}` of type {} requires a cluster_id", name, peer_type),
            ));
        }

        let accept_default = config.accept.default.unwrap_or(false);
        if accept_default && !peer_type.allows_accept_default() {
            return Err(PolicyError::config(
                format!("{}.accept.default", key),
                format!("peers of type {} may not send us a default route", peer_type),
            ));
        }

        let mut redistribute = RedistributionSet::for_peer_type(peer_type);
        for source in RedistributeSource::iter() {
            let Some(value) = source.setting(&config.redistribute) else {
                continue;
            };
            let source_key = format!("{}.redistribute.{}", key, source);
            let enabled = value.enabled();
            if enabled {
                if let Some((import_key, imported)) = source.required_import(&context.import) {
                    if !imported {
                        return Err(PolicyError::config(
                            &source_key,
                            format!("requires {} to be enabled", import_key),
                        ));
                    }
                }
                if source == RedistributeSource::Default
                    && !peer_type.allows_redistribute_default()
                {
                    return Err(PolicyError::config(
                        &source_key,
                        format!("a default route may not be sent to peers of type {}", peer_type),
                    ));
                }
            }
            let communities = parse_large_communities(
                &format!("{}.large_communities", source_key),
                value.large_communities(),
            )?;
            redistribute = redistribute.with_override(source, enabled, communities);
        }

        let (prefix_limit4, prefix_limit6) = match (config.prefix_limit4, config.prefix_limit6) {
            (Some(l4), Some(l6)) => (Some(l4), Some(l6)),
            (l4, l6) if peer_type.uses_peeringdb_limits() => {
                let info = lookup.peeringdb(config.asn).unwrap_or_default();
                (
                    l4.or(info.info_prefixes4),
                    l6.or(info.info_prefixes6),
                )
            }
            limits => limits,
        };

        let filter_key = format!("{}.filter", key);
        let mut asn_sources = vec![];
        let mut prefix_sources4 = vec![];
        let mut prefix_sources6 = vec![];
        let (static4, static6) =
            split_prefixes(&format!("{}.prefixes", filter_key), &config.filter.prefixes)?;
        push_source(&mut asn_sources, Provenance::Static, sorted_asns(&config.filter.asns));
        push_source(&mut prefix_sources4, Provenance::Static, static4);
        push_source(&mut prefix_sources6, Provenance::Static, static6);
        for as_set in &config.filter.as_sets {
            let object = lookup.irr(as_set).ok_or_else(|| {
                PolicyError::config(
                    format!("{}.as-set", filter_key),
                    format!("IRR object {} has not been resolved", as_set),
                )
            })?;
            let irr_key = format!("{}.as-set.{}", filter_key, as_set);
            let mut irr_prefixes = object.ipv4.clone();
            irr_prefixes.extend(object.ipv6.iter().cloned());
            let (irr4, irr6) = split_prefixes(&irr_key, &irr_prefixes)?;
            let provenance = Provenance::Irr(as_set.clone());
            push_source(&mut asn_sources, provenance.clone(), sorted_asns(&object.asns));
            push_source(&mut prefix_sources4, provenance.clone(), irr4);
            push_source(&mut prefix_sources6, provenance, irr6);
        }

        let mut import_rules = vec![];
        let mut export_rules = vec![];
        for (i, rule) in config.actions.iter().enumerate() {
            let rule = Rule::parse(&format!("{}.actions[{}]", key, i), rule)?;
            match rule.direction {
                RuleDirection::Import => import_rules.push(rule),
                RuleDirection::Export => export_rules.push(rule),
            }
        }

        let policy = PeerPolicy {
            name: name.to_owned(),
            peer_type,
            asn: config.asn,
            description: config
                .description
                .clone()
                .unwrap_or_else(|| format!("AS{} {}", config.asn, name)),
            neighbor4: config.neighbor4,
            source_address4: config.source_address4,
            neighbor6: config.neighbor6,
            source_address6: config.source_address6,
            passive: config.passive,
            local_pref: peer_type
                .base_local_pref()
                .map(|pref| pref.saturating_sub(config.cost)),
            redistribute,
            accept_default,
            prefix_limit4,
            prefix_limit6,
            cluster_id: if peer_type.needs_cluster_id() {
                context.cluster_id
            } else {
                None
            },
            asn_sources,
            prefix_sources4,
            prefix_sources6,
            incoming_large_communities: parse_large_communities(
                &format!("{}.incoming-large-communities", key),
                &config.incoming_large_communities,
            )?,
            outgoing_large_communities: parse_large_communities(
                &format!("{}.outgoing-large-communities", key),
                &config.outgoing_large_communities,
            )?,
            quarantine: config.quarantine,
            import_rules,
            export_rules,
        };
        debug!(
            peer = name,
            peer_type = %peer_type,
            redistribute = ?policy.redistribute,
            "Resolved peer policy"
        );
        info!("Built policy for peer {} (AS{}, {})", name, config.asn, peer_type);
        Ok(policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer_type(&self) -> PeerType {
        self.peer_type
    }

    pub fn asn(&self) -> u32 {
        self.asn
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn has_ipv4(&self) -> bool {
        self.neighbor4.is_some()
    }

    pub fn has_ipv6(&self) -> bool {
        self.neighbor6.is_some()
    }

    pub fn has_family(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.has_ipv4(),
            AddressFamily::Ipv6 => self.has_ipv6(),
        }
    }

    pub fn families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|f| self.has_family(*f))
            .collect()
    }

    /// Neighbor address of the session for `family`, as text.
    pub fn neighbor(&self, family: AddressFamily) -> Option<String> {
        match family {
            AddressFamily::Ipv4 => self.neighbor4.map(|a| a.to_string()),
            AddressFamily::Ipv6 => self.neighbor6.map(|a| a.to_string()),
        }
    }

    pub fn source_address(&self, family: AddressFamily) -> Option<String> {
        match family {
            AddressFamily::Ipv4 => self.source_address4.map(|a| a.to_string()),
            AddressFamily::Ipv6 => self.source_address6.map(|a| a.to_string()),
        }
    }

    pub fn passive(&self) -> bool {
        self.passive
    }

    pub fn local_pref(&self) -> Option<u32> {
        self.local_pref
    }

    pub fn redistribute(&self) -> &RedistributionSet {
        &self.redistribute
    }

    pub fn accept_default(&self) -> bool {
        self.accept_default
    }

    pub fn prefix_limit(&self, family: AddressFamily) -> Option<u32> {
        match family {
            AddressFamily::Ipv4 => self.prefix_limit4,
            AddressFamily::Ipv6 => self.prefix_limit6,
        }
    }

    pub fn cluster_id(&self) -> Option<Ipv4Addr> {
        self.cluster_id
    }

    /// Allowed origin ASNs, grouped by where they came from.
    pub fn asn_sources(&self) -> &[ListSource] {
        &self.asn_sources
    }

    pub fn prefix_sources(&self, family: AddressFamily) -> &[ListSource] {
        match family {
            AddressFamily::Ipv4 => &self.prefix_sources4,
            AddressFamily::Ipv6 => &self.prefix_sources6,
        }
    }

    /// Whether any allow-list was configured, for either family.
    pub fn has_filter(&self) -> bool {
        !self.asn_sources.is_empty()
            || !self.prefix_sources4.is_empty()
            || !self.prefix_sources6.is_empty()
    }

    pub fn incoming_large_communities(&self) -> &[LargeCommunity] {
        &self.incoming_large_communities
    }

    pub fn outgoing_large_communities(&self) -> &[LargeCommunity] {
        &self.outgoing_large_communities
    }

    pub fn quarantine(&self) -> bool {
        self.quarantine
    }

    pub fn rules(&self, direction: RuleDirection) -> &[Rule] {
        match direction {
            RuleDirection::Import => &self.import_rules,
            RuleDirection::Export => &self.export_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticLookup;

    fn context() -> GlobalContext {
        GlobalContext {
            asn: 65000,
            cluster_id: None,
            import: ImportSettings::default(),
        }
    }

    fn peer(json: &str) -> PeerConfig {
        serde_json::from_str(json).unwrap()
    }

    fn build(json: &str, context: &GlobalContext) -> Result<PeerPolicy> {
        PeerPolicy::from_config("p1", &peer(json), context, &StaticLookup::default())
    }

    #[test]
    fn test_redistribution_matrix() {
        use RedistributeSource::*;
        for peer_type in PeerType::iter() {
            let set = RedistributionSet::for_peer_type(peer_type);
            assert_eq!(set.is_enabled(Bgp), peer_type.is_route_reflector(), "{}", peer_type);
            let relation_routes = matches!(
                peer_type,
                PeerType::Customer
                    | PeerType::RouteCollector
                    | PeerType::RouteServer
                    | PeerType::Peer
                    | PeerType::Transit
            );
            assert_eq!(set.is_enabled(BgpOwn), relation_routes);
            assert_eq!(set.is_enabled(BgpCustomer), relation_routes);
            assert_eq!(set.is_enabled(BgpPeering), peer_type == PeerType::Customer);
            assert_eq!(set.is_enabled(BgpTransit), peer_type == PeerType::Customer);
            for source in [Default, Connected, Kernel, Static, Originated] {
                assert!(!set.is_enabled(source));
            }
        }
    }

    #[test]
    fn test_accept_default_rejected_for_external_types() {
        for peer_type in ["customer", "peer", "routeserver", "routecollector", "transit"] {
            let err = build(
                &format!(
                    r#"{{"type": "{}", "asn": 65001, "neighbor4": "192.0.2.1",
                        "accept": {{"default": true}}}}"#,
                    peer_type
                ),
                &context(),
            )
            .unwrap_err();
            assert_eq!(err.key(), Some("peers.p1.accept.default"), "{}", peer_type);
        }
    }

    #[test]
    fn test_accept_default_allowed_for_rrserver() {
        let policy = build(
            r#"{"type": "rrserver", "asn": 65000, "neighbor6": "2001:db8::1",
                "accept": {"default": true}}"#,
            &context(),
        )
        .unwrap();
        assert!(policy.accept_default());
    }

    #[test]
    fn test_redistribute_connected_requires_import() {
        let json = r#"{"type": "customer", "asn": 65001, "neighbor4": "192.0.2.1",
                       "redistribute": {"connected": true}}"#;
        let err = build(json, &context()).unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.redistribute.connected"));
        assert!(err.to_string().contains("import.connected"));

        let mut ctx = context();
        ctx.import.connected = true;
        let policy = build(json, &ctx).unwrap();
        assert!(policy.redistribute().is_enabled(RedistributeSource::Connected));
    }

    #[test]
    fn test_redistribute_default_restricted() {
        let err = build(
            r#"{"type": "peer", "asn": 65001, "neighbor4": "192.0.2.1",
                "redistribute": {"default": true}}"#,
            &context(),
        )
        .unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.redistribute.default"));

        assert!(build(
            r#"{"type": "customer", "asn": 65001, "neighbor4": "192.0.2.1",
                "redistribute": {"default": true}}"#,
            &context(),
        )
        .is_ok());
    }

    #[test]
    fn test_rrclient_requires_cluster_id() {
        let json = r#"{"type": "rrclient", "asn": 65000, "neighbor4": "10.0.0.2"}"#;
        let err = build(json, &context()).unwrap_err();
        assert_eq!(err.key(), Some("cluster_id"));

        let mut ctx = context();
        ctx.cluster_id = Some(Ipv4Addr::new(0, 0, 0, 1));
        let policy = build(json, &ctx).unwrap();
        assert_eq!(policy.cluster_id(), Some(Ipv4Addr::new(0, 0, 0, 1)));
    }

    #[test]
    fn test_override_disables_default_flag() {
        let policy = build(
            r#"{"type": "transit", "asn": 64496, "neighbor4": "192.0.2.1",
                "redistribute": {"bgp_customer": false,
                                 "bgp_own": {"large_communities": ["65000:1:840"]}}}"#,
            &context(),
        )
        .unwrap();
        let set = policy.redistribute();
        assert!(!set.is_enabled(RedistributeSource::BgpCustomer));
        assert!(set.is_enabled(RedistributeSource::BgpOwn));
        assert_eq!(
            set.communities(RedistributeSource::BgpOwn),
            &[LargeCommunity::new(65000, 1, 840)]
        );
    }

    #[test]
    fn test_prefix_limits_from_peeringdb() {
        let lookup = StaticLookup::from_json_str(
            r#"{"peeringdb": {"13335": {"info_prefixes4": 2000, "info_prefixes6": 300}}}"#,
        )
        .unwrap();
        let config = peer(
            r#"{"type": "peer", "asn": 13335, "neighbor4": "192.0.2.1", "prefix_limit6": 50}"#,
        );
        let policy = PeerPolicy::from_config("cf", &config, &context(), &lookup).unwrap();
        assert_eq!(policy.prefix_limit(AddressFamily::Ipv4), Some(2000));
        assert_eq!(policy.prefix_limit(AddressFamily::Ipv6), Some(50));

        // Transit limits are never taken from PeeringDB.
        let config = peer(r#"{"type": "transit", "asn": 13335, "neighbor4": "192.0.2.1"}"#);
        let policy = PeerPolicy::from_config("cf", &config, &context(), &lookup).unwrap();
        assert_eq!(policy.prefix_limit(AddressFamily::Ipv4), None);
    }

    #[test]
    fn test_filter_sources_with_irr() {
        let lookup = StaticLookup::from_json_str(
            r#"{"irr": {"AS-CUST": {"ipv4": ["198.51.100.0/24", "192.0.2.0/24"],
                                    "ipv6": ["2001:db8::/32"], "asns": [64497, 64496]}}}"#,
        )
        .unwrap();
        let config = peer(
            r#"{"type": "customer", "asn": 64496, "neighbor4": "192.0.2.1",
                "filter": {"asns": [64496], "prefixes": ["203.0.113.0/24+"], "as-set": ["AS-CUST"]}}"#,
        );
        let policy = PeerPolicy::from_config("c", &config, &context(), &lookup).unwrap();
        assert_eq!(policy.asn_sources().len(), 2);
        assert_eq!(policy.asn_sources()[1].items, vec!["64496", "64497"]);
        let v4 = policy.prefix_sources(AddressFamily::Ipv4);
        assert_eq!(v4[0].items, vec!["203.0.113.0/24+"]);
        assert_eq!(v4[1].provenance, Provenance::Irr("AS-CUST".to_owned()));
        assert_eq!(v4[1].items, vec!["192.0.2.0/24", "198.51.100.0/24"]);
        assert_eq!(policy.prefix_sources(AddressFamily::Ipv6).len(), 1);
    }

    #[test]
    fn test_unresolved_as_set() {
        let err = build(
            r#"{"type": "customer", "asn": 64496, "neighbor4": "192.0.2.1",
                "filter": {"as-set": ["AS-NOPE"]}}"#,
            &context(),
        )
        .unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.filter.as-set"));
    }

    #[test]
    fn test_invalid_peer_name_and_missing_neighbor() {
        let config = peer(r#"{"type": "peer", "asn": 65001, "neighbor4": "192.0.2.1"}"#);
        let err = PeerPolicy::from_config("Bad-Name", &config, &context(), &StaticLookup::default())
            .unwrap_err();
        assert_eq!(err.key(), Some("peers.Bad-Name"));

        let err = build(r#"{"type": "peer", "asn": 65001}"#, &context()).unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.neighbor4"));
    }

    #[test]
    fn test_asn_must_match_session_kind() {
        let err = build(
            r#"{"type": "rrserver", "asn": 65001, "neighbor4": "10.0.0.1"}"#,
            &context(),
        )
        .unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.asn"));
        let err = build(
            r#"{"type": "transit", "asn": 65000, "neighbor4": "192.0.2.1"}"#,
            &context(),
        )
        .unwrap_err();
        assert_eq!(err.key(), Some("peers.p1.asn"));
    }

    #[test]
    fn test_local_pref_and_cost() {
        let policy = build(
            r#"{"type": "customer", "asn": 65001, "neighbor4": "192.0.2.1", "cost": 50}"#,
            &context(),
        )
        .unwrap();
        assert_eq!(policy.local_pref(), Some(700));
    }
}
