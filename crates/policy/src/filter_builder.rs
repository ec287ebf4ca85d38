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

//! Builds the filter programs of a peer.
//!
//! Every route received from a peer passes three filters:
//!
//! * `Import` runs on the session and only tags. A route that fails a check
//!   gets a FILTERED community with the reason, it is never dropped here so
//!   it stays visible in the peer table.
//! * `PeerToMain` moves untagged routes from the peer table to the main BGP
//!   table.
//! * `MainToPeer` decides what is exported to the peer.

use strum_macros::Display;
use tracing::trace;

use crate::community::{
    pattern_set, CommunityCodec, CommunityFunction, CommunityPattern, FilterReason, LargeCommunity,
    RelationTag, ValuePattern, ACTION_FUNCTIONS,
};
use crate::constants::{peer_asn_list, peer_prefix_list};
use crate::error::Result;
use crate::family::AddressFamily;
use crate::functions::BgpFunction;
use crate::peer_policy::{CommunityStrip, PeerPolicy, PeerType, RedistributeSource};
use crate::rules::{aggregate_name, compile, FunctionFragment, RuleDirection};
use crate::statement::{render, Expr, Statement};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// Session to peer table.
    Import,
    /// Peer table to main BGP table.
    PeerToMain,
    /// Main BGP table to peer table.
    MainToPeer,
}

/// Name of the filter of `peer` for `family` and `direction`.
pub fn filter_name(peer: &str, family: AddressFamily, direction: Direction) -> String {
    let suffix = match direction {
        Direction::Import => "import",
        Direction::PeerToMain => "to_main",
        Direction::MainToPeer => "export",
    };
    format!("f_bgp{}_{}_{}", family.suffix(), peer, suffix)
}

/// Prefix of the rule functions of `peer` for `direction`.
pub fn action_base(peer: &str, direction: RuleDirection) -> String {
    match direction {
        RuleDirection::Import => format!("bgp_{}_import_action", peer),
        RuleDirection::Export => format!("bgp_{}_export_action", peer),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterProgram {
    pub name: String,
    pub family: AddressFamily,
    pub direction: Direction,
    pub locals: Vec<String>,
    pub statements: Vec<Statement>,
}

impl FilterProgram {
    pub fn to_statement(&self) -> Statement {
        Statement::Filter {
            name: self.name.clone(),
            locals: self.locals.clone(),
            body: self.statements.clone(),
        }
    }

    pub fn render(&self) -> String {
        render(&[self.to_statement()])
    }
}

fn add(community: LargeCommunity) -> Statement {
    Statement::call(format!("bgp_large_community.add({})", community))
}

fn delete(patterns: &[CommunityPattern]) -> Statement {
    Statement::call(format!("bgp_large_community.delete({})", pattern_set(patterns)))
}

fn is_default(family: AddressFamily) -> Expr {
    Expr::raw(format!("net = {}", family.default_route()))
}

pub struct FilterProgramBuilder {
    codec: CommunityCodec,
}

impl FilterProgramBuilder {
    pub fn new(codec: CommunityCodec) -> Self {
        FilterProgramBuilder { codec }
    }

    pub fn build(
        &self,
        peer: &PeerPolicy,
        family: AddressFamily,
        direction: Direction,
    ) -> Result<FilterProgram> {
        trace!(peer = peer.name(), %family, %direction, "Building filter program");
        let (locals, statements) = match direction {
            Direction::Import => (vec![], self.import(peer, family)?),
            Direction::PeerToMain => (vec![], self.peer_to_main()?),
            Direction::MainToPeer => (
                vec!["int accept_route".to_owned()],
                self.main_to_peer(peer, family)?,
            ),
        };
        Ok(FilterProgram {
            name: filter_name(peer.name(), family, direction),
            family,
            direction,
            locals,
            statements,
        })
    }

    /// The match/action rule functions of `peer`, import rules first.
    pub fn rule_functions(&self, peer: &PeerPolicy) -> Vec<FunctionFragment> {
        [RuleDirection::Import, RuleDirection::Export]
            .into_iter()
            .flat_map(|d| compile(&action_base(peer.name(), d), peer.rules(d)))
            .collect()
    }

    fn tag(&self, reason: FilterReason) -> Result<Statement> {
        Ok(add(self.codec.filtered(reason)?))
    }

    fn tag_if(&self, condition: Expr, reason: FilterReason) -> Result<Statement> {
        Ok(Statement::when(condition, vec![self.tag(reason)?]))
    }

    fn import(&self, peer: &PeerPolicy, family: AddressFamily) -> Result<Vec<Statement>> {
        let peer_type = peer.peer_type();
        let mut out = vec![];

        match peer_type.community_strip() {
            CommunityStrip::All => {
                out.push(Statement::comment("Remove our own communities"));
                out.push(delete(&[self
                    .codec
                    .own_pattern(ValuePattern::Any, ValuePattern::Any)?]));
            }
            CommunityStrip::InternalOnly => {
                out.push(Statement::comment(
                    "Remove our own communities, except actions",
                ));
                out.push(delete(&self.codec.internal_patterns()?));
            }
            CommunityStrip::Keep => {}
        }
        if let Some(relation) = peer_type.relation() {
            out.push(add(self.codec.relation(relation)?));
        }
        if let Some(pref) = peer.local_pref() {
            out.push(Statement::assign("bgp_local_pref", pref.to_string()));
        }

        // An accepted default route still runs through the allow-lists,
        // quarantine, rules and incoming communities below.
        if !peer.accept_default() {
            out.push(Statement::comment("Default route"));
            out.push(self.tag_if(is_default(family), FilterReason::DefaultNotAllowed)?);
        }

        if peer_type == PeerType::RouteCollector {
            out.push(Statement::comment("Nothing from a route collector is used"));
            out.push(self.tag(FilterReason::Routecollector)?);
        }

        if peer_type.is_external() {
            out.push(Statement::comment("Sanity checks"));
            let prefix_checks = [
                (BgpFunction::is_bogon(family), FilterReason::Bogon),
                (BgpFunction::prefix_too_long(family), FilterReason::PrefixTooLong),
                (BgpFunction::prefix_too_short(family), FilterReason::PrefixTooShort),
            ]
            .into_iter()
            .map(|(function, reason)| self.tag_if(function.call(), reason))
            .collect::<Result<Vec<_>>>()?;
            if peer.accept_default() {
                out.push(Statement::when(is_default(family).negate(), prefix_checks));
            } else {
                out.extend(prefix_checks);
            }
            let path_checks = [
                (BgpFunction::HasBogonAsn, FilterReason::BogonAsn),
                (BgpFunction::PathTooLong, FilterReason::AsPathTooLong),
                (BgpFunction::PathTooShort, FilterReason::AsPathTooShort),
            ];
            for (function, reason) in path_checks {
                out.push(self.tag_if(function.call(), reason)?);
            }
            if peer_type.checks_first_as() {
                out.push(self.tag_if(
                    Expr::raw(format!("bgp_path.first != {}", peer.asn())),
                    FilterReason::FirstAsMismatch,
                )?);
            }
            if peer_type.checks_next_hop() {
                if let Some(neighbor) = peer.neighbor(family) {
                    out.push(self.tag_if(
                        Expr::raw(format!("bgp_next_hop != {}", neighbor)),
                        FilterReason::NexthopMismatch,
                    )?);
                }
            }
            if peer_type.checks_transit_free() {
                out.push(self.tag_if(
                    BgpFunction::HasTransitFreeAsn.call(),
                    FilterReason::TransitFreeAsn,
                )?);
            }
            out.push(self.tag_if(
                BgpFunction::TooManyCommunities.call(),
                FilterReason::TooManyCommunities,
            )?);
        }

        if peer.has_filter() {
            out.push(Statement::comment("Allowed origins and prefixes"));
            if !peer.asn_sources().is_empty() {
                out.push(self.tag_if(
                    Expr::raw(format!("bgp_path.last ~ {}", peer_asn_list(peer.name()))).negate(),
                    FilterReason::OriginFiltered,
                )?);
            }
            let any_prefixes = AddressFamily::ALL
                .iter()
                .any(|f| !peer.prefix_sources(*f).is_empty());
            if !peer.prefix_sources(family).is_empty() {
                out.push(self.tag_if(
                    Expr::raw(format!("net ~ {}", peer_prefix_list(peer.name(), family)))
                        .negate(),
                    FilterReason::PrefixFiltered,
                )?);
            } else if any_prefixes {
                // Prefixes were only listed for the other family.
                out.push(self.tag(FilterReason::PrefixFiltered)?);
            }
        }

        if peer.quarantine() {
            out.push(Statement::comment("Quarantined"));
            out.push(self.tag(FilterReason::Quarantined)?);
        }

        if !peer.rules(RuleDirection::Import).is_empty() {
            let actions = aggregate_name(&action_base(peer.name(), RuleDirection::Import));
            out.push(self.tag_if(Expr::call(&actions).negate(), FilterReason::CustomAction)?);
        }

        out.extend(peer.incoming_large_communities().iter().copied().map(add));
        out.push(Statement::Accept);
        Ok(out)
    }

    fn peer_to_main(&self) -> Result<Vec<Statement>> {
        let filtered = self
            .codec
            .match_pattern(CommunityFunction::Filtered, ValuePattern::Any)?;
        Ok(vec![
            Statement::when(
                Expr::raw(format!("bgp_large_community ~ {}", pattern_set(&[filtered]))),
                vec![Statement::Reject],
            ),
            Statement::Accept,
        ])
    }

    /// The test selecting routes covered by `source`.
    fn provenance(
        &self,
        source: RedistributeSource,
        peer: &PeerPolicy,
        family: AddressFamily,
    ) -> Result<Expr> {
        let originate = format!("\"originate{}\"", family.suffix());
        let expr = match source {
            RedistributeSource::Connected => Expr::raw("source = RTS_DEVICE"),
            RedistributeSource::Kernel => Expr::raw("source = RTS_INHERIT"),
            RedistributeSource::Static => {
                Expr::raw("source = RTS_STATIC").and(Expr::raw(format!("proto != {}", originate)))
            }
            RedistributeSource::Originated => Expr::raw(format!("proto = {}", originate)),
            RedistributeSource::Bgp => Expr::raw("source = RTS_BGP"),
            RedistributeSource::Default => is_default(family),
            relation => {
                let patterns = relation
                    .relations()
                    .iter()
                    .map(|r: &RelationTag| {
                        self.codec
                            .match_pattern(CommunityFunction::Relation, ValuePattern::Exact(r.code()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Expr::raw("source = RTS_BGP")
                    .and(Expr::raw(format!(
                        "bgp_large_community ~ {}",
                        pattern_set(&patterns)
                    )))
                    .and(BgpFunction::can_export(family).call_with(peer.asn()))
            }
        };
        Ok(expr)
    }

    fn main_to_peer(&self, peer: &PeerPolicy, family: AddressFamily) -> Result<Vec<Statement>> {
        let peer_type = peer.peer_type();
        let redistribute = peer.redistribute();
        let mut out = vec![Statement::assign("accept_route", "0")];

        if peer_type.is_external() {
            out.push(Statement::comment("Do not export when asked not to"));
            let mut targets = vec![peer.asn()];
            targets.extend(peer_type.no_export_target().map(|t| t.code()));
            for target in targets {
                let community = self.codec.encode_own(CommunityFunction::NoExport, target)?;
                out.push(Statement::when(
                    Expr::raw(format!("{} ~ bgp_large_community", community)),
                    vec![Statement::Reject],
                ));
            }
        }

        for source in redistribute.enabled_sources() {
            if source == RedistributeSource::Default {
                continue;
            }
            out.push(Statement::comment(format!("Redistribute {}", source)));
            let mut then: Vec<Statement> = redistribute
                .communities(source)
                .iter()
                .copied()
                .map(add)
                .collect();
            then.push(Statement::assign("accept_route", "1"));
            out.push(Statement::when(self.provenance(source, peer, family)?, then));
        }

        out.push(Statement::comment("Default route"));
        if redistribute.is_enabled(RedistributeSource::Default) {
            out.push(Statement::when(
                is_default(family).and(Expr::raw("accept_route = 0")),
                vec![Statement::Reject],
            ));
            let tags: Vec<Statement> = redistribute
                .communities(RedistributeSource::Default)
                .iter()
                .copied()
                .map(add)
                .collect();
            if !tags.is_empty() {
                out.push(Statement::when(is_default(family), tags));
            }
        } else {
            out.push(Statement::when(is_default(family), vec![Statement::Reject]));
        }

        let mut export = vec![];
        if !peer.rules(RuleDirection::Export).is_empty() {
            let actions = aggregate_name(&action_base(peer.name(), RuleDirection::Export));
            export.push(Statement::when(
                Expr::call(&actions).negate(),
                vec![Statement::Reject],
            ));
        }
        export.extend(peer.outgoing_large_communities().iter().copied().map(add));
        if peer_type.is_external() {
            export.push(Statement::call(
                BgpFunction::ExportPrepend.call_with(peer.asn()).to_string(),
            ));
            let relation = self
                .codec
                .match_pattern(CommunityFunction::Relation, ValuePattern::Any)?;
            let actions = self.codec.own_pattern(
                ValuePattern::Range(*ACTION_FUNCTIONS.start(), *ACTION_FUNCTIONS.end()),
                ValuePattern::Any,
            )?;
            let filtered = self
                .codec
                .match_pattern(CommunityFunction::Filtered, ValuePattern::Any)?;
            export.push(delete(&[relation, actions, filtered]));
        }
        export.push(Statement::Accept);
        out.push(Statement::when(Expr::raw("accept_route > 0"), export));
        out.push(Statement::Reject);
        Ok(out)
    }
}
