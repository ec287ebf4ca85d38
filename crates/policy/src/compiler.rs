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
use tracing::{info, warn};

use crate::community::CommunityCodec;
use crate::config::RouterConfig;
use crate::constants::{global_constants, peer_asn_list, peer_prefix_list, ConstantsEmitter, NamedList};
use crate::error::{PolicyError, Result};
use crate::family::AddressFamily;
use crate::filter_builder::{Direction, FilterProgramBuilder};
use crate::functions::registry;
use crate::lookup::ExternalLookup;
use crate::peer_policy::{GlobalContext, PeerPolicy};
use crate::pipes;
use crate::statement::{render, Statement};

/// Compiles a router configuration into routing daemon configuration text.
///
/// All validation happens in [`PolicyCompiler::new`]. Once constructed, the
/// compiler only renders and the output depends on nothing but the inputs.
pub struct PolicyCompiler {
    config: RouterConfig,
    originate: Vec<IpNet>,
    builder: FilterProgramBuilder,
    peers: Vec<PeerPolicy>,
}

fn parse_originate(prefixes: &[String]) -> Result<Vec<IpNet>> {
    prefixes
        .iter()
        .map(|p| {
            let net: IpNet = p
                .parse()
                .map_err(|e| PolicyError::config("originate", format!("{}: {}", p, e)))?;
            if net.trunc() != net {
                return Err(PolicyError::config(
                    "originate",
                    format!("{} has host bits set, did you mean {}?", p, net.trunc()),
                ));
            }
            Ok(net)
        })
        .collect()
}

impl PolicyCompiler {
    pub fn new(config: RouterConfig, lookup: &dyn ExternalLookup) -> Result<Self> {
        if config.asn == 0 {
            return Err(PolicyError::config("asn", "AS 0 is reserved"));
        }
        let originate = parse_originate(&config.originate)?;
        if config.router_id.is_none() {
            warn!("No router_id configured, the routing daemon will pick one");
        }

        let context = GlobalContext::from(&config);
        let peers = config
            .peers
            .iter()
            .map(|(name, peer)| PeerPolicy::from_config(name, peer, &context, lookup))
            .collect::<Result<Vec<_>>>()?;

        Ok(PolicyCompiler {
            builder: FilterProgramBuilder::new(CommunityCodec::with_asn(config.asn)),
            config,
            originate,
            peers,
        })
    }

    /// Resolved peers, in name order.
    pub fn peers(&self) -> &[PeerPolicy] {
        &self.peers
    }

    pub fn peer(&self, name: &str) -> Option<&PeerPolicy> {
        self.peers.iter().find(|p| p.name() == name)
    }

    fn peer_lists(&self) -> Vec<NamedList> {
        let mut lists = vec![];
        for peer in &self.peers {
            lists.push(NamedList::new(
                peer_asn_list(peer.name()),
                peer.asn_sources().to_vec(),
            ));
            for family in AddressFamily::ALL {
                lists.push(NamedList::new(
                    peer_prefix_list(peer.name(), family),
                    peer.prefix_sources(family).to_vec(),
                ));
            }
        }
        lists
    }

    fn peer_statements(&self, peer: &PeerPolicy) -> Result<Vec<Statement>> {
        let mut out = vec![Statement::comment(format!(
            "Peer {}: AS{} ({})",
            peer.name(),
            peer.asn(),
            peer.peer_type()
        ))];
        out.extend(
            self.builder
                .rule_functions(peer)
                .iter()
                .map(|f| f.to_statement()),
        );
        for family in peer.families() {
            for direction in [Direction::Import, Direction::PeerToMain, Direction::MainToPeer] {
                out.push(self.builder.build(peer, family, direction)?.to_statement());
            }
            out.push(pipes::peer_pipe(peer, family));
            out.extend(pipes::protocol(peer, family, self.config.asn));
        }
        Ok(out)
    }

    pub fn statements(&self) -> Result<Vec<Statement>> {
        let mut out = vec![
            Statement::comment(format!(
                "BGP policy for AS{}, generated by bgp_policy. Do not edit.",
                self.config.asn
            )),
            Statement::Blank,
        ];
        if let Some(router_id) = self.config.router_id {
            out.push(Statement::setting(format!("router id {}", router_id)));
            out.push(Statement::Blank);
        }

        out.extend(global_constants(self.config.asn));
        out.extend(ConstantsEmitter::statements(&self.peer_lists()));
        out.push(Statement::Blank);

        out.extend(registry(&CommunityCodec::with_asn(self.config.asn))?);
        out.push(Statement::Blank);

        let peers: Vec<&PeerPolicy> = self.peers.iter().collect();
        for family in AddressFamily::ALL {
            out.extend(pipes::tables(family, &peers));
            out.extend(pipes::originate(family, &self.originate));
            out.extend(pipes::master(family, &self.config.import));
            out.push(Statement::Blank);
        }

        for peer in &self.peers {
            out.extend(self.peer_statements(peer)?);
            out.push(Statement::Blank);
        }
        Ok(out)
    }

    pub fn compile(&self) -> Result<String> {
        let text = render(&self.statements()?);
        info!(
            "Compiled policy for AS{} with {} peers",
            self.config.asn,
            self.peers.len()
        );
        Ok(text)
    }
}
