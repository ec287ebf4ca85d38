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

//! Routing tables, pipes and protocol blocks.
//!
//! Per family there is one main BGP table `t_bgp{4,6}`, connected to the
//! master table, and one table per peer. Routes only move between tables
//! through pipes whose filters are built by [`crate::filter_builder`].

use ipnet::IpNet;

use crate::config::ImportSettings;
use crate::family::AddressFamily;
use crate::filter_builder::{filter_name, Direction};
use crate::peer_policy::PeerPolicy;
use crate::statement::{Expr, Statement};

pub fn main_table(family: AddressFamily) -> String {
    format!("t_bgp{}", family.suffix())
}

pub fn peer_table(peer: &str, family: AddressFamily) -> String {
    format!("t_bgp{}_{}_peer", family.suffix(), peer)
}

pub fn originate_protocol(family: AddressFamily) -> String {
    format!("originate{}", family.suffix())
}

fn master_filter(family: AddressFamily, direction: &str) -> String {
    format!("f_bgp{}_master_{}", family.suffix(), direction)
}

/// `ipv4 table t_bgp4;` and friends.
pub fn tables(family: AddressFamily, peers: &[&PeerPolicy]) -> Vec<Statement> {
    let mut out = vec![Statement::setting(format!(
        "{} table {}",
        family.channel(),
        main_table(family)
    ))];
    out.extend(
        peers
            .iter()
            .filter(|p| p.has_family(family))
            .map(|p| {
                Statement::setting(format!(
                    "{} table {}",
                    family.channel(),
                    peer_table(p.name(), family)
                ))
            }),
    );
    out
}

/// Static protocol holding the prefixes we originate, as blackhole routes
/// in the main BGP table. Nothing is emitted without prefixes.
pub fn originate(family: AddressFamily, prefixes: &[IpNet]) -> Vec<Statement> {
    let routes: Vec<&IpNet> = prefixes
        .iter()
        .filter(|p| AddressFamily::from(*p) == family)
        .collect();
    if routes.is_empty() {
        return vec![];
    }
    let mut body = vec![Statement::channel(
        family.channel(),
        vec![Statement::setting(format!("table {}", main_table(family)))],
    )];
    body.extend(
        routes
            .into_iter()
            .map(|net| Statement::setting(format!("route {} blackhole", net))),
    );
    vec![Statement::block(
        format!("protocol static {}", originate_protocol(family)),
        body,
    )]
}

/// Filters and pipe between the master table and the main BGP table.
///
/// BGP routes are exported to the master table. Routes from the master
/// table only enter the BGP table when the matching import flag is set.
pub fn master(family: AddressFamily, import: &ImportSettings) -> Vec<Statement> {
    let export = Statement::Filter {
        name: master_filter(family, "export"),
        locals: vec![],
        body: vec![
            Statement::when(Expr::raw("source = RTS_BGP"), vec![Statement::Accept]),
            Statement::Reject,
        ],
    };

    let mut body = vec![];
    let sources = [
        (import.connected, "RTS_DEVICE"),
        (import.kernel, "RTS_INHERIT"),
        (import.static_routes, "RTS_STATIC"),
    ];
    for (_, source) in sources.iter().filter(|(enabled, _)| *enabled) {
        body.push(Statement::when(
            Expr::raw(format!("source = {}", source)),
            vec![Statement::Accept],
        ));
    }
    body.push(Statement::Reject);
    let import_filter = Statement::Filter {
        name: master_filter(family, "import"),
        locals: vec![],
        body,
    };

    let pipe = Statement::block(
        format!("protocol pipe p_bgp{}_master", family.suffix()),
        vec![
            Statement::setting(format!("table {}", main_table(family))),
            Statement::setting(format!("peer table {}", family.master_table())),
            Statement::setting(format!("export filter {}", master_filter(family, "export"))),
            Statement::setting(format!("import filter {}", master_filter(family, "import"))),
        ],
    );
    vec![export, import_filter, pipe]
}

/// Pipe between the table of `peer` and the main BGP table.
pub fn peer_pipe(peer: &PeerPolicy, family: AddressFamily) -> Statement {
    let name = peer.name();
    Statement::block(
        format!("protocol pipe p_bgp{}_{}", family.suffix(), name),
        vec![
            Statement::setting(format!("table {}", peer_table(name, family))),
            Statement::setting(format!("peer table {}", main_table(family))),
            Statement::setting(format!(
                "export filter {}",
                filter_name(name, family, Direction::PeerToMain)
            )),
            Statement::setting(format!(
                "import filter {}",
                filter_name(name, family, Direction::MainToPeer)
            )),
        ],
    )
}

/// The BGP session of `peer` for `family`. `None` when the peer has no
/// neighbor address of that family.
pub fn protocol(peer: &PeerPolicy, family: AddressFamily, local_asn: u32) -> Option<Statement> {
    let neighbor = peer.neighbor(family)?;
    let name = peer.name();
    let mut body = vec![Statement::setting(format!(
        "description \"{}\"",
        peer.description().replace('"', "'")
    ))];
    body.push(Statement::setting(match peer.source_address(family) {
        Some(source) => format!("local {} as {}", source, local_asn),
        None => format!("local as {}", local_asn),
    }));
    body.push(Statement::setting(format!(
        "neighbor {} as {}",
        neighbor,
        peer.asn()
    )));
    if peer.passive() {
        body.push(Statement::setting("passive on"));
    }
    if let Some(cluster_id) = peer.cluster_id() {
        body.push(Statement::setting("rr client"));
        body.push(Statement::setting(format!("rr cluster id {}", cluster_id)));
    }

    let mut channel = vec![
        Statement::setting(format!("table {}", peer_table(name, family))),
        Statement::setting(format!(
            "import filter {}",
            filter_name(name, family, Direction::Import)
        )),
        Statement::setting("export all"),
    ];
    if let Some(limit) = peer.prefix_limit(family) {
        channel.push(Statement::setting(format!(
            "import limit {} action restart",
            limit
        )));
    }
    body.push(Statement::channel(family.channel(), channel));

    Some(Statement::block(
        format!("protocol bgp bgp{}_{}", family.suffix(), name),
        body,
    ))
}
