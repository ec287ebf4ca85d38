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

//! Helper functions shared by every filter program.
//!
//! The set is closed and always emitted in declaration order, so a filter
//! can reference any of them without tracking what was defined.

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::community::{pattern_set, CommunityCodec, CommunityFunction, ValuePattern};
use crate::error::Result;
use crate::family::AddressFamily;
use crate::statement::{Expr, Statement};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum BgpFunction {
    IsBogon4,
    IsBogon6,
    PrefixTooLong4,
    PrefixTooLong6,
    PrefixTooShort4,
    PrefixTooShort6,
    PathTooLong,
    PathTooShort,
    HasBogonAsn,
    HasTransitFreeAsn,
    TooManyCommunities,
    HasFiltered,
    CanExport4,
    CanExport6,
    ExportPrepend,
}

fn ret(e: impl Into<String>) -> Statement {
    Statement::Return(Expr::raw(e))
}

fn prepend_times(n: usize) -> Vec<Statement> {
    (0..n)
        .map(|_| Statement::call("bgp_path.prepend(BGP_ASN)"))
        .collect()
}

impl BgpFunction {
    pub fn is_bogon(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => BgpFunction::IsBogon4,
            AddressFamily::Ipv6 => BgpFunction::IsBogon6,
        }
    }

    pub fn prefix_too_long(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => BgpFunction::PrefixTooLong4,
            AddressFamily::Ipv6 => BgpFunction::PrefixTooLong6,
        }
    }

    pub fn prefix_too_short(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => BgpFunction::PrefixTooShort4,
            AddressFamily::Ipv6 => BgpFunction::PrefixTooShort6,
        }
    }

    pub fn can_export(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => BgpFunction::CanExport4,
            AddressFamily::Ipv6 => BgpFunction::CanExport6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BgpFunction::IsBogon4 => "bgp_is_bogon4",
            BgpFunction::IsBogon6 => "bgp_is_bogon6",
            BgpFunction::PrefixTooLong4 => "bgp_prefix_too_long4",
            BgpFunction::PrefixTooLong6 => "bgp_prefix_too_long6",
            BgpFunction::PrefixTooShort4 => "bgp_prefix_too_short4",
            BgpFunction::PrefixTooShort6 => "bgp_prefix_too_short6",
            BgpFunction::PathTooLong => "bgp_path_too_long",
            BgpFunction::PathTooShort => "bgp_path_too_short",
            BgpFunction::HasBogonAsn => "bgp_has_bogon_asn",
            BgpFunction::HasTransitFreeAsn => "bgp_has_transit_free_asn",
            BgpFunction::TooManyCommunities => "bgp_too_many_communities",
            BgpFunction::HasFiltered => "bgp_has_filtered",
            BgpFunction::CanExport4 => "bgp_can_export4",
            BgpFunction::CanExport6 => "bgp_can_export6",
            BgpFunction::ExportPrepend => "bgp_export_prepend",
        }
    }

    fn params(self) -> Vec<String> {
        match self {
            BgpFunction::CanExport4 | BgpFunction::CanExport6 | BgpFunction::ExportPrepend => {
                vec!["int peer_asn".to_owned()]
            }
            _ => vec![],
        }
    }

    fn returns(self) -> Option<&'static str> {
        match self {
            BgpFunction::ExportPrepend => None,
            _ => Some("bool"),
        }
    }

    /// Call expression without arguments.
    pub fn call(self) -> Expr {
        Expr::call(self.name())
    }

    /// Call expression passing the peer ASN.
    pub fn call_with(self, argument: impl std::fmt::Display) -> Expr {
        Expr::raw(format!("{}({})", self.name(), argument))
    }

    fn body(self, codec: &CommunityCodec) -> Result<Vec<Statement>> {
        use BgpFunction::*;
        let body = match self {
            IsBogon4 => vec![ret("net ~ BOGONS_V4")],
            IsBogon6 => vec![ret("net ~ BOGONS_V6")],
            PrefixTooLong4 => vec![ret("net.len > BGP_PREFIX_MAXLEN4")],
            PrefixTooLong6 => vec![ret("net.len > BGP_PREFIX_MAXLEN6")],
            PrefixTooShort4 => vec![ret("net.len < BGP_PREFIX_MINLEN4")],
            PrefixTooShort6 => vec![ret("net.len < BGP_PREFIX_MINLEN6")],
            PathTooLong => vec![ret("bgp_path.len > BGP_PATH_MAXLEN")],
            PathTooShort => vec![ret("bgp_path.len < BGP_PATH_MINLEN")],
            HasBogonAsn => vec![ret("bgp_path ~ BOGON_ASNS")],
            HasTransitFreeAsn => vec![ret("bgp_path ~ TRANSIT_FREE_ASNS")],
            TooManyCommunities => vec![ret(
                "(bgp_community.len + bgp_ext_community.len + bgp_large_community.len) > BGP_COMMUNITY_MAX",
            )],
            HasFiltered => {
                let filtered =
                    codec.match_pattern(CommunityFunction::Filtered, ValuePattern::Any)?;
                vec![ret(format!(
                    "bgp_large_community ~ {}",
                    pattern_set(&[filtered])
                ))]
            }
            CanExport4 | CanExport6 => {
                let family = if self == CanExport4 {
                    AddressFamily::Ipv4
                } else {
                    AddressFamily::Ipv6
                };
                let no_export = format!(
                    "({}, {}, peer_asn) ~ bgp_large_community",
                    codec.asn()?,
                    CommunityFunction::NoExport.code()
                );
                let refuse = vec![ret("false")];
                vec![
                    Statement::when(Expr::raw(no_export), refuse.clone()),
                    Statement::when(HasFiltered.call(), refuse.clone()),
                    Statement::when(Self::prefix_too_long(family).call(), refuse.clone()),
                    Statement::when(Self::prefix_too_short(family).call(), refuse.clone()),
                    Statement::when(Self::is_bogon(family).call(), refuse),
                    ret("true"),
                ]
            }
            ExportPrepend => {
                let asn = codec.asn()?;
                let requested = |count: u8| -> Expr {
                    let function = CommunityFunction::prepend(count)
                        .map(|f| f.code())
                        .unwrap_or_default();
                    Expr::raw(format!("({}, {}, peer_asn) ~ bgp_large_community", asn, function))
                };
                vec![Statement::when_else(
                    requested(3),
                    prepend_times(3),
                    vec![Statement::when_else(
                        requested(2),
                        prepend_times(2),
                        vec![Statement::when(requested(1), prepend_times(1))],
                    )],
                )]
            }
        };
        Ok(body)
    }

    pub fn statement(self, codec: &CommunityCodec) -> Result<Statement> {
        Ok(Statement::Function {
            name: self.name().to_owned(),
            params: self.params(),
            returns: self.returns(),
            body: self.body(codec)?,
        })
    }
}

/// Definitions of every helper function, in registry order.
pub fn registry(codec: &CommunityCodec) -> Result<Vec<Statement>> {
    BgpFunction::iter().map(|f| f.statement(codec)).collect()
}
