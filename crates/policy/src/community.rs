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

//! Large communities used to tag routes between filter stages.
//!
//! Self-tagging communities have the form `(own ASN, function, value)`. The
//! function codes below are a closed enumeration; changing a code changes
//! the meaning of every route already tagged in a running router.

use serde::{de, Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::error::{PolicyError, Result};
use crate::parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunityFunction {
    LocationIso,
    LocationUn,
    Relation,
    PrependOne,
    PrependTwo,
    PrependThree,
    NoExport,
    Filtered,
}

/// Functions a customer is allowed to set on routes it sends us.
pub const ACTION_FUNCTIONS: RangeInclusive<u32> = 61..=70;

impl CommunityFunction {
    pub fn code(self) -> u32 {
        match self {
            CommunityFunction::LocationIso => 1,
            CommunityFunction::LocationUn => 2,
            CommunityFunction::Relation => 3,
            CommunityFunction::PrependOne => 61,
            CommunityFunction::PrependTwo => 62,
            CommunityFunction::PrependThree => 63,
            CommunityFunction::NoExport => 70,
            CommunityFunction::Filtered => 1101,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        CommunityFunction::iter().find(|f| f.code() == code)
    }

    pub fn is_action(self) -> bool {
        ACTION_FUNCTIONS.contains(&self.code())
    }

    /// The prepend function applying `count` prepends.
    pub fn prepend(count: u8) -> Option<Self> {
        match count {
            1 => Some(CommunityFunction::PrependOne),
            2 => Some(CommunityFunction::PrependTwo),
            3 => Some(CommunityFunction::PrependThree),
            _ => None,
        }
    }
}

/// Which relationship a route was learned over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationTag {
    Own,
    Customer,
    Peer,
    Transit,
    RouteServer,
}

impl RelationTag {
    pub fn code(self) -> u32 {
        match self {
            RelationTag::Own => 1,
            RelationTag::Customer => 2,
            RelationTag::Peer => 3,
            RelationTag::Transit => 4,
            RelationTag::RouteServer => 5,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        RelationTag::iter().find(|r| r.code() == code)
    }
}

/// Why a route must not be exported. Any of these on a route blocks it at
/// the peer table to main table pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterReason {
    PrefixTooLong,
    PrefixTooShort,
    Bogon,
    BogonAsn,
    AsPathTooLong,
    AsPathTooShort,
    FirstAsMismatch,
    NexthopMismatch,
    PrefixFiltered,
    OriginFiltered,
    DefaultNotAllowed,
    RpkiUnknown,
    RpkiInvalid,
    TransitFreeAsn,
    TooManyCommunities,
    Routecollector,
    Quarantined,
    CustomAction,
}

impl FilterReason {
    pub fn code(self) -> u32 {
        FilterReason::iter()
            .position(|r| r == self)
            .map(|p| p as u32 + 1)
            .unwrap_or_default()
    }

    pub fn from_code(code: u32) -> Option<Self> {
        FilterReason::iter().find(|r| r.code() == code)
    }
}

/// Peer-type targets of the NOEXPORT function. The values sit in the
/// private ASN range so they never collide with an external peer ASN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NoExportTarget {
    NoCustomer,
    NoPeer,
    NoTransit,
}

impl NoExportTarget {
    pub fn code(self) -> u32 {
        match self {
            NoExportTarget::NoCustomer => 65412,
            NoExportTarget::NoPeer => 65413,
            NoExportTarget::NoTransit => 65414,
        }
    }
}

/// A large community literal, rendered as `(a, b, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LargeCommunity {
    pub global_admin: u32,
    pub ld1: u32,
    pub ld2: u32,
}

impl LargeCommunity {
    pub fn new(global_admin: u32, ld1: u32, ld2: u32) -> Self {
        LargeCommunity {
            global_admin,
            ld1,
            ld2,
        }
    }
}

impl fmt::Display for LargeCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.global_admin, self.ld1, self.ld2)
    }
}

impl FromStr for LargeCommunity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse::complete(parse::large_community, s)
            .ok_or_else(|| format!("malformed large community `{}`", s))
    }
}

impl Serialize for LargeCommunity {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{}:{}:{}", self.global_admin, self.ld1, self.ld2))
    }
}

impl<'de> Deserialize<'de> for LargeCommunity {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// An RFC 1997 community, rendered as `(a, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StandardCommunity(pub u16, pub u16);

impl fmt::Display for StandardCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl FromStr for StandardCommunity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse::complete(parse::standard_community, s)
            .ok_or_else(|| format!("malformed community `{}`", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtendedKind {
    RouteTarget,
    RouteOrigin,
}

/// An extended community, rendered as `(rt, a, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtendedCommunity {
    pub kind: ExtendedKind,
    pub admin: u32,
    pub assigned: u32,
}

impl fmt::Display for ExtendedCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ExtendedKind::RouteTarget => "rt",
            ExtendedKind::RouteOrigin => "ro",
        };
        write!(f, "({}, {}, {})", kind, self.admin, self.assigned)
    }
}

impl FromStr for ExtendedCommunity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse::complete(parse::extended_community, s)
            .ok_or_else(|| format!("malformed extended community `{}`", s))
    }
}

/// A decoded self-tagging community.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Community {
    pub origin_asn: u32,
    pub function: CommunityFunction,
    pub value: u32,
}

/// One component of a community match pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePattern {
    Any,
    Exact(u32),
    Range(u32, u32),
}

impl fmt::Display for ValuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuePattern::Any => write!(f, "*"),
            ValuePattern::Exact(v) => write!(f, "{}", v),
            ValuePattern::Range(low, high) => write!(f, "{}..{}", low, high),
        }
    }
}

/// A large community set entry such as `(65000, 1101, *)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunityPattern {
    pub asn: u32,
    pub function: ValuePattern,
    pub value: ValuePattern,
}

impl fmt::Display for CommunityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.asn, self.function, self.value)
    }
}

/// Renders a list of patterns as a set literal, `[a, b]`.
pub fn pattern_set(patterns: &[CommunityPattern]) -> String {
    let items: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Encodes and decodes the self-tagging communities of one router.
#[derive(Debug, Clone, Default)]
pub struct CommunityCodec {
    asn: Option<u32>,
}

impl CommunityCodec {
    pub fn new() -> Self {
        CommunityCodec { asn: None }
    }

    pub fn with_asn(asn: u32) -> Self {
        CommunityCodec { asn: Some(asn) }
    }

    /// The ASN self-tagging communities are encoded with.
    pub fn asn(&self) -> Result<u32> {
        self.asn.ok_or_else(|| {
            PolicyError::config("asn", "own ASN referenced before the session ASN was set")
        })
    }

    pub fn encode(origin_asn: u32, function: CommunityFunction, value: u32) -> LargeCommunity {
        LargeCommunity::new(origin_asn, function.code(), value)
    }

    pub fn encode_own(&self, function: CommunityFunction, value: u32) -> Result<LargeCommunity> {
        Ok(Self::encode(self.asn()?, function, value))
    }

    pub fn relation(&self, tag: RelationTag) -> Result<LargeCommunity> {
        self.encode_own(CommunityFunction::Relation, tag.code())
    }

    pub fn filtered(&self, reason: FilterReason) -> Result<LargeCommunity> {
        self.encode_own(CommunityFunction::Filtered, reason.code())
    }

    pub fn decode(lc: &LargeCommunity) -> Result<Community> {
        let function = CommunityFunction::from_code(lc.ld1).ok_or_else(|| {
            PolicyError::InvalidCommunity {
                community: lc.to_string(),
                reason: format!("unknown function code {}", lc.ld1),
            }
        })?;
        let valid = match function {
            CommunityFunction::Relation => RelationTag::from_code(lc.ld2).is_some(),
            CommunityFunction::Filtered => FilterReason::from_code(lc.ld2).is_some(),
            _ => true,
        };
        if !valid {
            return Err(PolicyError::InvalidCommunity {
                community: lc.to_string(),
                reason: format!("unknown {} value {}", function, lc.ld2),
            });
        }
        Ok(Community {
            origin_asn: lc.global_admin,
            function,
            value: lc.ld2,
        })
    }

    /// Pattern matching own communities of `function` with a value matching
    /// `value`.
    pub fn match_pattern(
        &self,
        function: CommunityFunction,
        value: ValuePattern,
    ) -> Result<CommunityPattern> {
        self.own_pattern(ValuePattern::Exact(function.code()), value)
    }

    pub fn own_pattern(
        &self,
        function: ValuePattern,
        value: ValuePattern,
    ) -> Result<CommunityPattern> {
        Ok(CommunityPattern {
            asn: self.asn()?,
            function,
            value,
        })
    }

    /// Patterns for every own community a customer may not set, i.e. all
    /// functions outside the action range.
    pub fn internal_patterns(&self) -> Result<Vec<CommunityPattern>> {
        Ok(vec![
            self.own_pattern(
                ValuePattern::Range(0, ACTION_FUNCTIONS.start() - 1),
                ValuePattern::Any,
            )?,
            self.own_pattern(
                ValuePattern::Range(ACTION_FUNCTIONS.end() + 1, u32::MAX),
                ValuePattern::Any,
            )?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_every_function() {
        let codec = CommunityCodec::with_asn(65000);
        for function in CommunityFunction::iter() {
            let value = match function {
                CommunityFunction::Relation => RelationTag::Transit.code(),
                CommunityFunction::Filtered => FilterReason::Bogon.code(),
                _ => 64512,
            };
            let lc = codec.encode_own(function, value).unwrap();
            let decoded = CommunityCodec::decode(&lc).unwrap();
            assert_eq!(decoded.origin_asn, 65000);
            assert_eq!(decoded.function, function);
            assert_eq!(decoded.value, value);
        }
    }

    #[test]
    fn test_filter_reason_codes_are_stable() {
        assert_eq!(FilterReason::PrefixTooLong.code(), 1);
        assert_eq!(FilterReason::DefaultNotAllowed.code(), 11);
        assert_eq!(FilterReason::Quarantined.code(), 17);
        assert_eq!(FilterReason::CustomAction.code(), 18);
        assert_eq!(FilterReason::from_code(19), None);
    }

    #[test]
    fn test_own_asn_required() {
        let codec = CommunityCodec::new();
        let err = codec.relation(RelationTag::Own).unwrap_err();
        assert_eq!(err.key(), Some("asn"));
    }

    #[test]
    fn test_decode_unknown_function() {
        let err = CommunityCodec::decode(&LargeCommunity::new(65000, 999, 1)).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCommunity { .. }));
        let err = CommunityCodec::decode(&LargeCommunity::new(65000, 3, 9)).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCommunity { .. }));
    }

    #[test]
    fn test_match_pattern_display() {
        let codec = CommunityCodec::with_asn(65000);
        let pattern = codec
            .match_pattern(CommunityFunction::Filtered, ValuePattern::Any)
            .unwrap();
        assert_eq!(pattern.to_string(), "(65000, 1101, *)");
        assert_eq!(
            pattern_set(&codec.internal_patterns().unwrap()),
            "[(65000, 0..60, *), (65000, 71..4294967295, *)]"
        );
    }

    #[test]
    fn test_large_community_literals() {
        let lc: LargeCommunity = "65000:1:840".parse().unwrap();
        assert_eq!(lc.to_string(), "(65000, 1, 840)");
        assert!("65000:1".parse::<LargeCommunity>().is_err());
        assert_eq!(
            "rt:65000:1".parse::<ExtendedCommunity>().unwrap().to_string(),
            "(rt, 65000, 1)"
        );
        assert_eq!(
            "65000:666".parse::<StandardCommunity>().unwrap().to_string(),
            "(65000, 666)"
        );
    }

    #[test]
    fn test_action_functions() {
        assert!(CommunityFunction::NoExport.is_action());
        assert!(CommunityFunction::PrependTwo.is_action());
        assert!(!CommunityFunction::Relation.is_action());
        assert!(!CommunityFunction::Filtered.is_action());
    }
}
