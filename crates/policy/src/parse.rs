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

//! nom parsers for the literals accepted in the configuration: communities
//! in colon or tuple notation and prefix patterns.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag};
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{all_consuming, map, map_res, opt, value};
use nom::sequence::{delimited, pair, separated_pair, tuple};
use nom::IResult;

use crate::community::{ExtendedCommunity, ExtendedKind, LargeCommunity, StandardCommunity};
use crate::prefix::PrefixModifier;

fn uint32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn uint16(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |s: &str| s.parse::<u16>())(input)
}

fn uint8(input: &str) -> IResult<&str, u8> {
    map_res(digit1, |s: &str| s.parse::<u8>())(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0)(input)
}

fn open(input: &str) -> IResult<&str, (char, &str)> {
    pair(char('('), space0)(input)
}

fn close(input: &str) -> IResult<&str, (&str, char)> {
    pair(space0, char(')'))(input)
}

/// `65000:1:2` or `(65000, 1, 2)`.
pub fn large_community(input: &str) -> IResult<&str, LargeCommunity> {
    let colon_form = map(
        tuple((uint32, char(':'), uint32, char(':'), uint32)),
        |(a, _, b, _, c)| LargeCommunity::new(a, b, c),
    );
    let tuple_form = map(
        delimited(open, tuple((uint32, comma, uint32, comma, uint32)), close),
        |(a, _, b, _, c)| LargeCommunity::new(a, b, c),
    );
    alt((colon_form, tuple_form))(input)
}

/// `65000:100` or `(65000, 100)`.
pub fn standard_community(input: &str) -> IResult<&str, StandardCommunity> {
    let colon_form = map(separated_pair(uint16, char(':'), uint16), |(a, b)| {
        StandardCommunity(a, b)
    });
    let tuple_form = map(
        delimited(open, separated_pair(uint16, comma, uint16), close),
        |(a, b)| StandardCommunity(a, b),
    );
    alt((colon_form, tuple_form))(input)
}

fn extended_kind(input: &str) -> IResult<&str, ExtendedKind> {
    alt((
        value(ExtendedKind::RouteTarget, tag("rt")),
        value(ExtendedKind::RouteOrigin, tag("ro")),
    ))(input)
}

/// `rt:65000:100` or `(rt, 65000, 100)`.
pub fn extended_community(input: &str) -> IResult<&str, ExtendedCommunity> {
    let colon_form = map(
        tuple((extended_kind, char(':'), uint32, char(':'), uint32)),
        |(kind, _, admin, _, assigned)| ExtendedCommunity {
            kind,
            admin,
            assigned,
        },
    );
    let tuple_form = map(
        delimited(
            open,
            tuple((extended_kind, comma, uint32, comma, uint32)),
            close,
        ),
        |(kind, _, admin, _, assigned)| ExtendedCommunity {
            kind,
            admin,
            assigned,
        },
    );
    alt((colon_form, tuple_form))(input)
}

fn prefix_modifier(input: &str) -> IResult<&str, PrefixModifier> {
    alt((
        value(PrefixModifier::OrLonger, char('+')),
        value(PrefixModifier::OrShorter, char('-')),
        map(
            delimited(char('{'), separated_pair(uint8, comma, uint8), char('}')),
            |(low, high)| PrefixModifier::Range(low, high),
        ),
    ))(input)
}

/// Splits `192.0.2.0/24+` into the network text and its modifier.
pub fn prefix_pattern(input: &str) -> IResult<&str, (&str, PrefixModifier)> {
    map(pair(is_not("+-{"), opt(prefix_modifier)), |(net, modifier)| {
        (net, modifier.unwrap_or(PrefixModifier::Exact))
    })(input)
}

/// Runs `parser` over the whole of `input`, ignoring surrounding whitespace.
pub fn complete<'a, T>(
    parser: impl FnMut(&'a str) -> IResult<&'a str, T>,
    input: &'a str,
) -> Option<T> {
    all_consuming(parser)(input.trim())
        .ok()
        .map(|(_, parsed)| parsed)
}
