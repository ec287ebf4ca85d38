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
use std::fmt;
use std::str::FromStr;

use crate::family::AddressFamily;
use crate::parse;

/// Length qualifier of a prefix set entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrefixModifier {
    Exact,
    /// `+`: the prefix and all more specifics.
    OrLonger,
    /// `-`: the prefix and all less specifics.
    OrShorter,
    /// `{low,high}`: more specifics with a length in the range.
    Range(u8, u8),
}

/// A prefix set entry, e.g. `192.0.2.0/24{24,28}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrefixPattern {
    pub net: IpNet,
    pub modifier: PrefixModifier,
}

impl PrefixPattern {
    pub fn family(&self) -> AddressFamily {
        AddressFamily::from(&self.net)
    }
}

impl FromStr for PrefixPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (net, modifier) = parse::complete(parse::prefix_pattern, s)
            .ok_or_else(|| format!("malformed prefix pattern `{}`", s))?;
        let net: IpNet = net
            .parse()
            .map_err(|e| format!("malformed prefix `{}`: {}", net, e))?;
        if net != net.trunc() {
            return Err(format!(
                "prefix `{}` has host bits set, did you mean `{}`?",
                net,
                net.trunc()
            ));
        }
        if let PrefixModifier::Range(low, high) = modifier {
            if low > high || low < net.prefix_len() || high > net.max_prefix_len() {
                return Err(format!(
                    "invalid length range {{{},{}}} for `{}`",
                    low, high, net
                ));
            }
        }
        Ok(PrefixPattern { net, modifier })
    }
}

impl fmt::Display for PrefixPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            PrefixModifier::Exact => write!(f, "{}", self.net),
            PrefixModifier::OrLonger => write!(f, "{}+", self.net),
            PrefixModifier::OrShorter => write!(f, "{}-", self.net),
            PrefixModifier::Range(low, high) => write!(f, "{}{{{},{}}}", self.net, low, high),
        }
    }
}
