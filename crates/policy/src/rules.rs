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

//! Match/action rules declared per peer.
//!
//! Each rule compiles to a boolean function. The function returns `true`
//! when the rule does not apply or after its action ran, meaning the caller
//! should keep evaluating. It returns `false` only for a `reject` action,
//! which stops evaluation and turns the caller's fallthrough into a reject.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::community::{ExtendedCommunity, LargeCommunity, StandardCommunity};
use crate::config::{ActionKeyword, CommunityUpdate, FilterAction, MatchList, RuleConfig};
use crate::error::{PolicyError, Result};
use crate::family::AddressFamily;
use crate::prefix::PrefixPattern;
use crate::statement::{Expr, Statement};

/// Number of prepends a single action may request.
pub const PREPEND_RANGE: RangeInclusive<u32> = 1..=9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    /// Applied to routes received from the peer.
    #[default]
    Import,
    /// Applied to routes sent to the peer.
    Export,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition<T> {
    pub values: Vec<T>,
    pub negate: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleMatches {
    pub origin_asn: Option<Condition<u32>>,
    pub prefix: Option<Condition<PrefixPattern>>,
    pub community: Option<Condition<StandardCommunity>>,
    pub extended_community: Option<Condition<ExtendedCommunity>>,
    pub large_community: Option<Condition<LargeCommunity>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunityEdit<T> {
    pub add: Vec<T>,
    pub remove: Vec<T>,
}

impl<T> Default for CommunityEdit<T> {
    fn default() -> Self {
        CommunityEdit {
            add: vec![],
            remove: vec![],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleUpdate {
    pub community: CommunityEdit<StandardCommunity>,
    pub extended_community: CommunityEdit<ExtendedCommunity>,
    pub large_community: CommunityEdit<LargeCommunity>,
    pub prepend: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleAction {
    Reject,
    Update(RuleUpdate),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub direction: RuleDirection,
    pub matches: RuleMatches,
    pub action: RuleAction,
}

fn parse_values<T: FromStr<Err = String>>(key: &str, values: &[String]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|v| v.parse::<T>().map_err(|e| PolicyError::config(key, e)))
        .collect()
}

fn parse_condition<T: FromStr<Err = String>>(
    key: &str,
    list: &Option<MatchList<String>>,
) -> Result<Option<Condition<T>>> {
    match list {
        None => Ok(None),
        Some(list) => Ok(Some(Condition {
            values: parse_values(key, list.values())?,
            negate: list.negated(),
        })),
    }
}

fn parse_edit<T: FromStr<Err = String>>(
    key: &str,
    update: &Option<CommunityUpdate>,
) -> Result<CommunityEdit<T>> {
    match update {
        None => Ok(CommunityEdit::default()),
        Some(update) => Ok(CommunityEdit {
            add: parse_values(&format!("{}.add", key), &update.add)?,
            remove: parse_values(&format!("{}.remove", key), &update.remove)?,
        }),
    }
}

impl Rule {
    /// Validates a configured rule. `key` is the configuration path of the
    /// rule, used in error messages.
    pub fn parse(key: &str, config: &RuleConfig) -> Result<Self> {
        let matcher = &config.matcher;
        let matches = RuleMatches {
            origin_asn: matcher.origin_asn.as_ref().map(|list| Condition {
                values: list.values().to_vec(),
                negate: list.negated(),
            }),
            prefix: parse_condition(&format!("{}.matches.prefix", key), &matcher.prefix)?,
            community: parse_condition(
                &format!("{}.matches.community", key),
                &matcher.community,
            )?,
            extended_community: parse_condition(
                &format!("{}.matches.extended_community", key),
                &matcher.extended_community,
            )?,
            large_community: parse_condition(
                &format!("{}.matches.large_community", key),
                &matcher.large_community,
            )?,
        };

        let action = match &config.action {
            FilterAction::Keyword(ActionKeyword::Reject) => RuleAction::Reject,
            FilterAction::Update(update) => {
                let prepend = match update.prepend {
                    None => None,
                    Some(n) if PREPEND_RANGE.contains(&n) => Some(n as u8),
                    Some(n) => {
                        return Err(PolicyError::config(
                            format!("{}.action.prepend", key),
                            format!(
                                "prepend count {} outside {}..={}",
                                n,
                                PREPEND_RANGE.start(),
                                PREPEND_RANGE.end()
                            ),
                        ))
                    }
                };
                RuleAction::Update(RuleUpdate {
                    community: parse_edit(
                        &format!("{}.action.community", key),
                        &update.community,
                    )?,
                    extended_community: parse_edit(
                        &format!("{}.action.extended_community", key),
                        &update.extended_community,
                    )?,
                    large_community: parse_edit(
                        &format!("{}.action.large_community", key),
                        &update.large_community,
                    )?,
                    prepend,
                })
            }
        };

        Ok(Rule {
            direction: config.direction,
            matches,
            action,
        })
    }
}

/// A compiled function, ready to be rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionFragment {
    pub name: String,
    pub body: Vec<Statement>,
}

impl FunctionFragment {
    pub fn to_statement(&self) -> Statement {
        Statement::Function {
            name: self.name.clone(),
            params: vec![],
            returns: Some("bool"),
            body: self.body.clone(),
        }
    }
}

/// Name of the function evaluating every rule compiled under `base`.
pub fn aggregate_name(base: &str) -> String {
    format!("{}s", base)
}

fn keep_evaluating() -> Statement {
    Statement::Return(Expr::raw("true"))
}

fn set_literal<T: Display>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Returns early when `subject` does not match the set.
fn membership(subject: &str, set: String, negate: bool) -> Statement {
    let test = Expr::raw(format!("{} ~ {}", subject, set));
    let failed = if negate { test } else { test.negate() };
    Statement::when(failed, vec![keep_evaluating()])
}

fn condition_check<T: Display>(
    out: &mut Vec<Statement>,
    comment: &str,
    subject: &str,
    condition: &Option<Condition<T>>,
) {
    if let Some(condition) = condition {
        out.push(Statement::comment(comment));
        out.push(membership(
            subject,
            set_literal(&condition.values),
            condition.negate,
        ));
    }
}

fn prefix_branch(prefixes: &[&PrefixPattern], negate: bool) -> Vec<Statement> {
    match (prefixes.is_empty(), negate) {
        // Nothing of this family can match.
        (true, false) => vec![keep_evaluating()],
        (true, true) => vec![],
        (false, _) => vec![membership("net", set_literal(prefixes), negate)],
    }
}

fn prefix_check(out: &mut Vec<Statement>, condition: &Option<Condition<PrefixPattern>>) {
    let Some(condition) = condition else {
        return;
    };
    let (v4, v6): (Vec<&PrefixPattern>, Vec<&PrefixPattern>) = condition
        .values
        .iter()
        .partition(|p| p.family() == AddressFamily::Ipv4);
    let then = prefix_branch(&v4, condition.negate);
    let otherwise = prefix_branch(&v6, condition.negate);
    let check = match (then.is_empty(), otherwise.is_empty()) {
        (true, true) => return,
        (true, false) => Statement::when(
            Expr::raw(format!("net.type = {}", AddressFamily::Ipv6.net_type())),
            otherwise,
        ),
        _ => Statement::when_else(
            Expr::raw(format!("net.type = {}", AddressFamily::Ipv4.net_type())),
            then,
            otherwise,
        ),
    };
    out.push(Statement::comment("Match prefix"));
    out.push(check);
}

fn edit_statements<T: Display>(out: &mut Vec<Statement>, attribute: &str, edit: &CommunityEdit<T>) {
    for c in &edit.add {
        out.push(Statement::call(format!("{}.add({})", attribute, c)));
    }
    for c in &edit.remove {
        out.push(Statement::call(format!("{}.delete({})", attribute, c)));
    }
}

fn compile_rule(rule: &Rule) -> Vec<Statement> {
    let mut body = vec![];
    let m = &rule.matches;
    condition_check(&mut body, "Match origin ASN", "bgp_path.last", &m.origin_asn);
    prefix_check(&mut body, &m.prefix);
    condition_check(&mut body, "Match community", "bgp_community", &m.community);
    condition_check(
        &mut body,
        "Match extended community",
        "bgp_ext_community",
        &m.extended_community,
    );
    condition_check(
        &mut body,
        "Match large community",
        "bgp_large_community",
        &m.large_community,
    );

    match &rule.action {
        RuleAction::Reject => {
            body.push(Statement::comment("Reject"));
            body.push(Statement::Return(Expr::raw("false")));
        }
        RuleAction::Update(update) => {
            body.push(Statement::comment("Update"));
            edit_statements(&mut body, "bgp_community", &update.community);
            edit_statements(&mut body, "bgp_ext_community", &update.extended_community);
            edit_statements(&mut body, "bgp_large_community", &update.large_community);
            for _ in 0..update.prepend.unwrap_or(0) {
                body.push(Statement::call("bgp_path.prepend(BGP_ASN)"));
            }
            body.push(keep_evaluating());
        }
    }
    body
}

/// Compiles `rules` into one function per rule named `<base>_<n>`, followed
/// by the aggregate function [`aggregate_name`] calling them in declaration
/// order. Returns nothing when there are no rules.
pub fn compile(base: &str, rules: &[Rule]) -> Vec<FunctionFragment> {
    if rules.is_empty() {
        return vec![];
    }
    let mut fragments: Vec<FunctionFragment> = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| FunctionFragment {
            name: format!("{}_{}", base, i),
            body: compile_rule(rule),
        })
        .collect();

    let mut body: Vec<Statement> = fragments
        .iter()
        .map(|f| {
            Statement::when(
                Expr::call(&f.name).negate(),
                vec![Statement::Return(Expr::raw("false"))],
            )
        })
        .collect();
    body.push(keep_evaluating());
    fragments.push(FunctionFragment {
        name: aggregate_name(base),
        body,
    });
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::statement::render;

    fn rule(json: &str) -> Result<Rule> {
        let config: RuleConfig = serde_json::from_str(json).unwrap();
        Rule::parse("peers.p.actions[0]", &config)
    }

    fn render_fragments(fragments: &[FunctionFragment]) -> String {
        let statements: Vec<Statement> = fragments.iter().map(|f| f.to_statement()).collect();
        render(&statements)
    }

    #[test]
    fn test_prepend_bounds() {
        assert!(rule(r#"{"action": {"prepend": 1}}"#).is_ok());
        assert!(rule(r#"{"action": {"prepend": 9}}"#).is_ok());
        let err = rule(r#"{"action": {"prepend": 10}}"#).unwrap_err();
        assert_eq!(err.key(), Some("peers.p.actions[0].action.prepend"));
        assert!(rule(r#"{"action": {"prepend": 0}}"#).is_err());
    }

    #[test]
    fn test_malformed_community_names_key() {
        let err = rule(r#"{"matches": {"large_community": ["1:2"]}, "action": "reject"}"#)
            .unwrap_err();
        assert_eq!(err.key(), Some("peers.p.actions[0].matches.large_community"));
    }

    #[test]
    fn test_compile_reject_rule() {
        let r = rule(r#"{"matches": {"origin_asn": [64496, 64497]}, "action": "reject"}"#)
            .unwrap();
        let fragments = compile("bgp_p_import_action", &[r]);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            render_fragments(&fragments),
            "function bgp_p_import_action_0() -> bool\n\
             {\n\
             \x20 # Match origin ASN\n\
             \x20 if !(bgp_path.last ~ [64496, 64497]) then return true;\n\
             \x20 # Reject\n\
             \x20 return false;\n\
             }\n\
             function bgp_p_import_actions() -> bool\n\
             {\n\
             \x20 if !bgp_p_import_action_0() then return false;\n\
             \x20 return true;\n\
             }\n"
        );
    }

    #[test]
    fn test_compile_negated_match() {
        let r = rule(r#"{"matches": {"origin_asn": {"not": [64496]}}, "action": "reject"}"#)
            .unwrap();
        let text = render_fragments(&compile("x", &[r]));
        assert!(text.contains("if bgp_path.last ~ [64496] then return true;"), "{}", text);
    }

    #[test]
    fn test_prefixes_split_per_family() {
        let r = rule(
            r#"{"matches": {"prefix": ["192.0.2.0/24+", "2001:db8::/32"]},
                "action": {"large_community": {"add": ["65000:1:840"]}, "prepend": 2}}"#,
        )
        .unwrap();
        let text = render_fragments(&compile("x", &[r]));
        assert!(
            text.contains(
                "  if net.type = NET_IP4 then {\n\
                 \x20   if !(net ~ [192.0.2.0/24+]) then return true;\n\
                 \x20 } else {\n\
                 \x20   if !(net ~ [2001:db8::/32]) then return true;\n\
                 \x20 }\n"
            ),
            "{}",
            text
        );
        assert!(text.contains("bgp_large_community.add((65000, 1, 840));"));
        assert_eq!(text.matches("bgp_path.prepend(BGP_ASN);").count(), 2);
    }

    #[test]
    fn test_single_family_prefix_list() {
        let r = rule(r#"{"matches": {"prefix": ["2001:db8::/32"]}, "action": "reject"}"#).unwrap();
        let text = render_fragments(&compile("x", &[r]));
        // IPv4 routes can never match an IPv6-only list.
        assert!(text.contains("  if net.type = NET_IP4 then {\n    return true;\n  } else {\n"));

        let r = rule(r#"{"matches": {"prefix": {"not": ["2001:db8::/32"]}}, "action": "reject"}"#)
            .unwrap();
        let text = render_fragments(&compile("x", &[r]));
        assert!(text.contains("  if net.type = NET_IP6 then {\n    if net ~ [2001:db8::/32] then return true;\n  }\n"), "{}", text);
    }

    #[test]
    fn test_rules_evaluated_in_order() {
        let first = rule(r#"{"action": {"community": {"add": ["65000:1"]}}}"#).unwrap();
        let second = rule(r#"{"action": "reject"}"#).unwrap();
        let fragments = compile("y", &[first, second]);
        let aggregate = fragments.last().unwrap();
        assert_eq!(aggregate.name, "ys");
        assert_eq!(
            render(&aggregate.body),
            "if !y_0() then return false;\nif !y_1() then return false;\nreturn true;\n"
        );
    }

    #[test]
    fn test_no_rules_no_fragments() {
        assert!(compile("z", &[]).is_empty());
    }
}
