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

//! Typed statements of the routing daemon configuration language.
//!
//! Everything the compiler outputs is built as a tree of [`Statement`]s and
//! turned into text by [`render`], so nesting and terminators are always
//! well formed.

use std::fmt;

const INDENT: &str = "  ";

/// A boolean or value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Raw(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn raw(s: impl Into<String>) -> Self {
        Expr::Raw(s.into())
    }

    /// Call of a function taking no arguments.
    pub fn call(name: &str) -> Self {
        Expr::Raw(format!("{}()", name))
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut terms) => {
                terms.push(other);
                Expr::And(terms)
            }
            first => Expr::And(vec![first, other]),
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_))
    }

    fn fmt_term(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Raw(s) => write!(f, "{}", s),
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Raw(s) if s.ends_with(')') && !s.contains(' ') => write!(f, "!{}", s),
                other => write!(f, "!({})", other),
            },
            Expr::And(terms) | Expr::Or(terms) => {
                let op = if matches!(self, Expr::And(_)) {
                    " && "
                } else {
                    " || "
                };
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", op)?;
                    }
                    term.fmt_term(f)?;
                }
                Ok(())
            }
        }
    }
}

/// One group of items inside a set definition, rendered under a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetGroup {
    pub comment: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Blank,
    Comment(String),
    /// `define NAME = value;`
    Define { name: String, value: String },
    /// `define NAME = [ ... ];` with commented groups of items.
    DefineSet { name: String, groups: Vec<SetGroup> },
    /// A bare configuration line terminated by `;`, e.g. `router id 1.2.3.4`.
    Setting(String),
    /// `target = value;`
    Assign { target: String, value: String },
    /// A function or method call used as a command, e.g.
    /// `bgp_path.prepend(65000)`.
    FunctionCall(String),
    If {
        condition: Expr,
        then: Vec<Statement>,
        otherwise: Vec<Statement>,
    },
    Return(Expr),
    Accept,
    Reject,
    Function {
        name: String,
        params: Vec<String>,
        returns: Option<&'static str>,
        body: Vec<Statement>,
    },
    Filter {
        name: String,
        locals: Vec<String>,
        body: Vec<Statement>,
    },
    /// `header { ... }`, with a trailing `;` when `terminated`.
    Block {
        header: String,
        body: Vec<Statement>,
        terminated: bool,
    },
}

impl Statement {
    pub fn comment(s: impl Into<String>) -> Self {
        Statement::Comment(s.into())
    }

    pub fn setting(s: impl Into<String>) -> Self {
        Statement::Setting(s.into())
    }

    pub fn call(s: impl Into<String>) -> Self {
        Statement::FunctionCall(s.into())
    }

    pub fn assign(target: impl Into<String>, value: impl Into<String>) -> Self {
        Statement::Assign {
            target: target.into(),
            value: value.into(),
        }
    }

    pub fn when(condition: Expr, then: Vec<Statement>) -> Self {
        Statement::If {
            condition,
            then,
            otherwise: vec![],
        }
    }

    pub fn when_else(condition: Expr, then: Vec<Statement>, otherwise: Vec<Statement>) -> Self {
        Statement::If {
            condition,
            then,
            otherwise,
        }
    }

    pub fn block(header: impl Into<String>, body: Vec<Statement>) -> Self {
        Statement::Block {
            header: header.into(),
            body,
            terminated: false,
        }
    }

    pub fn channel(header: impl Into<String>, body: Vec<Statement>) -> Self {
        Statement::Block {
            header: header.into(),
            body,
            terminated: true,
        }
    }

    /// Whether this statement renders on a single line.
    fn is_simple(&self) -> bool {
        matches!(
            self,
            Statement::Setting(_)
                | Statement::Assign { .. }
                | Statement::FunctionCall(_)
                | Statement::Return(_)
                | Statement::Accept
                | Statement::Reject
        )
    }

    /// Text of a single line statement, without indentation.
    fn inline(&self) -> String {
        match self {
            Statement::Setting(s) => format!("{};", s),
            Statement::Assign { target, value } => format!("{} = {};", target, value),
            Statement::FunctionCall(s) => format!("{};", s),
            Statement::Return(e) => format!("return {};", e),
            Statement::Accept => "accept;".to_owned(),
            Statement::Reject => "reject;".to_owned(),
            _ => String::new(),
        }
    }
}

/// Whether an `if` renders as `if c then s;` on one line.
fn renders_inline(then: &[Statement], otherwise: &[Statement]) -> bool {
    otherwise.is_empty() && then.len() == 1 && then[0].is_simple()
}

struct Renderer {
    out: String,
    depth: usize,
}

impl Renderer {
    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, body: &[Statement]) {
        self.depth += 1;
        for s in body {
            self.statement(s);
        }
        self.depth -= 1;
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Blank => self.line(""),
            Statement::Comment(c) => self.line(&format!("# {}", c)),
            Statement::Define { name, value } => {
                self.line(&format!("define {} = {};", name, value))
            }
            Statement::DefineSet { name, groups } => {
                self.line(&format!("define {} = [", name));
                let total: usize = groups.iter().map(|g| g.items.len()).sum();
                let mut seen = 0;
                self.depth += 1;
                for group in groups {
                    self.line(&format!("# {}", group.comment));
                    for item in &group.items {
                        seen += 1;
                        if seen == total {
                            self.line(item);
                        } else {
                            self.line(&format!("{},", item));
                        }
                    }
                }
                self.depth -= 1;
                self.line("];");
            }
            Statement::If {
                condition,
                then,
                otherwise,
            } => self.conditional(condition, then, otherwise, ""),
            Statement::Function {
                name,
                params,
                returns,
                body,
            } => {
                let signature = match returns {
                    Some(ty) => format!("function {}({}) -> {}", name, params.join("; "), ty),
                    None => format!("function {}({})", name, params.join("; ")),
                };
                self.line(&signature);
                self.line("{");
                self.nested(body);
                self.line("}");
            }
            Statement::Filter { name, locals, body } => {
                self.line(&format!("filter {}", name));
                for local in locals {
                    self.line(&format!("{};", local));
                }
                self.line("{");
                self.nested(body);
                self.line("}");
            }
            Statement::Block {
                header,
                body,
                terminated,
            } => {
                self.line(&format!("{} {{", header));
                self.nested(body);
                self.line(if *terminated { "};" } else { "}" });
            }
            simple => self.line(&simple.inline()),
        }
    }

    fn conditional(
        &mut self,
        condition: &Expr,
        then: &[Statement],
        otherwise: &[Statement],
        prefix: &str,
    ) {
        if renders_inline(then, otherwise) {
            self.line(&format!(
                "{}if {} then {}",
                prefix,
                condition,
                then[0].inline()
            ));
            return;
        }
        self.line(&format!("{}if {} then {{", prefix, condition));
        self.nested(then);
        match otherwise {
            [] => self.line("}"),
            [Statement::If {
                condition,
                then,
                otherwise,
            }] if !renders_inline(then, otherwise) => {
                self.conditional(condition, then, otherwise, "} else ")
            }
            _ => {
                self.line("} else {");
                self.nested(otherwise);
                self.line("}");
            }
        }
    }
}

/// Serializes statements to configuration text.
pub fn render(statements: &[Statement]) -> String {
    let mut renderer = Renderer {
        out: String::new(),
        depth: 0,
    };
    for s in statements {
        renderer.statement(s);
    }
    renderer.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_inline_if() {
        let s = Statement::when(Expr::call("bgp_is_bogon4"), vec![Statement::Reject]);
        assert_eq!(render(&[s]), "if bgp_is_bogon4() then reject;\n");
    }

    #[test]
    fn test_render_nested_blocks() {
        let filter = Statement::Filter {
            name: "f_test".to_owned(),
            locals: vec!["int accept_route".to_owned()],
            body: vec![
                Statement::assign("accept_route", "0"),
                Statement::when(
                    Expr::raw("source = RTS_STATIC"),
                    vec![
                        Statement::call("bgp_large_community.add((65000, 3, 1))"),
                        Statement::assign("accept_route", "1"),
                    ],
                ),
                Statement::Reject,
            ],
        };
        assert_eq!(
            render(&[filter]),
            "filter f_test\n\
             int accept_route;\n\
             {\n\
             \x20 accept_route = 0;\n\
             \x20 if source = RTS_STATIC then {\n\
             \x20   bgp_large_community.add((65000, 3, 1));\n\
             \x20   accept_route = 1;\n\
             \x20 }\n\
             \x20 reject;\n\
             }\n"
        );
    }

    #[test]
    fn test_render_else_if_chain() {
        let s = Statement::when_else(
            Expr::raw("a"),
            vec![Statement::call("x()")],
            vec![Statement::when_else(
                Expr::raw("b"),
                vec![Statement::call("y()")],
                vec![Statement::call("z()")],
            )],
        );
        assert_eq!(
            render(&[s]),
            "if a then {\n  x();\n} else if b then {\n  y();\n} else {\n  z();\n}\n"
        );
    }

    #[test]
    fn test_render_define_set() {
        let s = Statement::DefineSet {
            name: "ASNS".to_owned(),
            groups: vec![
                SetGroup {
                    comment: "2 statically defined".to_owned(),
                    items: vec!["1".to_owned(), "2".to_owned()],
                },
                SetGroup {
                    comment: "1 from IRR object AS-TEST".to_owned(),
                    items: vec!["3".to_owned()],
                },
            ],
        };
        assert_eq!(
            render(&[s]),
            "define ASNS = [\n  # 2 statically defined\n  1,\n  2,\n  # 1 from IRR object AS-TEST\n  3\n];\n"
        );
    }

    #[test]
    fn test_expr_display() {
        let e = Expr::raw("source = RTS_BGP")
            .and(Expr::Or(vec![Expr::raw("a ~ b"), Expr::raw("c ~ d")]))
            .and(Expr::call("f").negate());
        assert_eq!(e.to_string(), "source = RTS_BGP && (a ~ b || c ~ d) && !f()");
        assert_eq!(Expr::raw("net ~ X").negate().to_string(), "!(net ~ X)");
    }
}
