//! Code generator: renders the finished IR as program text.
//!
//! Rendering never looks at the graph. `begin`, `if` and `cond` put each
//! sub-form on its own line to mirror clause structure; everything else is
//! space-separated. Span operations go through the configured templates.

use tracegraph_core::ConstValue;

use crate::error::CodegenError;
use crate::ir::{Binding, Expr, LetKind};
use crate::templates::{SpanOp, SpanTemplates};

/// Renders expressions with a fixed template set.
pub struct Renderer<'a> {
    templates: &'a SpanTemplates,
    no_context: &'a str,
}

impl<'a> Renderer<'a> {
    /// `no_context` is printed as the parent of root spans.
    pub fn new(templates: &'a SpanTemplates, no_context: &'a str) -> Self {
        Renderer {
            templates,
            no_context,
        }
    }

    pub fn render(&self, expr: &Expr) -> Result<String, CodegenError> {
        match expr {
            Expr::Literal(value) => Ok(literal(value)),
            Expr::Var(symbol) => Ok(symbol.to_string()),
            Expr::Call { name, args } => {
                let mut parts = Vec::with_capacity(args.len() + 1);
                parts.push(name.clone());
                for arg in args {
                    parts.push(self.render(arg)?);
                }
                Ok(format!("({})", parts.join(" ")))
            }
            Expr::Let {
                kind,
                bindings,
                body,
            } => {
                let keyword = match kind {
                    LetKind::Parallel => "let",
                    LetKind::Sequential => "let*",
                };
                let bindings = bindings
                    .iter()
                    .map(|b| self.binding(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!(
                    "({} ({}) {})",
                    keyword,
                    bindings.join(" "),
                    self.render(body)?
                ))
            }
            Expr::Begin(items) => self.block("begin", items.iter()),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let parts = [Some(cond), Some(then), otherwise.as_ref()];
                self.block("if", parts.into_iter().flatten().map(|b| &**b))
            }
            Expr::Cond(clauses) => {
                let rendered = clauses
                    .iter()
                    .map(|c| {
                        Ok(format!(
                            "({} {})",
                            self.render(&c.test)?,
                            self.render(&c.action)?
                        ))
                    })
                    .collect::<Result<Vec<_>, CodegenError>>()?;
                Ok(lines("cond", rendered))
            }
            Expr::StartSpan { name, parent } => {
                let name = string_literal(name);
                let parent = parent
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| self.no_context.to_string());
                self.templates
                    .render(SpanOp::StartSpan, &[("name", &name), ("parent", &parent)])
            }
            Expr::EndSpan { context } => {
                let context = context.to_string();
                self.templates
                    .render(SpanOp::EndSpan, &[("context", &context)])
            }
        }
    }

    fn binding(&self, binding: &Binding) -> Result<String, CodegenError> {
        Ok(format!(
            "({} {})",
            binding.symbol,
            self.render(&binding.value)?
        ))
    }

    fn block<'e>(
        &self,
        keyword: &str,
        items: impl Iterator<Item = &'e Expr>,
    ) -> Result<String, CodegenError> {
        let rendered = items
            .map(|e| self.render(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines(keyword, rendered))
    }
}

fn lines(keyword: &str, items: Vec<String>) -> String {
    if items.is_empty() {
        format!("({})", keyword)
    } else {
        format!("({} {})", keyword, items.join("\n"))
    }
}

fn literal(value: &ConstValue) -> String {
    match value {
        ConstValue::Bool(true) => "#t".to_string(),
        ConstValue::Bool(false) => "#f".to_string(),
        ConstValue::Int(i) => i.to_string(),
        ConstValue::Float(f) => format!("{:?}", f),
        ConstValue::Str(s) => string_literal(s),
    }
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
