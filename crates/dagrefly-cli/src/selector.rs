//! Graph selection expressions (`+orders`, `stg_orders+2`, `@customers`)

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use dagrefly_graph::{DependencyGraph, NodeId};

/// How far to expand in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Unbounded,
    Depth(usize),
}

impl Expansion {
    fn max_depth(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Depth(depth) => Some(depth),
        }
    }
}

/// One parsed selection expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionExpr {
    /// Node name or unique id
    pub node: String,

    /// `+name` / `N+name`
    pub parents: Option<Expansion>,

    /// `name+` / `name+N`
    pub children: Option<Expansion>,

    /// `@name`: descendants plus all of their ancestors
    pub childrens_parents: bool,
}

impl SelectionExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();

        if let Some(node) = expr.strip_prefix('@') {
            if node.is_empty() || node.contains('+') {
                return Err(anyhow!(
                    "Invalid selector '{}': '@' cannot be combined with '+'",
                    expr
                ));
            }
            return Ok(Self {
                node: node.to_string(),
                parents: None,
                children: None,
                childrens_parents: true,
            });
        }

        let (parents, rest) = split_parents(expr)?;
        let (node, children) = split_children(rest)?;

        if node.is_empty() {
            return Err(anyhow!("Invalid selector '{}': missing node name", expr));
        }

        Ok(Self {
            node: node.to_string(),
            parents,
            children,
            childrens_parents: false,
        })
    }

    /// Expand around `unique_id`, the resolved form of [`node`](Self::node)
    pub fn expand(&self, graph: &DependencyGraph, unique_id: &str) -> BTreeSet<NodeId> {
        let root = [unique_id];

        if self.childrens_parents {
            return graph.select_childrens_parents(root);
        }

        let mut selected = BTreeSet::from([unique_id.to_string()]);
        if let Some(parents) = self.parents {
            selected.extend(graph.select_parents(root, parents.max_depth()));
        }
        if let Some(children) = self.children {
            selected.extend(graph.select_children(root, children.max_depth()));
        }
        selected
    }
}

/// Strip a leading `+` or `N+`
fn split_parents(expr: &str) -> Result<(Option<Expansion>, &str)> {
    if let Some(rest) = expr.strip_prefix('+') {
        return Ok((Some(Expansion::Unbounded), rest));
    }

    let digits = expr.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = expr[digits..].strip_prefix('+') {
            let depth = parse_depth(&expr[..digits], expr)?;
            return Ok((Some(Expansion::Depth(depth)), rest));
        }
    }

    // digits without a `+` belong to the name
    Ok((None, expr))
}

/// Strip a trailing `+` or `+N`
fn split_children(expr: &str) -> Result<(&str, Option<Expansion>)> {
    let Some(pos) = expr.rfind('+') else {
        return Ok((expr, None));
    };

    let (node, suffix) = (&expr[..pos], &expr[pos + 1..]);
    if suffix.is_empty() {
        return Ok((node, Some(Expansion::Unbounded)));
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        return Ok((node, Some(Expansion::Depth(parse_depth(suffix, expr)?))));
    }

    Err(anyhow!(
        "Invalid selector '{}': unexpected '+' in node name",
        expr
    ))
}

fn parse_depth(digits: &str, expr: &str) -> Result<usize> {
    digits
        .parse()
        .map_err(|e| anyhow!("Invalid depth in selector '{}': {}", expr, e))
}
