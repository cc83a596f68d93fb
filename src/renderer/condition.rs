//! Program gating conditions.
//!
//! A leaf compares one field of the candidate blocks against a literal:
//!
//! ```text
//! check BSLightingShaderProperty/Skyrim Shader Type == 1
//! check not NiTexturingProperty/Apply Mode & 0x2
//! check HEADER/Version >= 0x14020007
//! ```
//!
//! The left side is `Type/Field`: the first candidate block inheriting `Type`
//! supplies `Field`. A bare `Type` checks that such a block exists, and the
//! `HEADER/` prefix reads from the file header. Leaves are gathered into
//! AND / OR groups that nest.

use crate::assets::{AssetGraph, BlockId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    /// Bitwise AND is non-zero.
    And,
}

/// Search order of operators in a leaf; longer tokens first so `<=` is not
/// read as `<`.
const OPERATORS: [(&str, CompareOp); 7] = [
    (" == ", CompareOp::Eq),
    (" != ", CompareOp::Ne),
    (" <= ", CompareOp::Le),
    (" >= ", CompareOp::Ge),
    (" < ", CompareOp::Lt),
    (" > ", CompareOp::Gt),
    (" & ", CompareOp::And),
];

impl CompareOp {
    fn ordered<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Le => a <= b,
            Self::Ge => a >= b,
            Self::Lt => a < b,
            Self::Gt => a > b,
            Self::And => false,
        }
    }
}

/// One `check` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSingle {
    left: String,
    op: Option<(CompareOp, String)>,
    invert: bool,
}

impl ConditionSingle {
    /// Parses the text after `check` (and after `not`, which sets `invert`).
    #[must_use]
    pub fn parse(line: &str, invert: bool) -> Self {
        for (token, op) in OPERATORS {
            if let Some(pos) = line.find(token)
                && pos > 0
            {
                let right = line[pos + token.len()..].trim();
                let right = right
                    .strip_prefix('"')
                    .and_then(|r| r.strip_suffix('"'))
                    .unwrap_or(right);
                return Self {
                    left: line[..pos].trim().to_owned(),
                    op: Some((op, right.to_owned())),
                    invert,
                };
            }
        }
        Self {
            left: line.trim().to_owned(),
            op: None,
            invert,
        }
    }

    #[must_use]
    pub fn left(&self) -> &str {
        &self.left
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// An unresolved path yields `invert`; a bare path that resolves yields
    /// `!invert`.
    #[must_use]
    pub fn eval(&self, graph: &dyn AssetGraph, blocks: &[BlockId]) -> bool {
        let Some(target) = resolve(graph, blocks, &self.left) else {
            return self.invert;
        };
        let Some((op, right)) = &self.op else {
            return !self.invert;
        };
        let Resolved::Field(value) = target else {
            return self.invert;
        };
        compare(value, *op, right) ^ self.invert
    }
}

enum Resolved<'a> {
    Block,
    Field(&'a Value),
}

fn resolve<'a>(graph: &'a dyn AssetGraph, blocks: &[BlockId], path: &str) -> Option<Resolved<'a>> {
    if let Some(field) = path.strip_prefix("HEADER/") {
        return graph.header().get(field).map(Resolved::Field);
    }

    let (type_name, field) = match path.split_once('/') {
        Some((t, f)) if !t.is_empty() => (t, Some(f)),
        _ => (path, None),
    };

    // only the first matching block is consulted
    let block = blocks.iter().copied().find(|b| graph.inherits(*b, type_name))?;
    match field {
        None => Some(Resolved::Block),
        Some(f) => graph.field(block, f).map(Resolved::Field),
    }
}

/// Unsigned integer with C-style base prefixes; unparsable text reads as 0.
fn parse_uint(text: &str) -> u64 {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).unwrap_or(0)
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).unwrap_or(0)
    } else {
        text.parse().unwrap_or(0)
    }
}

fn compare(value: &Value, op: CompareOp, right: &str) -> bool {
    match value {
        Value::String(s) => match op {
            CompareOp::Eq => s == right,
            CompareOp::Ne => s != right,
            _ => false,
        },
        Value::Float(f) => op.ordered(*f, right.trim().parse().unwrap_or(0.0)),
        Value::Bool(_) | Value::Count(_) | Value::Int(_) | Value::FileVersion(_) => {
            let a = match value {
                Value::FileVersion(v) => u64::from(*v),
                other => other.as_count().unwrap_or(0),
            };
            let b = parse_uint(right);
            match op {
                CompareOp::And => a & b != 0,
                _ => op.ordered(a, b),
            }
        }
        _ => false,
    }
}

/// A condition tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Single(ConditionSingle),
    Group(ConditionGroup),
}

impl Condition {
    #[must_use]
    pub fn eval(&self, graph: &dyn AssetGraph, blocks: &[BlockId]) -> bool {
        match self {
            Self::Single(c) => c.eval(graph, blocks),
            Self::Group(g) => g.eval(graph, blocks),
        }
    }
}

/// AND or OR over child conditions. An empty group is true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    pub or: bool,
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    #[must_use]
    pub fn new(or: bool) -> Self {
        Self {
            or,
            conditions: Vec::new(),
        }
    }

    pub fn add(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    #[must_use]
    pub fn eval(&self, graph: &dyn AssetGraph, blocks: &[BlockId]) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        if self.or {
            self.conditions.iter().any(|c| c.eval(graph, blocks))
        } else {
            self.conditions.iter().all(|c| c.eval(graph, blocks))
        }
    }
}
