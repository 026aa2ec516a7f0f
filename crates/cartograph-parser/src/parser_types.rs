//! Syntax tree produced by the [`parser`](super::parser).
//!
//! The tree is purely syntactic: attribute names are lower-cased but carry no
//! meaning yet. Semantic resolution happens in [`compile`](super::compile).

use std::fmt;

use crate::span::{Span, Spanned};

/// Which keyword opened a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Thing,
    Actor,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Thing => write!(f, "thing"),
            SubjectKind::Actor => write!(f, "actor"),
        }
    }
}

/// A literal attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Boolean(bool),
    List(Vec<Spanned<AttributeValue>>),
}

impl AttributeValue {
    /// Human-readable name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Number(_) => "number",
            AttributeValue::Boolean(_) => "boolean",
            AttributeValue::List(_) => "list",
        }
    }
}

/// One `.name=value` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Lower-cased attribute name.
    pub name: Spanned<String>,
    pub value: Spanned<AttributeValue>,
}

/// A `subject.fixture.attr=value...` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub subject_kind: SubjectKind,
    /// Raw subject id as written.
    pub subject_id: Spanned<String>,
    /// Raw fixture id as written.
    pub fixture_id: Spanned<String>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}
