//! Error codes for the Cartograph compiler.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Scanner errors
//! - `E1xx` - Parser errors
//! - `E3xx` - Semantic compiler errors

use std::fmt;

/// Error codes for categorizing compile diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Scanner Errors (E0xx)
    // =========================================================================
    /// Unterminated string literal.
    ///
    /// A string was opened with a quote but never closed on the same line.
    E001,

    /// Unexpected character.
    ///
    /// A character that starts no token was found.
    E002,

    /// Invalid escape sequence.
    ///
    /// Only `\"`, `\\`, `\n`, and `\t` are recognized inside strings.
    E003,

    /// Malformed number.
    ///
    /// A sign without digits, or digits running into identifier characters.
    E004,

    // =========================================================================
    // Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    ///
    /// The parser found a token that cannot appear at this position.
    E100,

    /// Incomplete input.
    ///
    /// The input ended before the declaration was complete.
    E101,

    /// Duplicate attribute.
    ///
    /// The same attribute was assigned twice within one fixture block.
    E102,

    // =========================================================================
    // Semantic Errors (E3xx)
    // =========================================================================
    /// Invalid key.
    ///
    /// An id normalizes to an empty key.
    E300,

    /// Key collision.
    ///
    /// Two entities of the same category share a normalized key.
    E301,

    /// Invalid attribute value.
    ///
    /// An attribute value has the wrong type or is out of range.
    E302,

    /// Unknown attribute.
    ///
    /// An attribute or entity kind is not recognized.
    E303,

    /// Ambiguous start plot.
    ///
    /// More than one plot qualifies as the start plot.
    E304,

    /// No start plot.
    ///
    /// No plot could be chosen as the start plot.
    E305,

    /// No plots declared.
    ///
    /// The source declares no plots at all.
    E306,

    /// Unresolved reference.
    ///
    /// An owner, gate target, `contains` entry, or start plot names an undeclared entity.
    E307,

    /// Ownership conflict.
    ///
    /// An item is claimed by a `contains` list but is already owned elsewhere.
    E308,

    /// Incomplete location.
    ///
    /// Only one of `locationX` and `locationY` was given.
    E309,

    /// Misplaced nested declaration.
    ///
    /// A nested fixture or gate was declared under a subject that cannot own it.
    E310,

    /// Attribute redefined.
    ///
    /// An attribute was set again by a later declaration of the same fixture.
    E311,
}

impl ErrorCode {
    /// Returns the code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E300 => "E300",
            ErrorCode::E301 => "E301",
            ErrorCode::E302 => "E302",
            ErrorCode::E303 => "E303",
            ErrorCode::E304 => "E304",
            ErrorCode::E305 => "E305",
            ErrorCode::E306 => "E306",
            ErrorCode::E307 => "E307",
            ErrorCode::E308 => "E308",
            ErrorCode::E309 => "E309",
            ErrorCode::E310 => "E310",
            ErrorCode::E311 => "E311",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "unterminated string literal",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "malformed number",
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "incomplete input",
            ErrorCode::E102 => "duplicate attribute",
            ErrorCode::E300 => "invalid key",
            ErrorCode::E301 => "key collision",
            ErrorCode::E302 => "invalid attribute value",
            ErrorCode::E303 => "unknown attribute",
            ErrorCode::E304 => "ambiguous start plot",
            ErrorCode::E305 => "no start plot",
            ErrorCode::E306 => "no plots declared",
            ErrorCode::E307 => "unresolved reference",
            ErrorCode::E308 => "ownership conflict",
            ErrorCode::E309 => "incomplete location",
            ErrorCode::E310 => "misplaced nested declaration",
            ErrorCode::E311 => "attribute redefined",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
