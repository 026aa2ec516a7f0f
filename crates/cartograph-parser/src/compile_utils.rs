//! Attribute extraction utilities for the semantic compiler.
//!
//! Declarations for the same fixture are merged into an [`AttrMap`]. The
//! compiler then reads each map through an [`AttrReader`], which converts
//! values to the expected types and reports any attribute nobody asked for.

use indexmap::IndexMap;

use cartograph_core::normalize_key;

use crate::{
    error::{Diagnostic, ErrorCode, Result as DiagnosticResult},
    parser_types::{Attribute, AttributeValue},
    span::{Span, Spanned},
};

/// The only attribute whose values accumulate across declarations.
const CONTAINS: &str = "contains";

/// Numbers are scanned as `f64`; whole numbers at or beyond 2^53 are inexact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A merged attribute and where its name was written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttrEntry {
    pub name_span: Span,
    pub value: Spanned<AttributeValue>,
}

/// Lower-cased attribute name to merged entry, in first-seen order.
pub(crate) type AttrMap = IndexMap<String, AttrEntry>;

/// Merge one parsed attribute into a fixture's attribute map.
///
/// `contains` lists concatenate; any other redefinition is an error.
pub(crate) fn merge_attribute(attrs: &mut AttrMap, attribute: &Attribute) -> DiagnosticResult<()> {
    let name = attribute.name.inner();

    let Some(existing) = attrs.get_mut(name) else {
        attrs.insert(
            name.clone(),
            AttrEntry {
                name_span: attribute.name.span(),
                value: attribute.value.clone(),
            },
        );
        return Ok(());
    };

    if name == CONTAINS {
        let span = existing.value.span();
        let mut items = into_items(existing.value.clone());
        items.extend(into_items(attribute.value.clone()));
        existing.value = Spanned::new(AttributeValue::List(items), span);
        return Ok(());
    }

    Err(
        Diagnostic::error(format!("attribute `{name}` is already set for this fixture"))
            .with_code(ErrorCode::E311)
            .with_label(attribute.name.span(), "set again here")
            .with_secondary_label(existing.name_span, "first set here")
            .with_help("each attribute may be set once; only `contains` lists are merged"),
    )
}

/// Flatten a value into list items; scalars become a single item.
fn into_items(value: Spanned<AttributeValue>) -> Vec<Spanned<AttributeValue>> {
    let span = value.span();
    match value.into_inner() {
        AttributeValue::List(items) => items,
        scalar => vec![Spanned::new(scalar, span)],
    }
}

/// Normalize a key read from source, reporting an empty result at `span`.
pub(crate) fn normalize_spanned(raw: &str, span: Span) -> DiagnosticResult<String> {
    normalize_key(raw).map_err(|err| {
        Diagnostic::error(err.to_string())
            .with_code(ErrorCode::E300)
            .with_label(span, "invalid key")
            .with_help("keys need at least one letter or digit")
    })
}

fn type_error(name: &str, expected: &str, value: &Spanned<AttributeValue>) -> Diagnostic {
    Diagnostic::error(format!(
        "attribute `{name}` expects a {expected}, found a {}",
        value.inner().type_name()
    ))
    .with_code(ErrorCode::E302)
    .with_label(value.span(), format!("expected {expected}"))
}

fn expect_string(name: &str, value: &Spanned<AttributeValue>) -> DiagnosticResult<String> {
    match value.inner() {
        AttributeValue::String(text) => Ok(text.clone()),
        _ => Err(type_error(name, "string", value)),
    }
}

/// Reads one attribute map, remembering which names were asked for.
///
/// Call [`AttrReader::finish`] once every recognized attribute has been
/// read; it rejects whatever is left over.
#[derive(Debug)]
pub(crate) struct AttrReader<'a> {
    attrs: &'a AttrMap,
    consumed: Vec<&'a str>,
    recognized: Vec<&'static str>,
}

impl<'a> AttrReader<'a> {
    pub fn new(attrs: &'a AttrMap) -> Self {
        Self {
            attrs,
            consumed: Vec::new(),
            recognized: Vec::new(),
        }
    }

    /// Take the entry for `name`, matched case-insensitively.
    pub fn take(&mut self, name: &'static str) -> Option<&'a AttrEntry> {
        self.recognized.push(name);
        let (key, entry) = self.attrs.get_key_value(name.to_ascii_lowercase().as_str())?;
        self.consumed.push(key.as_str());
        Some(entry)
    }

    /// Take the first of several aliases; setting two of them is an error.
    pub fn take_any(
        &mut self,
        names: &[&'static str],
    ) -> DiagnosticResult<Option<(&'static str, &'a AttrEntry)>> {
        let mut found: Option<(&'static str, &'a AttrEntry)> = None;

        for &name in names {
            let Some(entry) = self.take(name) else {
                continue;
            };
            if let Some((first_name, first)) = found {
                return Err(Diagnostic::error(format!(
                    "`{name}` and `{first_name}` set the same attribute"
                ))
                .with_code(ErrorCode::E311)
                .with_label(entry.name_span, "set again here")
                .with_secondary_label(first.name_span, "first set here"));
            }
            found = Some((name, entry));
        }

        Ok(found)
    }

    pub fn string(&mut self, name: &'static str) -> DiagnosticResult<Option<Spanned<String>>> {
        self.string_any(&[name])
    }

    pub fn string_any(
        &mut self,
        names: &[&'static str],
    ) -> DiagnosticResult<Option<Spanned<String>>> {
        let Some((name, entry)) = self.take_any(names)? else {
            return Ok(None);
        };
        let text = expect_string(name, &entry.value)?;
        Ok(Some(Spanned::new(text, entry.value.span())))
    }

    pub fn boolean(&mut self, name: &'static str) -> DiagnosticResult<Option<bool>> {
        let Some(entry) = self.take(name) else {
            return Ok(None);
        };
        match entry.value.inner() {
            AttributeValue::Boolean(flag) => Ok(Some(*flag)),
            _ => Err(type_error(name, "boolean", &entry.value)),
        }
    }

    /// Read a whole number.
    pub fn integer(&mut self, name: &'static str) -> DiagnosticResult<Option<Spanned<i64>>> {
        let Some(entry) = self.take(name) else {
            return Ok(None);
        };
        match entry.value.inner() {
            AttributeValue::Number(number) if number.abs() >= MAX_EXACT_INTEGER => {
                Err(Diagnostic::error(format!(
                    "attribute `{name}` is out of range, found `{number}`"
                ))
                .with_code(ErrorCode::E302)
                .with_label(entry.value.span(), "out of range")
                .with_help("whole numbers must lie strictly between -2^53 and 2^53"))
            }
            AttributeValue::Number(number) if number.fract() == 0.0 => {
                Ok(Some(Spanned::new(*number as i64, entry.value.span())))
            }
            AttributeValue::Number(number) => Err(Diagnostic::error(format!(
                "attribute `{name}` expects a whole number, found `{number}`"
            ))
            .with_code(ErrorCode::E302)
            .with_label(entry.value.span(), "not a whole number")),
            _ => Err(type_error(name, "number", &entry.value)),
        }
    }

    /// Read a whole number in `0..=u32::MAX`.
    pub fn count(&mut self, name: &'static str) -> DiagnosticResult<Option<u32>> {
        let Some(number) = self.integer(name)? else {
            return Ok(None);
        };
        u32::try_from(*number.inner()).map(Some).map_err(|_| {
            Diagnostic::error(format!(
                "attribute `{name}` must be a non-negative count, found `{}`",
                number.inner()
            ))
            .with_code(ErrorCode::E302)
            .with_label(number.span(), "out of range")
        })
    }

    /// Read a reference to another entity as a normalized key.
    pub fn key_ref(&mut self, names: &[&'static str]) -> DiagnosticResult<Option<Spanned<String>>> {
        let Some(raw) = self.string_any(names)? else {
            return Ok(None);
        };
        let key = normalize_spanned(raw.inner(), raw.span())?;
        Ok(Some(Spanned::new(key, raw.span())))
    }

    /// Read a list of strings; a single string counts as a one-item list.
    pub fn string_list(&mut self, name: &'static str) -> DiagnosticResult<Vec<Spanned<String>>> {
        let Some(entry) = self.take(name) else {
            return Ok(Vec::new());
        };

        into_items(entry.value.clone())
            .iter()
            .map(|item| {
                expect_string(name, item).map(|text| Spanned::new(text, item.span()))
            })
            .collect()
    }

    /// Read a list of entity references as normalized keys.
    pub fn key_list(&mut self, name: &'static str) -> DiagnosticResult<Vec<Spanned<String>>> {
        self.string_list(name)?
            .into_iter()
            .map(|raw| {
                normalize_spanned(raw.inner(), raw.span()).map(|key| Spanned::new(key, raw.span()))
            })
            .collect()
    }

    /// Reject any attribute that was not read.
    ///
    /// `subject` describes the owner in the message, e.g. "plot `hall`".
    pub fn finish(self, subject: &str) -> DiagnosticResult<()> {
        let leftover = self
            .attrs
            .iter()
            .find(|(name, _)| !self.consumed.contains(&name.as_str()));

        match leftover {
            None => Ok(()),
            Some((name, entry)) => Err(Diagnostic::error(format!(
                "unknown attribute `{name}` for {subject}"
            ))
            .with_code(ErrorCode::E303)
            .with_label(entry.name_span, "not recognized here")
            .with_help(format!(
                "recognized attributes: {}",
                self.recognized.join(", ")
            ))),
        }
    }
}
