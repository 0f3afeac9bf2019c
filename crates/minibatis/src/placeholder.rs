//! Placeholder binding for templated SQL.
//!
//! Mapping templates use `#{name}` markers. Before execution a template is
//! turned into driver-ready SQL with `?` positional markers plus the ordered
//! list of names the markers stood for:
//!
//! ```text
//! update t set name = #{name}, old_car = #{oldCar} where id = #{id}
//!     => update t set name = ?, old_car = ? where id = ?
//!        [(1, "name"), (2, "oldCar"), (3, "id")]
//! ```
//!
//! Names are resolved against the parameter source exactly as written; case
//! conversion only happens on the result side (see [`to_camel_case`]).

use once_cell::sync::Lazy;
use regex::Regex;

use minibatis_types::SqlValue;

use crate::error::{Error, Result};
use crate::params::Params;

const OPEN: &str = "#{";
const CLOSE: char = '}';

static PLACEHOLDER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_$]+$").unwrap());

/// One placeholder occurrence: its 1-based position and the name inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// 1-based position of the `?` this placeholder becomes.
    pub index: usize,
    /// Field or key name between `#{` and `}`.
    pub name: String,
}

/// Single left-to-right pass that serves both [`extract_placeholders`] and
/// [`to_positional_sql`]. An opening marker without a closing brace ends
/// the scan; the remaining text is kept verbatim.
fn scan(template: &str) -> (String, Vec<Placeholder>) {
    let mut sql = String::with_capacity(template.len());
    let mut placeholders = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };

        sql.push_str(&rest[..start]);
        sql.push('?');
        placeholders.push(Placeholder {
            index: placeholders.len() + 1,
            name: after[..end].to_owned(),
        });
        rest = &after[end + 1..];
    }

    sql.push_str(rest);
    (sql, placeholders)
}

/// List the placeholders of `template` in order of appearance.
///
/// Repeated names are kept, each with its own position.
#[must_use]
pub fn extract_placeholders(template: &str) -> Vec<Placeholder> {
    scan(template).1
}

/// Replace every `#{...}` in `template` with `?`.
#[must_use]
pub fn to_positional_sql(template: &str) -> String {
    scan(template).0
}

/// Convert a snake_case column name to a camelCase field name.
///
/// Each `_` is dropped and the character after it upper-cased:
/// `old_car` becomes `oldCar`.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a camelCase field name to a snake_case column name.
///
/// Every upper-case letter that follows a lower-case letter or digit gets
/// a `_` in front and is lower-cased: `oldCar` becomes `old_car`.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Rewrite camelCase identifiers in SQL text to snake_case.
///
/// Placeholders, quoted literals and quoted identifiers are left untouched:
///
/// ```text
/// select oldCar from t where userName = #{userName} and note = 'fooBar'
///     => select old_car from t where user_name = #{userName} and note = 'fooBar'
/// ```
#[must_use]
pub fn snake_case_identifiers(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut word = String::new();
    let mut chars = sql.chars().peekable();

    let flush = |word: &mut String, out: &mut String| {
        if !word.is_empty() {
            out.push_str(&to_snake_case(word));
            word.clear();
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                flush(&mut word, &mut out);
                out.push(c);
                for q in chars.by_ref() {
                    out.push(q);
                    if q == c {
                        break;
                    }
                }
            }
            '#' if chars.peek() == Some(&'{') => {
                flush(&mut word, &mut out);
                out.push(c);
                for p in chars.by_ref() {
                    out.push(p);
                    if p == CLOSE {
                        break;
                    }
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => word.push(c),
            c => {
                flush(&mut word, &mut out);
                out.push(c);
            }
        }
    }
    flush(&mut word, &mut out);
    out
}

/// A template parsed once into positional SQL and its placeholder list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    positional_sql: String,
    placeholders: Vec<Placeholder>,
}

impl ParsedTemplate {
    /// Parse `template`, rejecting placeholder names outside
    /// `[A-Za-z0-9_$]+`. `statement` names the template in errors.
    pub fn parse(template: &str, statement: &str) -> Result<Self> {
        let (positional_sql, placeholders) = scan(template);

        if let Some(bad) = placeholders
            .iter()
            .find(|p| !PLACEHOLDER_NAME.is_match(&p.name))
        {
            return Err(Error::InvalidPlaceholder {
                name: bad.name.clone(),
                statement: statement.to_owned(),
            });
        }

        Ok(Self {
            positional_sql,
            placeholders,
        })
    }

    /// SQL with every placeholder replaced by `?`.
    #[must_use]
    pub fn positional_sql(&self) -> &str {
        &self.positional_sql
    }

    /// Placeholders in positional order.
    #[must_use]
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Number of `?` markers in [`positional_sql`](Self::positional_sql).
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Rewrite camelCase identifiers of the positional SQL to snake_case.
    #[must_use]
    pub(crate) fn with_snake_case_identifiers(mut self) -> Self {
        self.positional_sql = snake_case_identifiers(&self.positional_sql);
        self
    }
}

/// Positional SQL plus the values for its `?` markers, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    sql: String,
    params: Vec<SqlValue>,
}

impl BoundStatement {
    /// Resolve every placeholder of `template` against `params`.
    ///
    /// Fails with [`Error::Binding`] on the first name the source cannot
    /// resolve.
    pub fn bind(template: &ParsedTemplate, params: &Params<'_>, statement: &str) -> Result<Self> {
        let values = template
            .placeholders
            .iter()
            .map(|p| params.resolve(&p.name, statement))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            statement,
            params = values.len(),
            "bound statement parameters"
        );

        Ok(Self {
            sql: template.positional_sql.clone(),
            params: values,
        })
    }

    /// Driver-ready SQL.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter values, first `?` first.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}
