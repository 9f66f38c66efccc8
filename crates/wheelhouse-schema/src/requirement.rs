//! Dependency requirement strings as declared in index metadata.
//!
//! Index documents declare dependencies in PEP 508 shape, e.g.
//! `charset-normalizer (<4,>=2)` or `colorama ; sys_platform == "win32"`.
//! We parse the pieces the resolver needs: the name, an exact pin when
//! one is declared, and the environment marker. Range comparators other
//! than `==` do not propagate as pins; the resolver's first-seen-wins
//! policy makes finer constraint tracking moot.

use crate::types::{PackageName, Version, VersionSpec};
use thiserror::Error;

/// A parsed dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Normalized dependency name (extras stripped).
    pub name: PackageName,
    /// Exact pin when the declaration carries `==x.y.z`, else latest.
    pub spec: VersionSpec,
    /// Raw environment marker, if any (the part after `;`).
    pub marker: Option<String>,
}

/// Errors produced while parsing a requirement string.
#[derive(Debug, Error)]
pub enum RequirementError {
    /// The string has no package name.
    #[error("Requirement has no package name: {0:?}")]
    MissingName(String),
}

impl Requirement {
    /// Parse a requirement string.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError::MissingName`] when no leading package
    /// name can be extracted.
    pub fn parse(input: &str) -> Result<Self, RequirementError> {
        let (req_part, marker_part) = match input.split_once(';') {
            Some((r, m)) => (r.trim(), Some(m.trim().to_string())),
            None => (input.trim(), None),
        };

        let name_end = req_part
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .unwrap_or(req_part.len());
        let raw_name = &req_part[..name_end];
        if raw_name.is_empty() {
            return Err(RequirementError::MissingName(input.to_string()));
        }

        let mut rest = req_part[name_end..].trim();
        // Extras select optional dependency groups of the dependency
        // itself; we never follow them, so just skip the bracket.
        if let Some(stripped) = rest.strip_prefix('[') {
            rest = stripped
                .split_once(']')
                .map_or("", |(_, after)| after)
                .trim();
        }
        let specifiers = rest
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();

        let mut spec = VersionSpec::Latest;
        for clause in specifiers.split(',') {
            let clause = clause.trim();
            if let Some(v) = clause.strip_prefix("==") {
                let v = v.trim();
                // `==2.*` is a range, not a pin
                if !v.is_empty() && !v.ends_with('*') {
                    spec = VersionSpec::Exact(Version::new(v));
                }
            }
        }

        Ok(Self {
            name: PackageName::new(raw_name),
            spec,
            marker: marker_part.filter(|m| !m.is_empty()),
        })
    }

    /// Evaluate this requirement's marker against a target environment.
    ///
    /// `env` is a list of `(variable, value)` pairs. A requirement with
    /// no marker always applies. Clauses over `extra` are unsatisfied
    /// (optional groups are never pulled in); clauses over variables we
    /// do not model are treated as satisfied.
    pub fn applies_to(&self, env: &[(&str, String)]) -> bool {
        match &self.marker {
            None => true,
            Some(marker) => eval_marker(marker, env),
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.spec {
            VersionSpec::Latest => write!(f, "{}", self.name),
            VersionSpec::Exact(v) => write!(f, "{}=={v}", self.name),
        }
    }
}

/// Evaluate a marker expression: `or`-groups of `and`-groups of clauses.
///
/// Parenthesized sub-expressions are handled only at clause edges, which
/// covers the shapes that appear in real index metadata.
fn eval_marker(marker: &str, env: &[(&str, String)]) -> bool {
    marker
        .split(" or ")
        .any(|group| group.split(" and ").all(|clause| eval_clause(clause, env)))
}

fn eval_clause(clause: &str, env: &[(&str, String)]) -> bool {
    let clause = clause.trim().trim_matches(|c| c == '(' || c == ')').trim();

    let ops = ["==", "!=", ">=", "<=", "~=", ">", "<"];
    let Some((op, pos)) = ops
        .iter()
        .filter_map(|op| clause.find(op).map(|p| (*op, p)))
        .min_by_key(|(_, p)| *p)
    else {
        // `in` / `not in` and anything else we do not model
        return true;
    };

    let var = clause[..pos].trim();
    let value = clause[pos + op.len()..]
        .trim()
        .trim_matches(|c| c == '\'' || c == '"');

    if var == "extra" {
        return false;
    }
    let Some((_, actual)) = env.iter().find(|(name, _)| *name == var) else {
        return true;
    };

    if var.starts_with("python") {
        let ord = Version::new(actual).cmp(&Version::new(value));
        match op {
            "==" => ord.is_eq(),
            "!=" => !ord.is_eq(),
            ">=" | "~=" => ord.is_ge(),
            "<=" => ord.is_le(),
            ">" => ord.is_gt(),
            "<" => ord.is_lt(),
            _ => true,
        }
    } else {
        match op {
            "==" => actual == value,
            "!=" => actual != value,
            _ => true,
        }
    }
}
