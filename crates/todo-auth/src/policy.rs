//! Path classification for authentication
//!
//! Decides, per request path, whether the request gate runs at all.
//! Rules are glob patterns evaluated in order; the first match wins and
//! unmatched paths are public.

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Maximum iterations allowed for pattern matching to prevent ReDoS
const MAX_MATCH_ITERATIONS: usize = 10000;

/// Access class of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Gate skipped, no principal required
    Public,
    /// Gate runs, principal required
    Protected,
}

impl Access {
    pub fn is_public(self) -> bool {
        matches!(self, Access::Public)
    }
}

/// A single `pattern -> access` rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: String,
    pub access: Access,
}

impl PathRule {
    pub fn public(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            access: Access::Public,
        }
    }

    pub fn protected(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            access: Access::Protected,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: PathRule,
    parts: Vec<PatternPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternPart {
    /// Literal text that must match exactly
    Literal(String),
    /// Single path segment wildcard (*)
    SingleWildcard,
    /// Multi-segment wildcard (**)
    MultiWildcard,
}

/// Ordered rule set
#[derive(Debug, Clone)]
pub struct PathPolicy {
    rules: Vec<CompiledRule>,
}

impl Default for PathPolicy {
    /// Health and auth endpoints first, then the protected API prefix
    fn default() -> Self {
        Self::new(vec![
            PathRule::public("/health"),
            PathRule::public("/healthz"),
            PathRule::public("/metrics"),
            PathRule::public("/api/auth/**"),
            PathRule::public("/error"),
            PathRule::public("/public/**"),
            PathRule::protected("/api/**"),
        ])
    }
}

impl PathPolicy {
    /// Build a policy from rules in precedence order
    pub fn new(rules: Vec<PathRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CompiledRule {
                parts: compile_pattern(&rule.pattern),
                rule,
            })
            .collect();

        Self { rules }
    }

    /// Add public patterns ahead of the first protected rule
    pub fn with_public_paths<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules: Vec<PathRule> = self.rules.into_iter().map(|r| r.rule).collect();
        let at = rules
            .iter()
            .position(|r| r.access == Access::Protected)
            .unwrap_or(rules.len());

        let extra: Vec<PathRule> = patterns
            .into_iter()
            .map(|p| PathRule::public(p.as_ref()))
            .collect();
        rules.splice(at..at, extra);

        Self::new(rules)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &PathRule> {
        self.rules.iter().map(|r| &r.rule)
    }

    /// Classify a path
    pub fn classify(&self, path: &str) -> Access {
        self.rules
            .iter()
            .find(|r| matches_pattern(&r.parts, path))
            .map(|r| r.rule.access)
            .unwrap_or(Access::Public)
    }

    /// Classify a request; preflight `OPTIONS` requests are always public
    pub fn classify_request(&self, method: &Method, path: &str) -> Access {
        if *method == Method::OPTIONS {
            return Access::Public;
        }
        self.classify(path)
    }
}

/// Compile a glob-like pattern into parts
fn compile_pattern(pattern: &str) -> Vec<PatternPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '*' {
            if !current.is_empty() {
                parts.push(PatternPart::Literal(std::mem::take(&mut current)));
            }

            if i + 1 < chars.len() && chars[i + 1] == '*' {
                parts.push(PatternPart::MultiWildcard);
                i += 2;
            } else {
                parts.push(PatternPart::SingleWildcard);
                i += 1;
            }
        } else {
            current.push(ch);
            i += 1;
        }
    }

    if !current.is_empty() {
        parts.push(PatternPart::Literal(current));
    }

    parts
}

fn matches_pattern(parts: &[PatternPart], path: &str) -> bool {
    let mut iterations = 0;
    match_recursive(parts, path, 0, 0, &mut iterations)
}

fn match_recursive(
    parts: &[PatternPart],
    path: &str,
    part_idx: usize,
    path_pos: usize,
    iterations: &mut usize,
) -> bool {
    *iterations += 1;
    if *iterations > MAX_MATCH_ITERATIONS {
        tracing::warn!(
            "Path pattern matching exceeded {} iterations, aborting",
            MAX_MATCH_ITERATIONS
        );
        return false;
    }

    if part_idx >= parts.len() {
        return path_pos >= path.len();
    }

    let path_remaining = &path[path_pos..];

    match &parts[part_idx] {
        PatternPart::Literal(lit) => {
            if path_remaining.starts_with(lit.as_str()) {
                match_recursive(parts, path, part_idx + 1, path_pos + lit.len(), iterations)
            } else {
                // "/api/**" also covers "/api" itself
                is_trailing_multi(parts, part_idx + 1)
                    && lit
                        .strip_suffix('/')
                        .is_some_and(|prefix| path_remaining == prefix)
            }
        }
        PatternPart::SingleWildcard => match path_remaining.find('/') {
            Some(slash_pos) => {
                match_recursive(parts, path, part_idx + 1, path_pos + slash_pos, iterations)
            }
            None => match_recursive(parts, path, part_idx + 1, path.len(), iterations),
        },
        PatternPart::MultiWildcard => {
            if part_idx + 1 >= parts.len() {
                return true;
            }

            (0..=path_remaining.len())
                .filter(|i| path_remaining.is_char_boundary(*i))
                .any(|i| match_recursive(parts, path, part_idx + 1, path_pos + i, iterations))
        }
    }
}

fn is_trailing_multi(parts: &[PatternPart], idx: usize) -> bool {
    idx + 1 == parts.len() && parts[idx] == PatternPart::MultiWildcard
}
