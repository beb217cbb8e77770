//! Key Builder: canonical key construction from named parameters.
//!
//! A template is `(literal | '{' token '}')+`; tokens match
//! `[A-Za-z_][A-Za-z0-9_]*`. Keys are built by strict, verbatim substitution:
//! no escaping, no type coercion. The component performs no I/O and holds no
//! global state.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ConfigError;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// One segment of a parsed template: either a literal run or a token name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(String),
}

/// Builds canonical keys from a template such as `user:{userId}:feed`.
///
/// `validate` controls behavior when a token has no matching parameter: when
/// `true`, building fails with [`ConfigError::MissingToken`]; when `false`,
/// the literal `{token}` text is left unsubstituted in the output.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    template: String,
    segments: Vec<Segment>,
    prefix: Option<String>,
    separator: String,
    validate: bool,
}

impl KeyBuilder {
    /// Parse a template into a `KeyBuilder` with no prefix, `:` separator,
    /// and validation enabled.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = parse_segments(&template);
        Self {
            template,
            segments,
            prefix: None,
            separator: ":".to_string(),
            validate: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// The raw template string this builder was constructed from.
    pub fn pattern(&self) -> &str {
        &self.template
    }

    /// Token names referenced by the template, in order of first appearance.
    pub fn tokens(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Token(t) => Some(t.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute `params` into the template, then apply the prefix if one is
    /// configured (`prefix<sep>key`, omitted if the key already begins with
    /// `prefix<sep>`).
    pub fn build(&self, params: &HashMap<&str, &str>) -> Result<String, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Token(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(ConfigError::DuplicateToken { token: name.clone() });
                    }
                    match params.get(name.as_str()) {
                        Some(value) => out.push_str(value),
                        None if self.validate => {
                            return Err(ConfigError::MissingToken { token: name.clone() })
                        }
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                }
            }
        }
        Ok(self.apply_prefix(out))
    }

    fn apply_prefix(&self, key: String) -> String {
        match &self.prefix {
            None => key,
            Some(prefix) => {
                let with_sep = format!("{prefix}{}", self.separator);
                if key.starts_with(&with_sep) {
                    key
                } else {
                    format!("{with_sep}{key}")
                }
            }
        }
    }

    /// Build a glob pattern covering every key this template could produce,
    /// with the given tokens fixed and the rest wildcarded.
    ///
    /// Unresolved tokens become a single `*` (`domain[:type]:*`) segment
    /// rather than attempting to preserve surrounding literals
    /// character-for-character.
    pub fn glob(&self, fixed: &[(&str, &str)]) -> String {
        let fixed: HashMap<&str, &str> = fixed.iter().copied().collect();
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Token(name) => match fixed.get(name.as_str()) {
                    Some(value) => out.push_str(value),
                    None => out.push('*'),
                },
            }
        }
        self.apply_prefix(out)
    }
}

fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_end = 0;
    for m in TOKEN_RE.find_iter(template) {
        if m.start() > last_end {
            segments.push(Segment::Literal(template[last_end..m.start()].to_string()));
        }
        let token = &template[m.start() + 1..m.end() - 1];
        segments.push(Segment::Token(token.to_string()));
        last_end = m.end();
    }
    if last_end < template.len() {
        segments.push(Segment::Literal(template[last_end..].to_string()));
    }
    segments
}

/// A parsed `domain:type:id[:id…]` key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    pub domain: String,
    pub structure_type: String,
    pub ids: Vec<String>,
}

/// Parse a colon-delimited key of the form `domain:type:id[:id…]`.
///
/// Returns `None` if fewer than three colon-delimited parts are present.
pub fn parse_pattern(key: &str) -> Option<KeyPattern> {
    let mut parts = key.split(':');
    let domain = parts.next()?.to_string();
    let structure_type = parts.next()?.to_string();
    let ids: Vec<String> = parts.map(|s| s.to_string()).collect();
    if ids.is_empty() {
        return None;
    }
    Some(KeyPattern {
        domain,
        structure_type,
        ids,
    })
}

/// Build a glob covering every key of `domain[:type]:*`.
pub fn build_glob(domain: &str, structure_type: Option<&str>) -> String {
    match structure_type {
        Some(t) => format!("{domain}:{t}:*"),
        None => format!("{domain}:*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<&str, &str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn substitutes_tokens_verbatim() {
        let kb = KeyBuilder::new("user:{userId}:feed");
        let key = kb.build(&params(&[("userId", "42")])).unwrap();
        assert_eq!(key, "user:42:feed");
    }

    #[test]
    fn missing_token_fails_when_validation_enabled() {
        let kb = KeyBuilder::new("user:{userId}:feed");
        assert!(matches!(
            kb.build(&HashMap::new()),
            Err(ConfigError::MissingToken { .. })
        ));
    }

    #[test]
    fn missing_token_left_unsubstituted_when_validation_disabled() {
        let kb = KeyBuilder::new("user:{userId}:feed").with_validation(false);
        let key = kb.build(&HashMap::new()).unwrap();
        assert_eq!(key, "user:{userId}:feed");
    }

    #[test]
    fn duplicate_token_is_rejected() {
        let kb = KeyBuilder::new("{id}:{id}");
        assert!(matches!(
            kb.build(&params(&[("id", "1")])),
            Err(ConfigError::DuplicateToken { .. })
        ));
    }

    #[test]
    fn prefix_is_applied_once() {
        let kb = KeyBuilder::new("{id}").with_prefix("test");
        let key = kb.build(&params(&[("id", "k")])).unwrap();
        assert_eq!(key, "test:k");
        // Already-prefixed keys are not double-prefixed.
        assert_eq!(kb.apply_prefix("test:k".to_string()), "test:k");
    }

    #[test]
    fn glob_wildcards_unresolved_tokens() {
        let kb = KeyBuilder::new("user:{userId}:feed:{page}");
        assert_eq!(kb.glob(&[("userId", "42")]), "user:42:feed:*");
    }

    #[test]
    fn pattern_parsing_and_glob_helpers() {
        let parsed = parse_pattern("user:session:42:abc").unwrap();
        assert_eq!(parsed.domain, "user");
        assert_eq!(parsed.structure_type, "session");
        assert_eq!(parsed.ids, vec!["42".to_string(), "abc".to_string()]);
        assert_eq!(build_glob("user", Some("session")), "user:session:*");
        assert_eq!(build_glob("user", None), "user:*");
    }
}
