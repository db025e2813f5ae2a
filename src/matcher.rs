use regex::{Regex, RegexBuilder};

use crate::error::{FinError, Result};
use crate::normalizer::normalize_establishment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Contains,
    StartsWith,
    Exact,
    Regex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Exact => "exact",
            Self::Regex => "regex",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "exact" => Ok(Self::Exact),
            "regex" => Ok(Self::Regex),
            other => Err(FinError::invalid("match type", other)),
        }
    }
}

/// A compiled rule pattern. Text patterns compare against the normalized merchant;
/// regexes run case-insensitively against both the raw description and the normalized merchant.
#[derive(Debug, Clone)]
pub enum Matcher {
    Text(MatchType, String),
    Regex(Regex),
}

impl Matcher {
    pub fn compile(pattern: &str, match_type: MatchType) -> Result<Self> {
        match match_type {
            MatchType::Regex => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(Self::Regex)
                .map_err(|e| FinError::invalid("regex", format!("{pattern}: {e}"))),
            other => {
                let normalized = normalize_establishment(pattern);
                if normalized.is_empty() {
                    return Err(FinError::invalid("pattern", pattern));
                }
                Ok(Self::Text(other, normalized))
            }
        }
    }

    pub fn is_match(&self, establishment: &str, description: &str) -> bool {
        match self {
            Self::Text(MatchType::Contains, p) => establishment.contains(p.as_str()),
            Self::Text(MatchType::StartsWith, p) => establishment.starts_with(p.as_str()),
            Self::Text(_, p) => establishment == p,
            Self::Regex(re) => re.is_match(description) || re.is_match(establishment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(establishment: &str, pattern: &str, match_type: MatchType) -> bool {
        let m = Matcher::compile(pattern, match_type).unwrap();
        m.is_match(&normalize_establishment(establishment), establishment)
    }

    #[test]
    fn test_contains() {
        assert!(matches("Supermercado Pão de Açúcar", "pao de acucar", MatchType::Contains));
        assert!(!matches("Padaria", "acucar", MatchType::Contains));
    }

    #[test]
    fn test_starts_with() {
        assert!(matches("UBER *TRIP", "uber", MatchType::StartsWith));
        assert!(!matches("PAG UBER", "UBER", MatchType::StartsWith));
    }

    #[test]
    fn test_exact() {
        assert!(matches("Netflix.com", "NETFLIX COM", MatchType::Exact));
        assert!(!matches("Netflix.com BR", "NETFLIX COM", MatchType::Exact));
    }

    #[test]
    fn test_regex() {
        assert!(matches("PIX ENVIADO 123456", r"^pix enviado \d+$", MatchType::Regex));
        assert!(!matches("TED 123", r"^pix", MatchType::Regex));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(Matcher::compile("(unclosed", MatchType::Regex).is_err());
        assert!(Matcher::compile(" - ", MatchType::Contains).is_err());
        assert!(MatchType::parse("fuzzy").is_err());
    }
}
