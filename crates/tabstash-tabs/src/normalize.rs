//! URL normalization rules
//!
//! Rules rewrite a tab's URL into the canonical form used as its dedup key.
//! They run in order; disabled rules and rules whose domain filter does not
//! match are skipped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationRule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Exact host, or `*.example.com` for a domain and all its subdomains
    #[serde(default)]
    pub domain: Option<String>,
    pub action: NormalizationAction,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NormalizationAction {
    /// Drop the named query parameters; a trailing `*` matches a prefix
    RemoveQueryParams { params: Vec<String> },
    RemoveQuery,
    RemoveFragment,
    /// Regex replacement over the whole URL
    Replace { pattern: String, replacement: String },
}

impl NormalizationRule {
    pub fn new(name: impl Into<String>, action: NormalizationAction) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            domain: None,
            action,
        }
    }

    pub fn for_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    fn applies_to(&self, url: &Url) -> bool {
        if !self.enabled {
            return false;
        }
        match (&self.domain, url.host_str()) {
            (None, _) => true,
            (Some(pattern), Some(host)) => domain_matches(host, pattern),
            (Some(_), None) => false,
        }
    }

    /// The rewritten URL, or `None` when the rule leaves it unchanged.
    fn apply(&self, mut url: Url) -> Option<String> {
        match &self.action {
            NormalizationAction::RemoveQueryParams { params } => remove_query_params(url, params),
            NormalizationAction::RemoveQuery => {
                url.query()?;
                url.set_query(None);
                Some(url.to_string())
            }
            NormalizationAction::RemoveFragment => {
                url.fragment()?;
                url.set_fragment(None);
                Some(url.to_string())
            }
            NormalizationAction::Replace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(re) if re.is_match(url.as_str()) => {
                    Some(re.replace_all(url.as_str(), replacement.as_str()).into_owned())
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(rule = %self.name, error = %e, "Skipping rule with invalid pattern");
                    None
                }
            },
        }
    }
}

pub fn normalize_url(url: &str, rules: &[NormalizationRule]) -> String {
    let mut current = url.to_string();

    for rule in rules {
        let Ok(parsed) = Url::parse(&current) else {
            return current;
        };
        if !rule.applies_to(&parsed) {
            continue;
        }
        if let Some(rewritten) = rule.apply(parsed) {
            current = rewritten;
        }
    }

    current
}

fn domain_matches(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{base}")),
        None => host == pattern,
    }
}

fn param_matches(key: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| match p.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == p,
    })
}

fn remove_query_params(mut url: Url, params: &[String]) -> Option<String> {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !param_matches(k, params))
        .collect();

    if kept.len() == pairs.len() {
        return None;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Some(url.to_string())
}
