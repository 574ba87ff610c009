// ─── Platform Rules ───
// Shared evaluator for library and argument rule lists.

use serde::{Deserialize, Serialize};

/// Operating system names as spelled in version metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Osx,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Osx
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Osx => "osx",
            Platform::Linux => "linux",
        }
    }

    /// Value substituted for `${arch}` in native classifiers.
    pub fn arch_bits() -> &'static str {
        if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    /// Kept for round-tripping; feature flags are not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Rule {
    fn matches(&self, platform: Platform) -> bool {
        match self.os.as_ref().and_then(|os| os.name.as_deref()) {
            None | Some("") => true,
            Some(name) => name == platform.as_str(),
        }
    }
}

/// Evaluate a rule list for `platform`.
///
/// An empty list allows. Otherwise the verdict starts as disallowed and
/// every matching rule overwrites it, so the last match wins.
pub fn rules_allow(rules: &[Rule], platform: Platform) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules.iter().filter(|r| r.matches(platform)) {
        allowed = rule.action == RuleAction::Allow;
    }
    allowed
}
