//! Rule table types and compilation.
//!
//! A `RuleTable` is deserialized from TOML and holds the flat lists the
//! validator checks against: tool-name shape, shell allow-list and forbidden
//! patterns, sensitive paths, injection signatures, and code-snippet
//! patterns. `compile` turns it into regexes once, at
//! construction, so a bad pattern is a startup `Configuration` error rather
//! than a mid-task failure.
//!
//! Example:
//! ```toml
//! [shell]
//! allowed_commands = ["ls", "cat"]
//!
//! [[shell.forbidden]]
//! pattern = 'rm\s+-rf'
//! description = "recursive forced deletion"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use warden_contracts::error::{WardenError, WardenResult};

/// The rule table shipped with the crate.
pub const DEFAULT_RULES: &str = include_str!("../policies/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    pub tools: ToolRules,
    pub shell: ShellRules,
    pub paths: PathRules,
    pub browser: BrowserRules,
    pub scan: ScanRules,
    pub code: CodeRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRules {
    /// Shape every tool name must match.
    pub name_pattern: String,
    /// Namespaces a tool name must start with. Also selects the category checks.
    pub allowed_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellRules {
    /// Base commands (path stripped) that may run.
    pub allowed_commands: BTreeSet<String>,
    #[serde(default)]
    pub forbidden: Vec<ForbiddenPattern>,
}

/// A pattern that rejects a shell command wherever it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForbiddenPattern {
    pub pattern: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRules {
    /// Matched against the resolved path; rejected even inside an allowed root.
    pub sensitive: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserRules {
    pub max_xpath_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRules {
    pub injection: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRules {
    pub dangerous: Vec<String>,
    #[serde(default)]
    pub logged: Vec<String>,
}

impl RuleTable {
    /// Parse `s` as a TOML rule table.
    ///
    /// Returns `WardenError::Configuration` if the TOML is malformed or does
    /// not match the `RuleTable` schema.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s).map_err(|e| WardenError::Configuration {
            key: None,
            reason: format!("failed to parse rule table TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Configuration {
            key: None,
            reason: format!("failed to read rule table '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The embedded default table.
    pub fn builtin() -> WardenResult<Self> {
        Self::from_toml_str(DEFAULT_RULES)
    }

    /// Compile every pattern. Fails on the first pattern that does not compile,
    /// naming its location in the table.
    pub fn compile(&self) -> WardenResult<CompiledRules> {
        let forbidden = self
            .shell
            .forbidden
            .iter()
            .enumerate()
            .map(|(i, rule)| -> WardenResult<CompiledForbidden> {
                Ok(CompiledForbidden {
                    regex: compile(&format!("shell.forbidden[{}]", i), &rule.pattern)?,
                    description: rule.description.clone(),
                })
            })
            .collect::<WardenResult<Vec<_>>>()?;

        Ok(CompiledRules {
            tool_name: build("tools.name_pattern", &self.tools.name_pattern, false)?,
            tool_prefixes: self.tools.allowed_prefixes.clone(),
            allowed_commands: self.shell.allowed_commands.clone(),
            forbidden,
            sensitive_paths: compile_all("paths.sensitive", &self.paths.sensitive)?,
            max_xpath_length: self.browser.max_xpath_length,
            injection: compile_all("scan.injection", &self.scan.injection)?,
            dangerous_code: compile_all("code.dangerous", &self.code.dangerous)?,
            logged_code: compile_all("code.logged", &self.code.logged)?,
        })
    }
}

/// A rule table with every pattern compiled. All patterns except the tool
/// name shape match case-insensitively.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub tool_name: Regex,
    pub tool_prefixes: Vec<String>,
    pub allowed_commands: BTreeSet<String>,
    pub forbidden: Vec<CompiledForbidden>,
    pub sensitive_paths: Vec<Regex>,
    pub max_xpath_length: usize,
    pub injection: Vec<Regex>,
    pub dangerous_code: Vec<Regex>,
    pub logged_code: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct CompiledForbidden {
    pub regex: Regex,
    pub description: String,
}

fn compile(key: &str, pattern: &str) -> WardenResult<Regex> {
    build(key, pattern, true)
}

fn build(key: &str, pattern: &str, case_insensitive: bool) -> WardenResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| WardenError::config(key, format!("invalid pattern '{}': {}", pattern, e)))
}

fn compile_all(key: &str, patterns: &[String]) -> WardenResult<Vec<Regex>> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| compile(&format!("{}[{}]", key, i), p))
        .collect()
}
