//! The zero-trust security validator.
//!
//! `SecurityValidator` checks a proposed tool call against the compiled rule
//! table and the deployment's `SecurityConfig`, and implements the
//! `SecurityGate` trait from warden-core.
//!
//! Evaluation order, first failing rule wins:
//!
//! 1. Tool name must match the name pattern and start with an allowed prefix.
//! 2. Category checks, selected by prefix:
//!    - `shell_`   → `command`, `working_directory`
//!    - `file_`    → path-like keys, `content` size
//!    - `browser_` → `url`, `xpath`
//!    - `network_` → `url`, `domain`
//! 3. Generic scan of every string argument, nested values included:
//!    injection signatures are logged, over-long strings are rejected.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use warden_contracts::{
    config::SecurityConfig,
    error::{ViolationType, WardenError, WardenResult},
    oracle::Arguments,
};
use warden_core::traits::SecurityGate;

use crate::path;
use crate::rules::{CompiledRules, RuleTable};

/// Argument keys of file tools that carry a path.
const FILE_PATH_KEYS: &[&str] = &["path", "file_path", "source", "destination", "directory"];

/// Operators that start a new command within one shell line.
const SHELL_SEPARATORS: &[&str] = &["|", "||", "&&", ";", "&"];

/// Redirection operators whose following word names a file.
const REDIRECTS: &[&str] = &[">", ">>", "<", ">&", "<&", ">|"];

/// Every operator the line splitter recognises, longest first.
const SHELL_OPERATORS: &[&str] = &[
    "&&", "||", ">>", "<<", ">&", "<&", ">|", "|", "&", ";", "<", ">",
];

/// curl and wget flags that consume the following argument.
const DOWNLOAD_VALUE_FLAGS: &[&str] = &[
    "-H", "--header", "-d", "--data", "--data-raw", "--data-binary", "-X", "--request",
    "-A", "--user-agent", "-U", "-u", "--user", "-m", "--max-time", "-w", "--write-out",
    "-t", "--tries", "-T", "--timeout",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Shell,
    File,
    Browser,
    Network,
    Other,
}

impl Category {
    fn of(tool_name: &str) -> Self {
        if tool_name.starts_with("shell_") {
            Self::Shell
        } else if tool_name.starts_with("file_") {
            Self::File
        } else if tool_name.starts_with("browser_") {
            Self::Browser
        } else if tool_name.starts_with("network_") {
            Self::Network
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityValidator {
    rules: CompiledRules,
    config: SecurityConfig,
    /// Canonical forms of `config.allowed_base_paths`.
    allowed_roots: Vec<PathBuf>,
    working_directory: PathBuf,
}

impl SecurityValidator {
    /// A validator using the embedded default rule table.
    pub fn new(config: SecurityConfig) -> WardenResult<Self> {
        Self::with_rules(config, &RuleTable::builtin()?)
    }

    /// A validator using `table` in place of the default rules.
    ///
    /// Returns `WardenError::Configuration` if any pattern fails to compile.
    pub fn with_rules(config: SecurityConfig, table: &RuleTable) -> WardenResult<Self> {
        let rules = table.compile()?;
        let root = Path::new("/");
        let allowed_roots: Vec<PathBuf> = config
            .allowed_base_paths
            .iter()
            .map(|p| path::resolve(p, root))
            .collect();
        let working_directory = path::resolve(&config.effective_working_directory(), root);

        info!(
            roots = allowed_roots.len(),
            commands = rules.allowed_commands.len(),
            forbidden_patterns = rules.forbidden.len(),
            domains = config.allowed_domains.len(),
            "security validator initialized"
        );

        Ok(Self {
            rules,
            config,
            allowed_roots,
            working_directory,
        })
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    // ── Tool calls ───────────────────────────────────────────────────────────

    /// Validate a proposed call. Returns normally or fails with
    /// `WardenError::Security`.
    pub fn validate_tool_call(&self, tool_name: &str, arguments: &Arguments) -> WardenResult<()> {
        debug!(tool = %tool_name, arguments = arguments.len(), "validating tool call");

        if !self.is_allowed_tool_name(tool_name) {
            return Err(reject(
                ViolationType::UnauthorizedTool,
                format!("tool '{}' is not allowed", tool_name),
                Some(tool_name),
            ));
        }

        match Category::of(tool_name) {
            Category::Shell => self.validate_shell_arguments(arguments)?,
            Category::File => {
                let operation = tool_name.strip_prefix("file_").unwrap_or("access");
                self.validate_file_arguments(arguments, operation)?
            }
            Category::Browser => self.validate_browser_arguments(arguments)?,
            Category::Network => self.validate_network_arguments(arguments)?,
            Category::Other => {}
        }

        self.scan_arguments(arguments)
    }

    fn is_allowed_tool_name(&self, tool_name: &str) -> bool {
        self.rules.tool_name.is_match(tool_name)
            && self
                .rules
                .tool_prefixes
                .iter()
                .any(|prefix| tool_name.starts_with(prefix.as_str()))
    }

    fn validate_shell_arguments(&self, arguments: &Arguments) -> WardenResult<()> {
        if let Some(command) = string_arg(arguments, "command", ViolationType::InvalidCommand)? {
            self.validate_shell_command(command)?;
        }
        if let Some(dir) = string_arg(arguments, "working_directory", ViolationType::InvalidPath)? {
            self.validate_file_path(dir, "access")?;
        }
        Ok(())
    }

    fn validate_file_arguments(&self, arguments: &Arguments, operation: &str) -> WardenResult<()> {
        for key in FILE_PATH_KEYS {
            if let Some(p) = string_arg(arguments, key, ViolationType::InvalidPath)? {
                self.validate_file_path(p, operation)?;
            }
        }
        if let Some(Value::String(content)) = arguments.get("content") {
            let limit = self.config.max_file_size_bytes();
            if content.len() as u64 > limit {
                return Err(reject(
                    ViolationType::OversizedContent,
                    format!(
                        "file content of {} bytes exceeds the {} MB limit",
                        content.len(),
                        self.config.max_file_size_mb
                    ),
                    None,
                ));
            }
        }
        Ok(())
    }

    fn validate_browser_arguments(&self, arguments: &Arguments) -> WardenResult<()> {
        if let Some(url) = string_arg(arguments, "url", ViolationType::InvalidUrl)? {
            self.validate_network_request(url)?;
        }
        match arguments.get("xpath") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(xpath)) if xpath.chars().count() <= self.rules.max_xpath_length => {
                Ok(())
            }
            Some(_) => Err(reject(
                ViolationType::InvalidXpath,
                format!(
                    "xpath must be a string of at most {} characters",
                    self.rules.max_xpath_length
                ),
                None,
            )),
        }
    }

    fn validate_network_arguments(&self, arguments: &Arguments) -> WardenResult<()> {
        if let Some(url) = string_arg(arguments, "url", ViolationType::InvalidUrl)? {
            self.validate_network_request(url)?;
        }
        if let Some(domain) = string_arg(arguments, "domain", ViolationType::UnauthorizedDomain)? {
            let domain = domain.trim().to_ascii_lowercase();
            if !self.is_allowed_domain(&domain) {
                return Err(reject(
                    ViolationType::UnauthorizedDomain,
                    format!("domain '{}' is not in the allowed list", domain),
                    Some(&domain),
                ));
            }
        }
        Ok(())
    }

    fn scan_arguments(&self, arguments: &Arguments) -> WardenResult<()> {
        for (key, value) in arguments {
            self.scan_value(key, value)?;
        }
        Ok(())
    }

    fn scan_value(&self, key: &str, value: &Value) -> WardenResult<()> {
        match value {
            Value::String(s) => {
                if let Some(signature) = self.rules.injection.iter().find(|r| r.is_match(s)) {
                    warn!(argument = %key, pattern = %signature.as_str(), "argument matches injection signature");
                }
                if s.chars().count() > self.config.max_argument_length {
                    return Err(reject(
                        ViolationType::OversizedArgument,
                        format!(
                            "argument '{}' exceeds maximum length of {} characters",
                            key, self.config.max_argument_length
                        ),
                        None,
                    ));
                }
                Ok(())
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.scan_value(&format!("{}[{}]", key, i), item)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                for (k, v) in map {
                    self.scan_value(&format!("{}.{}", key, k), v)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ── Shell ────────────────────────────────────────────────────────────────

    /// Validate one shell command line.
    ///
    /// The line is split at unquoted control operators (`|`, `||`, `&&`,
    /// `;`, `&`). Every command in it must have an allow-listed base
    /// command, and every redirection target must pass the file-path check.
    /// Control characters such as newlines are rejected outright.
    pub fn validate_shell_command(&self, command: &str) -> WardenResult<()> {
        if command.trim().is_empty() {
            return Err(reject(ViolationType::EmptyCommand, "empty command not allowed", None));
        }

        if command.chars().any(|c| c.is_control() && c != '\t') {
            return Err(reject(
                ViolationType::InvalidCommand,
                "command contains a control character",
                Some(command),
            ));
        }

        if let Some(rule) = self.rules.forbidden.iter().find(|r| r.regex.is_match(command)) {
            return Err(reject(
                ViolationType::ForbiddenPattern,
                format!(
                    "command contains forbidden pattern '{}' ({})",
                    rule.regex.as_str(),
                    rule.description
                ),
                Some(command),
            ));
        }

        let pieces = split_operators(command).map_err(|e| {
            reject(
                ViolationType::ParseError,
                format!("failed to parse command: {}", e),
                Some(command),
            )
        })?;

        let mut argv: Vec<String> = Vec::new();
        let mut pending_redirect: Option<&str> = None;
        for piece in pieces {
            match piece {
                Piece::Text(text) => {
                    let mut words = shell_words::split(text)
                        .map_err(|e| {
                            reject(
                                ViolationType::ParseError,
                                format!("failed to parse command: {}", e),
                                Some(command),
                            )
                        })?
                        .into_iter();
                    if let Some(op) = pending_redirect.take() {
                        let target = words.next().ok_or_else(|| missing_target(op, command))?;
                        self.validate_redirect(op, &target, command)?;
                    }
                    argv.extend(words);
                }
                Piece::Op(op) if REDIRECTS.contains(&op) => {
                    if pending_redirect.is_some() {
                        return Err(missing_target(op, command));
                    }
                    pending_redirect = Some(op);
                }
                Piece::Op(op) if SHELL_SEPARATORS.contains(&op) => {
                    if let Some(pending) = pending_redirect {
                        return Err(missing_target(pending, command));
                    }
                    self.validate_segment(&argv, command)?;
                    argv.clear();
                }
                Piece::Op(op) => {
                    return Err(reject(
                        ViolationType::InvalidCommand,
                        format!("operator '{}' is not allowed", op),
                        Some(command),
                    ));
                }
            }
        }
        if let Some(pending) = pending_redirect {
            return Err(missing_target(pending, command));
        }
        self.validate_segment(&argv, command)
    }

    /// Allow-list check for one command between separators.
    fn validate_segment(&self, argv: &[String], command: &str) -> WardenResult<()> {
        let Some((program, args)) = argv.split_first() else {
            return Err(reject(
                ViolationType::InvalidCommand,
                "empty command between separators",
                Some(command),
            ));
        };
        let base = program.rsplit('/').next().unwrap_or(program.as_str());
        if !self.rules.allowed_commands.contains(base) {
            return Err(reject(
                ViolationType::UnauthorizedCommand,
                format!("command '{}' is not in the allowed list", base),
                Some(command),
            ));
        }
        self.validate_specific_command(base, args, command)
    }

    /// A redirection target must pass the same checks as a file tool's path.
    /// Descriptor duplication (`2>&1`) names no file.
    fn validate_redirect(&self, op: &str, target: &str, command: &str) -> WardenResult<()> {
        let duplicates_fd = matches!(op, ">&" | "<&")
            && (target == "-" || target.chars().all(|c| c.is_ascii_digit()));
        if duplicates_fd {
            return Ok(());
        }
        if target.starts_with('~') || target.contains(['$', '*', '?', '[']) {
            return Err(reject(
                ViolationType::InvalidPath,
                format!("redirection target '{}' must be a literal path", target),
                Some(command),
            ));
        }
        let operation = if op.starts_with('<') { "read" } else { "write" };
        self.validate_file_path(target, operation).map(|_| ())
    }

    fn validate_specific_command(&self, base: &str, args: &[String], command: &str) -> WardenResult<()> {
        match base {
            "git" => {
                let mutates_config = matches!(args.first().map(String::as_str), Some("config" | "remote"));
                if mutates_config && args.iter().any(|a| a == "--global") {
                    return Err(reject(
                        ViolationType::UnauthorizedGitOperation,
                        "global git configuration changes not allowed",
                        Some(command),
                    ));
                }
            }
            "curl" | "wget" => self.validate_download(base, args)?,
            "python" | "python3" => {
                let payload = args
                    .iter()
                    .position(|a| a == "-c" || a == "--command")
                    .and_then(|i| args.get(i + 1));
                if let Some(code) = payload {
                    self.validate_code_snippet(code)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Every URL a downloader may fetch must pass the network check, and
    /// every file it may write must pass the file-path check. Bare hosts
    /// such as `example.com/x` are checked as `http` URLs.
    fn validate_download(&self, base: &str, args: &[String]) -> WardenResult<()> {
        let output_flags: &[&str] = if base == "curl" {
            &["-o", "--output"]
        } else {
            &["-O", "--output-document", "-o", "--output-file", "-P", "--directory-prefix"]
        };

        let mut rest = args.iter();
        while let Some(arg) = rest.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if arg.starts_with("--") => (flag, Some(value)),
                _ => (arg.as_str(), None),
            };
            let mut value = || inline.or_else(|| rest.next().map(String::as_str));

            if flag == "--url" {
                if let Some(url) = value() {
                    self.validate_download_url(url)?;
                }
            } else if output_flags.contains(&flag) {
                if let Some(path) = value() {
                    if path != "-" {
                        self.validate_file_path(path, "write")?;
                    }
                }
            } else if DOWNLOAD_VALUE_FLAGS.contains(&flag) {
                value();
            } else if flag.starts_with('-') {
                continue;
            } else if arg.contains(['.', '/']) {
                self.validate_download_url(arg)?;
            }
        }
        Ok(())
    }

    fn validate_download_url(&self, candidate: &str) -> WardenResult<()> {
        if candidate.contains("://") {
            self.validate_network_request(candidate)
        } else {
            self.validate_network_request(&format!("http://{}", candidate))
        }
    }

    /// Check an interpreter `-c` payload. Dangerous imports and calls are
    /// rejected; file I/O idioms are only logged.
    pub fn validate_code_snippet(&self, code: &str) -> WardenResult<()> {
        if code.trim().is_empty() {
            return Ok(());
        }
        if let Some(pattern) = self.rules.dangerous_code.iter().find(|r| r.is_match(code)) {
            let preview: String = code.chars().take(100).collect();
            return Err(reject(
                ViolationType::DangerousCode,
                format!("code contains dangerous pattern '{}'", pattern.as_str()),
                Some(&format!("execute code: {}", preview)),
            ));
        }
        for pattern in self.rules.logged_code.iter().filter(|r| r.is_match(code)) {
            warn!(pattern = %pattern.as_str(), "code snippet performs file I/O");
        }
        Ok(())
    }

    // ── Files ────────────────────────────────────────────────────────────────

    /// Resolve `path` and check it lies under an allowed root and matches no
    /// sensitive pattern. Returns the resolved absolute path.
    ///
    /// Relative paths resolve against the configured working directory.
    /// The target need not exist.
    pub fn validate_file_path(&self, path: &str, operation: &str) -> WardenResult<PathBuf> {
        if path.trim().is_empty() {
            return Err(reject(ViolationType::EmptyPath, "empty path not allowed", None));
        }
        let attempted = format!("{} {}", operation, path);
        if path.contains('\0') {
            return Err(reject(
                ViolationType::InvalidPath,
                "path contains a NUL byte",
                Some(&attempted),
            ));
        }

        let resolved = path::resolve(Path::new(path), &self.working_directory);

        if !self.allowed_roots.iter().any(|root| path::is_within(&resolved, root)) {
            return Err(reject(
                ViolationType::PathTraversal,
                format!(
                    "path '{}' resolves to '{}', outside the allowed directories",
                    path,
                    resolved.display()
                ),
                Some(&attempted),
            ));
        }

        let text = resolved.to_string_lossy();
        if let Some(pattern) = self.rules.sensitive_paths.iter().find(|r| r.is_match(&text)) {
            return Err(reject(
                ViolationType::SensitiveFileAccess,
                format!(
                    "access to sensitive file '{}' is not allowed (matches '{}')",
                    path,
                    pattern.as_str()
                ),
                Some(&attempted),
            ));
        }

        Ok(resolved)
    }

    // ── Network ──────────────────────────────────────────────────────────────

    /// Check scheme, port, and host of `raw` against the allow-lists.
    pub fn validate_network_request(&self, raw: &str) -> WardenResult<()> {
        let attempted = format!("request {}", raw);
        let url = Url::parse(raw).map_err(|e| {
            reject(
                ViolationType::InvalidUrl,
                format!("failed to parse URL '{}': {}", raw, e),
                Some(&attempted),
            )
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(reject(
                ViolationType::UnauthorizedProtocol,
                format!("protocol '{}' is not allowed", url.scheme()),
                Some(&attempted),
            ));
        }

        if let Some(port) = url.port() {
            if self.config.blocked_ports.contains(&port) {
                return Err(reject(
                    ViolationType::BlockedPort,
                    format!("port {} is blocked", port),
                    Some(&attempted),
                ));
            }
        }

        let host = url
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .ok_or_else(|| {
                reject(ViolationType::InvalidUrl, format!("URL '{}' has no host", raw), Some(&attempted))
            })?;
        if !self.is_allowed_domain(&host) {
            return Err(reject(
                ViolationType::UnauthorizedDomain,
                format!("domain '{}' is not in the allowed list", host),
                Some(&attempted),
            ));
        }
        Ok(())
    }

    /// Exact match or subdomain of an allowed domain.
    fn is_allowed_domain(&self, host: &str) -> bool {
        self.config.allowed_domains.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

impl SecurityGate for SecurityValidator {
    fn check_tool_call(&self, tool_name: &str, arguments: &Arguments) -> WardenResult<()> {
        self.validate_tool_call(tool_name, arguments)
    }
}

/// The string value of `key`, if present. A non-string value is rejected
/// with `violation`.
fn string_arg<'a>(
    arguments: &'a Arguments,
    key: &str,
    violation: ViolationType,
) -> WardenResult<Option<&'a str>> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(reject(
            violation,
            format!("argument '{}' must be a string", key),
            None,
        )),
    }
}

fn missing_target(op: &str, command: &str) -> WardenError {
    reject(
        ViolationType::InvalidCommand,
        format!("redirection '{}' has no target", op),
        Some(command),
    )
}

/// A run of shell words, or one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Op(&'static str),
}

/// Split a command line at operators that are not quoted or escaped.
///
/// Quote removal is left to `shell_words` on each text piece.
fn split_operators(command: &str) -> Result<Vec<Piece<'_>>, &'static str> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let bytes = command.as_bytes();
    let mut pieces = Vec::new();
    let mut quote = Quote::None;
    let mut text_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Quote::Single, b'\'') | (Quote::Double, b'"') => quote = Quote::None,
            (Quote::Single, _) => {}
            (Quote::Double, b'\\') | (Quote::None, b'\\') => i += 1,
            (Quote::Double, _) => {}
            (Quote::None, b'\'') => quote = Quote::Single,
            (Quote::None, b'"') => quote = Quote::Double,
            (Quote::None, _) => {
                let rest = &bytes[i..];
                if let Some(op) = SHELL_OPERATORS.iter().find(|op| rest.starts_with(op.as_bytes())) {
                    if text_start < i {
                        pieces.push(Piece::Text(&command[text_start..i]));
                    }
                    pieces.push(Piece::Op(*op));
                    i += op.len();
                    text_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    if quote != Quote::None {
        return Err("unterminated quote");
    }
    if text_start < bytes.len() {
        pieces.push(Piece::Text(&command[text_start..]));
    }
    Ok(pieces)
}

fn reject(violation: ViolationType, message: impl Into<String>, attempted: Option<&str>) -> WardenError {
    let message = message.into();
    warn!(violation = %violation, attempted = attempted.unwrap_or(""), "security check failed: {}", message);
    WardenError::Security {
        violation,
        message,
        attempted_action: attempted.map(String::from),
    }
}
