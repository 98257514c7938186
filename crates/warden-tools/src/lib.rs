//! # warden-tools
//!
//! The tool registry and the built-in tools.
//!
//! [`ToolRegistry`] implements
//! [`ToolDispatcher`](warden_core::traits::ToolDispatcher): every call is
//! looked up, checked against the tool's argument schema, passed through the
//! `SecurityGate`, and only then handed to its [`ToolHandler`].
//!
//! ```rust,ignore
//! let validator = Arc::new(SecurityValidator::new(config.security.clone())?);
//! let registry = warden_tools::default_registry(validator)?;
//! let output = registry.execute("file_read", args).await?;
//! ```

pub mod builtin;
pub mod handler;
pub mod registry;
pub mod schema;

pub use builtin::{default_registry, register_builtin_tools};
pub use handler::{AsyncTool, HandlerError, HandlerResult, ToolHandler};
pub use registry::{ToolInfo, ToolMetadata, ToolRegistry};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};
    use tempfile::TempDir;
    use warden_contracts::config::SecurityConfig;
    use warden_contracts::error::{ToolErrorKind, ViolationType, WardenError, WardenResult};
    use warden_contracts::oracle::Arguments;
    use warden_core::traits::{SecurityGate, ToolDispatcher};
    use warden_policy::SecurityValidator;

    use crate::builtin::ShellExec;
    use crate::{default_registry, AsyncTool, ToolHandler, ToolMetadata, ToolRegistry};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Records every gate consultation; rejects one tool name.
    struct RecordingGate {
        seen: Arc<Mutex<Vec<String>>>,
        reject: Option<&'static str>,
    }

    impl SecurityGate for RecordingGate {
        fn check_tool_call(&self, tool_name: &str, _arguments: &Arguments) -> WardenResult<()> {
            self.seen.lock().unwrap().push(tool_name.to_string());
            if self.reject == Some(tool_name) {
                return Err(WardenError::security(
                    ViolationType::UnauthorizedTool,
                    "rejected by test gate",
                    tool_name,
                ));
            }
            Ok(())
        }
    }

    fn gated(reject: Option<&'static str>) -> (ToolRegistry, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(vec![]));
        let gate = RecordingGate {
            seen: seen.clone(),
            reject,
        };
        (ToolRegistry::new(Arc::new(gate)), seen)
    }

    fn path_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    }

    /// A blocking handler counting its invocations.
    fn counting(counter: Arc<AtomicUsize>) -> ToolHandler {
        ToolHandler::blocking(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!("ok"))
        })
    }

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    fn builtin(dir: &TempDir) -> (ToolRegistry, Arc<SecurityValidator>) {
        let config = SecurityConfig {
            allowed_base_paths: vec![dir.path().to_path_buf()],
            ..SecurityConfig::default()
        };
        let validator = Arc::new(SecurityValidator::new(config).unwrap());
        (default_registry(validator.clone()).unwrap(), validator)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[test]
    fn register_list_unregister() {
        let (registry, _) = gated(None);
        let counter = Arc::new(AtomicUsize::new(0));
        registry
            .register("file_b", counting(counter.clone()), path_schema(), ToolMetadata::new("b"))
            .unwrap();
        registry
            .register("file_a", counting(counter), path_schema(), ToolMetadata::new("a"))
            .unwrap();

        assert_eq!(registry.list(), vec!["file_a".to_string(), "file_b".to_string()]);
        assert_eq!(registry.schema_for("file_a"), Some(path_schema()));
        assert!(registry.schema_for("file_c").is_none());

        assert!(registry.unregister("file_a"));
        assert!(!registry.unregister("file_a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_bad_schema() {
        let (registry, _) = gated(None);
        let handler = ToolHandler::blocking(|_| Ok(Value::Null));
        match registry.register("file_x", handler, json!({ "type": "object" }), ToolMetadata::new("x")) {
            Err(WardenError::Validation { field, .. }) => assert_eq!(field, "schema"),
            other => panic!("expected Validation, got {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn reregistering_replaces_handler() {
        let (registry, _) = gated(None);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        registry
            .register("file_x", counting(first.clone()), path_schema(), ToolMetadata::new("x"))
            .unwrap();
        registry
            .register("file_x", counting(second.clone()), path_schema(), ToolMetadata::new("x2"))
            .unwrap();

        registry.execute("file_x", args(json!({ "path": "a" }))).await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.info("file_x").unwrap().metadata.description, "x2");
    }

    #[test]
    fn tool_specs_carry_description_and_schema() {
        let (registry, _) = gated(None);
        registry
            .register("file_x", counting(Arc::new(AtomicUsize::new(0))), path_schema(), ToolMetadata::new("reads x"))
            .unwrap();
        let specs = registry.tool_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "file_x");
        assert_eq!(specs[0].description, "reads x");
        assert_eq!(specs[0].input_schema, path_schema());
        assert_eq!(ToolDispatcher::tool_names(&registry), vec!["file_x".to_string()]);
    }

    // ── Execute pipeline ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_tool_fails_before_gate() {
        let (registry, seen) = gated(None);
        match registry.execute("file_missing", Arguments::new()).await {
            Err(WardenError::Tool { kind, tool_name, .. }) => {
                assert_eq!(kind, ToolErrorKind::UnknownTool);
                assert_eq!(tool_name, "file_missing");
            }
            other => panic!("expected Tool error, got {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_mismatch_fails_before_gate() {
        let (registry, seen) = gated(None);
        let counter = Arc::new(AtomicUsize::new(0));
        registry
            .register("file_x", counting(counter.clone()), path_schema(), ToolMetadata::new("x"))
            .unwrap();

        match registry.execute("file_x", args(json!({ "path": 3 }))).await {
            Err(WardenError::Validation { field, .. }) => assert_eq!(field, "path"),
            other => panic!("expected Validation, got {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gate_rejection_skips_handler() {
        let (registry, seen) = gated(Some("file_x"));
        let counter = Arc::new(AtomicUsize::new(0));
        registry
            .register("file_x", counting(counter.clone()), path_schema(), ToolMetadata::new("x"))
            .unwrap();

        match registry.execute("file_x", args(json!({ "path": "a" }))).await {
            Err(WardenError::Security { violation, .. }) => assert_eq!(violation, ViolationType::UnauthorizedTool),
            other => panic!("expected Security, got {:?}", other),
        }
        assert_eq!(*seen.lock().unwrap(), vec!["file_x".to_string()]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_call_returns_value() {
        let (registry, _) = gated(None);
        registry
            .register(
                "file_x",
                ToolHandler::blocking(|args| Ok(json!({ "echo": args["path"] }))),
                path_schema(),
                ToolMetadata::new("x"),
            )
            .unwrap();
        let output = registry.execute("file_x", args(json!({ "path": "a" }))).await.unwrap();
        assert_eq!(output.value, json!({ "echo": "a" }));
        assert_eq!(output.render(), r#"{"echo":"a"}"#);
    }

    // ── Built-in tools ────────────────────────────────────────────────────────

    #[test]
    fn builtin_registry_lists_every_tool() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        assert_eq!(
            registry.list(),
            vec![
                "browser_click",
                "browser_navigate",
                "file_list",
                "file_read",
                "file_write",
                "search_web",
                "shell_exec",
            ]
        );
        assert!(!registry.info("search_web").unwrap().metadata.implemented);
        assert!(registry.info("file_read").unwrap().metadata.implemented);
    }

    #[tokio::test]
    async fn file_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);

        let written = registry
            .execute("file_write", args(json!({ "path": "notes/todo.txt", "content": "buy milk" })))
            .await
            .unwrap();
        assert_eq!(written.value["bytes_written"], json!(8));
        assert_eq!(fs::read_to_string(dir.path().join("notes/todo.txt")).unwrap(), "buy milk");
        assert!(!dir.path().join("notes/todo.txt.tmp").exists());

        let read = registry
            .execute("file_read", args(json!({ "path": "notes/todo.txt" })))
            .await
            .unwrap();
        assert_eq!(read.render(), "buy milk");
    }

    #[tokio::test]
    async fn file_list_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let (registry, _) = builtin(&dir);

        let listed = registry.execute("file_list", Arguments::new()).await.unwrap();
        assert_eq!(
            listed.value,
            json!([
                { "name": "a.txt", "type": "file", "size": 1 },
                { "name": "b.txt", "type": "file", "size": 2 },
                { "name": "sub", "type": "directory", "size": 0 },
            ])
        );
    }

    #[tokio::test]
    async fn file_read_outside_root_is_security_error() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        match registry.execute("file_read", args(json!({ "path": "/etc/hostname" }))).await {
            Err(WardenError::Security { violation, .. }) => assert_eq!(violation, ViolationType::PathTraversal),
            other => panic!("expected Security, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn file_read_missing_is_execution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        match registry.execute("file_read", args(json!({ "path": "absent.txt" }))).await {
            Err(WardenError::Tool { kind, elapsed_ms, .. }) => {
                assert_eq!(kind, ToolErrorKind::ExecutionFailed);
                assert!(elapsed_ms.is_some());
            }
            other => panic!("expected Tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn placeholders_are_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        match registry.execute("search_web", args(json!({ "query": "rust" }))).await {
            Err(WardenError::Tool { kind, .. }) => assert_eq!(kind, ToolErrorKind::NotImplemented),
            other => panic!("expected Tool error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_exec_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        let output = registry
            .execute("shell_exec", args(json!({ "command": "echo hello" })))
            .await
            .unwrap();
        assert_eq!(output.value["stdout"], json!("hello\n"));
        assert_eq!(output.value["exit_code"], json!(0));
        assert_eq!(output.value["success"], json!(true));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_exec_requires_existing_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        let call = args(json!({ "command": "pwd", "working_directory": "missing" }));
        match registry.execute("shell_exec", call).await {
            Err(WardenError::Tool { kind, message, .. }) => {
                assert_eq!(kind, ToolErrorKind::ExecutionFailed);
                assert!(message.contains("missing"), "got: {message}");
            }
            other => panic!("expected Tool error, got {:?}", other),
        }
        assert!(!dir.path().join("missing").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_exec_rejects_unlisted_command() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = builtin(&dir);
        match registry.execute("shell_exec", args(json!({ "command": "rm -rf /" }))).await {
            Err(WardenError::Security { violation, .. }) => assert_eq!(violation, ViolationType::ForbiddenPattern),
            other => panic!("expected Security, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_exec_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (_, validator) = builtin(&dir);
        let tool = ShellExec::new(validator);
        let err = tool
            .call(args(json!({ "command": "sleep 5", "timeout": 1 })))
            .await
            .unwrap_err();
        match err.downcast::<WardenError>().map(|e| *e) {
            Ok(WardenError::Timeout { operation, timeout_secs }) => {
                assert_eq!(operation, "shell_command");
                assert_eq!(timeout_secs, 1);
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_exec_caps_output() {
        let dir = tempfile::tempdir().unwrap();
        let (_, validator) = builtin(&dir);
        let tool = ShellExec::new(validator);
        let value = tool
            .call(args(json!({ "command": "head -c 2000000 /dev/zero" })))
            .await
            .unwrap();
        assert_eq!(value["truncated"], json!(true));
        assert_eq!(value["stdout"].as_str().unwrap().len(), crate::builtin::MAX_OUTPUT_BYTES / 2);
    }
}
