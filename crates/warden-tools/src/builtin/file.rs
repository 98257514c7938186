use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};

use warden_contracts::{error::WardenResult, oracle::Arguments};
use warden_policy::SecurityValidator;

use super::str_arg;
use crate::handler::{HandlerResult, ToolHandler};
use crate::registry::{ToolMetadata, ToolRegistry};

pub(super) fn register(registry: &ToolRegistry, validator: &Arc<SecurityValidator>) -> WardenResult<()> {
    let v = Arc::clone(validator);
    registry.register(
        "file_read",
        ToolHandler::blocking(move |args| read(&v, &args)),
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read" }
            },
            "required": ["path"]
        }),
        ToolMetadata::new("Read a UTF-8 text file"),
    )?;

    let v = Arc::clone(validator);
    registry.register(
        "file_write",
        ToolHandler::blocking(move |args| write(&v, &args)),
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to write" },
                "content": { "type": "string", "description": "Full new contents" }
            },
            "required": ["path", "content"]
        }),
        ToolMetadata::new("Write a text file, replacing it atomically"),
    )?;

    let v = Arc::clone(validator);
    registry.register(
        "file_list",
        ToolHandler::blocking(move |args| list(&v, &args)),
        json!({
            "type": "object",
            "properties": {
                "directory": { "type": "string", "description": "Directory to list; defaults to the working directory" }
            }
        }),
        ToolMetadata::new("List the entries of a directory"),
    )?;
    Ok(())
}

fn read(validator: &SecurityValidator, args: &Arguments) -> HandlerResult {
    let path = validator.validate_file_path(str_arg(args, "path")?, "read")?;
    let meta = fs::metadata(&path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    if !meta.is_file() {
        return Err(format!("'{}' is not a regular file", path.display()).into());
    }
    let limit = validator.config().max_file_size_bytes();
    if meta.len() > limit {
        return Err(format!(
            "'{}' is {} bytes, over the {} MB limit",
            path.display(),
            meta.len(),
            validator.config().max_file_size_mb
        )
        .into());
    }
    let content = fs::read_to_string(&path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    Ok(Value::String(content))
}

/// Temp file in the target directory, then rename over the target.
fn write(validator: &SecurityValidator, args: &Arguments) -> HandlerResult {
    let path = validator.validate_file_path(str_arg(args, "path")?, "write")?;
    let content = str_arg(args, "content")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().ok_or("path has no file name")?.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, content).map_err(|e| format!("cannot write '{}': {}", tmp.display(), e))?;
    fs::rename(&tmp, &path).map_err(|e| format!("cannot replace '{}': {}", path.display(), e))?;

    Ok(json!({
        "path": path.display().to_string(),
        "bytes_written": content.len(),
    }))
}

fn list(validator: &SecurityValidator, args: &Arguments) -> HandlerResult {
    let requested = match args.get("directory") {
        Some(_) => str_arg(args, "directory")?,
        None => ".",
    };
    let dir = validator.validate_file_path(requested, "list")?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| format!("cannot list '{}': {}", dir.display(), e))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let kind = if file_type.is_dir() {
            "directory"
        } else if file_type.is_symlink() {
            "symlink"
        } else {
            "file"
        };
        let size = if file_type.is_file() { entry.metadata()?.len() } else { 0 };
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "type": kind,
            "size": size,
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    Ok(Value::Array(entries))
}
