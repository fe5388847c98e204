//! `specify-mcp init`: register this server with the MCP clients installed on the machine.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

pub const SERVER_NAME: &str = "specify";

/// Write project-scoped MCP config files in `cwd` so that Claude Code and/or
/// Codex discover specify-mcp in this project. Only installed clients get a config.
pub fn init_project(cwd: &Path) -> Result<()> {
    let binary_path = std::env::current_exe()
        .and_then(|p| p.canonicalize())
        .context("locating the specify-mcp binary")?
        .to_string_lossy()
        .to_string();

    let has_claude = which("claude");
    let has_codex = which("codex");
    if !has_claude && !has_codex {
        bail!(
            "neither `claude` nor `codex` found in PATH; install Claude Code or OpenAI Codex, then re-run `specify-mcp init`"
        );
    }

    let mut clients = Vec::new();
    if has_claude {
        write_claude_config(cwd, &binary_path)?;
        clients.push("Claude Code");
    }
    if has_codex {
        write_codex_config(cwd, &binary_path)?;
        clients.push("Codex");
    }
    info!("{} will use specify in this project", clients.join(" and "));
    Ok(())
}

fn which(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

/// Merge a server entry into `.mcp.json`, keeping any other servers.
pub fn write_claude_config(cwd: &Path, binary_path: &str) -> Result<()> {
    let path = cwd.join(".mcp.json");
    let mut root: serde_json::Value = if path.exists() {
        let contents =
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };
    if !root.is_object() {
        root = serde_json::json!({});
    }

    if !root.get("mcpServers").is_some_and(|v| v.is_object()) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_NAME] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote Claude Code config");
    Ok(())
}

/// Merge a server table into `.codex/config.toml`, preserving formatting of the rest.
pub fn write_codex_config(cwd: &Path, binary_path: &str) -> Result<()> {
    let dir = cwd.join(".codex");
    let path = dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = if path.exists() {
        std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?
            .parse()
            .unwrap_or_default()
    } else {
        toml_edit::DocumentMut::new()
    };

    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    doc["mcp_servers"][SERVER_NAME] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::write(&path, doc.to_string()).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote Codex config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_config_keeps_other_servers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".mcp.json"),
            r#"{"mcpServers": {"other": {"command": "x"}}}"#,
        )
        .unwrap();
        write_claude_config(dir.path(), "/bin/specify-mcp").unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
        let root: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(root["mcpServers"]["other"]["command"], "x");
        assert_eq!(root["mcpServers"]["specify"]["command"], "/bin/specify-mcp");
        assert_eq!(root["mcpServers"]["specify"]["type"], "stdio");
    }

    #[test]
    fn codex_config_merges_into_existing_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".codex")).unwrap();
        std::fs::write(
            dir.path().join(".codex/config.toml"),
            "model = \"o3\"\n\n[mcp_servers.other]\ncommand = \"x\"\n",
        )
        .unwrap();
        write_codex_config(dir.path(), "/bin/specify-mcp").unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".codex/config.toml")).unwrap();
        let doc: toml_edit::DocumentMut = raw.parse().unwrap();
        assert_eq!(doc["model"].as_str(), Some("o3"));
        assert_eq!(doc["mcp_servers"]["other"]["command"].as_str(), Some("x"));
        assert_eq!(doc["mcp_servers"]["specify"]["command"].as_str(), Some("/bin/specify-mcp"));
    }
}
