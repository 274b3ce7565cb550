//! Templated name-server control commands (`rndc addzone`, `reload`,
//! `delzone`) and the runner that executes them.

use crate::config::CommandTemplates;
use crate::error::CommandError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Executes a fully rendered command line
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command_line: &str) -> Result<(), CommandError>;
}

/// Runs command lines through `sh -c` and waits for exit
#[derive(Debug, Default, Clone)]
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command_line: &str) -> Result<(), CommandError> {
        debug!("Running: {}", command_line);
        let output = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .output()
            .await
            .map_err(|e| CommandError::Spawn {
                command: command_line.to_string(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!("stderr of `{}`: {}", command_line, stderr.trim());
            }
            Err(CommandError::Failed {
                command: command_line.to_string(),
                status: output.status.to_string(),
            })
        }
    }
}

/// A format string with positional `%N$s` placeholders (1-based); `%%` is a
/// literal percent sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    text: String,
}

impl CommandTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Check placeholder syntax and that no placeholder exceeds `max_args`
    pub fn validate(&self, max_args: usize) -> Result<(), String> {
        for piece in self.pieces() {
            match piece {
                Piece::Arg(index) if index == 0 || index > max_args => {
                    return Err(format!(
                        "placeholder %{}$s out of range (1..={})",
                        index, max_args
                    ));
                }
                Piece::Invalid(text) => {
                    return Err(format!("malformed placeholder '{}'", text));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Substitute positional arguments. Arguments are inserted verbatim, so
    /// callers escape them first where needed.
    pub fn render(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.text.len() + 64);
        for piece in self.pieces() {
            match piece {
                Piece::Text(text) | Piece::Invalid(text) => out.push_str(text),
                Piece::Percent => out.push('%'),
                Piece::Arg(index) => {
                    if let Some(arg) = index.checked_sub(1).and_then(|i| args.get(i)) {
                        out.push_str(arg);
                    }
                }
            }
        }
        out
    }

    fn pieces(&self) -> Vec<Piece<'_>> {
        let text = self.text.as_str();
        let mut pieces = Vec::new();
        let mut literal_start = 0;
        let mut pos = 0;

        while let Some(offset) = text[pos..].find('%') {
            let start = pos + offset;
            if start > literal_start {
                pieces.push(Piece::Text(&text[literal_start..start]));
            }

            let rest = &text[start + 1..];
            if rest.starts_with('%') {
                pieces.push(Piece::Percent);
                pos = start + 2;
            } else {
                let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
                let after = &rest[digits..];
                if digits > 0 && after.starts_with("$s") {
                    let index = rest[..digits].parse().unwrap_or(0);
                    pieces.push(Piece::Arg(index));
                    pos = start + 1 + digits + 2;
                } else {
                    let end = start + 1 + digits + after.chars().next().map_or(0, char::len_utf8);
                    pieces.push(Piece::Invalid(&text[start..end]));
                    pos = end;
                }
            }
            literal_start = pos;
        }

        if literal_start < text.len() {
            pieces.push(Piece::Text(&text[literal_start..]));
        }
        pieces
    }
}

enum Piece<'a> {
    Text(&'a str),
    Percent,
    Arg(usize),
    Invalid(&'a str),
}

/// Quote an argument for `sh`. Arguments made only of
/// `[A-Za-z0-9._/-]` are returned unchanged.
pub fn shell_escape(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Allow-transfer list for `rndc addzone`: addresses joined with `"; "`,
/// or `none` when empty
pub fn format_acl<'a>(addresses: impl IntoIterator<Item = &'a IpAddr>) -> String {
    let joined = addresses
        .into_iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

/// The three name-server control commands bound to a runner.
///
/// Failures are logged and swallowed: the zone file on disk stays the source
/// of truth and the next reload reconciles the server.
#[derive(Clone)]
pub struct ZoneCommands {
    add: CommandTemplate,
    reload: CommandTemplate,
    delete: CommandTemplate,
    runner: Arc<dyn CommandRunner>,
}

impl ZoneCommands {
    pub fn new(templates: &CommandTemplates, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            add: CommandTemplate::new(templates.add.clone()),
            reload: CommandTemplate::new(templates.reload.clone()),
            delete: CommandTemplate::new(templates.delete.clone()),
            runner,
        }
    }

    /// Add the zone, passing its allow-transfer list
    pub async fn add(&self, zone: &str, file: &Path, acl: &str) -> bool {
        let zone = shell_escape(zone);
        let file = shell_escape(&file.to_string_lossy());
        let line = self.add.render(&[&zone, &file, acl]);
        self.execute("add", line).await
    }

    pub async fn reload(&self, zone: &str, file: &Path) -> bool {
        let zone = shell_escape(zone);
        let file = shell_escape(&file.to_string_lossy());
        let line = self.reload.render(&[&zone, &file]);
        self.execute("reload", line).await
    }

    pub async fn delete(&self, zone: &str) -> bool {
        let zone = shell_escape(zone);
        let line = self.delete.render(&[&zone]);
        self.execute("delete", line).await
    }

    async fn execute(&self, action: &str, line: String) -> bool {
        match self.runner.run(&line).await {
            Ok(()) => {
                info!("Zone {} command succeeded: {}", action, line);
                true
            }
            Err(e) => {
                warn!("Zone {} command failed: {}", action, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_positional() {
        let template = CommandTemplate::new("rndc addzone %1$s '{ file \"%2$s\"; allow-transfer { %3$s; }; }'");
        let line = template.render(&["example.com", "/var/zones/example.com.db", "192.0.2.1"]);
        assert_eq!(
            line,
            "rndc addzone example.com '{ file \"/var/zones/example.com.db\"; allow-transfer { 192.0.2.1; }; }'"
        );
    }

    #[test]
    fn test_render_reordered_and_percent() {
        let template = CommandTemplate::new("echo %2$s %1$s 100%%");
        assert_eq!(template.render(&["a", "b"]), "echo b a 100%");
    }

    #[test]
    fn test_validate() {
        assert!(CommandTemplate::new("rndc reload %1$s").validate(2).is_ok());
        assert!(CommandTemplate::new("rndc reload %3$s").validate(2).is_err());
        assert!(CommandTemplate::new("rndc reload %s").validate(2).is_err());
        assert!(CommandTemplate::new("rndc reload %0$s").validate(2).is_err());
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("example.com"), "example.com");
        assert_eq!(shell_escape("/var/named/a-b_c.db"), "/var/named/a-b_c.db");
        assert_eq!(shell_escape("foo bar"), "'foo bar'");
        assert_eq!(shell_escape("it's"), r"'it'\''s'");
        assert_eq!(shell_escape("x;rm -rf /"), "'x;rm -rf /'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_format_acl() {
        let empty: Vec<IpAddr> = Vec::new();
        assert_eq!(format_acl(&empty), "none");

        let addrs: Vec<IpAddr> = vec!["192.0.2.1".parse().unwrap(), "2001:db8::1".parse().unwrap()];
        assert_eq!(format_acl(&addrs), "192.0.2.1; 2001:db8::1");
    }

    #[tokio::test]
    async fn test_shell_runner_reports_exit_status() {
        let runner = ShellCommandRunner;
        assert!(runner.run("true").await.is_ok());
        assert!(matches!(
            runner.run("exit 3").await,
            Err(CommandError::Failed { .. })
        ));
    }
}
