//! Sandboxed code execution tool
//!
//! Runs untrusted user code in a scratch directory with a cleared
//! environment, CPU-time and address-space limits, and a wall-clock
//! timeout. Input is prescreened against a deny-list of host-escape
//! patterns before anything runs.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SandboxConfig;

use super::{ToolKind, ToolResult};

/// Deny-list applied before execution
///
/// Blocks imports and builtins that reach outside the sandbox: process
/// spawning, environment probing, file access, dynamic evaluation.
const DENY_PATTERNS: &[&str] = &[
    r"\bimport\s+os\b",
    r"\bimport\s+sys\b",
    r"\bimport\s+subprocess\b",
    r"\bimport\s+socket\b",
    r"\bimport\s+shutil\b",
    r"\b__import__\b",
    r"\beval\s*\(",
    r"\bexec\s*\(",
    r"\bopen\s*\(",
    r"\bcompile\s*\(",
    r"\bglobals\s*\(",
    r"\blocals\s*\(",
    r"\bgetattr\s*\(",
    r"\benviron\b",
];

/// Executes user-supplied code in a resource-bounded environment
pub struct CodeExecutor {
    config: SandboxConfig,
}

impl CodeExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Execute a code snippet
    ///
    /// Never panics and never hangs: the wall-clock timeout bounds the
    /// call even when the code loops forever.
    pub async fn execute(&self, code: &str) -> ToolResult {
        if code.trim().is_empty() {
            return ToolResult::failure(ToolKind::CodeExec, "No code provided");
        }

        if let Some(pattern) = self.blocked_pattern(code) {
            warn!(%pattern, "execute: code rejected by prescreen");
            return ToolResult::failure(
                ToolKind::CodeExec,
                format!("Code contains a blocked operation ({})", pattern),
            );
        }

        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return ToolResult::failure(ToolKind::CodeExec, format!("Failed to create scratch dir: {}", e));
            }
        };

        let source = scratch.path().join("snippet");
        if let Err(e) = tokio::fs::write(&source, code).await {
            return ToolResult::failure(ToolKind::CodeExec, format!("Failed to write snippet: {}", e));
        }

        // ulimit bounds CPU time and address space inside the shell before
        // exec'ing the interpreter; the tokio timeout bounds wall clock.
        let command = format!(
            "ulimit -t {}; ulimit -v {}; exec {} {}",
            self.config.cpu_seconds,
            self.config.memory_limit_mb as u64 * 1024,
            self.config.interpreter,
            source.display(),
        );

        debug!(interpreter = %self.config.interpreter, timeout_ms = self.config.timeout_ms, "execute: spawning");

        let output = match tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&command)
                .current_dir(scratch.path())
                .env_clear()
                .env("PATH", "/usr/local/bin:/usr/bin:/bin")
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolResult::failure(ToolKind::CodeExec, format!("Failed to execute code: {}", e));
            }
            Err(_) => {
                debug!("execute: wall-clock timeout");
                return ToolResult::failure(
                    ToolKind::CodeExec,
                    format!("Execution timed out after {}ms", self.config.timeout_ms),
                );
            }
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout), self.config.max_output_bytes);
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr), self.config.max_output_bytes);

        if output.status.success() {
            ToolResult {
                kind: ToolKind::CodeExec,
                success: true,
                output: Some(stdout),
                error: if stderr.is_empty() { None } else { Some(stderr) },
            }
        } else {
            let exit = output.status.code().unwrap_or(-1);
            let error = if stderr.is_empty() {
                format!("Exit code: {}", exit)
            } else {
                format!("Exit code: {}\n{}", exit, stderr)
            };
            ToolResult {
                kind: ToolKind::CodeExec,
                success: false,
                output: if stdout.is_empty() { None } else { Some(stdout) },
                error: Some(error),
            }
        }
    }

    fn blocked_pattern(&self, code: &str) -> Option<&'static str> {
        DENY_PATTERNS.iter().copied().find(|pattern| {
            regex::Regex::new(pattern)
                .map(|re| re.is_match(code))
                .unwrap_or(false)
        })
    }
}

/// Truncate output to the configured cap
fn truncate(s: &str, max_bytes: usize) -> String {
    let trimmed = s.trim_end();
    if trimmed.len() <= max_bytes {
        trimmed.to_string()
    } else {
        let mut end = max_bytes;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...\n[truncated, {} bytes total]", &trimmed[..end], trimmed.len())
    }
}

/// Extract a code snippet from a chat message
///
/// Prefers fenced blocks (```python ... ``` or plain ```), then falls back
/// to treating the whole message as code when it looks like code.
pub fn extract_code(text: &str) -> Option<String> {
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip an optional language tag on the fence line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let code = body[..end].trim();
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
    }

    const CODE_MARKERS: &[&str] = &["print(", "def ", "for ", "while ", "if "];
    if CODE_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some(text.trim().to_string());
    }

    None
}
