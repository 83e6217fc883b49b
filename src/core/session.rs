//! Engine session: the owned handle for all nftables interaction
//!
//! An [`NftSession`] pins the fixed output configuration every operation
//! relies on (structured JSON, stateless rendering, numeric protocols,
//! command echo; no service-name or reverse-DNS translation) and owns the
//! scratch table whose `validator` chain is used for transient rule probes.
//! Construction is idempotent: the table and chain adds are safe to repeat.
//!
//! The session is deliberately not shareable: probing mutates the scratch
//! chain, so methods take `&mut self` and concurrent probes require one
//! session each.

use crate::core::error::{Error, Result};
use serde_json::{Value, json};
use tracing::{debug, error, info};

/// Name of the always-empty-at-rest chain used for rule probes
pub const SCRATCH_CHAIN: &str = "validator";

/// Fixed output configuration passed to every engine invocation.
///
/// Service-name and reverse-DNS translation stay off by omission of their
/// flags; the decoder depends on numeric protocol rendering and on the echo
/// of added rules.
const OUTPUT_FLAGS: [&str; 4] = ["--json", "--stateless", "--numeric-protocol", "--echo"];

/// Raw outcome of one engine invocation
struct EngineReply {
    status: i32,
    stdout: String,
    stderr: String,
}

/// A connected engine session bound to one scratch table
pub struct NftSession {
    table: String,
    audit_enabled: bool,
}

impl NftSession {
    /// Connects a session and prepares the scratch table and chain.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the table name is invalid or the setup batch
    /// fails - a session that cannot create its scratch objects is
    /// unusable, so setup failures are never deferred to later calls.
    pub async fn connect(config: &crate::config::AppConfig) -> Result<Self> {
        crate::validators::validate_table_name(&config.table_name).map_err(|message| {
            Error::Validation {
                field: "table_name".to_string(),
                message,
            }
        })?;

        let mut session = Self {
            table: config.table_name.clone(),
            audit_enabled: config.audit_enabled,
        };

        let setup = json!({ "nftables": [
            { "add": { "table": {
                "family": "inet",
                "name": session.table,
            }}},
            { "add": { "chain": {
                "family": "inet",
                "table": session.table,
                "name": SCRATCH_CHAIN,
            }}},
        ]});

        let result = session.run_cmd_json(&setup).await;
        if session.audit_enabled {
            crate::audit::log_session_setup(
                &session.table,
                result.is_ok(),
                result.as_ref().err().map(ToString::to_string),
            )
            .await;
        }
        result?;

        info!(table = %session.table, "engine session ready");
        Ok(session)
    }

    /// Name of the scratch table this session operates on
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether engine mutations are recorded in the audit log
    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    /// Submits a structured command batch.
    ///
    /// The batch is validated against the expected command shape before
    /// submission so malformed batches never reach the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Nftables`] when the engine reports a nonzero status
    /// or any error text.
    pub async fn run_cmd_json(&mut self, batch: &Value) -> Result<Value> {
        validate_batch(batch)?;

        let payload = serde_json::to_string(batch)?;
        debug!(table = %self.table, "submitting JSON batch");
        let reply = self.run_engine(&["-f", "-"], Some(&payload)).await?;
        reply_into_result(reply)
    }

    /// Submits a single textual command through the script stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Nftables`] when the engine rejects the command.
    pub async fn run_cmd(&mut self, command: &str) -> Result<Value> {
        let mut payload = command.to_string();
        payload.push('\n');
        debug!(table = %self.table, command, "submitting command");
        let reply = self.run_engine(&["-f", "-"], Some(&payload)).await?;
        reply_into_result(reply)
    }

    /// Lists the full current content of the session table.
    ///
    /// The listing is never cached; reconciliation re-fetches it on every
    /// call to avoid acting on stale state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Nftables`] when the listing fails (e.g. the table
    /// was removed by another actor).
    pub async fn get_ruleset_json(&mut self) -> Result<Value> {
        let args = ["list", "table", "inet", self.table.as_str()];
        let reply = self.run_engine(&args, None).await?;
        reply_into_result(reply)
    }

    async fn run_engine(
        &self,
        extra_args: &[&str],
        stdin_payload: Option<&str>,
    ) -> Result<EngineReply> {
        let mut args: Vec<&str> = OUTPUT_FLAGS.to_vec();
        args.extend_from_slice(extra_args);

        let mut child = crate::elevation::create_elevated_nft_command(&args)?
            .stdin(if stdin_payload.is_some() {
                std::process::Stdio::piped()
            } else {
                std::process::Stdio::null()
            })
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn nft: {e}");
                Error::Internal(format!("Failed to spawn nft: {e}"))
            })?;

        if let Some(payload) = stdin_payload
            && let Some(mut stdin) = child.stdin.take()
        {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(payload.as_bytes()).await?;
            // stdin drops here, closing the pipe so nft sees end-of-script
        }

        let output = child.wait_with_output().await?;

        Ok(EngineReply {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Converts a raw engine reply into parsed output or an engine error.
///
/// Any nonzero exit status or nonempty error text counts as failure; empty
/// output on success normalizes to an empty command list.
fn reply_into_result(reply: EngineReply) -> Result<Value> {
    if reply.status != 0 || !reply.stderr.trim().is_empty() {
        let errors = parse_nft_errors(&reply.stderr);
        let message = if errors.is_empty() {
            format!("nft exited with status {}", reply.status)
        } else {
            errors.join("; ")
        };
        return Err(Error::Nftables {
            message,
            stderr: Some(reply.stderr),
            exit_code: Some(reply.status),
        });
    }

    if reply.stdout.trim().is_empty() {
        return Ok(json!({ "nftables": [] }));
    }

    serde_json::from_str(&reply.stdout).map_err(Error::Serialization)
}

/// Parses nft error output into user-friendly messages
///
/// Attempts to extract meaningful error information from nft's stderr
/// output, falling back to raw output if parsing fails.
fn parse_nft_errors(stderr: &str) -> Vec<String> {
    // Try to parse JSON error format first
    if let Ok(json_err) = serde_json::from_str::<Value>(stderr)
        && let Some(errors) = json_err.get("errors").and_then(|e| e.as_array())
    {
        return errors
            .iter()
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .map(String::from)
            .collect();
    }

    // Fall back to line-by-line parsing
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            // Clean up common nft error prefixes
            line.trim()
                .trim_start_matches("Error: ")
                .trim_start_matches("nft: ")
                .to_string()
        })
        .collect()
}

/// Validates that a command batch has the structure the engine accepts.
///
/// # Errors
///
/// Returns `Err` if:
/// - The top-level `nftables` array is missing
/// - The batch is empty
/// - A command is not a single add/delete/flush/list operation
/// - An operation does not name a table, chain, set or rule object
fn validate_batch(batch: &Value) -> Result<()> {
    let commands = batch
        .get("nftables")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Internal("Invalid batch: missing nftables array".to_string()))?;

    if commands.is_empty() {
        return Err(Error::Internal("Invalid batch: no commands".to_string()));
    }

    for command in commands {
        let object = command
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| {
                Error::Internal("Invalid batch: command must be a single operation".to_string())
            })?;

        let Some((op, target)) = object.iter().next() else {
            return Err(Error::Internal("Invalid batch: empty command".to_string()));
        };
        if !matches!(op.as_str(), "add" | "delete" | "flush" | "list") {
            return Err(Error::Internal(format!(
                "Invalid batch: unsupported operation {op:?}"
            )));
        }

        let has_known_object = target
            .as_object()
            .is_some_and(|t| ["table", "chain", "set", "rule"].iter().any(|k| t.contains_key(*k)));
        if !has_known_object {
            return Err(Error::Internal(format!(
                "Invalid batch: operation {op:?} names no known object"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_valid() {
        let batch = json!({
            "nftables": [
                { "add": { "table": { "family": "inet", "name": "validator" } } },
                { "add": { "chain": { "family": "inet", "table": "validator", "name": "validator" } } }
            ]
        });
        assert!(validate_batch(&batch).is_ok());
    }

    #[test]
    fn test_validate_batch_missing_array() {
        assert!(validate_batch(&json!({ "something_else": [] })).is_err());
    }

    #[test]
    fn test_validate_batch_empty() {
        assert!(validate_batch(&json!({ "nftables": [] })).is_err());
    }

    #[test]
    fn test_validate_batch_unknown_operation() {
        let batch = json!({
            "nftables": [ { "replace": { "table": { "name": "x" } } } ]
        });
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn test_validate_batch_unknown_object() {
        let batch = json!({
            "nftables": [ { "add": { "quota": { "name": "x" } } } ]
        });
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn test_validate_batch_multi_key_command() {
        let batch = json!({
            "nftables": [ { "add": { "table": { "name": "x" } }, "delete": { "table": { "name": "y" } } } ]
        });
        assert!(validate_batch(&batch).is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_table_name() {
        // Fails validation before any engine process is spawned
        let mut config = crate::core::test_helpers::test_config();
        config.table_name = "bad table".to_string();

        let result = NftSession::connect(&config).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_parse_nft_errors_plain_text() {
        let stderr = "Error: syntax error, unexpected $end\nError: invalid expression\n";
        let errors = parse_nft_errors(stderr);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "syntax error, unexpected $end");
        assert_eq!(errors[1], "invalid expression");
    }

    #[test]
    fn test_parse_nft_errors_empty() {
        assert!(parse_nft_errors("").is_empty());
    }

    #[test]
    fn test_parse_nft_errors_json_format() {
        let stderr = r#"{"errors": [{"message": "set does not exist"}]}"#;
        let errors = parse_nft_errors(stderr);
        assert_eq!(errors, ["set does not exist"]);
    }

    #[test]
    fn test_reply_into_result_failure_on_stderr() {
        let reply = EngineReply {
            status: 0,
            stdout: String::new(),
            stderr: "Error: something broke\n".to_string(),
        };
        let err = reply_into_result(reply).unwrap_err();
        match err {
            Error::Nftables { message, .. } => assert!(message.contains("something broke")),
            other => panic!("expected Nftables error, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_into_result_empty_success() {
        let reply = EngineReply {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        let value = reply_into_result(reply).unwrap();
        assert_eq!(value, json!({ "nftables": [] }));
    }

    #[test]
    fn test_reply_into_result_parses_stdout() {
        let reply = EngineReply {
            status: 0,
            stdout: r#"{"nftables": [{"table": {"name": "validator"}}]}"#.to_string(),
            stderr: String::new(),
        };
        let value = reply_into_result(reply).unwrap();
        assert_eq!(value["nftables"][0]["table"]["name"], "validator");
    }
}
