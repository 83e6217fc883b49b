//! Privilege elevation for engine commands
//!
//! nftprobe runs as an unprivileged user and only elevates to talk to the
//! kernel packet-filtering engine through `nft`.
//!
//! # Elevation Strategy
//!
//! - **Preferred (all modes)**: Uses `run0` when available (systemd v256+, no SUID, better security)
//! - **CLI fallback**: Uses `sudo` for terminal environments
//! - **GUI fallback**: Uses `pkexec` for graphical authentication
//!
//! # Environment Variables
//!
//! - `NFTPROBE_ELEVATION_METHOD`: Force a specific elevation method (`sudo`,
//!   `run0`, or `pkexec`). Useful for scripts with sudoers NOPASSWD rules.
//!
//! - `NFTPROBE_NFT_COMMAND`: Replace the `nft` binary entirely (used by the
//!   test suite to point at a mock engine). The replacement is executed
//!   directly, without elevation.
//!
//! - `NFTPROBE_TEST_NO_ELEVATION`: Bypass elevation entirely (for testing only).
//!
//! # Security
//!
//! - Only `nft` can be elevated through this module
//! - Commands are constructed safely without shell interpolation
//! - Binaries (run0/sudo/pkexec, nft) are checked for availability

use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// pkexec binary not found in PATH
    #[error("pkexec not found - please install PolicyKit")]
    PkexecNotFound,

    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `NFTPROBE_ELEVATION_METHOD`
    #[error("Invalid NFTPROBE_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec")]
    InvalidMethod(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Creates an elevated `nft` command with the specified arguments.
///
/// Arguments are passed directly to `nft` without shell interpretation,
/// preventing command injection; callers validate inputs before building the
/// command.
///
/// # Elevation Strategy
///
/// 1. **Preferred**: `run0 nft` when available (systemd v256+, no SUID)
/// 2. **CLI fallback**: `sudo nft` for terminal environments
/// 3. **GUI fallback**: `pkexec nft` for graphical authentication
///
/// # Errors
///
/// Returns `ElevationError` if the requested or detected elevation helper
/// is not available.
///
/// # Example
///
/// ```no_run
/// use nftprobe::elevation::create_elevated_nft_command;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut cmd = create_elevated_nft_command(&["--json", "list", "table", "inet", "validator"])?;
/// let output = cmd.output().await?;
/// # Ok(())
/// # }
/// ```
pub fn create_elevated_nft_command(args: &[&str]) -> Result<Command, ElevationError> {
    use std::os::fd::AsFd;

    // 1. Replacement engine binary (mock for tests) runs directly
    if let Ok(replacement) = std::env::var("NFTPROBE_NFT_COMMAND")
        && !replacement.is_empty()
    {
        let mut cmd = Command::new(replacement);
        cmd.args(args);
        return Ok(cmd);
    }

    // 2. Strict test mode override
    if std::env::var("NFTPROBE_TEST_NO_ELEVATION").is_ok() {
        let mut cmd = Command::new("nft");
        cmd.args(args);
        return Ok(cmd);
    }

    // 3. Direct root execution (no prompt needed)
    let is_root = nix::unistd::getuid().is_root();
    if is_root {
        let mut cmd = Command::new("nft");
        cmd.args(args);
        return Ok(cmd);
    }

    // 4. Explicit elevation method override (for scripts with sudoers NOPASSWD, etc.)
    if let Ok(method) = std::env::var("NFTPROBE_ELEVATION_METHOD") {
        let method = method.to_lowercase();
        if !method.is_empty() {
            return match method.as_str() {
                "sudo" | "run0" | "pkexec" => {
                    if !binary_exists(&method) {
                        return Err(ElevationError::MethodNotAvailable(method));
                    }
                    let mut cmd = Command::new(&method);
                    cmd.arg("nft").args(args);
                    Ok(cmd)
                }
                _ => Err(ElevationError::InvalidMethod(method)),
            };
        }
    }

    // 5. Automatic detection - prefer run0 (modern, no SUID), fallback to sudo/pkexec
    if binary_exists("run0") {
        let mut cmd = Command::new("run0");
        cmd.arg("nft").args(args);
        return Ok(cmd);
    }

    let is_atty = nix::unistd::isatty(std::io::stdin().as_fd()).unwrap_or(false);

    if is_atty {
        // CLI: Standard sudo elevation
        let mut cmd = Command::new("sudo");
        cmd.arg("nft").args(args);
        Ok(cmd)
    } else {
        // Non-interactive: pkexec elevation
        if !binary_exists("pkexec") {
            return Err(ElevationError::PkexecNotFound);
        }

        let mut cmd = Command::new("pkexec");
        cmd.arg("nft").args(args);
        Ok(cmd)
    }
}
