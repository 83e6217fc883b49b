use crate::core::decode::DecodeError;
use thiserror::Error;

/// Core error types for nftprobe
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// nftables command execution failed
    ///
    /// Recoverable from the caller's perspective: the engine rejected a
    /// command but the session protocol state is intact.
    #[error("nftables error: {message}")]
    Nftables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// The mandatory cleanup flush after a successful probe failed
    ///
    /// Unrecoverable: the probed rule may or may not still be installed in
    /// the scratch chain. Never retried.
    #[error("engine left in inconsistent state: {0}")]
    Inconsistent(String),

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),

    /// Malformed interchange literal (expression or summary)
    #[error("literal parse error: {0}")]
    Literal(String),

    /// A structured match expression the decoder does not support
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Database of nftables error patterns and their translations
pub struct NftablesErrorPattern;

impl NftablesErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        // Permission errors
        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            return ErrorTranslation::new("Insufficient permissions to probe firewall rules")
                .with_suggestion("Run as root, or ensure run0/sudo/pkexec is configured")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Quick_reference-nftables_in_10_minutes");
        }

        // Missing nftables
        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("nftables is not installed or not found in PATH")
                .with_suggestion("Install nftables: sudo apt install nftables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install nftables  (Fedora/RHEL)")
                .with_suggestion("Or: sudo pacman -S nftables  (Arch)")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Main_Page");
        }

        // Syntax errors in the probed rule
        if lower.contains("could not process rule") || lower.contains("syntax error") {
            return ErrorTranslation::new("Invalid rule syntax")
                .with_suggestion("Check the rule string for typos")
                .with_suggestion("Verify port numbers are between 1 and 65535")
                .with_suggestion("Ensure IP addresses and network masks are valid")
                .with_help(
                    "https://wiki.nftables.org/wiki-nftables/index.php/Simple_rule_management",
                );
        }

        // Set reference problems
        if lower.contains("set") && (lower.contains("does not exist") || lower.contains("no such"))
        {
            return ErrorTranslation::new("Referenced set does not exist")
                .with_suggestion("Use the set-aware check so @references are created first")
                .with_suggestion("Verify the set name after the @ matches an existing set")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Sets");
        }

        // Wrong element type in a set operand
        if lower.contains("datatype mismatch") || lower.contains("invalid lhs of relational") {
            return ErrorTranslation::new("Match field and operand types do not agree")
                .with_suggestion("An ip6 rule needs sets with ipv6_addr elements (and vice versa)")
                .with_suggestion("Don't use port matching with ICMP")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Sets");
        }

        // Table/chain missing (scratch objects disappeared under us)
        if (lower.contains("table") || lower.contains("chain"))
            && (lower.contains("does not exist") || lower.contains("not found"))
        {
            return ErrorTranslation::new("Validation table or chain is missing")
                .with_suggestion("Another process may have deleted the scratch table")
                .with_suggestion("Reconnect the session to recreate it")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Configuring_tables");
        }

        // Netlink errors
        if lower.contains("netlink") {
            return ErrorTranslation::new("Communication error with kernel netlink interface")
                .with_suggestion("Check kernel modules: lsmod | grep nf_tables")
                .with_suggestion("Load nf_tables module: sudo modprobe nf_tables")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting");
        }

        // Generic fallback
        ErrorTranslation::new(format!("Firewall engine error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify nftables is working: sudo nft list ruleset")
            .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
