//! nftprobe - nftables rule validation and translation
//!
//! A programmatic layer for validating rule expressions against the live
//! nftables engine without installing them, and for translating between
//! rule strings and a flat structured representation.
//!
//! # Architecture
//!
//! - [`core`] - Engine session, set reconciliation, rule probing, decode/encode pipeline
//! - [`audit`] - Audit logging for all engine mutations
//! - [`validators`] - Input validation and sanitization
//! - [`elevation`] - Privilege escalation for engine commands
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories, etc.)
//!
//! # Probe Protocol
//!
//! A candidate rule is validated by adding it to a dedicated scratch chain
//! with command echo enabled and immediately flushing the chain again, so
//! no probed rule ever persists. Sets the rule references are reconciled
//! first, since the engine rejects references to absent or wrong-typed
//! sets.
//!
//! # Concurrency
//!
//! The probe-and-flush sequence mutates shared scratch state, so all
//! engine-touching operations take `&mut` [`NftSession`]; concurrent
//! validation flows need one session each.
//!
//! # Example
//!
//! ```no_run
//! use nftprobe::core::{decode, probe};
//! use nftprobe::{NftSession, RuleCheck};
//!
//! # async fn example() -> nftprobe::Result<()> {
//! let config = nftprobe::config::load_config().await;
//! let mut session = NftSession::connect(&config).await?;
//!
//! match probe::check_rule_with_sets(&mut session, "ip saddr @trusted tcp dport 8428 accept").await? {
//!     RuleCheck::Valid { expr } => {
//!         let summary = decode::decode_expr(&expr)?;
//!         println!("{}", serde_json::to_string(&summary).unwrap());
//!     }
//!     RuleCheck::Invalid { reason } => eprintln!("rejected: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::probe::RuleCheck;
pub use core::session::NftSession;
pub use core::summary::{RuleAction, RuleSummary, Transport};
