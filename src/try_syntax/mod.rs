//! Try syntax parsing for submission messages.
//!
//! Developers push to the try queue with a commit message containing a line like
//! `try: -b o -p linux64 -u mochitest-1 -t none --rebuild 5`. The bot only cares
//! about a handful of flags; everything else belongs to the scheduler and is
//! skipped.
//!
//! # Recognized Flags
//!
//! - `--rebuild N` / `--rebuild=N` - Run every test job N extra times
//! - `--rebuild-talos N` / `--rebuild-talos=N` - Run every talos job N extra times
//! - `--no-retry` - Never retrigger failing jobs for this push
//!
//! # Example
//!
//! ```
//! use trigger_bot::try_syntax::{parse_try_syntax, TryRequest};
//!
//! let msg = "Bug 1 - fix it\n\ntry: -b o -p linux -u xpcshell -t none --rebuild 5";
//! let req = parse_try_syntax(msg, 20);
//! assert_eq!(req.rebuild, 5);
//! assert!(req.retry);
//!
//! assert_eq!(parse_try_syntax("no directive", 20), TryRequest::DEFAULT);
//! ```

mod parser;
mod types;

pub use parser::parse_try_syntax;
pub use types::TryRequest;
