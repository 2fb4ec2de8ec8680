//! Feature modules plugged into the dispatcher chain.
//!
//! Order matters: the binary registers them in the order they should see
//! events.

mod admin;
mod gpt;
mod start;

pub use admin::AdminModule;
pub use gpt::GptModule;
pub use start::StartModule;

pub(crate) const OWNER_ONLY_TEXT: &str = "You do not have permission to do this.";

/// First positional argument as a numeric chat/user id.
pub(crate) fn id_arg(args: &[String]) -> Option<i64> {
    args.first().and_then(|a| a.trim().parse::<i64>().ok())
}
