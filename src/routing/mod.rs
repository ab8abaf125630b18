//! Request routing.
//!
//! A [`Router`] holds an ordered list of (matcher, handler) rules. The most
//! recently registered rule is tried first; a handler returning `Ok(None)`
//! passes the request on to older matching rules.

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, Pattern};
pub use router::{Handler, HandlerResult, Router, handler_fn, join_path};
