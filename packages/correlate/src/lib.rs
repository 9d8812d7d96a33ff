//! Keyed, single-assignment request/response correlation.
//!
//! A caller [applies](Registry::apply) for a string key and gets back a [`Req`] handle. Some
//! producer, usually on another thread or driven by an external event, later
//! [answers](Registry::answer) the same key. The caller blocks in [`Req::wait_answer`] (or awaits
//! [`Req::wait_answer_async`]) until the answer arrives or its timeout elapses, whichever commits
//! first.
//!
//! ```
//! use correlate::Registry;
//! use std::{thread, time::Duration};
//!
//! let registry = Registry::<&'static str, String>::new();
//! let req = registry.apply("job-17").unwrap();
//!
//! let producer = registry.clone();
//! thread::spawn(move || producer.answer("job-17", Ok("done")));
//!
//! assert_eq!(req.wait_answer(Duration::from_secs(5)), Ok("done"));
//! ```

#[macro_use]
extern crate tracing;

mod registry;
mod default;

pub use crate::{
    registry::api::*,
    default::*,
};

/// Error types
pub mod error {
    pub use crate::registry::error::*;
}

/// Future types
pub mod future {
    pub use crate::registry::api::future::*;
}
