//! Process-wide default registry.
//!
//! Prefer constructing a [`Registry`] at startup and handing clones of it to whatever needs it.
//! These functions exist for call sites where threading a registry through is impractical.

use crate::{Registry, Req};
use std::{
    any::Any,
    sync::LazyLock,
};


/// Dynamically typed answer value
pub type AnyValue = Box<dyn Any + Send>;

/// Registry with dynamically typed answers and [`anyhow`] errors
pub type AnyRegistry = Registry<AnyValue, anyhow::Error>;

/// Request handle of an [`AnyRegistry`]
pub type AnyReq = Req<AnyValue, anyhow::Error>;

static DEFAULT_REGISTRY: LazyLock<AnyRegistry> = LazyLock::new(AnyRegistry::new);

/// The process-wide default registry, with the default shard count
///
/// Constructed on first use and never torn down.
pub fn default_registry() -> &'static AnyRegistry {
    &DEFAULT_REGISTRY
}

/// Apply for a request in the [default registry](default_registry)
///
/// Returns `None` if the key already has an outstanding request.
pub fn apply_req(key: impl Into<String>) -> Option<AnyReq> {
    DEFAULT_REGISTRY.apply(key)
}

/// Answer a request in the [default registry](default_registry)
///
/// Does nothing if the key has no outstanding request or was already answered.
pub fn answer_req<V: Any + Send>(key: &str, result: anyhow::Result<V>) {
    DEFAULT_REGISTRY.answer(key, result.map(|v| Box::new(v) as AnyValue));
}
