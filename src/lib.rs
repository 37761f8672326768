//! Data binding between token streams and declared record types.
//!
//! - [`bind`]: the engine (declarations, property merging, converter
//!   resolution and caching, polymorphic discriminators).
//! - [`json`]: a `serde_json` backed reader and writer for the engine.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use vc_bind as bind;

#[cfg(feature = "json")]
pub use vc_bind_json as json;
