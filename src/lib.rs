//! PageMap: compresses a live web page (HTML + accessibility tree +
//! optional event-listener signals) into a compact, structured page map an
//! LLM agent can act on, without round-tripping full-fidelity DOM through
//! the model context window.
//!
//! The crate is a pure, CPU-bound pipeline — no ambient I/O, no browser
//! driving. Callers capture a [`snapshot::Snapshot`] themselves (however
//! their automation layer talks to the browser) and pass it to
//! [`pipeline::build_page_map`].

pub mod assemble;
pub mod cache;
pub mod classify;
pub mod compress;
pub mod config;
pub mod error;
pub mod html_normalize;
pub mod interactive;
pub mod locale;
pub mod pipeline;
pub mod prune;
pub mod sanitize;
pub mod snapshot;
pub mod structured;

pub use assemble::PageMap;
pub use cache::Cache;
pub use config::PageMapConfig;
pub use error::{PageMapError, Result};
pub use pipeline::build_page_map;
pub use snapshot::{AxNode, ListenerHit, Snapshot};
