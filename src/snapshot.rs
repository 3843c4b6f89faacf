//! Input types the core consumes from the (out-of-scope) browser driver.
//!
//! Field shapes mirror `agent/types.rs::AXNode`/`PageState` in the teacher,
//! adapted from "live CDP session" semantics to "one immutable snapshot"
//! semantics: the driver captures these once per page-map request and the
//! core never reaches back out to the browser.

use serde::{Deserialize, Serialize};

/// One node of the accessibility tree as handed to the core by the driver.
///
/// Unlike the teacher's `AXNode` (which caches a `backend_node_id` for
/// later CDP dispatch), this shape carries an `xpath` the core can use to
/// correlate AX nodes with DOM elements during C4's tier merge, since the
/// core has no live session to resolve backend ids against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxNode {
    pub role: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    pub xpath: String,
    #[serde(default)]
    pub children: Vec<AxNode>,
}

/// One observed DOM event listener attachment, as reported by the driver's
/// instrumentation pass (tier 3 of C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerHit {
    pub xpath: String,
    pub event: String,
}

/// One capture of a live page, ready for the core to compress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub html: String,
    #[serde(default)]
    pub ax_tree: Vec<AxNode>,
    #[serde(default)]
    pub listener_hits: Vec<ListenerHit>,
    pub url: String,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    /// Caller-supplied fingerprint hint; the core always recomputes its own
    /// fingerprint from `html`/`ax_tree` rather than trusting this value,
    /// but records it for cache-tier diagnostics.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl Snapshot {
    pub fn effective_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }
}
