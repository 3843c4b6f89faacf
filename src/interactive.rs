//! C4 — Interactive Detector (3-tier).
//!
//! Tier 1 (AX tree), tier 2 (implicit HTML role), tier 3 (event-listener
//! promotion), merged in document order with later tiers filling blanks but
//! never overwriting. Directly grounded on the teacher's
//! `agent/cdp.rs::is_interesting_ax_node`/`get_ax_tree`/`get_dom_context` —
//! the single strongest piece of corpus evidence for this teacher pick.

use crate::sanitize::sanitize_text;
use crate::snapshot::{AxNode, ListenerHit};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Mirrors `agent/cdp.rs::is_interesting_ax_node`'s three role tables.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "textbox", "combobox", "listbox", "option", "checkbox", "radio", "switch",
    "slider", "spinbutton", "searchbox", "menuitem", "menuitemcheckbox", "menuitemradio", "tab",
    "treeitem", "columnheader", "rowheader", "gridcell", "cell", "row", "select", "input",
    "textarea",
];
const STRUCTURAL_ROLES: &[&str] = &[
    "heading", "img", "figure", "main", "navigation", "region", "complementary", "banner",
    "contentinfo", "form", "alert", "dialog", "status", "tooltip", "table", "list", "listitem",
];
const SKIP_ROLES: &[&str] = &[
    "none", "generic", "presentation", "InlineTextBox", "LineBreak", "StaticText", "SvgRoot",
    "Canvas", "Iframe", "RootWebArea", "WebArea",
];
const CHROME_ROLES: &[&str] = &["tab", "menuitem", "menuitemcheckbox", "menuitemradio"];
const INPUTISH_ROLES: &[&str] = &[
    "textbox", "combobox", "checkbox", "radio", "switch", "slider", "spinbutton", "searchbox",
    "select",
];
const PRIMARY_NAME_HINTS: &[&str] = &[
    "add to cart", "buy now", "checkout", "submit", "subscribe", "sign up", "continue", "confirm",
    "place order",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affordance {
    Click,
    Type,
    Select,
    Hover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Primary,
    Named,
    Inputish,
    Chrome,
    TableNoise,
    Rest,
}

#[derive(Debug, Clone)]
pub struct Interactable {
    pub r#ref: usize,
    /// Real HTML tag name, or empty when this entry came from the AX tree
    /// alone (no DOM element backs it). Folded into `dom_structure_hash`
    /// alongside `role`/`name` so a native `<button>` and a `<div
    /// role="button">` with the same name never collapse to one hash.
    pub tag: String,
    pub role: String,
    pub name: String,
    pub affordances: Vec<Affordance>,
    pub selector_chain: Vec<String>,
    pub options: Vec<String>,
    pub bucket: Bucket,
    /// Used only for dedup/ordering, not part of the serialized shape.
    pub(crate) parent_xpath_prefix: String,
}

pub struct DetectionResult {
    pub interactables: Vec<Interactable>,
    pub ax_degraded: bool,
}

/// True for any role this crate treats as a potential interactable (AX tier
/// recognizes interactive roles and named structural roles; skip roles and
/// unnamed structural roles never qualify).
fn is_interesting_ax_node(role: &str, name: &str) -> bool {
    if INTERACTIVE_ROLES.contains(&role) {
        return true;
    }
    if STRUCTURAL_ROLES.contains(&role) && !name.is_empty() {
        return true;
    }
    if SKIP_ROLES.contains(&role) {
        return false;
    }
    !name.is_empty()
}

fn affordances_for_role(role: &str) -> Vec<Affordance> {
    match role {
        "textbox" | "searchbox" | "spinbutton" => vec![Affordance::Type],
        "combobox" | "select" | "listbox" => vec![Affordance::Select],
        "checkbox" | "radio" | "switch" | "option" | "menuitemcheckbox" | "menuitemradio" => {
            vec![Affordance::Click]
        }
        _ => vec![Affordance::Click],
    }
}

fn classify_bucket(role: &str, name: &str) -> Bucket {
    let lower_name = name.to_lowercase();
    if PRIMARY_NAME_HINTS.iter().any(|hint| lower_name.contains(hint)) {
        return Bucket::Primary;
    }
    if INPUTISH_ROLES.contains(&role) {
        return Bucket::Inputish;
    }
    if CHROME_ROLES.contains(&role) {
        return Bucket::Chrome;
    }
    if matches!(role, "gridcell" | "cell" | "row") {
        let is_ordinal = name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty();
        if name.is_empty() || is_ordinal {
            return Bucket::TableNoise;
        }
    }
    if !name.is_empty() {
        return Bucket::Named;
    }
    Bucket::Rest
}

fn build_selector_chain(role: &str, name: &str, css_selector: Option<String>) -> Vec<String> {
    let mut chain = Vec::new();
    if !name.is_empty() {
        chain.push(format!("role={role}, exact-name={name:?}"));
    }
    if let Some(css) = css_selector {
        chain.push(css);
    }
    chain.push(format!("role={role}, first-match"));
    chain
}

fn flatten_ax_tree<'a>(nodes: &'a [AxNode], out: &mut Vec<&'a AxNode>) {
    for node in nodes {
        out.push(node);
        flatten_ax_tree(&node.children, out);
    }
}

/// Builds an approximate xpath-like string from an element's ancestor
/// chain. Good enough for dedup-key stability and parent-context decisions;
/// this crate never needs a byte-exact xpath since it has no live DOM to
/// re-query (see spec §9's note on avoiding back-pointers).
pub fn approximate_xpath(el: &ElementRef) -> String {
    let mut segments = Vec::new();
    let mut current = Some(*el);
    while let Some(node) = current {
        let tag = node.value().name();
        let index = node
            .prev_siblings()
            .filter_map(scraper::node::Node::as_element)
            .filter(|sibling| sibling.name() == tag)
            .count()
            + 1;
        segments.push(format!("{tag}[{index}]"));
        current = node.parent().and_then(ElementRef::wrap);
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

fn parent_prefix(xpath: &str) -> String {
    match xpath.rfind('/') {
        Some(idx) => xpath[..idx].to_string(),
        None => String::new(),
    }
}

/// Tier 1: accessibility-tree nodes with a recognized role and non-empty
/// name. Returns `None` in place of a panic when `ax_tree` is structurally
/// unusable, which the caller treats as `ax_degraded`.
fn detect_ax_tier(ax_tree: &[AxNode]) -> Vec<Interactable> {
    let mut flat = Vec::new();
    flatten_ax_tree(ax_tree, &mut flat);

    flat.into_iter()
        .filter(|node| is_interesting_ax_node(&node.role, &node.name))
        .map(|node| {
            let name = sanitize_text(&node.name);
            Interactable {
                r#ref: 0,
                // The AX tree carries no real HTML tag; only tiers 2/3
                // (DOM-backed) populate this.
                tag: String::new(),
                role: node.role.clone(),
                name: name.clone(),
                affordances: affordances_for_role(&node.role),
                selector_chain: build_selector_chain(&node.role, &name, None),
                options: Vec::new(),
                bucket: classify_bucket(&node.role, &name),
                parent_xpath_prefix: parent_prefix(&node.xpath),
            }
        })
        .collect()
}

/// Tier 2: tags whose semantics imply a role regardless of AX-tree
/// presence (`<input>`, `<select>`, `<textarea>`, `<button>`, `<a href>`).
fn detect_implicit_role_tier(doc: &Html) -> Vec<Interactable> {
    let mut out = Vec::new();
    let Ok(selector) = Selector::parse("input, select, textarea, button, a[href]") else {
        return out;
    };
    for el in doc.select(&selector) {
        let tag = el.value().name();
        let (role, name, options) = match tag {
            "select" => {
                let options: Vec<String> = el
                    .select(&Selector::parse("option").unwrap())
                    .map(|o| sanitize_text(&o.text().collect::<String>()))
                    .collect();
                ("combobox".to_string(), el.value().attr("name").unwrap_or("").to_string(), options)
            }
            "textarea" => ("textbox".to_string(), el.value().attr("name").unwrap_or("").to_string(), vec![]),
            "input" => {
                let input_type = el.value().attr("type").unwrap_or("text");
                let role = match input_type {
                    "checkbox" => "checkbox",
                    "radio" => "radio",
                    "submit" | "button" => "button",
                    "search" => "searchbox",
                    _ => "textbox",
                };
                let name = el
                    .value()
                    .attr("aria-label")
                    .or_else(|| el.value().attr("placeholder"))
                    .or_else(|| el.value().attr("name"))
                    .unwrap_or("")
                    .to_string();
                (role.to_string(), name, vec![])
            }
            "button" => (
                "button".to_string(),
                el.text().collect::<String>().trim().to_string(),
                vec![],
            ),
            _ => (
                "link".to_string(),
                el.text().collect::<String>().trim().to_string(),
                vec![],
            ),
        };
        let name = sanitize_text(&name);
        let xpath = approximate_xpath(&el);
        out.push(Interactable {
            r#ref: 0,
            tag: tag.to_string(),
            role: role.clone(),
            name: name.clone(),
            affordances: affordances_for_role(&role),
            selector_chain: build_selector_chain(&role, &name, Some(format!("css={xpath}"))),
            options,
            bucket: classify_bucket(&role, &name),
            parent_xpath_prefix: parent_prefix(&xpath),
        });
    }
    out
}

/// Tier 3: elements the driver reported as carrying a click handler
/// (typically `div`/`span`), promoted to `role=button`.
fn detect_listener_tier(doc: &Html, hits: &[ListenerHit]) -> Vec<Interactable> {
    let mut out = Vec::new();
    let click_xpaths: HashSet<&str> = hits
        .iter()
        .filter(|h| h.event == "click")
        .map(|h| h.xpath.as_str())
        .collect();
    if click_xpaths.is_empty() {
        return out;
    }
    let Ok(selector) = Selector::parse("div, span") else {
        return out;
    };
    for el in doc.select(&selector) {
        let xpath = approximate_xpath(&el);
        if !click_xpaths.contains(xpath.as_str()) {
            continue;
        }
        let name = el
            .value()
            .attr("aria-label")
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());
        let name = sanitize_text(&name);
        out.push(Interactable {
            r#ref: 0,
            tag: el.value().name().to_string(),
            role: "button".to_string(),
            name: name.clone(),
            affordances: vec![Affordance::Click],
            selector_chain: build_selector_chain("button", &name, Some(format!("css={xpath}"))),
            options: Vec::new(),
            bucket: classify_bucket("button", &name),
            parent_xpath_prefix: parent_prefix(&xpath),
        });
    }
    out
}

/// Merges the three tiers, deduping on `(role, name, parent_xpath_prefix)`
/// (later tiers fill blanks, never overwrite), and assigns stable,
/// contiguous, 1-based refs in document order.
pub fn detect(doc: &Html, ax_tree: &[AxNode], listener_hits: &[ListenerHit]) -> DetectionResult {
    let ax_degraded = ax_tree.is_empty();

    let mut merged: Vec<Interactable> = Vec::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    let tiers: Vec<Vec<Interactable>> = if ax_degraded {
        vec![detect_implicit_role_tier(doc), detect_listener_tier(doc, listener_hits)]
    } else {
        vec![
            detect_ax_tier(ax_tree),
            detect_implicit_role_tier(doc),
            detect_listener_tier(doc, listener_hits),
        ]
    };

    for tier in tiers {
        for candidate in tier {
            let key = (
                candidate.role.clone(),
                candidate.name.clone(),
                candidate.parent_xpath_prefix.clone(),
            );
            if seen.insert(key) {
                merged.push(candidate);
            }
        }
    }

    for (idx, interactable) in merged.iter_mut().enumerate() {
        interactable.r#ref = idx + 1;
    }

    DetectionResult {
        interactables: merged,
        ax_degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(role: &str, name: &str, xpath: &str) -> AxNode {
        AxNode {
            role: role.to_string(),
            name: name.to_string(),
            description: None,
            value: None,
            checked: None,
            focused: None,
            disabled: None,
            xpath: xpath.to_string(),
            children: Vec::new(),
        }
    }

    #[test]
    fn refs_are_contiguous_starting_at_one() {
        let doc = Html::parse_document("<html><body></body></html>");
        let ax_tree = vec![
            node("button", "Add to Cart", "/html/body/button[1]"),
            node("link", "Home", "/html/body/a[1]"),
        ];
        let result = detect(&doc, &ax_tree, &[]);
        let refs: Vec<usize> = result.interactables.iter().map(|i| i.r#ref).collect();
        assert_eq!(refs, vec![1, 2]);
    }

    #[test]
    fn degraded_when_ax_tree_empty() {
        let doc = Html::parse_document(r#"<html><body><button>Go</button></body></html>"#);
        let result = detect(&doc, &[], &[]);
        assert!(result.ax_degraded);
        assert!(result.interactables.iter().any(|i| i.name == "Go"));
    }

    #[test]
    fn select_becomes_combobox_with_options() {
        let doc = Html::parse_document(
            r#"<html><body><select name="size"><option>250</option><option>255</option></select></body></html>"#,
        );
        let result = detect(&doc, &[], &[]);
        let combobox = result
            .interactables
            .iter()
            .find(|i| i.role == "combobox")
            .expect("combobox present");
        assert_eq!(combobox.options, vec!["250", "255"]);
        assert!(matches!(combobox.affordances[0], Affordance::Select));
    }

    #[test]
    fn primary_bucket_for_add_to_cart() {
        assert_eq!(classify_bucket("button", "Add to Cart"), Bucket::Primary);
    }

    #[test]
    fn table_noise_for_unnamed_gridcell() {
        assert_eq!(classify_bucket("gridcell", ""), Bucket::TableNoise);
        assert_eq!(classify_bucket("gridcell", "42"), Bucket::TableNoise);
    }
}
