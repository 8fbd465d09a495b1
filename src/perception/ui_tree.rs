//! Accessibility tree → element list.
//!
//! Walks a uiautomator hierarchy dump depth-first (pre-order) with an explicit
//! stack, keeps the nodes worth addressing and numbers them from 1 in the
//! order they are visited.
use roxmltree::{Document, Node};

use crate::errors::{DroidClawError, DroidClawResult};
use crate::perception::types::{Bounds, Element};

/// Widget classes that count as interactive when they carry no label of their own.
/// Matched as substrings of the node's `class` attribute.
const INTERACTIVE_KINDS: &[&str] = &[
    "android.widget.Button",
    "android.widget.EditText",
    "android.widget.TextView",
    "android.widget.ImageButton",
    "android.widget.ImageView",
    "android.widget.CheckBox",
    "android.widget.Switch",
    "android.widget.RadioButton",
    "android.widget.Spinner",
    "android.widget.SeekBar",
    "android.view.View",
    "android.widget.LinearLayout",
    "android.widget.FrameLayout",
    "android.widget.RelativeLayout",
    "androidx.recyclerview.widget.RecyclerView",
    "android.widget.ScrollView",
    "android.widget.ListView",
];

/// Attribute view over one tree node.
struct RawNode<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> RawNode<'a, 'input> {
    fn attr(&self, name: &str) -> &'a str {
        self.node.attribute(name).unwrap_or("")
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.node.attribute(name) {
            Some(v) => v == "true",
            None => default,
        }
    }

    fn enabled(&self) -> bool {
        self.flag("enabled", true)
    }

    fn clickable(&self) -> bool {
        self.flag("clickable", false)
    }

    fn scrollable(&self) -> bool {
        self.flag("scrollable", false)
    }

    fn is_interactive_kind(&self) -> bool {
        let class = self.attr("class");
        INTERACTIVE_KINDS.iter().any(|k| class.contains(k))
    }

    /// Enabled, and either labelled or an interactive widget.
    fn is_meaningful(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        let has_content = !self.attr("text").is_empty()
            || !self.attr("content-desc").is_empty()
            || !self.attr("resource-id").is_empty();
        let interactive = (self.clickable() || self.scrollable()) && self.is_interactive_kind();
        has_content || interactive
    }

    fn into_element(self, id: u32, bounds: Bounds) -> Element {
        let class = self.node.attribute("class").unwrap_or("unknown");
        Element {
            id,
            kind: class.rsplit('.').next().unwrap_or(class).to_string(),
            text: self.attr("text").to_string(),
            description: self.attr("content-desc").to_string(),
            resource_id: self.attr("resource-id").to_string(),
            bounds,
            clickable: self.clickable(),
            scrollable: self.scrollable(),
            enabled: self.enabled(),
            focused: self.flag("focused", false),
        }
    }
}

/// Parses a hierarchy dump and returns the included elements, ids `1..=N`.
pub fn collect_elements(xml: &str) -> DroidClawResult<Vec<Element>> {
    let doc = Document::parse(xml).map_err(|e| DroidClawError::Capture(format!("malformed UI tree: {e}")))?;

    let mut elements = Vec::new();
    let mut stack = vec![doc.root_element()];
    let mut visited = 0usize;

    while let Some(node) = stack.pop() {
        visited += 1;
        let raw = RawNode { node };
        if raw.is_meaningful() {
            let bounds = Bounds::parse(raw.attr("bounds"));
            if bounds.has_area() {
                let id = elements.len() as u32 + 1;
                elements.push(raw.into_element(id, bounds));
            }
        }

        // Reverse so the first child is popped first (document order).
        let children: Vec<_> = node.children().filter(|c| c.is_element()).collect();
        stack.extend(children.into_iter().rev());
    }

    tracing::debug!(visited, included = elements.len(), "UI tree walked");
    Ok(elements)
}
