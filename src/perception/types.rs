use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static BOUNDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+),(\d+)\]\[(\d+),(\d+)\]").expect("bounds regex"));

/// Device-pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Parses the `[L,T][R,B]` encoding. Anything malformed degrades to the zero rectangle.
    pub fn parse(raw: &str) -> Self {
        let Some(caps) = BOUNDS.captures(raw.trim()) else {
            return Self::default();
        };
        let mut v = [0i32; 4];
        for (slot, i) in v.iter_mut().zip(1..=4) {
            match caps[i].parse() {
                Ok(n) => *slot = n,
                Err(_) => return Self::default(),
            }
        }
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn has_area(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    /// Integer (floor) midpoint. Computed in `i64` so extreme bounds cannot overflow.
    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    // The floor of the mean of two i32 values always fits back into i32.
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

/// One addressable on-screen element. Ids are only meaningful within the
/// perception cycle that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: u32,
    /// Short widget class, e.g. `Button` for `android.widget.Button`.
    pub kind: String,
    pub text: String,
    pub description: String,
    pub resource_id: String,
    pub bounds: Bounds,
    pub clickable: bool,
    pub scrollable: bool,
    pub enabled: bool,
    pub focused: bool,
}

impl Element {
    pub fn center(&self) -> (i32, i32) {
        self.bounds.center()
    }

    /// Resource id without its `package:id/` prefix.
    pub fn short_resource_id(&self) -> &str {
        self.resource_id.rsplit('/').next().unwrap_or(&self.resource_id)
    }

    /// Whether the element earns a line in the screen summary.
    pub fn is_listed(&self) -> bool {
        self.clickable || self.scrollable || !self.text.is_empty() || !self.description.is_empty()
    }

    /// Human-readable description with every available label.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(format!("\"{}\"", self.text));
        }
        if !self.description.is_empty() {
            parts.push(format!("[{}]", self.description));
        }
        if !self.resource_id.is_empty() {
            parts.push(format!("({})", self.short_resource_id()));
        }
        let mut desc = if parts.is_empty() { self.kind.clone() } else { parts.join(" ") };

        let attrs: Vec<&str> = [(self.clickable, "clickable"), (self.scrollable, "scrollable")]
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect();
        if !attrs.is_empty() {
            desc.push_str(&format!(" [{}]", attrs.join(", ")));
        }
        desc
    }

    /// Summary line: the single best label, then interaction markers.
    pub fn summary_line(&self) -> String {
        let label = if !self.text.is_empty() {
            format!("\"{}\"", self.text)
        } else if !self.description.is_empty() {
            format!("[{}]", self.description)
        } else if !self.resource_id.is_empty() {
            format!("({})", self.short_resource_id())
        } else {
            self.kind.clone()
        };
        let mut line = format!("[{}] {}", self.id, label);
        if self.clickable {
            line.push_str(" • clickable");
        }
        if self.scrollable {
            line.push_str(" • scrollable");
        }
        line
    }
}
