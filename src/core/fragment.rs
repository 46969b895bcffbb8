// Scanner111 - core/fragment.rs
//
// Report composition tree. A fragment carries a title, ordered lines, a
// kind, a display priority, and child fragments. Fragments are value
// types: merging and header attachment yield new fragments, and the
// reporter serialises the tree into Markdown (core/report.rs).
//
// Depth is bounded at construction: children attached deeper than
// MAX_FRAGMENT_DEPTH are flattened into their parent's lines, so a
// pathological composition cannot nest without limit.

use crate::util::constants;

/// Display category of a fragment. Drives the rendered section style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentKind {
    #[default]
    Info,
    Warning,
    Error,
    Success,
    Section,
}

/// A node in the report composition tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFragment {
    /// Section title. May be empty for bare line containers.
    pub title: String,

    /// Ordered content lines.
    pub lines: Vec<String>,

    /// Display category.
    pub kind: FragmentKind,

    /// Sort position among siblings: smaller renders earlier. Ties keep
    /// insertion order.
    pub priority: u32,

    /// Ordered child fragments.
    pub children: Vec<ReportFragment>,
}

impl ReportFragment {
    pub fn new(title: impl Into<String>, kind: FragmentKind, priority: u32) -> Self {
        Self {
            title: title.into(),
            kind,
            priority,
            ..Self::default()
        }
    }

    pub fn info(title: impl Into<String>, priority: u32) -> Self {
        Self::new(title, FragmentKind::Info, priority)
    }

    pub fn warning(title: impl Into<String>, priority: u32) -> Self {
        Self::new(title, FragmentKind::Warning, priority)
    }

    pub fn error(title: impl Into<String>, priority: u32) -> Self {
        Self::new(title, FragmentKind::Error, priority)
    }

    pub fn success(title: impl Into<String>, priority: u32) -> Self {
        Self::new(title, FragmentKind::Success, priority)
    }

    pub fn section(title: impl Into<String>, priority: u32) -> Self {
        Self::new(title, FragmentKind::Section, priority)
    }

    /// Builder-style line list attachment.
    pub fn with_lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// True when the fragment carries no lines and no children.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.children.is_empty()
    }

    /// Attach a child, clamping its subtree so the whole tree stays within
    /// MAX_FRAGMENT_DEPTH levels. Excess nesting is flattened into lines.
    pub fn add_child(&mut self, mut child: ReportFragment) {
        child.clamp_depth(constants::MAX_FRAGMENT_DEPTH - 1);
        self.children.push(child);
    }

    /// Number of levels in this fragment's subtree (a leaf is 1).
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ReportFragment::depth)
            .max()
            .unwrap_or(0)
    }

    fn clamp_depth(&mut self, budget: usize) {
        if budget <= 1 {
            for child in std::mem::take(&mut self.children) {
                absorb_into_lines(&mut self.lines, child);
            }
        } else {
            for child in &mut self.children {
                child.clamp_depth(budget - 1);
            }
        }
    }

    /// Merge `other` into this fragment, yielding a new fragment whose
    /// lines are `self.lines ++ other.lines` and whose children are the
    /// concatenation in the same order. The receiver's title, kind, and
    /// priority win unless the receiver's title is empty. Associative.
    pub fn merge(mut self, other: ReportFragment) -> ReportFragment {
        if self.title.is_empty() {
            self.title = other.title;
            self.kind = other.kind;
            self.priority = other.priority;
        }
        self.lines.extend(other.lines);
        self.children.extend(other.children);
        self
    }

    /// Prepend a header line followed by a blank line when the fragment has
    /// content; identity on an empty fragment.
    pub fn with_header(mut self, header: impl Into<String>) -> ReportFragment {
        if self.is_empty() {
            return self;
        }
        let mut lines = vec![header.into(), String::new()];
        lines.append(&mut self.lines);
        self.lines = lines;
        self
    }

    /// Children in display order: stable sort by priority, ties keep
    /// insertion order.
    pub fn sorted_children(&self) -> Vec<&ReportFragment> {
        let mut children: Vec<&ReportFragment> = self.children.iter().collect();
        children.sort_by_key(|c| c.priority);
        children
    }
}

/// Flatten a fragment subtree into a line list: title first, then lines,
/// then each child in order.
fn absorb_into_lines(lines: &mut Vec<String>, fragment: ReportFragment) {
    if !fragment.title.is_empty() {
        lines.push(fragment.title);
    }
    lines.extend(fragment.lines);
    for child in fragment.children {
        absorb_into_lines(lines, child);
    }
}
