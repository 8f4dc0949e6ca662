//! Dirty-checked display refresh
//!
//! Each step examines a bounded number of nodes of the active page,
//! continuing round-robin from where the previous step stopped, and emits
//! one update per node whose value changed since it was last shown.

use super::format::{format_value, FormatArg};
use super::DisplaySink;
use crate::catalog::Catalog;
use crate::node::{DisplayHook, Node};
use crate::page::PageId;
use crate::value::{Text, Value};

/// Nodes examined per scheduler step
pub const DISPLAY_QUOTA: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct DisplayScheduler {
    cursor: usize,
}

impl DisplayScheduler {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Restart from the first node of the page
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Examine up to `quota` nodes; returns the number of updates sent
    pub fn step(
        &mut self,
        catalog: &mut Catalog,
        page: PageId,
        quota: usize,
        sink: &mut dyn DisplaySink,
    ) -> usize {
        let len = catalog.page(page).map_or(0, |p| p.nodes().len());
        if len == 0 {
            return 0;
        }

        let mut sent = 0;
        for _ in 0..quota.min(len) {
            if self.cursor >= len {
                self.cursor = 0;
            }
            let id = catalog.page_node(page, self.cursor);
            self.cursor += 1;

            let Some(node) = id.and_then(|id| catalog.node_mut(id)) else {
                continue;
            };
            if node.tag.is_empty() || !node.take_dirty() {
                continue;
            }
            if let Some(node) = id.and_then(|id| catalog.node(id)) {
                let text = render_node(catalog, node);
                sink.send_value(&node.tag, &text);
                sent += 1;
            }
        }
        sent
    }
}

/// Text shown for a node
pub fn render_node(catalog: &Catalog, node: &Node) -> Text {
    match node.display_hook {
        Some(DisplayHook::Custom(render)) => return render(node),
        Some(DisplayHook::Labels(table)) => {
            let mut out = Text::new();
            if let Some(table) = catalog.labels(table) {
                let _ = out.push_str(table.label(node.int_value()));
            }
            return out;
        }
        None => {}
    }

    if node.tag.ends_with(".pic") {
        return Value::Int(node.pic_base as i32 + node.int_value()).to_text();
    }

    let fmt = node.format.as_str();
    let formatted = match fmt.chars().last() {
        Some('d' | 'i' | 'x' | 'X') if node.tag.ends_with(".txt") => {
            let v = match node.value() {
                Value::Float(f) => round_half_away(*f),
                other => other.as_int(),
            };
            format_value(fmt, FormatArg::Int(v))
        }
        Some('f') => format_value(fmt, FormatArg::Float(node.float_value())),
        None => return node.value().to_text(),
        _ => format_value(fmt, FormatArg::Str(&node.value().to_text())),
    };
    formatted.unwrap_or_else(|_| node.value().to_text())
}

fn round_half_away(f: f32) -> i32 {
    if f >= 0.0 {
        (f + 0.5) as i32
    } else {
        (f - 0.5) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LabelTable;
    use crate::page::Page;
    use crate::testutil::RecordingSink;
    use crate::value::ValueKind;
    use heapless::String;

    fn node(tag: &str, kind: ValueKind, fmt: &str) -> Node {
        let mut node = Node::new(kind);
        node.tag = String::try_from(tag).unwrap();
        node.format = String::try_from(fmt).unwrap();
        node
    }

    fn page_of(catalog: &mut Catalog, nodes: std::vec::Vec<Node>) -> PageId {
        let mut page = Page::new();
        for n in nodes {
            page.add_node(catalog.add_node(n).unwrap()).unwrap();
        }
        catalog.add_page(page).unwrap()
    }

    #[test]
    fn test_render_rules() {
        let catalog = Catalog::new();
        let mut n = node("t1.txt", ValueKind::Float, "%03d");
        n.set_float(44.5);
        assert_eq!(render_node(&catalog, &n).as_str(), "045");
        n.set_float(-2.5);
        assert_eq!(render_node(&catalog, &n).as_str(), "-03");

        let mut n = node("t2.txt", ValueKind::Float, "%.2f");
        n.set_float(29.921);
        assert_eq!(render_node(&catalog, &n).as_str(), "29.92");

        let mut n = node("p0.pic", ValueKind::Int, "");
        n.pic_base = 40;
        n.set_int(2);
        assert_eq!(render_node(&catalog, &n).as_str(), "42");

        let mut n = node("t3.txt", ValueKind::Text, "%-4s");
        n.set_text("VS");
        assert_eq!(render_node(&catalog, &n).as_str(), "VS  ");

        let mut n = node("t4.txt", ValueKind::Int, "");
        n.set_int(-12);
        assert_eq!(render_node(&catalog, &n).as_str(), "-12");
    }

    #[test]
    fn test_hooks_override_format() {
        let mut catalog = Catalog::new();
        let mut table = LabelTable::default();
        table.labels.push(String::try_from("OFF").unwrap()).unwrap();
        table.labels.push(String::try_from("ON").unwrap()).unwrap();
        let idx = catalog.add_labels(table).unwrap();

        let mut n = node("t1.txt", ValueKind::Int, "%d");
        n.display_hook = Some(DisplayHook::Labels(idx));
        n.set_int(1);
        assert_eq!(render_node(&catalog, &n).as_str(), "ON");

        fn shout(_: &Node) -> Text {
            Text::try_from("!!").unwrap()
        }
        n.display_hook = Some(DisplayHook::Custom(shout));
        assert_eq!(render_node(&catalog, &n).as_str(), "!!");
    }

    #[test]
    fn test_one_update_per_dirty_node() {
        let mut catalog = Catalog::new();
        let page = page_of(
            &mut catalog,
            vec![
                node("t0.txt", ValueKind::Int, "%d"),
                node("", ValueKind::Int, "%d"),
                node("t2.txt", ValueKind::Int, "%d"),
            ],
        );
        let mut sched = DisplayScheduler::new();
        let mut sink = RecordingSink::default();

        assert_eq!(sched.step(&mut catalog, page, 8, &mut sink), 2);
        assert_eq!(sink.pairs(), [("t0.txt", "0"), ("t2.txt", "0")]);

        sink.clear();
        assert_eq!(sched.step(&mut catalog, page, 8, &mut sink), 0);

        catalog.node_mut(crate::node::NodeId(2)).unwrap().set_int(7);
        assert_eq!(sched.step(&mut catalog, page, 8, &mut sink), 1);
        assert_eq!(sink.pairs(), [("t2.txt", "7")]);
    }

    #[test]
    fn test_quota_round_robin() {
        let mut catalog = Catalog::new();
        let nodes = (0..5)
            .map(|i| node(&std::format!("t{}.txt", i), ValueKind::Int, "%d"))
            .collect();
        let page = page_of(&mut catalog, nodes);
        let mut sched = DisplayScheduler::new();
        let mut sink = RecordingSink::default();

        assert_eq!(sched.step(&mut catalog, page, 2, &mut sink), 2);
        assert_eq!(sched.step(&mut catalog, page, 2, &mut sink), 2);
        assert_eq!(sched.step(&mut catalog, page, 2, &mut sink), 1);
        let tags: std::vec::Vec<&str> = sink.pairs().iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, ["t0.txt", "t1.txt", "t2.txt", "t3.txt", "t4.txt"]);
    }

    #[test]
    fn test_invalidate_forces_resend() {
        let mut catalog = Catalog::new();
        let page = page_of(&mut catalog, vec![node("t0.txt", ValueKind::Int, "%d")]);
        let mut sched = DisplayScheduler::new();
        let mut sink = RecordingSink::default();
        sched.step(&mut catalog, page, 8, &mut sink);
        catalog.invalidate_page(page);
        sched.reset();
        assert_eq!(sched.step(&mut catalog, page, 8, &mut sink), 1);
    }
}
