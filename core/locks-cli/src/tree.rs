//! Tree view: locks grouped by directory.

use std::collections::BTreeMap;

use lfs_locks_core::{LockRecord, LockSnapshot, PresentationSurface};

use crate::panel::EMPTY_MESSAGE;

#[derive(Debug, Default)]
pub struct TreeSurface;

impl PresentationSurface for TreeSurface {
    fn update(&self, snapshot: &LockSnapshot) {
        print!("{}", render_tree(snapshot));
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

#[derive(Default)]
struct Node<'a> {
    dirs: BTreeMap<&'a str, Node<'a>>,
    files: Vec<(&'a str, &'a LockRecord)>,
}

impl<'a> Node<'a> {
    fn insert(&mut self, record: &'a LockRecord) {
        let mut node = self;
        let mut segments = record.path().split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.files.push((segment, record));
            } else {
                node = node.dirs.entry(segment).or_default();
            }
        }
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        for (name, child) in &self.dirs {
            out.push_str(&format!("{}{}/\n", indent, name));
            child.render(depth + 1, out);
        }
        for (name, record) in &self.files {
            out.push_str(&format!(
                "{}{}  [{}] {}, {}\n",
                indent,
                name,
                record.id(),
                record.owner_name(),
                record.display_locked_at()
            ));
        }
    }
}

/// Renders locked files nested under their directories. Directories sort by
/// name; files keep reporting order within their directory.
pub fn render_tree(snapshot: &LockSnapshot) -> String {
    if snapshot.is_empty() {
        return format!("{}\n", EMPTY_MESSAGE);
    }
    let mut root = Node::default();
    for record in snapshot.records() {
        root.insert(record);
    }
    let mut out = String::new();
    root.render(0, &mut out);
    out
}
