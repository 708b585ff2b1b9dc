//! Indented dump of a rendered tree, for debugging selectors
//!
//! [`TreePrinter::lines`] walks the tree with an explicit stack and yields one
//! line at a time; every call starts a fresh walk.

use std::collections::VecDeque;
use std::fmt;

use super::RenderedNode;

const INDENT: &str = "  ";

/// Line-oriented printer over one or more rendered subtrees
#[derive(Debug, Clone, Copy)]
pub struct TreePrinter<'a> {
    roots: &'a [RenderedNode],
}

impl<'a> TreePrinter<'a> {
    pub fn new(roots: &'a [RenderedNode]) -> Self {
        Self { roots }
    }

    /// Iterator over the printed lines, without trailing newlines
    pub fn lines(&self) -> Lines<'a> {
        Lines {
            stack: self.roots.iter().rev().map(|node| (node, 0)).collect(),
            ready: VecDeque::new(),
        }
    }
}

impl fmt::Display for TreePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Lazy line iterator produced by [`TreePrinter::lines`]
pub struct Lines<'a> {
    stack: Vec<(&'a RenderedNode, usize)>,
    ready: VecDeque<String>,
}

impl<'a> Lines<'a> {
    fn emit(&mut self, node: &'a RenderedNode, level: usize) {
        let pad = INDENT.repeat(level);
        let inner = INDENT.repeat(level + 1);
        let nested = INDENT.repeat(level + 2);

        if node.is_text() {
            self.ready.push_back(format!("{pad}#text: {:?}", node.value));
        } else {
            self.ready
                .push_back(format!("{pad}{}:", node.kind.name().to_lowercase()));
            if !node.attributes.is_empty() {
                self.ready.push_back(format!("{inner}attributes:"));
                for (name, value) in &node.attributes {
                    self.ready.push_back(format!("{nested}{name}: {value:?}"));
                }
            }
        }

        if node.child_count == 0 && node.children.is_empty() {
            return;
        }
        self.ready.push_back(format!("{inner}children:"));
        match node.known_children() {
            Some(children) => {
                for child in children.iter().rev() {
                    self.stack.push((child, level + 2));
                }
            }
            None => self
                .ready
                .push_back(format!("{nested}({} not expanded)", node.child_count)),
        }
    }
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(line);
            }
            let (node, level) = self.stack.pop()?;
            self.emit(node, level);
        }
    }
}
