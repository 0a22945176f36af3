//! Minimal namespace: a tree of backslash-separated path components, each
//! optionally holding the key object inserted there. `find` walks as far as
//! the path matches existing components and hands back whatever is left
//! over, the shape `NtCreateKey`'s remaining-path resolution needs.

use crate::cm::keyobject::KeyObject;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

#[derive(Default)]
struct DirNode {
    object: Option<Arc<KeyObject>>,
    children: BTreeMap<String, DirNode>,
}

#[derive(Default)]
pub struct ObjectDirectory {
    root: DirNode,
}

fn split(path: &str) -> Vec<&str> {
    path.split('\\').filter(|s| !s.is_empty()).collect()
}

impl ObjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object` at `path`, creating any missing intermediate
    /// components. Fails if a key object already sits at that exact path.
    pub fn insert(&mut self, path: &str, object: Arc<KeyObject>) -> Result<(), ()> {
        let mut node = &mut self.root;
        for component in split(path) {
            node = node
                .children
                .entry(component.to_ascii_lowercase())
                .or_default();
        }
        if node.object.is_some() {
            return Err(());
        }
        node.object = Some(object);
        Ok(())
    }

    /// Remove whatever object sits exactly at `path`, leaving empty
    /// intermediate nodes in place (pruning them isn't worth the
    /// bookkeeping for a namespace this shallow).
    pub fn remove(&mut self, path: &str) -> Option<Arc<KeyObject>> {
        let mut node = &mut self.root;
        for component in split(path) {
            node = node.children.get_mut(&component.to_ascii_lowercase())?;
        }
        node.object.take()
    }

    /// Walk `path` one component at a time as far as it matches existing
    /// nodes. Returns the object at the deepest matched node (`None` if
    /// that node has no object of its own) and whatever path remains
    /// unmatched, joined back with backslashes.
    pub fn find(&self, path: &str) -> (Option<Arc<KeyObject>>, String) {
        let components = split(path);
        let mut node = &self.root;
        let mut matched = 0;
        for component in &components {
            match node.children.get(&component.to_ascii_lowercase()) {
                Some(child) => {
                    node = child;
                    matched += 1;
                }
                None => break,
            }
        }
        let remaining = components[matched..].join("\\");
        (node.object.clone(), remaining)
    }
}
