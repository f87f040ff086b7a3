// ABOUTME: Navigation tree for the generated index page
// ABOUTME: Builds the tree from scanned documents or an explicit 'nav' declaration and cross-checks both

use crate::document::Document;
use crate::errors::{Result, SlidesError};
use crate::utils;
use log::{debug, info, warn};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Identifier of the synthetic root node
pub const ROOT_ID: &str = "";

/// One element of an explicit navigation declaration.
///
/// ```yaml
/// nav:
///   - intro.md                  # leaf
///   - Custom title: other.md    # leaf with a title
///   - Category:                 # category
///       - part/one.md
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEntry {
    Leaf {
        title: Option<String>,
        target: String,
    },
    Category {
        title: String,
        children: Vec<NavEntry>,
    },
}

impl NavEntry {
    /// Parse the top-level declaration, which must be a list.
    pub fn parse_declaration(value: &Value) -> Result<Vec<NavEntry>> {
        match value {
            Value::Sequence(items) => items.iter().map(NavEntry::parse).collect(),
            other => Err(SlidesError::InvalidNavigationSpec(format!(
                "nav must be a list, but is {}",
                describe(other)
            ))),
        }
    }

    fn parse(value: &Value) -> Result<NavEntry> {
        match value {
            Value::String(target) => Ok(NavEntry::Leaf {
                title: None,
                target: target.clone(),
            }),
            Value::Mapping(map) => {
                if map.len() != 1 {
                    return Err(SlidesError::InvalidNavigationSpec(format!(
                        "nav entry must have exactly one key, but has {}",
                        map.len()
                    )));
                }
                let Some((key, content)) = map.iter().next() else {
                    return Err(SlidesError::InvalidNavigationSpec(
                        "nav entry must have exactly one key".to_string(),
                    ));
                };
                let title = match key {
                    Value::String(title) => title.clone(),
                    other => {
                        return Err(SlidesError::InvalidNavigationSpec(format!(
                            "nav entry key must be a string, but is {}",
                            describe(other)
                        )))
                    }
                };
                match content {
                    Value::String(target) => Ok(NavEntry::Leaf {
                        title: Some(title),
                        target: target.clone(),
                    }),
                    Value::Sequence(items) if items.is_empty() => {
                        Err(SlidesError::InvalidNavigationSpec(format!(
                            "category '{}' is empty",
                            title
                        )))
                    }
                    Value::Sequence(items) => Ok(NavEntry::Category {
                        title,
                        children: items.iter().map(NavEntry::parse).collect::<Result<_>>()?,
                    }),
                    other => Err(SlidesError::InvalidNavigationSpec(format!(
                        "nav entry '{}' must have a string or list as value, but value is {}",
                        title,
                        describe(other)
                    ))),
                }
            }
            other => Err(SlidesError::InvalidNavigationSpec(format!(
                "nav entry must be a string or a single-key mapping, but is {}",
                describe(other)
            ))),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Category,
    Leaf,
}

#[derive(Debug, Clone)]
pub struct NavNode {
    pub id: String,
    pub title: Option<String>,
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Problems found when comparing an explicit declaration with the scanned documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavValidation {
    /// Source paths of documents that are not reachable from the index
    pub orphaned_pages: Vec<String>,
    /// Source paths referenced by the declaration that have no document
    pub dangling_references: Vec<String>,
}

/// Serializable view of a node, handed to index templates
#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub id: String,
    pub title: String,
    pub href: Option<String>,
    pub is_leaf: bool,
    pub children: Vec<NavItem>,
}

/// Rooted tree of navigation nodes stored in an arena.
#[derive(Debug, Clone)]
pub struct NavTree {
    nodes: Vec<NavNode>,
    index: HashMap<String, usize>,
}

impl Default for NavTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NavTree {
    pub fn new() -> Self {
        let root = NavNode {
            id: ROOT_ID.to_string(),
            title: None,
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
        };
        let mut index = HashMap::new();
        index.insert(ROOT_ID.to_string(), 0);
        Self {
            nodes: vec![root],
            index,
        }
    }

    /// Infer the tree from the destination paths of the documents.
    pub fn from_documents(documents: &[Document]) -> Result<Self> {
        let mut tree = Self::new();

        for document in documents {
            let segments: Vec<&str> = document.relative_destination.split('/').collect();
            let mut parent = 0;
            let mut current = String::new();

            for (position, segment) in segments.iter().enumerate() {
                if !current.is_empty() {
                    current.push('/');
                }
                current.push_str(segment);

                let is_terminal = position + 1 == segments.len();
                parent = match tree.index.get(&current).copied() {
                    Some(existing) => {
                        if is_terminal || tree.nodes[existing].kind == NodeKind::Leaf {
                            return Err(SlidesError::ValidationError(format!(
                                "'{}' is both a page and a category",
                                current
                            )));
                        }
                        existing
                    }
                    None if is_terminal => tree.insert(
                        parent,
                        current.clone(),
                        Some(document.title()),
                        NodeKind::Leaf,
                    )?,
                    None => tree.insert(parent, current.clone(), None, NodeKind::Category)?,
                };
            }
        }

        tree.sort_children();
        debug!("Navigation tree inferred from {} documents", documents.len());
        Ok(tree)
    }

    /// Build the tree from an explicit declaration, keeping the declared order.
    pub fn from_declaration(entries: &[NavEntry]) -> Result<Self> {
        let mut tree = Self::new();
        for entry in entries {
            tree.add_entry(entry, 0, "")?;
        }
        debug!("Navigation tree built from {} declared entries", entries.len());
        Ok(tree)
    }

    fn add_entry(&mut self, entry: &NavEntry, parent: usize, category_path: &str) -> Result<()> {
        match entry {
            NavEntry::Leaf { title, target } => {
                let id = leaf_id(target)?;
                let title = title.clone().or_else(|| Some(file_stem(&id)));
                self.insert(parent, id, title, NodeKind::Leaf)?;
            }
            NavEntry::Category { title, children } => {
                // Categories are virtual; their children stay in the same physical directory
                let id = if category_path.is_empty() {
                    title.clone()
                } else {
                    format!("{}/{}", category_path, title)
                };
                let node = self.insert(parent, id.clone(), Some(title.clone()), NodeKind::Category)?;
                for child in children {
                    self.add_entry(child, node, &id)?;
                }
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        parent: usize,
        id: String,
        title: Option<String>,
        kind: NodeKind,
    ) -> Result<usize> {
        if self.index.contains_key(&id) {
            return Err(SlidesError::InvalidNavigationSpec(format!(
                "'{}' appears more than once",
                id
            )));
        }
        let position = self.nodes.len();
        self.nodes.push(NavNode {
            id: id.clone(),
            title,
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(position);
        self.index.insert(id, position);
        Ok(position)
    }

    fn sort_children(&mut self) {
        let ids: Vec<String> = self.nodes.iter().map(|node| node.id.clone()).collect();
        for node in &mut self.nodes {
            node.children.sort_by(|a, b| ids[*a].cmp(&ids[*b]));
        }
    }

    pub fn root(&self) -> &NavNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: &str) -> Option<&NavNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn children<'a>(&'a self, node: &'a NavNode) -> impl Iterator<Item = &'a NavNode> + 'a {
        node.children.iter().map(|&child| &self.nodes[child])
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        self.get(id).is_some_and(|node| node.kind == NodeKind::Leaf)
    }

    /// Identifiers of all leaves in depth-first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        let mut stack = vec![0];
        while let Some(position) = stack.pop() {
            let node = &self.nodes[position];
            if node.kind == NodeKind::Leaf {
                leaves.push(node.id.as_str());
            }
            stack.extend(node.children.iter().rev());
        }
        leaves
    }

    /// Compare the tree against the scanned documents.
    ///
    /// Orphaned pages are reported at info level. Dangling references are warnings,
    /// or an error in strict mode.
    pub fn validate(&self, documents: &[Document], strict: bool) -> Result<NavValidation> {
        let destinations: HashSet<&str> = documents
            .iter()
            .map(|document| document.relative_destination.as_str())
            .collect();

        let orphaned_pages: Vec<String> = documents
            .iter()
            .filter(|document| !self.is_leaf(&document.relative_destination))
            .map(|document| source_name(&document.relative_destination))
            .collect();

        if !orphaned_pages.is_empty() {
            let listing: Vec<String> = orphaned_pages
                .iter()
                .map(|page| format!("\t- {}", page))
                .collect();
            info!(
                "The following pages exist in the slides directory, but are not included in the 'nav' configuration:\n{}",
                listing.join("\n")
            );
        }

        let mut dangling_references = Vec::new();
        for leaf in self.leaves() {
            if destinations.contains(leaf) {
                continue;
            }
            let source = source_name(leaf);
            if strict {
                return Err(SlidesError::DanglingNavReference(source));
            }
            warn!("{}", SlidesError::DanglingNavReference(source.clone()));
            dangling_references.push(source);
        }

        Ok(NavValidation {
            orphaned_pages,
            dangling_references,
        })
    }

    /// Serializable tree of the root's children, with hrefs relative to the output root.
    pub fn items(&self) -> Vec<NavItem> {
        self.children(self.root()).map(|node| self.item(node)).collect()
    }

    fn item(&self, node: &NavNode) -> NavItem {
        let is_leaf = node.kind == NodeKind::Leaf;
        NavItem {
            id: node.id.clone(),
            title: node.title.clone().unwrap_or_else(|| last_segment(&node.id)),
            href: is_leaf.then(|| utils::encode_href(&node.id)),
            is_leaf,
            children: self.children(node).map(|child| self.item(child)).collect(),
        }
    }
}

/// Identifier of a declared leaf: the normalized path with the output suffix.
fn leaf_id(target: &str) -> Result<String> {
    let normalized = utils::normalize_path(Path::new(target));
    let relative = utils::path_to_slash(&normalized);
    if relative.is_empty() || relative.starts_with("..") || Path::new(target).is_absolute() {
        return Err(SlidesError::InvalidNavigationSpec(format!(
            "'{}' must be a path inside the slides directory",
            target
        )));
    }
    Ok(utils::replace_markdown_suffix(&relative))
}

fn last_segment(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

fn file_stem(id: &str) -> String {
    let name = last_segment(id);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

/// Name of the Markdown source that produces an output identifier
fn source_name(id: &str) -> String {
    match id.strip_suffix(".html") {
        Some(stem) => format!("{}.md", stem),
        None => id.to_string(),
    }
}
