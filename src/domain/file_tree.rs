//! # File Tree
//!
//! Pure operations on the nested `FileNode` project tree, shared by the
//! in-memory store and the analysis handlers.

use crate::domain::types::{FileNode, NodeKind};

/// Normalizes a project path: no leading `./` or `/`, no trailing `/`.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Inserts or replaces the file at `path`, creating directories on the way.
pub fn add_file(nodes: &mut Vec<FileNode>, path: &str, content: &str) {
    let normalized = normalize(path);
    let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return;
    }
    add_recursive(nodes, &parts, "", content);
}

fn add_recursive(nodes: &mut Vec<FileNode>, parts: &[&str], prefix: &str, content: &str) {
    let name = parts[0];
    let full_path = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    };

    if parts.len() == 1 {
        if let Some(existing) = nodes.iter_mut().find(|n| n.path == full_path) {
            existing.kind = NodeKind::File;
            existing.children.clear();
            existing.content = Some(content.to_string());
        } else {
            nodes.push(FileNode {
                name: name.to_string(),
                path: full_path,
                kind: NodeKind::File,
                children: Vec::new(),
                content: Some(content.to_string()),
            });
        }
        return;
    }

    let index = match nodes.iter().position(|n| n.name == name && n.is_dir()) {
        Some(index) => index,
        None => {
            nodes.push(FileNode {
                name: name.to_string(),
                path: full_path.clone(),
                kind: NodeKind::Directory,
                children: Vec::new(),
                content: None,
            });
            nodes.len() - 1
        }
    };
    add_recursive(&mut nodes[index].children, &parts[1..], &full_path, content);
}

/// Finds the node at `path` anywhere in the tree.
pub fn find<'a>(nodes: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
    let target = normalize(path);
    find_normalized(nodes, &target)
}

fn find_normalized<'a>(nodes: &'a [FileNode], target: &str) -> Option<&'a FileNode> {
    for node in nodes {
        if node.path == target {
            return Some(node);
        }
        if let Some(found) = find_normalized(&node.children, target) {
            return Some(found);
        }
    }
    None
}

/// Removes the node at `path` (and its subtree). Returns whether anything was removed.
pub fn remove(nodes: &mut Vec<FileNode>, path: &str) -> bool {
    let target = normalize(path);
    remove_normalized(nodes, &target)
}

fn remove_normalized(nodes: &mut Vec<FileNode>, target: &str) -> bool {
    let before = nodes.len();
    nodes.retain(|n| n.path != target);
    if nodes.len() != before {
        return true;
    }
    nodes
        .iter_mut()
        .any(|n| remove_normalized(&mut n.children, target))
}

/// Depth-first walk over every node.
pub fn walk<'a>(nodes: &'a [FileNode], visit: &mut dyn FnMut(&'a FileNode)) {
    for node in nodes {
        visit(node);
        walk(&node.children, visit);
    }
}

/// Every file node, depth-first.
pub fn files(nodes: &[FileNode]) -> Vec<&FileNode> {
    let mut out = Vec::new();
    walk(nodes, &mut |node| {
        if node.is_file() {
            out.push(node);
        }
    });
    out
}
