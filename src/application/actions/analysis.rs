//! # Analysis Actions
//!
//! Read-only inspection of the project tree: `list_files` and `analyze_code`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ActionHandler;
use crate::domain::errors::ActionError;
use crate::domain::file_tree;
use crate::domain::traits::FileStore;
use crate::domain::types::{
    Action, ActionCategory, ActionKind, ActionResult, AnalyzeTarget, FileNode, NodeKind,
};

/// Files that are loaded by the runtime rather than referenced from code.
const ENTRY_FILES: &[&str] = &[
    "index.html",
    "index.js",
    "index.ts",
    "main.js",
    "main.ts",
    "server.js",
    "package.json",
    "README.md",
];

const CODE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "css", "rs", "py", "json"];

#[derive(Debug, Serialize)]
struct ListedFile {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: NodeKind,
}

#[derive(Debug, Serialize)]
struct SourceProblem {
    path: String,
    message: String,
}

pub struct AnalysisHandler {
    files: Arc<dyn FileStore>,
}

impl AnalysisHandler {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self { files }
    }

    async fn list_files(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let tree = self.files.tree().await;
        let base = file_tree::normalize(action.path.as_deref().unwrap_or_default());

        let children: &[FileNode] = if base.is_empty() {
            &tree
        } else {
            match file_tree::find(&tree, &base) {
                Some(node) if node.is_dir() => &node.children,
                Some(node) => std::slice::from_ref(node),
                None => return Err(ActionError::NotFound(base)),
            }
        };

        let mut listed = Vec::new();
        if action.recursive {
            file_tree::walk(children, &mut |node| listed.push(listed_file(node)));
        } else {
            listed.extend(children.iter().map(listed_file));
        }

        let output = listed
            .iter()
            .map(|f| {
                let marker = if f.kind == NodeKind::Directory { "[dir]" } else { "[file]" };
                format!("{} {}", marker, f.path)
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ActionResult::ok(action, output).with_data(json!({ "files": listed })))
    }

    async fn analyze_code(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let raw = action.target.as_deref().unwrap_or_default();
        let target: AnalyzeTarget = raw
            .parse()
            .map_err(|value: String| ActionError::invalid("target", value))?;

        let tree = self.files.tree().await;
        let analysis = match target {
            AnalyzeTarget::Dependencies => analyze_dependencies(&tree),
            AnalyzeTarget::Structure => analyze_structure(&tree),
            AnalyzeTarget::Errors => json!({ "errors": find_source_problems(&tree) }),
            AnalyzeTarget::Unused => json!({ "unused_files": find_unused_files(&tree) }),
        };

        let output = serde_json::to_string_pretty(&analysis)
            .map_err(|e| ActionError::Collaborator(e.into()))?;
        Ok(ActionResult::ok(action, output).with_data(analysis))
    }
}

#[async_trait]
impl ActionHandler for AnalysisHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Analysis
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        match action.kind {
            ActionKind::ListFiles => self.list_files(action).await,
            ActionKind::AnalyzeCode => self.analyze_code(action).await,
            _ => Err(ActionError::UnknownKind(action.kind.to_string())),
        }
    }
}

fn listed_file(node: &FileNode) -> ListedFile {
    ListedFile {
        name: node.name.clone(),
        path: node.path.clone(),
        kind: node.kind,
    }
}

fn extension(name: &str) -> &str {
    name.rsplit_once('.').map_or("unknown", |(_, ext)| ext)
}

fn analyze_dependencies(tree: &[FileNode]) -> Value {
    let manifest = file_tree::files(tree)
        .into_iter()
        .find(|node| node.name == "package.json");

    let Some(content) = manifest.and_then(|node| node.content.as_deref()) else {
        return json!({ "dependencies": {}, "dev_dependencies": {} });
    };

    match serde_json::from_str::<Value>(content) {
        Ok(parsed) => {
            let section = |key: &str| {
                parsed
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()))
            };
            json!({
                "dependencies": section("dependencies"),
                "dev_dependencies": section("devDependencies"),
            })
        }
        Err(_) => json!({
            "dependencies": {},
            "dev_dependencies": {},
            "error": "Failed to parse package.json",
        }),
    }
}

fn analyze_structure(tree: &[FileNode]) -> Value {
    let mut total_files = 0usize;
    let mut total_directories = 0usize;
    let mut by_extension: BTreeMap<String, usize> = BTreeMap::new();

    file_tree::walk(tree, &mut |node| match node.kind {
        NodeKind::File => {
            total_files += 1;
            *by_extension
                .entry(extension(&node.name).to_string())
                .or_default() += 1;
        }
        NodeKind::Directory => total_directories += 1,
    });

    json!({
        "total_files": total_files,
        "total_directories": total_directories,
        "by_extension": by_extension,
    })
}

fn find_source_problems(tree: &[FileNode]) -> Vec<SourceProblem> {
    let mut problems = Vec::new();

    for node in file_tree::files(tree) {
        let content = node.content.as_deref().unwrap_or_default();
        let ext = extension(&node.name);

        if ext == "json" {
            if let Err(e) = serde_json::from_str::<Value>(content) {
                problems.push(SourceProblem {
                    path: node.path.clone(),
                    message: format!("Invalid JSON: {}", e),
                });
            }
        } else if CODE_EXTENSIONS.contains(&ext) {
            if let Some(message) = bracket_mismatch(content) {
                problems.push(SourceProblem {
                    path: node.path.clone(),
                    message,
                });
            }
        }
    }

    problems
}

/// Checks `()`, `[]` and `{}` balance, skipping string literals and comments.
fn bracket_mismatch(source: &str) -> Option<String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut line = 1;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q || (c == '\n' && q != '`') {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_line)) => {
                        return Some(format!(
                            "Mismatched `{}` on line {} (opened `{}` on line {})",
                            c, line, open, open_line
                        ));
                    }
                    None => return Some(format!("Unexpected `{}` on line {}", c, line)),
                }
            }
            _ => {}
        }
    }

    stack
        .pop()
        .map(|(open, open_line)| format!("Unclosed `{}` from line {}", open, open_line))
}

fn find_unused_files(tree: &[FileNode]) -> Vec<String> {
    let files = file_tree::files(tree);

    files
        .iter()
        .filter(|node| !ENTRY_FILES.contains(&node.name.as_str()))
        .filter(|node| {
            !files.iter().any(|other| {
                other.path != node.path
                    && other
                        .content
                        .as_deref()
                        .is_some_and(|content| content.contains(node.name.as_str()))
            })
        })
        .map(|node| node.path.clone())
        .collect()
}
