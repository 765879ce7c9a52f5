use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::shortcode::ShortcodeMap;

/// One node of the remote folder forest. Fields the pipeline does not use are
/// kept in `extra` so the checkpoint stays a faithful copy of the remote tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub children: Vec<FolderNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FolderNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shortcode: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FolderNode>) -> Self {
        self.children = children;
        self
    }

    pub fn require_shortcode(&self) -> Result<&str> {
        self.shortcode.as_deref().ok_or(Error::MissingCheckpoint {
            path: format!("shortcode of folder {}", self.id).into(),
            hint: "Run `index` to assign folder shortcodes.",
        })
    }
}

/// Parse the forest document the remote returns. `null` means no folders.
pub fn parse_forest(value: Value) -> Result<Vec<FolderNode>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| Error::shape(format!("folder forest: {e}")))
}

/// Every node of the forest with its ancestor chain, parents before
/// children, siblings in remote order.
pub fn preorder(forest: &[FolderNode]) -> Vec<(Vec<&FolderNode>, &FolderNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(Vec<&FolderNode>, &FolderNode)> =
        forest.iter().rev().map(|root| (Vec::new(), root)).collect();

    while let Some((ancestors, node)) = stack.pop() {
        let mut chain = ancestors.clone();
        chain.push(node);
        for child in node.children.iter().rev() {
            stack.push((chain.clone(), child));
        }
        out.push((ancestors, node));
    }
    out
}

/// Display path such as `Archive→2023`.
pub fn display_path(ancestors: &[&FolderNode], node: &FolderNode, separator: &str) -> String {
    ancestors
        .iter()
        .map(|a| a.name.as_str())
        .chain(std::iter::once(node.name.as_str()))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Rebuild folder shortcodes over every id in the forest and attach them.
pub fn assign_shortcodes(forest: &mut [FolderNode]) -> Result<ShortcodeMap> {
    let ids: Vec<String> = preorder(forest)
        .into_iter()
        .map(|(_, node)| node.id.clone())
        .collect();
    let map = ShortcodeMap::build(&ids)?;

    let mut stack: Vec<&mut FolderNode> = forest.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if let Some(code) = map.get(&node.id) {
            node.shortcode = Some(code.to_string());
        }
        stack.extend(node.children.iter_mut());
    }
    Ok(map)
}
