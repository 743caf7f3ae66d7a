use std::fmt;

/// Address of a text block inside a document.
///
/// The first index selects a top-level block. For list items each further
/// index selects an item, descending one nested sublist per step:
/// `[2, 0, 1]` is the second child of the first item of the list at block 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Top-level block index
    pub fn block(&self) -> Option<usize> {
        self.0.first().copied()
    }

    pub fn is_list_item(&self) -> bool {
        self.0.len() >= 2
    }

    /// Nesting depth of a list item (0 for top-level items and non-list blocks)
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(2)
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A caret position expressed against the document structure: the text
/// block and the char offset inside its content.
///
/// Markers are derived from a document and a global offset; they are never
/// stored in the document and must be recomputed after each edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorMarker {
    pub path: NodePath,
    pub offset: usize,
}

impl CursorMarker {
    pub fn new(path: impl Into<NodePath>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

impl fmt::Display for CursorMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path_depth() {
        assert_eq!(NodePath::new(vec![0]).depth(), 0);
        assert_eq!(NodePath::new(vec![1, 0]).depth(), 0);
        assert_eq!(NodePath::new(vec![1, 0, 2]).depth(), 1);
        assert!(!NodePath::new(vec![3]).is_list_item());
        assert!(NodePath::new(vec![3, 0]).is_list_item());
    }

    #[test]
    fn test_display() {
        let marker = CursorMarker::new(vec![2, 0, 1], 4);
        assert_eq!(marker.to_string(), "2.0.1@4");
    }
}
