use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a study's navigation tree.
///
/// A node exclusively owns its children, so the tree can never contain cycles or
/// shared subtrees. IDs only need to be unique within a single tree; tasks refer to
/// nodes by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Whether this node or any of its descendants has the given ID.
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Depth-first search for the first node with the given ID.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

/// A prompt shown to a participant, and the node IDs that answer it correctly.
///
/// Answers are soft references: nothing in the store checks that they point at a
/// node of the owning study's tree. See [`Study::unknown_answers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub text: String,
    pub correct_answer: Vec<String>,
}

impl Task {
    pub fn new(text: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            correct_answer: vec![answer.into()],
        }
    }
}

/// A tree test: a navigation tree plus the tasks to run against it.
///
/// Studies are replaced wholesale on every write; there is no partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub tree: Node,
}

impl Study {
    /// The built-in demo study served under the `demo` key.
    pub fn example() -> Self {
        let tree = Node::new("homepage", "Homepage").with_children(vec![
            Node::new("shop", "Shop"),
            Node::new("settings", "Settings"),
            Node::new("account", "My Account").with_children(vec![
                Node::new("upgrade", "Upgrade my plan"),
                Node::new("profile", "Profile"),
                Node::new("balance", "Account balance"),
            ]),
        ]);

        Self {
            name: "Example Study".to_string(),
            tasks: vec![Task::new("Buy a jar.", "shop")],
            tree,
        }
    }

    /// Task answers that do not name any node in the tree, in task order.
    pub fn unknown_answers(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .flat_map(|task| task.correct_answer.iter())
            .filter(|answer| !self.tree.contains(answer))
            .map(String::as_str)
            .collect()
    }
}

/// A participant finished a study.
///
/// Handed to the configured [`crate::studies::CompletionHook`]. The payload is
/// whatever the client posted, if anything; the core does not interpret it.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub study_id: String,
    pub payload: Option<serde_json::Value>,
    pub completed_at: DateTime<Utc>,
}
