use crate::node::BoxedNode;

/// Members of an agent group, addressable by name in insertion order.
#[derive(Default)]
pub struct AgentRoster {
    members: Vec<BoxedNode>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member; a later member with the same name replaces the earlier.
    pub fn register(&mut self, node: BoxedNode) {
        if let Some(slot) = self.members.iter_mut().find(|m| m.name() == node.name()) {
            *slot = node;
        } else {
            self.members.push(node);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&BoxedNode> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BoxedNode> {
        self.members.iter_mut().find(|m| m.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxedNode> {
        self.members.iter()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.members.first().map(|m| m.name())
    }

    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `[{name, description}]` summary, handy for moderator prompts.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.members
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": m.name(),
                        "description": m.state().description(),
                    })
                })
                .collect(),
        )
    }
}
