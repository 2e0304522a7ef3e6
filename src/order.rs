use std::collections::HashMap;

/// Mapping between ids of connectivity nodes (external) and indices of
/// calculation nodes (internal).
///
/// Several external nodes map to the same internal index if they are
/// connected by bridges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOrder {
    pub e2i: HashMap<String, usize>,
    /// Member ids of each calculation node, sorted.
    pub i2e: Vec<Vec<String>>,
}

impl NodeOrder {
    pub(crate) fn with_capacity(nb: usize) -> Self {
        Self {
            e2i: HashMap::with_capacity(nb),
            i2e: Vec::with_capacity(nb),
        }
    }

    /// Appends a calculation node with the given members and returns
    /// its index.
    pub(crate) fn push(&mut self, mut members: Vec<String>) -> usize {
        let index = self.i2e.len();
        members.sort();
        for id in &members {
            self.e2i.insert(id.clone(), index);
        }
        self.i2e.push(members);
        index
    }

    /// Index of the calculation node the connectivity node belongs to.
    pub fn index(&self, id_of_node: &str) -> Option<usize> {
        self.e2i.get(id_of_node).copied()
    }

    /// Number of calculation nodes.
    pub fn len(&self) -> usize {
        self.i2e.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i2e.is_empty()
    }
}
