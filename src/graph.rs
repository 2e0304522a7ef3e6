use std::collections::VecDeque;

/// Undirected graph over vertices `0..n` stored as adjacency lists.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    neighbours: Vec<Vec<usize>>,
}

impl Adjacency {
    pub fn with_size(n: usize) -> Self {
        Self {
            neighbours: vec![Vec::new(); n],
        }
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.neighbours[a].push(b);
        if a != b {
            self.neighbours[b].push(a);
        }
    }

    /// Labels connected components by breadth-first search.
    ///
    /// Component labels follow the smallest vertex of each component,
    /// i.e. they depend on vertex numbering only, never on edge order.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.neighbours.len();
        let mut visited = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            visited[start] = true;
            let mut members = Vec::new();
            while let Some(v) = queue.pop_front() {
                members.push(v);
                for &w in &self.neighbours[v] {
                    if !visited[w] {
                        visited[w] = true;
                        queue.push_back(w);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }
}
