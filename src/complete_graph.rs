use super::util::*;
use crate::priority_queue::PriorityQueue;
use std::collections::BTreeMap;

/// build complete graph out of the decoding graph using Dijkstra's algorithm
#[derive(Debug, Clone)]
pub struct CompleteGraph {
    /// number of nodes
    pub node_num: usize,
    /// the nodes to run Dijkstra's algorithm
    pub nodes: Vec<CompleteGraphNode>,
    /// timestamp to invalidate all nodes without iterating them; only invalidating all nodes individually when active_timestamp is usize::MAX
    active_timestamp: usize,
    /// the two vertices of each decoding graph edge
    edge_vertices: Vec<(VertexIndex, VertexIndex)>,
    /// remember the edges that's modified by erasures
    edge_modifier: EdgeWeightModifier,
}

#[derive(Debug, Clone)]
pub struct CompleteGraphNode {
    /// all decoding graph edges connected to this node: `{ peer: (edge index, weight) }`; only the lightest of parallel edges is kept
    pub edges: BTreeMap<VertexIndex, (EdgeIndex, Weight)>,
    /// timestamp for Dijkstra's algorithm
    timestamp: usize,
}

/// result of a single-source Dijkstra: `{ peer: (previous, weight) }`
pub type ShortestPaths = BTreeMap<VertexIndex, (VertexIndex, Weight)>;

impl CompleteGraph {
    /// create complete graph given the weighted edges of the decoding graph, where the position of an edge is its index
    pub fn new(node_num: usize, weighted_edges: &[(VertexIndex, VertexIndex, Weight)]) -> Self {
        let mut nodes: Vec<CompleteGraphNode> = (0..node_num)
            .map(|_| CompleteGraphNode {
                edges: BTreeMap::new(),
                timestamp: 0,
            })
            .collect();
        for (edge_index, &(i, j, weight)) in weighted_edges.iter().enumerate() {
            for (a, b) in [(i, j), (j, i)] {
                let lighter = match nodes[a].edges.get(&b) {
                    Some(&(_, existing_weight)) => weight < existing_weight,
                    None => true,
                };
                if lighter {
                    nodes[a].edges.insert(b, (edge_index, weight));
                }
            }
        }
        Self {
            node_num,
            nodes,
            active_timestamp: 0,
            edge_vertices: weighted_edges.iter().map(|&(i, j, _)| (i, j)).collect(),
            edge_modifier: EdgeWeightModifier::new(),
        }
    }

    /// set the weight of erased edges to 0 until [`CompleteGraph::recover_erasures`] is called
    pub fn load_erasures(&mut self, erasures: &[EdgeIndex]) {
        debug_assert!(
            !self.edge_modifier.has_modified_edges(),
            "the current erasure modifier is not clean, probably forget to clean the state?"
        );
        for &edge_index in erasures.iter() {
            let (i, j) = self.edge_vertices[edge_index];
            // the entry may belong to a lighter parallel edge, which is the one to recover
            let &(original_index, original_weight) = self.nodes[i].edges.get(&j).expect("erased edge must exist");
            self.edge_modifier.push_modified_edge(original_index, original_weight);
            for (a, b) in [(i, j), (j, i)] {
                self.nodes[a].edges.insert(b, (edge_index, 0));
            }
        }
    }

    /// recover the original weights of all erased edges
    pub fn recover_erasures(&mut self) {
        while self.edge_modifier.has_modified_edges() {
            let (edge_index, original_weight) = self.edge_modifier.pop_modified_edge();
            let (i, j) = self.edge_vertices[edge_index];
            for (a, b) in [(i, j), (j, i)] {
                self.nodes[a].edges.insert(b, (edge_index, original_weight));
            }
        }
    }

    /// invalidate Dijkstra's algorithm state from previous call
    pub fn invalidate_previous_dijkstra(&mut self) -> usize {
        if self.active_timestamp == usize::MAX {
            // rarely happens
            self.active_timestamp = 0;
            for node in self.nodes.iter_mut() {
                node.timestamp = 0; // refresh all timestamps to avoid conflicts
            }
        }
        self.active_timestamp += 1; // implicitly invalidate all nodes
        self.active_timestamp
    }

    /// get all complete graph edges from the specific node, but will terminate if `terminate` node is found
    pub fn all_edges_with_terminate(&mut self, node: VertexIndex, terminate: VertexIndex) -> ShortestPaths {
        let active_timestamp = self.invalidate_previous_dijkstra();
        let mut pq = PriorityQueue::<usize, PriorityElement>::new();
        pq.push(node, PriorityElement::new(0, node));
        let mut computed_edges = ShortestPaths::new();
        while let Some((target, PriorityElement { weight, previous })) = pq.pop() {
            debug_assert!(!computed_edges.contains_key(&target), "this entry shouldn't have been set");
            // update entry
            self.nodes[target].timestamp = active_timestamp; // mark as visited
            if target != node {
                computed_edges.insert(target, (previous, weight));
                if target == terminate {
                    break; // early terminate
                }
            }
            // add its neighbors to priority queue
            for (&neighbor, &(_, neighbor_weight)) in self.nodes[target].edges.iter() {
                let edge_weight = weight + neighbor_weight;
                if let Some(PriorityElement {
                    weight: existing_weight,
                    previous: existing_previous,
                }) = pq.get_priority(&neighbor)
                {
                    // update the priority if weight is smaller or weight is equal but distance is smaller
                    // this is necessary if the graph has weight-0 edges, which could lead to cycles in the graph and cause deadlock
                    let mut update = &edge_weight < existing_weight;
                    if &edge_weight == existing_weight {
                        let distance = neighbor.abs_diff(target);
                        let existing_distance = neighbor.abs_diff(*existing_previous);
                        // prevent loop by enforcing strong non-descending
                        if distance < existing_distance || (distance == existing_distance && &target < existing_previous) {
                            update = true;
                        }
                    }
                    if update {
                        pq.change_priority(&neighbor, PriorityElement::new(edge_weight, target));
                    }
                } else if self.nodes[neighbor].timestamp != active_timestamp {
                    // insert new entry only if neighbor has not been visited
                    pq.push(neighbor, PriorityElement::new(edge_weight, target));
                }
            }
        }
        computed_edges
    }

    /// get all complete graph edges from the specific node
    pub fn all_edges(&mut self, node: VertexIndex) -> ShortestPaths {
        self.all_edges_with_terminate(node, usize::MAX)
    }

    /// the decoding graph edges along the shortest path from `a` to `b`, given the Dijkstra result `paths` rooted at `a`
    pub fn path_edges(&self, a: VertexIndex, b: VertexIndex, paths: &ShortestPaths) -> Vec<EdgeIndex> {
        let mut edges = Vec::new();
        let mut node = b;
        while node != a {
            let &(previous, _) = paths.get(&node).expect("path must exist for reachable nodes");
            let &(edge_index, _) = self.nodes[previous].edges.get(&node).expect("consecutive path nodes must be adjacent");
            edges.push(edge_index);
            node = previous;
        }
        edges.reverse();
        edges
    }
}

#[derive(Eq, Debug)]
pub struct PriorityElement {
    pub weight: Weight,
    pub previous: usize,
}

impl std::cmp::PartialEq for PriorityElement {
    #[inline]
    fn eq(&self, other: &PriorityElement) -> bool {
        self.weight == other.weight
    }
}

impl std::cmp::PartialOrd for PriorityElement {
    #[inline]
    fn partial_cmp(&self, other: &PriorityElement) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::cmp::Ord for PriorityElement {
    #[inline]
    fn cmp(&self, other: &PriorityElement) -> std::cmp::Ordering {
        other.weight.cmp(&self.weight) // reverse `self` and `other` to prioritize smaller weight
    }
}

impl PriorityElement {
    pub fn new(weight: Weight, previous: usize) -> Self {
        Self { weight, previous }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_graph_shortest_path_1() {  // cargo test complete_graph_shortest_path_1 -- --nocapture
        // 0 - 1 - 2 - 3 with a heavy shortcut 0 - 3 and a parallel edge 1 - 2
        let weighted_edges = vec![(0, 1, 2), (1, 2, 10), (2, 3, 2), (0, 3, 20), (1, 2, 4)];
        let mut complete_graph = CompleteGraph::new(4, &weighted_edges);
        assert_eq!(complete_graph.nodes[1].edges[&2], (4, 4));
        let paths = complete_graph.all_edges(0);
        assert_eq!(paths[&3], (2, 8));
        assert_eq!(complete_graph.path_edges(0, 3, &paths), vec![0, 4, 2]);
    }

    #[test]
    fn complete_graph_erasures_1() {  // cargo test complete_graph_erasures_1 -- --nocapture
        let weighted_edges = vec![(0, 1, 2), (1, 2, 10), (2, 3, 2), (0, 3, 20), (1, 2, 4)];
        let mut complete_graph = CompleteGraph::new(4, &weighted_edges);
        // erasing the heavy shortcut makes it free
        complete_graph.load_erasures(&[3, 1]);
        let paths = complete_graph.all_edges(0);
        assert_eq!(paths[&3], (0, 0));
        assert_eq!(complete_graph.path_edges(0, 3, &paths), vec![3]);
        assert_eq!(paths[&2].1, 2);
        complete_graph.recover_erasures();
        assert_eq!(complete_graph.nodes[1].edges[&2], (4, 4));
        assert_eq!(complete_graph.nodes[3].edges[&0], (3, 20));
        let paths = complete_graph.all_edges(0);
        assert_eq!(paths[&3], (2, 8));
    }

    #[test]
    fn complete_graph_repeated_dijkstra_1() {  // cargo test complete_graph_repeated_dijkstra_1 -- --nocapture
        let weighted_edges = vec![(0, 1, 2), (1, 2, 2), (2, 3, 2), (3, 0, 2)];
        let mut complete_graph = CompleteGraph::new(4, &weighted_edges);
        let first = complete_graph.all_edges(0);
        let _ = complete_graph.all_edges(2);
        let second = complete_graph.all_edges(0);
        assert_eq!(first, second);
        assert_eq!(first[&2].1, 4);
        // equal-weight paths resolve to the same predecessor every time
        assert_eq!(first[&2].0, second[&2].0);
    }
}
