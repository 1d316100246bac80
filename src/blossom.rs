//! Blossom
//!
//! Native maximum-weight matching on general graphs with Edmonds' blossom algorithm and a primal-dual update,
//! in the form popularized by Galil's "Efficient algorithms for finding maximum matching in graphs".
//! The algorithm takes `O(n^3)` time and only uses integer arithmetic: with integer weights every dual variable
//! stays an integer, and so does every slack.
//!
//! Minimum-weight perfect matching is reduced to maximum-cardinality maximum-weight matching on `max_weight - weight`.
//!

use super::util::*;

const NONE: usize = usize::MAX;

/// index into a blossom's cyclic child list, where negative positions count from the back
#[inline]
fn cyclic<T: Copy>(list: &[T], position: isize) -> T {
    list[position.rem_euclid(list.len() as isize) as usize]
}

/// solver state; vertices are `0..node_num` and blossoms are `node_num..2*node_num`
#[derive(Debug, Clone)]
pub struct MaximumWeightMatching {
    node_num: usize,
    edges: Vec<(usize, usize, Weight)>,
    /// endpoint `p` of edge `p / 2`, the two endpoints of an edge being `p` and `p ^ 1`
    endpoint: Vec<usize>,
    /// the remote endpoints of the edges incident to each vertex
    neighbor_endpoints: Vec<Vec<usize>>,
    /// the remote endpoint of the matched edge of each vertex
    mate: Vec<usize>,
    /// 0 free, 1 S-vertex/blossom, 2 T-vertex/blossom, bit 4 is a temporary mark during [`Self::scan_blossom`]
    label: Vec<u8>,
    /// the endpoint through which a vertex or blossom got its label
    label_end: Vec<usize>,
    /// the top-level blossom containing each vertex
    in_blossom: Vec<usize>,
    blossom_parent: Vec<usize>,
    /// sub-blossoms of each blossom in cyclic order, starting with the base
    blossom_children: Vec<Vec<usize>>,
    blossom_base: Vec<usize>,
    /// `blossom_endpoints[b][i]` connects `blossom_children[b][i]` and `blossom_children[b][i + 1]`
    blossom_endpoints: Vec<Vec<usize>>,
    /// least-slack edge to a different S-blossom, or to an S-vertex for free vertices
    best_edge: Vec<usize>,
    /// least-slack edges to neighboring S-blossoms of each non-trivial S-blossom
    blossom_best_edges: Vec<Option<Vec<usize>>>,
    unused_blossoms: Vec<usize>,
    dual_var: Vec<Weight>,
    /// tight edges that are allowed in the alternating tree
    allow_edge: Vec<bool>,
    /// S-vertices whose neighbors are yet to be scanned
    queue: Vec<usize>,
}

impl MaximumWeightMatching {
    pub fn new(node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Self {
        let max_weight = weighted_edges.iter().map(|&(_, _, weight)| weight).max().unwrap_or(0).max(0);
        let mut endpoint = Vec::with_capacity(2 * weighted_edges.len());
        let mut neighbor_endpoints = vec![vec![]; node_num];
        for (k, &(i, j, _)) in weighted_edges.iter().enumerate() {
            assert!(i < node_num && j < node_num && i != j, "invalid edge ({i}, {j})");
            endpoint.push(i);
            endpoint.push(j);
            neighbor_endpoints[i].push(2 * k + 1);
            neighbor_endpoints[j].push(2 * k);
        }
        let mut dual_var = vec![max_weight; node_num];
        dual_var.extend(std::iter::repeat(0).take(node_num));
        Self {
            node_num,
            edges: weighted_edges.to_vec(),
            endpoint,
            neighbor_endpoints,
            mate: vec![NONE; node_num],
            label: vec![0; 2 * node_num],
            label_end: vec![NONE; 2 * node_num],
            in_blossom: (0..node_num).collect(),
            blossom_parent: vec![NONE; 2 * node_num],
            blossom_children: vec![vec![]; 2 * node_num],
            blossom_base: (0..node_num).chain(std::iter::repeat(NONE).take(node_num)).collect(),
            blossom_endpoints: vec![vec![]; 2 * node_num],
            best_edge: vec![NONE; 2 * node_num],
            blossom_best_edges: vec![None; 2 * node_num],
            unused_blossoms: (node_num..2 * node_num).collect(),
            dual_var,
            allow_edge: vec![false; weighted_edges.len()],
            queue: vec![],
        }
    }

    #[inline]
    fn slack(&self, k: usize) -> Weight {
        let (i, j, weight) = self.edges[k];
        self.dual_var[i] + self.dual_var[j] - 2 * weight
    }

    fn blossom_leaves(&self, b: usize) -> Vec<usize> {
        let mut leaves = vec![];
        self.collect_leaves(b, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, b: usize, leaves: &mut Vec<usize>) {
        if b < self.node_num {
            leaves.push(b);
        } else {
            for &child in self.blossom_children[b].iter() {
                self.collect_leaves(child, leaves);
            }
        }
    }

    /// label the top-level blossom of `w` with `t` through endpoint `p`; a T-label propagates an S-label to the mate of its base
    fn assign_label(&mut self, w: usize, t: u8, p: usize) {
        let b = self.in_blossom[w];
        debug_assert!(self.label[w] == 0 && self.label[b] == 0);
        self.label[w] = t;
        self.label[b] = t;
        self.label_end[w] = p;
        self.label_end[b] = p;
        self.best_edge[w] = NONE;
        self.best_edge[b] = NONE;
        if t == 1 {
            let leaves = self.blossom_leaves(b);
            self.queue.extend(leaves);
        } else if t == 2 {
            let base = self.blossom_base[b];
            let mate_base = self.mate[base];
            debug_assert_ne!(mate_base, NONE, "the base of a T-blossom must be matched");
            self.assign_label(self.endpoint[mate_base], 1, mate_base ^ 1);
        }
    }

    /// trace back from `v` and `w` to find either a new blossom (its base) or an augmenting path (`NONE`)
    fn scan_blossom(&mut self, mut v: usize, mut w: usize) -> usize {
        let mut path = vec![];
        let mut base = NONE;
        while v != NONE || w != NONE {
            let mut b = self.in_blossom[v];
            if self.label[b] & 4 != 0 {
                base = self.blossom_base[b];
                break;
            }
            debug_assert_eq!(self.label[b], 1);
            path.push(b);
            self.label[b] = 5;
            if self.label_end[b] == NONE {
                // the base of an S-blossom without label end is a free vertex
                v = NONE;
            } else {
                v = self.endpoint[self.label_end[b]];
                b = self.in_blossom[v];
                debug_assert_eq!(self.label[b], 2);
                v = self.endpoint[self.label_end[b]];
            }
            if w != NONE {
                std::mem::swap(&mut v, &mut w);
            }
        }
        for b in path {
            self.label[b] = 1;
        }
        base
    }

    /// construct a new S-blossom with the given base through the edge `k` between two S-vertices
    fn add_blossom(&mut self, base: usize, k: usize) {
        let (mut v, mut w, _) = self.edges[k];
        let bb = self.in_blossom[base];
        let mut bv = self.in_blossom[v];
        let mut bw = self.in_blossom[w];
        let b = self.unused_blossoms.pop().expect("at most node_num / 2 blossoms exist at the same time");
        self.blossom_base[b] = base;
        self.blossom_parent[b] = NONE;
        self.blossom_parent[bb] = b;
        let mut path = vec![];
        let mut endpoints = vec![];
        while bv != bb {
            self.blossom_parent[bv] = b;
            path.push(bv);
            endpoints.push(self.label_end[bv]);
            v = self.endpoint[self.label_end[bv]];
            bv = self.in_blossom[v];
        }
        path.push(bb);
        path.reverse();
        endpoints.reverse();
        endpoints.push(2 * k);
        while bw != bb {
            self.blossom_parent[bw] = b;
            path.push(bw);
            endpoints.push(self.label_end[bw] ^ 1);
            w = self.endpoint[self.label_end[bw]];
            bw = self.in_blossom[w];
        }
        debug_assert_eq!(self.label[bb], 1);
        self.label[b] = 1;
        self.label_end[b] = self.label_end[bb];
        self.dual_var[b] = 0;
        self.blossom_children[b] = path.clone();
        self.blossom_endpoints[b] = endpoints;
        for leaf in self.blossom_leaves(b) {
            if self.label[self.in_blossom[leaf]] == 2 {
                // former T-vertices become S-vertices and must be scanned
                self.queue.push(leaf);
            }
            self.in_blossom[leaf] = b;
        }
        // least-slack edges to other S-blossoms
        let mut best_edge_to = vec![NONE; 2 * self.node_num];
        for &child in path.iter() {
            let neighbor_lists: Vec<Vec<usize>> = match self.blossom_best_edges[child].take() {
                Some(list) => vec![list],
                None => self
                    .blossom_leaves(child)
                    .into_iter()
                    .map(|leaf| self.neighbor_endpoints[leaf].iter().map(|p| p / 2).collect())
                    .collect(),
            };
            for list in neighbor_lists {
                for k in list {
                    let (i, j, _) = self.edges[k];
                    let j = if self.in_blossom[j] == b { i } else { j };
                    let bj = self.in_blossom[j];
                    if bj != b
                        && self.label[bj] == 1
                        && (best_edge_to[bj] == NONE || self.slack(k) < self.slack(best_edge_to[bj]))
                    {
                        best_edge_to[bj] = k;
                    }
                }
            }
            self.best_edge[child] = NONE;
        }
        let best_edges: Vec<usize> = best_edge_to.into_iter().filter(|&k| k != NONE).collect();
        self.best_edge[b] = NONE;
        for &k in best_edges.iter() {
            if self.best_edge[b] == NONE || self.slack(k) < self.slack(self.best_edge[b]) {
                self.best_edge[b] = k;
            }
        }
        self.blossom_best_edges[b] = Some(best_edges);
    }

    /// expand the given top-level blossom
    fn expand_blossom(&mut self, b: usize, end_stage: bool) {
        let children = self.blossom_children[b].clone();
        for &child in children.iter() {
            self.blossom_parent[child] = NONE;
            if child < self.node_num {
                self.in_blossom[child] = child;
            } else if end_stage && self.dual_var[child] == 0 {
                self.expand_blossom(child, end_stage);
            } else {
                for leaf in self.blossom_leaves(child) {
                    self.in_blossom[leaf] = child;
                }
            }
        }
        if !end_stage && self.label[b] == 2 {
            // relabel the sub-blossoms on the even-length path from the entry child to the base
            let endpoints = self.blossom_endpoints[b].clone();
            let entry_child = self.in_blossom[self.endpoint[self.label_end[b] ^ 1]];
            let mut j = children.iter().position(|&child| child == entry_child).expect("entry child exists") as isize;
            let (j_step, endpoint_trick): (isize, usize) = if j & 1 == 1 {
                j -= children.len() as isize;
                (1, 0)
            } else {
                (-1, 1)
            };
            let mut p = self.label_end[b];
            while j != 0 {
                let q = cyclic(&endpoints, j - endpoint_trick as isize);
                self.label[self.endpoint[p ^ 1]] = 0;
                self.label[self.endpoint[q ^ endpoint_trick ^ 1]] = 0;
                self.assign_label(self.endpoint[p ^ 1], 2, p);
                self.allow_edge[q / 2] = true;
                j += j_step;
                p = cyclic(&endpoints, j - endpoint_trick as isize) ^ endpoint_trick;
                self.allow_edge[p / 2] = true;
                j += j_step;
            }
            let bv = cyclic(&children, j);
            self.label[self.endpoint[p ^ 1]] = 2;
            self.label[bv] = 2;
            self.label_end[self.endpoint[p ^ 1]] = p;
            self.label_end[bv] = p;
            self.best_edge[bv] = NONE;
            j += j_step;
            // the remaining sub-blossoms lose their labels unless a leaf was reached from outside
            while cyclic(&children, j) != entry_child {
                let bv = cyclic(&children, j);
                if self.label[bv] == 1 {
                    j += j_step;
                    continue;
                }
                let labeled = self.blossom_leaves(bv).into_iter().find(|&leaf| self.label[leaf] != 0);
                if let Some(leaf) = labeled {
                    debug_assert_eq!(self.label[leaf], 2);
                    self.label[leaf] = 0;
                    let mate_of_base = self.mate[self.blossom_base[bv]];
                    self.label[self.endpoint[mate_of_base]] = 0;
                    self.assign_label(leaf, 2, self.label_end[leaf]);
                }
                j += j_step;
            }
        }
        self.label[b] = 0;
        self.label_end[b] = NONE;
        self.blossom_children[b].clear();
        self.blossom_endpoints[b].clear();
        self.blossom_base[b] = NONE;
        self.blossom_best_edges[b] = None;
        self.best_edge[b] = NONE;
        self.unused_blossoms.push(b);
    }

    /// swap matched and unmatched edges along the even path from vertex `v` to the base of blossom `b`
    fn augment_blossom(&mut self, b: usize, v: usize) {
        let mut t = v;
        while self.blossom_parent[t] != b {
            t = self.blossom_parent[t];
        }
        if t >= self.node_num {
            self.augment_blossom(t, v);
        }
        let children = self.blossom_children[b].clone();
        let endpoints = self.blossom_endpoints[b].clone();
        let i = children.iter().position(|&child| child == t).expect("child exists");
        let mut j = i as isize;
        let (j_step, endpoint_trick): (isize, usize) = if i & 1 == 1 {
            j -= children.len() as isize;
            (1, 0)
        } else {
            (-1, 1)
        };
        while j != 0 {
            j += j_step;
            let t = cyclic(&children, j);
            let p = cyclic(&endpoints, j - endpoint_trick as isize) ^ endpoint_trick;
            if t >= self.node_num {
                self.augment_blossom(t, self.endpoint[p]);
            }
            j += j_step;
            let t = cyclic(&children, j);
            if t >= self.node_num {
                self.augment_blossom(t, self.endpoint[p ^ 1]);
            }
            self.mate[self.endpoint[p]] = p ^ 1;
            self.mate[self.endpoint[p ^ 1]] = p;
        }
        // rotate so that the new base comes first
        self.blossom_children[b].rotate_left(i);
        self.blossom_endpoints[b].rotate_left(i);
        self.blossom_base[b] = self.blossom_base[self.blossom_children[b][0]];
        debug_assert_eq!(self.blossom_base[b], v);
    }

    /// swap matched and unmatched edges along the augmenting path through edge `k`
    fn augment_matching(&mut self, k: usize) {
        let (v, w, _) = self.edges[k];
        for (mut s, mut p) in [(v, 2 * k + 1), (w, 2 * k)] {
            loop {
                let bs = self.in_blossom[s];
                debug_assert_eq!(self.label[bs], 1);
                if bs >= self.node_num {
                    self.augment_blossom(bs, s);
                }
                self.mate[s] = p;
                if self.label_end[bs] == NONE {
                    break; // reached a free vertex
                }
                let t = self.endpoint[self.label_end[bs]];
                let bt = self.in_blossom[t];
                debug_assert_eq!(self.label[bt], 2);
                s = self.endpoint[self.label_end[bt]];
                let j = self.endpoint[self.label_end[bt] ^ 1];
                if bt >= self.node_num {
                    self.augment_blossom(bt, j);
                }
                self.mate[j] = self.label_end[bt];
                p = self.label_end[bt] ^ 1;
            }
        }
    }

    /// scan the neighbors of queued S-vertices, returning whether the matching was augmented
    fn scan_queue(&mut self) -> bool {
        while let Some(v) = self.queue.pop() {
            debug_assert_eq!(self.label[self.in_blossom[v]], 1);
            for idx in 0..self.neighbor_endpoints[v].len() {
                let p = self.neighbor_endpoints[v][idx];
                let k = p / 2;
                let w = self.endpoint[p];
                if self.in_blossom[v] == self.in_blossom[w] {
                    continue; // internal edge
                }
                let mut kslack = 0;
                if !self.allow_edge[k] {
                    kslack = self.slack(k);
                    if kslack <= 0 {
                        self.allow_edge[k] = true;
                    }
                }
                if self.allow_edge[k] {
                    if self.label[self.in_blossom[w]] == 0 {
                        self.assign_label(w, 2, p ^ 1);
                    } else if self.label[self.in_blossom[w]] == 1 {
                        let base = self.scan_blossom(v, w);
                        if base != NONE {
                            self.add_blossom(base, k);
                        } else {
                            self.augment_matching(k);
                            return true;
                        }
                    } else if self.label[w] == 0 {
                        // inside a T-blossom but not yet reached from outside
                        self.label[w] = 2;
                        self.label_end[w] = p ^ 1;
                    }
                } else if self.label[self.in_blossom[w]] == 1 {
                    let b = self.in_blossom[v];
                    if self.best_edge[b] == NONE || kslack < self.slack(self.best_edge[b]) {
                        self.best_edge[b] = k;
                    }
                } else if self.label[w] == 0 && (self.best_edge[w] == NONE || kslack < self.slack(self.best_edge[w])) {
                    self.best_edge[w] = k;
                }
            }
        }
        false
    }

    /// run the primal-dual stages; returns the matched peer of every vertex, `usize::MAX` when unmatched
    pub fn solve(mut self, max_cardinality: bool) -> Vec<usize> {
        let n = self.node_num;
        for _stage in 0..n {
            self.label.fill(0);
            self.best_edge.fill(NONE);
            for b in n..2 * n {
                self.blossom_best_edges[b] = None;
            }
            self.allow_edge.fill(false);
            self.queue.clear();
            for v in 0..n {
                if self.mate[v] == NONE && self.label[self.in_blossom[v]] == 0 {
                    self.assign_label(v, 1, NONE);
                }
            }
            let mut augmented = false;
            loop {
                if self.scan_queue() {
                    augmented = true;
                    break;
                }
                // no augmenting path under the current duals: find the largest dual update that keeps them feasible
                let mut delta_type = 0;
                let mut delta: Weight = 0;
                let mut delta_edge = NONE;
                let mut delta_blossom = NONE;
                if !max_cardinality {
                    delta_type = 1;
                    delta = self.dual_var[..n].iter().copied().min().unwrap_or(0);
                }
                for v in 0..n {
                    if self.label[self.in_blossom[v]] == 0 && self.best_edge[v] != NONE {
                        let d = self.slack(self.best_edge[v]);
                        if delta_type == 0 || d < delta {
                            delta = d;
                            delta_type = 2;
                            delta_edge = self.best_edge[v];
                        }
                    }
                }
                for b in 0..2 * n {
                    if self.blossom_parent[b] == NONE && self.label[b] == 1 && self.best_edge[b] != NONE {
                        let kslack = self.slack(self.best_edge[b]);
                        debug_assert_eq!(kslack % 2, 0, "integer weights keep slacks between S-blossoms even");
                        let d = kslack / 2;
                        if delta_type == 0 || d < delta {
                            delta = d;
                            delta_type = 3;
                            delta_edge = self.best_edge[b];
                        }
                    }
                }
                for b in n..2 * n {
                    if self.blossom_base[b] != NONE
                        && self.blossom_parent[b] == NONE
                        && self.label[b] == 2
                        && (delta_type == 0 || self.dual_var[b] < delta)
                    {
                        delta = self.dual_var[b];
                        delta_type = 4;
                        delta_blossom = b;
                    }
                }
                if delta_type == 0 {
                    // no further improvement possible with max cardinality
                    delta_type = 1;
                    delta = self.dual_var[..n].iter().copied().min().unwrap_or(0).max(0);
                }
                for v in 0..n {
                    match self.label[self.in_blossom[v]] {
                        1 => self.dual_var[v] -= delta,
                        2 => self.dual_var[v] += delta,
                        _ => {}
                    }
                }
                for b in n..2 * n {
                    if self.blossom_base[b] != NONE && self.blossom_parent[b] == NONE {
                        match self.label[b] {
                            1 => self.dual_var[b] += delta,
                            2 => self.dual_var[b] -= delta,
                            _ => {}
                        }
                    }
                }
                match delta_type {
                    1 => break,
                    2 => {
                        self.allow_edge[delta_edge] = true;
                        let (i, j, _) = self.edges[delta_edge];
                        let i = if self.label[self.in_blossom[i]] == 0 { j } else { i };
                        debug_assert_eq!(self.label[self.in_blossom[i]], 1);
                        self.queue.push(i);
                    }
                    3 => {
                        self.allow_edge[delta_edge] = true;
                        let (i, _, _) = self.edges[delta_edge];
                        debug_assert_eq!(self.label[self.in_blossom[i]], 1);
                        self.queue.push(i);
                    }
                    _ => self.expand_blossom(delta_blossom, false),
                }
            }
            if !augmented {
                break;
            }
            // expand S-blossoms whose dual reached zero
            for b in n..2 * n {
                if self.blossom_parent[b] == NONE && self.blossom_base[b] != NONE && self.label[b] == 1 && self.dual_var[b] == 0 {
                    self.expand_blossom(b, true);
                }
            }
        }
        (0..n)
            .map(|v| if self.mate[v] == NONE { NONE } else { self.endpoint[self.mate[v]] })
            .collect()
    }
}

/// minimum-weight perfect matching; a vertex is matched to `usize::MAX` only if no perfect matching exists
///
/// This is the O(n³) blossom algorithm with n the number of nodes, i.e. twice the number of defects including
/// their boundary copies. It is not sub-cubic; the matching decoder keeps the input small by only passing the
/// reduced graph, where a defect pair is dropped whenever matching both of them to the boundary is no worse.
pub fn safe_minimum_weight_perfect_matching(node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Vec<usize> {
    let max_weight = weighted_edges.iter().map(|&(_, _, weight)| weight).max().unwrap_or(0);
    let inverted: Vec<(usize, usize, Weight)> = weighted_edges
        .iter()
        .map(|&(i, j, weight)| {
            debug_assert!(weight >= 0, "weights must be non-negative");
            (i, j, max_weight - weight)
        })
        .collect();
    MaximumWeightMatching::new(node_num, &inverted).solve(true)
}
