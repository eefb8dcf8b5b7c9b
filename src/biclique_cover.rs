use crate::bidirected_graph::Handle;
use crate::bipartite_graph::BipartiteGraph;
use crate::error::BluntifyError;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Work bound under which the exact domino-free algorithm is attempted
const EXACT_COVER_WORK_LIMIT: usize = 65536;

/// A complete bipartite subgraph of a bipartite block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bipartition {
    pub left: Vec<Handle>,
    pub right: Vec<Handle>,
}

impl Bipartition {
    pub fn size(&self) -> usize {
        self.left.len() * self.right.len()
    }
}

/// Compute a biclique cover of the block. The exact cover of Amilhastre et
/// al. 1998 is used when the block is small enough and domino-free; the
/// greedy heuristic of Ene et al. 2008 otherwise. The result always covers
/// every edge of the block.
pub fn compute_biclique_cover(graph: &BipartiteGraph) -> Vec<Bipartition> {
    let work = graph.edge_count() * (graph.left_size() + graph.right_size());
    if work <= EXACT_COVER_WORK_LIMIT {
        if let Ok(cover) = domino_free_cover(graph) {
            if covers_all_edges(graph, &cover) {
                return cover;
            }
        }
    }
    heuristic_cover(graph)
}

fn covers_all_edges(graph: &BipartiteGraph, cover: &[Bipartition]) -> bool {
    let left_index: HashMap<Handle, usize> = graph
        .left
        .iter()
        .enumerate()
        .map(|(i, &h)| (h, i))
        .collect();
    let right_index: HashMap<Handle, usize> = graph
        .right
        .iter()
        .enumerate()
        .map(|(i, &h)| (h, i))
        .collect();

    let mut covered: HashSet<(usize, usize)> = HashSet::new();
    for biclique in cover {
        for l in &biclique.left {
            for r in &biclique.right {
                if let (Some(&li), Some(&ri)) = (left_index.get(l), right_index.get(r)) {
                    covered.insert((li, ri));
                }
            }
        }
    }
    for (li, adj) in graph.left_adj.iter().enumerate() {
        for &ri in adj {
            if !covered.contains(&(li, ri)) {
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Exact cover for domino-free blocks
// ---------------------------------------------------------------------------

/// Adjacency working copy used by the simplification
struct WorkingAdjacency {
    l2r: Vec<BTreeSet<usize>>,
    r2l: Vec<BTreeSet<usize>>,
}

impl WorkingAdjacency {
    fn new(graph: &BipartiteGraph) -> Self {
        WorkingAdjacency {
            l2r: graph
                .left_adj
                .iter()
                .map(|a| a.iter().copied().collect())
                .collect(),
            r2l: graph
                .right_adj
                .iter()
                .map(|a| a.iter().copied().collect())
                .collect(),
        }
    }
}

/// Amilhastre et al. 1998 algorithm 2: repeatedly find a node `u` whose
/// neighbourhood is contained in a neighbour-mate `v`'s and delete `v`'s
/// edges into `Nbd(u)`. The maximal bicliques survive simplification once
/// they are re-closed against the original adjacency (see `galois_closure`).
fn simplify(graph: &BipartiteGraph) -> BipartiteGraph {
    let mut adj = WorkingAdjacency::new(graph);
    simplify_side(&mut adj, false);
    simplify_side(&mut adj, true);

    let mut simplified = graph.clone();
    simplified.left_adj = adj.l2r.iter().map(|s| s.iter().copied().collect()).collect();
    simplified.right_adj = adj.r2l.iter().map(|s| s.iter().copied().collect()).collect();
    simplified
}

fn simplify_side(adj: &mut WorkingAdjacency, right_side: bool) {
    let n = if right_side {
        adj.r2l.len()
    } else {
        adj.l2r.len()
    };

    let mut changed = true;
    while changed {
        changed = false;
        'scan: for u in 0..n {
            let nbd_u = if right_side {
                adj.r2l[u].clone()
            } else {
                adj.l2r[u].clone()
            };
            if nbd_u.is_empty() {
                continue;
            }
            for v in 0..n {
                if v == u {
                    continue;
                }
                let contained = {
                    let nbd_v = if right_side { &adj.r2l[v] } else { &adj.l2r[v] };
                    nbd_u.is_subset(nbd_v)
                };
                if contained {
                    // v succeeds u: drop v's edges into Nbd(u)
                    for &w in &nbd_u {
                        if right_side {
                            adj.r2l[v].remove(&w);
                            adj.l2r[w].remove(&v);
                        } else {
                            adj.l2r[v].remove(&w);
                            adj.r2l[w].remove(&v);
                        }
                    }
                    changed = true;
                    break 'scan;
                }
            }
        }
    }
}

/// Galois tree of equivalence classes of left nodes around one centre,
/// keyed by common right-neighbourhoods within the two-hop subgraph.
struct CenteredGaloisTree {
    /// Global left indices per equivalence class
    equiv_classes: Vec<Vec<usize>>,
    /// Global right indices per class, ascending
    neighborhoods: Vec<Vec<usize>>,
    successors: Vec<Option<usize>>,
    predecessors: Vec<Vec<usize>>,
    failed: bool,
}

impl CenteredGaloisTree {
    fn new(graph: &BipartiteGraph, center: usize) -> Self {
        let mut tree = CenteredGaloisTree {
            equiv_classes: Vec::new(),
            neighborhoods: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            failed: false,
        };

        // Two-hop subgraph around the centre. Rightward edges are restricted
        // to the centre's neighbourhood.
        let mut left_idx: HashMap<usize, usize> = HashMap::new();
        let mut left_nodes: Vec<usize> = Vec::new();
        let mut left_edges: Vec<Vec<usize>> = Vec::new();
        let mut right_nodes: Vec<usize> = Vec::new();

        for &r in &graph.left_adj[center] {
            for &l in &graph.right_adj[r] {
                match left_idx.get(&l) {
                    None => {
                        left_idx.insert(l, left_nodes.len());
                        left_edges.push(vec![right_nodes.len()]);
                        left_nodes.push(l);
                    }
                    Some(&loc) => left_edges[loc].push(right_nodes.len()),
                }
            }
            right_nodes.push(r);
        }

        if left_nodes.is_empty() {
            // Isolated centre (its edges were simplified away); an empty
            // tree contributes nothing but is not a failure
            return tree;
        }

        // Partition the left nodes into equivalence classes by refining
        // with each right node's adjacency
        let mut class_of = vec![usize::MAX; left_nodes.len()];
        let mut next_class = 0usize;
        for (local_r, _) in right_nodes.iter().enumerate() {
            let mut refined: HashMap<usize, usize> = HashMap::new();
            for (local_l, edges) in left_edges.iter().enumerate() {
                if !edges.contains(&local_r) {
                    continue;
                }
                let class = class_of[local_l];
                match refined.get(&class) {
                    Some(&new_class) => class_of[local_l] = new_class,
                    None => {
                        refined.insert(class, next_class);
                        class_of[local_l] = next_class;
                        next_class += 1;
                    }
                }
            }
        }

        // Compact class ids and collect members, edges and neighbourhoods
        let mut compacted = vec![usize::MAX; next_class];
        let mut class_local_edges: Vec<Vec<usize>> = Vec::new();
        for (local_l, &raw_class) in class_of.iter().enumerate() {
            let class = if compacted[raw_class] == usize::MAX {
                compacted[raw_class] = tree.equiv_classes.len();
                tree.equiv_classes.push(Vec::new());
                class_local_edges.push(left_edges[local_l].clone());
                tree.neighborhoods.push(
                    left_edges[local_l]
                        .iter()
                        .map(|&j| right_nodes[j])
                        .collect(),
                );
                compacted[raw_class]
            } else {
                compacted[raw_class]
            };
            tree.equiv_classes[class].push(left_nodes[local_l]);
        }

        let class_count = tree.equiv_classes.len();

        // Group classes by degree (T_x(k) in Amilhastre)
        let mut degree_groups: Vec<Vec<usize>> = vec![Vec::new(); right_nodes.len() + 1];
        for (class, nbd) in tree.neighborhoods.iter().enumerate() {
            degree_groups[nbd.len()].push(class);
        }

        // Neighbourhoods of the right nodes in degree ordering (V(y))
        let mut degree_ordered: Vec<Vec<usize>> = vec![Vec::new(); right_nodes.len()];
        for group in &degree_groups {
            for &class in group {
                for &local_r in &class_local_edges[class] {
                    degree_ordered[local_r].push(class);
                }
            }
        }

        // Immediate successors must form a tree
        tree.successors = vec![None; class_count];
        tree.predecessors = vec![Vec::new(); class_count];
        for ordered in &degree_ordered {
            if ordered.is_empty() {
                continue;
            }
            let mut pred = ordered[0];
            for &succ in &ordered[1..] {
                match tree.successors[pred] {
                    None => {
                        tree.successors[pred] = Some(succ);
                        tree.predecessors[succ].push(pred);
                    }
                    Some(existing) if existing != succ => {
                        tree.failed = true;
                        return tree;
                    }
                    Some(_) => {}
                }
                pred = succ;
            }
        }

        // Neighbourhood ordering property: each predecessor's neighbourhood
        // must be contained in its successor's. The local edge lists are
        // ascending by construction.
        for class in 0..class_count {
            let succ_nbd = &class_local_edges[class];
            for &pred in &tree.predecessors[class] {
                let pred_nbd = &class_local_edges[pred];
                let mut p = 0;
                for &s in succ_nbd {
                    if p < pred_nbd.len() && s == pred_nbd[p] {
                        p += 1;
                    }
                }
                if p < pred_nbd.len() {
                    tree.failed = true;
                    return tree;
                }
            }
        }

        tree
    }

    fn ok(&self) -> bool {
        !self.failed
    }

    fn is_empty(&self) -> bool {
        self.equiv_classes.is_empty()
    }

    fn central_equivalence_class(&self) -> usize {
        let mut class = 0;
        while let Some(next) = self.successors[class] {
            class = next;
        }
        class
    }

    fn right_size(&self, class: usize) -> usize {
        self.neighborhoods[class].len()
    }

    fn first_edge(&self, class: usize) -> (usize, usize) {
        (self.equiv_classes[class][0], self.neighborhoods[class][0])
    }

    fn class_edges(&self, class: usize) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for &l in &self.equiv_classes[class] {
            for &r in &self.neighborhoods[class] {
                edges.push((l, r));
            }
        }
        edges
    }

    /// The maximal biclique anchored at a class: its right neighbourhood
    /// against the union of classes along the successor chain
    fn biclique(&self, class: usize) -> (Vec<usize>, Vec<usize>) {
        let right = self.neighborhoods[class].clone();
        let mut left = Vec::new();
        let mut cursor = Some(class);
        while let Some(c) = cursor {
            left.extend(self.equiv_classes[c].iter().copied());
            cursor = self.successors[c];
        }
        left.sort_unstable();
        left.dedup();
        (left, right)
    }
}

/// Galois lattice of maximal bicliques, merged from the per-centre trees
struct GaloisLattice {
    trees: Vec<CenteredGaloisTree>,
    /// (tree index, class index) per lattice node
    bicliques: Vec<(usize, usize)>,
    lattice: Vec<Vec<usize>>,
}

impl GaloisLattice {
    fn new(graph: &BipartiteGraph) -> Result<Self, BluntifyError> {
        let mut trees = Vec::with_capacity(graph.left_size());
        for center in 0..graph.left_size() {
            let tree = CenteredGaloisTree::new(graph, center);
            if !tree.ok() {
                return Err(BluntifyError::NotDominoFree);
            }
            trees.push(tree);
        }

        let mut bicliques: Vec<(usize, usize)> = Vec::new();
        let mut lattice: Vec<Vec<usize>> = Vec::new();
        let mut biclique_index: HashMap<(usize, usize), usize> = HashMap::new();

        // For each edge, the maximal biclique of greatest right-size seen so
        // far that covers it
        let mut edge_max: HashMap<(usize, usize), (usize, usize)> = HashMap::new();

        for (tree_idx, tree) in trees.iter().enumerate() {
            if tree.is_empty() {
                continue;
            }
            // Stack frames: (owning lattice node, predecessor classes, cursor)
            let mut stack: Vec<(Option<usize>, Vec<usize>, usize)> =
                vec![(None, vec![tree.central_equivalence_class()], 0)];

            while !stack.is_empty() {
                let top = stack.len() - 1;
                if stack[top].2 == stack[top].1.len() {
                    stack.pop();
                    continue;
                }
                let owner = stack[top].0;
                let class = stack[top].1[stack[top].2];
                stack[top].2 += 1;

                let probe = tree.first_edge(class);
                let max_so_far = edge_max.get(&probe).copied();
                let max_size = max_so_far
                    .map(|(t, c)| trees[t].right_size(c))
                    .unwrap_or(0);
                let size_here = tree.right_size(class);

                let covering = match max_so_far {
                    Some(node) if size_here <= max_size => biclique_index[&node],
                    _ => {
                        let node = (tree_idx, class);
                        let idx = bicliques.len();
                        biclique_index.insert(node, idx);
                        bicliques.push(node);
                        lattice.push(Vec::new());
                        for edge in tree.class_edges(class) {
                            edge_max.insert(edge, node);
                        }
                        stack.push((Some(idx), tree.predecessors(class), 0));
                        idx
                    }
                };

                if let Some(owner_idx) = owner {
                    if owner_idx != covering {
                        lattice[owner_idx].push(covering);
                    }
                }
            }
        }

        for edges in &mut lattice {
            edges.sort_unstable();
            edges.dedup();
        }

        Ok(GaloisLattice {
            trees,
            bicliques,
            lattice,
        })
    }

    /// Minimum biclique cover = minimum node cut in the Menger expansion of
    /// the lattice between a synthetic source over all lattice sources and a
    /// synthetic sink under all lattice sinks.
    fn separator(&self) -> Vec<usize> {
        let m = self.bicliques.len();
        if m == 0 {
            return Vec::new();
        }

        let mut is_source = vec![true; m];
        let mut sinks = Vec::new();
        for (i, succ) in self.lattice.iter().enumerate() {
            if succ.is_empty() {
                sinks.push(i);
            }
            for &j in succ {
                is_source[j] = false;
            }
        }

        // Menger expansion: interior node i becomes in_i/out_i joined by a
        // unit-capacity edge; lattice edges and source/sink attachments are
        // effectively uncapacitated
        let source = 2 * m;
        let sink = 2 * m + 1;
        let mut flow = Dinic::new(2 * m + 2);
        let infinite = m + 1;

        let mut across_edges = Vec::with_capacity(m);
        for i in 0..m {
            across_edges.push(flow.add_edge(2 * i, 2 * i + 1, 1));
        }
        for (i, marked) in is_source.iter().enumerate() {
            if *marked {
                flow.add_edge(source, 2 * i, infinite);
            }
        }
        for &i in &sinks {
            flow.add_edge(2 * i + 1, sink, infinite);
        }
        for (i, succ) in self.lattice.iter().enumerate() {
            for &j in succ {
                flow.add_edge(2 * i + 1, 2 * j, infinite);
            }
        }

        flow.max_flow(source, sink);

        // The saturated across-the-node edges on the residual reachability
        // boundary are the cut
        let reachable = flow.residual_reachable(source);
        let mut cut = Vec::new();
        for (i, &edge) in across_edges.iter().enumerate() {
            if reachable[2 * i] && !reachable[2 * i + 1] && flow.is_saturated(edge) {
                cut.push(i);
            }
        }
        cut
    }

    fn biclique_cover(&self, graph: &BipartiteGraph) -> Vec<Bipartition> {
        self.separator()
            .into_iter()
            .map(|i| {
                let (tree_idx, class) = self.bicliques[i];
                let (left_idx, right_idx) = self.trees[tree_idx].biclique(class);
                Bipartition {
                    left: left_idx.into_iter().map(|i| graph.left[i]).collect(),
                    right: right_idx.into_iter().map(|j| graph.right[j]).collect(),
                }
            })
            .collect()
    }
}

impl CenteredGaloisTree {
    fn predecessors(&self, class: usize) -> Vec<usize> {
        self.predecessors[class].clone()
    }
}

/// Re-close a biclique of the simplified graph against the original
/// adjacency: the right set becomes the common neighbourhood of the left
/// seed, and the left set the common neighbourhood of that right set.
fn galois_closure(graph: &BipartiteGraph, biclique: &Bipartition) -> Option<Bipartition> {
    let left_index: HashMap<Handle, usize> = graph
        .left
        .iter()
        .enumerate()
        .map(|(i, &h)| (h, i))
        .collect();

    let mut seed = biclique.left.iter().filter_map(|h| left_index.get(h));
    let first = *seed.next()?;

    let mut right: BTreeSet<usize> = graph.left_adj[first].iter().copied().collect();
    for &l in seed {
        let nbd: BTreeSet<usize> = graph.left_adj[l].iter().copied().collect();
        right = right.intersection(&nbd).copied().collect();
    }
    if right.is_empty() {
        return None;
    }

    let mut left: Option<BTreeSet<usize>> = None;
    for &r in &right {
        let nbd: BTreeSet<usize> = graph.right_adj[r].iter().copied().collect();
        left = Some(match left {
            None => nbd,
            Some(prev) => prev.intersection(&nbd).copied().collect(),
        });
    }
    let left = left?;

    Some(Bipartition {
        left: left.into_iter().map(|i| graph.left[i]).collect(),
        right: right.into_iter().map(|j| graph.right[j]).collect(),
    })
}

fn domino_free_cover(graph: &BipartiteGraph) -> Result<Vec<Bipartition>, BluntifyError> {
    let simplified = simplify(graph);
    let lattice = GaloisLattice::new(&simplified)?;
    let cover = lattice.biclique_cover(&simplified);

    // Lift each biclique back to a maximal biclique of the unsimplified block
    let mut lifted = Vec::with_capacity(cover.len());
    for biclique in &cover {
        if let Some(closed) = galois_closure(graph, biclique) {
            lifted.push(closed);
        }
    }
    Ok(lifted)
}

// ---------------------------------------------------------------------------
// Heuristic cover (Ene et al. 2008)
// ---------------------------------------------------------------------------

/// Greedy cover: repeatedly seed on an uncovered edge, extend to the
/// biclique whose members' neighbourhoods contain the seed's neighbourhood,
/// and keep the candidate covering the most uncovered edges.
fn heuristic_cover(graph: &BipartiteGraph) -> Vec<Bipartition> {
    let mut uncovered: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (li, adj) in graph.left_adj.iter().enumerate() {
        for &ri in adj {
            uncovered.insert((li, ri));
        }
    }

    let left_sets: Vec<BTreeSet<usize>> = graph
        .left_adj
        .iter()
        .map(|a| a.iter().copied().collect())
        .collect();
    let right_sets: Vec<BTreeSet<usize>> = graph
        .right_adj
        .iter()
        .map(|a| a.iter().copied().collect())
        .collect();

    let mut cover = Vec::new();
    while !uncovered.is_empty() {
        let mut best: Option<(usize, Vec<usize>, Vec<usize>)> = None;

        for &(li, ri) in &uncovered {
            // Candidate seeded on the left endpoint: all of li's
            // neighbourhood, with every left node that still reaches it
            let right: Vec<usize> = left_sets[li].iter().copied().collect();
            let left: Vec<usize> = (0..graph.left_size())
                .filter(|&x| right.iter().all(|r| left_sets[x].contains(r)))
                .collect();
            let score = count_uncovered(&uncovered, &left, &right);
            if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                best = Some((score, left, right));
            }

            // Symmetric candidate seeded on the right endpoint
            let left2: Vec<usize> = right_sets[ri].iter().copied().collect();
            let right2: Vec<usize> = (0..graph.right_size())
                .filter(|&y| left2.iter().all(|l| right_sets[y].contains(l)))
                .collect();
            let score2 = count_uncovered(&uncovered, &left2, &right2);
            if best.as_ref().map(|(s, _, _)| score2 > *s).unwrap_or(true) {
                best = Some((score2, left2, right2));
            }
        }

        let (_, left, right) = best.expect("uncovered edge always yields a candidate");
        for &l in &left {
            for &r in &right {
                uncovered.remove(&(l, r));
            }
        }
        cover.push(Bipartition {
            left: left.into_iter().map(|i| graph.left[i]).collect(),
            right: right.into_iter().map(|j| graph.right[j]).collect(),
        });
    }
    cover
}

fn count_uncovered(uncovered: &BTreeSet<(usize, usize)>, left: &[usize], right: &[usize]) -> usize {
    let mut count = 0;
    for &l in left {
        for &r in right {
            if uncovered.contains(&(l, r)) {
                count += 1;
            }
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Dinic max flow
// ---------------------------------------------------------------------------

struct Dinic {
    adj: Vec<Vec<usize>>,
    to: Vec<usize>,
    cap: Vec<i64>,
}

impl Dinic {
    fn new(n: usize) -> Self {
        Dinic {
            adj: vec![Vec::new(); n],
            to: Vec::new(),
            cap: Vec::new(),
        }
    }

    /// Returns the forward edge id
    fn add_edge(&mut self, u: usize, v: usize, cap: usize) -> usize {
        let id = self.to.len();
        self.to.push(v);
        self.cap.push(cap as i64);
        self.adj[u].push(id);
        self.to.push(u);
        self.cap.push(0);
        self.adj[v].push(id + 1);
        id
    }

    fn is_saturated(&self, edge: usize) -> bool {
        self.cap[edge] == 0
    }

    fn bfs_levels(&self, source: usize, sink: usize) -> Option<Vec<i32>> {
        let mut level = vec![-1; self.adj.len()];
        level[source] = 0;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adj[u] {
                let v = self.to[e];
                if self.cap[e] > 0 && level[v] < 0 {
                    level[v] = level[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        if level[sink] < 0 {
            None
        } else {
            Some(level)
        }
    }

    fn dfs_augment(
        &mut self,
        u: usize,
        sink: usize,
        pushed: i64,
        level: &[i32],
        iter: &mut [usize],
    ) -> i64 {
        if u == sink {
            return pushed;
        }
        while iter[u] < self.adj[u].len() {
            let e = self.adj[u][iter[u]];
            let v = self.to[e];
            if self.cap[e] > 0 && level[v] == level[u] + 1 {
                let flow = self.dfs_augment(v, sink, pushed.min(self.cap[e]), level, iter);
                if flow > 0 {
                    self.cap[e] -= flow;
                    self.cap[e ^ 1] += flow;
                    return flow;
                }
            }
            iter[u] += 1;
        }
        0
    }

    fn max_flow(&mut self, source: usize, sink: usize) -> i64 {
        let mut total = 0;
        while let Some(level) = self.bfs_levels(source, sink) {
            let mut iter = vec![0; self.adj.len()];
            loop {
                let pushed = self.dfs_augment(source, sink, i64::MAX, &level, &mut iter);
                if pushed == 0 {
                    break;
                }
                total += pushed;
            }
        }
        total
    }

    fn residual_reachable(&self, source: usize) -> Vec<bool> {
        let mut seen = vec![false; self.adj.len()];
        seen[source] = true;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adj[u] {
                let v = self.to[e];
                if self.cap[e] > 0 && !seen[v] {
                    seen[v] = true;
                    queue.push_back(v);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidirected_graph::BiEdge;
    use crate::bidirected_ops::BidirectedGraph;
    use crate::cigar::Cigar;
    use crate::overlap_map::OverlapMap;

    /// Build a bipartite block directly from (left, right) side pairs
    fn block_from_pairs(pairs: &[(usize, usize)]) -> BipartiteGraph {
        let mut graph = BidirectedGraph::new();
        let mut overlaps = OverlapMap::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let max_id = pairs.iter().map(|&(a, b)| a.max(b)).max().unwrap();
        for id in 1..=max_id {
            graph.add_node(id, b"AC".to_vec());
        }
        for &(a, b) in pairs {
            // Left sides are right ends of forward handles; right sides are
            // left ends, reached through the flip
            let edge = BiEdge::new(Handle::forward(a), Handle::forward(b));
            graph.create_edge(edge.from, edge.to);
            overlaps.insert(edge, Cigar::from_str("1M").unwrap());
            left.push(Handle::forward(a));
            right.push(Handle::reverse(b));
        }
        BipartiteGraph::new(&graph, &overlaps, left, right)
    }

    fn assert_cover_is_complete(graph: &BipartiteGraph, cover: &[Bipartition]) {
        assert!(!cover.is_empty());
        assert!(covers_all_edges(graph, cover), "cover misses edges");
        // Every biclique pair must be a real edge of the block
        let edges: HashSet<(Handle, Handle)> = {
            let mut set = HashSet::new();
            for (li, adj) in graph.left_adj.iter().enumerate() {
                for &ri in adj {
                    set.insert((graph.left[li], graph.right[ri]));
                }
            }
            set
        };
        for biclique in cover {
            for &l in &biclique.left {
                for &r in &biclique.right {
                    assert!(edges.contains(&(l, r)), "cover invents edge {} {}", l, r);
                }
            }
        }
    }

    #[test]
    fn test_single_edge_cover() {
        let graph = block_from_pairs(&[(1, 2)]);
        let cover = compute_biclique_cover(&graph);
        assert_eq!(cover.len(), 1);
        assert_cover_is_complete(&graph, &cover);
    }

    #[test]
    fn test_fork_covered_by_one_biclique() {
        // One source overlapping two sinks: a 1x2 biclique
        let graph = block_from_pairs(&[(1, 2), (1, 3)]);
        let cover = compute_biclique_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
        assert_eq!(cover.len(), 1);
        assert_eq!(cover[0].left.len(), 1);
        assert_eq!(cover[0].right.len(), 2);
    }

    #[test]
    fn test_complete_bipartite_is_one_biclique() {
        let graph = block_from_pairs(&[(1, 3), (1, 4), (2, 3), (2, 4)]);
        let cover = compute_biclique_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
        assert_eq!(cover.len(), 1);
        assert_eq!(cover[0].size(), 4);
    }

    #[test]
    fn test_nested_neighborhoods() {
        // N(b) strictly inside N(a): two maximal bicliques, cover of size 2
        let graph = block_from_pairs(&[(1, 3), (1, 4), (2, 3)]);
        let cover = compute_biclique_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
        assert_eq!(cover.len(), 2);
    }

    #[test]
    fn test_domino_falls_through_to_heuristic() {
        // The domino itself: a: {x,y}, b: {x,y,z}, c: {y,z}
        let graph = block_from_pairs(&[(1, 4), (1, 5), (2, 4), (2, 5), (2, 6), (3, 5), (3, 6)]);
        let cover = compute_biclique_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
    }

    #[test]
    fn test_heuristic_on_k33() {
        let graph = block_from_pairs(&[
            (1, 4),
            (1, 5),
            (1, 6),
            (2, 4),
            (2, 5),
            (2, 6),
            (3, 4),
            (3, 5),
            (3, 6),
        ]);
        let cover = heuristic_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
        // K33 is itself a biclique; greedy finds it in one step
        assert_eq!(cover.len(), 1);
    }

    #[test]
    fn test_cover_crown_graph() {
        // K33 minus a perfect matching; minimum cover needs several bicliques
        let graph = block_from_pairs(&[(1, 5), (1, 6), (2, 4), (2, 6), (3, 4), (3, 5)]);
        let cover = compute_biclique_cover(&graph);
        assert_cover_is_complete(&graph, &cover);
    }

    #[test]
    fn test_dinic_unit_path() {
        let mut flow = Dinic::new(4);
        let a = flow.add_edge(0, 1, 1);
        flow.add_edge(1, 2, 1);
        flow.add_edge(2, 3, 1);
        assert_eq!(flow.max_flow(0, 3), 1);
        assert!(flow.is_saturated(a));
        let reach = flow.residual_reachable(0);
        assert!(reach[0]);
        assert!(!reach[3]);
    }
}
