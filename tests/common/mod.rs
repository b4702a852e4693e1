use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use flexi_logger::{Logger, LoggerHandle};
use rand::Rng;
use steiner_extreduce::{graph::Vertex, Cost, Graph, SpecialDistance};

#[allow(dead_code)]
pub static LOGGER: LazyLock<Mutex<LoggerHandle>> = LazyLock::new(|| {
    Mutex::new(
        Logger::try_with_env_or_str("info")
            .unwrap()
            .write_mode(flexi_logger::WriteMode::SupportCapture)
            .log_to_stdout()
            .set_palette("196;208;3;7;8".to_owned())
            .format(|w, now, record| {
                let style = flexi_logger::style(record.level());
                write!(
                    w,
                    "{} {pref}[{}] {}{suf}",
                    now.format("%H:%M:%S"),
                    &record.level().as_str()[0..1],
                    record.args(),
                    pref = style.prefix(),
                    suf = style.suffix(),
                )
            })
            .start()
            .unwrap(),
    )
});

#[allow(dead_code)]
pub fn init_logger() {
    let _ = &*LOGGER;
}

/// Special distances from a table, the same in both directions.
#[derive(Debug, Default)]
pub struct TableSd(HashMap<(Vertex, Vertex), Cost>);

#[allow(dead_code)]
impl TableSd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, u: Vertex, v: Vertex, d: Cost) -> Self {
        self.0.insert((u.min(v), u.max(v)), d);
        self
    }
}

impl SpecialDistance for TableSd {
    fn sd(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        if u == v {
            return Some(0.0);
        }
        self.0.get(&(u.min(v), u.max(v))).copied()
    }
}

/// Builds a graph with `n` non-terminal vertices and undirected `edges`.
#[allow(dead_code)]
pub fn graph_from(n: usize, terminals: &[Vertex], edges: &[(Vertex, Vertex, Cost)]) -> Graph {
    let mut g = Graph::new();
    for v in 0..n {
        g.add_vertex(terminals.contains(&v));
    }
    for &(u, v, c) in edges {
        g.add_edge(u, v, c, c);
    }
    g
}

/// Random connected graph with symmetric integer costs.
#[allow(dead_code)]
pub fn random_connected_graph(rng: &mut impl Rng, n: usize, extra: usize, n_terms: usize) -> Graph {
    let mut g = Graph::new();
    for v in 0..n {
        g.add_vertex(v < n_terms);
    }
    for v in 1..n {
        let u = rng.gen_range(0..v);
        let c = rng.gen_range(1..10) as Cost;
        g.add_edge(u, v, c, c);
    }
    for _ in 0..extra {
        let u = rng.gen_range(0..n);
        let v = rng.gen_range(0..n);
        if u != v && g.find_edge(u, v).is_none() {
            let c = rng.gen_range(1..10) as Cost;
            g.add_edge(u, v, c, c);
        }
    }
    g
}

/// Random connected prize-collecting graph. About half of the vertices get a prize, and
/// about half of those are also flagged as terminals.
#[allow(dead_code)]
pub fn random_pc_graph(rng: &mut impl Rng, n: usize, extra: usize) -> Graph {
    let base = random_connected_graph(rng, n, extra, 0);
    let mut g = Graph::new_pc();
    for v in 0..n {
        let prize = if rng.gen_bool(0.5) {
            rng.gen_range(1..12) as Cost
        } else {
            0.0
        };
        g.add_vertex(prize > 0.0 && rng.gen_bool(0.5));
        if prize > 0.0 {
            g.set_prize(v, prize);
        }
    }
    for e in base.live_edges() {
        g.add_edge(base.tail(e), base.head(e), base.cost(e), base.cost(e));
    }
    g
}

/// All-pairs shortest paths over live edges, None when unreachable.
#[allow(dead_code)]
pub fn floyd_warshall(g: &Graph) -> Vec<Vec<Option<Cost>>> {
    let n = g.n_vertices();
    let mut d = vec![vec![None; n]; n];
    for v in g.vertex_ids() {
        d[v][v] = Some(0.0);
        for e in g.out_edges(v) {
            let w = g.head(e);
            let c = g.cost(e);
            if d[v][w].map_or(true, |old| c < old) {
                d[v][w] = Some(c);
            }
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if let (Some(a), Some(b)) = (d[i][k], d[k][j]) {
                    if d[i][j].map_or(true, |old| a + b < old) {
                        d[i][j] = Some(a + b);
                    }
                }
            }
        }
    }
    d
}

/// Cost of an optimal Steiner tree by trying every set of non-terminals. Only for tiny
/// graphs with symmetric costs. None if the terminals can't be connected.
#[allow(dead_code)]
pub fn brute_steiner(g: &Graph) -> Option<Cost> {
    let vertices: Vec<Vertex> = g.vertex_ids().collect();
    let terms: Vec<Vertex> = vertices.iter().copied().filter(|&v| g.is_term(v)).collect();
    let optional: Vec<Vertex> = vertices.iter().copied().filter(|&v| !g.is_term(v)).collect();
    assert!(optional.len() <= 16, "too many vertices for brute force");
    if terms.len() <= 1 {
        return Some(0.0);
    }
    let mut best: Option<Cost> = None;
    for mask in 0u32..(1 << optional.len()) {
        let mut inside = vec![false; g.n_vertices()];
        for &t in &terms {
            inside[t] = true;
        }
        for (i, &v) in optional.iter().enumerate() {
            if mask & (1 << i) != 0 {
                inside[v] = true;
            }
        }
        if let Some(w) = induced_mst(g, &inside) {
            if best.map_or(true, |b| w < b) {
                best = Some(w);
            }
        }
    }
    best
}

/// Cost of an optimal prize-collecting tree, its edges plus the prizes of the vertices it
/// leaves out, by trying every nonempty vertex set. Only for tiny graphs.
#[allow(dead_code)]
pub fn brute_prize_collecting(g: &Graph) -> Cost {
    let vertices: Vec<Vertex> = g.vertex_ids().collect();
    assert!(vertices.len() <= 16, "too many vertices for brute force");
    let total: Cost = vertices.iter().map(|&v| g.prize(v)).sum();
    let mut best = total;
    for mask in 1u32..(1 << vertices.len()) {
        let mut inside = vec![false; g.n_vertices()];
        let mut kept = 0.0;
        for (i, &v) in vertices.iter().enumerate() {
            if mask & (1 << i) != 0 {
                inside[v] = true;
                kept += g.prize(v);
            }
        }
        if let Some(w) = induced_mst(g, &inside) {
            best = best.min(w + total - kept);
        }
    }
    best
}

/// Prim over the subgraph induced by `inside`, None if it is disconnected.
fn induced_mst(g: &Graph, inside: &[bool]) -> Option<Cost> {
    let n = g.n_vertices();
    let Some(start) = (0..n).find(|&v| inside[v]) else {
        return Some(0.0);
    };
    let mut key = vec![Cost::INFINITY; n];
    let mut done = vec![false; n];
    key[start] = 0.0;
    let mut total = 0.0;
    loop {
        let next = (0..n)
            .filter(|&v| inside[v] && !done[v] && key[v].is_finite())
            .min_by(|&a, &b| key[a].total_cmp(&key[b]));
        let Some(u) = next else { break };
        done[u] = true;
        total += key[u];
        for e in g.out_edges(u) {
            let w = g.head(e);
            if inside[w] && !done[w] && g.cost(e) < key[w] {
                key[w] = g.cost(e);
            }
        }
    }
    (0..n).all(|v| !inside[v] || done[v]).then_some(total)
}
