use rand::{Rng, SeedableRng};
use steiner_extreduce::{reduce_edges, DistParams, ExtParams, Graph};

/// A `side` x `side` grid with random costs, some extra diagonals and a few terminals.
fn random_grid(rng: &mut impl Rng, side: usize) -> Graph {
    let mut g = Graph::with_capacity(side * side, 6 * side * side);
    for _ in 0..side * side {
        g.add_vertex(rng.gen_bool(0.15));
    }
    let id = |r: usize, c: usize| r * side + c;
    for r in 0..side {
        for c in 0..side {
            let cost = rng.gen_range(1..20) as f64;
            if c + 1 < side {
                g.add_edge(id(r, c), id(r, c + 1), cost, cost);
            }
            let cost = rng.gen_range(1..20) as f64;
            if r + 1 < side {
                g.add_edge(id(r, c), id(r + 1, c), cost, cost);
            }
            if r + 1 < side && c + 1 < side && rng.gen_bool(0.3) {
                let cost = rng.gen_range(5..40) as f64;
                g.add_edge(id(r, c), id(r + 1, c + 1), cost, cost);
            }
        }
    }
    g
}

fn main() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(4815162342);
    let mut g = random_grid(&mut rng, 8);
    let n_terms = g.vertex_ids().filter(|&v| g.is_term(v)).count();
    println!(
        "Created an 8x8 grid with {} edges and {n_terms} terminals",
        g.n_live_edges()
    );
    let params = ExtParams::default();
    match reduce_edges(&mut g, &DistParams::default(), &params) {
        Ok(n_deleted) => println!(
            "Extension deleted {n_deleted} edges with {params:?}, {} edges left",
            g.n_live_edges()
        ),
        Err(err) => eprintln!("Invalid parameters: {err}"),
    }
    let map = g.pack();
    println!(
        "Packed graph: {} vertices, {} edge slots (was {})",
        g.n_vertices(),
        g.n_edges(),
        map.edges.len()
    );
}
