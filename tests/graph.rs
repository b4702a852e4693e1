use rand::{Rng, SeedableRng};
use steiner_extreduce::graph::PseudoAncestorHash;
use steiner_extreduce::Graph;

use common::{graph_from, init_logger};

mod common;

fn degrees(g: &Graph) -> Vec<usize> {
    (0..g.n_vertices()).map(|v| g.degree(v)).collect()
}

fn sorted_out(g: &Graph, v: usize) -> Vec<usize> {
    let mut heads: Vec<_> = g.out_edges(v).map(|e| g.head(e)).collect();
    heads.sort();
    heads
}

#[test]
fn test_add_delete() {
    init_logger();
    let mut g = graph_from(4, &[0, 3], &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0)]);
    assert_eq!(degrees(&g), [1, 2, 2, 1]);
    assert_eq!(g.n_live_edges(), 3);
    let e = g.add_edge(0, 2, 5.0, 7.0);
    assert_eq!(e % 2, 0);
    assert_eq!(Graph::twin(e), e + 1);
    assert_eq!((g.tail(e), g.head(e), g.cost(e)), (0, 2, 5.0));
    assert_eq!((g.tail(e + 1), g.head(e + 1), g.cost(e + 1)), (2, 0, 7.0));
    assert_eq!(degrees(&g), [2, 2, 3, 1]);
    assert_eq!(sorted_out(&g, 2), [0, 1, 3]);
    assert_eq!(g.in_edges(2).count(), 3);
    assert!(g.in_edges(2).all(|f| g.head(f) == 2));

    // Deleting through the odd edge deletes the pair.
    assert!(g.delete_edge(e + 1));
    assert!(g.is_free(e) && g.is_free(e + 1));
    assert!(!g.delete_edge(e));
    assert_eq!(degrees(&g), [1, 2, 2, 1]);
    assert_eq!(sorted_out(&g, 2), [1, 3]);
    assert_eq!(g.n_live_edges(), 3);
    assert_eq!(g.find_edge(0, 2), None);
    assert_eq!(g.live_edges().collect::<Vec<_>>(), [0, 2, 4]);
}

#[test]
fn test_random_add_delete_restores_degrees() {
    init_logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(4815162342);
    const N: usize = 12;
    let mut g = Graph::new();
    for _ in 0..N {
        g.add_vertex(false);
    }
    let mut live = vec![];
    let mut deg = [0usize; N];
    for _ in 0..2000 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let u = rng.gen_range(0..N);
            let v = rng.gen_range(0..N - 1);
            let v = if v >= u { v + 1 } else { v };
            live.push(g.add_edge(u, v, 1.0, 1.0));
            deg[u] += 1;
            deg[v] += 1;
        } else {
            let e = live.swap_remove(rng.gen_range(0..live.len()));
            let (u, v) = (g.tail(e), g.head(e));
            assert!(g.delete_edge(e ^ rng.gen_range(0..2)));
            deg[u] -= 1;
            deg[v] -= 1;
        }
        assert_eq!(degrees(&g), deg);
        assert_eq!(g.n_live_edges(), live.len());
    }
    for v in 0..N {
        assert_eq!(g.out_edges(v).count(), deg[v]);
        assert_eq!(g.in_edges(v).count(), deg[v]);
    }
}

#[test]
fn test_delete_vertex() {
    let mut g = graph_from(3, &[], &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]);
    g.delete_vertex(1);
    assert!(!g.is_alive(1));
    assert_eq!(degrees(&g), [1, 0, 1]);
    assert_eq!(g.vertex_ids().collect::<Vec<_>>(), [0, 2]);
    assert_eq!(g.live_edges().collect::<Vec<_>>(), [4]);
}

#[test]
fn test_contract_cheaper_both_ways() {
    init_logger();
    let mut g = graph_from(
        4,
        &[1],
        &[(0, 1, 5.0), (1, 2, 3.0), (0, 2, 4.0), (1, 3, 2.0)],
    );
    g.contract_vertices(0, 1);
    assert!(!g.is_alive(1));
    assert!(g.is_term(0));
    assert_eq!(degrees(&g), [2, 0, 1, 1]);
    assert_eq!(g.n_live_edges(), 2);
    assert_eq!(g.vertex_ancestors(0).to_sorted_vec(), [0]);
    assert!(g.vertex_ancestors(1).is_empty());

    let c = g.find_edge(0, 2).unwrap();
    assert_eq!(c, 4);
    assert_eq!((g.cost(c), g.cost(c ^ 1)), (3.0, 3.0));
    // The edge from 1 won both directions, so only its ancestor remains.
    assert_eq!(g.ancestors(c).to_sorted_vec(), [1]);
    assert_eq!(g.pseudo_ancestors(c).to_sorted_vec(), [1]);

    let d = g.find_edge(0, 3).unwrap();
    assert_eq!(d, 6);
    assert_eq!(g.ancestors(d).to_sorted_vec(), [3]);
    assert_eq!(g.find_edge(3, 0), Some(7));
}

#[test]
fn test_contract_split_winner() {
    let mut g = Graph::new();
    for _ in 0..3 {
        g.add_vertex(false);
    }
    g.add_edge(0, 1, 1.0, 1.0);
    let f = g.add_edge(0, 2, 4.0, 1.0);
    g.add_edge(1, 2, 2.0, 6.0);
    g.contract_vertices(0, 1);
    assert_eq!((g.cost(f), g.cost(f ^ 1)), (2.0, 1.0));
    // Each edge provided one direction: both ancestors, once each.
    assert_eq!(g.ancestors(f).to_sorted_vec(), [1, 2]);
    assert_eq!(g.vertex_ancestors(0).to_sorted_vec(), [0]);
    assert_eq!(degrees(&g), [1, 0, 1]);
}

#[test]
fn test_contract_merges_vertex_provenance() {
    let mut g = graph_from(4, &[], &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
    g.contract_vertices(1, 0);
    g.contract_vertices(2, 1);
    assert_eq!(g.vertex_ancestors(2).to_sorted_vec(), [0, 1]);
    g.contract_vertices(3, 2);
    let ancestors = g.vertex_ancestors(3).to_sorted_vec();
    assert_eq!(ancestors, [0, 1, 2]);
    assert_eq!(g.n_live_edges(), 0);
    assert_eq!(g.vertex_ids().collect::<Vec<_>>(), [3]);
}

#[test]
fn test_contract_prizes() {
    let mut g = Graph::new_pc();
    for _ in 0..3 {
        g.add_vertex(true);
    }
    g.set_prize(0, 2.5);
    g.set_prize(1, 4.0);
    g.add_edge(0, 1, 1.0, 1.0);
    g.add_edge(1, 2, 1.0, 1.0);
    g.contract_vertices(0, 1);
    assert_eq!(g.prize(0), 6.5);
    assert_eq!(g.prize(1), 0.0);
    assert_eq!(g.prizes().unwrap(), &[6.5, 0.0, 0.0]);
}

#[test]
#[should_panic]
fn test_contract_isolated() {
    let mut g = graph_from(2, &[], &[]);
    g.contract_vertices(0, 1);
}

#[test]
fn test_pack() {
    init_logger();
    let mut g = graph_from(
        4,
        &[3],
        &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (0, 3, 4.0)],
    );
    g.delete_vertex(1);
    let map = g.pack();
    assert_eq!(map.vertices, [Some(0), None, Some(1), Some(2)]);
    assert_eq!(
        map.edges,
        [None, None, None, None, Some(0), Some(1), Some(2), Some(3)]
    );
    assert_eq!(g.n_vertices(), 3);
    assert_eq!(g.n_edges(), 4);
    assert_eq!(degrees(&g), [1, 1, 2]);
    assert!(g.is_term(2) && !g.is_term(0));
    assert_eq!((g.tail(0), g.head(0), g.cost(0)), (1, 2, 3.0));
    assert_eq!((g.tail(2), g.head(2), g.cost(2)), (0, 2, 4.0));
    assert_eq!(g.ancestors(2).to_sorted_vec(), [3]);
    assert_eq!(sorted_out(&g, 2), [0, 1]);
}

#[test]
fn test_pseudo_ancestor_hash() {
    let mut g = graph_from(4, &[], &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
    g.copy_pseudo_ancestors(4, 0);
    assert_eq!(g.pseudo_ancestors(4).to_sorted_vec(), [0, 2]);
    let mut hash = PseudoAncestorHash::new(&g);
    hash.hash_edge(&g, 0);
    assert!(!hash.edge_has_conflict(&g, 0));
    hash.hash_edge(&g, 2);
    assert!(!hash.edge_has_conflict(&g, 2));
    assert!(hash.is_hashed(0) && hash.is_hashed(1) && !hash.is_hashed(2));
    hash.hash_edge(&g, 5);
    assert!(hash.is_hashed(2));
    assert!(hash.edge_has_conflict(&g, 5));
    assert!(hash.edge_has_conflict(&g, 0));
    assert!(!hash.edge_has_conflict(&g, 2));
    hash.unhash_edge(&g, 5);
    assert!(!hash.edge_has_conflict(&g, 0));
    hash.unhash_edge(&g, 2);
    hash.unhash_edge(&g, 0);
    assert!(!hash.is_hashed(0));
    assert!(hash.is_clean());
}
