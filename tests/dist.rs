use rand::{Rng, SeedableRng};
use steiner_extreduce::dist::{min_sd, PcSdMarks};
use steiner_extreduce::graph::Vertex;
use steiner_extreduce::{Cost, DistData, DistParams, Graph, SpecialDistance};

use common::{floyd_warshall, graph_from, init_logger, random_connected_graph};

mod common;

struct OneWay;

impl SpecialDistance for OneWay {
    fn sd(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        (u < v).then(|| (v - u) as Cost)
    }
}

#[test]
fn test_sd_double_falls_back() {
    assert_eq!(OneWay.sd(1, 3), Some(2.0));
    assert_eq!(OneWay.sd(3, 1), None);
    assert_eq!(OneWay.sd_double(3, 1), Some(2.0));
    assert_eq!((&OneWay).sd_double(1, 3), Some(2.0));
    assert_eq!(min_sd(None, Some(1.0)), Some(1.0));
    assert_eq!(min_sd(Some(2.0), Some(1.0)), Some(1.0));
    assert_eq!(min_sd(None, None), None);
}

#[test]
fn test_unbounded_is_shortest_path() {
    init_logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(4815162342);
    let params = DistParams {
        close_nodes_max: usize::MAX,
        edge_limit: usize::MAX,
    };
    for _ in 0..20 {
        let g = random_connected_graph(&mut rng, 15, 15, 3);
        let dd = DistData::new(&g, &params);
        let fw = floyd_warshall(&g);
        for u in 0..15 {
            for v in 0..15 {
                assert_eq!(dd.sd(u, v), fw[u][v], "{u} {v}");
            }
        }
    }
}

#[test]
fn test_bounded_is_upper_bound() {
    init_logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
    let params = DistParams {
        close_nodes_max: 3,
        edge_limit: 8,
    };
    for _ in 0..20 {
        let g = random_connected_graph(&mut rng, 20, 30, 3);
        let dd = DistData::new(&g, &params);
        let fw = floyd_warshall(&g);
        for u in 0..20 {
            assert!(dd.close_nodes_of(u).count() <= 3);
            let ids: Vec<_> = dd.close_nodes_of(u).map(|(v, _)| v).collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for v in 0..20 {
                if let Some(d) = dd.sd(u, v) {
                    let shortest = fw[u][v].unwrap();
                    assert!(d >= shortest, "{u} {v}: {d} < {shortest}");
                }
            }
        }
    }
}

#[test]
fn test_close_nodes_nearest_first() {
    let g = graph_from(
        5,
        &[],
        &[(0, 1, 1.0), (0, 2, 5.0), (1, 3, 1.0), (3, 4, 10.0)],
    );
    let params = DistParams {
        close_nodes_max: 2,
        edge_limit: 100,
    };
    let dd = DistData::new(&g, &params);
    assert_eq!(dd.close_nodes_of(0).collect::<Vec<_>>(), [(1, 1.0), (3, 2.0)]);
    assert_eq!(dd.sd(0, 3), Some(2.0));
    assert_eq!(dd.sd(0, 2), None);
    assert_eq!(dd.sd(0, 0), Some(0.0));
    assert_eq!(dd.sd_double(2, 0), Some(5.0));
}

#[test]
fn test_pc_bound() {
    let mut g = Graph::new_pc();
    for _ in 0..4 {
        g.add_vertex(false);
    }
    g.set_prize(1, 3.0);
    g.add_edge(0, 1, 2.0, 2.0);
    g.add_edge(1, 2, 4.0, 4.0);
    g.add_edge(1, 3, 1.0, 1.0);
    let dd = DistData::new(&g, &DistParams::default());
    let mut marks = PcSdMarks::new(4);
    {
        let scope = marks.mark(&g, 0);
        assert_eq!(scope.start(), 0);
        // max(2, 4, 2 + 4 - 3)
        assert_eq!(scope.bound(2), Some(4.0));
        // max(2, 1, 2 + 1 - 3)
        assert_eq!(scope.bound(3), Some(2.0));
        assert_eq!(scope.bound(1), None);
        assert_eq!(scope.sd(&dd, 2), Some(4.0));
        assert_eq!(scope.sd(&dd, 3), Some(2.0));
        assert_eq!(scope.sd(&dd, 1), Some(2.0));
        assert!(scope.sd(&dd, 3) < dd.sd(0, 3));
    }
    assert!(marks.is_clean());
}

#[test]
fn test_pc_monotonic() {
    init_logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(4815162342);
    for _ in 0..20 {
        let base = random_connected_graph(&mut rng, 12, 15, 0);
        let mut g = Graph::new_pc();
        for v in 0..12 {
            g.add_vertex(false);
            if rng.gen_bool(0.4) {
                g.set_prize(v, rng.gen_range(0..12) as Cost);
            }
        }
        for e in base.live_edges() {
            g.add_edge(base.tail(e), base.head(e), base.cost(e), base.cost(e));
        }
        let dd = DistData::new(&g, &DistParams::default());
        let mut marks = PcSdMarks::new(12);
        for start in 0..12 {
            let scope = marks.mark(&g, start);
            for v in 0..12 {
                let plain = dd.sd_double(start, v);
                let adjusted = scope.sd(&dd, v);
                if let Some(plain) = plain {
                    let adjusted = adjusted.expect("adjusted distance lost");
                    assert!(adjusted <= plain);
                }
                if let Some(adjusted) = adjusted {
                    assert!(adjusted >= 0.0);
                }
            }
            drop(scope);
            assert!(marks.is_clean());
        }
    }
}
