use std::collections::{BTreeMap, HashMap};

use derive_more::{Deref, DerefMut, From};
use fdg_sim::{
    force::fruchterman_reingold, ForceGraph, ForceGraphHelper, Simulation, SimulationParameters,
};
use petgraph::graphmap::UnGraphMap;
use tracing::debug;

use crate::config::BusCoordinate;
use crate::error::{Error, Result};

/// Undirected feeder graph keyed by bus id.
#[derive(Debug, Clone, Default, Deref, DerefMut, From)]
pub struct TopologyGraph(UnGraphMap<i64, ()>);

impl TopologyGraph {
    /// One node per bus that appears in `edges`; parallel lines collapse into one edge.
    pub fn from_edges<I: IntoIterator<Item = (i64, i64)>>(edges: I) -> Self {
        Self(UnGraphMap::from_edges(edges))
    }

    /// Edges with the smaller bus id first, sorted.
    pub fn edge_list(&self) -> Vec<(i64, i64)> {
        let mut edges: Vec<_> = self
            .all_edges()
            .map(|(a, b, _)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges
    }
}

/// Node positions keyed by bus id.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut, From)]
pub struct Layout(BTreeMap<i64, (f64, f64)>);

impl Layout {
    /// Axis-aligned bounds as (x_min, x_max, y_min, y_max).
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut it = self.values();
        let &(x0, y0) = it.next()?;
        Some(it.fold((x0, x0, y0, y0), |(x_lo, x_hi, y_lo, y_hi), &(x, y)| {
            (x_lo.min(x), x_hi.max(x), y_lo.min(y), y_hi.max(y))
        }))
    }
}

/// Force-directed layout; positions differ between runs.
pub fn spring_layout(graph: &TopologyGraph, iterations: usize) -> Layout {
    if graph.node_count() == 0 {
        return Layout::default();
    }

    let mut force_graph: ForceGraph<i64, ()> = ForceGraph::default();
    let mut index_map = HashMap::new();
    for bus in graph.nodes() {
        let idx = force_graph.add_force_node(bus.to_string(), bus);
        index_map.insert(bus, idx);
    }
    for (a, b, _) in graph.all_edges() {
        force_graph.add_edge(index_map[&a], index_map[&b], ());
    }

    let mut params = SimulationParameters::default();
    params.set_force(fruchterman_reingold(45.0, 0.95));
    let mut simulation = Simulation::from_graph(force_graph, params);
    for _ in 0..iterations {
        simulation.update(0.02);
    }

    let force_graph = simulation.get_graph();
    let layout: BTreeMap<_, _> = force_graph
        .node_indices()
        .map(|idx| {
            let node = &force_graph[idx];
            (node.data, (node.location.x as f64, node.location.y as f64))
        })
        .collect();
    debug!(nodes = layout.len(), iterations, "spring layout done");
    Layout(layout)
}

/// Places every node at its configured coordinate.
pub fn fixed_layout(graph: &TopologyGraph, coordinates: &[BusCoordinate]) -> Result<Layout> {
    let lookup: HashMap<i64, (f64, f64)> =
        coordinates.iter().map(|c| (c.bus, (c.x, c.y))).collect();
    graph
        .nodes()
        .map(|bus| {
            lookup
                .get(&bus)
                .map(|&xy| (bus, xy))
                .ok_or(Error::MissingCoordinate(bus))
        })
        .collect::<Result<BTreeMap<_, _>>>()
        .map(Layout)
}

/// Hand-drawn IEEE 33-bus layout: main feeder 1-18 along y = 0, laterals
/// 19-22 above bus 2, 23-25 above bus 3 and 26-33 below, starting at bus 6.
pub fn ieee33_coordinates() -> Vec<BusCoordinate> {
    let at = |bus: i64, x: f64, y: f64| BusCoordinate { bus, x, y };
    let main = (1..=18).map(|b| at(b, (b - 1) as f64, 0.0));
    let lateral_2 = (19..=22).map(|b| at(b, 1.0, (b - 18) as f64));
    let lateral_3 = (23..=25).map(|b| at(b, 2.0, (b - 22) as f64));
    let lateral_6 = (26..=33).map(|b| at(b, (b - 21) as f64, -1.0));
    main.chain(lateral_2).chain(lateral_3).chain(lateral_6).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ieee33_graph() -> TopologyGraph {
        let t = crate::testcases::ieee33_tables();
        TopologyGraph::from_edges(t.lines.iter().map(|l| (l.from_bus, l.to_bus)))
    }

    #[test]
    fn duplicate_edges_collapse() {
        let g = TopologyGraph::from_edges([(1, 2), (2, 1), (2, 3), (1, 2)]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.edge_list(), vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn ieee33_is_a_tree() {
        let g = ieee33_graph();
        assert_eq!(g.node_count(), 33);
        assert_eq!(g.edge_count(), 32);
    }

    #[test]
    fn fixed_layout_covers_ieee33() {
        let g = ieee33_graph();
        let layout = fixed_layout(&g, &ieee33_coordinates()).unwrap();
        assert_eq!(layout.len(), 33);
        assert_eq!(layout[&1], (0.0, 0.0));
        assert_eq!(layout[&18], (17.0, 0.0));
        assert_eq!(layout[&22], (1.0, 4.0));
        assert_eq!(layout[&26], (5.0, -1.0));
        assert_eq!(layout[&33], (12.0, -1.0));
        assert_eq!(layout.bounds(), Some((0.0, 17.0, -1.0, 4.0)));
    }

    #[test]
    fn fixed_layout_reports_missing_bus() {
        let g = ieee33_graph();
        let coords: Vec<_> = ieee33_coordinates().into_iter().filter(|c| c.bus != 25).collect();
        assert!(matches!(fixed_layout(&g, &coords), Err(Error::MissingCoordinate(25))));
    }

    #[test]
    fn spring_layout_places_every_bus() {
        let g = TopologyGraph::from_edges([(1, 2), (2, 3), (3, 4), (2, 5)]);
        let layout = spring_layout(&g, 50);
        assert_eq!(layout.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(layout.values().all(|(x, y)| x.is_finite() && y.is_finite()));
        assert!(spring_layout(&TopologyGraph::default(), 10).is_empty());
    }
}
