use crate::graph_data::GraphData;
use std::collections::HashMap;

/// Incremental Fruchterman-Reingold force-directed layout.
pub struct LayoutState {
    /// Layout area width.
    area_w: f64,
    /// Layout area height.
    area_h: f64,
    /// Current temperature (controls step size; decreases over iterations).
    temperature: f64,
    /// Initial temperature.
    initial_temperature: f64,
    /// Maximum number of iterations before the layout is considered done.
    max_iterations: usize,
    /// Iterations completed so far.
    iterations_done: usize,
    /// Ideal edge length (derived from area and node count).
    k: f64,
}

impl LayoutState {
    /// Create a new layout state for a graph with `node_count` nodes.
    pub fn new(node_count: usize) -> Self {
        Self::new_with_min_edge_length(node_count, 0.0)
    }

    /// Create a new layout state with an optional minimum ideal edge length.
    pub fn new_with_min_edge_length(node_count: usize, min_edge_length: f64) -> Self {
        let area_w = 800.0;
        let area_h = 600.0;
        let area = area_w * area_h;
        let k = if node_count > 0 { (area / node_count as f64).sqrt() } else { 1.0 }
            .max(min_edge_length.max(0.0));
        let temperature = area_w / 4.0;
        let max_iterations = 200;

        Self {
            area_w,
            area_h,
            temperature,
            initial_temperature: temperature,
            max_iterations,
            iterations_done: 0,
            k,
        }
    }

    /// Run `iterations` steps of the layout algorithm.
    /// Returns `true` when the layout is finished (all iterations done or
    /// temperature has cooled below threshold).
    pub fn step(&mut self, graph: &mut GraphData, iterations: usize) -> bool {
        let n = graph.nodes.len();
        if n == 0 {
            return true;
        }

        for _ in 0..iterations {
            if self.is_complete() {
                return true;
            }
            self.one_iteration(graph);
        }

        self.is_complete()
    }

    /// Whether the layout is complete.
    pub fn is_complete(&self) -> bool {
        self.iterations_done >= self.max_iterations || self.temperature < 0.5
    }

    /// Number of iterations completed so far.
    pub fn iterations_done(&self) -> usize {
        self.iterations_done
    }

    /// Assign deterministic initial positions (spiral layout).
    pub fn initialise_positions(&self, graph: &mut GraphData) {
        let n = graph.nodes.len();
        if n == 0 {
            return;
        }

        let cx = self.area_w / 2.0;
        let cy = self.area_h / 2.0;

        if n == 1 {
            graph.nodes[0].position = [cx, cy];
            return;
        }

        // Spiral layout: evenly-spaced angular steps with increasing radius
        let max_radius = self.area_w.min(self.area_h) * 0.4;
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            let t = i as f64 / n as f64;
            let angle = t * 6.0 * std::f64::consts::PI; // ~3 full turns
            let radius = max_radius * t;
            node.position = [cx + radius * angle.cos(), cy + radius * angle.sin()];
        }
    }

    /// Run a single iteration of the Fruchterman-Reingold algorithm.
    fn one_iteration(&mut self, graph: &mut GraphData) {
        let n = graph.nodes.len();
        let k = self.k;
        let k_sq = k * k;

        // Displacement accumulator
        let mut disp = vec![[0.0f64; 2]; n];

        // Repulsive forces: O(n^2)
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = graph.nodes[i].position[0] - graph.nodes[j].position[0];
                let dy = graph.nodes[i].position[1] - graph.nodes[j].position[1];
                let dist_sq = dx * dx + dy * dy;
                let dist = dist_sq.sqrt().max(0.01);
                let force = k_sq / dist;
                let fx = (dx / dist) * force;
                let fy = (dy / dist) * force;
                disp[i][0] += fx;
                disp[i][1] += fy;
                disp[j][0] -= fx;
                disp[j][1] -= fy;
            }
        }

        // Attractive forces along edges
        for edge in &graph.edges {
            let dx = graph.nodes[edge.from_idx].position[0] - graph.nodes[edge.to_idx].position[0];
            let dy = graph.nodes[edge.from_idx].position[1] - graph.nodes[edge.to_idx].position[1];
            let dist = (dx * dx + dy * dy).sqrt().max(0.01);
            let force = dist * dist / k;
            let fx = (dx / dist) * force;
            let fy = (dy / dist) * force;
            disp[edge.from_idx][0] -= fx;
            disp[edge.from_idx][1] -= fy;
            disp[edge.to_idx][0] += fx;
            disp[edge.to_idx][1] += fy;
        }

        // Apply displacements, limited by temperature
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            let dx = disp[i][0];
            let dy = disp[i][1];
            let dist = (dx * dx + dy * dy).sqrt().max(0.01);
            let scale = self.temperature.min(dist) / dist;
            node.position[0] += dx * scale;
            node.position[1] += dy * scale;
        }

        // Cool down
        self.iterations_done += 1;
        let progress = self.iterations_done as f64 / self.max_iterations as f64;
        self.temperature = self.initial_temperature * (1.0 - progress);
    }
}

/// Assign nodes to stage columns for staged DAG rendering.
pub fn stage_column(node: &crate::graph_data::GraphNode) -> usize {
    for role in &node.roles {
        match role.as_str() {
            "input" => return 0,
            "decode" => return 1,
            "render" => return 2,
            "execute" => return 3,
            "egress" => return 4,
            _ => {}
        }
    }
    let label_lower = node.label.to_lowercase();
    if label_lower.contains("network") || label_lower.contains("egress") {
        return 4;
    }
    if label_lower.contains("execute") || label_lower.contains("code") {
        return 3;
    }
    if node.obj_type.eq_ignore_ascii_case("event")
        && node.roles.iter().any(|role| matches!(role.as_str(), "automatic" | "hidden"))
    {
        return 0;
    }
    if node.obj_type.eq_ignore_ascii_case("outcome") {
        return 4;
    }
    2
}

/// Apply staged DAG layout positions directly.
pub fn apply_staged_dag_layout(graph: &mut GraphData) {
    let area_w = 800.0f64;
    let area_h = 600.0f64;
    let cols = 5.0f64;
    let col_w = area_w / cols;
    let mut by_column: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, node) in graph.nodes.iter().enumerate() {
        by_column.entry(stage_column(node)).or_default().push(idx);
    }
    for column in 0..5 {
        let Some(indices) = by_column.get(&column) else {
            continue;
        };
        let count = indices.len();
        for (row, idx) in indices.iter().enumerate() {
            let x = (column as f64 + 0.5) * col_w;
            let y = if count <= 1 {
                area_h / 2.0
            } else {
                ((row + 1) as f64 / (count + 1) as f64) * area_h
            };
            graph.nodes[*idx].position = [x, y];
        }
    }
}
