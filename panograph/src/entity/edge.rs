//! Directed navigation edges between nodes.

/// Navigation direction an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    /// Next node in the sequence
    Next,
    /// Previous node in the sequence
    Prev,
    StepForward,
    StepBackward,
    StepLeft,
    StepRight,
}

/// Payload of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub direction: EdgeDirection,
    /// Ground distance in meters between the two nodes
    pub distance: f64,
    /// Bearing in degrees (0 = north) from the source to the target
    pub world_motion_azimuth: f64,
}

/// A directed edge from one node to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub data: EdgeData,
}

/// Edge list of one kind together with its cached flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStatus {
    pub cached: bool,
    pub edges: Vec<Edge>,
}

impl EdgeStatus {
    /// Status of a set of freshly computed edges.
    pub fn cached(edges: Vec<Edge>) -> Self {
        Self {
            cached: true,
            edges,
        }
    }
}
