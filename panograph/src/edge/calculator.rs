use super::EdgeCalculator;
use crate::coord::{bearing_degrees, distance_meters};
use crate::entity::{Edge, EdgeData, EdgeDirection, Node, Sequence};
use crate::error::GraphError;

/// Straightforward edge calculator.
///
/// Sequence edges link a node to its previous and next keys. Spatial edges
/// pick the nearest candidate in each of four 90° sectors around the node's
/// viewing direction (north when the compass angle is unknown). Within
/// `max_distance` a sequence neighbour wins its sector over closer nodes.
#[derive(Debug, Clone)]
pub struct DefaultEdgeCalculator {
    max_distance: f64,
}

impl DefaultEdgeCalculator {
    /// Default reach of spatial edges in meters.
    pub const DEFAULT_MAX_DISTANCE: f64 = 20.0;

    pub fn new() -> Self {
        Self {
            max_distance: Self::DEFAULT_MAX_DISTANCE,
        }
    }

    pub fn with_max_distance(mut self, meters: f64) -> Self {
        self.max_distance = meters;
        self
    }

    fn sector(relative_bearing: f64) -> EdgeDirection {
        match relative_bearing {
            b if !(45.0..315.0).contains(&b) => EdgeDirection::StepForward,
            b if b < 135.0 => EdgeDirection::StepRight,
            b if b < 225.0 => EdgeDirection::StepBackward,
            _ => EdgeDirection::StepLeft,
        }
    }
}

impl Default for DefaultEdgeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

struct Candidate {
    key: String,
    distance: f64,
    bearing: f64,
    fallback: bool,
}

impl EdgeCalculator for DefaultEdgeCalculator {
    fn compute_sequence_edges(
        &self,
        node: &Node,
        sequence: &Sequence,
    ) -> Result<Vec<Edge>, GraphError> {
        let sequence_key = node.sequence_key()?;
        if sequence_key.as_deref() != Some(sequence.key()) {
            return Err(GraphError::contract(format!(
                "Node {} is not part of sequence {}",
                node.key(),
                sequence.key()
            )));
        }

        let link = |to: &str, direction| Edge {
            from: node.key().to_string(),
            to: to.to_string(),
            data: EdgeData {
                direction,
                distance: 0.0,
                world_motion_azimuth: 0.0,
            },
        };

        let mut edges = Vec::with_capacity(2);
        if let Some(next) = sequence.find_next_key(node.key()) {
            edges.push(link(next, EdgeDirection::Next));
        }
        if let Some(prev) = sequence.find_prev_key(node.key()) {
            edges.push(link(prev, EdgeDirection::Prev));
        }
        Ok(edges)
    }

    fn compute_spatial_edges(
        &self,
        node: &Node,
        candidates: &[Node],
        fallback_keys: &[String],
    ) -> Result<Vec<Edge>, GraphError> {
        let origin = node.lat_lon()?;
        let heading = node.compass_angle()?.unwrap_or(0.0);

        let mut best: Vec<(EdgeDirection, Candidate)> = Vec::new();
        for other in candidates {
            if other.key() == node.key() {
                continue;
            }
            let Ok(position) = other.lat_lon() else {
                continue;
            };
            let distance = distance_meters(&origin, &position);
            if distance > self.max_distance {
                continue;
            }
            let bearing = bearing_degrees(&origin, &position);
            let direction = Self::sector((bearing - heading).rem_euclid(360.0));
            let candidate = Candidate {
                key: other.key().to_string(),
                distance,
                bearing,
                fallback: fallback_keys.iter().any(|k| k == other.key()),
            };

            match best.iter_mut().find(|(d, _)| *d == direction) {
                Some((_, current)) => {
                    let better = (candidate.fallback, -candidate.distance)
                        > (current.fallback, -current.distance);
                    if better {
                        *current = candidate;
                    }
                }
                None => best.push((direction, candidate)),
            }
        }

        Ok(best
            .into_iter()
            .map(|(direction, candidate)| Edge {
                from: node.key().to_string(),
                to: candidate.key,
                data: EdgeData {
                    direction,
                    distance: candidate.distance,
                    world_motion_azimuth: candidate.bearing,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::full_record;
    use crate::api::SequenceRecord;
    use crate::coord::offset_position;
    use crate::coord::LatLon;

    fn node_at(key: &str, east: f64, north: f64) -> Node {
        let p = offset_position(&LatLon::new(55.0, 13.0), east, north);
        Node::from_full(full_record(key, p.lat, p.lon, "s1"))
    }

    fn sequence(keys: &[&str]) -> Sequence {
        Sequence::new(SequenceRecord {
            key: "s1".to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        })
    }

    #[test]
    fn test_sequence_edges() {
        let calculator = DefaultEdgeCalculator::new();
        let edges = calculator
            .compute_sequence_edges(&node_at("b", 0.0, 0.0), &sequence(&["a", "b", "c"]))
            .unwrap();

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].to, "c");
        assert_eq!(edges[0].data.direction, EdgeDirection::Next);
        assert_eq!(edges[1].to, "a");
        assert_eq!(edges[1].data.direction, EdgeDirection::Prev);
    }

    #[test]
    fn test_sequence_edges_at_end() {
        let calculator = DefaultEdgeCalculator::new();
        let edges = calculator
            .compute_sequence_edges(&node_at("c", 0.0, 0.0), &sequence(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].data.direction, EdgeDirection::Prev);
    }

    #[test]
    fn test_spatial_edges_by_sector() {
        let calculator = DefaultEdgeCalculator::new();
        let origin = node_at("o", 0.0, 0.0);
        let candidates = vec![
            node_at("north", 0.0, 5.0),
            node_at("far_north", 0.0, 10.0),
            node_at("east", 5.0, 0.0),
            node_at("south", 0.0, -5.0),
            node_at("west", -5.0, 0.0),
            node_at("too_far", 0.0, 500.0),
            origin.clone(),
        ];

        let edges = calculator
            .compute_spatial_edges(&origin, &candidates, &[])
            .unwrap();
        let target = |direction| {
            edges
                .iter()
                .find(|e| e.data.direction == direction)
                .map(|e| e.to.as_str())
        };

        assert_eq!(edges.len(), 4);
        assert_eq!(target(EdgeDirection::StepForward), Some("north"));
        assert_eq!(target(EdgeDirection::StepRight), Some("east"));
        assert_eq!(target(EdgeDirection::StepBackward), Some("south"));
        assert_eq!(target(EdgeDirection::StepLeft), Some("west"));
    }

    #[test]
    fn test_fallback_key_preferred() {
        let calculator = DefaultEdgeCalculator::new();
        let origin = node_at("o", 0.0, 0.0);
        let candidates = vec![node_at("near", 0.0, 3.0), node_at("next", 0.0, 8.0)];

        let edges = calculator
            .compute_spatial_edges(&origin, &candidates, &["next".to_string()])
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "next");
    }
}
