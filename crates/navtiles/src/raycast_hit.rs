//! Raycast result

use super::PolyRef;

/// Outcome of [`NavMeshQuery::raycast`](crate::NavMeshQuery::raycast)
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    /// Hit parameter along the ray, `f32::MAX` when no wall was hit
    pub t: f32,
    /// Normal of the wall that was hit, on the xz-plane
    pub hit_normal: [f32; 3],
    /// Edge of the last polygon that was hit, if any
    pub hit_edge_index: Option<usize>,
    /// Polygons visited by the ray
    pub path: Vec<PolyRef>,
}

impl RaycastHit {
    /// A ray that reached its end
    pub fn no_hit(path: Vec<PolyRef>) -> Self {
        Self {
            t: f32::MAX,
            hit_normal: [0.0; 3],
            hit_edge_index: None,
            path,
        }
    }

    /// Returns true if the ray stopped at a wall
    pub fn hit_wall(&self) -> bool {
        self.t < f32::MAX
    }

    /// Point where the ray stopped
    pub fn hit_position(&self, start: &[f32; 3], end: &[f32; 3]) -> [f32; 3] {
        if !self.hit_wall() {
            return *end;
        }
        super::nav_common::vlerp(start, end, self.t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hit() {
        let hit = RaycastHit::no_hit(vec![PolyRef::new(1)]);
        assert!(!hit.hit_wall());
        assert_eq!(hit.hit_position(&[0.0; 3], &[2.0, 0.0, 0.0]), [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_hit_position() {
        let hit = RaycastHit {
            t: 0.25,
            hit_normal: [-1.0, 0.0, 0.0],
            hit_edge_index: Some(2),
            path: Vec::new(),
        };
        assert!(hit.hit_wall());
        assert_eq!(hit.hit_position(&[0.0; 3], &[4.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
    }
}
