//! Play-volume bounds shared with render clients.

use glam::Vec3;

/// Chunk width along the X axis.
pub const CHUNK_WIDTH: f32 = 100.0;
/// Chunk depth along the Z axis.
pub const CHUNK_DEPTH: f32 = 100.0;
/// Chunk height along the Y axis.
pub const CHUNK_HEIGHT: f32 = 100.0;

/// Axis-aligned volume the game plays out in.
///
/// The server uses it for spawn placement only. Client-reported movement is
/// not clamped against it; render clients do their own clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayVolume {
    pub min: Vec3,
    pub max: Vec3,
}

impl PlayVolume {
    /// The single chunk both sides agree on: x and z centered on the
    /// origin, y from the seabed up.
    pub const CHUNK: PlayVolume = PlayVolume {
        min: Vec3::new(-CHUNK_WIDTH / 2.0, 0.0, -CHUNK_DEPTH / 2.0),
        max: Vec3::new(CHUNK_WIDTH / 2.0, CHUNK_HEIGHT, CHUNK_DEPTH / 2.0),
    };

    /// Whether a point lies inside the volume (inclusive).
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Component-wise clamp into the volume.
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_bounds_match_shared_constants() {
        let v = PlayVolume::CHUNK;
        assert_eq!(v.min, Vec3::new(-50.0, 0.0, -50.0));
        assert_eq!(v.max, Vec3::new(50.0, 100.0, 50.0));
    }

    #[test]
    fn contains_is_inclusive() {
        let v = PlayVolume::CHUNK;
        assert!(v.contains(Vec3::new(0.0, 50.0, 0.0)));
        assert!(v.contains(v.min));
        assert!(v.contains(v.max));
        assert!(!v.contains(Vec3::new(0.0, -0.1, 0.0)));
        assert!(!v.contains(Vec3::new(50.1, 0.0, 0.0)));
    }

    #[test]
    fn clamp_pulls_outside_points_to_the_face() {
        let v = PlayVolume::CHUNK;
        assert_eq!(
            v.clamp(Vec3::new(200.0, -5.0, 0.0)),
            Vec3::new(50.0, 0.0, 0.0)
        );
    }
}
