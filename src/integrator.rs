//! Velocity and position update.
//!
//! New velocity is the old one plus the rule delta, capped at the maximum
//! speed without changing direction. New position is old position plus new
//! velocity times `dt`, wrapped back into the volume on every axis.

use glam::Vec3;

/// The cubic simulation volume `[min, min + extent)^3`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Volume {
    /// Lowest corner.
    pub min: f32,
    /// Edge length.
    pub extent: f32,
}

impl Volume {
    /// Volume `[-scene_scale, scene_scale)^3`.
    pub fn centered(scene_scale: f32) -> Self {
        Self {
            min: -scene_scale,
            extent: scene_scale * 2.0,
        }
    }

    /// Wrap a single coordinate toroidally into `[min, min + extent)`.
    #[inline]
    pub fn wrap_coordinate(&self, x: f32) -> f32 {
        let offset = (x - self.min).rem_euclid(self.extent);
        let wrapped = self.min + offset;
        // both the remainder and the add can round up onto the far face
        if offset >= self.extent || wrapped >= self.min + self.extent {
            self.min
        } else {
            wrapped
        }
    }

    /// Wrap every axis of `position`.
    #[inline]
    pub fn wrap(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            self.wrap_coordinate(position.x),
            self.wrap_coordinate(position.y),
            self.wrap_coordinate(position.z),
        )
    }
}

/// `velocity + delta`, rescaled to `max_speed` if it is faster.
#[inline]
pub fn next_velocity(velocity: Vec3, delta: Vec3, max_speed: f32) -> Vec3 {
    (velocity + delta).clamp_length_max(max_speed)
}

/// Advance `position` by `velocity * dt` and wrap it into `volume`.
#[inline]
pub fn next_position(position: Vec3, velocity: Vec3, dt: f32, volume: &Volume) -> Vec3 {
    volume.wrap(position + velocity * dt)
}
