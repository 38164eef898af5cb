//! Axis-aligned bounding boxes.

use glam::Vec3;

/// Axis-aligned min/max corner box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bound {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bound {
    /// The empty bound, identity for [`Bound::union`].
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.grow(p);
        }
        b
    }

    #[inline]
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn includes(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Total surface area of the box.
    #[inline]
    pub fn area(&self) -> f32 {
        let d = self.size();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// The axis with the largest extent: 0 = X, 1 = Y, 2 = Z.
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let d = self.size();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Ray-slab intersection. Returns the entry/exit parameters clipped to
    /// `[0, t_max]`, or `None` when the ray misses the box.
    ///
    /// `inv_dir` is the componentwise reciprocal of the ray direction;
    /// callers hoist it because traversal crosses many boxes per ray.
    #[inline]
    pub fn cross(&self, from: Vec3, inv_dir: Vec3, t_max: f32) -> Option<(f32, f32)> {
        let t0 = (self.min - from) * inv_dir;
        let t1 = (self.max - from) * inv_dir;
        let enter = t0.min(t1).max_element().max(0.0);
        let exit = t0.max(t1).min_element().min(t_max);
        (enter <= exit).then_some((enter, exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn cross_hits_unit_cube() {
        let b = Bound::new(Vec3::ZERO, Vec3::ONE);
        let dir = Vec3::Z;
        let (enter, exit) = b
            .cross(vec3(0.5, 0.5, -1.0), dir.recip(), f32::INFINITY)
            .unwrap();
        assert!((enter - 1.0).abs() < 1e-6);
        assert!((exit - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cross_misses_beside_cube() {
        let b = Bound::new(Vec3::ZERO, Vec3::ONE);
        let dir = Vec3::Z;
        assert!(
            b.cross(vec3(2.0, 0.5, -1.0), dir.recip(), f32::INFINITY)
                .is_none()
        );
    }

    #[test]
    fn cross_respects_t_max() {
        let b = Bound::new(Vec3::ZERO, Vec3::ONE);
        let dir = Vec3::Z;
        assert!(b.cross(vec3(0.5, 0.5, -1.0), dir.recip(), 0.5).is_none());
    }

    #[test]
    fn longest_axis_picks_widest() {
        let b = Bound::new(Vec3::ZERO, vec3(1.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 1);
    }

    #[test]
    fn area_of_unit_cube() {
        let b = Bound::new(Vec3::ZERO, Vec3::ONE);
        assert!((b.area() - 6.0).abs() < 1e-6);
    }
}
