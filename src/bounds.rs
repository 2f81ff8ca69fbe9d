//! Axis-aligned bounding boxes and overall-bounds aggregation

use glam::{Mat4, Vec3};

/// An axis-aligned bounding box.
///
/// A freshly constructed box is [`Aabb::INVALID`] (min > max) and absorbs
/// the first point or box unioned into it. [`Aabb::ZERO`] is the zero-size
/// box anchored at the origin, used as the fallback when no section
/// contributes any bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that unions as the identity element.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// The zero-size box at the origin.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True if this box encloses at least one point.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size of the box.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Grows the box to include a point.
    pub fn union_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns the union of two boxes. Invalid operands are ignored.
    pub fn union(&self, other: &Aabb) -> Aabb {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => Aabb {
                min: self.min.min(other.min),
                max: self.max.max(other.max),
            },
            (true, false) => *self,
            (false, true) => *other,
            (false, false) => Aabb::INVALID,
        }
    }

    /// Returns the axis-aligned box enclosing this box transformed by `matrix`.
    ///
    /// Transforms all eight corners; correct for any affine transform,
    /// conservative under rotation. Invalid boxes stay invalid.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if !self.is_valid() {
            return Aabb::INVALID;
        }
        let mut out = Aabb::INVALID;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.union_point(matrix.transform_point3(corner));
        }
        out
    }

    /// Scales the box about its center.
    pub fn scaled(&self, scale: f32) -> Aabb {
        if !self.is_valid() {
            return *self;
        }
        let center = self.center();
        let extent = self.extent() * scale;
        Aabb {
            min: center - extent,
            max: center + extent,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Unions every valid box in `boxes` into the overall bounds.
///
/// Falls back to the zero-size box at the origin when nothing contributes,
/// so callers always receive a valid box.
pub fn aggregate_section_bounds<I>(boxes: I) -> Aabb
where
    I: IntoIterator<Item = Aabb>,
{
    let overall = boxes
        .into_iter()
        .fold(Aabb::INVALID, |acc, b| acc.union(&b));
    if overall.is_valid() {
        overall
    } else {
        Aabb::ZERO
    }
}
