//! Shape primitives used by the collision code.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Axis-aligned box. `min` is the top-left corner, `max` the bottom-right one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    min: Vec2,
    max: Vec2,
}

impl Aabb {
    /// Builds a box from any two opposite corners.
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self {
            min: p1.min(p2),
            max: p1.max(p2),
        }
    }

    pub fn from_min_size(min: Vec2, size: Vec2) -> Self {
        Self::new(min, min + size)
    }

    pub fn min(&self) -> Vec2 {
        self.min
    }

    pub fn max(&self) -> Vec2 {
        self.max
    }

    pub fn top_right(&self) -> Vec2 {
        Vec2::new(self.max.x, self.min.y)
    }

    pub fn bottom_left(&self) -> Vec2 {
        Vec2::new(self.min.x, self.max.y)
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [self.min, self.max, self.top_right(), self.bottom_left()]
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn shift(&self, by: Vec2) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }

    /// Grows the box by `dx` on both horizontal sides and `dy` on both vertical sides.
    pub fn expand(&self, dx: f32, dy: f32) -> Self {
        let delta = Vec2::new(dx, dy);
        Self::new(self.min - delta, self.max + delta)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: Vec2) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        debug_assert!(radius >= 0.0, "negative circle radius: {radius}");
        Self { center, radius }
    }

    pub fn bbox(&self) -> Aabb {
        let delta = Vec2::new(self.radius, self.radius);
        Aabb::new(self.center - delta, self.center + delta)
    }

    pub fn shift(&self, by: Vec2) -> Self {
        Self {
            center: self.center + by,
            radius: self.radius,
        }
    }
}

/// Any collidable shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(Circle),
    Aabb(Aabb),
}

impl Shape {
    pub fn bbox(&self) -> Aabb {
        match self {
            Shape::Circle(c) => c.bbox(),
            Shape::Aabb(b) => *b,
        }
    }

    pub fn shift(&self, by: Vec2) -> Self {
        match self {
            Shape::Circle(c) => Shape::Circle(c.shift(by)),
            Shape::Aabb(b) => Shape::Aabb(b.shift(by)),
        }
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}

impl From<Aabb> for Shape {
    fn from(b: Aabb) -> Self {
        Shape::Aabb(b)
    }
}
