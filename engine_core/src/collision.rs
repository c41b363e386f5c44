//! Narrow phase: pairwise overlap tests producing separation vectors.
//!
//! Every function returns the push to apply to its *first* shape, scaled by a
//! damping factor instead of the full penetration depth. Swapping the
//! arguments negates the result. `None` always means "no overlap".

use crate::geometry::{Aabb, Circle, Shape};
use crate::math::Vec2;

/// Separation vector for `a` against `b`, dispatched on shape kind.
pub fn collide(a: &Shape, b: &Shape, damping: f32) -> Option<Vec2> {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, b, damping),
        (Shape::Circle(c), Shape::Aabb(bx)) => collide_box_circle(bx, c, damping).map(|push| -push),
        (Shape::Aabb(bx), Shape::Circle(c)) => collide_box_circle(bx, c, damping),
        (Shape::Aabb(a), Shape::Aabb(b)) => collide_boxes(a, b),
    }
}

/// Overlap iff the center distance is at most the sum of radii.
///
/// Concentric circles yield a zero vector.
pub fn collide_circles(a: &Circle, b: &Circle, damping: f32) -> Option<Vec2> {
    let delta = a.center - b.center;
    let target = a.radius + b.radius;
    let actual = delta.len();
    if actual > target {
        return None;
    }
    Some(delta.normalized() * (target - actual) * damping)
}

/// Push for the box. Sums a vertical correction, a horizontal correction and
/// one correction per corner inside the circle.
pub fn collide_box_circle(bx: &Aabb, circle: &Circle, damping: f32) -> Option<Vec2> {
    let c = circle.center;
    let r = circle.radius;
    let mid = bx.center();
    let mut total = Vec2::ZERO;

    if bx.expand(0.0, r).contains(c) {
        if c.y < mid.y {
            total.y += r - (bx.min().y - c.y);
        } else {
            total.y -= r - (c.y - bx.max().y);
        }
    }

    if bx.expand(r, 0.0).contains(c) {
        if c.x < mid.x {
            total.x += r - (bx.min().x - c.x);
        } else {
            total.x -= r - (c.x - bx.max().x);
        }
    }

    for corner in bx.corners() {
        let push = corner - c;
        let dist = push.len();
        if dist <= r {
            total += push.normalized() * (r - dist);
        }
    }

    if total.len_sq() > 0.0 {
        Some(total * damping)
    } else {
        None
    }
}

/// Always `None`.
///
/// Boxes are only used for static geometry, and static geometry never pushes
/// other static geometry. Callers rely on box pairs producing no contacts.
pub fn collide_boxes(_a: &Aabb, _b: &Aabb) -> Option<Vec2> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAMPING: f32 = 0.75;
    const EPS: f32 = 1e-5;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).len() < EPS
    }

    fn circle(x: f32, y: f32, r: f32) -> Shape {
        Shape::Circle(Circle::new(Vec2::new(x, y), r))
    }

    fn unit_box() -> Shape {
        Shape::Aabb(Aabb::new(Vec2::ZERO, Vec2::new(10.0, 10.0)))
    }

    #[test]
    fn circles_push_apart_along_center_line() {
        let push = collide(&circle(0.0, 0.0, 1.0), &circle(1.5, 0.0, 1.0), DAMPING).unwrap();
        assert!(close(push, Vec2::new(-0.375, 0.0)), "got {push}");
    }

    #[test]
    fn distant_circles_do_not_collide() {
        assert!(collide(&circle(0.0, 0.0, 1.0), &circle(2.01, 0.0, 1.0), DAMPING).is_none());
    }

    #[test]
    fn touching_circles_yield_zero_push() {
        let push = collide(&circle(0.0, 0.0, 1.0), &circle(2.0, 0.0, 1.0), DAMPING).unwrap();
        assert!(close(push, Vec2::ZERO));
    }

    #[test]
    fn concentric_circles_yield_zero_vector() {
        let push = collide(&circle(3.0, 3.0, 1.0), &circle(3.0, 3.0, 2.0), DAMPING).unwrap();
        assert_eq!(push, Vec2::ZERO);
    }

    #[test]
    fn circle_above_box_pushes_box_down() {
        let c = circle(5.0, -2.0, 3.0);
        let push = collide(&unit_box(), &c, DAMPING).unwrap();
        assert!(close(push, Vec2::new(0.0, 0.75)), "got {push}");
        let back = collide(&c, &unit_box(), DAMPING).unwrap();
        assert!(close(back, Vec2::new(0.0, -0.75)), "got {back}");
    }

    #[test]
    fn circle_near_corner_uses_corner_correction() {
        // Outside both widened boxes, but within reach of the (0, 0) corner.
        let c = circle(-1.0, -1.0, 2.0);
        let push = collide(&unit_box(), &c, DAMPING).unwrap();
        let expected = Vec2::new(1.0, 1.0).normalized() * (2.0 - 2f32.sqrt()) * DAMPING;
        assert!(close(push, expected), "got {push}");
    }

    #[test]
    fn circle_far_from_box_is_none() {
        assert!(collide(&unit_box(), &circle(30.0, 30.0, 3.0), DAMPING).is_none());
    }

    #[test]
    fn collide_is_antisymmetric() {
        let shapes = [
            circle(0.0, 0.0, 4.0),
            circle(3.0, 1.0, 2.0),
            circle(11.0, 5.0, 2.5),
            circle(12.0, 12.0, 3.0),
            unit_box(),
        ];
        for a in &shapes {
            for b in &shapes {
                match (collide(a, b, DAMPING), collide(b, a, DAMPING)) {
                    (Some(ab), Some(ba)) => assert!(close(ab, -ba), "{a:?} vs {b:?}"),
                    (None, None) => {}
                    other => panic!("asymmetric overlap for {a:?} vs {b:?}: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn boxes_never_collide() {
        let a = unit_box();
        let b = Shape::Aabb(Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(15.0, 15.0)));
        assert!(collide(&a, &b, DAMPING).is_none());
    }

    #[test]
    fn damping_scales_push() {
        let a = circle(0.0, 0.0, 1.0);
        let b = circle(1.0, 0.0, 1.0);
        let full = collide(&a, &b, 1.0).unwrap();
        let half = collide(&a, &b, 0.5).unwrap();
        assert!(close(full * 0.5, half));
    }
}
