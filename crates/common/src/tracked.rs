//! Change-tracked values.
//!
//! A [`Tracked`] value owns one optional callback. Every mutator goes through
//! [`Tracked::mutate`], which compares the old and new value bit for bit and
//! fires the callback once, after the write, only when they differ. A NaN
//! written over the same NaN is not a change; `0.0` over `-0.0` is. The
//! mutators themselves are the closed operation tables [`Vec3Op`] and
//! [`QuatOp`]; reading never notifies.

use crate::types::Transform;
use glam::{EulerRot, Quat, Vec3};

/// Callback fired with the post-mutation value.
pub type ChangeCallback<T> = Box<dyn FnMut(&T)>;

/// An operation that produces a new value from the current one.
pub trait Mutation<T> {
    fn apply(self, current: T) -> T;
}

/// Mutating operations on a tracked vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Vec3Op {
    Set(Vec3),
    SetX(f32),
    SetY(f32),
    SetZ(f32),
    SetScalar(f32),
    Add(Vec3),
    Sub(Vec3),
    AddScaled(Vec3, f32),
    Mul(Vec3),
    Scale(f32),
    Negate,
    Normalize,
    Lerp(Vec3, f32),
    ApplyQuat(Quat),
    Clamp(Vec3, Vec3),
}

impl Mutation<Vec3> for Vec3Op {
    fn apply(self, v: Vec3) -> Vec3 {
        match self {
            Self::Set(next) => next,
            Self::SetX(x) => Vec3::new(x, v.y, v.z),
            Self::SetY(y) => Vec3::new(v.x, y, v.z),
            Self::SetZ(z) => Vec3::new(v.x, v.y, z),
            Self::SetScalar(s) => Vec3::splat(s),
            Self::Add(o) => v + o,
            Self::Sub(o) => v - o,
            Self::AddScaled(o, s) => v + o * s,
            Self::Mul(o) => v * o,
            Self::Scale(s) => v * s,
            Self::Negate => -v,
            Self::Normalize => v.normalize_or_zero(),
            Self::Lerp(to, t) => v.lerp(to, t),
            Self::ApplyQuat(q) => q * v,
            Self::Clamp(min, max) => v.clamp(min, max),
        }
    }
}

/// Mutating operations on a tracked orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuatOp {
    Set(Quat),
    Identity,
    /// Intrinsic XYZ Euler angles in radians.
    SetEuler(f32, f32, f32),
    SetAxisAngle(Vec3, f32),
    Multiply(Quat),
    Premultiply(Quat),
    Slerp(Quat, f32),
    Normalize,
    Invert,
}

impl Mutation<Quat> for QuatOp {
    fn apply(self, q: Quat) -> Quat {
        match self {
            Self::Set(next) => next,
            Self::Identity => Quat::IDENTITY,
            Self::SetEuler(x, y, z) => Quat::from_euler(EulerRot::XYZ, x, y, z),
            Self::SetAxisAngle(axis, angle) => {
                Quat::from_axis_angle(axis.normalize_or_zero(), angle)
            }
            Self::Multiply(o) => q * o,
            Self::Premultiply(o) => o * q,
            Self::Slerp(to, t) => q.slerp(to, t),
            Self::Normalize => q.normalize(),
            Self::Invert => q.inverse(),
        }
    }
}

/// A value whose change detection compares bit patterns rather than `==`.
pub trait Component: Copy {
    fn same_bits(&self, other: &Self) -> bool;
}

impl Component for f32 {
    fn same_bits(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Component for Vec3 {
    fn same_bits(&self, other: &Self) -> bool {
        self.to_array().map(f32::to_bits) == other.to_array().map(f32::to_bits)
    }
}

impl Component for Quat {
    fn same_bits(&self, other: &Self) -> bool {
        self.to_array().map(f32::to_bits) == other.to_array().map(f32::to_bits)
    }
}

/// A value that notifies a single registered callback when it changes.
pub struct Tracked<T> {
    value: T,
    on_change: Option<ChangeCallback<T>>,
}

impl<T: Component> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            on_change: None,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Register the change callback. Replaces (and returns) any previous one.
    pub fn on_change(&mut self, callback: impl FnMut(&T) + 'static) -> Option<ChangeCallback<T>> {
        self.on_change.replace(Box::new(callback))
    }

    pub fn clear_callback(&mut self) -> Option<ChangeCallback<T>> {
        self.on_change.take()
    }

    pub fn has_callback(&self) -> bool {
        self.on_change.is_some()
    }

    /// Apply a mutation. Returns whether the value changed.
    pub fn mutate<M: Mutation<T>>(&mut self, op: M) -> bool {
        let next = op.apply(self.value);
        if next.same_bits(&self.value) {
            return false;
        }
        self.value = next;
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.value);
        }
        true
    }

    /// Overwrite the value. Same notification rules as [`Tracked::mutate`].
    pub fn set(&mut self, value: T) -> bool {
        self.mutate(Replace(value))
    }
}

impl<T: Component + Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value)
            .field("has_callback", &self.on_change.is_some())
            .finish()
    }
}

struct Replace<T>(T);

impl<T> Mutation<T> for Replace<T> {
    fn apply(self, _current: T) -> T {
        self.0
    }
}

/// Position, rotation and scale, each tracked independently.
#[derive(Debug)]
pub struct TrackedTransform {
    pub position: Tracked<Vec3>,
    pub rotation: Tracked<Quat>,
    pub scale: Tracked<Vec3>,
}

impl TrackedTransform {
    pub fn new(transform: Transform) -> Self {
        Self {
            position: Tracked::new(transform.position),
            rotation: Tracked::new(transform.rotation),
            scale: Tracked::new(transform.scale),
        }
    }

    pub fn snapshot(&self) -> Transform {
        Transform {
            position: self.position.get(),
            rotation: self.rotation.get(),
            scale: self.scale.get(),
        }
    }

    /// Copy every component from `transform`. Each changed component notifies once.
    pub fn copy_from(&mut self, transform: &Transform) {
        self.position.set(transform.position);
        self.rotation.set(transform.rotation);
        self.scale.set(transform.scale);
    }
}

impl Default for TrackedTransform {
    fn default() -> Self {
        Self::new(Transform::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counted(tracked: &mut Tracked<Vec3>) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        tracked.on_change(move |_| c.set(c.get() + 1));
        count
    }

    #[test]
    fn same_value_does_not_notify() {
        let mut v = Tracked::new(Vec3::new(1.0, 2.0, 3.0));
        let count = counted(&mut v);
        assert!(!v.set(Vec3::new(1.0, 2.0, 3.0)));
        assert!(!v.mutate(Vec3Op::SetY(2.0)));
        assert!(!v.mutate(Vec3Op::Add(Vec3::ZERO)));
        assert!(!v.mutate(Vec3Op::Scale(1.0)));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn different_value_notifies_once() {
        let mut v = Tracked::new(Vec3::ZERO);
        let count = counted(&mut v);
        assert!(v.set(Vec3::X));
        assert_eq!(count.get(), 1);
        assert!(v.mutate(Vec3Op::AddScaled(Vec3::Y, 2.0)));
        assert_eq!(count.get(), 2);
        assert_eq!(v.get(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn repeated_nan_write_notifies_once() {
        let mut v = Tracked::new(Vec3::ZERO);
        let count = counted(&mut v);
        let nan = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(v.set(nan));
        assert!(!v.set(nan));
        assert!(!v.mutate(Vec3Op::SetX(f32::NAN)));
        assert_eq!(count.get(), 1);
        assert!(v.set(Vec3::ZERO));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn signed_zero_is_a_change() {
        let mut v = Tracked::new(0.0f32);
        assert!(v.set(-0.0));
        assert!(!v.set(-0.0));
    }

    #[test]
    fn callback_sees_post_mutation_value() {
        let mut v = Tracked::new(Vec3::ONE);
        let seen = Rc::new(Cell::new(Vec3::ZERO));
        let s = seen.clone();
        v.on_change(move |value| s.set(*value));
        v.mutate(Vec3Op::Scale(3.0));
        assert_eq!(seen.get(), Vec3::splat(3.0));
    }

    #[test]
    fn last_registration_wins() {
        let mut v = Tracked::new(Vec3::ZERO);
        let first = counted(&mut v);
        let second = counted(&mut v);
        v.mutate(Vec3Op::SetZ(4.0));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn tiny_difference_is_a_change() {
        let mut v = Tracked::new(Vec3::splat(1.0));
        let count = counted(&mut v);
        v.mutate(Vec3Op::SetX(1.0 + f32::EPSILON));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn quaternion_ops_notify_only_on_change() {
        let mut q = Tracked::new(Quat::IDENTITY);
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        q.on_change(move |_| c.set(c.get() + 1));

        assert!(!q.mutate(QuatOp::Identity));
        assert!(!q.mutate(QuatOp::Multiply(Quat::IDENTITY)));
        assert!(q.mutate(QuatOp::SetEuler(0.0, 1.0, 0.0)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn transform_copy_notifies_per_component() {
        let mut t = TrackedTransform::default();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        t.scale.on_change(move |_| h.set(h.get() + 1));

        t.copy_from(&Transform {
            position: Vec3::X,
            ..Transform::default()
        });
        assert_eq!(hits.get(), 0);

        t.copy_from(&Transform {
            scale: Vec3::splat(2.0),
            ..Transform::default()
        });
        assert_eq!(hits.get(), 1);
        assert_eq!(t.snapshot().scale, Vec3::splat(2.0));
    }
}
