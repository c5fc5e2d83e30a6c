use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::{Isometry, Real, Vector};

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

pub(crate) fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_rotation(q: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn to_quat(q: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

pub(crate) fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(Translation3::from(to_vector(position)), to_rotation(rotation))
}
