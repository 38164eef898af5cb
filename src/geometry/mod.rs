//! Geometry: rays, bounds, surface points, meshes and primitives.

pub mod bound;
pub mod object;
pub mod primitive;
pub mod ray;
pub mod surface;

pub use bound::Bound;
pub use object::{Face, MeshObject};
pub use primitive::{FacePrimitive, Hit, InstancePrimitive, Primitive};
pub use ray::{DiffRay, Ray};
pub use surface::{SurfacePoint, create_cs, normal_face_forward};
