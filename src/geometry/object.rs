//! Mesh objects: vertex/normal/UV pools plus face records.
//!
//! Triangles never own geometry; they index into the pools of the object they
//! belong to. Objects are mutable only inside the scene's geometry bracket and
//! become shared immutable data (`Arc<MeshObject>`) once primitives are built.

use glam::{Vec2, Vec3};
use log::warn;

use crate::errors::{PrismError, Result};
use crate::scene::MaterialKey;

/// A triangle face: three vertex indices plus optional per-corner UV and
/// normal indices and the material it was created under.
#[derive(Clone, Copy, Debug)]
pub struct Face {
    pub vertices: [u32; 3],
    pub uvs: Option<[u32; 3]>,
    pub normals: Option<[u32; 3]>,
    pub material: MaterialKey,
}

/// A triangle mesh under construction or finalized for rendering.
#[derive(Debug, Default)]
pub struct MeshObject {
    pub name: String,
    /// Dense object index, stable across the scene's lifetime.
    pub index: u32,
    pub vertices: Vec<Vec3>,
    /// Original ("undeformed") coordinates, either empty or parallel to `vertices`.
    pub orco: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Normal pool referenced by per-corner face indices.
    pub normals: Vec<Vec3>,
    pub faces: Vec<Face>,
    /// User-supplied normal per vertex, attached by `add_normal`.
    vertex_normal: Vec<Option<u32>>,
}

impl MeshObject {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            ..Self::default()
        }
    }

    /// Adds a vertex and returns its dense index, starting at 0.
    pub fn add_vertex(&mut self, p: Vec3) -> usize {
        self.vertices.push(p);
        self.vertex_normal.push(None);
        self.vertices.len() - 1
    }

    /// Adds a vertex together with its original coordinates.
    pub fn add_vertex_orco(&mut self, p: Vec3, orco: Vec3) -> usize {
        // Backfill so orco stays parallel when meshes mix plain and orco vertices.
        self.orco.resize(self.vertices.len(), Vec3::ZERO);
        self.orco.push(orco);
        self.add_vertex(p)
    }

    /// Attaches a normal to the most recently added vertex.
    pub fn add_normal(&mut self, n: Vec3) -> bool {
        let Some(last) = self.vertex_normal.last_mut() else {
            warn!("Mesh '{}': add_normal before any vertex, ignored", self.name);
            return false;
        };
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            warn!("Mesh '{}': invalid vertex normal, ignored", self.name);
            return false;
        }
        self.normals.push(n);
        *last = Some(self.normals.len() as u32 - 1);
        true
    }

    /// Adds a UV coordinate pair and returns its index.
    pub fn add_uv(&mut self, uv: Vec2) -> usize {
        self.uvs.push(uv);
        self.uvs.len() - 1
    }

    /// Adds a triangle. Per-corner normals are taken from previously attached
    /// vertex normals when all three corners carry one.
    pub fn add_face(
        &mut self,
        vertices: [u32; 3],
        uvs: Option<[u32; 3]>,
        material: MaterialKey,
    ) -> Result<()> {
        for &v in &vertices {
            if v as usize >= self.vertices.len() {
                return Err(PrismError::MeshIndexOutOfBounds {
                    context: "face vertex",
                    index: v as usize,
                });
            }
        }
        if let Some(uv) = uvs {
            for &i in &uv {
                if i as usize >= self.uvs.len() {
                    return Err(PrismError::MeshIndexOutOfBounds {
                        context: "face uv",
                        index: i as usize,
                    });
                }
            }
        }
        let normals = vertices
            .iter()
            .map(|&v| self.vertex_normal[v as usize])
            .collect::<Option<Vec<_>>>()
            .map(|v| [v[0], v[1], v[2]]);
        self.faces.push(Face {
            vertices,
            uvs,
            normals,
            material,
        });
        Ok(())
    }

    #[inline]
    pub fn vertex(&self, i: u32) -> Vec3 {
        self.vertices[i as usize]
    }

    /// The three corner positions of a face.
    #[inline]
    pub fn corners(&self, face: u32) -> [Vec3; 3] {
        let f = &self.faces[face as usize];
        [
            self.vertices[f.vertices[0] as usize],
            self.vertices[f.vertices[1] as usize],
            self.vertices[f.vertices[2] as usize],
        ]
    }

    /// Unnormalized geometric normal; its length is twice the face area.
    #[inline]
    pub fn face_normal_raw(&self, face: u32) -> Vec3 {
        let [a, b, c] = self.corners(face);
        (b - a).cross(c - a)
    }

    /// True when the face has zero area and can never be hit.
    #[inline]
    pub fn face_degenerate(&self, face: u32) -> bool {
        self.face_normal_raw(face).length_squared() == 0.0
    }

    /// Generates per-corner smoothed normals.
    ///
    /// A neighboring face contributes to a corner normal when its dihedral
    /// angle with the corner's face is at most `angle_deg`; 180 degrees merges
    /// everything around each vertex.
    pub fn smooth(&mut self, angle_deg: f32) {
        let cos_threshold = angle_deg.clamp(0.0, 180.0).to_radians().cos();

        let face_normals: Vec<Vec3> = (0..self.faces.len() as u32)
            .map(|f| self.face_normal_raw(f).normalize_or_zero())
            .collect();

        let mut adjacent: Vec<Vec<u32>> = vec![Vec::new(); self.vertices.len()];
        for (fi, face) in self.faces.iter().enumerate() {
            for &v in &face.vertices {
                adjacent[v as usize].push(fi as u32);
            }
        }

        for fi in 0..self.faces.len() {
            let own = face_normals[fi];
            if own == Vec3::ZERO {
                continue;
            }
            let mut corner_indices = [0u32; 3];
            for (ci, &v) in self.faces[fi].vertices.iter().enumerate() {
                let mut sum = Vec3::ZERO;
                for &fj in &adjacent[v as usize] {
                    let n = face_normals[fj as usize];
                    if fj as usize == fi || n.dot(own) >= cos_threshold - 1e-6 {
                        // Area weighting falls out of the unnormalized cross products.
                        sum += self.face_normal_raw(fj);
                    }
                }
                let n = sum.normalize_or_zero();
                let n = if n == Vec3::ZERO { own } else { n };
                self.normals.push(n);
                corner_indices[ci] = self.normals.len() as u32 - 1;
            }
            self.faces[fi].normals = Some(corner_indices);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn quad() -> MeshObject {
        // Two coplanar triangles in the XY plane.
        let mut m = MeshObject::new("quad", 0);
        m.add_vertex(vec3(0.0, 0.0, 0.0));
        m.add_vertex(vec3(1.0, 0.0, 0.0));
        m.add_vertex(vec3(1.0, 1.0, 0.0));
        m.add_vertex(vec3(0.0, 1.0, 0.0));
        m.add_face([0, 1, 2], None, MaterialKey::default()).unwrap();
        m.add_face([0, 2, 3], None, MaterialKey::default()).unwrap();
        m
    }

    #[test]
    fn vertex_indices_are_dense() {
        let mut m = MeshObject::new("m", 0);
        assert_eq!(m.add_vertex(Vec3::ZERO), 0);
        assert_eq!(m.add_vertex(Vec3::X), 1);
        assert_eq!(m.add_vertex_orco(Vec3::Y, Vec3::Z), 2);
        assert_eq!(m.orco.len(), 3);
    }

    #[test]
    fn face_rejects_out_of_range_vertex() {
        let mut m = MeshObject::new("m", 0);
        m.add_vertex(Vec3::ZERO);
        assert!(m.add_face([0, 1, 2], None, MaterialKey::default()).is_err());
    }

    #[test]
    fn smooth_merges_coplanar_faces() {
        let mut m = quad();
        m.smooth(45.0);
        for face in &m.faces {
            let idx = face.normals.expect("smoothed corners");
            for &i in &idx {
                let n = m.normals[i as usize];
                assert!((n - Vec3::Z).length() < 1e-5);
            }
        }
    }

    #[test]
    fn degenerate_face_detected() {
        let mut m = MeshObject::new("m", 0);
        m.add_vertex(Vec3::ZERO);
        m.add_vertex(Vec3::X);
        m.add_vertex(Vec3::X * 2.0);
        m.add_face([0, 1, 2], None, MaterialKey::default()).unwrap();
        assert!(m.face_degenerate(0));
    }
}
