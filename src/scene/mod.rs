//! The scene: owner of all objects, materials, textures, lights and cameras,
//! plus the geometry build bracket and accelerator setup.
//!
//! Resources live in slotmap tables addressed by typed keys; name lookup goes
//! through side maps. Primitives hold `Arc` clones of the immutable mesh and
//! material data, so nothing in the render path ever reaches back into the
//! scene tables.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use log::{error, trace, warn};
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use crate::accelerator::{Accelerator, create_accelerator};
use crate::background::{Background, create_background};
use crate::camera::{Camera, create_camera};
use crate::errors::{PrismError, Result};
use crate::geometry::{FacePrimitive, InstancePrimitive, MeshObject, Primitive};
use crate::light::{Light, create_light};
use crate::material::{Material, create_material, default_material};
use crate::param::{ParamList, ParamMap};
use crate::render::integrator::{RenderContext, SurfaceIntegrator, create_integrator};
use crate::render::{
    Film, FrameParams, OutputCallbacks, ProgressCallback, RenderControl, render_frame,
};
use crate::texture::{Texture, TextureResolver, create_texture};

new_key_type! {
    pub struct ObjectKey;
    pub struct MaterialKey;
    pub struct TextureKey;
    pub struct LightKey;
    pub struct CameraKey;
}

/// The geometry build bracket state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GeometryState {
    /// Outside the bracket; rendering is possible.
    Ready,
    /// Inside `start_geometry`/`end_geometry`.
    Geometry,
    /// Inside an object; mesh-building calls are legal.
    Object,
}

/// A mesh is mutable while building, then shared immutably.
#[derive(Debug)]
enum MeshEntry {
    Building(MeshObject),
    Final(Arc<MeshObject>),
}

pub struct Scene {
    state: GeometryState,

    meshes: SlotMap<ObjectKey, MeshEntry>,
    object_names: FxHashMap<String, ObjectKey>,
    object_prims: SecondaryMap<ObjectKey, Vec<Arc<dyn Primitive>>>,
    instances: Vec<(ObjectKey, Mat4)>,
    primitives: Vec<Arc<dyn Primitive>>,
    accelerator: Option<Box<dyn Accelerator>>,

    materials: SlotMap<MaterialKey, Arc<dyn Material>>,
    material_names: FxHashMap<String, MaterialKey>,
    textures: SlotMap<TextureKey, Arc<dyn Texture>>,
    texture_names: FxHashMap<String, TextureKey>,
    lights: SlotMap<LightKey, Arc<dyn Light>>,
    light_names: FxHashMap<String, LightKey>,
    cameras: SlotMap<CameraKey, Arc<dyn Camera>>,
    camera_names: FxHashMap<String, CameraKey>,

    current_object: Option<ObjectKey>,
    current_material: MaterialKey,
    current_camera: Option<CameraKey>,
    background: Option<Arc<dyn Background>>,
    integrator: Option<Arc<dyn SurfaceIntegrator>>,

    render_params: ParamMap,
    next_object_index: u32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut materials: SlotMap<MaterialKey, Arc<dyn Material>> = SlotMap::with_key();
        let default_key = materials.insert(default_material());
        let mut material_names = FxHashMap::default();
        material_names.insert("default".to_string(), default_key);
        Self {
            state: GeometryState::Ready,
            meshes: SlotMap::with_key(),
            object_names: FxHashMap::default(),
            object_prims: SecondaryMap::new(),
            instances: Vec::new(),
            primitives: Vec::new(),
            accelerator: None,
            materials,
            material_names,
            textures: SlotMap::with_key(),
            texture_names: FxHashMap::default(),
            lights: SlotMap::with_key(),
            light_names: FxHashMap::default(),
            cameras: SlotMap::with_key(),
            camera_names: FxHashMap::default(),
            current_object: None,
            current_material: default_key,
            current_camera: None,
            background: None,
            integrator: None,
            render_params: ParamMap::new(),
            next_object_index: 0,
        }
    }

    /// Drops everything and returns to the freshly-created state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // ------------------------------------------------------------------
    // Geometry bracket
    // ------------------------------------------------------------------

    pub fn start_geometry(&mut self) -> Result<()> {
        if self.state != GeometryState::Ready {
            return Err(PrismError::GeometryState(
                "start_geometry while already in geometry state".into(),
            ));
        }
        self.state = GeometryState::Geometry;
        Ok(())
    }

    /// Closes the bracket and builds the primitive list: one face primitive
    /// per non-degenerate face, plus instance wrappers.
    pub fn end_geometry(&mut self) -> Result<()> {
        if self.state != GeometryState::Geometry {
            return Err(PrismError::GeometryState(
                "end_geometry outside geometry state".into(),
            ));
        }
        self.state = GeometryState::Ready;

        // Finalize meshes into shared immutable data.
        for (_, entry) in &mut self.meshes {
            if let MeshEntry::Building(mesh) = entry {
                *entry = MeshEntry::Final(Arc::new(std::mem::take(mesh)));
            }
        }

        self.primitives.clear();
        self.object_prims.clear();
        for (key, entry) in &self.meshes {
            let MeshEntry::Final(mesh) = entry else {
                continue;
            };
            let mut prims: Vec<Arc<dyn Primitive>> = Vec::with_capacity(mesh.faces.len());
            for (fi, face) in mesh.faces.iter().enumerate() {
                if mesh.face_degenerate(fi as u32) {
                    trace!("Mesh '{}': skipping zero-area face {fi}", mesh.name);
                    continue;
                }
                let material = self
                    .materials
                    .get(face.material)
                    .cloned()
                    .unwrap_or_else(default_material);
                prims.push(Arc::new(FacePrimitive::new(
                    mesh.clone(),
                    fi as u32,
                    material,
                )));
            }
            self.primitives.extend(prims.iter().cloned());
            self.object_prims.insert(key, prims);
        }

        for (base, matrix) in &self.instances {
            let Some(base_prims) = self.object_prims.get(*base) else {
                warn!("Instance references an object with no primitives");
                continue;
            };
            for prim in base_prims {
                self.primitives
                    .push(Arc::new(InstancePrimitive::new(prim.clone(), *matrix)));
            }
        }

        // Geometry changed; any previous accelerator is stale.
        self.accelerator = None;
        Ok(())
    }

    pub fn create_object(&mut self, name: &str, params: &ParamMap) -> Result<ObjectKey> {
        if self.state != GeometryState::Geometry {
            return Err(PrismError::GeometryState(
                "create_object outside geometry state".into(),
            ));
        }
        if self.object_names.contains_key(name) {
            return Err(PrismError::DuplicateName {
                kind: "object",
                name: name.to_string(),
            });
        }
        let type_name = params.str_or("type", "mesh");
        if type_name != "mesh" {
            warn!("Object type '{type_name}' not supported ('{name}'), creating a mesh");
        }
        let index = self.next_object_index;
        self.next_object_index += 1;
        let key = self
            .meshes
            .insert(MeshEntry::Building(MeshObject::new(name, index)));
        self.object_names.insert(name.to_string(), key);
        self.current_object = Some(key);
        self.state = GeometryState::Object;
        Ok(key)
    }

    pub fn end_object(&mut self) -> Result<()> {
        if self.state != GeometryState::Object {
            return Err(PrismError::GeometryState(
                "end_object without an open object".into(),
            ));
        }
        self.current_object = None;
        self.state = GeometryState::Geometry;
        Ok(())
    }

    fn current_mesh(&mut self) -> Result<&mut MeshObject> {
        let key = self.current_object.ok_or_else(|| {
            PrismError::GeometryState("mesh-building call without an open object".into())
        })?;
        match self.meshes.get_mut(key) {
            Some(MeshEntry::Building(mesh)) => Ok(mesh),
            _ => Err(PrismError::GeometryState(
                "current object is not buildable".into(),
            )),
        }
    }

    pub fn add_vertex(&mut self, p: Vec3) -> Result<usize> {
        Ok(self.current_mesh()?.add_vertex(p))
    }

    pub fn add_vertex_orco(&mut self, p: Vec3, orco: Vec3) -> Result<usize> {
        Ok(self.current_mesh()?.add_vertex_orco(p, orco))
    }

    pub fn add_normal(&mut self, n: Vec3) -> Result<bool> {
        Ok(self.current_mesh()?.add_normal(n))
    }

    pub fn add_uv(&mut self, uv: Vec2) -> Result<usize> {
        Ok(self.current_mesh()?.add_uv(uv))
    }

    pub fn add_face(&mut self, vertices: [u32; 3], uvs: Option<[u32; 3]>) -> Result<()> {
        let material = self.current_material;
        self.current_mesh()?.add_face(vertices, uvs, material)
    }

    /// Regenerates smoothed vertex normals for a finished (but not yet
    /// finalized) object.
    pub fn smooth_mesh(&mut self, name: &str, angle_deg: f32) -> Result<()> {
        let key = self.object_key(name)?;
        match self.meshes.get_mut(key) {
            Some(MeshEntry::Building(mesh)) => {
                mesh.smooth(angle_deg);
                Ok(())
            }
            _ => Err(PrismError::GeometryState(format!(
                "smooth_mesh('{name}') after geometry was finalized"
            ))),
        }
    }

    pub fn add_instance(&mut self, base_name: &str, obj_to_world: Mat4) -> Result<()> {
        if self.state != GeometryState::Geometry {
            return Err(PrismError::GeometryState(
                "add_instance outside geometry state".into(),
            ));
        }
        let base = self.object_key(base_name)?;
        self.instances.push((base, obj_to_world));
        Ok(())
    }

    fn object_key(&self, name: &str) -> Result<ObjectKey> {
        self.object_names
            .get(name)
            .copied()
            .ok_or_else(|| PrismError::NotFound {
                kind: "object",
                name: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Resource creation
    // ------------------------------------------------------------------

    /// Creates a material under `name`. Never fails: unknown types fall back
    /// to the default diffuse inside the factory.
    pub fn create_material(
        &mut self,
        name: &str,
        params: &ParamMap,
        node_list: &ParamList,
    ) -> MaterialKey {
        let material = create_material(name, params, node_list, &*self);
        let key = self.materials.insert(material);
        self.material_names.insert(name.to_string(), key);
        key
    }

    pub fn set_current_material(&mut self, name: &str) -> Result<()> {
        let key = self
            .material_names
            .get(name)
            .copied()
            .ok_or_else(|| PrismError::NotFound {
                kind: "material",
                name: name.to_string(),
            })?;
        self.current_material = key;
        Ok(())
    }

    pub fn create_texture(&mut self, name: &str, params: &ParamMap) -> Result<TextureKey> {
        let texture = create_texture(name, params).ok_or_else(|| PrismError::UnknownType {
            kind: "texture",
            type_name: params.str_or("type", "").to_string(),
        })?;
        let key = self.textures.insert(texture);
        self.texture_names.insert(name.to_string(), key);
        Ok(key)
    }

    pub fn create_light(&mut self, name: &str, params: &ParamMap) -> Result<LightKey> {
        let light = create_light(name, params).ok_or_else(|| PrismError::UnknownType {
            kind: "light",
            type_name: params.str_or("type", "").to_string(),
        })?;
        let key = self.lights.insert(light);
        self.light_names.insert(name.to_string(), key);
        Ok(key)
    }

    /// Creates a camera; the most recently created camera becomes current.
    pub fn create_camera(&mut self, name: &str, params: &ParamMap) -> Result<CameraKey> {
        let camera = create_camera(name, params).ok_or_else(|| PrismError::UnknownType {
            kind: "camera",
            type_name: params.str_or("type", "").to_string(),
        })?;
        let key = self.cameras.insert(camera);
        self.camera_names.insert(name.to_string(), key);
        self.current_camera = Some(key);
        Ok(key)
    }

    pub fn create_background(&mut self, name: &str, params: &ParamMap) -> Result<()> {
        self.background = Some(create_background(name, params).ok_or_else(|| {
            PrismError::UnknownType {
                kind: "background",
                type_name: params.str_or("type", "").to_string(),
            }
        })?);
        Ok(())
    }

    pub fn create_integrator(&mut self, name: &str, params: &ParamMap) -> Result<()> {
        self.integrator = Some(create_integrator(name, params).ok_or_else(|| {
            PrismError::UnknownType {
                kind: "integrator",
                type_name: params.str_or("type", "").to_string(),
            }
        })?);
        Ok(())
    }

    pub fn material_by_name(&self, name: &str) -> Option<Arc<dyn Material>> {
        self.material_names
            .get(name)
            .and_then(|key| self.materials.get(*key))
            .cloned()
    }

    pub fn light_by_name(&self, name: &str) -> Option<Arc<dyn Light>> {
        self.light_names
            .get(name)
            .and_then(|key| self.lights.get(*key))
            .cloned()
    }

    /// Selects which camera the next render uses.
    pub fn set_current_camera(&mut self, name: &str) -> Result<()> {
        let key = self
            .camera_names
            .get(name)
            .copied()
            .ok_or_else(|| PrismError::NotFound {
                kind: "camera",
                name: name.to_string(),
            })?;
        self.current_camera = Some(key);
        Ok(())
    }

    pub fn primitives(&self) -> &[Arc<dyn Primitive>] {
        &self.primitives
    }

    pub fn accelerator(&self) -> Option<&dyn Accelerator> {
        self.accelerator.as_deref()
    }

    // ------------------------------------------------------------------
    // Render setup and execution
    // ------------------------------------------------------------------

    /// Builds the accelerator over the collected primitives and remembers the
    /// render parameters. Requires a closed geometry bracket.
    pub fn setup(&mut self, params: &ParamMap) -> Result<()> {
        if self.state != GeometryState::Ready {
            return Err(PrismError::GeometryState(
                "setup_render inside geometry state".into(),
            ));
        }
        self.render_params = params.clone();
        self.accelerator = Some(create_accelerator(self.primitives.clone(), params));
        Ok(())
    }

    /// Renders a frame. Cancellation is not an error: the returned film holds
    /// whatever tiles finished.
    pub fn render(
        &self,
        control: &RenderControl,
        progress: Option<&ProgressCallback>,
        outputs: Option<&OutputCallbacks>,
    ) -> Result<Film> {
        let accelerator = self
            .accelerator
            .as_deref()
            .ok_or(PrismError::SetupIncomplete("setup_render was not called"))?;
        let camera = self
            .current_camera
            .and_then(|key| self.cameras.get(key))
            .ok_or(PrismError::SetupIncomplete("no camera in scene"))?;
        let integrator = self
            .integrator
            .as_deref()
            .ok_or(PrismError::SetupIncomplete("no integrator in scene"))?;

        let lights: Vec<Arc<dyn Light>> = self.lights.values().cloned().collect();
        if lights.is_empty() {
            warn!("Rendering without any lights");
        }
        let ctx = RenderContext {
            accelerator,
            lights: &lights,
            background: self.background.as_deref(),
            shadow_bias: self.render_params.float_or("shadow_bias", 5e-4),
        };
        let frame = FrameParams {
            samples_per_pixel: self.render_params.int_or("samples", 16).max(1) as u32,
            tile_size: self.render_params.int_or("tile_size", 32).max(1) as u32,
            time: self.render_params.float_or("time", 0.0),
            seed: self.render_params.int_or("seed", 0) as u64,
            node_slots: self
                .materials
                .values()
                .map(|m| m.node_slots())
                .max()
                .unwrap_or(0),
        };
        let (width, height) = camera.resolution();
        let film = Film::new(width, height);
        if !render_frame(
            &ctx,
            integrator,
            camera.as_ref(),
            &film,
            &frame,
            control,
            progress,
            outputs,
        ) {
            error!("Render cancelled, film is partial");
        }
        Ok(film)
    }
}

impl TextureResolver for Scene {
    fn resolve_texture(&self, name: &str) -> Option<Arc<dyn Texture>> {
        self.texture_names
            .get(name)
            .and_then(|key| self.textures.get(*key))
            .cloned()
    }
}
