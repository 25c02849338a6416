// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! WebGL2 renderer.
//!
//! [`WebGlRenderer`] owns one `<canvas>` appended to a container element.
//! Each frame it:
//!
//! 1. frees GPU state for everything in [`Scene::drain_disposed`],
//! 2. uploads buffers for geometries it has not seen, and re-uploads UVs
//!    whose [`uv_version`](veneer_core::geometry::PlaneGeometry::uv_version)
//!    moved,
//! 3. draws [`Scene::render_list`] in order, once per material of each mesh.
//!
//! Programs are keyed by [`Material::program`] name. Material uniforms are
//! bound as `u_<name>`; the camera and model matrices as `u_projection`,
//! `u_view` and `u_model`.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::fmt;

use veneer_core::manager::{Camera, Renderer};
use veneer_core::material::{Material, SURFACE_PROGRAM, UniformValue};
use veneer_core::scene::{Disposed, GeometryId, Scene};
use wasm_bindgen::JsCast as _;
use web_sys::{
    HtmlCanvasElement, HtmlElement, WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram,
    WebGlShader, WebGlUniformLocation, WebGlVertexArrayObject,
};

use crate::textures::{GlTextures, ImageTextureSource};

/// Device pixel ratios above this are clamped.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

const SURFACE_VERTEX: &str = r"#version 300 es
uniform mat4 u_projection;
uniform mat4 u_view;
uniform mat4 u_model;
uniform vec2 u_hoverOffset;
uniform vec2 u_pointerVelocity;
uniform float u_hover;
in vec3 a_position;
in vec2 a_uv;
out vec2 v_uv;
void main() {
  vec3 p = a_position;
  float falloff = 1.0 - clamp(length(a_uv - 0.5) * 2.0, 0.0, 1.0);
  p.xy += u_hoverOffset * falloff * u_hover;
  p.z += dot(u_pointerVelocity, a_uv - 0.5) * falloff;
  v_uv = a_uv;
  gl_Position = u_projection * u_view * u_model * vec4(p, 1.0);
}
";

const SURFACE_FRAGMENT: &str = r"#version 300 es
precision highp float;
uniform sampler2D u_texture;
uniform float u_opacity;
uniform float u_reveal;
uniform float u_time;
uniform float u_pageTransitionProgress;
in vec2 v_uv;
out vec4 color;
void main() {
  vec2 uv = (v_uv - 0.5) * 0.9 + 0.5;
  float ripple = sin(u_time * 0.001 + uv.y * 12.0) * 0.01 * sin(u_pageTransitionProgress * 3.14159);
  vec4 texel = texture(u_texture, uv + vec2(ripple, 0.0));
  float shown = step(1.0 - u_reveal, 1.0 - v_uv.y);
  color = vec4(texel.rgb, texel.a * u_opacity * shown);
}
";

/// Fatal errors while setting up the render surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitError {
    /// No global `window` or `document`.
    NoWindow,
    /// The named container element does not exist.
    NoContainer(String),
    /// WebGL2 is unavailable.
    ContextUnavailable,
    /// A built-in program failed to compile or link.
    Shader(String),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWindow => f.write_str("no window or document"),
            Self::NoContainer(selector) => write!(f, "no container matches {selector:?}"),
            Self::ContextUnavailable => f.write_str("WebGL2 is unavailable"),
            Self::Shader(log) => write!(f, "shader setup failed: {log}"),
        }
    }
}

impl core::error::Error for InitError {}

const POSITION_LOCATION: u32 = 0;
const UV_LOCATION: u32 = 1;

struct GlProgram {
    program: WebGlProgram,
    locations: BTreeMap<String, Option<WebGlUniformLocation>>,
}

impl GlProgram {
    fn location(&mut self, gl: &Gl, uniform: &str) -> Option<WebGlUniformLocation> {
        if let Some(loc) = self.locations.get(uniform) {
            return loc.clone();
        }
        let loc = gl.get_uniform_location(&self.program, uniform);
        self.locations.insert(uniform.to_string(), loc.clone());
        loc
    }
}

struct GpuGeometry {
    vao: WebGlVertexArrayObject,
    positions: WebGlBuffer,
    uvs: WebGlBuffer,
    indices: WebGlBuffer,
    index_count: i32,
    uv_version: u64,
}

/// [`Renderer`] over a WebGL2 context.
pub struct WebGlRenderer {
    gl: Gl,
    canvas: HtmlCanvasElement,
    textures: Rc<GlTextures>,
    source: Rc<ImageTextureSource>,
    programs: BTreeMap<String, GlProgram>,
    geometries: BTreeMap<GeometryId, GpuGeometry>,
    pixel_ratio: f64,
    disposed: bool,
}

impl fmt::Debug for WebGlRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebGlRenderer")
            .field("programs", &self.programs.len())
            .field("geometries", &self.geometries.len())
            .field("textures", &self.textures.len())
            .field("pixel_ratio", &self.pixel_ratio)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl WebGlRenderer {
    /// Creates a canvas inside the first element matching `selector`.
    pub fn from_selector(selector: &str) -> Result<Self, InitError> {
        let window = web_sys::window().ok_or(InitError::NoWindow)?;
        let document = window.document().ok_or(InitError::NoWindow)?;
        let container = document
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| InitError::NoContainer(selector.to_string()))?;
        Self::new(&container, window.device_pixel_ratio())
    }

    /// Creates a canvas inside `container`.
    pub fn new(container: &HtmlElement, device_pixel_ratio: f64) -> Result<Self, InitError> {
        let document = container.owner_document().ok_or(InitError::NoWindow)?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|_| InitError::NoWindow)?
            .unchecked_into();
        let gl: Gl = canvas
            .get_context("webgl2")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<Gl>().ok())
            .ok_or(InitError::ContextUnavailable)?;

        let style = canvas.style();
        let _ = style.set_property("position", "fixed");
        let _ = style.set_property("inset", "0");
        let _ = style.set_property("pointer-events", "none");
        let _ = container.append_child(&canvas);

        let textures = Rc::new(GlTextures::new(gl.clone()));
        let source = Rc::new(ImageTextureSource::new(Rc::clone(&textures)));
        let mut renderer = Self {
            gl,
            canvas,
            textures,
            source,
            programs: BTreeMap::new(),
            geometries: BTreeMap::new(),
            pixel_ratio: clamp_pixel_ratio(device_pixel_ratio),
            disposed: false,
        };
        let program = renderer.compile(SURFACE_VERTEX, SURFACE_FRAGMENT)?;
        renderer.programs.insert(SURFACE_PROGRAM.to_string(), program);
        Ok(renderer)
    }

    /// The texture source that uploads into this renderer's context.
    #[must_use]
    pub fn texture_source(&self) -> Rc<ImageTextureSource> {
        Rc::clone(&self.source)
    }

    /// The output canvas.
    #[must_use]
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Registers an extra program under `name`.
    pub fn add_program(&mut self, name: &str, vertex: &str, fragment: &str) -> Result<(), InitError> {
        let program = self.compile(vertex, fragment)?;
        self.programs.insert(name.to_string(), program);
        Ok(())
    }

    fn compile(&self, vertex: &str, fragment: &str) -> Result<GlProgram, InitError> {
        let gl = &self.gl;
        let vs = compile_shader(gl, Gl::VERTEX_SHADER, vertex)?;
        let fs = compile_shader(gl, Gl::FRAGMENT_SHADER, fragment)?;
        let program = gl
            .create_program()
            .ok_or_else(|| InitError::Shader("create_program returned null".to_string()))?;
        gl.attach_shader(&program, &vs);
        gl.attach_shader(&program, &fs);
        gl.bind_attrib_location(&program, POSITION_LOCATION, "a_position");
        gl.bind_attrib_location(&program, UV_LOCATION, "a_uv");
        gl.link_program(&program);
        gl.delete_shader(Some(&vs));
        gl.delete_shader(Some(&fs));
        if !gl
            .get_program_parameter(&program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            let log = gl.get_program_info_log(&program).unwrap_or_default();
            gl.delete_program(Some(&program));
            return Err(InitError::Shader(log));
        }
        Ok(GlProgram {
            program,
            locations: BTreeMap::new(),
        })
    }

    fn release(&mut self, disposed: Vec<Disposed>) {
        for d in disposed {
            if let Disposed::Geometry(id) = d
                && let Some(gpu) = self.geometries.remove(&id)
            {
                delete_geometry(&self.gl, &gpu);
            }
        }
    }

    fn upload(&mut self, scene: &Scene, id: GeometryId) -> Option<()> {
        let geometry = scene.geometry(id);
        let gl = &self.gl;
        if let Some(gpu) = self.geometries.get_mut(&id) {
            if gpu.uv_version != geometry.uv_version() {
                gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&gpu.uvs));
                gl.buffer_data_with_u8_array(
                    Gl::ARRAY_BUFFER,
                    bytemuck::cast_slice(&geometry.uvs),
                    Gl::DYNAMIC_DRAW,
                );
                gpu.uv_version = geometry.uv_version();
            }
            return Some(());
        }

        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(&vao));
        let positions = array_buffer(gl, POSITION_LOCATION, 3, bytemuck::cast_slice(&geometry.positions))?;
        let uvs = array_buffer(gl, UV_LOCATION, 2, bytemuck::cast_slice(&geometry.uvs))?;
        let indices = gl.create_buffer()?;
        gl.bind_buffer(Gl::ELEMENT_ARRAY_BUFFER, Some(&indices));
        gl.buffer_data_with_u8_array(
            Gl::ELEMENT_ARRAY_BUFFER,
            bytemuck::cast_slice(&geometry.indices),
            Gl::STATIC_DRAW,
        );
        gl.bind_vertex_array(None);

        self.geometries.insert(
            id,
            GpuGeometry {
                vao,
                positions,
                uvs,
                indices,
                index_count: i32::try_from(geometry.indices.len()).unwrap_or(i32::MAX),
                uv_version: geometry.uv_version(),
            },
        );
        Some(())
    }

    fn bind_material(&mut self, material: &Material, camera: &Camera, model: &[f32; 16]) -> bool {
        let gl = &self.gl;
        let Some(program) = self.programs.get_mut(material.program()) else {
            return false;
        };
        gl.use_program(Some(&program.program));

        let projection = camera.projection_matrix().to_f32_array();
        let view = camera.view_matrix().to_f32_array();
        for (name, m) in [("u_projection", &projection), ("u_view", &view), ("u_model", model)] {
            gl.uniform_matrix4fv_with_f32_array(program.location(gl, name).as_ref(), false, m);
        }

        for (name, value) in material.uniforms() {
            let loc = program.location(gl, &uniform_name(name));
            let loc = loc.as_ref();
            match value {
                UniformValue::Float(v) => gl.uniform1f(loc, to_f32(v)),
                UniformValue::Vec2([x, y]) => gl.uniform2f(loc, to_f32(x), to_f32(y)),
                UniformValue::Vec3([x, y, z]) => gl.uniform3f(loc, to_f32(x), to_f32(y), to_f32(z)),
                UniformValue::Texture(handle) => {
                    let texture = handle.and_then(|h| self.textures.get(h.id));
                    gl.active_texture(Gl::TEXTURE0);
                    gl.bind_texture(Gl::TEXTURE_2D, texture.as_ref());
                    gl.uniform1i(loc, 0);
                }
            }
        }
        true
    }
}

impl Renderer for WebGlRenderer {
    fn render(&mut self, scene: &mut Scene, camera: &Camera) {
        if self.disposed {
            return;
        }
        let disposed = scene.drain_disposed();
        self.release(disposed);

        self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        self.gl.clear(Gl::COLOR_BUFFER_BIT | Gl::DEPTH_BUFFER_BIT);
        self.gl.enable(Gl::BLEND);
        self.gl.blend_func(Gl::SRC_ALPHA, Gl::ONE_MINUS_SRC_ALPHA);

        for node in scene.render_list() {
            let Some(geometry) = scene
                .mesh_geometry(node)
                .filter(|&g| scene.has_geometry(g))
            else {
                continue;
            };
            if self.upload(scene, geometry).is_none() {
                continue;
            }
            let model = scene.world_matrix(node).to_f32_array();
            for &material in scene.mesh_materials(node) {
                if !self.bind_material(scene.material(material), camera, &model) {
                    continue;
                }
                if let Some(gpu) = self.geometries.get(&geometry) {
                    self.gl.bind_vertex_array(Some(&gpu.vao));
                    self.gl
                        .draw_elements_with_i32(Gl::TRIANGLES, gpu.index_count, Gl::UNSIGNED_INT, 0);
                }
            }
        }
        self.gl.bind_vertex_array(None);
    }

    fn set_size(&mut self, width: f64, height: f64) {
        let (w, h) = backing_size(width, height, self.pixel_ratio);
        self.canvas.set_width(w);
        self.canvas.set_height(h);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{width}px"));
        let _ = style.set_property("height", &format!("{height}px"));
        self.gl.viewport(
            0,
            0,
            i32::try_from(w).unwrap_or(i32::MAX),
            i32::try_from(h).unwrap_or(i32::MAX),
        );
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for gpu in core::mem::take(&mut self.geometries).values() {
            delete_geometry(&self.gl, gpu);
        }
        for program in core::mem::take(&mut self.programs).values() {
            self.gl.delete_program(Some(&program.program));
        }
        self.textures.clear();
        self.canvas.remove();
    }
}

fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, InitError> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| InitError::Shader("create_shader returned null".to_string()))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(InitError::Shader(log))
    }
}

fn array_buffer(gl: &Gl, location: u32, components: i32, data: &[u8]) -> Option<WebGlBuffer> {
    let buffer = gl.create_buffer()?;
    gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
    gl.buffer_data_with_u8_array(Gl::ARRAY_BUFFER, data, Gl::DYNAMIC_DRAW);
    gl.enable_vertex_attrib_array(location);
    gl.vertex_attrib_pointer_with_i32(location, components, Gl::FLOAT, false, 0, 0);
    Some(buffer)
}

fn delete_geometry(gl: &Gl, gpu: &GpuGeometry) {
    gl.delete_vertex_array(Some(&gpu.vao));
    gl.delete_buffer(Some(&gpu.positions));
    gl.delete_buffer(Some(&gpu.uvs));
    gl.delete_buffer(Some(&gpu.indices));
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "GPU uniforms are single precision"
)]
fn to_f32(v: f64) -> f32 {
    v as f32
}

/// Shader-side name of a material uniform.
pub(crate) fn uniform_name(name: &str) -> String {
    format!("u_{name}")
}

/// Clamps a device pixel ratio to `1..=MAX_PIXEL_RATIO`.
pub(crate) fn clamp_pixel_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(1.0, MAX_PIXEL_RATIO)
    } else {
        1.0
    }
}

/// Backing-store size for a CSS-pixel size at `ratio`, at least 1×1.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "canvas sizes are small non-negative integers"
)]
pub(crate) fn backing_size(width: f64, height: f64, ratio: f64) -> (u32, u32) {
    let px = |css: f64| (css.max(0.0) * ratio) as u32;
    (px(width).max(1), px(height).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_are_prefixed() {
        assert_eq!(uniform_name("hoverOffset"), "u_hoverOffset");
        assert_eq!(uniform_name("texture"), "u_texture");
    }

    #[test]
    fn pixel_ratio_is_clamped() {
        assert_eq!(clamp_pixel_ratio(3.0), MAX_PIXEL_RATIO);
        assert_eq!(clamp_pixel_ratio(0.5), 1.0);
        assert_eq!(clamp_pixel_ratio(f64::NAN), 1.0);
        assert_eq!(clamp_pixel_ratio(1.5), 1.5);
    }

    #[test]
    fn backing_store_scales_and_never_collapses() {
        assert_eq!(backing_size(800.0, 600.0, 2.0), (1600, 1200));
        assert_eq!(backing_size(0.0, -5.0, 2.0), (1, 1));
        assert_eq!(backing_size(100.4, 50.6, 1.0), (100, 50));
    }

    #[test]
    fn init_errors_describe_themselves() {
        assert_eq!(
            InitError::NoContainer("#gl".into()).to_string(),
            "no container matches \"#gl\""
        );
        assert_eq!(InitError::ContextUnavailable.to_string(), "WebGL2 is unavailable");
    }
}
