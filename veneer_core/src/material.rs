// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shader materials and the shared uniform vocabulary.
//!
//! A [`Material`] names a shader program and carries a bag of uniform
//! values. Every surface material defines at least [`uniforms::OPACITY`] and
//! [`uniforms::TEXTURE`]; the rest of the vocabulary is optional.
//!
//! Uniform values are plain data, so `Material::clone` is a deep copy: a
//! cloned material can be animated without affecting the original.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString as _};

use crate::texture::TextureHandle;

/// Well-known uniform names.
pub mod uniforms {
    /// Seconds of accumulated surface time.
    pub const TIME: &str = "time";
    /// The surface image.
    pub const TEXTURE: &str = "texture";
    /// Overall opacity, `0..1`.
    pub const OPACITY: &str = "opacity";
    /// Hover displacement (`vec2`).
    pub const HOVER_OFFSET: &str = "hoverOffset";
    /// Normalized pointer velocity (`vec2`, length ≤ 1).
    pub const POINTER_VELOCITY: &str = "pointerVelocity";
    /// Hover intensity, `0..1`.
    pub const HOVER: &str = "hover";
    /// Scroll reveal progress, `0..1`.
    pub const REVEAL: &str = "reveal";
    /// Cross-page transition progress, `0..1`.
    pub const PAGE_TRANSITION_PROGRESS: &str = "pageTransitionProgress";
}

/// Program name of the built-in DOM surface shader.
pub const SURFACE_PROGRAM: &str = "surface";

/// One uniform value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    /// A scalar.
    Float(f64),
    /// A two-component vector.
    Vec2([f64; 2]),
    /// A three-component vector.
    Vec3([f64; 3]),
    /// A sampler, possibly unbound.
    Texture(Option<TextureHandle>),
}

/// A shader program plus its uniform values.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    program: String,
    uniforms: BTreeMap<String, UniformValue>,
    /// Whether the material blends with what is behind it.
    pub transparent: bool,
}

impl Material {
    /// Creates a material for `program` with no uniforms.
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            uniforms: BTreeMap::new(),
            transparent: true,
        }
    }

    /// Creates a surface material seeded with the full uniform vocabulary at
    /// its settled values.
    #[must_use]
    pub fn surface(texture: Option<TextureHandle>) -> Self {
        let mut m = Self::new(SURFACE_PROGRAM);
        m.set(uniforms::TIME, UniformValue::Float(0.0));
        m.set(uniforms::TEXTURE, UniformValue::Texture(texture));
        m.set(uniforms::OPACITY, UniformValue::Float(1.0));
        m.set(uniforms::HOVER_OFFSET, UniformValue::Vec2([0.0, 0.0]));
        m.set(uniforms::POINTER_VELOCITY, UniformValue::Vec2([0.0, 0.0]));
        m.set(uniforms::HOVER, UniformValue::Float(0.0));
        m.set(uniforms::REVEAL, UniformValue::Float(1.0));
        m.set(uniforms::PAGE_TRANSITION_PROGRESS, UniformValue::Float(0.0));
        m
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns a uniform.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    /// Sets (or adds) a uniform.
    pub fn set(&mut self, name: &str, value: UniformValue) {
        if let Some(slot) = self.uniforms.get_mut(name) {
            *slot = value;
        } else {
            self.uniforms.insert(name.to_string(), value);
        }
    }

    /// Returns a scalar uniform, if present and scalar.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.uniforms.get(name) {
            Some(UniformValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Sets a scalar uniform.
    pub fn set_float(&mut self, name: &str, v: f64) {
        self.set(name, UniformValue::Float(v));
    }

    /// Returns a `vec2` uniform, if present and a `vec2`.
    #[must_use]
    pub fn vec2(&self, name: &str) -> Option<[f64; 2]> {
        match self.uniforms.get(name) {
            Some(UniformValue::Vec2(v)) => Some(*v),
            _ => None,
        }
    }

    /// Sets a `vec2` uniform.
    pub fn set_vec2(&mut self, name: &str, v: [f64; 2]) {
        self.set(name, UniformValue::Vec2(v));
    }

    /// The bound [`uniforms::TEXTURE`], if any.
    #[must_use]
    pub fn texture(&self) -> Option<TextureHandle> {
        match self.uniforms.get(uniforms::TEXTURE) {
            Some(UniformValue::Texture(t)) => *t,
            _ => None,
        }
    }

    /// Iterates over all uniforms in name order.
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns `true` if the material satisfies the surface minimum
    /// (`opacity` and `texture` present).
    #[must_use]
    pub fn has_surface_minimum(&self) -> bool {
        self.uniforms.contains_key(uniforms::OPACITY) && self.uniforms.contains_key(uniforms::TEXTURE)
    }
}
