// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Image decoding and texture upload.
//!
//! [`ImageTextureSource`] decodes each URL through an `HtmlImageElement`
//! (with `crossOrigin = "anonymous"`, so cross-origin images stay
//! uploadable) and uploads the decoded image once. The resulting textures
//! live in a registry shared with the [`WebGlRenderer`](crate::WebGlRenderer).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use veneer_core::texture::{LoadCompletion, LoadError, TextureHandle, TextureId, TextureSource};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use web_sys::{HtmlImageElement, WebGl2RenderingContext as Gl, WebGlTexture};

/// GPU textures by id.
pub(crate) struct GlTextures {
    gl: Gl,
    textures: RefCell<BTreeMap<TextureId, WebGlTexture>>,
    next_id: Cell<u32>,
}

impl GlTextures {
    pub(crate) fn new(gl: Gl) -> Self {
        Self {
            gl,
            textures: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        }
    }

    pub(crate) fn get(&self, id: TextureId) -> Option<WebGlTexture> {
        self.textures.borrow().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.textures.borrow().len()
    }

    fn upload(&self, image: &HtmlImageElement) -> Result<TextureHandle, String> {
        let gl = &self.gl;
        let texture = gl
            .create_texture()
            .ok_or_else(|| "create_texture returned null".to_string())?;
        gl.bind_texture(Gl::TEXTURE_2D, Some(&texture));
        // Plane UVs put v = 1 on the top edge.
        gl.pixel_storei(Gl::UNPACK_FLIP_Y_WEBGL, 1);
        let uploaded = gl.tex_image_2d_with_u32_and_u32_and_html_image_element(
            Gl::TEXTURE_2D,
            0,
            Gl::RGBA as i32,
            Gl::RGBA,
            Gl::UNSIGNED_BYTE,
            image,
        );
        if let Err(e) = uploaded {
            gl.bind_texture(Gl::TEXTURE_2D, None);
            gl.delete_texture(Some(&texture));
            return Err(format!("texImage2D failed: {e:?}"));
        }
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, Gl::LINEAR as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, Gl::LINEAR as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, Gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, Gl::CLAMP_TO_EDGE as i32);
        gl.bind_texture(Gl::TEXTURE_2D, None);

        let id = TextureId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.textures.borrow_mut().insert(id, texture);
        Ok(TextureHandle {
            id,
            width: image.natural_width(),
            height: image.natural_height(),
        })
    }

    fn release(&self, id: TextureId) {
        if let Some(texture) = self.textures.borrow_mut().remove(&id) {
            self.gl.delete_texture(Some(&texture));
        }
    }

    /// Deletes every texture.
    pub(crate) fn clear(&self) {
        let textures = core::mem::take(&mut *self.textures.borrow_mut());
        for texture in textures.values() {
            self.gl.delete_texture(Some(texture));
        }
    }
}

type ImageCallback = Closure<dyn FnMut()>;

struct PendingImage {
    url: String,
    image: HtmlImageElement,
    completion: Option<LoadCompletion>,
    // Kept alive until the image settles.
    _onload: ImageCallback,
    _onerror: ImageCallback,
}

#[derive(Default)]
struct SourceState {
    pending: BTreeMap<u32, PendingImage>,
    // Callbacks that already fired. A closure cannot be freed while it runs,
    // so settled entries are dropped on the next fetch.
    retired: Vec<PendingImage>,
    next_load: u32,
}

struct SourceInner {
    textures: Rc<GlTextures>,
    state: RefCell<SourceState>,
}

/// [`TextureSource`] that decodes through `HtmlImageElement`.
pub struct ImageTextureSource {
    inner: Rc<SourceInner>,
}

impl core::fmt::Debug for ImageTextureSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ImageTextureSource")
            .field("pending", &state.pending.len())
            .field("resident", &self.inner.textures.len())
            .finish_non_exhaustive()
    }
}

impl ImageTextureSource {
    pub(crate) fn new(textures: Rc<GlTextures>) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                textures,
                state: RefCell::new(SourceState::default()),
            }),
        }
    }

    /// Number of images still decoding.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }
}

impl SourceInner {
    fn settle(&self, load: u32, decoded: bool) {
        let Some(mut entry) = self.state.borrow_mut().pending.remove(&load) else {
            return;
        };
        entry.image.set_onload(None);
        entry.image.set_onerror(None);
        if let Some(completion) = entry.completion.take() {
            if decoded {
                match self.textures.upload(&entry.image) {
                    Ok(handle) => completion.resolve(handle),
                    Err(msg) => completion.reject(LoadError::Decode(msg)),
                }
            } else {
                completion.reject(LoadError::Network(format!("could not load {}", entry.url)));
            }
        }
        self.state.borrow_mut().retired.push(entry);
    }
}

fn image_callback(inner: &Rc<SourceInner>, load: u32, decoded: bool) -> ImageCallback {
    let weak: Weak<SourceInner> = Rc::downgrade(inner);
    Closure::wrap(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            inner.settle(load, decoded);
        }
    }) as Box<dyn FnMut()>)
}

impl TextureSource for ImageTextureSource {
    fn fetch(&self, url: &str, completion: LoadCompletion) {
        self.inner.state.borrow_mut().retired.clear();

        let Ok(image) = HtmlImageElement::new() else {
            completion.reject(LoadError::Network("could not create an image element".to_string()));
            return;
        };
        image.set_cross_origin(Some("anonymous"));

        let load = {
            let mut state = self.inner.state.borrow_mut();
            let load = state.next_load;
            state.next_load = state.next_load.wrapping_add(1);
            load
        };
        let onload = image_callback(&self.inner, load, true);
        let onerror = image_callback(&self.inner, load, false);
        image.set_onload(Some(onload.as_ref().unchecked_ref()));
        image.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        self.inner.state.borrow_mut().pending.insert(
            load,
            PendingImage {
                url: url.to_string(),
                image: image.clone(),
                completion: Some(completion),
                _onload: onload,
                _onerror: onerror,
            },
        );
        image.set_src(url);
    }

    fn release(&self, texture: TextureId) {
        self.inner.textures.release(texture);
    }
}
