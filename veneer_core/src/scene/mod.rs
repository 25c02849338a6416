// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene graph: node tree, geometries and materials.
//!
//! Every page owns one group under [`Scene::root`]; surface quads and the
//! transition clone are mesh nodes underneath. Geometries and materials are
//! stored beside the tree and referenced by handle, so a transition clone
//! can share its source's geometry while owning a deep copy of its
//! material.

mod id;
mod slab;
mod store;
mod transform;
mod traverse;

pub use id::{GeometryId, MaterialId, NodeId};
pub use store::{Disposed, NodeKind, Scene};
pub use transform::Transform3d;
pub use traverse::{Children, Descendants};
