// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays scene storage with node topology and resource slabs.

use alloc::vec;
use alloc::vec::Vec;

use crate::geometry::PlaneGeometry;
use crate::material::Material;

use super::id::{GeometryId, INVALID, MaterialId, NodeId};
use super::slab::Slab;
use super::transform::Transform3d;
use super::traverse::{Children, Descendants};

/// What a node draws.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A grouping node with no content of its own.
    Group,
    /// A drawable mesh. With more than one material the geometry is drawn
    /// once per material, in order.
    Mesh {
        /// Shared or owned geometry.
        geometry: GeometryId,
        /// One or more materials.
        materials: Vec<MaterialId>,
    },
}

/// A resource that was disposed since the last
/// [`drain_disposed`](Scene::drain_disposed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposed {
    /// A geometry's GPU buffers can be freed.
    Geometry(GeometryId),
    /// A material's GPU state can be freed.
    Material(MaterialId),
}

/// The scene graph: a node tree plus the geometries and materials its meshes
/// reference.
///
/// Nodes are addressed by [`NodeId`] handles. Internally, each node occupies
/// a slot in parallel arrays. Destroyed nodes are recycled via a free list,
/// and generation counters make stale handle access panic.
///
/// Geometries and materials live in their own generational slabs. Disposal
/// is explicit: [`dispose_geometry`](Self::dispose_geometry) and
/// [`dispose_material`](Self::dispose_material) return `false` for a
/// resource that is already gone, so double disposal is observable.
#[derive(Debug)]
pub struct Scene {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Local properties --
    position: Vec<[f64; 3]>,
    rotation: Vec<[f64; 3]>,
    scale: Vec<[f64; 3]>,
    visible: Vec<bool>,
    kind: Vec<NodeKind>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    len: u32,
    root: u32,

    // -- Resources --
    geometries: Slab<GeometryId, PlaneGeometry>,
    materials: Slab<MaterialId, Material>,
    disposed: Vec<Disposed>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates a scene containing only its root group.
    #[must_use]
    pub fn new() -> Self {
        let mut scene = Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            position: Vec::new(),
            rotation: Vec::new(),
            scale: Vec::new(),
            visible: Vec::new(),
            kind: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            root: 0,
            geometries: Slab::new(),
            materials: Slab::new(),
            disposed: Vec::new(),
        };
        scene.root = scene.allocate(NodeKind::Group).idx;
        scene
    }

    /// The root group. It cannot be destroyed.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.handle(self.root)
    }

    // -- Allocation API --

    /// Creates a detached, visible group node.
    pub fn create_group(&mut self) -> NodeId {
        self.allocate(NodeKind::Group)
    }

    /// Creates a detached, visible mesh node.
    ///
    /// # Panics
    ///
    /// Panics if either resource handle is stale.
    pub fn create_mesh(&mut self, geometry: GeometryId, material: MaterialId) -> NodeId {
        self.create_multi_mesh(geometry, vec![material])
    }

    /// Creates a mesh that draws `geometry` once per material.
    ///
    /// # Panics
    ///
    /// Panics if any resource handle is stale or `materials` is empty.
    pub fn create_multi_mesh(&mut self, geometry: GeometryId, materials: Vec<MaterialId>) -> NodeId {
        assert!(!materials.is_empty(), "mesh needs at least one material");
        let _ = self.geometries.get(geometry);
        for m in &materials {
            let _ = self.materials.get(*m);
        }
        self.allocate(NodeKind::Mesh {
            geometry,
            materials,
        })
    }

    /// Destroys a node, freeing its slot for reuse. Resources the node
    /// referenced are untouched.
    ///
    /// # Panics
    ///
    /// Panics if the node has children (destroy them first, or use
    /// [`destroy_subtree`](Self::destroy_subtree)), is the root, or the
    /// handle is stale.
    pub fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let idx = id.idx;
        assert!(idx != self.root, "cannot destroy the scene root");
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy node with children"
        );
        if self.parent[idx as usize] != INVALID {
            self.unlink_from_parent(idx);
        }
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;
        self.kind[idx as usize] = NodeKind::Group;
        self.free_list.push(idx);
    }

    /// Detaches `id` and destroys it together with every descendant.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or is the root.
    pub fn destroy_subtree(&mut self, id: NodeId) {
        let order: Vec<NodeId> = self.descendants(id).collect();
        for node in order.into_iter().rev() {
            self.destroy_node(node);
        }
    }

    /// Returns whether the handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len && self.alive[id.idx as usize] && self.generation[id.idx as usize] == id.generation
    }

    /// Number of live nodes, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(self.parent[c as usize] == INVALID, "child already has a parent");
        assert!(c != self.root, "the scene root cannot be a child");

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the node has no parent.
    pub fn remove_from_parent(&mut self, child: NodeId) {
        self.validate(child);
        assert!(self.parent[child.idx as usize] != INVALID, "node has no parent");
        self.unlink_from_parent(child.idx);
    }

    /// Removes `child` from its parent if it has one. Returns whether it did.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn detach(&mut self, child: NodeId) -> bool {
        self.validate(child);
        if self.parent[child.idx as usize] == INVALID {
            return false;
        }
        self.unlink_from_parent(child.idx);
        true
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.handle(p))
    }

    /// Returns an iterator over the direct children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns a pre-order iterator over `id` and its descendants.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        self.validate(id);
        Descendants::new(self, id.idx)
    }

    // -- Property API --

    /// Local position.
    #[must_use]
    pub fn position(&self, id: NodeId) -> [f64; 3] {
        self.validate(id);
        self.position[id.idx as usize]
    }

    /// Sets the local position.
    pub fn set_position(&mut self, id: NodeId, position: [f64; 3]) {
        self.validate(id);
        self.position[id.idx as usize] = position;
    }

    /// Local Euler rotation in radians.
    #[must_use]
    pub fn rotation(&self, id: NodeId) -> [f64; 3] {
        self.validate(id);
        self.rotation[id.idx as usize]
    }

    /// Sets the local Euler rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, rotation: [f64; 3]) {
        self.validate(id);
        self.rotation[id.idx as usize] = rotation;
    }

    /// Local scale.
    #[must_use]
    pub fn scale(&self, id: NodeId) -> [f64; 3] {
        self.validate(id);
        self.scale[id.idx as usize]
    }

    /// Sets the local scale.
    pub fn set_scale(&mut self, id: NodeId, scale: [f64; 3]) {
        self.validate(id);
        self.scale[id.idx as usize] = scale;
    }

    /// The node's own visibility flag.
    #[must_use]
    pub fn visible(&self, id: NodeId) -> bool {
        self.validate(id);
        self.visible[id.idx as usize]
    }

    /// Sets the node's own visibility flag.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.validate(id);
        self.visible[id.idx as usize] = visible;
    }

    /// Returns `true` if the node and every ancestor are visible and the
    /// node is connected to the root.
    #[must_use]
    pub fn is_rendered(&self, id: NodeId) -> bool {
        self.validate(id);
        let mut idx = id.idx;
        loop {
            if !self.visible[idx as usize] {
                return false;
            }
            if idx == self.root {
                return true;
            }
            idx = self.parent[idx as usize];
            if idx == INVALID {
                return false;
            }
        }
    }

    /// What the node draws.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        self.validate(id);
        &self.kind[id.idx as usize]
    }

    /// The geometry of a mesh node.
    #[must_use]
    pub fn mesh_geometry(&self, id: NodeId) -> Option<GeometryId> {
        match self.kind(id) {
            NodeKind::Mesh { geometry, .. } => Some(*geometry),
            NodeKind::Group => None,
        }
    }

    /// The first material of a mesh node.
    #[must_use]
    pub fn mesh_material(&self, id: NodeId) -> Option<MaterialId> {
        self.mesh_materials(id).first().copied()
    }

    /// All materials of a mesh node (empty for groups).
    #[must_use]
    pub fn mesh_materials(&self, id: NodeId) -> &[MaterialId] {
        match self.kind(id) {
            NodeKind::Mesh { materials, .. } => materials.as_slice(),
            NodeKind::Group => &[],
        }
    }

    /// Points a mesh at a different geometry.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a mesh or either handle is stale.
    pub fn set_mesh_geometry(&mut self, id: NodeId, new_geometry: GeometryId) {
        self.validate(id);
        let _ = self.geometries.get(new_geometry);
        match &mut self.kind[id.idx as usize] {
            NodeKind::Mesh { geometry, .. } => *geometry = new_geometry,
            NodeKind::Group => panic!("set_mesh_geometry on a group: {id:?}"),
        }
    }

    /// Local model matrix (translation · rotation · scale).
    #[must_use]
    pub fn local_matrix(&self, id: NodeId) -> Transform3d {
        self.validate(id);
        let i = id.idx as usize;
        Transform3d::from_trs(self.position[i], self.rotation[i], self.scale[i])
    }

    /// Model matrix composed with every ancestor's.
    #[must_use]
    pub fn world_matrix(&self, id: NodeId) -> Transform3d {
        let mut m = self.local_matrix(id);
        let mut p = self.parent[id.idx as usize];
        while p != INVALID {
            let i = p as usize;
            m = Transform3d::from_trs(self.position[i], self.rotation[i], self.scale[i]) * m;
            p = self.parent[i];
        }
        m
    }

    /// Meshes that would be drawn this frame, in pre-order from the root.
    #[must_use]
    pub fn render_list(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if !self.visible[idx as usize] {
                continue;
            }
            if matches!(self.kind[idx as usize], NodeKind::Mesh { .. }) {
                out.push(self.handle(idx));
            }
            let first = stack.len();
            let mut child = self.first_child[idx as usize];
            while child != INVALID {
                stack.push(child);
                child = self.next_sibling[child as usize];
            }
            stack[first..].reverse();
        }
        out
    }

    // -- Resource API --

    /// Stores a geometry.
    pub fn add_geometry(&mut self, geometry: PlaneGeometry) -> GeometryId {
        self.geometries.insert(geometry)
    }

    /// Returns a geometry.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn geometry(&self, id: GeometryId) -> &PlaneGeometry {
        self.geometries.get(id)
    }

    /// Returns a geometry mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn geometry_mut(&mut self, id: GeometryId) -> &mut PlaneGeometry {
        self.geometries.get_mut(id)
    }

    /// Returns whether the geometry is still live.
    #[must_use]
    pub fn has_geometry(&self, id: GeometryId) -> bool {
        self.geometries.contains(id)
    }

    /// Disposes a geometry. Returns `false` if it was already disposed.
    pub fn dispose_geometry(&mut self, id: GeometryId) -> bool {
        let removed = self.geometries.remove(id).is_some();
        if removed {
            self.disposed.push(Disposed::Geometry(id));
        }
        removed
    }

    /// Number of live geometries.
    #[must_use]
    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Iterates over live geometries.
    pub fn geometries(&self) -> impl Iterator<Item = (GeometryId, &PlaneGeometry)> {
        self.geometries.iter()
    }

    /// Stores a material.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Returns a material.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn material(&self, id: MaterialId) -> &Material {
        self.materials.get(id)
    }

    /// Returns a material mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn material_mut(&mut self, id: MaterialId) -> &mut Material {
        self.materials.get_mut(id)
    }

    /// Returns whether the material is still live.
    #[must_use]
    pub fn has_material(&self, id: MaterialId) -> bool {
        self.materials.contains(id)
    }

    /// Disposes a material. Returns `false` if it was already disposed.
    pub fn dispose_material(&mut self, id: MaterialId) -> bool {
        let removed = self.materials.remove(id).is_some();
        if removed {
            self.disposed.push(Disposed::Material(id));
        }
        removed
    }

    /// Number of live materials.
    #[must_use]
    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    /// Returns and clears the list of resources disposed since the last
    /// call. GPU backends use it to free buffers and programs.
    pub fn drain_disposed(&mut self) -> Vec<Disposed> {
        core::mem::take(&mut self.disposed)
    }

    // -- Internal helpers --

    pub(crate) fn handle(&self, idx: u32) -> NodeId {
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.position[i] = [0.0; 3];
            self.rotation[i] = [0.0; 3];
            self.scale[i] = [1.0; 3];
            self.visible[i] = true;
            self.kind[i] = kind;
            self.alive[i] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.position.push([0.0; 3]);
            self.rotation.push([0.0; 3]);
            self.scale.push([1.0; 3]);
            self.visible.push(true);
            self.kind.push(kind);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };
        self.handle(idx)
    }

    /// Panics if the handle is stale.
    fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(scene: &mut Scene) -> NodeId {
        let g = scene.add_geometry(PlaneGeometry::new(1.0, 1.0, 1, 1));
        let m = scene.add_material(Material::surface(None));
        scene.create_mesh(g, m)
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create_group();
        let b = scene.create_group();
        let c = scene.create_group();
        scene.add_child(root, a);
        scene.add_child(root, b);
        scene.add_child(root, c);
        let kids: Vec<_> = scene.children(root).collect();
        assert_eq!(kids, vec![a, b, c]);

        scene.remove_from_parent(b);
        let kids: Vec<_> = scene.children(root).collect();
        assert_eq!(kids, vec![a, c]);
        assert_eq!(scene.parent(b), None);
    }

    #[test]
    fn destroyed_slot_is_reused_and_old_handle_is_stale() {
        let mut scene = Scene::new();
        let a = scene.create_group();
        scene.destroy_node(a);
        assert!(!scene.is_alive(a));
        let b = scene.create_group();
        assert_eq!(a.index(), b.index());
        assert!(scene.is_alive(b) && !scene.is_alive(a));
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn stale_handle_panics() {
        let mut scene = Scene::new();
        let a = scene.create_group();
        scene.destroy_node(a);
        let _ = scene.position(a);
    }

    #[test]
    #[should_panic(expected = "cannot destroy node with children")]
    fn destroy_with_children_panics() {
        let mut scene = Scene::new();
        let a = scene.create_group();
        let b = scene.create_group();
        scene.add_child(a, b);
        scene.destroy_node(a);
    }

    #[test]
    fn destroy_subtree_removes_every_descendant() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create_group();
        scene.add_child(root, group);
        let m1 = mesh(&mut scene);
        let m2 = mesh(&mut scene);
        scene.add_child(group, m1);
        scene.add_child(group, m2);
        assert_eq!(scene.node_count(), 4);

        scene.destroy_subtree(group);
        assert_eq!(scene.node_count(), 1, "only the root remains");
        assert!(!scene.is_alive(m1) && !scene.is_alive(m2));
        assert_eq!(scene.children(root).count(), 0);
        // Resources are not owned by nodes.
        assert_eq!(scene.live_geometries(), 2);
    }

    #[test]
    fn render_list_skips_hidden_subtrees_and_detached_nodes() {
        let mut scene = Scene::new();
        let root = scene.root();
        let shown = scene.create_group();
        let hidden = scene.create_group();
        scene.add_child(root, shown);
        scene.add_child(root, hidden);
        scene.set_visible(hidden, false);

        let a = mesh(&mut scene);
        let b = mesh(&mut scene);
        let c = mesh(&mut scene);
        let detached = mesh(&mut scene);
        scene.add_child(shown, a);
        scene.add_child(shown, b);
        scene.add_child(hidden, c);

        assert_eq!(scene.render_list(), vec![a, b]);
        assert!(scene.is_rendered(a));
        assert!(!scene.is_rendered(c), "hidden ancestor");
        assert!(!scene.is_rendered(detached), "not connected to root");
    }

    #[test]
    fn disposal_is_counted_once_and_drained() {
        let mut scene = Scene::new();
        let g = scene.add_geometry(PlaneGeometry::new(1.0, 1.0, 1, 1));
        let m = scene.add_material(Material::surface(None));
        assert!(scene.dispose_geometry(g));
        assert!(!scene.dispose_geometry(g), "second dispose is a no-op");
        assert!(scene.dispose_material(m));
        assert_eq!(scene.live_geometries(), 0);
        assert_eq!(scene.live_materials(), 0);
        assert_eq!(
            scene.drain_disposed(),
            vec![Disposed::Geometry(g), Disposed::Material(m)]
        );
        assert!(scene.drain_disposed().is_empty());
    }

    #[test]
    fn world_matrix_composes_parent_translation() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create_group();
        scene.add_child(root, group);
        scene.set_position(group, [1.0, 2.0, 0.0]);
        let m = mesh(&mut scene);
        scene.add_child(group, m);
        scene.set_position(m, [0.5, 0.0, 0.0]);
        let p = scene.world_matrix(m).transform_point([0.0, 0.0, 0.0]);
        assert_eq!([p[0], p[1], p[2]], [1.5, 2.0, 0.0]);
    }

    #[test]
    fn multi_material_mesh_lists_all_materials() {
        let mut scene = Scene::new();
        let g = scene.add_geometry(PlaneGeometry::new(1.0, 1.0, 1, 1));
        let a = scene.add_material(Material::surface(None));
        let b = scene.add_material(Material::new("outline"));
        let node = scene.create_multi_mesh(g, vec![a, b]);
        assert_eq!(scene.mesh_materials(node), &[a, b]);
        assert_eq!(scene.mesh_material(node), Some(a));
        assert_eq!(scene.mesh_geometry(node), Some(g));
    }
}
