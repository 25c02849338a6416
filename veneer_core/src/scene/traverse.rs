// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec;
use alloc::vec::Vec;

use super::id::{INVALID, NodeId};
use super::store::Scene;

/// An iterator over the direct children of a node.
///
/// Created by [`Scene::children`].
#[derive(Debug)]
pub struct Children<'a> {
    scene: &'a Scene,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(scene: &'a Scene, first: u32) -> Self {
        Self {
            scene,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.scene.next_sibling[idx as usize];
        Some(self.scene.handle(idx))
    }
}

/// A pre-order iterator over a node and all of its descendants.
///
/// Created by [`Scene::descendants`].
#[derive(Debug)]
pub struct Descendants<'a> {
    scene: &'a Scene,
    stack: Vec<u32>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(scene: &'a Scene, root: u32) -> Self {
        Self {
            scene,
            stack: vec![root],
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let idx = self.stack.pop()?;
        // Push children in reverse so the first child is visited first.
        let first = self.stack.len();
        let mut child = self.scene.first_child[idx as usize];
        while child != INVALID {
            self.stack.push(child);
            child = self.scene.next_sibling[child as usize];
        }
        self.stack[first..].reverse();
        Some(self.scene.handle(idx))
    }
}
