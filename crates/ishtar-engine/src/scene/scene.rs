use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::{Light, Renderable, RenderableRef};

/// Flat scene: renderables in insertion order, lights, and a uid lookup table.
///
/// Uids start at 1 and only grow; a removed uid is never reused.
pub struct Scene {
    renderables: Vec<RenderableRef>,
    lights: Vec<Light>,
    by_uid: HashMap<u32, Weak<RefCell<Renderable>>>,
    next_uid: u32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            renderables: Vec::new(),
            lights: Vec::new(),
            by_uid: HashMap::new(),
            next_uid: 1,
        }
    }

    /// Adds a renderable under a fresh uid. Any uid the caller set is replaced.
    pub fn add_renderable(&mut self, mut renderable: Renderable) -> RenderableRef {
        renderable.uid = self.allocate_uid();
        let uid = renderable.uid;
        let handle = Rc::new(RefCell::new(renderable));
        self.by_uid.insert(uid, Rc::downgrade(&handle));
        self.renderables.push(Rc::clone(&handle));
        log::debug!("scene: added renderable {uid}");
        handle
    }

    /// Removes the renderable with `uid`; returns it if it was present.
    pub fn remove_renderable(&mut self, uid: u32) -> Option<RenderableRef> {
        self.by_uid.remove(&uid)?;
        let idx = self
            .renderables
            .iter()
            .position(|r| r.borrow().uid == uid)?;
        Some(self.renderables.remove(idx))
    }

    /// Looks up a live renderable. Uid 0 never matches.
    pub fn renderable_by_uid(&self, uid: u32) -> Option<RenderableRef> {
        if uid == 0 {
            return None;
        }
        self.by_uid.get(&uid).and_then(Weak::upgrade)
    }

    pub fn renderables(&self) -> &[RenderableRef] {
        &self.renderables
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut Vec<Light> {
        &mut self.lights
    }

    /// Drops every renderable and light. Uids keep counting up.
    pub fn clear(&mut self) {
        self.renderables.clear();
        self.lights.clear();
        self.by_uid.clear();
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    fn allocate_uid(&mut self) -> u32 {
        while self.by_uid.contains_key(&self.next_uid) || self.next_uid == 0 {
            self.next_uid = self.next_uid.wrapping_add(1);
        }
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1);
        uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(name: &str) -> Renderable {
        Renderable::new(name, None)
    }

    // ── uids ──────────────────────────────────────────────────────────────

    #[test]
    fn uids_start_at_one_and_increase() {
        let mut scene = Scene::new();
        let a = scene.add_renderable(empty("a")).borrow().uid;
        let b = scene.add_renderable(empty("b")).borrow().uid;
        let c = scene.add_renderable(empty("c")).borrow().uid;
        assert_eq!(a, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn uid_zero_is_never_found() {
        let mut scene = Scene::new();
        scene.add_renderable(empty("a"));
        assert!(scene.renderable_by_uid(0).is_none());
    }

    #[test]
    fn caller_uid_is_replaced() {
        let mut scene = Scene::new();
        let mut r = empty("fixed");
        r.uid = 7;
        let uid = scene.add_renderable(r).borrow().uid;
        assert_eq!(uid, 1);
        assert!(scene.renderable_by_uid(7).is_none());
    }

    #[test]
    fn duplicate_uid_gets_reassigned() {
        let mut scene = Scene::new();
        let first = scene.add_renderable(empty("a")).borrow().uid;
        let mut dup = empty("b");
        dup.uid = first;
        let second = scene.add_renderable(dup).borrow().uid;
        assert_ne!(first, second);
    }

    #[test]
    fn removed_uid_preset_on_a_new_renderable_is_not_reused() {
        let mut scene = Scene::new();
        let a = scene.add_renderable(empty("a")).borrow().uid;
        let b = scene.add_renderable(empty("b")).borrow().uid;
        scene.remove_renderable(a);
        let mut c = empty("c");
        c.uid = a;
        let c = scene.add_renderable(c).borrow().uid;
        assert_ne!(c, a);
        assert!(c > b);
    }

    // ── lookup / removal ──────────────────────────────────────────────────

    #[test]
    fn lookup_returns_same_handle() {
        let mut scene = Scene::new();
        let h = scene.add_renderable(empty("a"));
        let uid = h.borrow().uid;
        let found = scene.renderable_by_uid(uid).unwrap();
        assert!(Rc::ptr_eq(&h, &found));
    }

    #[test]
    fn remove_cleans_list_and_table() {
        let mut scene = Scene::new();
        let uid = scene.add_renderable(empty("a")).borrow().uid;
        scene.add_renderable(empty("b"));
        assert!(scene.remove_renderable(uid).is_some());
        assert!(scene.renderable_by_uid(uid).is_none());
        assert_eq!(scene.len(), 1);
        assert!(scene.remove_renderable(uid).is_none());
    }

    #[test]
    fn removed_uid_is_not_reused() {
        let mut scene = Scene::new();
        let uid = scene.add_renderable(empty("a")).borrow().uid;
        scene.remove_renderable(uid);
        let next = scene.add_renderable(empty("b")).borrow().uid;
        assert_ne!(uid, next);
    }

    #[test]
    fn clear_empties_everything() {
        let mut scene = Scene::new();
        let uid = scene.add_renderable(empty("a")).borrow().uid;
        scene.add_light(Light::default());
        scene.clear();
        assert!(scene.is_empty());
        assert!(scene.lights().is_empty());
        assert!(scene.renderable_by_uid(uid).is_none());
    }
}
