//! Anchored regions.
//!
//! A region is everything between two empty text nodes. While detached,
//! the anchors and the content live in the region's holding fragment;
//! attaching moves all of it to the target in one go.

use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, warn};

use super::{Builder, Built, Ctx, Owner};
use crate::dom::Env;
use crate::lifecycle::Lifecycle;
use crate::reactive::Disconnect;

struct RegionInner<E: Env> {
    builder: Builder<E>,
    store: E::Node,
    start: E::Node,
    end: E::Node,
    lifecycle: Rc<Lifecycle>,
    parent: RefCell<Option<(Owner<E>, Disconnect)>>,
}

/// Handle to a built region. Clones refer to the same region.
///
/// A region built inside an element or another region follows that
/// context's attach and detach until it is detached on its own.
pub struct Region<E: Env> {
    inner: Rc<RegionInner<E>>,
}

impl<E: Env> Region<E> {
    pub(super) fn new(
        builder: Builder<E>,
        store: E::Node,
        start: E::Node,
        end: E::Node,
        lifecycle: Rc<Lifecycle>,
    ) -> Self {
        Self {
            inner: Rc::new(RegionInner {
                builder,
                store,
                start,
                end,
                lifecycle,
                parent: RefCell::new(None),
            }),
        }
    }

    pub fn start_anchor(&self) -> &E::Node {
        &self.inner.start
    }

    pub fn end_anchor(&self) -> &E::Node {
        &self.inner.end
    }

    /// The fragment holding the region while it is detached.
    pub fn store(&self) -> &E::Node {
        &self.inner.store
    }

    pub fn lifecycle(&self) -> Rc<Lifecycle> {
        Rc::clone(&self.inner.lifecycle)
    }

    /// Nodes strictly between the anchors, in order.
    pub fn contents(&self) -> Vec<E::Node> {
        let env = self.inner.builder.env();
        let mut nodes = Vec::new();
        let mut cursor = env.next_sibling(&self.inner.start);
        while let Some(node) = cursor.take() {
            if node == self.inner.end {
                break;
            }
            cursor = env.next_sibling(&node);
            nodes.push(node);
        }
        nodes
    }

    /// Move the region under `target`, or the builder's current target.
    ///
    /// Does nothing when neither is available.
    pub fn attach(&self, target: Option<&E::Node>) -> Result<(), E::Error> {
        let Some(target) = target.cloned().or_else(|| self.inner.builder.current_target()) else {
            return Ok(());
        };
        let env = self.inner.builder.env();
        let RegionInner { store, start, end, .. } = &*self.inner;
        debug!(?target, "attaching region");
        self.inner.lifecycle.attach_with(|| {
            self.collect()?;
            env.append_child(&target, start)?;
            env.append_child(&target, store)?;
            env.append_child(&target, end)
        })
    }

    /// Move the region back into its holding fragment. It stops following
    /// its creating context.
    pub fn detach(&self) -> Result<(), E::Error> {
        debug!(start = ?self.inner.start, "detaching region");
        self.unlink();
        self.inner.lifecycle.detach_with(|| self.collect())
    }

    /// Detach the region and free it with everything built inside it. The
    /// region must not be used afterwards.
    pub fn discard(&self) -> Result<(), E::Error> {
        self.detach()?;
        self.inner.builder.forget(&self.inner.store)
    }

    /// Build with `f` and insert the result right before the region.
    pub fn before<T>(&self, f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>) -> Result<T, E::Error> {
        let start = &self.inner.start;
        self.inner
            .builder
            .insert_scratch(f, self.owner(), |env, temp| env.insert_before(start, temp))
    }

    /// Build with `f` and insert the result right after the region.
    pub fn after<T>(&self, f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>) -> Result<T, E::Error> {
        let end = &self.inner.end;
        self.inner
            .builder
            .insert_scratch(f, self.owner(), |env, temp| env.insert_after(end, temp))
    }

    /// Follow `owner`'s transitions from now on.
    pub(super) fn link(&self, owner: &Owner<E>) {
        let forward = owner.lifecycle.forward_to(&self.inner.lifecycle);
        if let Some((_, old)) = self.inner.parent.replace(Some((owner.clone(), forward))) {
            old.disconnect();
        }
    }

    fn unlink(&self) {
        if let Some((_, forward)) = self.inner.parent.take() {
            forward.disconnect();
        }
    }

    fn owner(&self) -> Option<Owner<E>> {
        self.inner.parent.borrow().as_ref().map(|(owner, _)| owner.clone())
    }

    /// The owner for regions appended inside this one.
    fn as_owner(&self) -> Owner<E> {
        Owner {
            node: self.inner.store.clone(),
            lifecycle: self.lifecycle(),
        }
    }

    /// Gather start anchor, content and end anchor into the store.
    fn collect(&self) -> Result<(), E::Error> {
        let env = self.inner.builder.env();
        let RegionInner { store, start, end, .. } = &*self.inner;
        let mut found_end = false;
        let mut cursor = Some(start.clone());
        while let Some(node) = cursor.take() {
            if node == *end {
                found_end = true;
                break;
            }
            cursor = env.next_sibling(&node);
            env.append_child(store, &node)?;
        }
        if !found_end {
            warn!(?start, ?end, "end anchor not found after start anchor");
        }
        env.append_child(store, end)
    }
}

impl<E: Env> Clone for Region<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Env> fmt::Debug for Region<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("start", &self.inner.start)
            .field("end", &self.inner.end)
            .field("linked", &self.inner.parent.borrow().is_some())
            .finish()
    }
}

/// A region whose content can be replaced.
///
/// Derefs to [`Region`] for attach, detach, before and after. Regions
/// added with [`Fragment::append`] belong to the fragment: emptying it
/// detaches and frees them.
pub struct Fragment<E: Env> {
    region: Region<E>,
    parts: Rc<RefCell<Vec<Region<E>>>>,
}

impl<E: Env> Fragment<E> {
    pub(super) fn new(region: Region<E>) -> Self {
        Self {
            region,
            parts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn region(&self) -> &Region<E> {
        &self.region
    }

    /// Number of appended regions still in the fragment.
    pub fn len(&self) -> usize {
        self.parts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.borrow().is_empty()
    }

    /// Remove everything between the anchors and free it.
    pub fn empty(&self) -> Result<(), E::Error> {
        let parts: Vec<Region<E>> = self.parts.borrow_mut().drain(..).collect();
        debug!(parts = parts.len(), "emptying fragment");
        for part in parts {
            part.discard()?;
        }
        let builder = &self.region.inner.builder;
        for node in self.region.contents() {
            builder.discard(&node)?;
        }
        Ok(())
    }

    /// Build a new region with `f` and add it at the end of the content.
    pub fn append<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        let builder = &self.region.inner.builder;
        let env = builder.env();
        let temp = env.create_document_fragment()?;
        let placed = builder
            .region(f, Some(temp.clone()), Some(self.region.as_owner()))
            .and_then(|built| {
                env.insert_before(self.region.end_anchor(), &temp)
                    .map(|()| built)
            });
        env.dispose(&temp)?;
        let built = placed?;
        self.parts.borrow_mut().push(built.region.clone());
        Ok(built)
    }

    /// Replace the content with what `f` builds.
    pub fn set<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        self.empty()?;
        self.append(f)
    }
}

impl<E: Env> Deref for Fragment<E> {
    type Target = Region<E>;

    fn deref(&self) -> &Region<E> {
        &self.region
    }
}

impl<E: Env> Clone for Fragment<E> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.clone(),
            parts: Rc::clone(&self.parts),
        }
    }
}

impl<E: Env> fmt::Debug for Fragment<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("region", &self.region)
            .field("parts", &self.parts.borrow().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::dom::{NodeId, VirtualDom};
    use crate::lifecycle::Phase;
    use crate::reactive::Signal;

    fn setup() -> (Rc<VirtualDom>, NodeId, Builder<VirtualDom>) {
        let dom = Rc::new(VirtualDom::new());
        let root = dom.create_element("body", None).unwrap();
        (dom.clone(), root, Builder::with_root(dom, root))
    }

    fn texts(dom: &VirtualDom, nodes: &[NodeId]) -> Vec<String> {
        nodes.iter().map(|n| dom.text_content(*n)).collect()
    }

    #[test]
    fn detach_and_reattach_move_the_whole_region() {
        let (dom, root, builder) = setup();
        let other = dom.create_element("aside", None).unwrap();
        let region = builder
            .build(|ctx| {
                ctx.text("a")?;
                ctx.text("b")?;
                Ok(())
            })
            .unwrap()
            .region;

        region.detach().unwrap();
        assert!(dom.children(root).is_empty());
        assert_eq!(dom.children(*region.store()).len(), 4);

        region.attach(Some(&other)).unwrap();
        assert_eq!(dom.text_content(other), "ab");
        assert!(dom.children(*region.store()).is_empty());

        // Attaching while attached moves rather than duplicates.
        region.attach(Some(&root)).unwrap();
        assert_eq!(dom.children(root).len(), 4);
        assert!(dom.children(other).is_empty());
    }

    #[test]
    fn lifecycle_order_on_detach() {
        let (dom, root, builder) = setup();
        let region = builder.build(|ctx| ctx.text("x").map(|_| ())).unwrap().region;
        let log = Rc::new(RefCell::new(Vec::new()));

        let (l, d) = (log.clone(), dom.clone());
        region.lifecycle().on(Phase::BeforeDetach, move || {
            l.borrow_mut().push(format!("before:{}", d.children(root).len()));
        });
        let (l, d) = (log.clone(), dom.clone());
        region.lifecycle().on(Phase::AfterDetach, move || {
            l.borrow_mut().push(format!("after:{}", d.children(root).len()));
        });

        region.detach().unwrap();
        assert_eq!(*log.borrow(), vec!["before:3", "after:0"]);
    }

    #[test]
    fn before_and_after_insert_around_the_anchors() {
        let (dom, root, builder) = setup();
        let region = builder.build(|ctx| ctx.text("mid").map(|_| ())).unwrap().region;

        region.before(|ctx| ctx.text("<").map(|_| ())).unwrap();
        region.after(|ctx| ctx.text(">").map(|_| ())).unwrap();

        assert_eq!(dom.text_content(root), "<mid>");
        assert_eq!(dom.children(root)[1], *region.start_anchor());
        assert_eq!(texts(&dom, &region.contents()), vec!["mid"]);
    }

    #[test]
    fn fragment_set_replaces_content() {
        let (dom, root, builder) = setup();
        let fragment = builder.fragment().unwrap();

        fragment.append(|ctx| ctx.text("one").map(|_| ())).unwrap();
        fragment.append(|ctx| ctx.text("two").map(|_| ())).unwrap();
        assert_eq!(dom.text_content(root), "onetwo");

        let first = fragment.contents();
        fragment.set(|ctx| ctx.text("three").map(|_| ())).unwrap();

        assert_eq!(dom.text_content(root), "three");
        assert!(first.iter().all(|n| dom.parent(*n) != Some(root)));
        assert_eq!(dom.children(root).first(), Some(fragment.start_anchor()));
        assert_eq!(dom.children(root).last(), Some(fragment.end_anchor()));
    }

    #[test]
    fn fragment_regions_stay_in_insertion_order() {
        let (dom, _, builder) = setup();
        let fragment = builder.fragment().unwrap();
        for word in ["a", "b", "c"] {
            fragment.append(|ctx| ctx.text(word).map(|_| ())).unwrap();
        }
        let between: String = fragment
            .contents()
            .iter()
            .map(|n| dom.text_content(*n))
            .collect();
        assert_eq!(between, "abc");

        fragment.empty().unwrap();
        assert!(fragment.contents().is_empty());
    }

    #[test]
    fn appended_regions_can_be_removed_individually() {
        let (dom, root, builder) = setup();
        let fragment = builder.fragment().unwrap();
        let first = fragment.append(|ctx| ctx.text("1").map(|_| ())).unwrap();
        fragment.append(|ctx| ctx.text("2").map(|_| ())).unwrap();

        first.region.detach().unwrap();
        assert_eq!(dom.text_content(root), "2");
    }

    #[test]
    fn fragment_set_tears_down_replaced_bindings() {
        let (dom, root, builder) = setup();
        let value = Signal::new(0);
        let fragment = builder.fragment().unwrap();

        for _ in 0..3 {
            fragment
                .set(|ctx| ctx.text("").map(|t| {
                    t.bind("textContent", &value);
                }))
                .unwrap();
        }
        builder.flush_deferred();

        assert_eq!(value.subscriber_count(), 1);
        assert_eq!(fragment.len(), 1);
        value.set(9);
        assert_eq!(dom.text_content(root), "9");
    }

    #[test]
    fn region_detach_reaches_nested_elements() {
        let (dom, root, builder) = setup();
        let value = Signal::new("x");
        let region = builder
            .build(|ctx| {
                ctx.div(|div| div.span(|span| span.text("").map(|t| {
                    t.bind("textContent", &value);
                })).map(|_| ()))?;
                Ok(())
            })
            .unwrap()
            .region;
        assert_eq!(value.subscriber_count(), 1);

        region.detach().unwrap();
        assert_eq!(value.subscriber_count(), 0);

        value.set("y");
        region.attach(Some(&root)).unwrap();
        assert_eq!(value.subscriber_count(), 1);
        assert_eq!(dom.to_html(root), "<body><div><span>y</span></div></body>");
    }

    #[test]
    fn nested_regions_follow_the_outer_region() {
        let (_, root, builder) = setup();
        let value = Signal::new(1);
        let outer = builder
            .build(|ctx| {
                ctx.build(|inner| inner.text("").map(|t| {
                    t.bind("textContent", &value);
                }))?;
                Ok(())
            })
            .unwrap()
            .region;
        assert_eq!(value.subscriber_count(), 1);

        outer.detach().unwrap();
        assert_eq!(value.subscriber_count(), 0);
        outer.attach(Some(&root)).unwrap();
        assert_eq!(value.subscriber_count(), 1);
    }

    #[test]
    fn repeated_set_does_not_grow_the_tree() {
        let (dom, _, builder) = setup();
        let fragment = builder.fragment().unwrap();
        fragment.set(|ctx| ctx.text("x").map(|_| ())).unwrap();
        let (nodes, tracked) = (dom.len(), builder.tracked_nodes());

        for _ in 0..100 {
            fragment.set(|ctx| ctx.text("x").map(|_| ())).unwrap();
        }

        assert_eq!(dom.len(), nodes);
        assert_eq!(builder.tracked_nodes(), tracked);
    }

    #[test]
    fn discarded_region_is_gone() {
        let (dom, root, builder) = setup();
        let value = Signal::new(1);
        let region = builder
            .build(|ctx| ctx.p(|p| p.text("").map(|t| {
                t.bind("textContent", &value);
            })).map(|_| ()))
            .unwrap()
            .region;

        region.discard().unwrap();
        assert_eq!(value.subscriber_count(), 0);
        assert!(dom.children(root).is_empty());
        assert_eq!(dom.kind(*region.store()), None);
    }
}
