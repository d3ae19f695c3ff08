use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::{Builder, Ctx, Owner};
use crate::bind::{Attrs, Props};
use crate::dom::Env;
use crate::lifecycle::Lifecycle;
use crate::reactive::Disconnect;

struct ElementInner<E: Env> {
    builder: Builder<E>,
    node: E::Node,
    lifecycle: Rc<Lifecycle>,
    parent: RefCell<Option<(Owner<E>, Disconnect)>>,
}

/// Handle to an element created by a tag or adopt call.
///
/// An element built inside another element or region follows that
/// context's attach and detach until it is detached on its own.
pub struct ElementHandle<E: Env> {
    inner: Rc<ElementInner<E>>,
}

impl<E: Env> ElementHandle<E> {
    pub(super) fn new(builder: Builder<E>, node: E::Node, lifecycle: Rc<Lifecycle>) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                builder,
                node,
                lifecycle,
                parent: RefCell::new(None),
            }),
        }
    }

    pub fn node(&self) -> &E::Node {
        &self.inner.node
    }

    pub fn lifecycle(&self) -> Rc<Lifecycle> {
        Rc::clone(&self.inner.lifecycle)
    }

    pub fn props(&self) -> Props<E> {
        Props::new(
            self.inner
                .builder
                .target(&self.inner.node, Some(self.lifecycle())),
        )
    }

    pub fn attrs(&self) -> Attrs<E> {
        self.props().attrs()
    }

    /// Append the element to `target`, or the builder's current target.
    ///
    /// Does nothing when neither is available.
    pub fn attach(&self, target: Option<&E::Node>) -> Result<(), E::Error> {
        let Some(target) = target.cloned().or_else(|| self.inner.builder.current_target()) else {
            return Ok(());
        };
        debug!(node = ?self.inner.node, ?target, "attaching element");
        let env = self.inner.builder.env();
        self.inner
            .lifecycle
            .attach_with(|| env.append_child(&target, &self.inner.node))
    }

    /// Take the element out of the tree. It stops following its creating
    /// context.
    pub fn detach(&self) -> Result<(), E::Error> {
        debug!(node = ?self.inner.node, "detaching element");
        self.unlink();
        let env = self.inner.builder.env();
        self.inner
            .lifecycle
            .detach_with(|| env.remove(&self.inner.node))
    }

    /// Detach the element and free it with its subtree. The handle must not
    /// be used afterwards.
    pub fn discard(&self) -> Result<(), E::Error> {
        self.unlink();
        self.inner.builder.discard(&self.inner.node)
    }

    /// Build with `f` and insert the result right before the element.
    pub fn before<T>(&self, f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>) -> Result<T, E::Error> {
        let node = &self.inner.node;
        self.inner
            .builder
            .insert_scratch(f, self.owner(), |env, temp| env.insert_before(node, temp))
    }

    /// Build with `f` and insert the result right after the element.
    pub fn after<T>(&self, f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>) -> Result<T, E::Error> {
        let node = &self.inner.node;
        self.inner
            .builder
            .insert_scratch(f, self.owner(), |env, temp| env.insert_after(node, temp))
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
}

impl<E: Env> Clone for ElementHandle<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Env> fmt::Debug for ElementHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle")
            .field("node", &self.inner.node)
            .field("linked", &self.inner.parent.borrow().is_some())
            .finish()
    }
}

/// Builds an existing node the way a tag call builds a new one.
///
/// A cloning adopter deep-copies the node on every build, so the original
/// stays untouched and can serve as a template. A non-cloning adopter hands
/// the node over once; later builds return `Ok(None)`, as does adopting no
/// node at all.
pub struct Adopter<E: Env> {
    builder: Builder<E>,
    node: RefCell<Option<E::Node>>,
    clone: bool,
    owner: Option<Owner<E>>,
}

impl<E: Env> Adopter<E> {
    pub(super) fn new(
        builder: Builder<E>,
        node: Option<E::Node>,
        clone: bool,
        owner: Option<Owner<E>>,
    ) -> Self {
        Self {
            builder,
            node: RefCell::new(node),
            clone,
            owner,
        }
    }

    /// Whether a build would still produce an element.
    pub fn is_available(&self) -> bool {
        self.node.borrow().is_some()
    }

    /// Build the node with `f` and attach it.
    pub fn build(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<Option<ElementHandle<E>>, E::Error> {
        let owner = self.owner.clone().or_else(|| self.builder.owner());
        let target = owner.as_ref().map(|owner| owner.node.clone());
        self.run(f, target, owner)
    }

    /// Build the node with `f` and leave it parentless.
    pub fn build_detached(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<Option<ElementHandle<E>>, E::Error> {
        self.run(f, None, None)
    }

    fn run(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
        target: Option<E::Node>,
        owner: Option<Owner<E>>,
    ) -> Result<Option<ElementHandle<E>>, E::Error> {
        let node = if self.clone {
            match self.node.borrow().as_ref() {
                Some(template) => self.builder.env().clone_element(template, true)?,
                None => return Ok(None),
            }
        } else {
            match self.node.borrow_mut().take() {
                Some(node) => node,
                None => return Ok(None),
            }
        };
        self.builder.make_element(node, f, target, owner).map(Some)
    }
}

impl<E: Env> fmt::Debug for Adopter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adopter")
            .field("node", &self.node.borrow())
            .field("clone", &self.clone)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

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

    #[test]
    fn element_attach_detach_cycle() {
        let (dom, root, builder) = setup();
        let handle = builder.tag("p", |_| Ok(())).unwrap();
        assert_eq!(dom.parent(*handle.node()), Some(root));

        let log = Rc::new(RefCell::new(Vec::new()));
        for (phase, name) in [
            (Phase::BeforeAttach, "before-attach"),
            (Phase::AfterAttach, "after-attach"),
            (Phase::BeforeDetach, "before-detach"),
            (Phase::AfterDetach, "after-detach"),
        ] {
            let log = log.clone();
            handle.lifecycle().on(phase, move || log.borrow_mut().push(name));
        }

        handle.detach().unwrap();
        assert_eq!(dom.parent(*handle.node()), None);
        handle.attach(None).unwrap();
        assert_eq!(dom.parent(*handle.node()), Some(root));
        assert_eq!(
            *log.borrow(),
            vec!["before-detach", "after-detach", "before-attach", "after-attach"]
        );
    }

    #[test]
    fn siblings_before_and_after() {
        let (dom, root, builder) = setup();
        let handle = builder.tag("hr", |_| Ok(())).unwrap();
        handle.before(|ctx| ctx.p(|_| Ok(()))).unwrap();
        handle.after(|ctx| ctx.text("end").map(|_| ())).unwrap();

        assert_eq!(dom.to_html(root), "<body><p></p><hr>end</body>");
    }

    #[test]
    fn adopting_nothing_is_a_noop() {
        let (_, _, builder) = setup();
        let adopter = builder.adopt(None, false);
        assert!(adopter.build(|_| Ok(())).unwrap().is_none());
    }

    #[test]
    fn non_cloning_adopter_is_single_use() {
        let (dom, root, builder) = setup();
        let existing = dom.create_element("section", None).unwrap();
        let adopter = builder.adopt(Some(existing), false);

        let handle = adopter
            .build(|ctx| ctx.text("adopted").map(|_| ()))
            .unwrap()
            .unwrap();
        assert_eq!(*handle.node(), existing);
        assert_eq!(dom.parent(existing), Some(root));
        assert!(!adopter.is_available());
        assert!(adopter.build(|_| Ok(())).unwrap().is_none());
    }

    #[test]
    fn cloning_adopter_keeps_the_template() {
        let (dom, root, builder) = setup();
        let template = dom.create_element("li", None).unwrap();
        let label = dom.create_text_node("item").unwrap();
        dom.append_child(&template, &label).unwrap();
        let adopter = builder.adopt(Some(template), true);

        let first = adopter.build(|_| Ok(())).unwrap().unwrap();
        let second = adopter.build(|_| Ok(())).unwrap().unwrap();

        assert_ne!(*first.node(), template);
        assert_ne!(*first.node(), *second.node());
        assert_eq!(dom.parent(template), None);
        assert_eq!(dom.text_content(root), "itemitem");
        assert_eq!(dom.text_content(template), "item");
    }

    #[test]
    fn detached_adopt_parks_the_node() {
        let (dom, root, builder) = setup();
        let existing = dom.create_element("div", None).unwrap();
        let handle = builder
            .adopt(Some(existing), false)
            .build_detached(|_| Ok(()))
            .unwrap()
            .unwrap();

        assert!(dom.children(root).is_empty());
        handle.attach(None).unwrap();
        assert_eq!(dom.children(root), vec![existing]);
    }

    #[test]
    fn nested_elements_follow_their_parent() {
        let (dom, root, builder) = setup();
        let value = Signal::new("a");
        let mut inner = None;
        let outer = builder
            .tag("section", |section| {
                inner = Some(section.p(|p| p.text("").map(|t| {
                    t.bind("textContent", &value);
                }))?);
                Ok(())
            })
            .unwrap();
        assert_eq!(value.subscriber_count(), 1);

        outer.detach().unwrap();
        assert_eq!(value.subscriber_count(), 0);
        outer.attach(Some(&root)).unwrap();
        assert_eq!(value.subscriber_count(), 1);

        // A child detached on its own no longer follows.
        inner.unwrap().detach().unwrap();
        outer.detach().unwrap();
        outer.attach(Some(&root)).unwrap();
        assert_eq!(value.subscriber_count(), 0);
        assert_eq!(dom.to_html(root), "<body><section></section></body>");
    }

    #[test]
    fn discard_frees_the_subtree() {
        let (dom, root, builder) = setup();
        let value = Signal::new(1);
        let handle = builder
            .tag("div", |div| {
                div.build(|ctx| ctx.text("").map(|t| {
                    t.bind("textContent", &value);
                }))?;
                Ok(())
            })
            .unwrap();
        builder.flush_deferred();
        assert_eq!(value.subscriber_count(), 1);

        let nodes = dom.len();
        handle.discard().unwrap();

        assert_eq!(value.subscriber_count(), 0);
        assert!(dom.children(root).is_empty());
        assert!(dom.len() < nodes - 4);
        assert_eq!(dom.kind(*handle.node()), None);
    }
}
