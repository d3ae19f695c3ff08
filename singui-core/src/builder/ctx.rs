use std::fmt;
use std::rc::Rc;

use super::{Adopter, Builder, Built, ElementHandle, Fragment, Owner, Region};
use crate::bind::{Attrs, Props};
use crate::dom::{Env, Listener, Value};
use crate::lifecycle::Lifecycle;
use crate::reactive::Signal;

/// The context handed to builder callbacks.
///
/// Everything created through a `Ctx` goes under [`Ctx::node`]: the
/// element being built, or the holding fragment of the region being built.
/// Elements and regions created here follow the context's lifecycle.
pub struct Ctx<E: Env> {
    builder: Builder<E>,
    node: E::Node,
    lifecycle: Option<Rc<Lifecycle>>,
    owner: Option<Owner<E>>,
    region: Option<Region<E>>,
    element: Option<ElementHandle<E>>,
}

macro_rules! tag_helpers {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Shorthand for `tag(\"", stringify!($name), "\", f)`.")]
            pub fn $name(
                &self,
                f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
            ) -> Result<ElementHandle<E>, E::Error> {
                self.tag(stringify!($name), f)
            }
        )*
    };
}

impl<E: Env> Ctx<E> {
    /// A context over a scratch fragment whose content will be inserted
    /// next to something `owner` governs.
    pub(super) fn for_scratch(builder: Builder<E>, node: E::Node, owner: Option<Owner<E>>) -> Self {
        Self {
            builder,
            node,
            lifecycle: owner.as_ref().map(|owner| Rc::clone(&owner.lifecycle)),
            owner,
            region: None,
            element: None,
        }
    }

    pub(super) fn for_region(builder: Builder<E>, region: Region<E>) -> Self {
        Self {
            builder,
            node: region.store().clone(),
            lifecycle: Some(region.lifecycle()),
            owner: None,
            region: Some(region),
            element: None,
        }
    }

    pub(super) fn for_element(builder: Builder<E>, element: ElementHandle<E>) -> Self {
        Self {
            builder,
            node: element.node().clone(),
            lifecycle: Some(element.lifecycle()),
            owner: None,
            region: None,
            element: Some(element),
        }
    }

    pub fn builder(&self) -> &Builder<E> {
        &self.builder
    }

    pub fn env(&self) -> &Rc<E> {
        self.builder.env()
    }

    /// The node children are created under.
    pub fn node(&self) -> &E::Node {
        &self.node
    }

    /// The element being built, inside a tag or adopt callback.
    pub fn element(&self) -> Option<&ElementHandle<E>> {
        self.element.as_ref()
    }

    /// The region being built, inside a build callback.
    pub fn region(&self) -> Option<&Region<E>> {
        self.region.as_ref()
    }

    /// The lifecycle bindings made here follow.
    ///
    /// A [`Builder::with_lifecycle`] override takes precedence over the
    /// context's own node.
    pub fn lifecycle(&self) -> Rc<Lifecycle> {
        self.builder
            .lifecycle_override()
            .or_else(|| self.lifecycle.clone())
            .unwrap_or_else(|| self.builder.registry().lifecycle(&self.node))
    }

    fn owner(&self) -> Owner<E> {
        self.owner.clone().unwrap_or_else(|| Owner {
            node: self.node.clone(),
            lifecycle: self.lifecycle(),
        })
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Create a `name` child element, build it with `f` and attach it.
    pub fn tag(
        &self,
        name: &str,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<ElementHandle<E>, E::Error> {
        self.builder
            .make_tag(name, f, Some(self.node.clone()), Some(self.owner()))
    }

    /// Create and build a `name` element without attaching it.
    pub fn tag_detached(
        &self,
        name: &str,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<ElementHandle<E>, E::Error> {
        self.builder.make_tag(name, f, None, None)
    }

    tag_helpers! {
        a, article, aside, b, button, code, div, em, footer, form, h1, h2, h3, h4,
        header, i, img, input, label, li, main, nav, ol, option, p, pre, section,
        select, small, span, strong, table, tbody, td, textarea, th, thead, tr, ul,
    }

    /// An `svg` element; it and everything built inside it use the SVG
    /// namespace.
    pub fn svg(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<ElementHandle<E>, E::Error> {
        self.with_namespace("svg", |ctx| ctx.tag("svg", f))
    }

    /// Append a text node and return its property view.
    pub fn text(&self, value: impl Into<Value>) -> Result<Props<E>, E::Error> {
        self.builder.make_text(
            &Into::<Value>::into(value).to_string(),
            Some(self.node.clone()),
            Some(self.lifecycle()),
        )
    }

    pub fn comment(&self, value: impl Into<Value>) -> Result<Props<E>, E::Error> {
        self.builder.make_comment(
            &Into::<Value>::into(value).to_string(),
            Some(self.node.clone()),
            Some(self.lifecycle()),
        )
    }

    /// Build a nested region here.
    pub fn build<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        self.builder
            .region(f, Some(self.node.clone()), Some(self.owner()))
    }

    pub fn build_detached<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        self.builder.region(f, None, None)
    }

    /// An empty fragment here.
    pub fn fragment(&self) -> Result<Fragment<E>, E::Error> {
        self.builder
            .make_fragment(Some(self.node.clone()), Some(self.owner()))
    }

    /// A fragment here, filled by `f`.
    pub fn fragment_with(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<Fragment<E>, E::Error> {
        let fragment = self.fragment()?;
        fragment.append(f)?;
        Ok(fragment)
    }

    /// Adopt an existing node as a child of this one.
    pub fn adopt(&self, node: Option<E::Node>, clone: bool) -> Adopter<E> {
        Adopter::new(self.builder.clone(), node, clone, Some(self.owner()))
    }

    /// Run `f` creating elements in `namespace`.
    pub fn with_namespace<R>(&self, namespace: &str, f: impl FnOnce(&Self) -> R) -> R {
        self.builder.with_namespace(namespace, || f(self))
    }

    // ------------------------------------------------------------------
    // The node itself
    // ------------------------------------------------------------------

    pub fn props(&self) -> Props<E> {
        Props::new(self.builder.target(&self.node, Some(self.lifecycle())))
    }

    pub fn attrs(&self) -> Attrs<E> {
        self.props().attrs()
    }

    /// Listen for `event` on this node. Keep the listener to remove it.
    pub fn on<F>(&self, event: &str, listener: F) -> Result<Listener<E::Event>, E::Error>
    where
        F: Fn(&E::Event) + 'static,
    {
        let listener: Listener<E::Event> = Rc::new(listener);
        self.env()
            .add_event_listener(&self.node, event, &listener)?;
        Ok(listener)
    }

    pub fn off(&self, event: &str, listener: &Listener<E::Event>) -> Result<(), E::Error> {
        self.env()
            .remove_event_listener(&self.node, event, listener)
    }

    pub fn signal<T: Clone + PartialEq + 'static>(&self, value: T) -> Signal<T> {
        Signal::new(value)
    }
}

impl<E: Env> fmt::Debug for Ctx<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("node", &self.node)
            .field("region", &self.region.is_some())
            .field("element", &self.element.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::dom::{namespace, NodeId, VirtualDom};

    fn setup() -> (Rc<VirtualDom>, NodeId, Builder<VirtualDom>) {
        let dom = Rc::new(VirtualDom::new());
        let root = dom.create_element("body", None).unwrap();
        (dom.clone(), root, Builder::with_root(dom, root))
    }

    #[test]
    fn nested_tags_nest() {
        let (dom, root, builder) = setup();
        builder
            .build(|ctx| {
                ctx.ul(|ul| {
                    for item in ["one", "two"] {
                        ul.li(|li| li.text(item).map(|_| ()))?;
                    }
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();

        assert_eq!(dom.to_html(root), "<body><ul><li>one</li><li>two</li></ul></body>");
    }

    #[test]
    fn context_exposes_what_is_being_built() {
        let (_, _, builder) = setup();
        builder
            .build(|ctx| {
                assert!(ctx.region().is_some());
                assert!(ctx.element().is_none());
                ctx.span(|span| {
                    assert_eq!(span.element().map(|e| *e.node()), Some(*span.node()));
                    assert_eq!(span.builder().current_target(), Some(*span.node()));
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn detached_tags_are_parked() {
        let (dom, root, builder) = setup();
        let handle = builder
            .build(|ctx| ctx.tag_detached("p", |_| Ok(())))
            .unwrap()
            .output;

        assert_eq!(dom.children(root).len(), 2);
        handle.attach(Some(&root)).unwrap();
        assert_eq!(dom.children(root).len(), 3);
    }

    #[test]
    fn svg_children_inherit_the_namespace() {
        let (dom, _, builder) = setup();
        let svg = builder
            .build(|ctx| ctx.svg(|svg| svg.tag("path", |_| Ok(())).map(|_| ())))
            .unwrap()
            .output;

        let path = dom.children(*svg.node())[0];
        assert_eq!(dom.namespace(*svg.node()).as_deref(), Some(namespace::SVG));
        assert_eq!(dom.namespace(path).as_deref(), Some(namespace::SVG));
        assert_eq!(builder.current_namespace(), None);
    }

    #[test]
    fn events_are_wired_to_the_node() {
        let (dom, _, builder) = setup();
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();

        let button = builder
            .build(|ctx| {
                ctx.button(|b| {
                    let listener = b.on("click", move |_| c.set(c.get() + 1))?;
                    assert_eq!(b.env().listener_count(*b.node(), "click"), 1);
                    b.off("click", &listener)?;
                    b.on("click", {
                        let c = clicks.clone();
                        move |_| c.set(c.get() + 10)
                    })?;
                    Ok(())
                })
            })
            .unwrap()
            .output;

        dom.dispatch(*button.node(), "click");
        assert_eq!(clicks.get(), 10);
    }

    #[test]
    fn comments_and_attributes() {
        let (dom, root, builder) = setup();
        builder
            .build(|ctx| {
                ctx.comment("marker")?;
                ctx.a(|a| {
                    a.attrs().set("href", "/x")?;
                    a.props().set("hidden", false)?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();

        assert_eq!(dom.to_html(root), "<body><!--marker--><a href=\"/x\"></a></body>");
    }
}
