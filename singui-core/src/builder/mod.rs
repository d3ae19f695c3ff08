//! Tree Builder
//!
//! The builder turns nested closures into tree structure. Each closure gets
//! a [`Ctx`] bound to the node being built; calls made through it create
//! children of that node.
//!
//! # How Building Works
//!
//! 1. [`Builder::build`] creates a [`Region`]: a holding fragment with two
//!    empty text nodes as anchors. The callback fills the space between the
//!    anchors.
//!
//! 2. The region is then attached to the current target: the node on top
//!    of the scope stack, or the builder's root when nothing is scoped.
//!
//! 3. Tags work the same way for single elements ([`ElementHandle`]), and
//!    [`Fragment`]s are regions whose contents can be emptied and replaced.
//!
//! Every initial insertion goes through `attach`, so lifecycle hooks fire
//! around it. Elements and regions built inside a context follow that
//! context's lifecycle, and [`Builder::discard`] tears a subtree down for
//! good.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use singui_core::builder::Builder;
//! use singui_core::dom::{Env, VirtualDom};
//! use singui_core::reactive::Signal;
//!
//! let dom = Rc::new(VirtualDom::new());
//! let root = dom.create_element("main", None).unwrap();
//! let builder = Builder::with_root(dom.clone(), root);
//! let count = Signal::new(1);
//!
//! builder
//!     .build(|ctx| {
//!         ctx.div(|div| {
//!             div.attrs().set("class", "counter")?;
//!             div.text("")?.bind("textContent", &count);
//!             Ok(())
//!         })?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! count.set(2);
//! assert_eq!(dom.to_html(root), "<main><div class=\"counter\">2</div></main>");
//! ```

mod ctx;
mod element;
mod region;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

pub use ctx::Ctx;
pub use element::{Adopter, ElementHandle};
pub use region::{Fragment, Region};

use crate::bind::{Attrs, Props, Target};
use crate::deferred::DeferredQueue;
use crate::dom::{Env, Value};
use crate::lifecycle::{Lifecycle, LifecycleRegistry};
use crate::reactive::Signal;
use crate::scope::ScopeStack;

/// Result of a region build: the callback's output and the region.
pub struct Built<E: Env, T> {
    pub output: T,
    pub region: Region<E>,
}

impl<E: Env, T: fmt::Debug> fmt::Debug for Built<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Built")
            .field("output", &self.output)
            .field("region", &self.region)
            .finish()
    }
}

struct BuilderInner<E: Env> {
    env: Rc<E>,
    root: Option<E::Node>,
    scope: ScopeStack<E::Node>,
    registry: LifecycleRegistry<E::Node>,
    overrides: RefCell<Vec<Rc<Lifecycle>>>,
    deferred: DeferredQueue,
}

/// Entry point for building trees on an [`Env`].
///
/// Clones share scope, lifecycle records and the deferred queue.
pub struct Builder<E: Env> {
    inner: Rc<BuilderInner<E>>,
}

impl<E: Env> Builder<E> {
    /// A builder with no implicit target.
    pub fn new(env: Rc<E>) -> Self {
        Self::create(env, None)
    }

    /// A builder whose top-level builds attach to `root`.
    pub fn with_root(env: Rc<E>, root: E::Node) -> Self {
        Self::create(env, Some(root))
    }

    fn create(env: Rc<E>, root: Option<E::Node>) -> Self {
        Self {
            inner: Rc::new(BuilderInner {
                env,
                root,
                scope: ScopeStack::new(),
                registry: LifecycleRegistry::new(),
                overrides: RefCell::new(Vec::new()),
                deferred: DeferredQueue::new(),
            }),
        }
    }

    pub fn env(&self) -> &Rc<E> {
        &self.inner.env
    }

    pub fn root(&self) -> Option<&E::Node> {
        self.inner.root.as_ref()
    }

    /// Where implicit insertions go right now.
    pub fn current_target(&self) -> Option<E::Node> {
        if self.inner.scope.depth() > 0 {
            self.inner.scope.current_node()
        } else {
            self.inner.root.clone()
        }
    }

    pub fn current_namespace(&self) -> Option<String> {
        self.inner.scope.current_namespace()
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Build a region and attach it to the current target.
    pub fn build<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        self.region(f, self.current_target(), self.owner())
    }

    /// Build a region and leave it in its holding fragment.
    pub fn build_detached<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
    ) -> Result<Built<E, T>, E::Error> {
        self.region(f, None, None)
    }

    /// Create a `name` element, build it and attach it to the current target.
    pub fn tag(
        &self,
        name: &str,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<ElementHandle<E>, E::Error> {
        self.make_tag(name, f, self.current_target(), self.owner())
    }

    pub fn tag_detached(
        &self,
        name: &str,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<ElementHandle<E>, E::Error> {
        self.make_tag(name, f, None, None)
    }

    /// Create a text node, appended to the current target if there is one.
    pub fn text(&self, value: impl Into<Value>) -> Result<Props<E>, E::Error> {
        let target = self.current_target();
        let lifecycle = self.use_lifecycle(None);
        self.make_text(&Into::<Value>::into(value).to_string(), target, lifecycle)
    }

    pub fn comment(&self, value: impl Into<Value>) -> Result<Props<E>, E::Error> {
        let target = self.current_target();
        let lifecycle = self.use_lifecycle(None);
        self.make_comment(&Into::<Value>::into(value).to_string(), target, lifecycle)
    }

    /// An empty fragment attached to the current target.
    pub fn fragment(&self) -> Result<Fragment<E>, E::Error> {
        self.make_fragment(self.current_target(), self.owner())
    }

    /// A fragment attached to the current target, filled by `f`.
    pub fn fragment_with(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
    ) -> Result<Fragment<E>, E::Error> {
        let fragment = self.fragment()?;
        fragment.append(f)?;
        Ok(fragment)
    }

    /// Bring an existing node under the builder. See [`Adopter`].
    pub fn adopt(&self, node: Option<E::Node>, clone: bool) -> Adopter<E> {
        Adopter::new(self.clone(), node, clone, None)
    }

    /// Property view of any node, bound to its lifecycle.
    pub fn props(&self, node: &E::Node) -> Props<E> {
        Props::new(self.target(node, Some(self.inner.registry.lifecycle(node))))
    }

    pub fn attrs(&self, node: &E::Node) -> Attrs<E> {
        self.props(node).attrs()
    }

    /// A new signal.
    pub fn signal<T: Clone + PartialEq + 'static>(&self, value: T) -> Signal<T> {
        Signal::new(value)
    }

    // ------------------------------------------------------------------
    // Scope
    // ------------------------------------------------------------------

    /// Run `f` with `node` as the current target.
    pub fn scope<R>(&self, node: E::Node, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.scope.enter(Some(node));
        f()
    }

    /// Turn `f` into a closure that runs with `node` as the current target.
    pub fn scoped<R>(&self, f: impl Fn() -> R + 'static, node: E::Node) -> impl Fn() -> R + 'static {
        let builder = self.clone();
        move || builder.scope(node.clone(), &f)
    }

    /// Run `f` creating elements in `namespace` (alias or URI).
    pub fn with_namespace<R>(&self, namespace: &str, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.scope.enter_namespace(Some(namespace.to_string()));
        f()
    }

    /// Turn `f` into a closure that creates elements in `namespace`.
    pub fn namespaced<R>(
        &self,
        f: impl Fn() -> R + 'static,
        namespace: &str,
    ) -> impl Fn() -> R + 'static {
        let builder = self.clone();
        let namespace = namespace.to_string();
        move || builder.with_namespace(&namespace, &f)
    }

    /// Run `f` with no current target.
    pub fn unscoped<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.scope.enter(None);
        f()
    }

    /// Turn `f` into a closure that runs with no current target.
    pub fn clear_scope<R>(&self, f: impl Fn() -> R + 'static) -> impl Fn() -> R + 'static {
        let builder = self.clone();
        move || builder.unscoped(&f)
    }

    /// Run `f` with no current namespace.
    pub fn without_namespace<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.scope.enter_namespace(None);
        f()
    }

    /// Turn `f` into a closure that runs with no current namespace.
    pub fn clear_namespace<R>(&self, f: impl Fn() -> R + 'static) -> impl Fn() -> R + 'static {
        let builder = self.clone();
        move || builder.without_namespace(&f)
    }

    pub fn scope_depth(&self) -> usize {
        self.inner.scope.depth()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The lifecycle for `node`, created if absent.
    ///
    /// Without a node: the innermost [`Builder::with_lifecycle`] override,
    /// else the current target's lifecycle, else `None`.
    pub fn use_lifecycle(&self, node: Option<&E::Node>) -> Option<Rc<Lifecycle>> {
        if let Some(node) = node {
            return Some(self.inner.registry.lifecycle(node));
        }
        self.lifecycle_override()
            .or_else(|| self.current_target().map(|n| self.inner.registry.lifecycle(&n)))
    }

    /// Run `f` with `lifecycle` governing every binding made inside it.
    pub fn with_lifecycle<R>(&self, lifecycle: Rc<Lifecycle>, f: impl FnOnce() -> R) -> R {
        self.inner.overrides.borrow_mut().push(lifecycle);
        let _guard = OverrideGuard { builder: self };
        f()
    }

    /// Forget `node`: disconnect its bindings and drop its hooks.
    pub fn release(&self, node: &E::Node) -> bool {
        self.inner.registry.release(node)
    }

    /// Take `node` out of the tree for good.
    ///
    /// The node's detach hooks run around the removal. Then every record in
    /// its subtree is released, together with the stores of regions built
    /// inside it, and the backend frees the lot.
    pub fn discard(&self, node: &E::Node) -> Result<(), E::Error> {
        let env = &self.inner.env;
        match self.inner.registry.get(node) {
            Some(record) => record.lifecycle.detach_with(|| env.remove(node))?,
            None => env.remove(node)?,
        }
        self.forget(node)
    }

    /// Number of nodes with a lifecycle record.
    pub fn tracked_nodes(&self) -> usize {
        self.inner.registry.len()
    }

    /// Activate every binding whose deferred activation is still pending.
    pub fn flush_deferred(&self) -> usize {
        self.inner.deferred.flush()
    }

    pub fn pending_deferred(&self) -> usize {
        self.inner.deferred.len()
    }

    // ------------------------------------------------------------------
    // Internals shared with contexts and handles
    // ------------------------------------------------------------------

    fn lifecycle_override(&self) -> Option<Rc<Lifecycle>> {
        self.inner.overrides.borrow().last().cloned()
    }

    fn registry(&self) -> &LifecycleRegistry<E::Node> {
        &self.inner.registry
    }

    /// The implicit owner: the current target and its governing lifecycle.
    fn owner(&self) -> Option<Owner<E>> {
        let node = self.current_target()?;
        let lifecycle = self
            .lifecycle_override()
            .unwrap_or_else(|| self.inner.registry.lifecycle(&node));
        Some(Owner { node, lifecycle })
    }

    fn target(&self, node: &E::Node, lifecycle: Option<Rc<Lifecycle>>) -> Target<E> {
        Target {
            env: Rc::clone(&self.inner.env),
            node: node.clone(),
            lifecycle,
            bindings: self.inner.registry.bindings(node),
            deferred: self.inner.deferred.clone(),
        }
    }

    /// Release the records below `node` and of every store owned there,
    /// then free it all.
    fn forget(&self, node: &E::Node) -> Result<(), E::Error> {
        let env = &self.inner.env;
        let registry = &self.inner.registry;
        let mut roots = vec![node.clone()];
        let mut pending = vec![node.clone()];
        while let Some(next) = pending.pop() {
            let mut child = env.first_child(&next);
            while let Some(current) = child {
                child = env.next_sibling(&current);
                pending.push(current);
            }
            for store in registry.disown(&next) {
                pending.push(store.clone());
                roots.push(store);
            }
            registry.release(&next);
        }
        debug!(?node, roots = roots.len(), "forgetting subtree");
        for root in &roots {
            env.dispose(root)?;
        }
        Ok(())
    }

    fn region<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
        target: Option<E::Node>,
        owner: Option<Owner<E>>,
    ) -> Result<Built<E, T>, E::Error> {
        let env = &self.inner.env;
        let store = env.create_document_fragment()?;
        let start = env.create_text_node("")?;
        let end = env.create_text_node("")?;
        env.append_child(&store, &start)?;
        env.append_child(&store, &end)?;

        let lifecycle = self.inner.registry.lifecycle(&store);
        let region = Region::new(self.clone(), store.clone(), start, end, lifecycle);
        if let Some(owner) = &owner {
            self.inner.registry.own(&owner.node, &store);
            region.link(owner);
        }
        let output = {
            let _guard = self.inner.scope.enter(Some(store.clone()));
            let ctx = Ctx::for_region(self.clone(), region.clone());
            f(&ctx)?
        };

        if let Some(target) = target {
            region.attach(Some(&target))?;
        }
        Ok(Built { output, region })
    }

    fn make_fragment(
        &self,
        target: Option<E::Node>,
        owner: Option<Owner<E>>,
    ) -> Result<Fragment<E>, E::Error> {
        let built = self.region(|_| Ok(()), target, owner)?;
        Ok(Fragment::new(built.region))
    }

    fn make_tag(
        &self,
        name: &str,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
        target: Option<E::Node>,
        owner: Option<Owner<E>>,
    ) -> Result<ElementHandle<E>, E::Error> {
        let namespace = self.current_namespace();
        let node = self.inner.env.create_element(name, namespace.as_deref())?;
        self.make_element(node, f, target, owner)
    }

    /// Build `node` with `f`, then attach it to `target` and link it to
    /// `owner`'s lifecycle. Without a target the node stays parentless.
    fn make_element(
        &self,
        node: E::Node,
        f: impl FnOnce(&Ctx<E>) -> Result<(), E::Error>,
        target: Option<E::Node>,
        owner: Option<Owner<E>>,
    ) -> Result<ElementHandle<E>, E::Error> {
        let lifecycle = self.inner.registry.lifecycle(&node);
        let handle = ElementHandle::new(self.clone(), node.clone(), lifecycle);
        {
            let _guard = self.inner.scope.enter(Some(node));
            let ctx = Ctx::for_element(self.clone(), handle.clone());
            f(&ctx)?;
        }

        if let Some(target) = target {
            handle.attach(Some(&target))?;
            if let Some(owner) = owner {
                handle.link(&owner);
            }
        }
        Ok(handle)
    }

    fn make_text(
        &self,
        text: &str,
        target: Option<E::Node>,
        lifecycle: Option<Rc<Lifecycle>>,
    ) -> Result<Props<E>, E::Error> {
        let node = self.inner.env.create_text_node(text)?;
        if let Some(target) = target {
            self.inner.env.append_child(&target, &node)?;
        }
        Ok(Props::new(self.target(&node, lifecycle)))
    }

    fn make_comment(
        &self,
        text: &str,
        target: Option<E::Node>,
        lifecycle: Option<Rc<Lifecycle>>,
    ) -> Result<Props<E>, E::Error> {
        let node = self.inner.env.create_comment(text)?;
        if let Some(target) = target {
            self.inner.env.append_child(&target, &node)?;
        }
        Ok(Props::new(self.target(&node, lifecycle)))
    }

    /// Build with `f` into a scratch fragment, insert it with `place` and
    /// free the emptied fragment. What `f` builds belongs to `owner`.
    fn insert_scratch<T>(
        &self,
        f: impl FnOnce(&Ctx<E>) -> Result<T, E::Error>,
        owner: Option<Owner<E>>,
        place: impl FnOnce(&E, &E::Node) -> Result<(), E::Error>,
    ) -> Result<T, E::Error> {
        let env = &self.inner.env;
        let temp = env.create_document_fragment()?;
        let output = {
            let _guard = self.inner.scope.enter(Some(temp.clone()));
            let ctx = Ctx::for_scratch(self.clone(), temp.clone(), owner);
            f(&ctx)
        };
        let placed = output.and_then(|output| place(env.as_ref(), &temp).map(|()| output));
        self.inner.registry.disown(&temp);
        self.inner.registry.release(&temp);
        env.dispose(&temp)?;
        placed
    }
}

/// The context a new element or region is created in.
struct Owner<E: Env> {
    node: E::Node,
    lifecycle: Rc<Lifecycle>,
}

impl<E: Env> Clone for Owner<E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            lifecycle: Rc::clone(&self.lifecycle),
        }
    }
}

impl<E: Env> Clone for Builder<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Env> fmt::Debug for Builder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("root", &self.inner.root)
            .field("scope", &self.inner.scope)
            .field("registry", &self.inner.registry)
            .field("deferred", &self.inner.deferred)
            .finish()
    }
}

struct OverrideGuard<'a, E: Env> {
    builder: &'a Builder<E>,
}

impl<E: Env> Drop for OverrideGuard<'_, E> {
    fn drop(&mut self) {
        self.builder.inner.overrides.borrow_mut().pop();
    }
}

// ============================================================================
// Tests
// ============================================================================
