//! Mux Implementation
//!
//! A Mux is a derived string signal: literal segments interleaved with the
//! current values of other sources.
//!
//! # How Muxes Work
//!
//! 1. Until someone connects, a mux holds no subscriptions. `get` computes
//!    the text on demand.
//!
//! 2. The first consumer (a `connect` or a `watch`) activates it: every
//!    tracked input is subscribed and the text is cached.
//!
//! 3. A source change recomputes the text. Consumers hear about it only when
//!    the text actually changed.
//!
//! 4. The last consumer leaving deactivates it: all source subscriptions are
//!    dropped and the cache is cleared, so a later `connect` starts fresh.
//!
//! # Batching
//!
//! `pause`/`resume` nest. While the depth is above zero, source changes only
//! mark the mux stale; returning to depth zero recomputes and notifies once,
//! however many sources changed in between.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Display};
use std::rc::{Rc, Weak};

use tracing::debug;

use super::hooks::{Disconnect, HookId, HookSet};
use super::signal::Signal;
use super::source::{Source, SourceId};

/// Object-safe view of a source, used for mux inputs and watch triggers.
trait Dependency {
    fn text(&self) -> String;
    fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Disconnect;
}

struct SourceText<S>(S);

impl<S> Dependency for SourceText<S>
where
    S: Source,
    S::Value: Display,
{
    fn text(&self) -> String {
        self.0.get().to_string()
    }

    fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Disconnect {
        self.0.connect(move |_| on_change())
    }
}

struct Trigger<S>(S);

impl<S: Source> Dependency for Trigger<S> {
    fn text(&self) -> String {
        String::new()
    }

    fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Disconnect {
        self.0.connect(move |_| on_change())
    }
}

/// A type-erased source feeding a mux slot.
#[derive(Clone)]
pub struct TrackedInput(Rc<dyn Dependency>);

impl TrackedInput {
    /// Current text of the underlying source.
    pub fn text(&self) -> String {
        self.0.text()
    }
}

/// One interpolated slot of a mux.
#[derive(Clone)]
pub enum MuxInput {
    /// A plain value, fixed at construction.
    Fixed(String),
    /// A source whose current value is read on every recomputation.
    Tracked(TrackedInput),
}

impl MuxInput {
    /// A fixed value.
    pub fn fixed(value: impl Display) -> Self {
        MuxInput::Fixed(value.to_string())
    }

    /// A tracked source.
    pub fn tracked<S>(source: S) -> Self
    where
        S: Source,
        S::Value: Display,
    {
        MuxInput::Tracked(TrackedInput(Rc::new(SourceText(source))))
    }

    fn text(&self) -> String {
        match self {
            MuxInput::Fixed(text) => text.clone(),
            MuxInput::Tracked(dep) => dep.text(),
        }
    }
}

impl From<&str> for MuxInput {
    fn from(value: &str) -> Self {
        MuxInput::Fixed(value.to_string())
    }
}

impl From<String> for MuxInput {
    fn from(value: String) -> Self {
        MuxInput::Fixed(value)
    }
}

impl<T> From<Signal<T>> for MuxInput
where
    T: Clone + PartialEq + Display + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        MuxInput::tracked(signal)
    }
}

impl<T> From<&Signal<T>> for MuxInput
where
    T: Clone + PartialEq + Display + 'static,
{
    fn from(signal: &Signal<T>) -> Self {
        MuxInput::tracked(signal.clone())
    }
}

impl From<Mux> for MuxInput {
    fn from(mux: Mux) -> Self {
        MuxInput::tracked(mux)
    }
}

impl From<&Mux> for MuxInput {
    fn from(mux: &Mux) -> Self {
        MuxInput::tracked(mux.clone())
    }
}

impl Debug for MuxInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxInput::Fixed(text) => f.debug_tuple("Fixed").field(text).finish(),
            MuxInput::Tracked(dep) => f
                .debug_tuple("Tracked")
                .field(&dep.text())
                .finish(),
        }
    }
}

struct MuxInner {
    id: SourceId,
    parts: Vec<String>,
    inputs: Vec<MuxInput>,
    /// Extra triggers, grouped by the `watch` call that added them.
    watched: RefCell<Vec<(HookId, Rc<dyn Dependency>)>>,
    consumers: HookSet<String>,
    /// Connected consumers plus live watches.
    refs: Cell<usize>,
    /// Source subscriptions, present only while active. Watch links carry
    /// the id of their watch.
    links: RefCell<Vec<(Option<HookId>, Disconnect)>>,
    value: RefCell<Option<String>>,
    depth: Cell<u32>,
    stale: Cell<bool>,
    activating: Cell<bool>,
}

impl MuxInner {
    fn compute(&self) -> String {
        let slots = self.parts.len().max(self.inputs.len());
        let mut out = String::new();
        for i in 0..slots {
            if let Some(part) = self.parts.get(i) {
                out.push_str(part);
            }
            if let Some(input) = self.inputs.get(i) {
                out.push_str(&input.text());
            }
        }
        out
    }

    fn is_active(&self) -> bool {
        self.refs.get() > 0
    }

    fn link(self: &Rc<Self>, dep: &dyn Dependency) -> Disconnect {
        let weak: Weak<MuxInner> = Rc::downgrade(self);
        dep.subscribe(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_source_change();
            }
        }))
    }

    fn acquire(self: &Rc<Self>) {
        let refs = self.refs.get() + 1;
        self.refs.set(refs);
        if refs == 1 {
            self.activate();
        }
    }

    fn release(&self) {
        let refs = self.refs.get().saturating_sub(1);
        self.refs.set(refs);
        if refs == 0 {
            self.deactivate();
        }
    }

    fn activate(self: &Rc<Self>) {
        // Subscribing replays each source's current value; those catch-up
        // calls must not trigger a recompute per source.
        self.activating.set(true);
        let mut links = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if let MuxInput::Tracked(TrackedInput(dep)) = input {
                links.push((None, self.link(dep.as_ref())));
            }
        }
        let watched: Vec<_> = self.watched.borrow().clone();
        for (watch, dep) in &watched {
            links.push((Some(*watch), self.link(dep.as_ref())));
        }
        self.activating.set(false);

        debug!(mux = self.id.raw(), links = links.len(), "mux activated");
        *self.links.borrow_mut() = links;
        *self.value.borrow_mut() = Some(self.compute());
        self.stale.set(false);
    }

    fn deactivate(&self) {
        let links: Vec<_> = self.links.borrow_mut().drain(..).collect();
        for (_, link) in &links {
            link.disconnect();
        }
        *self.value.borrow_mut() = None;
        self.stale.set(false);
        debug!(mux = self.id.raw(), "mux deactivated");
    }

    fn unwatch(&self, watch: HookId) {
        self.watched.borrow_mut().retain(|(id, _)| *id != watch);
        let dropped: Vec<Disconnect> = {
            let mut links = self.links.borrow_mut();
            let (dropped, kept): (Vec<_>, Vec<_>) =
                links.drain(..).partition(|(id, _)| *id == Some(watch));
            *links = kept;
            dropped.into_iter().map(|(_, link)| link).collect()
        };
        for link in dropped {
            link.disconnect();
        }
    }

    fn on_source_change(&self) {
        if self.activating.get() || !self.is_active() {
            return;
        }
        if self.depth.get() > 0 {
            self.stale.set(true);
            return;
        }
        self.refresh();
    }

    fn refresh(&self) {
        self.stale.set(false);
        let next = self.compute();
        let changed = self.value.borrow().as_deref() != Some(next.as_str());
        if changed {
            *self.value.borrow_mut() = Some(next.clone());
            self.consumers.run(&next);
        }
    }
}

/// A derived, lazily activated text signal.
///
/// # Example
///
/// ```rust
/// use singui_core::reactive::{mux, Signal};
///
/// let name = Signal::new("world".to_string());
/// let count = Signal::new(3);
/// let greeting = mux(["Hello ", ", you have ", " messages"], [name.clone().into(), count.clone().into()]);
///
/// assert_eq!(greeting.get(), "Hello world, you have 3 messages");
///
/// greeting.batch(|| {
///     name.set("Ada".to_string());
///     count.set(4);
/// });
/// assert_eq!(greeting.get(), "Hello Ada, you have 4 messages");
/// ```
#[derive(Clone)]
pub struct Mux {
    inner: Rc<MuxInner>,
}

/// Build a [`Mux`] from literal parts and interpolated inputs.
///
/// Parts and inputs interleave as `parts[0] inputs[0] parts[1] inputs[1] ...`.
pub fn mux<P, I>(parts: P, inputs: I) -> Mux
where
    P: IntoIterator,
    P::Item: Into<String>,
    I: IntoIterator<Item = MuxInput>,
{
    Mux::new(parts, inputs)
}

impl Mux {
    /// Create a mux. See [`mux`].
    pub fn new<P, I>(parts: P, inputs: I) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        I: IntoIterator<Item = MuxInput>,
    {
        Self {
            inner: Rc::new(MuxInner {
                id: SourceId::new(),
                parts: parts.into_iter().map(Into::into).collect(),
                inputs: inputs.into_iter().collect(),
                watched: RefCell::new(Vec::new()),
                consumers: HookSet::new(),
                refs: Cell::new(0),
                links: RefCell::new(Vec::new()),
                value: RefCell::new(None),
                depth: Cell::new(0),
                stale: Cell::new(false),
                activating: Cell::new(false),
            }),
        }
    }

    /// Get the mux's identity.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Current text. Served from the cache while active, computed otherwise.
    ///
    /// While paused, an active mux keeps returning the text from before the
    /// pause until it resumes.
    pub fn get(&self) -> String {
        if let Some(value) = self.inner.value.borrow().as_ref() {
            return value.clone();
        }
        self.inner.compute()
    }

    /// Subscribe to the text.
    ///
    /// The first consumer activates the mux. The handler runs immediately
    /// with the current text.
    pub fn connect<F>(&self, handler: F) -> Disconnect
    where
        F: Fn(&String) + 'static,
    {
        self.inner.acquire();
        let current = self.get();
        handler(&current);
        let hook = self.inner.consumers.add(handler);

        let weak = Rc::downgrade(&self.inner);
        Disconnect::new(move || {
            hook.disconnect();
            if let Some(inner) = weak.upgrade() {
                inner.release();
            }
        })
    }

    /// Recompute whenever any of `sources` changes, without adding them to
    /// the text.
    ///
    /// A watch also counts as a consumer: it activates the mux and keeps it
    /// active until the returned handle is disconnected.
    pub fn watch<S, I>(&self, sources: I) -> Disconnect
    where
        S: Source,
        I: IntoIterator<Item = S>,
    {
        let watch = HookId::next();
        let added: Vec<Rc<dyn Dependency>> = sources
            .into_iter()
            .map(|s| Rc::new(Trigger(s)) as Rc<dyn Dependency>)
            .collect();

        if self.inner.is_active() {
            self.inner.activating.set(true);
            let links: Vec<_> = added
                .iter()
                .map(|dep| (Some(watch), self.inner.link(dep.as_ref())))
                .collect();
            self.inner.activating.set(false);
            self.inner.links.borrow_mut().extend(links);
        }
        self.inner
            .watched
            .borrow_mut()
            .extend(added.into_iter().map(|dep| (watch, dep)));
        self.inner.acquire();

        let weak = Rc::downgrade(&self.inner);
        Disconnect::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.unwatch(watch);
                inner.release();
            }
        })
    }

    /// Suspend recomputation. Nests.
    pub fn pause(&self) {
        self.inner.depth.set(self.inner.depth.get() + 1);
    }

    /// Undo one `pause`. Reaching depth zero flushes a pending change once.
    pub fn resume(&self) {
        let depth = self.inner.depth.get().saturating_sub(1);
        self.inner.depth.set(depth);
        if depth == 0 && self.inner.stale.get() && self.inner.is_active() {
            self.inner.refresh();
        }
    }

    /// Run `f` paused. The mux resumes even if `f` panics.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = BatchGuard::new(self);
        f()
    }

    /// Current pause depth.
    pub fn pause_depth(&self) -> u32 {
        self.inner.depth.get()
    }

    /// Whether at least one consumer keeps the mux active.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Number of connected consumers plus live watches.
    pub fn consumer_count(&self) -> usize {
        self.inner.refs.get()
    }

    /// Number of live source subscriptions.
    pub fn link_count(&self) -> usize {
        self.inner.links.borrow().len()
    }
}

impl Source for Mux {
    type Value = String;

    fn id(&self) -> SourceId {
        Mux::id(self)
    }

    fn get(&self) -> String {
        Mux::get(self)
    }

    fn connect<F>(&self, handler: F) -> Disconnect
    where
        F: Fn(&String) + 'static,
    {
        Mux::connect(self, handler)
    }
}

impl Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("depth", &self.pause_depth())
            .field("links", &self.link_count())
            .finish()
    }
}

/// Pauses a mux for its lifetime.
pub struct BatchGuard {
    mux: Mux,
}

impl BatchGuard {
    /// Pause `mux` until the guard is dropped.
    pub fn new(mux: &Mux) -> Self {
        mux.pause();
        Self { mux: mux.clone() }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.mux.resume();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&String) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        (seen, move |v: &String| s.borrow_mut().push(v.clone()))
    }

    #[test]
    fn interleaves_parts_and_inputs() {
        let a = Signal::new(1);
        let m = mux(["a=", ", b=", "!"], [a.clone().into(), MuxInput::fixed(2)]);
        assert_eq!(m.get(), "a=1, b=2!");

        a.set(5);
        assert_eq!(m.get(), "a=5, b=2!");
    }

    #[test]
    fn inactive_until_first_consumer() {
        let a = Signal::new(1);
        let m = mux(["", ""], [MuxInput::from(&a)]);

        assert!(!m.is_active());
        assert_eq!(a.subscriber_count(), 0);

        let (seen, handler) = recorder();
        let stop = m.connect(handler);
        assert!(m.is_active());
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(*seen.borrow(), vec!["1"]);

        a.set(2);
        assert_eq!(*seen.borrow(), vec!["1", "2"]);

        stop.disconnect();
        assert!(!m.is_active());
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(m.link_count(), 0);
    }

    #[test]
    fn ref_counted_activation() {
        let a = Signal::new("x".to_string());
        let b = Signal::new(0);
        let m = mux(["<", "|", ">"], [MuxInput::from(&a), MuxInput::from(&b)]);

        let first = m.connect(|_| {});
        let second = m.connect(|_| {});
        assert_eq!(m.consumer_count(), 2);
        assert_eq!(m.link_count(), 2);

        first.disconnect();
        first.disconnect();
        assert!(m.is_active());
        assert_eq!(m.link_count(), 2);

        second.disconnect();
        assert!(!m.is_active());
        assert_eq!(m.link_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);

        a.set("y".to_string());
        b.set(9);
        let (seen, handler) = recorder();
        let _again = m.connect(handler);
        assert_eq!(*seen.borrow(), vec!["<y|9>"]);
    }

    #[test]
    fn unchanged_text_does_not_notify() {
        let a = Signal::new(1);
        let watched = Signal::new(0);
        let m = mux(["", ""], [MuxInput::from(&a)]);
        let (seen, handler) = recorder();
        let _stop = m.connect(handler);
        let _watch = m.watch([watched.clone()]);

        watched.set(1);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn batch_coalesces_notifications() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let m = mux(["", "+", ""], [MuxInput::from(&a), MuxInput::from(&b)]);
        let (seen, handler) = recorder();
        let _stop = m.connect(handler);

        m.pause();
        m.pause();
        a.set(10);
        b.set(20);
        a.set(11);
        assert_eq!(m.get(), "1+2");
        m.resume();
        assert_eq!(seen.borrow().len(), 1);
        m.resume();

        assert_eq!(*seen.borrow(), vec!["1+2", "11+20"]);
        assert_eq!(m.pause_depth(), 0);
    }

    #[test]
    fn batch_resumes_after_panic() {
        let a = Signal::new(1);
        let m = mux(["", ""], [MuxInput::from(&a)]);
        let (seen, handler) = recorder();
        let _stop = m.connect(handler);

        let result = catch_unwind(AssertUnwindSafe(|| {
            m.batch(|| {
                a.set(2);
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert_eq!(m.pause_depth(), 0);
        assert_eq!(*seen.borrow(), vec!["1", "2"]);
    }

    #[test]
    fn watch_triggers_recompute_and_activation() {
        let a = Signal::new(1);
        let tick = Signal::new(0u32);
        let m = mux(["v"], [MuxInput::from(&a)]);

        let unwatch = m.watch([tick.clone()]);
        assert!(m.is_active());
        assert_eq!(tick.subscriber_count(), 1);
        assert_eq!(a.subscriber_count(), 1);

        unwatch.disconnect();
        assert!(!m.is_active());
        assert_eq!(tick.subscriber_count(), 0);
    }

    #[test]
    fn watch_added_while_active_links_immediately() {
        let a = Signal::new(1);
        let tick = Signal::new(0u32);
        let m = mux(["v"], [MuxInput::from(&a)]);
        let _stop = m.connect(|_| {});
        assert_eq!(m.link_count(), 1);

        let unwatch = m.watch([tick.clone()]);
        assert_eq!(m.link_count(), 2);
        assert_eq!(m.consumer_count(), 2);
        unwatch.disconnect();
        assert_eq!(m.consumer_count(), 1);
    }

    #[test]
    fn nested_mux_tracks_inner() {
        let a = Signal::new(1);
        let inner = mux(["(", ")"], [MuxInput::from(&a)]);
        let outer = mux(["[", "]"], [MuxInput::from(&inner)]);
        let (seen, handler) = recorder();
        let stop = outer.connect(handler);
        assert!(inner.is_active());

        a.set(2);
        assert_eq!(*seen.borrow(), vec!["[(1)]", "[(2)]"]);

        stop.disconnect();
        assert!(!inner.is_active());
        assert_eq!(a.subscriber_count(), 0);
    }
}
