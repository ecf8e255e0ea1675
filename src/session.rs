//! The UI session: one context object owning the whole engine state.
//!
//! A [`Ui`] owns the widget arena, focus and mouse-capture state, the signal
//! registry, and the compositor. Everything is explicit fields on the
//! session, not ambient globals, so the engine is testable in isolation and
//! several independent sessions can coexist.
//!
//! The session is single-threaded and cooperative: [`Ui::run`] blocks on the
//! backend for the next event, dispatches it, then runs one
//! layout/compose/diff/flush cycle before waiting again. Widget hooks run to
//! completion without preemption; a blocking hook stalls the loop.

use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::compositor::Compositor;
use crate::error::{Error, Result};
use crate::event::{Event, EventResult, MouseEvent};
use crate::layout::{self, Constraint, Layout};
use crate::signal::{Payload, SignalRegistry, SubscriptionId};
use crate::terminal::Backend;
use crate::tree::{Node, WidgetArena, WidgetId};
use crate::types::{Rect, Size};
use crate::widget::{Style, Widget};

/// One independent UI session.
pub struct Ui {
    arena: WidgetArena,
    root: Option<WidgetId>,
    focused: Option<WidgetId>,
    capture: Option<WidgetId>,
    signals: SignalRegistry,
    compositor: Compositor,
    size: Size,
    /// Subtree roots needing re-layout inside their existing rect.
    dirty_roots: Vec<WidgetId>,
    needs_full_layout: bool,
    needs_frame: bool,
    quit: bool,
}

impl Ui {
    /// Create a session for a terminal of the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            arena: WidgetArena::new(),
            root: None,
            focused: None,
            capture: None,
            signals: SignalRegistry::new(),
            compositor: Compositor::new(width, height),
            size: Size::new(width, height),
            dirty_roots: Vec::new(),
            needs_full_layout: true,
            needs_frame: true,
            quit: false,
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    pub fn focused(&self) -> Option<WidgetId> {
        self.focused
    }

    pub fn captured(&self) -> Option<WidgetId> {
        self.capture
    }

    pub fn is_alive(&self, id: WidgetId) -> bool {
        self.arena.is_alive(id)
    }

    pub fn widget_count(&self) -> usize {
        self.arena.len()
    }

    /// Geometry in the parent's coordinate space.
    pub fn rect(&self, id: WidgetId) -> Result<Rect> {
        Ok(self.arena.get(id)?.rect)
    }

    /// Geometry in absolute terminal coordinates.
    pub fn abs_rect(&self, id: WidgetId) -> Result<Rect> {
        self.arena.abs_rect(id)
    }

    pub fn parent(&self, id: WidgetId) -> Result<Option<WidgetId>> {
        Ok(self.arena.get(id)?.parent)
    }

    pub fn children(&self, id: WidgetId) -> Result<Vec<WidgetId>> {
        Ok(self.arena.get(id)?.children.clone())
    }

    pub fn style(&self, id: WidgetId) -> Result<Style> {
        Ok(self.arena.get(id)?.style)
    }

    /// The frame most recently rendered (for inspection and tests).
    pub fn frame(&self) -> &crate::buffer::FrameBuffer {
        self.compositor.shown()
    }

    // =========================================================================
    // Construction and teardown
    // =========================================================================

    /// Install the root widget. Fails if the session already has one.
    pub fn create_root(&mut self, widget: Box<dyn Widget>, style: Style) -> Result<WidgetId> {
        if self.root.is_some() {
            return Err(Error::RootAlreadySet);
        }
        let id = self.arena.insert(Node::new(widget, style));
        self.root = Some(id);
        self.needs_full_layout = true;
        self.needs_frame = true;
        Ok(id)
    }

    /// Create a widget attached under `parent`, last in paint order.
    pub fn create(
        &mut self,
        parent: WidgetId,
        widget: Box<dyn Widget>,
        style: Style,
    ) -> Result<WidgetId> {
        self.arena.get(parent)?;
        let id = self.arena.insert(Node::new(widget, style));
        self.arena.get_mut(id)?.parent = Some(parent);
        self.arena.get_mut(parent)?.children.push(id);
        self.mark_dirty(parent)?;
        Ok(id)
    }

    /// Attach a detached widget under a new parent, last in paint order.
    pub fn attach(&mut self, child: WidgetId, parent: WidgetId) -> Result<()> {
        self.arena.get(parent)?;
        if self.arena.get(child)?.parent.is_some() {
            return Err(Error::WouldCycle(child));
        }
        if self.arena.is_same_or_ancestor(child, parent) {
            return Err(Error::WouldCycle(child));
        }
        self.arena.get_mut(child)?.parent = Some(parent);
        self.arena.get_mut(parent)?.children.push(child);
        self.mark_dirty(parent)
    }

    /// Detach a widget from its parent. The subtree stays alive but is no
    /// longer laid out, painted, or hit-tested until reattached.
    pub fn detach(&mut self, child: WidgetId) -> Result<()> {
        let parent = self.arena.get(child)?.parent;
        if let Some(parent) = parent {
            self.arena.get_mut(parent)?.children.retain(|&c| c != child);
            self.arena.get_mut(child)?.parent = None;
            self.mark_dirty(parent)?;
        }
        Ok(())
    }

    /// Destroy a widget and its whole subtree.
    ///
    /// Detaches from the parent, tears the subtree down post-order, clears
    /// focus/capture if they pointed inside, and removes every signal
    /// declaration and subscription touching a destroyed widget. Destroying
    /// an already-dead handle fails fast.
    pub fn destroy(&mut self, id: WidgetId) -> Result<()> {
        self.arena.get(id)?;
        self.detach(id)?;

        let mut order = Vec::new();
        self.arena.collect_post_order(id, &mut order);
        for w in order {
            if self.focused == Some(w) {
                self.focused = None;
            }
            if self.capture == Some(w) {
                self.capture = None;
            }
            self.signals.remove_widget(w);
            self.arena.remove(w)?;
            if self.root == Some(w) {
                self.root = None;
            }
        }
        self.needs_frame = true;
        debug!(?id, "destroyed widget subtree");
        Ok(())
    }

    // =========================================================================
    // Geometry API
    // =========================================================================

    pub fn set_constraint(&mut self, id: WidgetId, constraint: Constraint) -> Result<()> {
        self.arena.get_mut(id)?.constraint = constraint;
        self.mark_geometry_dirty(id)
    }

    pub fn set_layout(&mut self, id: WidgetId, layout: Layout) -> Result<()> {
        self.arena.get_mut(id)?.layout = layout;
        self.mark_dirty(id)
    }

    pub fn set_style(&mut self, id: WidgetId, style: Style) -> Result<()> {
        self.arena.get_mut(id)?.style = style;
        self.mark_dirty(id)
    }

    pub fn set_visible(&mut self, id: WidgetId, visible: bool) -> Result<()> {
        self.arena.get_mut(id)?.visible = visible;
        self.mark_geometry_dirty(id)
    }

    pub fn set_enabled(&mut self, id: WidgetId, enabled: bool) -> Result<()> {
        self.arena.get_mut(id)?.enabled = enabled;
        self.needs_frame = true;
        Ok(())
    }

    /// Assign geometry directly; meaningful under `Layout::Manual` (any other
    /// container will overwrite it on the next pass).
    pub fn set_rect(&mut self, id: WidgetId, rect: Rect) -> Result<()> {
        self.arena.get_mut(id)?.rect = rect;
        let parent = self.arena.get(id)?.parent;
        match parent {
            Some(parent) => self.mark_dirty(parent),
            None => self.mark_dirty(id),
        }
    }

    /// Mark a widget as needing re-layout and re-paint.
    ///
    /// Dirt propagates upward through every ancestor whose size depends on
    /// its content (`FitContent`), because their geometry may shift too; the
    /// highest such node becomes the re-layout root for the next cycle.
    pub fn mark_dirty(&mut self, id: WidgetId) -> Result<()> {
        self.arena.get_mut(id)?.dirty = true;

        let mut target = id;
        loop {
            let node = self.arena.get(target)?;
            if !node.constraint.depends_on_children() {
                break;
            }
            match node.parent {
                Some(parent) => {
                    self.arena.get_mut(parent)?.dirty = true;
                    target = parent;
                }
                None => break,
            }
        }

        if Some(target) == self.root || self.arena.get(target)?.parent.is_none() {
            self.needs_full_layout = true;
        } else {
            self.dirty_roots.push(target);
        }
        self.needs_frame = true;
        Ok(())
    }

    /// Dirty a widget whose size within its parent may have changed
    /// (constraint or visibility change): the parent must redistribute its
    /// slots, so propagation starts one level up.
    fn mark_geometry_dirty(&mut self, id: WidgetId) -> Result<()> {
        self.arena.get_mut(id)?.dirty = true;
        match self.arena.get(id)?.parent {
            Some(parent) => self.mark_dirty(parent),
            None => {
                self.needs_full_layout = true;
                self.needs_frame = true;
                Ok(())
            }
        }
    }

    // =========================================================================
    // Focus
    // =========================================================================

    /// Move keyboard focus. `None` clears it.
    ///
    /// The previous holder is notified of focus loss strictly before the new
    /// holder hears of the gain; at most one widget is focused at any instant.
    pub fn set_focus(&mut self, target: Option<WidgetId>) -> Result<()> {
        if let Some(t) = target {
            self.arena.get(t)?;
        }
        if self.focused == target {
            return Ok(());
        }

        if let Some(old) = self.focused.take() {
            if self.arena.is_alive(old) {
                let _ = self.with_widget(old, |ui, w| w.on_focus(ui, old, false));
            }
        }
        self.focused = target;
        if let Some(new) = target {
            let _ = self.with_widget(new, |ui, w| w.on_focus(ui, new, true));
        }
        self.needs_frame = true;
        Ok(())
    }

    /// Focus the next focusable widget in tree order, wrapping around.
    pub fn focus_next(&mut self) -> Result<()> {
        self.cycle_focus(true)
    }

    /// Focus the previous focusable widget in tree order, wrapping around.
    pub fn focus_previous(&mut self) -> Result<()> {
        self.cycle_focus(false)
    }

    fn cycle_focus(&mut self, forward: bool) -> Result<()> {
        let order = self.focusable_in_order();
        if order.is_empty() {
            return Ok(());
        }
        let next = match self.focused.and_then(|f| order.iter().position(|&w| w == f)) {
            Some(i) => {
                let len = order.len();
                if forward {
                    order[(i + 1) % len]
                } else {
                    order[(i + len - 1) % len]
                }
            }
            None => {
                if forward {
                    order[0]
                } else {
                    order[order.len() - 1]
                }
            }
        };
        self.set_focus(Some(next))
    }

    /// Visible, enabled, focusable widgets in depth-first paint order.
    fn focusable_in_order(&self) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut stack: Vec<WidgetId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            if let Ok(node) = self.arena.get(id) {
                if !node.visible || !node.enabled {
                    continue;
                }
                if node.widget.as_ref().map_or(false, |w| w.focusable()) {
                    out.push(id);
                }
                // Reverse so the stack pops children in document order.
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Declare a named signal on a widget; required before subscribe/emit.
    pub fn declare_signal(&mut self, source: WidgetId, name: &str) -> Result<()> {
        self.arena.get(source)?;
        self.signals.declare(source, name);
        Ok(())
    }

    /// Subscribe application code to a signal.
    pub fn subscribe(
        &mut self,
        source: WidgetId,
        name: &str,
        callback: impl Fn(&mut Ui, &Payload) + 'static,
    ) -> Result<SubscriptionId> {
        self.arena.get(source)?;
        self.signals.subscribe(source, name, None, Rc::new(callback))
    }

    /// Subscribe on behalf of a widget: the subscription dies with either
    /// the source or the listener.
    pub fn subscribe_widget(
        &mut self,
        source: WidgetId,
        name: &str,
        listener: WidgetId,
        callback: impl Fn(&mut Ui, &Payload) + 'static,
    ) -> Result<SubscriptionId> {
        self.arena.get(source)?;
        self.arena.get(listener)?;
        self.signals
            .subscribe(source, name, Some(listener), Rc::new(callback))
    }

    /// Remove one subscription; returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(id)
    }

    /// Emit a signal: every subscribed callback runs synchronously, in
    /// subscription order, on this call stack. The list is snapshotted
    /// first, so callbacks may subscribe/unsubscribe (or destroy the source)
    /// without affecting this emission pass.
    pub fn emit(&mut self, source: WidgetId, name: &str, payload: Payload) -> Result<()> {
        self.arena.get(source)?;
        if !self.signals.is_declared(source, name) {
            return Err(Error::UndeclaredSignal {
                id: source,
                name: name.to_string(),
            });
        }
        for callback in self.signals.snapshot(source, name) {
            callback(self, &payload);
        }
        Ok(())
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    /// Route one raw input event per the dispatch semantics:
    /// keys to the focused widget (dropped when none), mouse to the capture
    /// holder or the hit-tested widget, resize to the root.
    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::Resize(width, height) => {
                self.size = Size::new(width, height);
                self.compositor.resize(width, height);
                self.needs_full_layout = true;
                self.needs_frame = true;
                if let Some(root) = self.root {
                    let _ = self.with_widget(root, |ui, w| w.handle_event(ui, root, &event));
                }
            }
            Event::Key(_) => {
                let Some(focused) = self.focused else {
                    trace!("key event dropped: no focus");
                    return;
                };
                if !self.arena.is_alive(focused) {
                    self.focused = None;
                    return;
                }
                self.deliver_bubbling(focused, &event);
            }
            Event::Mouse(mouse) => self.dispatch_mouse(mouse, &event),
            Event::Tick => {}
        }
    }

    fn dispatch_mouse(&mut self, mouse: MouseEvent, event: &Event) {
        // Capture wins over hit-testing until the matching release.
        if let Some(captured) = self.capture {
            if !self.arena.is_alive(captured) {
                self.capture = None;
            } else {
                trace!(?captured, "mouse routed to capture holder");
                let _ = self.with_widget(captured, |ui, w| w.handle_event(ui, captured, event));
                if mouse.is_release() {
                    self.capture = None;
                }
                return;
            }
        }

        let Some(target) = self.hit_test(mouse.x, mouse.y) else {
            return;
        };
        let consumer = self.deliver_bubbling(target, event);
        if mouse.is_press() {
            self.capture = consumer;
        }
    }

    /// Deliver to `start`, bubbling through ancestors until consumed.
    /// Disabled widgets are skipped. Returns the consumer, if any.
    fn deliver_bubbling(&mut self, start: WidgetId, event: &Event) -> Option<WidgetId> {
        let mut cursor = Some(start);
        while let Some(cur) = cursor {
            // Resolve the parent first: the handler may destroy `cur`.
            let (parent, enabled) = match self.arena.get(cur) {
                Ok(node) => (node.parent, node.enabled),
                Err(_) => break,
            };
            if enabled {
                let ev = *event;
                if let Ok(EventResult::Consumed) =
                    self.with_widget(cur, move |ui, w| w.handle_event(ui, cur, &ev))
                {
                    trace!(?cur, "event consumed");
                    return Some(cur);
                }
            }
            cursor = parent;
        }
        trace!("event unconsumed, discarded");
        None
    }

    /// Find the widget under a point: descend from the root, at each level
    /// picking the topmost (last in paint order) visible child containing
    /// the point, stopping at a leaf or a mouse sink.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<WidgetId> {
        let root = self.root?;
        let node = self.arena.get(root).ok()?;
        if !node.visible || !node.rect.contains(x, y) {
            return None;
        }

        let mut cur = root;
        let mut origin = node.rect.origin();
        loop {
            let node = self.arena.get(cur).ok()?;
            if node.widget.as_ref().map_or(false, |w| w.mouse_sink()) {
                return Some(cur);
            }
            let hit_child = node.children.iter().rev().copied().find(|&child| {
                self.arena.get(child).map_or(false, |c| {
                    c.visible && c.rect.translated(origin).contains(x, y)
                })
            });
            match hit_child {
                Some(child) => {
                    let child_rect = self.arena.get(child).ok()?.rect;
                    origin = child_rect.translated(origin).origin();
                    cur = child;
                }
                None => return Some(cur),
            }
        }
    }

    // =========================================================================
    // Frame production
    // =========================================================================

    /// Run the pending layout work: either a full solve from the root or a
    /// re-arrange of each dirty subtree inside its existing rect.
    pub fn layout(&mut self) -> Result<()> {
        if self.needs_full_layout {
            if let Some(root) = self.root {
                layout::solve_root(&mut self.arena, root, Rect::from_size(self.size))?;
            }
            self.dirty_roots.clear();
            self.needs_full_layout = false;
            return Ok(());
        }

        for id in std::mem::take(&mut self.dirty_roots) {
            if !self.arena.is_alive(id) {
                continue;
            }
            // Already handled as part of an earlier subtree this cycle.
            if !self.arena.get(id)?.dirty {
                continue;
            }
            layout::solve_subtree(&mut self.arena, id)?;
        }
        Ok(())
    }

    /// One layout + compose + diff + flush cycle.
    pub fn render<B: Backend>(&mut self, backend: &mut B) -> Result<()> {
        if !self.needs_frame {
            return Ok(());
        }
        self.layout()?;
        self.compositor.compose(&self.arena, self.root);
        let patches = self.compositor.diff_and_swap();
        if !patches.is_empty() {
            backend.apply(&patches)?;
            backend.present()?;
        }
        self.needs_frame = false;
        Ok(())
    }

    /// Compose a frame without a backend (tests, headless use).
    pub fn render_headless(&mut self) -> Result<Vec<crate::compositor::Patch>> {
        self.layout()?;
        self.compositor.compose(&self.arena, self.root);
        let patches = self.compositor.diff_and_swap();
        self.needs_frame = false;
        Ok(patches)
    }

    /// Ask the loop to stop after the current iteration.
    pub fn quit(&mut self) {
        self.quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Blocking read/dispatch/render loop.
    ///
    /// Adopts the backend's size first, then alternates between waiting for
    /// input (or a `tick` timeout) and producing one frame. Terminates when
    /// [`Ui::quit`] has been called; in-flight callbacks finish, the next
    /// iteration is skipped. Backend I/O errors are fatal and propagate.
    pub fn run<B: Backend>(&mut self, backend: &mut B, tick: Option<Duration>) -> Result<()> {
        let (width, height) = backend.size()?;
        self.dispatch(Event::Resize(width, height));
        self.render(backend)?;

        while !self.quit {
            match backend.read_event(tick)? {
                Some(event) => self.dispatch(event),
                None => self.dispatch(Event::Tick),
            }
            if self.quit {
                break;
            }
            self.render(backend)?;
        }
        Ok(())
    }

    // =========================================================================
    // Hook plumbing
    // =========================================================================

    /// Run a closure against a widget's behavior object with the session
    /// borrowed alongside it.
    ///
    /// The box is taken out of the arena for the duration, so the hook can
    /// freely mutate the session (including destroying its own widget: the
    /// box is simply dropped afterwards instead of being put back).
    fn with_widget<R>(
        &mut self,
        id: WidgetId,
        f: impl FnOnce(&mut Ui, &mut dyn Widget) -> R,
    ) -> Result<R> {
        let mut widget = {
            let node = self.arena.get_mut(id)?;
            node.widget.take().ok_or(Error::HookReentered(id))?
        };
        let out = f(self, widget.as_mut());
        if let Ok(node) = self.arena.get_mut(id) {
            node.widget = Some(widget);
        }
        Ok(out)
    }
}

// =============================================================================
// Tests
// =============================================================================
