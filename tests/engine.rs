//! End-to-end engine tests driving the public API: build a tree in a `Ui`,
//! feed scripted events through a fake backend, and check the frames and
//! patches that come out.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use weft_tui::{
    apply_patches, Align, Backend, Cell, Constraint, Event, EventResult, FrameBuffer, Key,
    KeyEvent, Layout, MouseAction, MouseButton, MouseEvent, Pane, Patch, Rect, Result, Rgba, Size,
    Style, Surface, Ui, Widget, WidgetId,
};

// =============================================================================
// Test backend
// =============================================================================

/// Backend fed from a fixed event script; records everything applied.
struct TestBackend {
    size: (u16, u16),
    events: VecDeque<Event>,
    applied: Vec<Patch>,
    presents: usize,
}

impl TestBackend {
    fn new(width: u16, height: u16, script: Vec<Event>) -> Self {
        Self {
            size: (width, height),
            events: script.into(),
            applied: Vec::new(),
            presents: 0,
        }
    }
}

impl Backend for TestBackend {
    fn size(&self) -> Result<(u16, u16)> {
        Ok(self.size)
    }

    fn read_event(&mut self, _timeout: Option<Duration>) -> Result<Option<Event>> {
        Ok(self.events.pop_front())
    }

    fn apply(&mut self, patches: &[Patch]) -> Result<()> {
        self.applied.extend_from_slice(patches);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.presents += 1;
        Ok(())
    }
}

// =============================================================================
// Test widgets
// =============================================================================

/// Fills its whole rect with one glyph.
struct Fill(char);

impl Widget for Fill {
    fn paint(&self, surface: &mut Surface<'_>) -> Result<()> {
        surface.clear();
        let size = surface.size();
        for y in 0..size.height {
            for x in 0..size.width {
                let style = surface.style();
                surface.set(x, y, Cell::new(self.0, style.fg, style.bg));
            }
        }
        Ok(())
    }
}

/// Quits the session when it sees `q`, consumes everything else.
struct Quitter;

impl Widget for Quitter {
    fn handle_event(&mut self, ui: &mut Ui, _id: WidgetId, event: &Event) -> EventResult {
        if let Event::Key(KeyEvent { key: Key::Char('q'), .. }) = event {
            ui.quit();
        }
        EventResult::Consumed
    }

    fn focusable(&self) -> bool {
        true
    }
}

/// One line of text with a fixed intrinsic size.
struct Label(&'static str);

impl Widget for Label {
    fn measure(&self, style: &Style) -> Size {
        let width = unicode_width::UnicodeWidthStr::width(self.0) as u16;
        let pad = style.padding;
        Size::new(
            width + pad.left + pad.right,
            1 + pad.top + pad.bottom,
        )
    }

    fn paint(&self, surface: &mut Surface<'_>) -> Result<()> {
        surface.clear();
        surface.print_styled(0, 0, self.0);
        Ok(())
    }
}

fn press(key: Key) -> Event {
    Event::Key(KeyEvent::press(key))
}

fn click(x: u16, y: u16) -> Event {
    Event::Mouse(MouseEvent::new(MouseAction::Down(MouseButton::Left), x, y))
}

// =============================================================================
// Layout through the public API
// =============================================================================

#[test]
fn test_fixed_plus_fill_row_split() {
    let mut ui = Ui::new(80, 24);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    ui.set_layout(root, Layout::Row).unwrap();
    let sidebar = ui.create(root, Box::new(Pane), Style::default()).unwrap();
    ui.set_constraint(sidebar, Constraint::fixed_width(10)).unwrap();
    let content = ui.create(root, Box::new(Pane), Style::default()).unwrap();
    ui.set_constraint(content, Constraint::fill()).unwrap();

    ui.render_headless().unwrap();

    assert_eq!(ui.rect(sidebar).unwrap(), Rect::new(0, 0, 10, 24));
    assert_eq!(ui.rect(content).unwrap(), Rect::new(10, 0, 70, 24));
}

#[test]
fn test_children_stay_inside_parent_content_rect() {
    let mut ui = Ui::new(40, 12);
    let mut style = Style::default();
    style.padding = weft_tui::Edges::uniform(2);
    let root = ui.create_root(Box::new(Pane), style).unwrap();

    // More fixed height than fits; everything must still be contained.
    let mut children = Vec::new();
    for _ in 0..5 {
        let c = ui.create(root, Box::new(Pane), Style::default()).unwrap();
        ui.set_constraint(c, Constraint::fixed_height(4)).unwrap();
        children.push(c);
    }
    ui.render_headless().unwrap();

    let content = Rect::new(2, 2, 36, 8);
    for c in children {
        let r = ui.abs_rect(c).unwrap();
        assert!(
            r.width == 0 && r.height == 0 || content.intersect(&r) == Some(r),
            "child rect {r:?} escapes parent content {content:?}"
        );
    }
}

#[test]
fn test_fit_content_label_with_alignment() {
    let mut ui = Ui::new(20, 5);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    ui.set_layout(root, Layout::Overlay).unwrap();
    let label = ui.create(root, Box::new(Label("hi")), Style::default()).unwrap();
    ui.set_constraint(
        label,
        Constraint::fit_content().with_halign(Align::Center).with_valign(Align::Center),
    )
    .unwrap();

    ui.render_headless().unwrap();

    assert_eq!(ui.rect(label).unwrap(), Rect::new(9, 2, 2, 1));
    assert_eq!(ui.frame().get(9, 2).unwrap().ch, 'h');
    assert_eq!(ui.frame().get(10, 2).unwrap().ch, 'i');
}

#[test]
fn test_incremental_relayout_matches_full_recompute() {
    let mut ui = Ui::new(60, 20);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    ui.set_layout(root, Layout::Row).unwrap();
    let left = ui.create(root, Box::new(Pane), Style::default()).unwrap();
    ui.set_constraint(left, Constraint::fixed_width(20)).unwrap();
    let top = ui.create(left, Box::new(Fill('a')), Style::default()).unwrap();
    let bottom = ui.create(left, Box::new(Fill('b')), Style::default()).unwrap();
    ui.set_constraint(bottom, Constraint::fixed_height(3)).unwrap();
    let right = ui.create(root, Box::new(Fill('r')), Style::default()).unwrap();
    ui.render_headless().unwrap();

    // Mutate deep in the tree; only the affected subtree is re-solved.
    ui.set_constraint(bottom, Constraint::fixed_height(6)).unwrap();
    ui.render_headless().unwrap();
    let incremental: Vec<Rect> = [root, left, top, bottom, right]
        .iter()
        .map(|&w| ui.abs_rect(w).unwrap())
        .collect();
    let incremental_frame = ui.frame().clone();
    assert_eq!(ui.abs_rect(bottom).unwrap(), Rect::new(0, 14, 20, 6));

    // A full solve from the root must land on identical geometry and pixels.
    ui.dispatch(Event::Resize(60, 20));
    ui.render_headless().unwrap();
    let full: Vec<Rect> = [root, left, top, bottom, right]
        .iter()
        .map(|&w| ui.abs_rect(w).unwrap())
        .collect();
    assert_eq!(incremental, full);
    assert_eq!(&incremental_frame, ui.frame());
}

// =============================================================================
// Diff semantics
// =============================================================================

#[test]
fn test_patches_reconstruct_every_frame() {
    let mut ui = Ui::new(30, 8);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    ui.set_layout(root, Layout::Manual).unwrap();
    let moving = ui
        .create(root, Box::new(Fill('#')), Style::with_bg(Rgba::BLUE))
        .unwrap();

    let mut shadow = FrameBuffer::new(30, 8);
    for step in 0..6u16 {
        ui.set_rect(moving, Rect::new(step * 3, step, 5, 2)).unwrap();
        let patches = ui.render_headless().unwrap();
        apply_patches(&mut shadow, &patches);
        assert_eq!(&shadow, ui.frame(), "shadow diverged at step {step}");
    }
}

#[test]
fn test_idle_frame_produces_no_patches() {
    let mut ui = Ui::new(30, 8);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    let _child = ui.create(root, Box::new(Fill('.')), Style::default()).unwrap();

    assert!(!ui.render_headless().unwrap().is_empty());
    // Nothing changed; compose again and the diff must be empty.
    ui.dispatch(Event::Tick);
    assert!(ui.render_headless().unwrap().is_empty());
}

#[test]
fn test_resize_repaints_every_row() {
    let mut ui = Ui::new(80, 24);
    ui.create_root(Box::new(Fill('.')), Style::default()).unwrap();
    ui.render_headless().unwrap();

    ui.dispatch(Event::Resize(100, 24));
    let patches = ui.render_headless().unwrap();

    let mut rows: Vec<u16> = patches.iter().map(|p| p.row).collect();
    rows.sort_unstable();
    rows.dedup();
    assert_eq!(rows, (0..24).collect::<Vec<_>>());
    assert!(patches.iter().all(|p| p.col == 0 && p.cells.len() == 100));
}

#[test]
fn test_wide_glyphs_occupy_two_columns() {
    let mut ui = Ui::new(10, 2);
    ui.create_root(Box::new(Label("日本")), Style::default()).unwrap();
    ui.render_headless().unwrap();

    let frame = ui.frame();
    assert_eq!(frame.get(0, 0).unwrap().ch, '日');
    assert!(frame.get(1, 0).unwrap().is_continuation());
    assert_eq!(frame.get(2, 0).unwrap().ch, '本');
    assert!(frame.get(3, 0).unwrap().is_continuation());
}

// =============================================================================
// Full loop with a scripted backend
// =============================================================================

#[test]
fn test_run_loop_dispatches_and_quits() {
    let mut ui = Ui::new(1, 1);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    let quitter = ui.create(root, Box::new(Quitter), Style::default()).unwrap();
    ui.set_focus(Some(quitter)).unwrap();

    let mut backend = TestBackend::new(
        40,
        10,
        vec![press(Key::Char('x')), press(Key::Char('q'))],
    );
    ui.run(&mut backend, None).unwrap();

    assert!(ui.should_quit());
    assert_eq!(ui.size(), Size::new(40, 10));
    // The initial frame was flushed; its first row spans the backend width.
    assert!(backend.presents >= 1);
    let first = &backend.applied[0];
    assert_eq!((first.row, first.col, first.cells.len()), (0, 0, 40));
}

#[test]
fn test_click_through_layout_reaches_widget() {
    let clicks = Rc::new(RefCell::new(Vec::new()));

    struct ClickLogger(Rc<RefCell<Vec<(u16, u16)>>>);
    impl Widget for ClickLogger {
        fn handle_event(&mut self, _ui: &mut Ui, _id: WidgetId, event: &Event) -> EventResult {
            if let Event::Mouse(m) = event {
                if m.is_press() {
                    self.0.borrow_mut().push((m.x, m.y));
                    return EventResult::Consumed;
                }
            }
            EventResult::Ignored
        }
    }

    let mut ui = Ui::new(80, 24);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    ui.set_layout(root, Layout::Row).unwrap();
    let sidebar = ui
        .create(root, Box::new(ClickLogger(Rc::clone(&clicks))), Style::default())
        .unwrap();
    ui.set_constraint(sidebar, Constraint::fixed_width(10)).unwrap();
    let content = ui.create(root, Box::new(Pane), Style::default()).unwrap();
    ui.set_constraint(content, Constraint::fill()).unwrap();
    ui.render_headless().unwrap();

    // Inside the sidebar: logged and capture taken.
    ui.dispatch(click(4, 6));
    assert_eq!(*clicks.borrow(), vec![(4, 6)]);
    assert_eq!(ui.captured(), Some(sidebar));

    ui.dispatch(Event::Mouse(MouseEvent::new(
        MouseAction::Up(MouseButton::Left),
        4,
        6,
    )));
    assert_eq!(ui.captured(), None);

    // In the content pane: nothing consumes it.
    ui.dispatch(click(50, 6));
    assert_eq!(clicks.borrow().len(), 1);
}

#[test]
fn test_signal_bridges_widgets() {
    let mut ui = Ui::new(20, 5);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    let button = ui.create(root, Box::new(Pane), Style::default()).unwrap();
    let counter = ui.create(root, Box::new(Pane), Style::default()).unwrap();

    ui.declare_signal(button, "clicked").unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ui.subscribe_widget(button, "clicked", counter, move |_, payload| {
        sink.borrow_mut().push(payload.clone());
    })
    .unwrap();

    ui.emit(button, "clicked", weft_tui::Payload::Int(1)).unwrap();
    ui.emit(button, "clicked", weft_tui::Payload::Int(2)).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![weft_tui::Payload::Int(1), weft_tui::Payload::Int(2)]
    );

    // Destroying the listener severs the wire.
    ui.destroy(counter).unwrap();
    ui.emit(button, "clicked", weft_tui::Payload::Int(3)).unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn test_hidden_widget_leaves_no_trace() {
    let mut ui = Ui::new(12, 3);
    let root = ui.create_root(Box::new(Pane), Style::default()).unwrap();
    let child = ui
        .create(root, Box::new(Fill('#')), Style::default())
        .unwrap();
    ui.render_headless().unwrap();
    assert_eq!(ui.frame().get(0, 0).unwrap().ch, '#');

    ui.set_visible(child, false).unwrap();
    ui.render_headless().unwrap();
    assert_eq!(ui.frame().get(0, 0).unwrap().ch, ' ');
    // And it no longer hit-tests.
    assert_eq!(ui.hit_test(0, 0), Some(root));
}
