//! # weft-tui
//!
//! Retained-mode terminal UI engine.
//!
//! Applications build a tree of widgets inside a [`Ui`] session; the engine
//! owns everything downstream of that: solving layout over the cell grid,
//! compositing the tree into a double-buffered frame, diffing against the
//! previous frame, and flushing only the changed runs to the terminal.
//! Input flows the other way: the backend decodes terminal events, the
//! dispatcher routes keys to the focused widget and mouse events through
//! hit-testing (or to the capture holder mid-drag), and widgets talk to each
//! other through declared signals rather than direct references.
//!
//! ## Architecture
//!
//! ```text
//! input ──▶ dispatch ──▶ widget hooks ──▶ mark_dirty
//!                                            │
//!            layout (measure ▲ / arrange ▼)  ◀┘
//!                     │
//!            compose ──▶ diff ──▶ patches ──▶ backend
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Colors, attributes, cells, integer geometry
//! - [`buffer`] - The cell grid widgets paint into
//! - [`layout`] - Size policies and the two-pass constraint solver
//! - [`widget`] - The [`Widget`] trait and its clipped paint surface
//! - [`compositor`] - Double buffering and minimal-diff patch emission
//! - [`signal`] - Declared, named notifications between widgets
//! - [`session`] - The [`Ui`] object tying it all together
//! - [`terminal`] - The crossterm backend

pub mod buffer;
pub mod compositor;
pub mod error;
pub mod event;
pub mod layout;
pub mod session;
pub mod signal;
pub mod terminal;
mod tree;
pub mod types;
pub mod widget;

// Re-export the everyday surface.
pub use buffer::FrameBuffer;
pub use compositor::{apply_patches, Patch};
pub use error::{Error, Result};
pub use event::{
    Event, EventResult, Key, KeyEvent, KeyState, Modifiers, MouseAction, MouseButton, MouseEvent,
    ScrollDirection,
};
pub use layout::{Align, Constraint, Layout, SizePolicy};
pub use session::Ui;
pub use signal::{Payload, SubscriptionId};
pub use terminal::{Backend, CrosstermBackend};
pub use tree::WidgetId;
pub use types::{Attr, Cell, Edges, Point, Rect, Rgba, Size};
pub use widget::{Pane, Style, Surface, Widget};
