//! Error taxonomy for the engine.
//!
//! Three families, handled differently by callers:
//! - configuration errors (`LayoutDepthExceeded`, `InvalidGeometry`) are
//!   reported synchronously and the affected widget falls back to zero size;
//! - programming errors (`DeadWidget`, `UndeclaredSignal`, `RootAlreadySet`,
//!   `WouldCycle`, `HookReentered`) fail fast at the point of misuse;
//! - environment errors (`Io`) end the render loop after teardown.

use crate::tree::WidgetId;

/// Engine-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The layout solver exceeded its recursion bound, which indicates a
    /// cyclic size dependency or a pathologically deep tree.
    #[error("layout recursion exceeded depth {limit} at widget {id:?}")]
    LayoutDepthExceeded { id: WidgetId, limit: usize },

    /// A geometry request the layout engine cannot honor.
    #[error("invalid geometry for widget {id:?}: {reason}")]
    InvalidGeometry { id: WidgetId, reason: String },

    /// A stale or already-destroyed widget handle was used.
    #[error("widget {0:?} is not alive")]
    DeadWidget(WidgetId),

    /// A signal was subscribed to or emitted before being declared.
    #[error("signal {name:?} is not declared on widget {id:?}")]
    UndeclaredSignal { id: WidgetId, name: String },

    /// The session already has a root widget.
    #[error("session already has a root widget")]
    RootAlreadySet,

    /// Attaching would make a widget its own ancestor.
    #[error("attaching widget {0:?} would create a cycle")]
    WouldCycle(WidgetId),

    /// A widget hook re-entered itself (e.g. an event handler dispatched an
    /// event back into the widget currently handling one).
    #[error("widget {0:?} hook re-entered")]
    HookReentered(WidgetId),

    /// Terminal I/O failure; fatal to the render loop.
    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
