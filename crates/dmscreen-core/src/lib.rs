//! DM Screen Core Library
//!
//! Canvas layout, scene persistence and module content for a tabletop
//! game master's screen.

pub mod config;
pub mod content;
pub mod layout;
pub mod midi;
pub mod module;
pub mod node;
pub mod session;
pub mod snap;
pub mod storage;
pub mod store;
pub mod viewport;

pub use config::{ConfigError, LayoutConfig, ScreenConfig};
pub use layout::{LayoutItem, Resolution, resolve, resolve_placement};
pub use midi::{CommandBus, Dispatch, MidiCommand, MidiMapping, MidiRouter, RouteOutcome};
pub use module::{ModuleConfig, ModuleKind};
pub use node::{Node, NodeData, Scene};
pub use session::{CanvasSession, SessionError};
pub use snap::{GRID_SIZE, SnapResult, snap_point, snap_to_grid};
pub use storage::{FileStorage, MemoryStorage, SceneGateway, Storage, StorageError, WriteQueue};
pub use store::CanvasStore;
pub use viewport::Viewport;
