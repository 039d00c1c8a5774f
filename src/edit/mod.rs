//! Spatial edit predicates, the editor protocol, and the edit pipeline

pub mod editor;
pub mod protocol;
pub mod aabb;
pub mod sphere;
pub mod session;
pub mod pipeline;

pub use editor::{EditAction, EditMode, VbrVoxelEditor, VoxelEditor};
pub use protocol::{EditorProtocol, StatelessEdit, VbrEdit};
pub use aabb::BoxBrush;
pub use sphere::SphereBrush;
pub use session::BrushSettings;
pub use pipeline::{EditPipeline, EditResult, SlotState};
