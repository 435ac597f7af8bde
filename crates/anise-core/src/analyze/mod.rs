pub mod boxing;
pub mod expr;
pub mod frame;
pub mod processor;

pub use expr::{Expr, ExprPosition};
pub use frame::{FrameArena, FrameId, FrameKind};
pub use processor::{Analysis, Processor, MAX_PARAMS};
