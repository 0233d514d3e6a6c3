pub mod backing;
pub mod frame;

pub use backing::Backing;
pub use frame::{adapt, adapt_all, Frame, FrameInput, Meta, MetaValue, NON_FRAME_WARNING};
