pub mod render;
pub mod text;

pub use render::{FrameStats, SkiaRenderer};
pub use text::{load_font, load_font_from, render_text_block, render_text_pixmap};
