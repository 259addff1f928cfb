//! Everything that reads or writes lopdf objects.

pub mod background;
pub mod compositor;
pub mod content;
pub mod document;
pub mod fonts;
pub mod resources;
pub mod source;

pub use background::{render_background, BackgroundStats, RenderedBackground, TextCanvas};
pub use compositor::{compose_pages, placement_transform, BackgroundPage};
pub use fonts::StandardFont;
pub use source::{PageBox, SourceDocument};
