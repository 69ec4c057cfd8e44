pub mod console;
pub mod cursor;
pub mod dom;
pub mod network;
pub mod truncate;

pub use console::ConsoleFilter;
pub use cursor::{CursorStore, Page};
pub use dom::{select, shape_dom, DomShapeOptions, Selector, ShapedDom};
pub use network::{shape_requests, BodyOptions, NetworkFilter};
pub use truncate::{json_size, truncate_text, truncate_tree, TruncatedText};
