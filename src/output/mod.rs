mod render;
mod store;

pub use render::{assemble, render};
pub use store::{load_map, FileMapStore, MapStore, StoredMap};
