pub mod checkpoint;
pub mod layout;

pub use layout::StateDir;
