mod principals;
mod resources;
mod roles;

pub use principals::*;
pub use resources::*;
pub use roles::*;
