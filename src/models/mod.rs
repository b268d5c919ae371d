mod principal;
mod resource;
mod role;

pub use principal::*;
pub use resource::*;
pub use role::*;
