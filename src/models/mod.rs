pub mod booking;
pub mod feedback;
pub mod lost_item;
pub mod resource;

pub use booking::*;
pub use feedback::*;
pub use lost_item::*;
pub use resource::*;
