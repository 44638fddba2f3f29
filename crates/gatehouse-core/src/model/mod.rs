mod alert;
mod checkin;
mod member;
mod sync;

pub use alert::*;
pub use checkin::*;
pub use member::*;
pub use sync::*;
