pub mod assessment;
pub mod conversation;
pub mod enums;
pub mod patient;

pub use assessment::*;
pub use conversation::*;
pub use enums::*;
pub use patient::*;
