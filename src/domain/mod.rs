pub mod announcement;
pub mod department;

pub use announcement::*;
pub use department::*;
