pub mod announcements;
pub mod events;
pub mod root;
