pub mod calls;
pub mod categories;
pub mod directory;
pub mod health;
pub mod jobs;
pub mod tickets;
