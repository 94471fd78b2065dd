pub mod discord;
pub mod ui;
pub mod util;
