mod handler;

pub use handler::{handle_event, Action};
