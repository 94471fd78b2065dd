pub mod dispatch;
pub mod events;
pub mod selector;

pub use dispatch::{ReplySink, Router};
pub use events::{EventContext, InboundEvent};
pub use selector::{ChatGateway, SelectorManager};
