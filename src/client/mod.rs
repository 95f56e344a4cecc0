mod api;
mod inbox;

pub use api::{Api, ClientError, ClientResult};
pub use inbox::{Inbox, LocalMessage};
