pub mod message;
pub mod request;
pub mod response;
pub mod web;

pub use message::{Message, NotificationLevel};
pub use request::Request;
pub use response::{Response, ResponseBody};
