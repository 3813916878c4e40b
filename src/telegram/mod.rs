pub mod adapter;
pub mod command_parser;
pub mod factory;
pub mod frankenstein_adapter;
pub mod grammers_adapter;
pub mod message;
pub mod tdlib_adapter;
pub mod teloxide_adapter;

pub use adapter::TransportAdapter;
pub use factory::AdapterFactory;
pub use message::{Chat, ChatType, InboundMessage, Kind, User};
