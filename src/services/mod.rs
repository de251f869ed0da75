pub mod chat_resolver;
pub mod chat_store;
pub mod message_service;
pub mod read_receipt_service;
