//! Assistant use cases: the two metered actions.

mod diagnose_photo;
mod send_chat_message;

pub use diagnose_photo::{DiagnosePhotoCommand, DiagnosePhotoHandler};
pub use send_chat_message::{SendChatMessageCommand, SendChatMessageHandler};
