//! Database row models

mod channel;
mod message;
mod role;
mod settings;
mod user;

pub use channel::{ChannelModel, OverwriteModel};
pub use message::{AttachmentModel, EmbedModel, MessageModel, ReactionModel};
pub use role::RoleModel;
pub use settings::SettingsModel;
pub use user::{CredentialsModel, UserModel};
