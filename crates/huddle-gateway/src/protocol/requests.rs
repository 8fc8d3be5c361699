//! Client requests
//!
//! One variant per request type. Decoding checks the discriminator first and
//! only then deserializes the payload into the matching DTO.

use huddle_service::dto::{
    ChannelAddRequest, ChannelDeleteRequest, ChannelUpdateRequest, LoginRequest,
    MessageDeleteRequest, MessageSendRequest, MessageUpdateRequest, MessagesRequest,
    ReactionRequest, RegisterRequest, RoleAddRequest, RoleDeleteRequest, RoleUpdateRequest,
    UserListRequest, UserRoleRequest, UserUpdateRequest, UsersRequest,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{EventType, IncomingFrame, ProtocolError};

#[derive(Debug, Clone)]
pub enum Request {
    Login(LoginRequest),
    Register(RegisterRequest),
    Logout,
    Messages(MessagesRequest),
    Users(UsersRequest),
    UserList(UserListRequest),
    MessageSend(MessageSendRequest),
    MessageUpdate(MessageUpdateRequest),
    MessageDelete(MessageDeleteRequest),
    ReactionAdd(ReactionRequest),
    ReactionDelete(ReactionRequest),
    ReactionUsers(ReactionRequest),
    UserUpdate(UserUpdateRequest),
    RoleAdd(RoleAddRequest),
    RoleUpdate(RoleUpdateRequest),
    RoleDelete(RoleDeleteRequest),
    UserRoleAdd(UserRoleRequest),
    UserRoleDelete(UserRoleRequest),
    ChannelAdd(ChannelAddRequest),
    ChannelUpdate(ChannelUpdateRequest),
    ChannelDelete(ChannelDeleteRequest),
    InviteCreate,
}

fn payload<T: DeserializeOwned>(kind: EventType, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

impl Request {
    /// Validate the frame's type, then decode its payload.
    pub fn from_frame(frame: IncomingFrame) -> Result<Self, ProtocolError> {
        let kind = EventType::from_u16(frame.kind).ok_or(ProtocolError::UnknownType(frame.kind))?;
        Self::decode(kind, frame.data)
    }

    pub fn decode(kind: EventType, data: Value) -> Result<Self, ProtocolError> {
        let request = match kind {
            EventType::LoginRequest => Self::Login(payload(kind, data)?),
            EventType::RegisterRequest => Self::Register(payload(kind, data)?),
            EventType::LogoutRequest => Self::Logout,
            EventType::MessagesRequest => Self::Messages(payload(kind, data)?),
            EventType::UsersRequest => Self::Users(payload(kind, data)?),
            EventType::UserListRequest => Self::UserList(payload(kind, data)?),
            EventType::MessageSendRequest => Self::MessageSend(payload(kind, data)?),
            EventType::MessageUpdateRequest => Self::MessageUpdate(payload(kind, data)?),
            EventType::MessageDeleteRequest => Self::MessageDelete(payload(kind, data)?),
            EventType::ReactionAddRequest => Self::ReactionAdd(payload(kind, data)?),
            EventType::ReactionDeleteRequest => Self::ReactionDelete(payload(kind, data)?),
            EventType::ReactionUsersRequest => Self::ReactionUsers(payload(kind, data)?),
            EventType::UserUpdateRequest => Self::UserUpdate(payload(kind, data)?),
            EventType::RoleAddRequest => Self::RoleAdd(payload(kind, data)?),
            EventType::RoleUpdateRequest => Self::RoleUpdate(payload(kind, data)?),
            EventType::RoleDeleteRequest => Self::RoleDelete(payload(kind, data)?),
            EventType::UserRoleAddRequest => Self::UserRoleAdd(payload(kind, data)?),
            EventType::UserRoleDeleteRequest => Self::UserRoleDelete(payload(kind, data)?),
            EventType::ChannelAddRequest => Self::ChannelAdd(payload(kind, data)?),
            EventType::ChannelUpdateRequest => Self::ChannelUpdate(payload(kind, data)?),
            EventType::ChannelDeleteRequest => Self::ChannelDelete(payload(kind, data)?),
            EventType::InviteCreateRequest => Self::InviteCreate,
            other => return Err(ProtocolError::NotARequest(other)),
        };
        Ok(request)
    }

    pub fn kind(&self) -> EventType {
        match self {
            Self::Login(_) => EventType::LoginRequest,
            Self::Register(_) => EventType::RegisterRequest,
            Self::Logout => EventType::LogoutRequest,
            Self::Messages(_) => EventType::MessagesRequest,
            Self::Users(_) => EventType::UsersRequest,
            Self::UserList(_) => EventType::UserListRequest,
            Self::MessageSend(_) => EventType::MessageSendRequest,
            Self::MessageUpdate(_) => EventType::MessageUpdateRequest,
            Self::MessageDelete(_) => EventType::MessageDeleteRequest,
            Self::ReactionAdd(_) => EventType::ReactionAddRequest,
            Self::ReactionDelete(_) => EventType::ReactionDeleteRequest,
            Self::ReactionUsers(_) => EventType::ReactionUsersRequest,
            Self::UserUpdate(_) => EventType::UserUpdateRequest,
            Self::RoleAdd(_) => EventType::RoleAddRequest,
            Self::RoleUpdate(_) => EventType::RoleUpdateRequest,
            Self::RoleDelete(_) => EventType::RoleDeleteRequest,
            Self::UserRoleAdd(_) => EventType::UserRoleAddRequest,
            Self::UserRoleDelete(_) => EventType::UserRoleDeleteRequest,
            Self::ChannelAdd(_) => EventType::ChannelAddRequest,
            Self::ChannelUpdate(_) => EventType::ChannelUpdateRequest,
            Self::ChannelDelete(_) => EventType::ChannelDeleteRequest,
            Self::InviteCreate => EventType::InviteCreateRequest,
        }
    }
}
