//! Dispatcher
//!
//! Orchestrates the real-time core: authenticates connections, authorizes
//! join/send operations against the membership store, writes through the
//! chat service, and fans persisted messages out to rooms.
//!
//! Per-connection lifecycle: `Connecting -> Authenticated -> Active ->
//! Closed`. The handler drives the first transition; everything here
//! requires an Active connection. Only authentication failures are fatal
//! to a connection; every other failure is reported back as an `error`
//! frame and the connection survives.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::ChatService;
use crate::domain::{IdentityVerifier, MembershipStore};
use crate::presentation::ws::protocol::{ClientEvent, MessageView, ServerEvent};
use crate::presentation::ws::registry::{ConnectionId, ConnectionRegistry};
use crate::presentation::ws::rooms::{RoomId, RoomManager};
use crate::shared::error::AppError;

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    chat: Arc<dyn ChatService>,
    membership: Arc<dyn MembershipStore>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomManager>,
        chat: Arc<dyn ChatService>,
        membership: Arc<dyn MembershipStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            registry,
            rooms,
            chat,
            membership,
            verifier,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Verify the handshake credential. Failure is connection-fatal.
    pub async fn authenticate(&self, token: &str) -> Result<i64, AppError> {
        self.verifier.verify(token).await
    }

    /// Bring an authenticated connection to Active: register it, auto-join
    /// the implicit user room, and announce presence iff the user just came
    /// online. Group rooms are joined lazily, never here, so connection
    /// setup stays O(1) regardless of group count.
    pub fn connect(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        let came_online = self.registry.register(user_id, connection_id, sender);
        self.rooms.join(connection_id, RoomId::User(user_id));

        self.registry.send_to(
            connection_id,
            ServerEvent::Authenticated {
                user_id: user_id.to_string(),
            },
        );

        if came_online {
            self.registry.broadcast(ServerEvent::user_online(user_id));
        }

        tracing::info!(user_id, connection_id = %connection_id, "Connection active");
    }

    /// Tear down a connection: drop its rooms, unregister it, and announce
    /// offline presence iff it was the user's last connection.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.rooms.drop_connection(connection_id);

        if let Some(disconnected) = self.registry.unregister(connection_id) {
            if disconnected.went_offline {
                self.registry
                    .broadcast(ServerEvent::user_offline(disconnected.user_id));
            }
            tracing::info!(
                user_id = disconnected.user_id,
                connection_id = %connection_id,
                "Connection closed"
            );
        }
    }

    /// Route one client event from an Active connection.
    pub async fn handle_event(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), AppError> {
        match event {
            ClientEvent::Authenticate { .. } => Err(AppError::Validation(
                "Connection is already authenticated".into(),
            )),
            ClientEvent::SendMessage {
                content,
                group_id,
                receiver_id,
            } => {
                self.send_message(user_id, connection_id, &content, group_id, receiver_id)
                    .await
            }
            ClientEvent::JoinGroup { group_id } => {
                self.join_group(user_id, connection_id, group_id).await
            }
            ClientEvent::LeaveGroup { group_id } => {
                self.leave_group(connection_id, group_id);
                Ok(())
            }
            ClientEvent::TypingStart {
                group_id,
                receiver_id,
            } => self.typing(user_id, group_id, receiver_id, true),
            ClientEvent::TypingStop {
                group_id,
                receiver_id,
            } => self.typing(user_id, group_id, receiver_id, false),
        }
    }

    /// Persist and fan out one message. The message is "sent" once
    /// persisted; fan-out is best-effort delivery to whoever is connected
    /// at this instant, and an empty room is success, not an error.
    async fn send_message(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        content: &str,
        group_id: Option<i64>,
        receiver_id: Option<i64>,
    ) -> Result<(), AppError> {
        match (group_id, receiver_id) {
            (Some(group_id), None) => {
                if !self.membership.is_active_member(group_id, user_id).await? {
                    return Err(AppError::Authorization("Not a member of this group".into()));
                }

                let message = self
                    .chat
                    .record_group_message(user_id, group_id, content)
                    .await?;
                let view = MessageView::from(&message);

                self.registry.send_to(
                    connection_id,
                    ServerEvent::MessageSent {
                        message: view.clone(),
                    },
                );
                self.fan_out(RoomId::Group(group_id), ServerEvent::NewMessage { message: view });
                Ok(())
            }
            (None, Some(receiver_id)) => {
                let message = self
                    .chat
                    .record_direct_message(user_id, receiver_id, content)
                    .await?;
                let view = MessageView::from(&message);

                self.registry.send_to(
                    connection_id,
                    ServerEvent::MessageSent {
                        message: view.clone(),
                    },
                );
                // Both sides of the conversation see the new message on
                // every device they have connected.
                self.fan_out(
                    RoomId::User(receiver_id),
                    ServerEvent::NewMessage {
                        message: view.clone(),
                    },
                );
                self.fan_out(RoomId::User(user_id), ServerEvent::NewMessage { message: view });
                Ok(())
            }
            _ => Err(AppError::Validation(
                "Exactly one of group_id or receiver_id is required".into(),
            )),
        }
    }

    /// Join a group room after verifying active membership. Rejection is an
    /// explicit error so the client can tell "not authorized" apart from
    /// "no members online".
    async fn join_group(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        group_id: i64,
    ) -> Result<(), AppError> {
        if !self.membership.is_active_member(group_id, user_id).await? {
            return Err(AppError::Authorization("Not a member of this group".into()));
        }

        self.rooms.join(connection_id, RoomId::Group(group_id));
        self.registry.send_to(
            connection_id,
            ServerEvent::GroupJoined {
                group_id: group_id.to_string(),
            },
        );
        Ok(())
    }

    /// Leaving needs no membership re-check.
    fn leave_group(&self, connection_id: ConnectionId, group_id: i64) {
        self.rooms.leave(connection_id, RoomId::Group(group_id));
        self.registry.send_to(
            connection_id,
            ServerEvent::GroupLeft {
                group_id: group_id.to_string(),
            },
        );
    }

    /// Pure fan-out, no persistence, best-effort.
    fn typing(
        &self,
        user_id: i64,
        group_id: Option<i64>,
        receiver_id: Option<i64>,
        typing: bool,
    ) -> Result<(), AppError> {
        let event = ServerEvent::Typing {
            user_id: user_id.to_string(),
            group_id: group_id.map(|id| id.to_string()),
            receiver_id: receiver_id.map(|id| id.to_string()),
            typing,
        };

        match (group_id, receiver_id) {
            (Some(group_id), None) => {
                self.fan_out(RoomId::Group(group_id), event);
                Ok(())
            }
            (None, Some(receiver_id)) => {
                self.fan_out(RoomId::User(receiver_id), event);
                Ok(())
            }
            _ => Err(AppError::Validation(
                "Exactly one of group_id or receiver_id is required".into(),
            )),
        }
    }

    fn fan_out(&self, room: RoomId, event: ServerEvent) {
        for connection_id in self.rooms.connections_in_room(room) {
            self.registry.send_to(connection_id, event.clone());
        }
    }
}
