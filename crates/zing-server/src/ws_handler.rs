//! WebSocket handler for the Axum Zing server.
//!
//! Each connection follows a two-phase lifecycle: an auth-only phase before
//! anything else is accepted, then a single dispatch loop for every
//! subsequent [`ClientMessage`]. Messages carry their own `room_id`/target
//! rather than implying "the one room this connection joined", so a
//! connection can move between rooms (leave, rejoin, matchmaking) without
//! re-upgrading the socket — the write task is restarted against the new
//! room's receiver each time that happens.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use zing_core::identity::{AuthPayload, CredentialValidator, PlayerId, Role, resolve_identity};
use zing_core::protocol::{ClientMessage, ErrorReason, RoomId, ServerMessage};

use crate::AppState;
use crate::error::RoomError;
use crate::matchmaking::FindGameOutcome;
use crate::room::{PlayerRx, actor};

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Adapter from an already-`.await`ed repository lookup to the synchronous
/// [`CredentialValidator`] the core identity resolver expects.
struct Prefetched(Option<PlayerId>);

impl CredentialValidator for Prefetched {
    fn validate(&self, _token: &str) -> Option<PlayerId> {
        self.0.clone()
    }
}

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let sink: WsSink = Arc::new(Mutex::new(sink));

    let identity = match authenticate(&mut stream, &sink, &state).await {
        Some(identity) => identity,
        None => return,
    };

    let mut current_room: Option<RoomId> = None;
    let mut write_handle: Option<JoinHandle<()>> = None;

    loop {
        let frame = stream.next().await;
        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            _ => continue,
        };

        let msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                send_one(&sink, &ServerMessage::RoomError { reason: ErrorReason::ServerError, message: e.to_string() }).await;
                continue;
            }
        };

        dispatch(msg, &identity.player_id, &identity.name, &state, &sink, &mut current_room, &mut write_handle).await;
    }

    if let Some(handle) = write_handle {
        handle.abort();
    }
    state.connections.detach(&identity.player_id).await;
    if let Some(room_id) = current_room
        && let Some(room) = state.registry.get_room_by_id(&room_id).await
    {
        let emptied = actor::leave(&room, &identity.player_id).await;
        if emptied {
            state.registry.remove_room(&room_id).await;
        }
    }
    tracing::info!(player = %identity.player_id, "connection closed");
}

async fn authenticate(
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    sink: &WsSink,
    state: &AppState,
) -> Option<zing_core::identity::ResolvedIdentity> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        send_one(sink, &ServerMessage::RoomError { reason: ErrorReason::AuthInvalid, message: e.to_string() }).await;
                        continue;
                    }
                };
                let ClientMessage::Auth { token, guest_id, name, role } = msg else {
                    send_one(
                        sink,
                        &ServerMessage::RoomError {
                            reason: ErrorReason::AuthInvalid,
                            message: "must send auth first".to_string(),
                        },
                    )
                    .await;
                    continue;
                };

                let prefetched = match token.as_deref().filter(|t| !t.is_empty()) {
                    Some(t) => state.repo.validate_credential(t).await,
                    None => None,
                };
                let payload = AuthPayload { token, guest_id, name, requested_role: role };
                match resolve_identity(&payload, &Prefetched(prefetched)) {
                    Ok(identity) => {
                        send_one(
                            sink,
                            &ServerMessage::AuthOk {
                                id: identity.player_id.clone(),
                                name: identity.name.clone(),
                                role: identity.role,
                            },
                        )
                        .await;
                        return Some(identity);
                    }
                    Err(_) => {
                        send_one(
                            sink,
                            &ServerMessage::RoomError { reason: ErrorReason::AuthInvalid, message: "invalid credentials".to_string() },
                        )
                        .await;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return None,
            _ => continue,
        }
    }
}

async fn send_one(sink: &WsSink, msg: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        let _ = sink.lock().await.send(Message::Text(json.into())).await;
    }
}

/// Aborts any previous write task and spawns a new one draining `rx` into
/// the connection's single outbound sink, restarted per room instead of
/// created once.
fn restart_write_task(sink: &WsSink, write_handle: &mut Option<JoinHandle<()>>, mut rx: PlayerRx) {
    if let Some(handle) = write_handle.take() {
        handle.abort();
    }
    let sink = sink.clone();
    *write_handle = Some(tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if sink.lock().await.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }));
}

async fn dispatch(
    msg: ClientMessage,
    player_id: &PlayerId,
    name: &str,
    state: &AppState,
    sink: &WsSink,
    current_room: &mut Option<RoomId>,
    write_handle: &mut Option<JoinHandle<()>>,
) {
    match msg {
        ClientMessage::Auth { .. } => {
            send_one(sink, &ServerMessage::RoomError { reason: ErrorReason::ServerError, message: "already authenticated".into() }).await;
        }

        ClientMessage::CreatePrivateRoom { name: room_name } => {
            let _ = room_name;
            let room = state.registry.create_room(zing_core::protocol::Visibility::Private, &state.config).await;
            let (room_id, code, invite_token) = {
                let guard = room.lock().await;
                (guard.room_id.clone(), guard.code.clone(), guard.invite_token.clone())
            };
            send_one(sink, &ServerMessage::RoomCreated { room_id: room_id.clone(), code: code.unwrap(), invite_token }).await;
            match actor::join(&room, player_id.clone(), name.to_string(), Role::Player).await {
                Ok(rx) => {
                    state.connections.attach(player_id.clone(), room_id.clone()).await;
                    restart_write_task(sink, write_handle, rx);
                    *current_room = Some(room_id);
                }
                Err(e) => send_join_error(sink, e).await,
            }
        }

        ClientMessage::JoinRoom { room_id, code, invite_token, guest_id: _, name: join_name } => {
            let room = resolve_room(state, room_id, code, invite_token).await;
            let Some(room) = room else {
                send_one(sink, &ServerMessage::JoinError { reason: ErrorReason::RoomNotFound, message: "room not found".into() }).await;
                return;
            };
            match actor::join(&room, player_id.clone(), join_name, Role::Player).await {
                Ok(rx) => {
                    let room_id = room.lock().await.room_id.clone();
                    state.connections.attach(player_id.clone(), room_id.clone()).await;
                    restart_write_task(sink, write_handle, rx);
                    *current_room = Some(room_id);
                }
                Err(e) => send_join_error(sink, e).await,
            }
        }

        ClientMessage::RejoinRoom { room_id, player_id: claimed, reconnect_token } => {
            if &claimed != player_id {
                send_one(sink, &ServerMessage::RejoinError { reason: ErrorReason::RejoinInvalid, message: "identity mismatch".into() }).await;
                return;
            }
            let Some(room) = state.registry.get_room_by_id(&room_id).await else {
                send_one(sink, &ServerMessage::RejoinError { reason: ErrorReason::RoomNotFound, message: "room not found".into() }).await;
                return;
            };
            match actor::rejoin(&room, player_id, &reconnect_token.0, None, state.config.reconnect_token_ttl_ms).await {
                Ok(rx) => {
                    state.connections.attach(player_id.clone(), room_id.clone()).await;
                    restart_write_task(sink, write_handle, rx);
                    *current_room = Some(room_id);
                }
                Err(e) => send_one(sink, &ServerMessage::RejoinError { reason: e.reason(), message: e.to_string() }).await,
            }
        }

        ClientMessage::LeaveRoomMember { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await {
                let emptied = actor::leave(&room, player_id).await;
                if emptied {
                    state.registry.remove_room(&room_id).await;
                }
            }
            state.connections.detach(player_id).await;
            *current_room = None;
            send_one(sink, &ServerMessage::RoomLeft).await;
        }

        ClientMessage::KickMember { room_id, target_user_id } => {
            with_room(state, sink, &room_id, |room| async move {
                actor::kick(&room, player_id, &target_user_id).await
            })
            .await;
        }

        ClientMessage::SetMemberRole { room_id, target_user_id, role } => {
            with_room(state, sink, &room_id, |room| async move {
                actor::set_role(&room, player_id, &target_user_id, role).await
            })
            .await;
        }

        ClientMessage::ToggleTimer { room_id, enabled } => {
            with_room(state, sink, &room_id, |room| async move {
                actor::toggle_timer(&room, player_id, enabled).await
            })
            .await;
        }

        ClientMessage::SetTeamAssignment { room_id, team0, team1 } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::set_team_assignment(&room, player_id, team0, team1).await
            {
                send_one(sink, &ServerMessage::TeamError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::Start1v1 { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::start_1v1(&room, player_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::StartError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::Start2v2Random { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::start_2v2_random(&room, player_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::StartError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::Start2v2Party { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::start_2v2_party(&room, player_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::StartError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::IntentPlayCard { room_id, card_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::play_card(&room, player_id, card_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::RoomError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::IntentPlayCardAs { room_id, card_id, as_player_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) =
                    actor::play_card_as(&room, player_id, card_id, &as_player_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::RoomError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::VoteSurrender { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await {
                match actor::vote_surrender(&room, player_id, &state.repo).await {
                    Ok(Some(result)) => state.repo.record_match_result(result).await,
                    Ok(None) => {}
                    Err(e) => send_one(sink, &ServerMessage::RoomError { reason: e.reason(), message: e.to_string() }).await,
                }
            }
        }

        ClientMessage::VoteRematch { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await
                && let Err(e) = actor::vote_rematch(&room, player_id, &state.config, &state.repo).await
            {
                send_one(sink, &ServerMessage::RoomError { reason: e.reason(), message: e.to_string() }).await;
            }
        }

        ClientMessage::ExitGame { room_id } => {
            if let Some(room) = state.registry.get_room_by_id(&room_id).await {
                let emptied = actor::exit_game(&room, player_id).await;
                if emptied {
                    state.registry.remove_room(&room_id).await;
                }
            }
        }

        ClientMessage::FindGame { mode } => {
            match state
                .matchmaking
                .find_game(player_id.clone(), name.to_string(), mode, &state.registry, &state.config, &state.repo)
                .await
            {
                FindGameOutcome::Queued => {
                    send_one(sink, &ServerMessage::QueueJoined { mode }).await;
                }
                FindGameOutcome::MatchFound { room, players } => {
                    let room_id = room.lock().await.room_id.clone();
                    for pid in &players {
                        state.connections.attach(pid.clone(), room_id.clone()).await;
                    }
                    send_one(sink, &ServerMessage::MatchFound { room_id: room_id.clone(), mode, players }).await;
                    // `find_game` already joined this connection's player_id
                    // as a member; re-joining under the same id hits the
                    // actor's re-join-by-name shortcut and hands back a
                    // fresh receiver bound to this connection's write task.
                    if let Ok(rx) = actor::join(&room, player_id.clone(), name.to_string(), Role::Player).await {
                        restart_write_task(sink, write_handle, rx);
                    }
                    *current_room = Some(room_id);
                }
            }
        }

        ClientMessage::CancelFindGame => {
            state.matchmaking.cancel_find_game(player_id).await;
            send_one(sink, &ServerMessage::QueueLeft).await;
        }

        ClientMessage::SendInvite { friend_id } => {
            let Some(room_id) = state.connections.room_of(player_id).await else {
                send_one(sink, &ServerMessage::InviteError { reason: ErrorReason::RoomNotFound, message: "not in a room".into() }).await;
                return;
            };
            let friends = state.repo.load_friend_list(player_id).await;
            if !friends.contains(&friend_id) {
                let e = RoomError::NotFriends;
                send_one(sink, &ServerMessage::InviteError { reason: e.reason(), message: e.to_string() }).await;
                return;
            }
            let invite = state.invites.send_invite(player_id.clone(), friend_id.clone(), room_id.clone(), state.config.invite_ttl_ms).await;
            send_one(sink, &ServerMessage::InviteSent { invite_id: invite.invite_id.clone() }).await;
            if let Some(friend_room) = state.connections.room_of(&friend_id).await
                && let Some(room) = state.registry.get_room_by_id(&friend_room).await
            {
                let guard = room.lock().await;
                guard.send_to_player(
                    &friend_id,
                    ServerMessage::InviteReceived { invite_id: invite.invite_id, inviter_id: player_id.clone(), room_id },
                );
            }
        }

        ClientMessage::AcceptInvite { invite_id } => {
            match state.invites.accept_invite(&invite_id, player_id).await {
                Some(invite) => {
                    send_one(sink, &ServerMessage::InviteAccepted { invite_id: invite.invite_id.clone() }).await;
                    if let Some(room) = state.registry.get_room_by_id(&invite.room_id).await {
                        match actor::join(&room, player_id.clone(), name.to_string(), Role::Player).await {
                            Ok(rx) => {
                                state.connections.attach(player_id.clone(), invite.room_id.clone()).await;
                                restart_write_task(sink, write_handle, rx);
                                *current_room = Some(invite.room_id);
                            }
                            Err(e) => send_join_error(sink, e).await,
                        }
                    }
                }
                None => {
                    send_one(sink, &ServerMessage::InviteError { reason: ErrorReason::InviteNotFound, message: "invite not found or expired".into() }).await;
                }
            }
        }

        ClientMessage::DeclineInvite { invite_id } => {
            match state.invites.decline_invite(&invite_id, player_id).await {
                Some(invite) => send_one(sink, &ServerMessage::InviteDeclined { invite_id: invite.invite_id }).await,
                None => {
                    send_one(sink, &ServerMessage::InviteError { reason: ErrorReason::InviteNotFound, message: "invite not found or expired".into() }).await;
                }
            }
        }

        ClientMessage::GetPendingInvites => {
            let invites = state.invites.pending_invites_for(player_id).await;
            send_one(sink, &ServerMessage::PendingInvites { invites: invites.into_iter().map(|i| i.invite_id).collect() }).await;
        }
    }
}

async fn resolve_room(
    state: &AppState,
    room_id: Option<RoomId>,
    code: Option<zing_core::protocol::RoomCode>,
    invite_token: Option<zing_core::protocol::InviteToken>,
) -> Option<crate::room::RoomHandle> {
    if let Some(room_id) = room_id {
        return state.registry.get_room_by_id(&room_id).await;
    }
    if let Some(code) = code {
        return state.registry.get_room_by_code(&code).await;
    }
    if let Some(token) = invite_token {
        return state.registry.get_room_by_invite_token(&token).await;
    }
    None
}

async fn send_join_error(sink: &WsSink, e: RoomError) {
    send_one(sink, &ServerMessage::JoinError { reason: e.reason(), message: e.to_string() }).await;
}

/// Runs `op` against `room_id`'s room if it exists, reporting any
/// [`RoomError`] back as a flat `room_error` (used by the membership
/// management intents, which all share this shape).
async fn with_room<F, Fut>(state: &AppState, sink: &WsSink, room_id: &RoomId, op: F)
where
    F: FnOnce(crate::room::RoomHandle) -> Fut,
    Fut: std::future::Future<Output = Result<(), RoomError>>,
{
    let Some(room) = state.registry.get_room_by_id(room_id).await else {
        send_one(sink, &ServerMessage::RoomError { reason: ErrorReason::RoomNotFound, message: "room not found".into() }).await;
        return;
    };
    if let Err(e) = op(room).await {
        send_one(sink, &ServerMessage::RoomError { reason: e.reason(), message: e.to_string() }).await;
    }
}
