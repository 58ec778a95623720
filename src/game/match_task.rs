//! Per-room match actor
//!
//! One task owns the simulator of a playing room. Ticks come from an
//! interval, everything else arrives on the command channel, so the
//! simulator is never shared and never locked.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_interval, unix_millis};
use crate::ws::protocol::ServerMsg;
use crate::ws::{deliver, Outbound};

use super::projection::{project, project_batch};
use super::simulator::{ActionError, MatchSimulator, TickOutcome};
use super::{PlayerAction, Role, RoleView};

/// A connected crew member as seen by the match
#[derive(Debug, Clone)]
pub struct Participant {
    pub player_id: Uuid,
    pub role: Role,
    pub outbound: Outbound,
}

/// Requests handled by a running match
#[derive(Debug)]
pub enum MatchCommand {
    /// Apply a move or ability for `role` and report the outcome
    Action {
        player_id: Uuid,
        role: Role,
        action: PlayerAction,
        reply: oneshot::Sender<Result<(), ActionError>>,
    },
    /// Project the current state for one participant
    GetState {
        player_id: Uuid,
        reply: oneshot::Sender<Option<RoleView>>,
    },
    /// A participant disconnected or left the room
    PlayerLeft { player_id: Uuid },
    Stop,
}

/// Handle to a running match
#[derive(Debug, Clone)]
pub struct MatchHandle {
    cmd_tx: mpsc::UnboundedSender<MatchCommand>,
}

impl MatchHandle {
    /// Returns false once the match task has exited
    pub fn send(&self, cmd: MatchCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(MatchCommand::Stop);
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

/// The authoritative match loop of one room
pub struct MatchTask {
    room_code: String,
    sim: MatchSimulator,
    participants: Vec<Participant>,
    cmd_rx: mpsc::UnboundedReceiver<MatchCommand>,
}

impl MatchTask {
    pub fn new(
        room_code: String,
        sim: MatchSimulator,
        participants: Vec<Participant>,
    ) -> (Self, MatchHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = MatchHandle { cmd_tx };
        let task = Self {
            room_code,
            sim,
            participants,
            cmd_rx,
        };
        (task, handle)
    }

    /// Create the task and run it on the current runtime
    pub fn spawn(
        room_code: String,
        sim: MatchSimulator,
        participants: Vec<Participant>,
    ) -> MatchHandle {
        let (task, handle) = Self::new(room_code, sim, participants);
        tokio::spawn(task.run());
        handle
    }

    pub async fn run(mut self) {
        info!(
            room = %self.room_code,
            map = self.sim.state().map_id,
            difficulty = self.sim.state().difficulty.as_str(),
            "Match started"
        );

        let now = unix_millis();
        self.sim.start(now);
        self.broadcast(now);

        // First tick one period after start, not immediately
        let period = tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticking = true;

        loop {
            tokio::select! {
                _ = ticker.tick(), if ticking => {
                    let now = unix_millis();
                    match self.sim.tick(now) {
                        TickOutcome::Advanced => {
                            self.broadcast(now);
                            if !self.sim.is_playing() {
                                info!(
                                    room = %self.room_code,
                                    status = ?self.sim.state().status,
                                    score = self.sim.state().score,
                                    "Match finished"
                                );
                                ticking = false;
                            }
                        }
                        TickOutcome::Halted => ticking = false,
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
            }
        }

        info!(room = %self.room_code, "Match task stopped");
    }

    /// Returns false when the task should exit
    fn handle_command(&mut self, cmd: MatchCommand) -> bool {
        match cmd {
            MatchCommand::Action {
                player_id,
                role,
                action,
                reply,
            } => {
                let now = unix_millis();
                let result = self.apply_action(role, action, now);
                match &result {
                    Ok(()) => self.broadcast(now),
                    Err(e) => debug!(room = %self.room_code, player_id = %player_id, error = %e, "Action refused"),
                }
                let _ = reply.send(result);
                true
            }
            MatchCommand::GetState { player_id, reply } => {
                let view = self
                    .participants
                    .iter()
                    .find(|p| p.player_id == player_id)
                    .map(|p| project(self.sim.state(), p.role, unix_millis(), &[]));
                let _ = reply.send(view);
                true
            }
            MatchCommand::PlayerLeft { player_id } => {
                self.participants.retain(|p| p.player_id != player_id);
                if self.participants.is_empty() {
                    info!(room = %self.room_code, "All players left, ending match");
                    return false;
                }
                true
            }
            MatchCommand::Stop => false,
        }
    }

    fn apply_action(&mut self, role: Role, action: PlayerAction, now: u64) -> Result<(), ActionError> {
        match action {
            PlayerAction::Move { direction } => {
                if role != Role::Navigator {
                    return Err(ActionError::NotNavigator);
                }
                let direction = direction.ok_or(ActionError::InvalidDirection)?;
                self.sim.move_player(direction, now).map(|_| ())
            }
            PlayerAction::Ability {
                ability_name,
                params,
            } => self.sim.use_ability(role, &ability_name, &params, now),
        }
    }

    /// Send every participant its own view of the current state
    fn broadcast(&mut self, now: u64) {
        let roles: Vec<Role> = self.participants.iter().map(|p| p.role).collect();
        let views = project_batch(self.sim.state_mut(), roles, now);

        for (participant, (_, view)) in self.participants.iter().zip(views) {
            if !deliver(
                participant.player_id,
                &participant.outbound,
                ServerMsg::StateUpdate { state: view },
            ) {
                warn!(
                    room = %self.room_code,
                    player_id = %participant.player_id,
                    "State update not delivered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::Difficulty;
    use crate::game::simulator::Direction;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Crew {
        participants: Vec<Participant>,
        inboxes: Vec<mpsc::Receiver<ServerMsg>>,
    }

    fn crew() -> Crew {
        let mut participants = Vec::new();
        let mut inboxes = Vec::new();
        for role in Role::ALL {
            let (tx, rx) = mpsc::channel(64);
            participants.push(Participant {
                player_id: Uuid::new_v4(),
                role,
                outbound: tx,
            });
            inboxes.push(rx);
        }
        Crew {
            participants,
            inboxes,
        }
    }

    async fn next_view(rx: &mut mpsc::Receiver<ServerMsg>) -> RoleView {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(ServerMsg::StateUpdate { state })) => state,
            other => panic!("expected state update, got {other:?}"),
        }
    }

    async fn act(
        handle: &MatchHandle,
        player: &Participant,
        action: PlayerAction,
    ) -> Result<(), ActionError> {
        let (reply, rx) = oneshot::channel();
        assert!(handle.send(MatchCommand::Action {
            player_id: player.player_id,
            role: player.role,
            action,
            reply,
        }));
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn every_role_gets_its_own_opening_view() {
        let mut crew = crew();
        let sim = MatchSimulator::new("bank", Difficulty::Medium, 7);
        let handle = MatchTask::spawn("ROOM01".into(), sim, crew.participants.clone());

        for (i, rx) in crew.inboxes.iter_mut().enumerate() {
            let view = next_view(rx).await;
            assert_eq!(view.role, Role::ALL[i]);
            // The opening cue reaches everyone in the same broadcast
            assert_eq!(view.sound_events.len(), 1);
        }
        handle.stop();
    }

    #[tokio::test]
    async fn only_the_navigator_moves() {
        let crew = crew();
        let sim = MatchSimulator::new("bank", Difficulty::Easy, 1);
        let handle = MatchTask::spawn("ROOM02".into(), sim, crew.participants.clone());

        let security = &crew.participants[1];
        let result = act(
            &handle,
            security,
            PlayerAction::step(Direction::Right),
        )
        .await;
        assert_eq!(result, Err(ActionError::NotNavigator));

        let navigator = &crew.participants[0];
        let result = act(
            &handle,
            navigator,
            PlayerAction::step(Direction::Right),
        )
        .await;
        assert_eq!(result, Ok(()));

        let result = act(&handle, navigator, PlayerAction::Move { direction: None }).await;
        assert_eq!(result, Err(ActionError::InvalidDirection));
        handle.stop();
    }

    #[tokio::test]
    async fn ability_failure_is_reported_to_caller() {
        let crew = crew();
        let sim = MatchSimulator::new("museum", Difficulty::Hard, 3);
        let handle = MatchTask::spawn("ROOM03".into(), sim, crew.participants.clone());

        let alarm = &crew.participants[3];
        let silence = || PlayerAction::Ability {
            ability_name: "silenceAlarm".to_string(),
            params: Default::default(),
        };
        assert_eq!(act(&handle, alarm, silence()).await, Ok(()));
        let err = act(&handle, alarm, silence()).await.unwrap_err();
        assert_eq!(err.to_string(), "Ability on cooldown");
        handle.stop();
    }

    #[tokio::test]
    async fn get_state_projects_for_the_asking_role() {
        let crew = crew();
        let sim = MatchSimulator::new("fortress", Difficulty::Medium, 9);
        let handle = MatchTask::spawn("ROOM04".into(), sim, crew.participants.clone());

        let (reply, rx) = oneshot::channel();
        handle.send(MatchCommand::GetState {
            player_id: crew.participants[2].player_id,
            reply,
        });
        let view = rx.await.unwrap().expect("participant view");
        assert_eq!(view.role, Role::LootMaster);

        let (reply, rx) = oneshot::channel();
        handle.send(MatchCommand::GetState {
            player_id: Uuid::new_v4(),
            reply,
        });
        assert!(rx.await.unwrap().is_none());
        handle.stop();
    }

    #[tokio::test]
    async fn task_exits_when_everyone_leaves() {
        let crew = crew();
        let sim = MatchSimulator::new("bank", Difficulty::Medium, 5);
        let handle = MatchTask::spawn("ROOM05".into(), sim, crew.participants.clone());

        for p in &crew.participants {
            handle.send(MatchCommand::PlayerLeft {
                player_id: p.player_id,
            });
        }
        timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("match task should stop");
        assert!(!handle.send(MatchCommand::Stop));
    }
}
