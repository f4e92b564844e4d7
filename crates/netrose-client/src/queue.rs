//! Per-object command queue replaying server events as a single movement track.
//!
//! A [`CommandQueue`] owns its grid motion model and executes
//! [`Command`]s strictly in enqueue order, with at most one step in flight.
//! Execution is cooperative: [`poll`](CommandQueue::poll) runs once per
//! scheduling tick and returns as soon as it has to wait for the model, so one
//! object's queue never starves another's.
//!
//! # One poll
//!
//! 1. If a step is in flight, check whether the model reported its end. If
//!    not, and the backlog has reached the queue limit, force the step to
//!    finish now (acceleration). If the step is still running, yield.
//! 2. While the model is idle, pop the next command. Instant commands apply and
//!    the loop continues; a movement command starts its step and the poll
//!    yields, so acceleration is evaluated from the next tick on.
//!
//! Enqueueing never executes anything by itself; the next poll picks the
//! command up.
//!
//! # Routing finish/cancel events
//!
//! The server reports the end of a step separately from its start. The queue
//! remembers the ticket of the last enqueued movement and routes
//! [`mark_will_finish`](CommandQueue::mark_will_finish) and
//! [`mark_cancelled`](CommandQueue::mark_cancelled) to it, whether it is still
//! pending or already in flight. The ticket is forgotten as soon as that
//! command retires, so late or duplicate events route to nothing.
//!
//! # Clearing
//!
//! [`clear`](CommandQueue::clear) is unconditional: it aborts the step in
//! flight (even one marked to finish) and drops every pending command.

use std::collections::VecDeque;

use netrose_grid::prelude::*;
use tracing::{debug, trace, warn};

use crate::command::{Command, CommandTicket, Execution};
use crate::config::SyncConfig;

// ---------------------------------------------------------------------------
// QueueStats
// ---------------------------------------------------------------------------

/// Running counters describing what a queue has done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Instant commands applied.
    pub applied: u64,
    /// Steps that ran to their destination.
    pub movements_completed: u64,
    /// Steps aborted while in flight (network cancel or model-side abort).
    pub movements_cancelled: u64,
    /// Movement commands dropped before they started.
    pub discarded: u64,
    /// Movement commands the model refused to start.
    pub rejected: u64,
    /// Silent teleports performed to absorb drift.
    pub drift_corrections: u64,
    /// Steps force-finished because of backlog.
    pub accelerations: u64,
    /// Commands the model refused outright.
    pub failed: u64,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pending {
    ticket: CommandTicket,
    command: Command,
    /// Set by a matching finish event: network cancels no longer apply.
    will_finish: bool,
}

/// The step currently driving the model.
#[derive(Debug)]
struct InFlight {
    ticket: CommandTicket,
    direction: Direction,
    will_finish: bool,
    /// Scoped to this step: dropping the `InFlight` deregisters it.
    events: MotionSubscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepEnd {
    Finished,
    Cancelled,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Ordered, single-track command executor for one networked object.
#[derive(Debug)]
pub struct CommandQueue<M: GridMotion> {
    model: M,
    pending: VecDeque<Pending>,
    in_flight: Option<InFlight>,
    last_movement: Option<CommandTicket>,
    next_ticket: u64,
    queue_limit: usize,
    stats: QueueStats,
}

impl<M: GridMotion> CommandQueue<M> {
    /// Create an idle queue that exclusively owns `model`.
    pub fn new(model: M, config: &SyncConfig) -> Self {
        Self {
            model,
            pending: VecDeque::new(),
            in_flight: None,
            last_movement: None,
            next_ticket: 0,
            queue_limit: config.effective_queue_limit(),
            stats: QueueStats::default(),
        }
    }

    // -- public operations --------------------------------------------------

    /// Append `command` to the tail. Never fails; backlog is bounded only
    /// indirectly, by acceleration.
    pub fn enqueue(&mut self, command: Command) -> CommandTicket {
        let ticket = CommandTicket(self.next_ticket);
        self.next_ticket += 1;
        if command.is_movement() {
            self.last_movement = Some(ticket);
        }
        debug!(
            ticket = ticket.0,
            kind = command.kind(),
            backlog = self.pending.len() + 1,
            "command enqueued"
        );
        self.pending.push_back(Pending {
            ticket,
            command,
            will_finish: false,
        });
        ticket
    }

    /// Abort the step in flight and drop every pending command.
    ///
    /// Wins over [`mark_will_finish`](Self::mark_will_finish). Calling it
    /// twice is the same as calling it once.
    pub fn clear(&mut self) {
        let aborted = self.in_flight.take();
        if self.model.is_moving() {
            self.model.cancel_movement();
        }
        if let Some(step) = &aborted {
            debug!(ticket = step.ticket.0, "in-flight step aborted by clear");
        }
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "pending commands cleared");
        }
        self.pending.clear();
        self.last_movement = None;
    }

    /// Guarantee that the last enqueued movement runs to completion once
    /// started. Returns whether a command was marked.
    pub fn mark_will_finish(&mut self) -> bool {
        let Some(ticket) = self.last_movement else {
            trace!("finish event with no movement to route to");
            return false;
        };
        if let Some(step) = self.in_flight.as_mut().filter(|s| s.ticket == ticket) {
            step.will_finish = true;
            return true;
        }
        if let Some(pending) = self.pending.iter_mut().find(|p| p.ticket == ticket) {
            pending.will_finish = true;
            return true;
        }
        false
    }

    /// Cancel the last enqueued movement unless it was marked to finish.
    ///
    /// A pending command is dropped without touching the model; a step in
    /// flight is aborted, rolling the model back to its start cell. Returns
    /// whether a command was cancelled.
    pub fn mark_cancelled(&mut self) -> bool {
        let Some(ticket) = self.last_movement else {
            trace!("cancel event with no movement to route to");
            return false;
        };

        if let Some(step) = self.in_flight.as_ref().filter(|s| s.ticket == ticket) {
            if step.will_finish {
                trace!(ticket = ticket.0, "cancel ignored: step will finish");
                return false;
            }
            self.model.cancel_movement();
            self.retire(StepEnd::Cancelled);
            return true;
        }

        if let Some(index) = self.pending.iter().position(|p| p.ticket == ticket) {
            if self.pending[index].will_finish {
                trace!(ticket = ticket.0, "cancel ignored: movement will finish");
                return false;
            }
            self.pending.remove(index);
            self.last_movement = None;
            self.stats.discarded += 1;
            debug!(ticket = ticket.0, "pending movement discarded");
            return true;
        }

        false
    }

    /// Run one scheduling tick of the execution loop.
    pub fn poll(&mut self) {
        loop {
            if self.in_flight.is_some() {
                if !self.settle_in_flight() {
                    return;
                }
                continue;
            }

            if self.model.is_moving() {
                trace!("model busy; waiting");
                return;
            }

            let Some(next) = self.pending.pop_front() else {
                return;
            };
            if self.run(next) {
                return;
            }
        }
    }

    /// Advance the model by `dt` seconds, then [`poll`](Self::poll).
    pub fn tick(&mut self, dt: f64) {
        self.model.advance(dt);
        self.poll();
    }

    // -- accessors ----------------------------------------------------------

    /// Pending commands, not counting the step in flight.
    pub fn backlog(&self) -> usize {
        self.pending.len()
    }

    /// Whether the backlog forces steps to finish immediately.
    pub fn must_accelerate(&self) -> bool {
        self.pending.len() >= self.queue_limit
    }

    /// Whether nothing is pending or in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }

    pub fn in_flight(&self) -> Option<CommandTicket> {
        self.in_flight.as_ref().map(|s| s.ticket)
    }

    /// The routing target of finish/cancel events, if any.
    pub fn last_movement(&self) -> Option<CommandTicket> {
        self.last_movement
    }

    /// Pending commands in execution order.
    pub fn pending(&self) -> impl Iterator<Item = (CommandTicket, &Command)> {
        self.pending.iter().map(|p| (p.ticket, &p.command))
    }

    pub fn queue_limit(&self) -> usize {
        self.queue_limit
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model.
    ///
    /// Mutating the model behind the queue's back can break the
    /// single-track invariant; use it for setup and tests.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    // -- internal helpers ---------------------------------------------------

    /// Execute one dequeued command. Returns whether a step is now in flight.
    fn run(&mut self, next: Pending) -> bool {
        let direction = match next.command {
            Command::StartMovement { direction, .. } => Some(direction),
            _ => None,
        };
        // Subscribe before starting so the end of the step cannot be missed.
        let events = direction.map(|_| self.model.subscribe());

        match next.command.execute(&mut self.model) {
            Execution::Applied => {
                self.stats.applied += 1;
                trace!(ticket = next.ticket.0, kind = next.command.kind(), "command applied");
                false
            }
            Execution::MovementStarted { corrected } => {
                if corrected {
                    self.stats.drift_corrections += 1;
                }
                match (direction, events) {
                    (Some(direction), Some(events)) => {
                        debug!(ticket = next.ticket.0, %direction, "step started");
                        self.in_flight = Some(InFlight {
                            ticket: next.ticket,
                            direction,
                            will_finish: next.will_finish,
                            events,
                        });
                        true
                    }
                    _ => false,
                }
            }
            Execution::MovementRejected { corrected } => {
                if corrected {
                    self.stats.drift_corrections += 1;
                }
                self.stats.rejected += 1;
                self.forget(next.ticket);
                warn!(
                    ticket = next.ticket.0,
                    direction = ?direction,
                    position = ?self.model.position(),
                    "movement rejected by the model; skipping"
                );
                false
            }
            Execution::Failed(error) => {
                self.stats.failed += 1;
                self.forget(next.ticket);
                warn!(
                    ticket = next.ticket.0,
                    kind = next.command.kind(),
                    %error,
                    "command failed; skipping"
                );
                false
            }
        }
    }

    /// Check the step in flight. Returns whether it retired.
    fn settle_in_flight(&mut self) -> bool {
        if let Some(end) = self.reported_end() {
            self.retire(end);
            return true;
        }
        if !self.model.is_moving() {
            // Ended without a report; treat as aborted.
            self.retire(StepEnd::Cancelled);
            return true;
        }
        if self.must_accelerate() {
            trace!(backlog = self.pending.len(), "accelerating step");
            self.stats.accelerations += 1;
            self.model.finish_movement();
            let end = self.reported_end().unwrap_or(StepEnd::Finished);
            self.retire(end);
            return true;
        }
        false
    }

    /// The first end-of-step event delivered to the in-flight subscription.
    fn reported_end(&self) -> Option<StepEnd> {
        let step = self.in_flight.as_ref()?;
        step.events.drain().into_iter().find_map(|event| match event {
            MotionEvent::MovementFinished { .. } => Some(StepEnd::Finished),
            MotionEvent::MovementCancelled { .. } => Some(StepEnd::Cancelled),
            _ => None,
        })
    }

    /// Drop the in-flight step (and its subscription) and record how it ended.
    fn retire(&mut self, end: StepEnd) {
        let Some(step) = self.in_flight.take() else {
            return;
        };
        match end {
            StepEnd::Finished => self.stats.movements_completed += 1,
            StepEnd::Cancelled => self.stats.movements_cancelled += 1,
        }
        debug!(
            ticket = step.ticket.0,
            direction = %step.direction,
            outcome = ?end,
            position = ?self.model.position(),
            "step retired"
        );
        self.forget(step.ticket);
    }

    fn forget(&mut self, ticket: CommandTicket) {
        if self.last_movement == Some(ticket) {
            self.last_movement = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const DT: f64 = 1.0 / 60.0;

    fn catalog() -> Arc<MapCatalog> {
        Arc::new(
            MapCatalog::new()
                .with_map(GridMap::new(MapId(1), 16, 16).with_blocked(8, 9))
                .with_map(GridMap::new(MapId(2), 32, 32)),
        )
    }

    fn queue_at(x: u16, y: u16) -> CommandQueue<MapObject> {
        let mut obj = MapObject::new(catalog()).with_speed(4);
        obj.attach(MapId(1), x, y, true).unwrap();
        CommandQueue::new(obj, &SyncConfig::default())
    }

    fn start(direction: Direction, x: u16, y: u16) -> Command {
        Command::StartMovement {
            direction,
            start_x: x,
            start_y: y,
        }
    }

    fn run_until_idle(queue: &mut CommandQueue<MapObject>) {
        for _ in 0..10_000 {
            if queue.is_idle() && !queue.model().is_moving() {
                return;
            }
            queue.tick(DT);
        }
        panic!("queue did not drain");
    }

    // -- 1. Enqueue and execution ---------------------------------------------

    #[test]
    fn enqueue_does_not_execute_until_polled() {
        let mut queue = queue_at(5, 5);
        queue.enqueue(start(Direction::Right, 5, 5));
        assert!(!queue.model().is_moving());
        assert_eq!(queue.backlog(), 1);

        queue.poll();
        assert_eq!(queue.model().movement(), Some(Direction::Right));
        assert_eq!(queue.backlog(), 0);
    }

    #[test]
    fn tickets_increase_in_enqueue_order() {
        let mut queue = queue_at(5, 5);
        let a = queue.enqueue(Command::SpeedChange { speed: 2 });
        let b = queue.enqueue(start(Direction::Up, 5, 5));
        assert!(a < b);
        assert_eq!(queue.last_movement(), Some(b));
    }

    #[test]
    fn instant_commands_drain_in_one_poll() {
        let mut queue = queue_at(5, 5);
        queue.enqueue(Command::SpeedChange { speed: 6 });
        queue.enqueue(Command::OrientationChange { direction: Direction::Up });
        queue.enqueue(Command::Teleport { x: 1, y: 1 });
        queue.poll();

        assert!(queue.is_idle());
        assert_eq!(queue.model().speed(), 6);
        assert_eq!(queue.model().orientation(), Direction::Up);
        assert_eq!(queue.model().position(), Some(GridPosition::new(1, 1)));
        assert_eq!(queue.stats().applied, 3);
    }

    #[test]
    fn commands_behind_a_step_wait_for_it() {
        let mut queue = queue_at(5, 5);
        queue.enqueue(start(Direction::Right, 5, 5));
        queue.enqueue(Command::OrientationChange { direction: Direction::Down });
        queue.poll();
        queue.tick(DT);

        assert_eq!(queue.model().orientation(), Direction::Right);
        run_until_idle(&mut queue);
        assert_eq!(queue.model().orientation(), Direction::Down);
        assert_eq!(queue.model().position(), Some(GridPosition::new(6, 5)));
    }

    #[test]
    fn consecutive_steps_follow_each_other() {
        let mut queue = queue_at(5, 5);
        queue.enqueue(start(Direction::Right, 5, 5));
        queue.enqueue(start(Direction::Right, 6, 5));
        queue.enqueue(start(Direction::Up, 7, 5));
        run_until_idle(&mut queue);

        assert_eq!(queue.model().position(), Some(GridPosition::new(7, 6)));
        assert_eq!(queue.stats().movements_completed, 3);
        assert_eq!(queue.stats().drift_corrections, 0);
    }

    // -- 2. Routing finish / cancel -------------------------------------------

    #[test]
    fn cancel_before_start_discards_without_touching_model() {
        let mut queue = queue_at(3, 3);
        let events = queue.model_mut().subscribe();
        queue.enqueue(start(Direction::Up, 3, 3));

        assert!(queue.mark_cancelled());
        run_until_idle(&mut queue);

        assert!(events.drain().is_empty());
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 3)));
        assert_eq!(queue.stats().discarded, 1);
        assert_eq!(queue.last_movement(), None);
    }

    #[test]
    fn cancel_in_flight_rolls_back() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        queue.poll();
        queue.tick(DT);

        assert!(queue.mark_cancelled());
        assert!(!queue.model().is_moving());
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 3)));
        assert_eq!(queue.in_flight(), None);
        assert_eq!(queue.stats().movements_cancelled, 1);
    }

    #[test]
    fn will_finish_before_cancel_completes_the_step() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        assert!(queue.mark_will_finish());
        assert!(!queue.mark_cancelled());

        run_until_idle(&mut queue);
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 4)));
        assert_eq!(queue.stats().movements_completed, 1);
    }

    #[test]
    fn will_finish_while_in_flight_is_honoured() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        queue.poll();
        assert!(queue.mark_will_finish());
        assert!(!queue.mark_cancelled());
        assert!(queue.model().is_moving());
    }

    #[test]
    fn cancel_then_will_finish_stays_cancelled() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        queue.poll();
        assert!(queue.mark_cancelled());
        assert!(!queue.mark_will_finish());

        run_until_idle(&mut queue);
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 3)));
    }

    #[test]
    fn late_events_route_to_nothing() {
        let mut queue = queue_at(3, 3);
        assert!(!queue.mark_will_finish());
        assert!(!queue.mark_cancelled());

        queue.enqueue(start(Direction::Up, 3, 3));
        run_until_idle(&mut queue);
        assert_eq!(queue.last_movement(), None);
        assert!(!queue.mark_cancelled());
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 4)));
    }

    #[test]
    fn cancel_targets_only_the_last_movement() {
        let mut queue = queue_at(3, 3);
        let first = queue.enqueue(start(Direction::Up, 3, 3));
        queue.enqueue(start(Direction::Up, 3, 4));
        queue.poll();
        assert_eq!(queue.in_flight(), Some(first));

        assert!(queue.mark_cancelled());
        assert_eq!(queue.in_flight(), Some(first));
        assert_eq!(queue.backlog(), 0);

        run_until_idle(&mut queue);
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 4)));
    }

    // -- 3. Clear -------------------------------------------------------------

    #[test]
    fn clear_aborts_even_a_step_marked_to_finish() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        queue.enqueue(Command::SpeedChange { speed: 1 });
        queue.poll();
        queue.mark_will_finish();

        queue.clear();
        assert!(queue.is_idle());
        assert!(!queue.model().is_moving());
        assert_eq!(queue.model().position(), Some(GridPosition::new(3, 3)));
        assert_eq!(queue.last_movement(), None);

        queue.clear();
        assert!(queue.is_idle());
        assert!(!queue.model().is_moving());
        assert_eq!(queue.model().speed(), 4);
    }

    #[test]
    fn retired_step_leaves_no_subscription_behind() {
        let mut queue = queue_at(3, 3);
        queue.enqueue(start(Direction::Up, 3, 3));
        queue.poll();
        assert_eq!(queue.model().listener_count(), 1);

        run_until_idle(&mut queue);
        // Pruning happens on the next emission.
        queue.model_mut().set_speed(7);
        assert_eq!(queue.model().listener_count(), 0);
    }

    // -- 4. Drift, rejection, acceleration -------------------------------------

    #[test]
    fn drift_is_corrected_before_animating() {
        let mut queue = queue_at(0, 0);
        queue.enqueue(start(Direction::Right, 10, 10));
        run_until_idle(&mut queue);

        assert_eq!(queue.model().position(), Some(GridPosition::new(11, 10)));
        assert_eq!(queue.stats().drift_corrections, 1);
    }

    #[test]
    fn rejected_movement_is_skipped_and_queue_continues() {
        let mut queue = queue_at(8, 8);
        queue.enqueue(start(Direction::Up, 8, 8)); // (8, 9) is blocked
        queue.enqueue(start(Direction::Left, 8, 8));
        run_until_idle(&mut queue);

        assert_eq!(queue.stats().rejected, 1);
        assert_eq!(queue.stats().movements_completed, 1);
        assert_eq!(queue.model().position(), Some(GridPosition::new(7, 8)));
    }

    #[test]
    fn backlog_at_limit_forces_immediate_finish() {
        let mut queue = queue_at(0, 0);
        queue.enqueue(start(Direction::Right, 0, 0));
        queue.poll();
        for x in 1..=3 {
            queue.enqueue(start(Direction::Right, x, 0));
        }
        assert!(queue.must_accelerate());

        // One tick: the first step is forced to land, the next one starts.
        queue.tick(DT);
        assert_eq!(queue.stats().accelerations, 1);
        assert_eq!(queue.model().position(), Some(GridPosition::new(1, 0)));
        assert_eq!(queue.backlog(), 2);
        assert!(!queue.must_accelerate());
    }

    #[test]
    fn below_limit_steps_take_their_full_duration() {
        let mut queue = queue_at(0, 0);
        queue.enqueue(start(Direction::Right, 0, 0));
        queue.enqueue(start(Direction::Right, 1, 0));
        queue.poll();

        for _ in 0..14 {
            queue.tick(DT);
        }
        assert_eq!(queue.model().position(), Some(GridPosition::new(0, 0)));
        assert_eq!(queue.stats().accelerations, 0);
    }

    #[test]
    fn queue_limit_is_clamped_to_minimum() {
        let obj = MapObject::new(catalog());
        let queue = CommandQueue::new(obj, &SyncConfig { queue_limit: 1 });
        assert_eq!(queue.queue_limit(), SyncConfig::MIN_QUEUE_LIMIT);
    }
}
