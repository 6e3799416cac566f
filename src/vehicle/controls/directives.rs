use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

/// What a directive asks the vehicle to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Move the vehicle.
    Drive,
    /// Toggle reporting of the accumulated traveled distance.
    ReportDistance,
    /// Informational marker with no motion.
    Mark,
    /// Rotate on the spot.
    TurnInPlace,
}

/// How a motion directive decides it is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistMode {
    /// Drive for the distance (or angle) in `target`.
    Target,
    /// Stop when roughly `target` cm away from the front obstacle.
    StopNearObstacle,
    /// Stop when the left IR distance rises above `target`.
    StopLeftAbove,
    /// Stop when the right IR distance rises above `target`.
    StopRightAbove,
    /// Stop when the left IR distance falls below `target`.
    StopLeftBelow,
    /// Stop when the right IR distance falls below `target`.
    StopRightBelow,
}

/// One queued motion or informational instruction.
///
/// Produced by the byte-command parser, held by the [`DirectiveQueue`] and
/// consumed by the control loop. `label` is the token echoed back on
/// completion when `should_ack` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    /// Operation requested.
    pub op_kind: OpKind,
    /// Completion rule for motion directives.
    pub dist_mode: DistMode,
    /// Whether completion must be acknowledged on the channel.
    pub should_ack: bool,
    /// Token echoed in the completion acknowledgment.
    pub label: String,
    /// -1 backward, 0 stop, 1 forward.
    pub dir: i8,
    /// Speed, 0 to 100.
    pub speed: u8,
    /// Steering angle in degrees, -25 to 25.
    pub steer_angle: f64,
    /// Distance in cm, or angle in degrees for turns.
    pub target: f64,
}

impl Directive {
    /// Creates a drive directive.
    ///
    /// # Arguments
    ///
    /// * `dist_mode` - Completion rule.
    /// * `dir` - -1 backward, 0 stop, 1 forward.
    /// * `speed` - Speed, 0 to 100.
    /// * `steer_angle` - Steering angle in degrees.
    /// * `target` - Distance in cm (angle in degrees when steering).
    pub fn drive(dist_mode: DistMode, dir: i8, speed: u8, steer_angle: f64, target: f64) -> Self {
        Directive {
            op_kind: OpKind::Drive,
            dist_mode,
            should_ack: false,
            label: String::new(),
            dir,
            speed,
            steer_angle,
            target,
        }
    }

    /// Creates a turn-in-place directive for `angle_deg` degrees.
    pub fn turn_in_place(dir: i8, speed: u8, angle_deg: f64) -> Self {
        Directive {
            op_kind: OpKind::TurnInPlace,
            dist_mode: DistMode::Target,
            should_ack: false,
            label: String::new(),
            dir,
            speed,
            steer_angle: 0.0,
            target: angle_deg,
        }
    }

    /// Creates an informational marker directive.
    pub fn marker() -> Self {
        Directive {
            op_kind: OpKind::Mark,
            dist_mode: DistMode::Target,
            should_ack: false,
            label: String::new(),
            dir: 0,
            speed: 0,
            steer_angle: 0.0,
            target: 0.0,
        }
    }

    /// Creates a distance-report toggle directive.
    pub fn report_distance() -> Self {
        Directive {
            op_kind: OpKind::ReportDistance,
            ..Directive::marker()
        }
    }

    /// Requests a completion acknowledgment carrying `label`.
    pub fn with_ack(mut self, label: impl Into<String>) -> Self {
        self.should_ack = true;
        self.label = label.into();
        self
    }
}

/// Returns whether two directives describe one continuous maneuver.
///
/// Consecutive directives with the same operation, completion rule and
/// direction may be joined without a stop-start boundary, so the control
/// loop skips the deceleration between them. Speed and steering angle do
/// not participate: they may change mid-maneuver.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::controls::directives::{types_match, DistMode, Directive};
///
/// let a = Directive::drive(DistMode::Target, 1, 50, 0.0, 30.0);
/// let b = Directive::drive(DistMode::Target, 1, 70, 0.0, 20.0);
/// let c = Directive::drive(DistMode::Target, -1, 50, 0.0, 30.0);
/// assert!(types_match(&a, &b));
/// assert!(!types_match(&a, &c));
/// ```
pub fn types_match(a: &Directive, b: &Directive) -> bool {
    a.op_kind == b.op_kind && a.dist_mode == b.dist_mode && a.dir == b.dir
}

/// Receives directive-completion acknowledgments.
///
/// The transport collaborator owns the acknowledgment format; the queue
/// only reports which directive finished.
pub trait CompletionSink {
    /// Called once per finished directive with `should_ack` set.
    fn directive_finished(&mut self, directive: &Directive);
}

/// Error returned when the directive pool is exhausted.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The pool has no free slot; the rejected directive is returned.
    #[error("directive pool exhausted")]
    Full(Directive),
}

/// Handle to a popped directive occupying a pool slot.
///
/// Obtained from [`DirectiveQueue::pop_head`]; the slot is released by
/// [`DirectiveQueue::finish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectiveHandle(usize);

enum Slot {
    /// On the free list.
    Free,
    /// Waiting in FIFO order; `next` links toward the tail.
    Queued { d: Directive, next: Option<usize> },
    /// Popped by the control loop, not yet finished.
    Active { d: Directive },
}

/// FIFO of motion directives over a fixed pool of slots.
///
/// Directives move through `Queued -> Active -> Released`: the parser
/// enqueues, the control loop pops a [`DirectiveHandle`] and, once the
/// maneuver completes, calls [`finish`](DirectiveQueue::finish), which
/// acknowledges and returns the slot to the pool. No allocation happens
/// after construction.
///
/// The queue itself is single-context; when the enqueue side runs in a
/// serial-receive interrupt, wrap the queue with
/// [`into_shared`](DirectiveQueue::into_shared) and keep each lock section
/// to the single pointer mutation.
///
/// # Examples
///
/// ```rust
/// use robopilot::vehicle::controls::directives::{DirectiveQueue, DistMode, Directive, OpKind};
///
/// let mut queue = DirectiveQueue::with_capacity(8);
/// queue.enqueue(Directive::drive(DistMode::Target, 1, 50, 0.0, 30.0)).unwrap();
/// queue.enqueue(Directive::marker()).unwrap();
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.peek_head().unwrap().op_kind, OpKind::Drive);
/// ```
pub struct DirectiveQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

/// Directive queue shared between the enqueue context and the control loop.
pub type SharedDirectiveQueue = Arc<Mutex<DirectiveQueue>>;

impl DirectiveQueue {
    /// Creates a queue backed by `capacity` pool slots.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue needs at least one slot");
        DirectiveQueue {
            slots: (0..capacity).map(|_| Slot::Free).collect(),
            free: (0..capacity).rev().collect(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Wraps the queue for cross-context sharing.
    pub fn into_shared(self) -> SharedDirectiveQueue {
        Arc::new(Mutex::new(self))
    }

    /// Number of queued (not yet popped) directives.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a directive at the tail.
    ///
    /// # Arguments
    ///
    /// * `directive` - Directive to queue.
    ///
    /// # Returns
    ///
    /// `Err(QueueError::Full)` carrying the directive back when the pool is
    /// exhausted.
    pub fn enqueue(&mut self, directive: Directive) -> Result<(), QueueError> {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                warn!("directive pool exhausted, rejecting {:?}", directive.op_kind);
                return Err(QueueError::Full(directive));
            }
        };

        self.slots[idx] = Slot::Queued {
            d: directive,
            next: None,
        };

        match self.tail {
            Some(tail) => {
                if let Slot::Queued { next, .. } = &mut self.slots[tail] {
                    *next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;

        Ok(())
    }

    /// Appends parsed directives preserving their order.
    ///
    /// This is the landing point of the byte-command parser: whatever order
    /// the parser produced is the order the control loop sees.
    ///
    /// # Arguments
    ///
    /// * `directives` - Directives in arrival order.
    ///
    /// # Returns
    ///
    /// `Err` on the first directive that no longer fits; earlier ones stay
    /// queued.
    pub fn enqueue_all<I>(&mut self, directives: I) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = Directive>,
    {
        for directive in directives {
            self.enqueue(directive)?;
        }
        Ok(())
    }

    /// Returns the front directive without removing it.
    pub fn peek_head(&self) -> Option<&Directive> {
        self.queued(self.head?)
    }

    /// Returns the first queued directive with `OpKind::Drive`.
    ///
    /// Scans forward from the head, skipping informational directives,
    /// without mutating the queue. Used by the control loop to look ahead
    /// for continuous-motion planning.
    pub fn peek_next_drive(&self) -> Option<&Directive> {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match &self.slots[idx] {
                Slot::Queued { d, next } => {
                    if d.op_kind == OpKind::Drive {
                        return Some(d);
                    }
                    cursor = *next;
                }
                _ => unreachable!("FIFO links only reference queued slots"),
            }
        }
        None
    }

    /// Removes the front directive and hands out its handle.
    ///
    /// The directive stays in its pool slot (readable through
    /// [`get`](DirectiveQueue::get)) until [`finish`](DirectiveQueue::finish)
    /// releases it.
    pub fn pop_head(&mut self) -> Option<DirectiveHandle> {
        let idx = self.head?;

        let (d, next) = match std::mem::replace(&mut self.slots[idx], Slot::Free) {
            Slot::Queued { d, next } => (d, next),
            _ => unreachable!("head always references a queued slot"),
        };

        self.head = next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.slots[idx] = Slot::Active { d };
        self.len -= 1;

        Some(DirectiveHandle(idx))
    }

    /// Returns the directive behind a handle.
    pub fn get(&self, handle: DirectiveHandle) -> Option<&Directive> {
        match &self.slots[handle.0] {
            Slot::Active { d } => Some(d),
            _ => None,
        }
    }

    /// Completes a popped directive and releases its slot.
    ///
    /// Emits the completion acknowledgment through `sink` when the
    /// directive asked for one. Finishing a handle twice is a programming
    /// error and panics.
    ///
    /// # Arguments
    ///
    /// * `handle` - Handle returned by [`pop_head`](DirectiveQueue::pop_head).
    /// * `sink` - Acknowledgment transport.
    pub fn finish(&mut self, handle: DirectiveHandle, sink: &mut dyn CompletionSink) {
        match std::mem::replace(&mut self.slots[handle.0], Slot::Free) {
            Slot::Active { d } => {
                if d.should_ack {
                    sink.directive_finished(&d);
                }
                debug!("directive finished: {:?} \"{}\"", d.op_kind, d.label);
                self.free.push(handle.0);
            }
            _ => panic!("finish on a directive that is not active"),
        }
    }

    fn queued(&self, idx: usize) -> Option<&Directive> {
        match &self.slots[idx] {
            Slot::Queued { d, .. } => Some(d),
            _ => None,
        }
    }
}
