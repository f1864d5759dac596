use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::markup::{CommentId, StrokeId};
use crate::store::{StoreCommand, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Failed(StoreError),
}

/// A submitted write that has not succeeded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub id: OperationId,
    pub command: StoreCommand,
    pub status: OperationStatus,
    cascade: Option<StrokeId>,
}

impl PendingOp {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OperationStatus::Failed(_))
    }

    pub(crate) fn cascade(&self) -> Option<&StrokeId> {
        self.cascade.as_ref()
    }
}

/// A command handed to the host for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub id: OperationId,
    pub command: StoreCommand,
}

#[derive(Debug, Default)]
struct Cascade {
    remaining: HashSet<OperationId>,
    failures: Vec<StoreError>,
    stroke_delete: Option<OperationId>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CascadeStep {
    Waiting,
    Finished(StrokeId),
    Failed {
        stroke_id: StrokeId,
        failures: Vec<StoreError>,
    },
}

/// Outbox plus the status of every write that has not succeeded.
#[derive(Debug, Default)]
pub(crate) struct OperationTracker {
    next_id: u64,
    ops: BTreeMap<OperationId, PendingOp>,
    outbox: VecDeque<OperationId>,
    cascades: HashMap<StrokeId, Cascade>,
}

impl OperationTracker {
    pub(crate) fn submit(&mut self, command: StoreCommand) -> OperationId {
        self.submit_tagged(command, None)
    }

    fn submit_tagged(&mut self, command: StoreCommand, cascade: Option<StrokeId>) -> OperationId {
        self.next_id += 1;
        let id = OperationId(self.next_id);
        tracing::debug!(%id, operation = %command.operation(), target = command.target(), "queued store command");
        self.ops.insert(
            id,
            PendingOp {
                id,
                command,
                status: OperationStatus::Pending,
                cascade,
            },
        );
        self.outbox.push_back(id);
        id
    }

    pub(crate) fn take_queued(&mut self) -> Vec<QueuedCommand> {
        let ops = &self.ops;
        self.outbox
            .drain(..)
            .filter_map(|id| {
                ops.get(&id).map(|op| QueuedCommand {
                    id,
                    command: op.command.clone(),
                })
            })
            .collect()
    }

    pub(crate) fn get(&self, id: OperationId) -> Option<&PendingOp> {
        self.ops.get(&id)
    }

    pub(crate) fn remove(&mut self, id: OperationId) -> Option<PendingOp> {
        self.outbox.retain(|queued| *queued != id);
        self.ops.remove(&id)
    }

    pub(crate) fn mark_failed(&mut self, id: OperationId, error: StoreError) {
        if let Some(op) = self.ops.get_mut(&id) {
            op.status = OperationStatus::Failed(error);
        }
    }

    /// Puts a failed operation back into the outbox.
    pub(crate) fn requeue(&mut self, id: OperationId) -> bool {
        let Some(op) = self.ops.get_mut(&id) else {
            return false;
        };
        if !op.is_failed() {
            return false;
        }
        op.status = OperationStatus::Pending;
        self.outbox.push_back(id);
        true
    }

    pub(crate) fn all(&self) -> impl Iterator<Item = &PendingOp> {
        self.ops.values()
    }

    /// The failed create for `stroke`, if its only copy is local.
    pub(crate) fn failed_create_of(&self, stroke: &StrokeId) -> Option<OperationId> {
        self.ops.values().find_map(|op| match &op.command {
            StoreCommand::CreateStroke(record) if &record.id == stroke && op.is_failed() => {
                Some(op.id)
            }
            _ => None,
        })
    }

    pub(crate) fn in_cascade(&self, stroke: &StrokeId) -> bool {
        self.cascades.contains_key(stroke)
    }

    /// Drops every create for `stroke` and its comments that is not in flight.
    ///
    /// Creates already handed to the host stay tracked; their completion is
    /// still reported.
    pub(crate) fn cancel_creates_for(&mut self, stroke: &StrokeId) -> usize {
        let outbox = &self.outbox;
        let cancelled: Vec<OperationId> = self
            .ops
            .values()
            .filter(|op| {
                let targets_stroke = match &op.command {
                    StoreCommand::CreateStroke(record) => &record.id == stroke,
                    StoreCommand::CreateComment(comment) => &comment.markup_id == stroke,
                    _ => false,
                };
                targets_stroke && (op.is_failed() || outbox.contains(&op.id))
            })
            .map(|op| op.id)
            .collect();
        for id in &cancelled {
            self.remove(*id);
        }
        if !cancelled.is_empty() {
            tracing::debug!(%stroke, cancelled = cancelled.len(), "cancelled creates for deleted stroke");
        }
        cancelled.len()
    }

    /// Adds a late comment to a cascade that has not reached its stroke delete.
    pub(crate) fn join_cascade(&mut self, stroke: &StrokeId, comment: CommentId) -> bool {
        match self.cascades.get(stroke) {
            Some(cascade) if cascade.stroke_delete.is_none() => {}
            _ => return false,
        }
        let id = self.submit_tagged(StoreCommand::DeleteComment(comment), Some(stroke.clone()));
        if let Some(cascade) = self.cascades.get_mut(stroke) {
            cascade.remaining.insert(id);
        }
        true
    }

    /// Forgets failed creates whose stroke reached the server anyway.
    pub(crate) fn drop_confirmed_creates(&mut self, confirmed: impl Fn(&StrokeId) -> bool) {
        self.ops.retain(|_, op| match &op.command {
            StoreCommand::CreateStroke(record) => !(op.is_failed() && confirmed(&record.id)),
            _ => true,
        });
    }

    /// Starts deleting `stroke`: its comments first, the stroke once they are gone.
    pub(crate) fn begin_cascade(&mut self, stroke: StrokeId, comments: Vec<CommentId>) {
        let mut cascade = Cascade::default();
        for comment in comments {
            let id = self.submit_tagged(StoreCommand::DeleteComment(comment), Some(stroke.clone()));
            cascade.remaining.insert(id);
        }
        if cascade.remaining.is_empty() {
            let id = self.submit_tagged(StoreCommand::DeleteStroke(stroke.clone()), Some(stroke.clone()));
            cascade.stroke_delete = Some(id);
        }
        self.cascades.insert(stroke, cascade);
    }

    /// Records the outcome of one cascade step. The op itself must already be removed.
    pub(crate) fn advance_cascade(
        &mut self,
        stroke: &StrokeId,
        op: OperationId,
        result: StoreResult<()>,
    ) -> CascadeStep {
        let Some(cascade) = self.cascades.get_mut(stroke) else {
            return CascadeStep::Waiting;
        };
        if let Err(error) = result {
            cascade.failures.push(error);
        }

        if cascade.stroke_delete == Some(op) {
            return self.close_cascade(stroke);
        }
        cascade.remaining.remove(&op);
        if !cascade.remaining.is_empty() {
            return CascadeStep::Waiting;
        }
        if !cascade.failures.is_empty() {
            return self.close_cascade(stroke);
        }
        let id = self.submit_tagged(StoreCommand::DeleteStroke(stroke.clone()), Some(stroke.clone()));
        if let Some(cascade) = self.cascades.get_mut(stroke) {
            cascade.stroke_delete = Some(id);
        }
        CascadeStep::Waiting
    }

    fn close_cascade(&mut self, stroke: &StrokeId) -> CascadeStep {
        let failures = self
            .cascades
            .remove(stroke)
            .map(|cascade| cascade.failures)
            .unwrap_or_default();
        if failures.is_empty() {
            CascadeStep::Finished(stroke.clone())
        } else {
            CascadeStep::Failed {
                stroke_id: stroke.clone(),
                failures,
            }
        }
    }
}
