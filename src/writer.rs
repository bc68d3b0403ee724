//! Dual-index writer.
//!
//! Every score event is written twice: once keyed by student, once keyed by
//! exam. The two writes are not transactional. The student index is always
//! written first, so after a partial failure the student index is the one
//! that may be ahead; the next write of the same pair repairs it.

use crate::context::{IndexKind, ServiceContext};
use crate::error::WriteError;
use crate::event::ScoreEvent;

pub struct DualIndexWriter {
    ctx: ServiceContext,
}

impl DualIndexWriter {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Upserts `event` into the student index, then the exam index.
    ///
    /// Stops at the first failure; the error names the index that failed.
    pub async fn write(&self, event: &ScoreEvent) -> Result<(), WriteError> {
        self.ctx
            .index(IndexKind::Students)
            .upsert(&event.student_id, &event.exam_id, &event.score)
            .await
            .map_err(|source| WriteError {
                index: IndexKind::Students,
                source,
            })?;

        self.ctx
            .index(IndexKind::Exams)
            .upsert(&event.exam_id, &event.student_id, &event.score)
            .await
            .map_err(|source| WriteError {
                index: IndexKind::Exams,
                source,
            })?;

        tracing::debug!(
            student_id = %event.student_id,
            exam_id = %event.exam_id,
            score = %event.score,
            "score event indexed"
        );
        Ok(())
    }
}
