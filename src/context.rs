//! Service context shared by the ingestion loop and the query layer.

use crate::config::IndexConfig;
use scorestore::{GroupedStore, StoreEngine, StoreError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which of the two indexes an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// student_id -> (exam_id -> score)
    Students,
    /// exam_id -> (student_id -> score)
    Exams,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Students => write!(f, "student"),
            IndexKind::Exams => write!(f, "exam"),
        }
    }
}

/// Owned handles to both indexes.
///
/// Built once at startup and cloned into every consumer; cloning shares the
/// underlying stores.
#[derive(Clone)]
pub struct ServiceContext {
    students: Arc<dyn GroupedStore>,
    exams: Arc<dyn GroupedStore>,
}

impl ServiceContext {
    pub fn new(students: Arc<dyn GroupedStore>, exams: Arc<dyn GroupedStore>) -> Self {
        Self { students, exams }
    }

    /// Opens both indexes on `engine` under the configured names.
    pub async fn open(engine: &StoreEngine, indexes: &IndexConfig) -> Result<Self, StoreError> {
        if indexes.students == indexes.exams {
            return Err(StoreError::Config(format!(
                "student and exam indexes must have different names, both are {:?}",
                indexes.students
            )));
        }
        let students = engine.open_index(&indexes.students).await?;
        let exams = engine.open_index(&indexes.exams).await?;
        Ok(Self::new(students, exams))
    }

    pub fn index(&self, kind: IndexKind) -> &Arc<dyn GroupedStore> {
        match kind {
            IndexKind::Students => &self.students,
            IndexKind::Exams => &self.exams,
        }
    }
}
