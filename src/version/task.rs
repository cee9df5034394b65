//! Index task bookkeeping carried by a version.
//!
//! The queue lists maintenance tasks (merges, schema rewrites, ...) that the
//! partition still has to run. The history keeps a bounded log of tasks that
//! already produced a version, grouped by task type.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::version::{INVALID_VERSION_ID, VersionId};

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTaskState {
    Pending,
    Suspended,
    Aborted,
    Done,
}

/// A task waiting in (or finished from) the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTaskMeta {
    pub task_type: String,
    pub task_trace_id: String,
    pub task_name: String,

    #[serde(default)]
    pub params: BTreeMap<String, String>,

    pub state: IndexTaskState,

    #[serde(default)]
    pub begin_time_secs: i64,

    #[serde(default)]
    pub end_time_secs: i64,

    #[serde(default = "invalid_version_id")]
    pub committed_version_id: VersionId,

    #[serde(default)]
    pub comment: String,
}

fn invalid_version_id() -> VersionId {
    INVALID_VERSION_ID
}

impl IndexTaskMeta {
    pub fn new<S: Into<String>>(task_type: S, task_trace_id: S, task_name: S) -> Self {
        IndexTaskMeta {
            task_type: task_type.into(),
            task_trace_id: task_trace_id.into(),
            task_name: task_name.into(),
            params: BTreeMap::new(),
            state: IndexTaskState::Pending,
            begin_time_secs: 0,
            end_time_secs: 0,
            committed_version_id: INVALID_VERSION_ID,
            comment: String::new(),
        }
    }
}

/// Ordered queue of index tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexTaskQueue {
    tasks: Vec<IndexTaskMeta>,
}

impl IndexTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[IndexTaskMeta] {
        &self.tasks
    }

    /// Queue a task. A task with the same type and name is replaced and
    /// returns to the pending state.
    pub fn add(&mut self, task: IndexTaskMeta) {
        match self.find_mut(&task.task_type, &task.task_name) {
            Some(existing) => {
                existing.task_trace_id = task.task_trace_id;
                existing.params = task.params;
                existing.state = IndexTaskState::Pending;
                existing.begin_time_secs = task.begin_time_secs;
                existing.end_time_secs = 0;
                existing.committed_version_id = INVALID_VERSION_ID;
                existing.comment = task.comment;
            }
            None => self.tasks.push(task),
        }
    }

    pub fn get(&self, task_type: &str, task_name: &str) -> Option<&IndexTaskMeta> {
        self.tasks
            .iter()
            .find(|t| t.task_type == task_type && t.task_name == task_name)
    }

    pub fn suspend(&mut self, task_type: &str, task_name: &str) -> bool {
        self.transition(task_type, task_name, IndexTaskState::Pending, IndexTaskState::Suspended)
    }

    pub fn resume(&mut self, task_type: &str, task_name: &str) -> bool {
        self.transition(task_type, task_name, IndexTaskState::Suspended, IndexTaskState::Pending)
    }

    /// Abort a task that has not finished.
    pub fn abort(&mut self, task_type: &str, task_name: &str) -> bool {
        match self.find_mut(task_type, task_name) {
            Some(task) if task.state != IndexTaskState::Done => {
                task.state = IndexTaskState::Aborted;
                true
            }
            _ => false,
        }
    }

    /// Mark a task finished by `committed_version_id`.
    pub fn done(
        &mut self,
        task_type: &str,
        task_name: &str,
        committed_version_id: VersionId,
        end_time_secs: i64,
    ) -> bool {
        match self.find_mut(task_type, task_name) {
            Some(task) if task.state == IndexTaskState::Pending => {
                task.state = IndexTaskState::Done;
                task.committed_version_id = committed_version_id;
                task.end_time_secs = end_time_secs;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, task_type: &str, task_name: &str) -> bool {
        let before = self.tasks.len();
        self.tasks
            .retain(|t| !(t.task_type == task_type && t.task_name == task_name));
        self.tasks.len() != before
    }

    pub fn pending_tasks(&self) -> impl Iterator<Item = &IndexTaskMeta> {
        self.tasks
            .iter()
            .filter(|t| t.state == IndexTaskState::Pending)
    }

    fn transition(
        &mut self,
        task_type: &str,
        task_name: &str,
        from: IndexTaskState,
        to: IndexTaskState,
    ) -> bool {
        match self.find_mut(task_type, task_name) {
            Some(task) if task.state == from => {
                task.state = to;
                true
            }
            _ => false,
        }
    }

    fn find_mut(&mut self, task_type: &str, task_name: &str) -> Option<&mut IndexTaskMeta> {
        self.tasks
            .iter_mut()
            .find(|t| t.task_type == task_type && t.task_name == task_name)
    }
}

/// One completed task run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTaskLog {
    pub task_id: String,
    pub base_version: VersionId,
    pub target_version: VersionId,
    pub trigger_timestamp: i64,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Default number of logs kept per task type.
pub const DEFAULT_MAX_LOGS_PER_TYPE: usize = 20;

/// Bounded per-type log of completed tasks, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexTaskHistory {
    logs: BTreeMap<String, VecDeque<IndexTaskLog>>,
}

impl IndexTaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Record a log, evicting the oldest entries beyond `max_per_type`.
    pub fn add_log<S: Into<String>>(
        &mut self,
        task_type: S,
        log: IndexTaskLog,
        max_per_type: usize,
    ) {
        let entries = self.logs.entry(task_type.into()).or_default();
        entries.push_back(log);
        while entries.len() > max_per_type.max(1) {
            entries.pop_front();
        }
    }

    pub fn logs(&self, task_type: &str) -> impl Iterator<Item = &IndexTaskLog> {
        self.logs.get(task_type).into_iter().flatten()
    }

    pub fn latest(&self, task_type: &str) -> Option<&IndexTaskLog> {
        self.logs.get(task_type).and_then(|entries| entries.back())
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.logs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(task_id: &str, base: VersionId, target: VersionId) -> IndexTaskLog {
        IndexTaskLog {
            task_id: task_id.to_string(),
            base_version: base,
            target_version: target,
            trigger_timestamp: 100,
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn test_queue_lifecycle() {
        let mut queue = IndexTaskQueue::new();
        queue.add(IndexTaskMeta::new("merge", "trace-1", "full_merge"));
        queue.add(IndexTaskMeta::new("alter_table", "trace-2", "add_field"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_tasks().count(), 2);

        assert!(queue.suspend("merge", "full_merge"));
        assert!(!queue.suspend("merge", "full_merge"));
        assert!(!queue.done("merge", "full_merge", 3, 10));
        assert!(queue.resume("merge", "full_merge"));
        assert!(queue.done("merge", "full_merge", 3, 10));

        let task = queue.get("merge", "full_merge").unwrap();
        assert_eq!(task.state, IndexTaskState::Done);
        assert_eq!(task.committed_version_id, 3);
        assert!(!queue.abort("merge", "full_merge"));

        assert!(queue.abort("alter_table", "add_field"));
        assert!(queue.remove("alter_table", "add_field"));
        assert!(!queue.remove("alter_table", "add_field"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_re_add_resets_task() {
        let mut queue = IndexTaskQueue::new();
        queue.add(IndexTaskMeta::new("merge", "t1", "m"));
        queue.done("merge", "m", 5, 1);

        let mut again = IndexTaskMeta::new("merge", "t2", "m");
        again.params.insert("level".to_string(), "2".to_string());
        queue.add(again);

        let task = queue.get("merge", "m").unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(task.state, IndexTaskState::Pending);
        assert_eq!(task.task_trace_id, "t2");
        assert_eq!(task.committed_version_id, INVALID_VERSION_ID);
    }

    #[test]
    fn test_history_is_bounded_per_type() {
        let mut history = IndexTaskHistory::new();
        for i in 0..5 {
            history.add_log("merge", log(&format!("m{i}"), i, i + 1), 3);
        }
        history.add_log("reclaim", log("r0", 0, 1), 3);

        let ids: Vec<_> = history.logs("merge").map(|l| l.task_id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
        assert_eq!(history.latest("merge").unwrap().target_version, 5);
        assert_eq!(history.task_types().collect::<Vec<_>>(), vec!["merge", "reclaim"]);
        assert_eq!(history.logs("missing").count(), 0);
    }
}
