use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a task. `done` and `skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Done,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub goal: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Latest reviewer instruction for a task that was not accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Task {
    pub fn pending(id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            status: TaskStatus::Pending,
            retries: 0,
            last_result: None,
            completed_at: None,
            feedback: None,
            skip_reason: None,
        }
    }
}

/// Ordered task queue plus any reserved top-level fields.
///
/// Unknown fields are carried through load/save untouched and in their
/// original order, with `tasks` written back at the position it was read from.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub reserved: Map<String, Value>,
    /// Number of reserved fields that precede `tasks` in the document.
    #[serde(skip)]
    pub tasks_position: usize,
}

impl ProjectState {
    /// Top-level document with `tasks` spliced back among the reserved fields.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        let mut tasks = Some(serde_json::to_value(&self.tasks)?);
        let mut doc = Map::with_capacity(self.reserved.len() + 1);
        for (index, (key, value)) in self.reserved.iter().enumerate() {
            if index == self.tasks_position {
                doc.insert("tasks".to_string(), tasks.take().unwrap_or_default());
            }
            doc.insert(key.clone(), value.clone());
        }
        if let Some(tasks) = tasks {
            doc.insert("tasks".to_string(), tasks);
        }
        Ok(Value::Object(doc))
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }
}

pub fn default_state() -> ProjectState {
    ProjectState::default()
}
