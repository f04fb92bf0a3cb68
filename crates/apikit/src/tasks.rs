//! Polling for foreman_tasks records spawned by slow actions.
//!
//! Katello actions (publish, sync, remove) answer with a task record
//! instead of the changed entity. The caller polls the task on a fixed
//! interval until it reaches a terminal state or a deadline passes.

use crate::client::{Client, Scope};
use crate::error::{Error, Result};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};

/// A task is finished once it reaches one of these states.
const TERMINAL_STATES: [&str; 2] = ["stopped", "paused"];

/// Deadline and poll interval for [`wait_for_task`].
#[derive(Debug, Clone, Copy)]
pub struct TaskOptions {
    /// Give up after this much time.
    pub timeout: Duration,
    /// Sleep between status fetches.
    pub poll: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll: Duration::from_secs(4),
        }
    }
}

/// Whether a response body looks like a foreman_tasks record rather than
/// an entity.
#[must_use]
pub fn is_task(value: &Value) -> bool {
    value.get("id").is_some() && value.get("state").is_some() && value.get("started_at").is_some()
}

/// Poll a task until it reaches a terminal state, then verify it
/// succeeded. Returns the final task record.
pub fn wait_for_task(client: &dyn Client, task: Value, options: &TaskOptions) -> Result<Value> {
    let id = task_id(&task)?;
    let started = Instant::now();
    let mut task = task;
    loop {
        let state = task["state"].as_str().unwrap_or_default();
        if TERMINAL_STATES.contains(&state) {
            break;
        }
        if started.elapsed() >= options.timeout {
            return Err(Error::TaskTimeout {
                id,
                timeout: options.timeout,
            });
        }
        log::debug!("task {id} is {state}, checking again in {}s", options.poll.as_secs());
        thread::sleep(options.poll);
        task = client.show("foreman_tasks", &id, &Scope::new())?;
    }

    let result = task["result"].as_str().unwrap_or("unknown");
    if result == "success" {
        Ok(task)
    } else {
        Err(Error::TaskFailed {
            id,
            message: task_errors(&task),
        })
    }
}

fn task_id(task: &Value) -> Result<String> {
    match &task["id"] {
        Value::String(id) => Ok(id.clone()),
        Value::Number(id) => Ok(id.to_string()),
        _ => Err(Error::InvalidResponse(
            "task record carries no id".to_string(),
        )),
    }
}

fn task_errors(task: &Value) -> String {
    if let Some(errors) = task["humanized"]["errors"].as_array() {
        let joined = errors
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if !joined.is_empty() {
            return joined;
        }
    }
    task["result"].as_str().unwrap_or("unknown").to_string()
}
