use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;

use tapline_core::protocol::{CommandResult, CommandStore};

type Responder = dyn Fn(i64, &str) -> Option<String> + Send + Sync;

#[derive(Default)]
struct Inner {
    commands: Vec<(i64, String)>,
    /// Raw documents per index. Reads pop until one is left, which then
    /// repeats, so a test can queue "partial, then complete".
    responses: HashMap<i64, VecDeque<String>>,
    failing_writes: usize,
    reads: usize,
}

/// In-memory [`CommandStore`]. Clones share state, so a test can keep one
/// handle while the channel owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    responder: Option<Arc<Responder>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("commands", &self.write_count())
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

impl MemoryStore {
    /// A store that never answers unless responses are pushed by hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that computes each response document when the command is
    /// written. Returning `None` leaves the command unanswered.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(i64, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::default(),
            responder: Some(Arc::new(responder)),
        }
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.lock().unwrap().failing_writes = count;
    }

    /// Queue a raw document for `index`.
    pub fn push_response(&self, index: i64, raw: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .entry(index)
            .or_default()
            .push_back(raw.into());
    }

    /// Successfully written commands, in order.
    pub fn commands(&self) -> Vec<(i64, String)> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn indices(&self) -> Vec<i64> {
        self.commands().into_iter().map(|(i, _)| i).collect()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().commands.len()
    }

    pub fn read_count(&self) -> usize {
        self.inner.lock().unwrap().reads
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn write_command(&self, index: i64, text: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.failing_writes > 0 {
                inner.failing_writes -= 1;
                bail!("simulated write failure for command {index}");
            }
            inner.commands.push((index, text.to_owned()));
        }

        if let Some(responder) = &self.responder {
            if let Some(raw) = responder(index, text) {
                self.push_response(index, raw);
            }
        }
        Ok(())
    }

    async fn read_response(&self, index: i64) -> Result<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        Ok(match inner.responses.get_mut(&index) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        })
    }
}

/// Serialize results the way the host's response writer does.
pub fn document(results: &[CommandResult]) -> String {
    serde_json::json!({ "responses": results }).to_string()
}

/// A responder that evaluates every non-empty line with `eval`.
pub fn per_line<F>(eval: F) -> impl Fn(i64, &str) -> Option<String> + Send + Sync + 'static
where
    F: Fn(&str) -> CommandResult + Send + Sync + 'static,
{
    move |_, text| {
        let results: Vec<CommandResult> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(&eval)
            .collect();
        Some(document(&results))
    }
}

/// String-literal statements evaluate to their contents (which is how
/// batch sentinels are echoed); everything else to `ok`.
pub fn echo_line(line: &str) -> CommandResult {
    match string_literal(line) {
        Some(literal) => CommandResult::success(literal),
        None => CommandResult::success("ok"),
    }
}

pub(crate) fn string_literal(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix("\";"))
}
