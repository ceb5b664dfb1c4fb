//! Scripted in-memory page source for sweep and watcher tests

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use listing_client::{Error, Item, PageSource, Result};

pub(crate) fn item(name: &str) -> Item {
    Item::new(name, serde_json::json!({ "name": name }))
}

pub(crate) fn page(names: &[&str]) -> Vec<Item> {
    names.iter().map(|n| item(n)).collect()
}

pub(crate) fn names(items: &[Item]) -> Vec<String> {
    items.iter().map(|i| i.name.clone()).collect()
}

pub(crate) fn failure() -> Result<Vec<Item>> {
    Err(Error::Status { status: 500 })
}

/// Replays queued responses in order; an empty queue yields empty pages.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<Item>>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedSource {
    pub(crate) fn new(responses: Vec<Result<Vec<Item>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(path, after)` requested so far.
    pub(crate) fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn cursors(&self) -> Vec<Option<String>> {
        self.calls().into_iter().map(|(_, after)| after).collect()
    }
}

impl PageSource for ScriptedSource {
    fn id(&self) -> &str {
        "scripted"
    }

    fn fetch_page<'a>(
        &'a self,
        path: &'a str,
        after: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), after.map(str::to_string)));
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move { next.unwrap_or_else(|| Ok(Vec::new())) })
    }
}
