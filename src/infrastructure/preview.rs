//! Preview event bus: broadcasts preview events to any number of subscribers
//! and keeps the browser console lines reported back by the preview.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::traits::PreviewSink;
use crate::domain::types::PreviewEvent;

const CHANNEL_CAPACITY: usize = 64;

pub struct PreviewBus {
    sender: broadcast::Sender<PreviewEvent>,
    console: Mutex<VecDeque<String>>,
    console_capacity: usize,
}

impl PreviewBus {
    pub fn new(console_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            console: Mutex::new(VecDeque::new()),
            console_capacity: console_capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.sender.subscribe()
    }

    /// Records a console line coming back from the preview.
    pub fn push_console(&self, line: &str) {
        let Ok(mut console) = self.console.lock() else {
            return;
        };
        console.push_back(line.to_string());
        while console.len() > self.console_capacity {
            console.pop_front();
        }
    }
}

impl PreviewSink for PreviewBus {
    fn emit(&self, event: PreviewEvent) -> Result<()> {
        // No subscriber means no preview is open, which is fine.
        if self.sender.send(event).is_err() {
            debug!("Preview event dropped: no subscribers");
        }
        Ok(())
    }

    fn console_output(&self) -> Vec<String> {
        self.console
            .lock()
            .map(|console| console.iter().cloned().collect())
            .unwrap_or_default()
    }
}
