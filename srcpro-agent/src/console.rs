// Copyright 2024 The uartcoap Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Coalescing console output.
///
/// Status frames come from several threads (the event loop, the vehicle
/// worker, link callbacks); writing them straight to stdout interleaves
/// badly with logging. Writers push whole strings here instead, and the
/// bridge's flush timer drains the queue from the event loop.
///
/// The handle is cheap to clone; all clones share one queue. The `App`
/// owns the root handle and nothing retains one across shutdown.
#[derive(Clone, Default)]
pub struct Console {
    queue: Arc<Mutex<VecDeque<String>>>,
}

impl Console {
    /// Creates an empty console queue.
    pub fn new() -> Console {
        Console::default()
    }

    /// Queues one string for the next flush. Callable from any thread.
    pub fn push(&self, message: String) {
        self.queue.lock().expect("console lock").push_back(message);
    }

    /// Writes every queued string to stdout. Runs on the event loop.
    pub fn flush(&self) {
        let pending: Vec<String> = {
            let mut queue = self.queue.lock().expect("console lock");
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for message in pending {
            let _ = out.write_all(message.as_bytes());
        }
        let _ = out.flush();
    }

    /// Number of queued strings, for tests and diagnostics.
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("console lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_queue() {
        let console = Console::new();
        let other = console.clone();
        console.push("a\n".to_string());
        other.push("b\n".to_string());
        assert_eq!(console.pending(), 2);

        console.flush();
        assert_eq!(console.pending(), 0);
        assert_eq!(other.pending(), 0);
    }
}
