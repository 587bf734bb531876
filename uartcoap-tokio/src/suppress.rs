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

use log::{log, Level};

/// Coalesces log messages that a single persistent condition would otherwise
/// emit over and over.
///
/// The first occurrence is logged, then only occurrences at powers of two,
/// each annotated with the running count. [`clear`](SuppressedLog::clear)
/// resets the counter once the condition goes away.
#[derive(Debug)]
pub struct SuppressedLog {
    level: Level,
    count: u64,
    threshold: u64,
}

impl SuppressedLog {
    /// Creates a suppressor that logs at `level`.
    pub fn new(level: Level) -> SuppressedLog {
        SuppressedLog {
            level,
            count: 0,
            threshold: 1,
        }
    }

    /// Counts one occurrence, emitting it when the threshold is reached.
    pub fn log(&mut self, message: &str) {
        self.count += 1;

        if self.count >= self.threshold {
            if self.count == 1 {
                log!(self.level, "{}", message);
            } else {
                log!(self.level, "{} (x{})", message, self.count);
            }
            self.threshold *= 2;
        }
    }

    /// Resets the counter after the condition clears.
    pub fn clear(&mut self) {
        self.count = 0;
        self.threshold = 1;
    }
}
