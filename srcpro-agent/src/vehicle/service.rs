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
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::debug;

use crate::telemetry::CombinedReport;
use crate::vehicle::link::VehicleLink;
use crate::vehicle::machine::VehicleStateMachine;

/// How long the worker sleeps between periodic state updates when no events
/// arrive. Drives the ready-state heartbeat check.
const UPDATE_PERIOD: Duration = Duration::from_secs(1);

/// Messages consumed by the vehicle worker.
#[derive(Debug, Clone)]
pub enum VehicleEvent {
    /// A validated combined joystick + keypad report.
    JoystickInput(CombinedReport),

    /// The vehicle link completed a request; the machine should re-inspect
    /// link state.
    LinkResponse,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<VehicleEvent>,
    last_input: Option<CombinedReport>,
    running: bool,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    available: Condvar,
}

/// Producer handle for the vehicle worker's input queue.
///
/// Multi-producer: the bridge event loop posts joystick reports, link
/// callbacks post responses. Both only enqueue; FSM state is touched by the
/// worker thread alone.
#[derive(Clone, Default)]
pub struct VehicleQueue {
    shared: Arc<Shared>,
}

impl VehicleQueue {
    /// Creates an empty queue (no worker yet).
    pub fn new() -> VehicleQueue {
        VehicleQueue::default()
    }

    /// Enqueues one joystick report, coalescing consecutive identical
    /// reports into nothing.
    pub fn post_input(&self, report: CombinedReport) {
        let mut inner = self.shared.inner.lock().expect("vehicle queue lock");
        if inner.last_input.as_ref() == Some(&report) {
            return;
        }
        inner.last_input = Some(report);
        inner.queue.push_back(VehicleEvent::JoystickInput(report));
        drop(inner);
        self.shared.available.notify_one();
    }

    /// Enqueues a link-response notification. Safe to call from the link's
    /// internal callback threads.
    pub fn post_response(&self) {
        let mut inner = self.shared.inner.lock().expect("vehicle queue lock");
        inner.queue.push_back(VehicleEvent::LinkResponse);
        drop(inner);
        self.shared.available.notify_one();
    }

    /// Number of queued events; diagnostics and tests.
    pub fn pending(&self) -> usize {
        self.shared.inner.lock().expect("vehicle queue lock").queue.len()
    }
}

/// The vehicle worker thread: owns the state machine and consumes the queue
/// until stopped.
pub struct VehicleService {
    queue: VehicleQueue,
    worker: Option<JoinHandle<()>>,
}

impl VehicleService {
    /// Starts the worker thread consuming `queue` into `machine`.
    pub fn spawn<L>(queue: VehicleQueue, machine: VehicleStateMachine<L>) -> VehicleService
    where
        L: VehicleLink + 'static,
    {
        {
            let mut inner = queue.shared.inner.lock().expect("vehicle queue lock");
            inner.running = true;
        }

        let shared = queue.shared.clone();
        let worker = std::thread::spawn(move || {
            let mut machine = machine;
            loop {
                let event = {
                    let mut inner = shared.inner.lock().expect("vehicle queue lock");
                    loop {
                        if !inner.running {
                            debug!("Vehicle worker stopping");
                            return;
                        }
                        if let Some(event) = inner.queue.pop_front() {
                            break Some(event);
                        }
                        let (guard, timeout) = shared
                            .available
                            .wait_timeout(inner, UPDATE_PERIOD)
                            .expect("vehicle queue lock");
                        inner = guard;
                        if timeout.timed_out() {
                            break None;
                        }
                    }
                };

                match event {
                    Some(VehicleEvent::JoystickInput(report)) => machine.handle_input(&report),
                    Some(VehicleEvent::LinkResponse) => machine.handle_response(),
                    None => {}
                }
                machine.update(Instant::now());
            }
        });

        VehicleService {
            queue,
            worker: Some(worker),
        }
    }

    /// Stops the worker and joins it.
    pub fn stop(&mut self) {
        {
            let mut inner = self.queue.shared.inner.lock().expect("vehicle queue lock");
            if !inner.running {
                return;
            }
            inner.running = false;
        }
        self.queue.shared.available.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for VehicleService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::KeypadData;

    fn report(buttons: u16) -> CombinedReport {
        CombinedReport {
            keypad: KeypadData { buttons },
            ..Default::default()
        }
    }

    #[test]
    fn consecutive_identical_inputs_coalesce() {
        let queue = VehicleQueue::new();
        queue.post_input(report(0x0001));
        queue.post_input(report(0x0001));
        queue.post_input(report(0x0001));
        assert_eq!(queue.pending(), 1);

        queue.post_input(report(0x0000));
        queue.post_input(report(0x0001));
        assert_eq!(queue.pending(), 3);
    }

    #[test]
    fn responses_are_never_coalesced() {
        let queue = VehicleQueue::new();
        queue.post_response();
        queue.post_response();
        assert_eq!(queue.pending(), 2);
    }
}
