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

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::display::SrcDisplay;
use crate::telemetry::{CombinedReport, KeypadButton};
use crate::vehicle::link::VehicleLink;

/// Cadence of the ready-state heartbeat and control checks.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Rising-edge detector for one button.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct EdgeLatch {
    pressed: bool,
}

impl EdgeLatch {
    /// Samples the current level, returning true only on a 0→1 transition.
    pub fn rising(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.pressed;
        self.pressed = pressed;
        edge
    }
}

/// The machine's active state. One variant at a time; per-variant data is
/// limited to edge latches, plus the heartbeat deadline in ready.
#[derive(Debug, Copy, Clone)]
pub enum VehicleState {
    /// Waiting for the operator to start vehicle discovery.
    Initialize {
        /// R-Down edge detector.
        r_down: EdgeLatch,
    },

    /// Vehicle selected; acquiring exclusive control.
    Control {
        /// R-Down edge detector.
        r_down: EdgeLatch,
    },

    /// Control granted; bringing the vehicle out of standby.
    Standby {
        /// R-Down edge detector.
        r_down: EdgeLatch,
    },

    /// Driving: joystick reports stream out as wrench efforts.
    Ready {
        /// Next time the heartbeat and control checks run.
        heartbeat_deadline: Instant,
    },

    /// Terminal until external reset. Inputs are ignored.
    Emergency,
}

impl VehicleState {
    fn initialize() -> VehicleState {
        VehicleState::Initialize {
            r_down: EdgeLatch::default(),
        }
    }

    fn control() -> VehicleState {
        VehicleState::Control {
            r_down: EdgeLatch::default(),
        }
    }

    fn standby() -> VehicleState {
        VehicleState::Standby {
            r_down: EdgeLatch::default(),
        }
    }

    fn ready() -> VehicleState {
        VehicleState::Ready {
            heartbeat_deadline: Instant::now() + HEARTBEAT_PERIOD,
        }
    }
}

/// The vehicle-control state machine.
///
/// Consumed from a single worker thread; a transition is an atomic swap of
/// the state variant followed by the new state's entry actions (display
/// text, vibration).
pub struct VehicleStateMachine<L: VehicleLink> {
    state: VehicleState,
    link: L,
    display: SrcDisplay,
}

impl<L: VehicleLink> VehicleStateMachine<L> {
    /// Creates the machine in the initialize state and runs its entry
    /// actions.
    pub fn new(link: L, display: SrcDisplay) -> VehicleStateMachine<L> {
        let mut machine = VehicleStateMachine {
            state: VehicleState::initialize(),
            link,
            display,
        };
        machine.enter();
        machine
    }

    /// Name of the active state, for logging and tests.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            VehicleState::Initialize { .. } => "initialize",
            VehicleState::Control { .. } => "control",
            VehicleState::Standby { .. } => "standby",
            VehicleState::Ready { .. } => "ready",
            VehicleState::Emergency => "emergency",
        }
    }

    /// Access to the link, mainly for tests and diagnostics.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Feeds one validated joystick report into the machine.
    pub fn handle_input(&mut self, report: &CombinedReport) {
        let pressed = report.keypad.is_pressed(KeypadButton::RDown);
        let r_down_edge = match &mut self.state {
            VehicleState::Initialize { r_down }
            | VehicleState::Control { r_down }
            | VehicleState::Standby { r_down } => r_down.rising(pressed),
            _ => false,
        };

        match self.state {
            VehicleState::Initialize { .. } => {
                if !r_down_edge {
                    return;
                }
                if self.link.discover_vehicle() {
                    self.display.show("Vehicle found", "Press R-Down");
                    self.transition(VehicleState::control());
                } else {
                    self.display.show("No vehicle", "Try again");
                }
            }
            VehicleState::Control { .. } => {
                if r_down_edge && !self.link.request_pending() {
                    self.link.request_control();
                    self.display.show("Requesting", "Control...");
                }
            }
            VehicleState::Standby { .. } => {
                if r_down_edge {
                    self.link.request_resume();
                    self.display.show("Requesting", "Resume state...");
                    if !self.link.request_pending() {
                        self.link.query_status();
                    }
                }
            }
            VehicleState::Ready { .. } => {
                self.link.send_wrench_effort(&report.joystick);
            }
            VehicleState::Emergency => {}
        }
    }

    /// Reacts to a completed vehicle-link request.
    pub fn handle_response(&mut self) {
        match self.state {
            VehicleState::Control { .. } => {
                if self.link.has_control() {
                    self.transition(VehicleState::standby());
                } else {
                    self.link.request_control();
                }
            }
            VehicleState::Standby { .. } => {
                if self.link.has_ready_state() {
                    self.transition(VehicleState::ready());
                } else {
                    self.link.query_status();
                }
            }
            _ => {}
        }
    }

    /// Periodic housekeeping; in ready this runs the heartbeat and control
    /// checks once per second.
    pub fn update(&mut self, now: Instant) {
        if let VehicleState::Ready { heartbeat_deadline } = self.state {
            if now < heartbeat_deadline {
                return;
            }
            self.state = VehicleState::Ready {
                heartbeat_deadline: now + HEARTBEAT_PERIOD,
            };

            if !self.link.heartbeat_alive() {
                warn!("Vehicle heartbeat lost");
                self.transition(VehicleState::Emergency);
                return;
            }
            if !self.link.has_control() {
                // Observed but deliberately not acted on; see the standby
                // dispatch left disabled in the control-loss review.
                warn!("Control no longer granted while ready");
            }
        }
    }

    fn transition(&mut self, next: VehicleState) {
        self.state = next;
        info!("Vehicle state: {}", self.state_name());
        self.enter();
    }

    fn enter(&mut self) {
        match self.state {
            VehicleState::Initialize { .. } => {
                self.display.show("Searching", "Press R-Down");
            }
            VehicleState::Control { .. } => {
                self.display.show("Control vehicle", "Press R-Down");
            }
            VehicleState::Standby { .. } => {
                self.display.show("Vehicle on standby", "Press R-Down");
            }
            VehicleState::Ready { .. } => {
                self.display.show("Ready", "Joystick active");
                self.display.vibrate(true, true);
            }
            VehicleState::Emergency => {
                self.display.show("EMERGENCY", "Vehicle disabled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::resources::MidGen;
    use crate::telemetry::{JoystickData, KeypadData};
    use crate::vehicle::service::VehicleQueue;
    use uartcoap_tokio::{BridgeConfig, UartCoapBridge};

    /// Scriptable vehicle link: every query is answered from fixed fields,
    /// and calls are counted.
    #[derive(Default)]
    struct MockVehicleLink {
        discover_ok: bool,
        control_granted: bool,
        ready: bool,
        heartbeat: bool,
        pending: bool,
        wrench_count: Arc<AtomicUsize>,
        control_requests: usize,
        status_queries: usize,
    }

    impl VehicleLink for MockVehicleLink {
        fn discover_vehicle(&mut self) -> bool {
            self.discover_ok
        }

        fn request_control(&mut self) -> bool {
            self.control_requests += 1;
            true
        }

        fn request_pending(&self) -> bool {
            self.pending
        }

        fn has_control(&self) -> bool {
            self.control_granted
        }

        fn request_resume(&mut self) -> bool {
            true
        }

        fn query_status(&mut self) -> bool {
            self.status_queries += 1;
            true
        }

        fn has_ready_state(&self) -> bool {
            self.ready
        }

        fn heartbeat_alive(&self) -> bool {
            self.heartbeat
        }

        fn send_wrench_effort(&mut self, _joystick: &JoystickData) {
            self.wrench_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn display() -> SrcDisplay {
        // A real bridge handle whose bridge never runs: requests queue up
        // harmlessly on the command channel.
        let config = BridgeConfig {
            serial_path: "/dev/null".to_string(),
            local_addr: "127.0.0.1".parse().unwrap(),
            local_port: 0,
            remote_addr: "127.0.0.1".parse().unwrap(),
            remote_port: 5683,
        };
        let (_bridge, handle) = UartCoapBridge::new(config, Box::new(|_, _| {}));
        SrcDisplay::new(handle, Arc::new(MidGen::new()))
    }

    fn machine(link: MockVehicleLink) -> VehicleStateMachine<MockVehicleLink> {
        VehicleStateMachine::new(link, display())
    }

    fn r_down() -> CombinedReport {
        CombinedReport {
            keypad: KeypadData {
                buttons: KeypadButton::RDown as u16,
            },
            ..Default::default()
        }
    }

    fn released() -> CombinedReport {
        CombinedReport::default()
    }

    #[test]
    fn progression_visits_control_and_standby_in_order() {
        let link = MockVehicleLink {
            discover_ok: true,
            control_granted: true,
            ready: true,
            heartbeat: true,
            ..Default::default()
        };
        let mut machine = machine(link);
        assert_eq!(machine.state_name(), "initialize");

        machine.handle_input(&r_down());
        assert_eq!(machine.state_name(), "control");

        // A response can't skip standby even though the link already
        // reports READY.
        machine.handle_input(&released());
        machine.handle_input(&r_down());
        machine.handle_response();
        assert_eq!(machine.state_name(), "standby");

        machine.handle_input(&released());
        machine.handle_input(&r_down());
        machine.handle_response();
        assert_eq!(machine.state_name(), "ready");
    }

    #[test]
    fn discovery_failure_stays_in_initialize() {
        let link = MockVehicleLink {
            discover_ok: false,
            ..Default::default()
        };
        let mut machine = machine(link);
        machine.handle_input(&r_down());
        assert_eq!(machine.state_name(), "initialize");
    }

    #[test]
    fn held_button_fires_once_per_state() {
        let link = MockVehicleLink {
            discover_ok: true,
            ..Default::default()
        };
        let mut machine = machine(link);
        machine.handle_input(&r_down());
        assert_eq!(machine.state_name(), "control");

        // The control state starts with a fresh latch, so the still-held
        // button fires its action once...
        machine.handle_input(&r_down());
        assert_eq!(machine.link().control_requests, 1);

        // ...and only once while held.
        machine.handle_input(&r_down());
        machine.handle_input(&r_down());
        assert_eq!(machine.link().control_requests, 1);

        machine.handle_input(&released());
        machine.handle_input(&r_down());
        assert_eq!(machine.link().control_requests, 2);
    }

    #[test]
    fn denied_control_is_rerequested_on_response() {
        let link = MockVehicleLink {
            discover_ok: true,
            control_granted: false,
            ..Default::default()
        };
        let mut machine = machine(link);
        machine.handle_input(&r_down());
        machine.handle_response();
        assert_eq!(machine.state_name(), "control");
        assert_eq!(machine.link().control_requests, 1);
    }

    #[test]
    fn ready_streams_wrench_efforts_and_loses_heartbeat() {
        let wrench_count = Arc::new(AtomicUsize::new(0));
        let link = MockVehicleLink {
            discover_ok: true,
            control_granted: true,
            ready: true,
            heartbeat: false,
            wrench_count: wrench_count.clone(),
            ..Default::default()
        };
        let mut machine = machine(link);
        machine.handle_input(&r_down());
        machine.handle_response(); // control -> standby
        machine.handle_input(&released());
        machine.handle_input(&r_down());
        machine.handle_response(); // standby -> ready
        assert_eq!(machine.state_name(), "ready");

        machine.handle_input(&released());
        assert_eq!(wrench_count.load(Ordering::Relaxed), 1);

        // The heartbeat check runs once the deadline passes and the dead
        // heartbeat forces emergency.
        machine.update(Instant::now() + Duration::from_secs(5));
        assert_eq!(machine.state_name(), "emergency");

        // Emergency ignores everything.
        machine.handle_input(&r_down());
        machine.handle_response();
        assert_eq!(machine.state_name(), "emergency");
        assert_eq!(wrench_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn control_loss_in_ready_does_not_transition() {
        let link = MockVehicleLink {
            discover_ok: true,
            control_granted: true,
            ready: true,
            heartbeat: true,
            ..Default::default()
        };
        let mut machine = machine(link);
        machine.handle_input(&r_down());
        machine.handle_response();
        machine.handle_input(&released());
        machine.handle_input(&r_down());
        machine.handle_response();
        assert_eq!(machine.state_name(), "ready");

        // Drop control afterwards; the periodic check observes but stays.
        // (Recorded product decision.)
        machine.link_mut().control_granted = false;
        machine.update(Instant::now() + Duration::from_secs(5));
        assert_eq!(machine.state_name(), "ready");
    }
}
