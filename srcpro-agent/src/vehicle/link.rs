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

use log::{debug, info};

use crate::console::Console;
use crate::telemetry::{normalize_axis, JoystickData};
use crate::vehicle::service::VehicleQueue;

/// Capability handle to the remote vehicle.
///
/// This is the seam to the JAUS transport: the state machine only ever talks
/// to the vehicle through these methods, and the concrete library stays out
/// of this crate. Implementations may complete requests asynchronously; when
/// they do, their callbacks must only post a
/// [`LinkResponse`](crate::vehicle::VehicleEvent::LinkResponse) to the
/// vehicle queue, never reach into machine state.
pub trait VehicleLink: Send {
    /// Looks for a vehicle offering a primitive-driver service. Returns
    /// true when one was found and selected.
    fn discover_vehicle(&mut self) -> bool;

    /// Requests exclusive control of the selected vehicle. Implementations
    /// suppress the request while an earlier one is pending. Returns true
    /// when a request is in flight (or already was).
    fn request_control(&mut self) -> bool;

    /// True while a control or status request awaits its response.
    fn request_pending(&self) -> bool;

    /// True once the vehicle confirmed control.
    fn has_control(&self) -> bool;

    /// Asks the vehicle to resume from standby.
    fn request_resume(&mut self) -> bool;

    /// Queries the vehicle's management status. Suppressed while a request
    /// is pending; returns true when the query went out.
    fn query_status(&mut self) -> bool;

    /// True once the vehicle last reported the READY state.
    fn has_ready_state(&self) -> bool;

    /// True while the vehicle's heartbeat is alive.
    fn heartbeat_alive(&self) -> bool;

    /// Streams one wrench-effort setpoint derived from the joystick axes.
    fn send_wrench_effort(&mut self, joystick: &JoystickData);
}

/// Stand-in [`VehicleLink`] used when no JAUS transport is linked in.
///
/// Every request succeeds immediately: control is granted, status reports
/// READY, the heartbeat never dies. Wrench efforts are printed to the
/// console. Useful for bench-testing the controller side of the bridge
/// without a vehicle.
pub struct LoggingVehicleLink {
    responses: VehicleQueue,
    console: Console,
    control_granted: bool,
    ready: bool,
    pending: bool,
}

impl LoggingVehicleLink {
    /// Creates a stand-in link posting completions to `responses`.
    pub fn new(responses: VehicleQueue, console: Console) -> LoggingVehicleLink {
        LoggingVehicleLink {
            responses,
            console,
            control_granted: false,
            ready: false,
            pending: false,
        }
    }
}

impl VehicleLink for LoggingVehicleLink {
    fn discover_vehicle(&mut self) -> bool {
        info!("Vehicle discovery requested (stand-in link, reporting one vehicle)");
        true
    }

    fn request_control(&mut self) -> bool {
        if self.pending {
            info!("RequestControl already pending, not sending another request");
            return true;
        }
        info!("Requesting vehicle control (stand-in link, granting)");
        self.control_granted = true;
        self.responses.post_response();
        true
    }

    fn request_pending(&self) -> bool {
        self.pending
    }

    fn has_control(&self) -> bool {
        self.control_granted
    }

    fn request_resume(&mut self) -> bool {
        info!("Requesting vehicle resume (stand-in link)");
        true
    }

    fn query_status(&mut self) -> bool {
        if self.pending {
            return false;
        }
        info!("Querying vehicle status (stand-in link, reporting READY)");
        self.ready = true;
        self.responses.post_response();
        true
    }

    fn has_ready_state(&self) -> bool {
        self.ready
    }

    fn heartbeat_alive(&self) -> bool {
        true
    }

    fn send_wrench_effort(&mut self, joystick: &JoystickData) {
        let efforts = [
            normalize_axis(joystick.left_x.value),
            normalize_axis(joystick.left_y.value),
            normalize_axis(joystick.left_z.value),
            normalize_axis(joystick.right_x.value),
            normalize_axis(joystick.right_y.value),
            normalize_axis(joystick.right_z.value),
        ];
        debug!(
            "Wrench effort: linear ({:.1}, {:.1}, {:.1}) rotational ({:.1}, {:.1}, {:.1})",
            efforts[0], efforts[1], efforts[2], efforts[3], efforts[4], efforts[5]
        );
        self.console.push(format!(
            "Wrench effort  linear {:>6.1} {:>6.1} {:>6.1}  rotational {:>6.1} {:>6.1} {:>6.1}\n",
            efforts[0], efforts[1], efforts[2], efforts[3], efforts[4], efforts[5]
        ));
    }
}
