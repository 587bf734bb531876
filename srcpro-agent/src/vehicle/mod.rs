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

//! Vehicle control.
//!
//! Joystick reports and vehicle-link responses feed a five-state machine
//! (initialize → control → standby → ready, with emergency as the terminal
//! failure state) that drives a JAUS-style remote vehicle through the
//! [`VehicleLink`] capability. The machine runs on its own worker thread,
//! fed by a mutex-and-condvar queue; see [`service`].

pub mod link;
pub mod machine;
pub mod service;

pub use link::{LoggingVehicleLink, VehicleLink};
pub use machine::{VehicleState, VehicleStateMachine};
pub use service::{VehicleEvent, VehicleQueue, VehicleService};
