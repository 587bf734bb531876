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

//! Agent logic for the SRC Pro handheld controller.
//!
//! The `uartcoap` crates move CoAP frames between a UDP peer and the serial
//! link; this crate knows what the frames *mean*. It holds the catalog of
//! requests the SRC Pro understands, the decoders for its telemetry
//! payloads, the dispatch table for locally-interpreted resources, and the
//! vehicle-control state machine fed by joystick reports.

pub mod console;
pub mod display;
pub mod handlers;
pub mod payload;
pub mod ports;
pub mod resources;
pub mod telemetry;
pub mod vehicle;
