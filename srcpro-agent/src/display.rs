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

use std::sync::Arc;

use log::debug;

use uartcoap_tokio::BridgeHandle;

use crate::resources::{self, MidGen};

/// Handle for writing to the SRC Pro's two-line user display and firing its
/// vibration motors.
///
/// Cheap to clone; safe to use from any thread. Requests are composed from
/// the resource catalog and queued on the bridge's command channel.
#[derive(Clone)]
pub struct SrcDisplay {
    bridge: BridgeHandle,
    mids: Arc<MidGen>,
}

impl SrcDisplay {
    /// Creates a display handle sharing the agent's MID generator.
    pub fn new(bridge: BridgeHandle, mids: Arc<MidGen>) -> SrcDisplay {
        SrcDisplay { bridge, mids }
    }

    /// Shows two lines of text on the upper half of the user display.
    pub fn show(&self, line0: &str, line1: &str) {
        debug!("Display: '{}' / '{}'", line0, line1);
        let request = resources::post_display_lines(self.mids.next(), line0, line1, true);
        let port = request.port();
        self.bridge.send_src_request(request.message, port);
    }

    /// Fires the requested vibration motors.
    pub fn vibrate(&self, left: bool, right: bool) {
        let request = match (left, right) {
            (true, true) => resources::post_vibrate_both(self.mids.next()),
            (true, false) => resources::post_vibrate_left(self.mids.next()),
            (false, true) => resources::post_vibrate_right(self.mids.next()),
            (false, false) => return,
        };
        let port = request.port();
        self.bridge.send_src_request(request.message, port);
    }
}
