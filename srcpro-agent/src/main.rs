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

use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use uartcoap_tokio::{BridgeConfig, BridgeHandle, UartCoapBridge};

use srcpro_agent::console::Console;
use srcpro_agent::display::SrcDisplay;
use srcpro_agent::handlers;
use srcpro_agent::resources::{self, MidGen, ResourceRequest};
use srcpro_agent::vehicle::{LoggingVehicleLink, VehicleQueue, VehicleService, VehicleStateMachine};

/// CoAP bridge agent for the SRC Pro handheld controller.
#[derive(Parser, Debug)]
#[command(name = "srcpro-agent", version, about)]
struct Cli {
    /// Serial device connected to the SRC Pro
    #[arg(short = 'd', long, default_value = "/dev/ttyACM0")]
    device: String,

    /// Local network address to bind for CoAP traffic
    #[arg(short = 'n', long = "net")]
    local_addr: IpAddr,

    /// Local CoAP UDP port
    #[arg(short = 'p', long = "port")]
    local_port: u16,

    /// Remote peer carrying the vehicle-side CoAP traffic
    #[arg(short = 'r', long)]
    remote: IpAddr,

    /// Remote CoAP server port
    #[arg(short = 'q', long, default_value_t = 5683)]
    remote_port: u16,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    if simple_logger::init_with_level(level).is_err() {
        eprintln!("Logger setup failed");
    }

    info!("srcpro-agent version {}", env!("CARGO_PKG_VERSION"));
    info!("Using serial port = {}", cli.device);
    info!(
        "Listening for CoAP traffic from {}:{}",
        cli.remote, cli.remote_port
    );
    info!("Hosting CoAP on {}:{}", cli.local_addr, cli.local_port);

    if let Err(err) = run(cli) {
        error!("Stopping srcpro-agent due to fatal error: {}", err);
        std::process::exit(2);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let console = Console::new();
    let mids = Arc::new(MidGen::new());
    let inputs = VehicleQueue::new();

    let config = BridgeConfig {
        serial_path: cli.device,
        local_addr: cli.local_addr,
        local_port: cli.local_port,
        remote_addr: cli.remote,
        remote_port: cli.remote_port,
    };

    let handler = handlers::internal_handler(inputs.clone(), console.clone());
    let (mut bridge, handle) = UartCoapBridge::new(config, Box::new(handler));

    let flush_console = console.clone();
    bridge.set_console_flush(Box::new(move || flush_console.flush()));

    // Explicit construction, wired top-down: the link posts completions to
    // the vehicle queue, the machine drives the SRC display through the
    // bridge handle, and the worker thread owns the machine.
    let display = SrcDisplay::new(handle.clone(), mids.clone());
    let link = LoggingVehicleLink::new(inputs.clone(), console.clone());
    let machine = VehicleStateMachine::new(link, display);
    let mut service = VehicleService::spawn(inputs, machine);

    startup_requests(&handle, &mids);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(bridge.run());

    service.stop();
    console.flush();

    result?;
    Ok(())
}

/// The request burst issued once at startup: identify the controller, then
/// (re)register the observe streams the agent lives on, and give the
/// operator a vibration nudge.
fn startup_requests(bridge: &BridgeHandle, mids: &MidGen) {
    let send = |request: ResourceRequest| {
        let port = request.port();
        bridge.send_src_request(request.message, port);
    };

    send(resources::get_serial_number(mids.next(), None));
    send(resources::get_model_number(mids.next(), None));
    send(resources::unsubscribe_combined_joystick_keypad(mids.next()));
    send(resources::subscribe_combined_joystick_keypad(mids.next()));
    send(resources::subscribe_controller_mode(mids.next()));
    send(resources::post_vibrate_both(mids.next()));
}
