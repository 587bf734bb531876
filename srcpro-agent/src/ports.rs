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

//! The internal port map.
//!
//! Every request the agent sends to the SRC is tagged with one of these port
//! numbers through the port tracker, so the response (or observe
//! notification stream) comes back labeled with the resource it belongs to.
//! The numbers live inside CoAP tokens on the serial link; they are never
//! used as UDP ports. All of them sit inside the bridge's internal dispatch
//! window of [900, 1100].

/// A locally-interpreted SRC resource and its internal port number.
///
/// The telemetry feeds (keypad, joysticks, mode, display) have fixed
/// well-known ports; the remaining resources have stable allocated IDs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum SrcResource {
    /// Keypad button state (`st/keypad`).
    Keypad = 900,
    /// Calibrated joystick axes (`st/joystick/calibrated`).
    CalibratedJoystick = 901,

    /// SMCU safety block (`sf/<n>/s`).
    SmcuSafety = 910,
    /// SMCU safety diagnostics (`sf/<n>/s/safety_diagnostics`).
    SmcuSafetyDiagnostics = 911,
    /// SMCU system diagnostics (`sf/<n>/s/system_diagnostics`).
    SmcuSystemDiagnostics = 912,
    /// Combined transmitter safety block (`sf/transmitter/combined`).
    SmcuCombinedSafety = 913,

    /// Radio operating mode (`deviceInfo?radioMode`).
    RadioMode = 920,
    /// Radio output power in dB (`deviceInfo?radioPowerDB`).
    RadioPower = 921,
    /// Selected radio channel (`deviceInfo?radioChannel`).
    RadioChannel = 922,
    /// Radio health flags (`deviceInfo?radioStatus`).
    RadioStatus = 923,
    /// Whether the radio link is in use (`deviceInfo?radioUsed`).
    RadioUsed = 924,

    /// Firmware version string (`deviceInfo?fwVersion`).
    FirmwareVersion = 930,
    /// CPU temperature feed (`deviceInfo?cpuTempC`).
    CpuTemp = 931,
    /// Chassis temperature feed (`deviceInfo?deviceTempC`).
    DeviceTemp = 932,
    /// Gauge temperature feed (`deviceInfo?gaugeTempC`).
    GaugeTemp = 933,
    /// Gyro temperature feed (`deviceInfo?gyroTempC`).
    GyroTemp = 934,
    /// Battery status structure (`deviceInfo?batteryStatus`).
    BatteryStatus = 935,
    /// System status bitfield (`deviceInfo?sys1`).
    SystemStatus = 936,
    /// Lockdown state, provisioning only (`deviceInfo?lockdownStatus`).
    LockdownStatus = 937,

    /// Serial number (`cfg/setup/serialNumber`).
    SerialNumber = 940,
    /// Model number (`cfg/setup/modelNumber`).
    ModelNumber = 941,
    /// MAC address (`cfg/setup/deviceMac`).
    DeviceMac = 942,
    /// Unique device identifier, factory only (`cfg/setup/deviceUID`).
    DeviceUid = 943,
    /// Hardware revision (`cfg/setup/deviceRev`).
    DeviceRev = 944,
    /// System reset endpoint (`cfg/setup/systemReset`).
    SystemReset = 945,
    /// User display mode (`cfg/setup/userSettings?99`).
    DisplayMode = 946,
    /// Left vibration motor (`cfg/setup/userSettings?10`).
    VibrateLeft = 947,
    /// Right vibration motor (`cfg/setup/userSettings?11`).
    VibrateRight = 948,
    /// Both vibration motors (`cfg/setup/userSettings?12`).
    VibrateBoth = 949,
    /// Firmware file contents (`fs/data?<filename>`).
    FirmwareFileData = 950,
    /// Firmware file metadata (`fs/metadata`).
    FirmwareFileMetadata = 951,

    /// Combined joystick + keypad report (`st/joystick/combined`).
    CombinedJoystickKeypad = 1000,
    /// Controller operating mode (`st/mode`).
    ControllerMode = 1001,
    /// Two-line user display (`st/display/text`).
    DisplayText = 1002,

    /// Secure element unique ID (`sec/dev/seuid`).
    SecureElementId = 1010,
    /// Factory secure object selection (`sec/dev/fso/id`).
    FsoId = 1011,
    /// Factory secure object data (`sec/dev/fso/data`).
    FsoData = 1012,
    /// Factory secure object CRC32 (`sec/dev/fso/crc`).
    FsoCrc = 1013,
    /// Factory secure object erase (`sec/dev/fso/erase`).
    FsoErase = 1014,
    /// Factory secure object length (`sec/dev/fso/length`).
    FsoLength = 1015,
    /// OTP key material (`sec/lockdown/otp`).
    OtpKey = 1016,
    /// OTP provisioning commit (`sec/lockdown/otp`).
    OtpCommit = 1017,
    /// Lockdown processor key (`sec/lockdown/processor`).
    LockdownProcessor = 1018,
    /// SCP03 key rotation (`sec/lockdown/scp03`).
    Scp03Rotate = 1019,
    /// Raw OTP write, development only (`sec/lockdown/otpWrite`).
    OtpWrite = 1020,
}

impl SrcResource {
    /// The internal port number for this resource.
    pub fn port(self) -> u16 {
        self as u16
    }

    /// Looks a resource up by internal port number.
    pub fn from_port(port: u16) -> Option<SrcResource> {
        use SrcResource::*;
        let resource = match port {
            900 => Keypad,
            901 => CalibratedJoystick,
            910 => SmcuSafety,
            911 => SmcuSafetyDiagnostics,
            912 => SmcuSystemDiagnostics,
            913 => SmcuCombinedSafety,
            920 => RadioMode,
            921 => RadioPower,
            922 => RadioChannel,
            923 => RadioStatus,
            924 => RadioUsed,
            930 => FirmwareVersion,
            931 => CpuTemp,
            932 => DeviceTemp,
            933 => GaugeTemp,
            934 => GyroTemp,
            935 => BatteryStatus,
            936 => SystemStatus,
            937 => LockdownStatus,
            940 => SerialNumber,
            941 => ModelNumber,
            942 => DeviceMac,
            943 => DeviceUid,
            944 => DeviceRev,
            945 => SystemReset,
            946 => DisplayMode,
            947 => VibrateLeft,
            948 => VibrateRight,
            949 => VibrateBoth,
            950 => FirmwareFileData,
            951 => FirmwareFileMetadata,
            1000 => CombinedJoystickKeypad,
            1001 => ControllerMode,
            1002 => DisplayText,
            1010 => SecureElementId,
            1011 => FsoId,
            1012 => FsoData,
            1013 => FsoCrc,
            1014 => FsoErase,
            1015 => FsoLength,
            1016 => OtpKey,
            1017 => OtpCommit,
            1018 => LockdownProcessor,
            1019 => Scp03Rotate,
            1020 => OtpWrite,
            _ => return None,
        };
        Some(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uartcoap_tokio::{INTERNAL_PORT_MAX, INTERNAL_PORT_MIN};

    const ALL: [SrcResource; 45] = [
        SrcResource::Keypad,
        SrcResource::CalibratedJoystick,
        SrcResource::SmcuSafety,
        SrcResource::SmcuSafetyDiagnostics,
        SrcResource::SmcuSystemDiagnostics,
        SrcResource::SmcuCombinedSafety,
        SrcResource::RadioMode,
        SrcResource::RadioPower,
        SrcResource::RadioChannel,
        SrcResource::RadioStatus,
        SrcResource::RadioUsed,
        SrcResource::FirmwareVersion,
        SrcResource::CpuTemp,
        SrcResource::DeviceTemp,
        SrcResource::GaugeTemp,
        SrcResource::GyroTemp,
        SrcResource::BatteryStatus,
        SrcResource::SystemStatus,
        SrcResource::LockdownStatus,
        SrcResource::SerialNumber,
        SrcResource::ModelNumber,
        SrcResource::DeviceMac,
        SrcResource::DeviceUid,
        SrcResource::DeviceRev,
        SrcResource::SystemReset,
        SrcResource::DisplayMode,
        SrcResource::VibrateLeft,
        SrcResource::VibrateRight,
        SrcResource::VibrateBoth,
        SrcResource::FirmwareFileData,
        SrcResource::FirmwareFileMetadata,
        SrcResource::CombinedJoystickKeypad,
        SrcResource::ControllerMode,
        SrcResource::DisplayText,
        SrcResource::SecureElementId,
        SrcResource::FsoId,
        SrcResource::FsoData,
        SrcResource::FsoCrc,
        SrcResource::FsoErase,
        SrcResource::FsoLength,
        SrcResource::OtpKey,
        SrcResource::OtpCommit,
        SrcResource::LockdownProcessor,
        SrcResource::Scp03Rotate,
        SrcResource::OtpWrite,
    ];

    #[test]
    fn ports_round_trip_and_stay_internal() {
        for resource in ALL.iter().copied() {
            assert_eq!(SrcResource::from_port(resource.port()), Some(resource));
            assert!(resource.port() >= INTERNAL_PORT_MIN);
            assert!(resource.port() <= INTERNAL_PORT_MAX);
        }
    }

    #[test]
    fn well_known_telemetry_ports() {
        assert_eq!(SrcResource::Keypad.port(), 900);
        assert_eq!(SrcResource::CalibratedJoystick.port(), 901);
        assert_eq!(SrcResource::CombinedJoystickKeypad.port(), 1000);
        assert_eq!(SrcResource::ControllerMode.port(), 1001);
        assert_eq!(SrcResource::DisplayText.port(), 1002);
        assert_eq!(SrcResource::from_port(905), None);
    }
}
