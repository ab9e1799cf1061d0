#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use heapless::{String, Vec};

use emontemp::{
    config::{MIN_VALID_TEMPERATURE, SENSORS},
    ds18b20,
    hardware::OneWireHardware,
    http,
    logic::{self, CycleOutcome},
    model::{Sample, SensorSlot},
    onewire::{Address, Error, MATCH_ROM, SEARCH_ROM, SKIP_ROM, crc8},
    sampler, search, telemetry,
    traits::OneWireBus,
};

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.record(condition);
        if condition {
            esp_println::println!("  ✓ {}", test_name);
        } else {
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        let ok = left == right;
        self.record(ok);
        if ok {
            esp_println::println!("  ✓ {}", test_name);
        } else {
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

// ------------------------------------------------------------------
// Simulated bus: wired-AND of every selected device, idle high
// ------------------------------------------------------------------

const MAX_SIM_DEVICES: usize = 4;
const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;

#[derive(Clone, Copy)]
struct SimDevice {
    rom: Address,
    scratchpad: [u8; ds18b20::SCRATCHPAD_LEN],
}

impl SimDevice {
    fn new(family: u8, serial: [u8; 6], raw: i16) -> Self {
        let mut rom = [0u8; 8];
        rom[0] = family;
        rom[1..7].copy_from_slice(&serial);
        rom[7] = crc8(&rom[..7]);

        let [lsb, msb] = raw.to_le_bytes();
        let mut scratchpad = [lsb, msb, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
        scratchpad[8] = crc8(&scratchpad[..8]);

        Self {
            rom: Address::new(rom),
            scratchpad,
        }
    }

    fn thermometer(serial: [u8; 6], raw: i16) -> Self {
        Self::new(ds18b20::FAMILY_DS18B20, serial, raw)
    }

    fn with_corrupt_scratchpad(mut self) -> Self {
        self.scratchpad[8] ^= 0x5A;
        self
    }

    fn with_corrupt_rom(mut self) -> Self {
        let mut rom = *self.rom.as_bytes();
        rom[7] ^= 0x5A;
        self.rom = Address::new(rom);
        self
    }

    fn scratchpad_bit(&self, index: usize) -> bool {
        (self.scratchpad[index / 8] >> (index % 8)) & 0x01 != 0
    }
}

#[derive(Clone, Copy)]
enum SimPhase {
    Idle,
    RomCommand { value: u8, bits: u8 },
    Search { index: usize, step: u8 },
    MatchRom { index: usize },
    FunctionCommand { value: u8, bits: u8 },
    ReadScratchpad { index: usize },
    Converting,
}

#[derive(Clone, Copy, PartialEq)]
enum SimLine {
    Normal,
    /// Presence pulse, then DQ reads low forever
    StuckLow,
    /// Something answers reset but nothing drives data bits
    PresenceOnly,
}

struct SimBus {
    devices: Vec<SimDevice, MAX_SIM_DEVICES>,
    selected: [bool; MAX_SIM_DEVICES],
    phase: SimPhase,
    line: SimLine,
    conversions: u32,
    /// Reads during a conversion that still report busy
    busy_reads: u32,
}

impl SimBus {
    fn new(devices: &[SimDevice]) -> Self {
        let mut bus = Self {
            devices: Vec::new(),
            selected: [false; MAX_SIM_DEVICES],
            phase: SimPhase::Idle,
            line: SimLine::Normal,
            conversions: 0,
            busy_reads: 0,
        };
        for device in devices {
            let _ = bus.devices.push(*device);
        }
        bus
    }

    fn with_line(mut self, line: SimLine) -> Self {
        self.line = line;
        self
    }

    fn busy_for(mut self, reads: u32) -> Self {
        self.busy_reads = reads;
        self
    }

    fn wired_and(&self, bit: impl Fn(&SimDevice) -> bool) -> bool {
        self.devices
            .iter()
            .zip(self.selected.iter())
            .filter(|(_, selected)| **selected)
            .all(|(device, _)| bit(device))
    }

    fn deselect_mismatched(&mut self, index: usize, bit: bool) {
        for (device, selected) in self.devices.iter().zip(self.selected.iter_mut()) {
            if device.rom.bit(index) != bit {
                *selected = false;
            }
        }
    }

    fn rom_command(value: u8) -> SimPhase {
        match value {
            SEARCH_ROM => SimPhase::Search { index: 0, step: 0 },
            MATCH_ROM => SimPhase::MatchRom { index: 0 },
            SKIP_ROM => SimPhase::FunctionCommand { value: 0, bits: 0 },
            _ => SimPhase::Idle,
        }
    }

    fn function_command(&mut self, value: u8) -> SimPhase {
        match value {
            CONVERT_T => {
                self.conversions += 1;
                SimPhase::Converting
            }
            READ_SCRATCHPAD => SimPhase::ReadScratchpad { index: 0 },
            _ => SimPhase::Idle,
        }
    }
}

impl OneWireBus for SimBus {
    fn reset(&mut self) -> bool {
        self.selected = [true; MAX_SIM_DEVICES];
        self.phase = SimPhase::RomCommand { value: 0, bits: 0 };
        self.line != SimLine::Normal || !self.devices.is_empty()
    }

    fn write_bit(&mut self, bit: bool) {
        self.phase = match self.phase {
            SimPhase::RomCommand { value, bits } => {
                let value = value | ((bit as u8) << bits);
                if bits < 7 {
                    SimPhase::RomCommand {
                        value,
                        bits: bits + 1,
                    }
                } else {
                    Self::rom_command(value)
                }
            }
            SimPhase::Search { index, step: 2 } => {
                self.deselect_mismatched(index, bit);
                if index + 1 < 64 {
                    SimPhase::Search {
                        index: index + 1,
                        step: 0,
                    }
                } else {
                    SimPhase::Idle
                }
            }
            SimPhase::MatchRom { index } => {
                self.deselect_mismatched(index, bit);
                if index + 1 < 64 {
                    SimPhase::MatchRom { index: index + 1 }
                } else {
                    SimPhase::FunctionCommand { value: 0, bits: 0 }
                }
            }
            SimPhase::FunctionCommand { value, bits } => {
                let value = value | ((bit as u8) << bits);
                if bits < 7 {
                    SimPhase::FunctionCommand {
                        value,
                        bits: bits + 1,
                    }
                } else {
                    self.function_command(value)
                }
            }
            other => other,
        }
    }

    fn read_bit(&mut self) -> bool {
        if self.line == SimLine::StuckLow {
            return false;
        }
        match self.phase {
            SimPhase::Search { index, step: 0 } => {
                self.phase = SimPhase::Search { index, step: 1 };
                self.wired_and(|d| d.rom.bit(index))
            }
            SimPhase::Search { index, step: 1 } => {
                self.phase = SimPhase::Search { index, step: 2 };
                self.wired_and(|d| !d.rom.bit(index))
            }
            SimPhase::ReadScratchpad { index } if index < ds18b20::SCRATCHPAD_LEN * 8 => {
                self.phase = SimPhase::ReadScratchpad { index: index + 1 };
                self.wired_and(|d| d.scratchpad_bit(index))
            }
            SimPhase::Converting if self.busy_reads > 0 => {
                self.busy_reads -= 1;
                false
            }
            _ => true,
        }
    }
}

// 21.5°C, 55.25°C, -10.125°C
const RAW_OUTDOOR: i16 = 0x0158;
const RAW_FLOW: i16 = 0x0374;
const RAW_RETURN: i16 = -162;

fn sim_devices() -> [SimDevice; 3] {
    [
        SimDevice::thermometer([0x2E, 0x41, 0xEB, 0x04, 0x00, 0x00], RAW_OUTDOOR),
        SimDevice::thermometer([0x03, 0x96, 0x75, 0xD0, 0x01, 0x3C], RAW_FLOW),
        SimDevice::thermometer([0xFF, 0xAA, 0xDE, 0x91, 0x16, 0x05], RAW_RETURN),
    ]
}

fn sample(key: &'static str, celsius: Result<f32, Error>) -> Sample {
    Sample { key, celsius }
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------

fn test_onewire(results: &mut TestResults) {
    esp_println::println!("\n[TEST] 1-Wire Addressing Tests");

    // Example ROM from the Maxim CRC application note
    let rom = Address::new([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]);
    results.assert_eq(crc8(&rom.as_bytes()[..7]), 0xA2, "crc8 matches reference ROM");
    results.assert(rom.is_valid(), "reference ROM is valid");
    results.assert_eq(rom.family(), 0x02, "family code is first byte");

    let corrupt = Address::new([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x01, 0xA2]);
    results.assert(!corrupt.is_valid(), "corrupt ROM is rejected");

    let mut text = String::<32>::new();
    let _ = core::fmt::write(&mut text, format_args!("{}", rom));
    results.assert_eq(
        text.as_str(),
        "02 1C B8 01 00 00 00 A2",
        "address displays as spaced hex",
    );

    results.assert(rom.bit(1), "bit 1 of 0x02 is set");
    results.assert(!rom.bit(0), "bit 0 of 0x02 is clear");
}

fn test_ds18b20_decoding(results: &mut TestResults) {
    esp_println::println!("\n[TEST] DS18B20 Decoding Tests");

    results.assert_eq(ds18b20::decode_temperature(0xD0, 0x07), 125.0, "+125°C");
    results.assert_eq(ds18b20::decode_temperature(0x91, 0x01), 25.0625, "+25.0625°C");
    results.assert_eq(ds18b20::decode_temperature(0x08, 0x00), 0.5, "+0.5°C");
    results.assert_eq(ds18b20::decode_temperature(0x00, 0x00), 0.0, "0°C");
    results.assert_eq(ds18b20::decode_temperature(0xF8, 0xFF), -0.5, "-0.5°C");
    results.assert_eq(ds18b20::decode_temperature(0x5E, 0xFF), -10.125, "-10.125°C");
    results.assert_eq(ds18b20::decode_temperature(0x90, 0xFC), -55.0, "-55°C");
}

fn test_search(results: &mut TestResults) {
    esp_println::println!("\n[TEST] ROM Search Tests");

    let devices = sim_devices();
    let mut bus = SimBus::new(&devices);
    match search::discover::<_, 8>(&mut bus) {
        Ok(found) => {
            results.assert_eq(found.len(), 3, "finds all three devices");
            for device in devices.iter() {
                results.assert(found.contains(&device.rom), "found device matches ROM");
            }
        }
        Err(e) => {
            esp_println::println!("    search failed: {}", e);
            results.assert(false, "finds all three devices");
        }
    }

    let single = [SimDevice::thermometer([1, 2, 3, 4, 5, 6], RAW_OUTDOOR)];
    let mut bus = SimBus::new(&single);
    let mut scan = search::DeviceSearch::new();
    results.assert_eq(
        scan.next(&mut bus),
        Ok(Some(single[0].rom)),
        "single device found",
    );
    results.assert_eq(scan.next(&mut bus), Ok(None), "search ends after last device");

    // Two devices differing only in the last serial bit
    let twins = [
        SimDevice::thermometer([0x10, 0, 0, 0, 0, 0x00], RAW_OUTDOOR),
        SimDevice::thermometer([0x10, 0, 0, 0, 0, 0x80], RAW_FLOW),
    ];
    let mut bus = SimBus::new(&twins);
    match search::discover::<_, 8>(&mut bus) {
        Ok(found) => results.assert(
            found.len() == 2 && found.contains(&twins[0].rom) && found.contains(&twins[1].rom),
            "late discrepancy resolved",
        ),
        Err(_) => results.assert(false, "late discrepancy resolved"),
    }

    let mut bus = SimBus::new(&[]);
    results.assert_eq(
        search::discover::<_, 8>(&mut bus).map(|found| found.len()),
        Ok(0),
        "empty bus yields no devices",
    );

    let mut bus = SimBus::new(&devices);
    results.assert_eq(
        search::discover::<_, 2>(&mut bus).map(|found| found.len()),
        Ok(2),
        "discovery stops at capacity",
    );

    // A shorted DQ line reads 0/0 on every bit; the all-zero ROM passes the CRC
    let mut bus = SimBus::new(&[]).with_line(SimLine::StuckLow);
    let mut scan = search::DeviceSearch::new();
    results.assert_eq(
        scan.next(&mut bus),
        Err(Error::NoResponse),
        "stuck-low line is not a device",
    );
    results.assert_eq(
        search::discover::<_, 8>(&mut bus).map(|found| found.len()),
        Err(Error::NoResponse),
        "discovery fails on stuck-low line",
    );

    let mut bus = SimBus::new(&[]).with_line(SimLine::PresenceOnly);
    results.assert_eq(
        search::DeviceSearch::new().next(&mut bus),
        Err(Error::NoResponse),
        "presence without data bits is no response",
    );

    // After a failed pass the next pass starts from scratch
    let mut twins_bus = SimBus::new(&twins);
    let mut scan = search::DeviceSearch::new();
    results.assert_eq(
        scan.next(&mut twins_bus),
        Ok(Some(twins[0].rom)),
        "first twin found",
    );
    results.assert_eq(
        scan.next(&mut bus),
        Err(Error::NoResponse),
        "search interrupted by silent bus",
    );
    results.assert_eq(
        scan.next(&mut twins_bus),
        Ok(Some(twins[0].rom)),
        "search restarts after no response",
    );

    let corrupt = [SimDevice::thermometer([5, 5, 5, 5, 5, 5], RAW_OUTDOOR).with_corrupt_rom()];
    let mut bus = SimBus::new(&corrupt);
    let mut scan = search::DeviceSearch::new();
    results.assert_eq(
        scan.next(&mut bus),
        Err(Error::CrcMismatch),
        "corrupt ROM rejected",
    );
    let mut bus = SimBus::new(&single);
    results.assert_eq(
        scan.next(&mut bus),
        Ok(Some(single[0].rom)),
        "search restarts after CRC mismatch",
    );
}

fn test_ds18b20_bus(results: &mut TestResults) {
    esp_println::println!("\n[TEST] DS18B20 Bus Tests");

    let devices = sim_devices();
    let mut bus = SimBus::new(&devices);

    results.assert_eq(
        ds18b20::start_conversion(&mut bus),
        Ok(()),
        "conversion started",
    );
    results.assert_eq(bus.conversions, 1, "single broadcast conversion");
    results.assert(ds18b20::conversion_complete(&mut bus), "conversion complete");

    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &devices[0].rom),
        Ok(21.5),
        "outdoor reading addressed by ROM",
    );
    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &devices[1].rom),
        Ok(55.25),
        "flow reading addressed by ROM",
    );
    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &devices[2].rom),
        Ok(-10.125),
        "return reading addressed by ROM",
    );

    let absent = SimDevice::thermometer([9, 9, 9, 9, 9, 9], RAW_OUTDOOR);
    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &absent.rom),
        Err(Error::NoResponse),
        "absent device does not respond",
    );

    let corrupt = [SimDevice::thermometer([7, 7, 7, 7, 7, 7], RAW_FLOW).with_corrupt_scratchpad()];
    let mut bus = SimBus::new(&corrupt);
    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &corrupt[0].rom),
        Err(Error::CrcMismatch),
        "corrupt scratchpad rejected",
    );

    let ds18s20 = SimDevice::new(0x10, [1, 1, 1, 1, 1, 1], RAW_OUTDOOR);
    let mut bus = SimBus::new(&[ds18s20]);
    results.assert_eq(
        ds18b20::read_temperature(&mut bus, &ds18s20.rom),
        Err(Error::UnsupportedFamily(0x10)),
        "other families rejected",
    );

    let mut bus = SimBus::new(&[]);
    results.assert_eq(
        ds18b20::start_conversion(&mut bus),
        Err(Error::NoPresence),
        "empty bus has no presence",
    );

    let mut bus = SimBus::new(&devices).busy_for(1);
    let _ = ds18b20::start_conversion(&mut bus);
    results.assert(!ds18b20::conversion_complete(&mut bus), "busy conversion reads 0");
    results.assert(ds18b20::conversion_complete(&mut bus), "conversion then completes");
}

async fn test_sampler(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Sampler Tests");

    let devices = sim_devices();
    let slots = [
        SensorSlot::new("outdoor-temp", devices[0].rom),
        SensorSlot::new("boiler-flow-temp", devices[1].rom),
        SensorSlot::new("boiler-return-temp", devices[2].rom),
    ];

    let mut bus = SimBus::new(&devices);
    let samples = sampler::sample_slots(&mut bus, &slots).await;
    results.assert_eq(samples.len(), 3, "one sample per slot");
    results.assert_eq(samples[1].key, "boiler-flow-temp", "samples keep slot order");
    results.assert_eq(samples[1].celsius, Ok(55.25), "sample carries reading");
    results.assert(
        matches!(logic::evaluate(&samples), CycleOutcome::Report(_)),
        "simulated readings are reported",
    );

    let mut bus = SimBus::new(&devices[..2]);
    let samples = sampler::sample_slots(&mut bus, &slots).await;
    results.assert_eq(
        samples[2].celsius,
        Err(Error::NoResponse),
        "missing sensor reported as error",
    );

    let mut bus = SimBus::new(&[]);
    let samples = sampler::sample_slots(&mut bus, &slots).await;
    results.assert(
        samples.iter().all(|s| s.celsius == Err(Error::NoPresence)),
        "empty bus fails every slot",
    );

    let mut bus = SimBus::new(&devices).busy_for(3);
    let started = Instant::now();
    results.assert_eq(
        sampler::convert_all(&mut bus).await,
        Ok(()),
        "short conversion completes",
    );
    results.assert(
        started.elapsed() < ds18b20::MAX_CONVERSION_TIME,
        "short conversion returns before the limit",
    );

    let mut bus = SimBus::new(&devices).busy_for(u32::MAX);
    let started = Instant::now();
    results.assert_eq(
        sampler::convert_all(&mut bus).await,
        Ok(()),
        "stuck conversion still returns",
    );
    results.assert(
        started.elapsed() >= ds18b20::MAX_CONVERSION_TIME,
        "stuck conversion waits the full conversion time",
    );
    let samples = sampler::sample_slots(&mut SimBus::new(&devices).busy_for(u32::MAX), &slots).await;
    results.assert_eq(
        samples[0].celsius,
        Ok(21.5),
        "reading taken after conversion timeout",
    );

    let mut bus = SimBus::new(&devices);
    match sampler::survey(&mut bus).await {
        Ok(found) => results.assert_eq(found.len(), 3, "survey lists every device"),
        Err(_) => results.assert(false, "survey lists every device"),
    }
}

fn test_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Cycle Logic Tests");

    results.assert(logic::is_valid(21.0), "normal reading valid");
    results.assert(!logic::is_valid(-127.0), "disconnected reading invalid");
    results.assert(!logic::is_valid(MIN_VALID_TEMPERATURE), "floor itself invalid");
    results.assert(logic::is_valid(MIN_VALID_TEMPERATURE + 0.0625), "just above floor valid");
    results.assert(!logic::is_valid(f32::NAN), "NaN invalid");

    let samples = [
        sample("outdoor-temp", Ok(12.5)),
        sample("boiler-flow-temp", Ok(55.25)),
        sample("boiler-return-temp", Ok(40.0)),
    ];
    match logic::evaluate(&samples) {
        CycleOutcome::Report(payload) => {
            results.assert_eq(payload.fields().len(), 3, "all fields reported");
            results.assert_eq(payload.get("boiler-flow-temp"), Some(55.25), "field value kept");
            match payload.to_json() {
                Ok(json) => results.assert_eq(
                    json.as_str(),
                    "{\"outdoor-temp\":12.5,\"boiler-flow-temp\":55.25,\"boiler-return-temp\":40}",
                    "payload JSON",
                ),
                Err(_) => results.assert(false, "payload JSON"),
            }
        }
        CycleOutcome::Skip { .. } => results.assert(false, "all valid readings reported"),
    }

    let samples = [
        sample("outdoor-temp", Ok(-127.0)),
        sample("boiler-flow-temp", Ok(55.25)),
        sample("boiler-return-temp", Ok(40.0)),
    ];
    results.assert_eq(
        logic::evaluate(&samples),
        CycleOutcome::Skip { invalid: 1 },
        "one invalid reading skips the cycle",
    );

    let samples = [
        sample("outdoor-temp", Ok(-20.0)),
        sample("boiler-flow-temp", Err(Error::CrcMismatch)),
        sample("boiler-return-temp", Ok(40.0)),
    ];
    results.assert_eq(
        logic::evaluate(&samples),
        CycleOutcome::Skip { invalid: 2 },
        "floor value and bus error both counted",
    );

    results.assert_eq(
        logic::evaluate(&[]),
        CycleOutcome::Skip { invalid: 0 },
        "no samples sends nothing",
    );
}

fn test_telemetry(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Telemetry Tests");

    let mut encoded = String::<64>::new();
    let _ = telemetry::percent_encode(&mut encoded, "{\"a\":1.5} ~x_y-z");
    results.assert_eq(
        encoded.as_str(),
        "%7B%22a%22%3A1.5%7D%20~x_y-z",
        "percent encoding",
    );

    match telemetry::request_target("/input/post", "node 1", "{\"a\":-1.5}", "k3y&") {
        Ok(target) => results.assert_eq(
            target.as_str(),
            "/input/post?node=node%201&fulljson=%7B%22a%22%3A-1.5%7D&apikey=k3y%26",
            "request target",
        ),
        Err(_) => results.assert(false, "request target"),
    }

    // Every byte of this value expands to `%7B`, three times the target capacity
    let oversized = [b'{'; telemetry::TARGET_CAPACITY];
    let oversized = core::str::from_utf8(&oversized).unwrap_or_default();
    results.assert(
        telemetry::request_target("/input/post", "1", oversized, "k").is_err(),
        "oversized target rejected instead of truncated",
    );
}

fn test_http(results: &mut TestResults) {
    esp_println::println!("\n[TEST] HTTP Tests");

    results.assert_eq(
        http::parse_status_line(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"),
        Some(200),
        "status 200",
    );
    results.assert_eq(
        http::parse_status_line(b"HTTP/1.0 301 Moved Permanently\r\n"),
        Some(301),
        "status 301",
    );
    results.assert_eq(http::parse_status_line(b"garbage"), None, "garbage rejected");
    results.assert_eq(http::parse_status_line(b""), None, "empty rejected");

    match http::parse_response(b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\nok") {
        Ok(response) => {
            results.assert(response.is_success(), "2xx is success");
            results.assert_eq(response.body.as_str(), "ok", "body extracted");
        }
        Err(_) => results.assert(false, "response parsed"),
    }

    let chunked = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\n\r\n";
    match http::parse_response(chunked) {
        Ok(response) => results.assert_eq(response.body.as_str(), "ok", "chunk framing stripped"),
        Err(_) => results.assert(false, "chunk framing stripped"),
    }

    let split = b"HTTP/1.1 200 OK\r\ntransfer-encoding: Chunked\r\n\r\n3;ext=1\r\nabc\r\nA\r\n0123456789\r\n0\r\n\r\n";
    match http::parse_response(split) {
        Ok(response) => results.assert_eq(
            response.body.as_str(),
            "abc0123456789",
            "chunks joined, hex sizes and extensions",
        ),
        Err(_) => results.assert(false, "chunks joined, hex sizes and extensions"),
    }

    let mut truncated = String::<16>::new();
    http::decode_chunked(b"5\r\nhel", &mut truncated);
    results.assert_eq(truncated.as_str(), "hel", "truncated chunk keeps what arrived");

    match http::parse_response(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA") {
        Ok(response) => results.assert_eq(response.body.as_str(), "ok", "content-length honoured"),
        Err(_) => results.assert(false, "content-length honoured"),
    }

    let moved = b"HTTP/1.1 301 Moved Permanently\r\nLocation: https://emoncms.org/input/post?node=1\r\nContent-Length: 0\r\n\r\n";
    match http::parse_response(moved) {
        Ok(response) => {
            results.assert(response.is_redirect(), "301 is a redirect");
            results.assert(!response.is_success(), "301 is not success");
            results.assert_eq(
                response.location.as_deref(),
                Some("https://emoncms.org/input/post?node=1"),
                "location header captured",
            );
        }
        Err(_) => results.assert(false, "redirect parsed"),
    }

    let mut head = String::<256>::new();
    let _ = http::write_request_head(&mut head, "emoncms.org", "/input/post?node=1");
    results.assert(
        head.starts_with("GET /input/post?node=1 HTTP/1.1\r\nHost: emoncms.org\r\n"),
        "request line and host",
    );
    results.assert(head.ends_with("\r\n\r\n"), "head terminated");
}

fn test_url(results: &mut TestResults) {
    esp_println::println!("\n[TEST] URL Tests");

    let url = http::Url::parse("https://emoncms.org/input/post");
    results.assert_eq(
        url,
        Some(http::Url {
            scheme: http::Scheme::Https,
            host: "emoncms.org",
            port: 443,
            target: "/input/post",
        }),
        "https URL defaults to port 443",
    );
    results.assert_eq(
        http::Url::parse("http://192.168.1.5:8080"),
        Some(http::Url {
            scheme: http::Scheme::Http,
            host: "192.168.1.5",
            port: 8080,
            target: "/",
        }),
        "explicit port, empty path",
    );
    results.assert_eq(http::Url::parse("ftp://host/"), None, "unknown scheme rejected");
    results.assert_eq(http::Url::parse("https:///path"), None, "missing host rejected");
    results.assert_eq(http::Url::parse("http://host:port/"), None, "bad port rejected");

    if let Some(url) = url {
        results.assert_eq(
            url.join("/input/post.json"),
            Some(http::Url {
                target: "/input/post.json",
                ..url
            }),
            "relative location keeps host",
        );
        results.assert_eq(
            url.join("http://example.com/x").map(|u| (u.scheme, u.host, u.port)),
            Some((http::Scheme::Http, "example.com", 80)),
            "absolute location replaces host",
        );

        let mut text = String::<64>::new();
        let _ = core::fmt::write(&mut text, format_args!("{}", url));
        results.assert_eq(
            text.as_str(),
            "https://emoncms.org/input/post",
            "default port omitted",
        );
    }
}

async fn test_bus_hardware(results: &mut TestResults, bus: &mut OneWireHardware<'_>) {
    esp_println::println!("\n[TEST] 1-Wire Hardware Tests");

    match sampler::survey(bus).await {
        Ok(devices) => {
            results.assert(!devices.is_empty(), "devices present on bus");
            for slot in SENSORS.iter() {
                results.assert(devices.contains(&slot.address), slot.key);
            }
        }
        Err(e) => {
            esp_println::println!("    survey failed: {}", e);
            results.assert(false, "bus survey");
        }
    }

    let samples = sampler::sample_slots(bus, &SENSORS).await;
    for s in samples.iter() {
        results.assert(
            matches!(s.celsius, Ok(t) if t > -40.0 && t < 125.0),
            "temperature in valid range",
        );
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_onewire(&mut results);
    test_ds18b20_decoding(&mut results);
    test_search(&mut results);
    test_ds18b20_bus(&mut results);
    test_logic(&mut results);
    test_telemetry(&mut results);
    test_http(&mut results);
    test_url(&mut results);

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    test_sampler(&mut results).await;

    // Run hardware tests
    let mut bus = OneWireHardware::new(peripherals.GPIO4);
    test_bus_hardware(&mut results, &mut bus).await;

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        Timer::after(Duration::from_millis(1000)).await;
    }
}
