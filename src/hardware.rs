use esp_hal::{
    delay::Delay,
    gpio::{AnyPin, DriveMode, Flex, InputConfig, OutputConfig, Pull},
    rng::Rng,
};
use rand_core::{CryptoRng, RngCore};

use crate::traits::OneWireBus;

/// Bit-banged 1-Wire master on a single open-drain GPIO.
///
/// The line is preset low and driven by toggling the output enable, so
/// releasing it lets the pull-up take the bus high.
pub struct OneWireHardware<'a> {
    pin: Flex<'a>,
    delay: Delay,
}

impl<'a> OneWireHardware<'a> {
    pub fn new<DQ>(dq_gpio: DQ) -> Self
    where
        DQ: Into<AnyPin<'a>>,
    {
        let dq_pin: AnyPin<'a> = dq_gpio.into();
        let mut pin = Flex::new(dq_pin);

        // The internal pull-up is weak; a 4.7k external resistor is still expected
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.apply_output_config(&OutputConfig::default().with_drive_mode(DriveMode::OpenDrain));
        pin.set_low();
        pin.set_input_enable(true);
        pin.set_output_enable(false);

        Self {
            pin,
            delay: Delay::new(),
        }
    }

    #[inline(always)]
    fn drive_low(&mut self) {
        self.pin.set_output_enable(true);
    }

    #[inline(always)]
    fn release(&mut self) {
        self.pin.set_output_enable(false);
    }
}

impl OneWireBus for OneWireHardware<'_> {
    fn reset(&mut self) -> bool {
        critical_section::with(|_| {
            self.drive_low();
            self.delay.delay_micros(480);
            self.release();
            self.delay.delay_micros(70);
            let presence = self.pin.is_low();
            self.delay.delay_micros(410);
            presence
        })
    }

    fn write_bit(&mut self, bit: bool) {
        critical_section::with(|_| {
            self.drive_low();
            if bit {
                self.delay.delay_micros(6);
                self.release();
                self.delay.delay_micros(64);
            } else {
                self.delay.delay_micros(60);
                self.release();
                self.delay.delay_micros(10);
            }
        });
    }

    fn read_bit(&mut self) -> bool {
        critical_section::with(|_| {
            self.drive_low();
            self.delay.delay_micros(6);
            self.release();
            self.delay.delay_micros(9);
            let bit = self.pin.is_high();
            self.delay.delay_micros(55);
            bit
        })
    }
}

/// The on-chip true RNG, fed by radio noise once Wi-Fi is up
pub struct HardwareRng {
    rng: Rng,
}

impl HardwareRng {
    pub fn new() -> Self {
        Self { rng: Rng::new() }
    }
}

impl Default for HardwareRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.random()
    }

    fn next_u64(&mut self) -> u64 {
        (self.next_u32() as u64) << 32 | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for HardwareRng {}
