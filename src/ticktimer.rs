// Works for ATMega328p

use cfg_if::cfg_if;

/// Where the timer takes its clock from.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ufmt::derive::uDebug)]
pub enum ClockSource {
    /// The CPU I/O clock. Stops counting whenever the CPU clock domain stops.
    IoClock,
    /// The 32.768 kHz watch crystal on TOSC1/TOSC2. Keeps counting while the
    /// CPU clock domain is stopped.
    WatchCrystal,
}

/// Clock prescale divisor. TC2 supports the full set.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ufmt::derive::uDebug)]
pub enum Prescale {
    By1,
    By8,
    By32,
    By64,
    By128,
    By256,
    By1024,
}

impl Prescale {
    pub const fn divisor(self) -> u32 {
        match self {
            Prescale::By1 => 1,
            Prescale::By8 => 8,
            Prescale::By32 => 32,
            Prescale::By64 => 64,
            Prescale::By128 => 128,
            Prescale::By256 => 256,
            Prescale::By1024 => 1024,
        }
    }
}

/// One-shot timer configuration, applied by [`TickTimer::init`].
#[derive(Clone, Copy, Debug, ufmt::derive::uDebug)]
pub struct TimerConfig {
    pub clock_source: ClockSource,
    pub prescale: Prescale,
    /// Overflow interrupt enable, the tick source for the time base.
    pub overflow_irq: bool,
    /// Output compare interrupts. Unused by the time base, off by default.
    pub compare_irq: bool,
}

impl TimerConfig {
    /// Watch crystal divided by 128: 32768 / 128 / 256 counts means the 8 bit
    /// counter overflows exactly once per second.
    pub const ONE_SECOND: TimerConfig = TimerConfig {
        clock_source: ClockSource::WatchCrystal,
        prescale: Prescale::By128,
        overflow_irq: true,
        compare_irq: false,
    };
}

impl Default for TimerConfig {
    fn default() -> TimerConfig {
        TimerConfig::ONE_SECOND
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ufmt::derive::uDebug)]
pub enum Error {
    /// The peripheral never acknowledged the requested configuration.
    PeripheralUnavailable,
}

/// Register-level access to TC2. The firmware implements this on the real
/// peripheral, tests implement it on a mock.
pub trait Tc2Registers {
    /// Clear the power reduction gate so the timer is clocked at all.
    fn power_on(&mut self);
    /// Normal free-running mode, output compare pins disconnected.
    fn set_normal_mode(&mut self);
    fn set_prescale(&mut self, prescale: Prescale);
    /// Reset the counter register to zero.
    fn reset_counter(&mut self);
    fn set_irq_mask(&mut self, overflow: bool, compare: bool);
    fn select_clock_source(&mut self, source: ClockSource);
    /// True while the asynchronous clock domain is still latching the last
    /// register writes.
    fn update_busy(&self) -> bool;
    /// Acknowledge an overflow raised during reconfiguration.
    fn clear_pending_overflow(&mut self);
}

/// Upper bound on the update-busy wait. On hardware the flags clear within a
/// few crystal cycles; a peripheral still busy after this many polls is
/// absent or faulted.
const UPDATE_SETTLE_POLLS: u32 = 100_000;

/// The once-per-boot timer bring-up. After [`TickTimer::init`] the hardware
/// clocks on its own and every overflow drives the time base through
/// [`TIMER2_OVF`].
pub struct TickTimer<R> {
    /// The timer registers, gives this instance unique control over them.
    regs: R,
}

impl<R: Tc2Registers> TickTimer<R> {
    /// Bring the timer up.
    ///
    /// Must run during single threaded startup, before interrupts are
    /// globally enabled. Consuming the register handle keeps this a
    /// once-per-boot operation.
    pub fn init(mut regs: R, config: TimerConfig) -> Result<TickTimer<R>, Error> {
        regs.power_on();
        regs.set_normal_mode();
        regs.set_prescale(config.prescale);
        regs.reset_counter();
        regs.set_irq_mask(config.overflow_irq, config.compare_irq);
        regs.select_clock_source(config.clock_source);

        let mut polls = 0;
        while regs.update_busy() {
            polls += 1;
            if polls > UPDATE_SETTLE_POLLS {
                return Err(Error::PeripheralUnavailable);
            }
        }

        // An overflow raised mid-configuration would fire the moment
        // interrupts get enabled, drop it.
        regs.clear_pending_overflow();

        Ok(TickTimer { regs })
    }
}

cfg_if! {
    if #[cfg(target_arch = "avr")] {
        use arduino_hal::pac::{CPU, TC2};

        /// The real TC2, plus the CPU power reduction register gating it.
        pub struct Tc2 {
            tc2: TC2,
            cpu: CPU,
        }

        impl Tc2 {
            pub fn new(tc2: TC2, cpu: CPU) -> Tc2 {
                Tc2 { tc2, cpu }
            }
        }

        impl Tc2Registers for Tc2 {
            fn power_on(&mut self) {
                self.cpu.prr.modify(|_, w| w.prtim2().clear_bit());
            }

            fn set_normal_mode(&mut self) {
                // normal port operation, OC2A/OC2B disconnected, WGM mode 0
                self.tc2.tccr2a.write(|w| w.wgm2().bits(0));
            }

            fn set_prescale(&mut self, prescale: Prescale) {
                self.tc2.tccr2b.write(|w| match prescale {
                    Prescale::By1 => w.cs2().direct(),
                    Prescale::By8 => w.cs2().prescale_8(),
                    Prescale::By32 => w.cs2().prescale_32(),
                    Prescale::By64 => w.cs2().prescale_64(),
                    Prescale::By128 => w.cs2().prescale_128(),
                    Prescale::By256 => w.cs2().prescale_256(),
                    Prescale::By1024 => w.cs2().prescale_1024(),
                });
            }

            fn reset_counter(&mut self) {
                self.tc2.tcnt2.write(|w| unsafe { w.bits(0) });
            }

            fn set_irq_mask(&mut self, overflow: bool, compare: bool) {
                self.tc2.timsk2.write(|w| {
                    w.toie2()
                        .bit(overflow)
                        .ocie2a()
                        .bit(compare)
                        .ocie2b()
                        .bit(compare)
                });
            }

            fn select_clock_source(&mut self, source: ClockSource) {
                self.tc2.assr.modify(|_, w| match source {
                    ClockSource::IoClock => w.as2().clear_bit(),
                    ClockSource::WatchCrystal => w.as2().set_bit(),
                });
            }

            fn update_busy(&self) -> bool {
                let assr = self.tc2.assr.read();
                assr.tcn2ub().bit_is_set()
                    || assr.tcr2aub().bit_is_set()
                    || assr.tcr2bub().bit_is_set()
            }

            fn clear_pending_overflow(&mut self) {
                // TOV2 clears by writing a one
                self.tc2.tifr2.write(|w| w.tov2().set_bit());
            }
        }

        #[avr_device::interrupt(atmega328p)]
        fn TIMER2_OVF() {
            // One overflow = one second with the reference configuration.
            crate::timebase::timebase().tick();
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::Cell;
    use std::vec::Vec;

    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum Op {
        PowerOn,
        NormalMode,
        Prescale(Prescale),
        ResetCounter,
        IrqMask(bool, bool),
        Clock(ClockSource),
        ClearOverflow,
    }

    struct MockRegs {
        ops: Vec<Op>,
        /// How many polls report busy before the update settles.
        busy_polls: Cell<u32>,
        stuck_busy: bool,
    }

    impl MockRegs {
        fn new() -> MockRegs {
            MockRegs {
                ops: Vec::new(),
                busy_polls: Cell::new(3),
                stuck_busy: false,
            }
        }

        fn stuck() -> MockRegs {
            MockRegs {
                stuck_busy: true,
                ..MockRegs::new()
            }
        }
    }

    impl Tc2Registers for MockRegs {
        fn power_on(&mut self) {
            self.ops.push(Op::PowerOn);
        }

        fn set_normal_mode(&mut self) {
            self.ops.push(Op::NormalMode);
        }

        fn set_prescale(&mut self, prescale: Prescale) {
            self.ops.push(Op::Prescale(prescale));
        }

        fn reset_counter(&mut self) {
            self.ops.push(Op::ResetCounter);
        }

        fn set_irq_mask(&mut self, overflow: bool, compare: bool) {
            self.ops.push(Op::IrqMask(overflow, compare));
        }

        fn select_clock_source(&mut self, source: ClockSource) {
            self.ops.push(Op::Clock(source));
        }

        fn update_busy(&self) -> bool {
            if self.stuck_busy {
                return true;
            }
            let left = self.busy_polls.get();
            if left > 0 {
                self.busy_polls.set(left - 1);
                true
            } else {
                false
            }
        }

        fn clear_pending_overflow(&mut self) {
            self.ops.push(Op::ClearOverflow);
        }
    }

    #[test]
    fn init_applies_the_whole_sequence_in_order() {
        let timer = TickTimer::init(MockRegs::new(), TimerConfig::ONE_SECOND).unwrap();
        assert_eq!(
            timer.regs.ops,
            [
                Op::PowerOn,
                Op::NormalMode,
                Op::Prescale(Prescale::By128),
                Op::ResetCounter,
                Op::IrqMask(true, false),
                Op::Clock(ClockSource::WatchCrystal),
                Op::ClearOverflow,
            ]
        );
    }

    #[test]
    fn init_honors_the_config() {
        let config = TimerConfig {
            clock_source: ClockSource::IoClock,
            prescale: Prescale::By64,
            overflow_irq: false,
            compare_irq: true,
        };
        let timer = TickTimer::init(MockRegs::new(), config).unwrap();
        assert!(timer.regs.ops.contains(&Op::Prescale(Prescale::By64)));
        assert!(timer.regs.ops.contains(&Op::IrqMask(false, true)));
        assert!(timer.regs.ops.contains(&Op::Clock(ClockSource::IoClock)));
    }

    #[test]
    fn stuck_update_reports_peripheral_unavailable() {
        let result = TickTimer::init(MockRegs::stuck(), TimerConfig::ONE_SECOND);
        assert_eq!(result.err(), Some(Error::PeripheralUnavailable));
    }

    #[test]
    fn init_on_a_fresh_peripheral_is_deterministic() {
        let first = TickTimer::init(MockRegs::new(), TimerConfig::ONE_SECOND).unwrap();
        let second = TickTimer::init(MockRegs::new(), TimerConfig::ONE_SECOND).unwrap();
        assert_eq!(first.regs.ops, second.regs.ops);
    }

    #[test]
    fn one_second_config_overflows_at_one_hertz() {
        let config = TimerConfig::ONE_SECOND;
        let overflow_hz = 32_768 / config.prescale.divisor() / 256;
        assert_eq!(overflow_hz, 1);
    }
}
