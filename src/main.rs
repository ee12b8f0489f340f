#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

cfg_if::cfg_if! {
    if #[cfg(target_arch = "avr")] {
        use panic_halt as _;

        use embedded_hal::serial::Read;

        use orologio_arduino::ticktimer::{Tc2, TickTimer, TimerConfig};
        use orologio_arduino::timebase::timebase;
        use orologio_arduino::timesync::SyncParser;

        #[arduino_hal::entry]
        fn main() -> ! {
            let dp = arduino_hal::Peripherals::take().unwrap();
            let pins = arduino_hal::pins!(dp);

            let mut serial = arduino_hal::default_serial!(dp, pins, 57600);

            let timer = TickTimer::init(Tc2::new(dp.TC2, dp.CPU), TimerConfig::ONE_SECOND);
            let _timer = match timer {
                Ok(timer) => timer,
                Err(err) => {
                    // No working tick source, refuse to run without a time base.
                    ufmt::uwriteln!(&mut serial, "timer init failed: {:?}", err).unwrap();
                    loop {}
                }
            };

            //From this point on an interrupt can happen
            unsafe { avr_device::interrupt::enable() };

            let mut sync = SyncParser::new();

            loop {
                if timebase().consume_new_cycle() {
                    ufmt::uwriteln!(&mut serial, "t={}", timebase().get_time()).unwrap();
                }

                // Drain whatever the sync peer sent, without blocking the loop.
                loop {
                    match serial.read() {
                        Ok(byte) => {
                            if let Some(seconds) = sync.push(byte) {
                                timebase().set_time(seconds);
                                ufmt::uwriteln!(&mut serial, "sync t={}", seconds).unwrap();
                            }
                        }
                        Err(nb::Error::WouldBlock) => break,
                        Err(nb::Error::Other(_)) => break,
                    }
                }
            }
        }
    } else {
        // The firmware image only exists for the AVR target.
        fn main() {}
    }
}
