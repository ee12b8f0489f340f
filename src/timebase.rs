use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Seconds counter shared between the timer overflow interrupt and the main
/// loop.
///
/// Every accessor performs a single atomic load/store on the shared word, so
/// an overflow firing in the middle of a call can never produce a torn value.
/// On AVR the atomics compile down to a short interrupts-off window around
/// the access itself, nothing more.
pub struct TimeBase {
    /// Unix time in seconds. Wraps after ~136 years, which we accept.
    seconds: AtomicU32,
    /// Sticky once-per-second signal, raised by the interrupt, cleared by
    /// the consumer.
    new_cycle: AtomicBool,
}

impl TimeBase {
    pub const fn new() -> TimeBase {
        TimeBase::with_epoch(0)
    }

    /// Start counting from an externally supplied epoch.
    pub const fn with_epoch(seconds: u32) -> TimeBase {
        TimeBase {
            seconds: AtomicU32::new(seconds),
            new_cycle: AtomicBool::new(false),
        }
    }

    pub fn get_time(&self) -> u32 {
        self.seconds.load(Ordering::SeqCst)
    }

    /// Overwrite the counter, e.g. on external time synchronization. Leaves
    /// any pending cycle signal untouched.
    pub fn set_time(&self, seconds: u32) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }

    /// Producer side: mark that a new one-second cycle has started.
    ///
    /// Safe to call from the overflow interrupt. A signal that was never
    /// consumed stays raised; repeated overflows collapse into one pending
    /// signal, no count of missed cycles is kept here.
    pub fn signal_new_cycle(&self) {
        self.new_cycle.store(true, Ordering::SeqCst);
    }

    /// Read and clear the cycle signal in one indivisible step, returning
    /// what was read. A separate read and clear could drop a signal raised
    /// in between; the swap cannot.
    pub fn consume_new_cycle(&self) -> bool {
        self.new_cycle.swap(false, Ordering::SeqCst)
    }

    /// One overflow tick: advance the counter and raise the cycle signal.
    pub fn tick(&self) {
        self.seconds.fetch_add(1, Ordering::SeqCst);
        self.signal_new_cycle();
    }
}

static TIMEBASE: TimeBase = TimeBase::new();

/// The one time base the firmware runs on. The overflow interrupt and the
/// main loop both go through the accessors, never the raw fields.
pub fn timebase() -> &'static TimeBase {
    &TIMEBASE
}
