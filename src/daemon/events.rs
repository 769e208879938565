/// Messages drained by the owner loop. Everything that mutates the live counters arrives here,
/// which keeps a single writer without any locking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsEvent {
    /// Number of keys pressed since the previous event.
    Keys(u64),
    /// Cursor distance in millimetres accumulated during one flush interval.
    Distance(f64),
    /// The machine is about to sleep.
    Suspend,
    /// The machine woke up, or the user came back to it.
    Resume,
}
