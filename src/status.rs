use std::time::Duration;

/// Status line shown while a query is outstanding, keyed by how long ago
/// it was submitted. Must stay sorted by threshold.
const SCHEDULE: [(Duration, &str); 4] = [
    (Duration::from_secs(0), "Thinking..."),
    (Duration::from_secs(4), "Skimming through your documents..."),
    (Duration::from_secs(10), "Sorry for the delay, this one is taking a while..."),
    (Duration::from_secs(20), "Still working on it, hang tight!"),
];

pub const SPINNER_FRAMES: [&str; 10] = [
    "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
];

/// Tick period of the status clock.
pub const TICK: Duration = Duration::from_millis(80);

pub fn message_for(elapsed: Duration) -> &'static str {
    SCHEDULE
        .iter()
        .rev()
        .find(|(threshold, _)| elapsed >= *threshold)
        .map(|(_, message)| *message)
        .unwrap_or(SCHEDULE[0].1)
}

pub fn spinner_frame(frame: usize) -> &'static str {
    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
}
