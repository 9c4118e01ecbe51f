use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Wall-clock time rendered as `h:mm:ss.cc`.
pub struct ElapsedDisplay(u128);

pub trait ElapsedExt {
    fn display_elapsed(&self) -> ElapsedDisplay;
}

impl ElapsedExt for Duration {
    fn display_elapsed(&self) -> ElapsedDisplay {
        ElapsedDisplay((self.as_millis() + 5) / 10)
    }
}

impl Display for ElapsedDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let total_secs = self.0 / 100;
        let hours = total_secs / 3600;
        let minutes = total_secs % 3600 / 60;
        let seconds = total_secs % 60;
        let fraction = self.0 % 100;

        write!(f, "{}:{:02}:{:02}.{:02}", hours, minutes, seconds, fraction)
    }
}
