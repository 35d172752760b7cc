//! Fixed command blocks and banners

/// Safety block sent when a session aborts, in this order:
/// hot-end heater off, bed heater off, part fan off, steppers disabled.
pub const SAFETY_SHUTDOWN: [&str; 4] = ["M104 S0", "M140 S0", "M107", "M84"];

/// Prefix of the banner some firmwares print once they finish booting
pub const INIT_BANNER_PREFIX: &str = "init";

/// Check if a response line is the boot banner (case-insensitive)
pub fn is_init_banner(line: &str) -> bool {
    starts_with_ignore_case(line, INIT_BANNER_PREFIX)
}

pub(crate) fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
