use crate::error::InputError;
use crate::types::ScanTarget;

/// Validate raw form input (address and two port fields) into a `ScanTarget`.
///
/// This is the caller-side step that runs before any network activity:
/// - the address is trimmed and must not be empty
/// - each port must be an integer in `0..=65535`
/// - the end port must not be below the start port
pub fn parse_target(address: &str, start: &str, end: &str) -> Result<ScanTarget, InputError> {
    let start = parse_number(start)?;
    let end = parse_number(end)?;
    build_target(address, start, end)
}

/// Numeric variant of [`parse_target`], for callers that already hold integers (e.g. JSON).
pub fn build_target(address: &str, start: i64, end: i64) -> Result<ScanTarget, InputError> {
    let (start_port, end_port) = check_range(start, end)?;
    let address = address.trim();
    if address.is_empty() {
        return Err(InputError::EmptyAddress);
    }
    Ok(ScanTarget::new(address, start_port, end_port))
}

/// Parse a single port value. Port 0 is accepted; it simply never answers.
pub fn parse_port(s: &str) -> Result<u16, InputError> {
    check_port(parse_number(s)?)
}

/// Check both bounds and their order.
pub fn check_range(start: i64, end: i64) -> Result<(u16, u16), InputError> {
    let start = check_port(start)?;
    let end = check_port(end)?;
    if end < start {
        return Err(InputError::EndBeforeStart { start, end });
    }
    Ok((start, end))
}

fn check_port(val: i64) -> Result<u16, InputError> {
    u16::try_from(val).map_err(|_| InputError::OutOfRange(val))
}

fn parse_number(s: &str) -> Result<i64, InputError> {
    let s = s.trim();
    s.parse::<i64>()
        .map_err(|_| InputError::NotANumber(s.to_string()))
}
