use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Milliseconds left before a deadline, zero once it has passed
pub fn millis_remaining(started_at: u64, duration: Duration, now: u64) -> u64 {
    let deadline = started_at.saturating_add(duration.as_millis() as u64);
    deadline.saturating_sub(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_increases() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        assert!(get_timestamp() > first);
    }

    #[test]
    fn test_millis_remaining() {
        let duration = Duration::from_secs(10);
        assert_eq!(millis_remaining(1_000, duration, 1_000), 10_000);
        assert_eq!(millis_remaining(1_000, duration, 6_000), 5_000);
        assert_eq!(millis_remaining(1_000, duration, 11_000), 0);
        assert_eq!(millis_remaining(1_000, duration, 50_000), 0);
    }
}
