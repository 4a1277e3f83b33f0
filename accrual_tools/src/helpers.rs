use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::AccrualApiError;

/// The longest cool-down the service may ask for. Anything longer is treated as a garbled header.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// The accrual service expresses its cool-down as a whole number of seconds in the `Retry-After` header.
pub fn parse_retry_after(value: Option<&HeaderValue>) -> Result<Duration, AccrualApiError> {
    let value = value.ok_or_else(|| AccrualApiError::InvalidRetryAfter("header is missing".to_string()))?;
    let text = value.to_str().map_err(|e| AccrualApiError::InvalidRetryAfter(e.to_string()))?;
    let secs = text
        .trim()
        .parse::<u64>()
        .map_err(|e| AccrualApiError::InvalidRetryAfter(format!("Invalid delay value: {text}. {e}.")))?;
    let delay = Duration::from_secs(secs);
    if delay > MAX_RETRY_AFTER {
        return Err(AccrualApiError::InvalidRetryAfter(format!(
            "{secs}s is longer than the {}s limit",
            MAX_RETRY_AFTER.as_secs()
        )));
    }
    Ok(delay)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        let v = HeaderValue::from_static("60");
        assert_eq!(parse_retry_after(Some(&v)).unwrap(), Duration::from_secs(60));
        let v = HeaderValue::from_static(" 5 ");
        assert_eq!(parse_retry_after(Some(&v)).unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_must_be_whole_seconds() {
        let v = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(matches!(parse_retry_after(Some(&v)), Err(AccrualApiError::InvalidRetryAfter(_))));
        let v = HeaderValue::from_static("-3");
        assert!(parse_retry_after(Some(&v)).is_err());
        assert!(parse_retry_after(None).is_err());
    }

    #[test]
    fn absurd_delays_are_rejected() {
        let v = HeaderValue::from_static("86400");
        assert_eq!(parse_retry_after(Some(&v)).unwrap(), MAX_RETRY_AFTER);
        for huge in ["86401", "9223372036854775808", "18446744073709551615"] {
            let v = HeaderValue::from_static(huge);
            assert!(matches!(parse_retry_after(Some(&v)), Err(AccrualApiError::InvalidRetryAfter(_))), "{huge}");
        }
    }
}
