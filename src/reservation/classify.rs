//! Mapping portal messages to outcomes

use crate::{config::settings::ReservationSettings, types::ReservationOutcome};

/// Substrings that decide how a response message is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeMarkers {
    pub expiry: Vec<String>,
    pub success: Vec<String>,
}

impl OutcomeMarkers {
    pub fn new(expiry: Vec<String>, success: Vec<String>) -> Self {
        Self {
            expiry: expiry.into_iter().filter(|m| !m.is_empty()).collect(),
            success: success.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }
}

impl Default for OutcomeMarkers {
    fn default() -> Self {
        Self::from(&ReservationSettings::default())
    }
}

impl From<&ReservationSettings> for OutcomeMarkers {
    fn from(settings: &ReservationSettings) -> Self {
        Self::new(
            settings.expiry_markers.clone(),
            settings.success_markers.clone(),
        )
    }
}

/// Classify the message returned by the privileged action
///
/// Expiry markers are checked before success markers.
pub fn classify_response(message: &str, markers: &OutcomeMarkers) -> ReservationOutcome {
    let contains_any = |list: &[String]| list.iter().any(|marker| message.contains(marker.as_str()));

    if contains_any(&markers.expiry) {
        ReservationOutcome::SessionExpired(message.to_string())
    } else if contains_any(&markers.success) {
        ReservationOutcome::Success(message.to_string())
    } else {
        ReservationOutcome::RejectedRetryable(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("选课成功", ReservationOutcome::Success("选课成功".to_string()))]
    #[case(
        "课程容量已满",
        ReservationOutcome::RejectedRetryable("课程容量已满".to_string())
    )]
    #[case(
        "当前登录者身份已改变",
        ReservationOutcome::SessionExpired("当前登录者身份已改变".to_string())
    )]
    #[case(
        "登录失效，请重新登录",
        ReservationOutcome::SessionExpired("登录失效，请重新登录".to_string())
    )]
    #[case(
        "您的登录已失效",
        ReservationOutcome::SessionExpired("您的登录已失效".to_string())
    )]
    #[case("", ReservationOutcome::RejectedRetryable(String::new()))]
    fn test_default_markers(#[case] message: &str, #[case] expected: ReservationOutcome) {
        assert_eq!(classify_response(message, &OutcomeMarkers::default()), expected);
    }

    #[test]
    fn test_expiry_checked_before_success() {
        let outcome = classify_response("登录失效，重新登录成功后再试", &OutcomeMarkers::default());
        assert!(matches!(outcome, ReservationOutcome::SessionExpired(_)));
    }

    #[test]
    fn test_custom_markers_ignore_empty_entries() {
        let markers = OutcomeMarkers::new(
            vec![String::new(), "expired".to_string()],
            vec!["ok".to_string()],
        );
        assert!(matches!(
            classify_response("session expired", &markers),
            ReservationOutcome::SessionExpired(_)
        ));
        assert!(matches!(
            classify_response("ok", &markers),
            ReservationOutcome::Success(_)
        ));
        assert!(matches!(
            classify_response("选课成功", &markers),
            ReservationOutcome::RejectedRetryable(_)
        ));
    }
}
