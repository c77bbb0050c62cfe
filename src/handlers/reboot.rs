//! Reboot Scheduler: immediate, delayed, or at an absolute local time.
//!
//! Schedule validation happens entirely before any connection attempt, so
//! operator-input mistakes never touch a device.

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use tracing::{info, warn};

use crate::errors::{OpsError, OpsResult};
use crate::handlers::{connect_or_report, notify, report_failure, Capabilities};
use crate::netconf::failures::{classify_remote_failure, sanitize_remote_error, RemoteFailure};
use crate::netconf::{RpcReply, RpcRequest};

/// When the device should go down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebootSchedule {
    Now,
    After { minutes: u64 },
    At(NaiveDateTime),
}

/// Time-of-day formats accepted for absolute schedules.
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M %p", "%I %p"];

impl RebootSchedule {
    /// Build a schedule from TIME/DATE entities. No entities means reboot
    /// now. Relative phrases ("10 minutes") normalize to whole minutes;
    /// absolute times are resolved against `now`, with a DATE entity of
    /// "tomorrow" pushing them forward a day before the past check.
    pub fn from_entities(
        time: Option<&str>,
        date: Option<&str>,
        now: NaiveDateTime,
    ) -> OpsResult<Self> {
        let time = time.map(str::trim).filter(|t| !t.is_empty());
        let date = date.map(|d| d.trim().to_lowercase());

        let Some(time) = time else {
            return Ok(RebootSchedule::Now);
        };

        if is_relative(time) {
            let minutes = parse_relative_minutes(time)?;
            return Ok(RebootSchedule::After { minutes });
        }

        let parsed = parse_time_of_day(time)
            .ok_or_else(|| OpsError::InvalidSchedule(format!("I'm not sure what {} means", time)))?;
        let mut at = now.date().and_time(parsed);
        if date.as_deref() == Some("tomorrow") {
            at += ChronoDuration::days(1);
        }
        if at <= now {
            return Err(OpsError::InvalidSchedule(format!("{} is in the past", at)));
        }
        Ok(RebootSchedule::At(at))
    }

    /// The structured call for this schedule. Absolute times use the Junos
    /// `yymmddHHMM` form.
    pub fn to_rpc(&self) -> RpcRequest {
        match self {
            RebootSchedule::Now => RpcRequest::Reboot {
                at: None,
                in_minutes: None,
            },
            RebootSchedule::After { minutes } => RpcRequest::Reboot {
                at: None,
                in_minutes: Some(*minutes),
            },
            RebootSchedule::At(at) => RpcRequest::Reboot {
                at: Some(at.format("%y%m%d%H%M").to_string()),
                in_minutes: None,
            },
        }
    }

    /// Operator-facing description used in acknowledgements.
    pub fn describe(&self, device: &str) -> String {
        match self {
            RebootSchedule::Now => format!("Reboot requested for {}", device),
            RebootSchedule::After { minutes } => {
                format!("Rebooting {} in {} minutes", device, minutes)
            }
            RebootSchedule::At(at) => format!("Rebooting {} at {}", device, at),
        }
    }
}

fn is_relative(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["second", "minute", "hour", "day"]
        .iter()
        .any(|unit| lower.contains(unit))
}

/// Normalize "N <unit>" to whole minutes. Rejects unknown units and
/// anything that does not work out to at least one minute.
fn parse_relative_minutes(text: &str) -> OpsResult<u64> {
    let mut parts = text.split_whitespace();
    let value: i64 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| OpsError::InvalidSchedule(format!("I'm not sure what {} means", text)))?;
    let unit = parts.next().unwrap_or("").to_lowercase();

    if value < 1 {
        return Err(OpsError::InvalidSchedule(
            "the delay needs to be a positive whole number".to_string(),
        ));
    }

    #[allow(clippy::cast_sign_loss)]
    let value = value as u64;
    let minutes = match unit.trim_end_matches('s') {
        "minute" => Some(value),
        "hour" => value.checked_mul(60),
        "day" => value.checked_mul(1440),
        "second" => Some(value / 60),
        other => return Err(OpsError::UnitParse(other.to_string())),
    };
    let minutes = minutes.ok_or_else(|| {
        OpsError::InvalidSchedule("that delay is further out than I can schedule".to_string())
    })?;

    if minutes < 1 {
        return Err(OpsError::InvalidSchedule(
            "that works out to less than one minute".to_string(),
        ));
    }
    Ok(minutes)
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let cleaned = text.trim().to_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&cleaned, fmt).ok())
}

/// Execute one reboot job. The schedule has already been validated.
pub async fn run(caps: Capabilities, device: String, chat_id: String, schedule: RebootSchedule) {
    let Some(mut session) = connect_or_report(&caps, &device, &chat_id).await else {
        return;
    };

    info!("rebooting {}: {:?}", device, schedule);
    let outcome = session.rpc(schedule.to_rpc()).await;
    session.close().await;

    match outcome {
        Ok(RpcReply::Text(text)) => {
            let text = sanitize_remote_error(&text);
            notify(&caps, &chat_id, &format!("{}: {}", device, text)).await;
        }
        Ok(RpcReply::Status(true)) => {
            notify(&caps, &chat_id, &format!("{}: reboot initiated", device)).await;
        }
        Ok(RpcReply::Status(false)) => {
            notify(
                &caps,
                &chat_id,
                &format!(
                    "{}: the device did not accept the reboot request - check the system logs",
                    device
                ),
            )
            .await;
        }
        Err(OpsError::RemoteCommand(text))
            if classify_remote_failure(&text) == RemoteFailure::RebootAlreadyScheduled =>
        {
            warn!("{}: another shutdown already scheduled", device);
            notify(
                &caps,
                &chat_id,
                &format!("Unable to reboot {} - another reboot is already scheduled", device),
            )
            .await;
        }
        // An immediate reboot takes the management plane down with it;
        // losing the connection here is the success signal.
        Err(OpsError::Connect(_)) if schedule == RebootSchedule::Now => {
            notify(&caps, &chat_id, &format!("{} is going down for reboot now", device)).await;
        }
        Err(OpsError::RemoteCommand(text))
            if schedule == RebootSchedule::Now
                && classify_remote_failure(&text) == RemoteFailure::Disconnected =>
        {
            notify(&caps, &chat_id, &format!("{} is going down for reboot now", device)).await;
        }
        Err(e) => report_failure(&caps, &chat_id, &device, "reboot", &e).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 26)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn no_entities_means_now() {
        let schedule = RebootSchedule::from_entities(None, None, base_now()).unwrap();
        assert_eq!(schedule, RebootSchedule::Now);
        assert_eq!(
            schedule.to_rpc(),
            RpcRequest::Reboot {
                at: None,
                in_minutes: None
            }
        );
    }

    #[test]
    fn relative_units_normalize_to_minutes() {
        let cases = [
            ("10 minutes", 10),
            ("1 minute", 1),
            ("2 hours", 120),
            ("1 day", 1440),
            ("120 seconds", 2),
        ];
        for (text, expected) in cases {
            let schedule = RebootSchedule::from_entities(Some(text), None, base_now()).unwrap();
            assert_eq!(schedule, RebootSchedule::After { minutes: expected }, "{}", text);
        }
    }

    #[test]
    fn unknown_unit_fails_with_unit_parse() {
        let err =
            RebootSchedule::from_entities(Some("3 fortnights"), None, base_now()).unwrap_err();
        assert!(matches!(err, OpsError::UnitParse(unit) if unit == "fortnight"));
    }

    #[test]
    fn negative_duration_rejected_before_any_connection() {
        let err = RebootSchedule::from_entities(Some("-1 minutes"), None, base_now()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(_)));
    }

    #[test]
    fn astronomical_delay_is_rejected_not_wrapped() {
        // i64::MAX days would overflow the minute multiplication.
        let err =
            RebootSchedule::from_entities(Some("9223372036854775807 days"), None, base_now())
                .unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(_)));

        let err = RebootSchedule::from_entities(Some("9000000000000000000 hours"), None, base_now())
            .unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(_)));
    }

    #[test]
    fn sub_minute_duration_rejected() {
        let err = RebootSchedule::from_entities(Some("30 seconds"), None, base_now()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(_)));
    }

    #[test]
    fn absolute_time_later_today_is_accepted() {
        let schedule =
            RebootSchedule::from_entities(Some("23:30"), None, base_now()).unwrap();
        let RebootSchedule::At(at) = schedule else {
            panic!("expected absolute schedule");
        };
        assert_eq!(at.format("%y%m%d%H%M").to_string(), "2608262330");
    }

    #[test]
    fn past_absolute_time_is_invalid() {
        // 09:00 against a 10:00 clock.
        let err = RebootSchedule::from_entities(Some("9:00"), None, base_now()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(msg) if msg.contains("in the past")));
    }

    #[test]
    fn tomorrow_shifts_past_times_forward() {
        let schedule =
            RebootSchedule::from_entities(Some("9:00"), Some("tomorrow"), base_now()).unwrap();
        let RebootSchedule::At(at) = schedule else {
            panic!("expected absolute schedule");
        };
        assert_eq!(at.format("%y%m%d%H%M").to_string(), "2608270900");
    }

    #[test]
    fn twelve_hour_clock_is_understood() {
        let schedule =
            RebootSchedule::from_entities(Some("11:30 pm"), None, base_now()).unwrap();
        assert_eq!(
            schedule,
            RebootSchedule::At(base_now().date().and_hms_opt(23, 30, 0).unwrap())
        );
    }

    #[test]
    fn gibberish_time_is_rejected() {
        let err = RebootSchedule::from_entities(Some("whenever"), None, base_now()).unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchedule(_)));
    }

    #[test]
    fn rpc_encoding_uses_junos_timestamp_form() {
        let at = NaiveDate::from_ymd_opt(2026, 12, 31)
            .unwrap()
            .and_hms_opt(23, 45, 0)
            .unwrap();
        assert_eq!(
            RebootSchedule::At(at).to_rpc(),
            RpcRequest::Reboot {
                at: Some("2612312345".to_string()),
                in_minutes: None
            }
        );
        assert_eq!(
            RebootSchedule::After { minutes: 15 }.to_rpc(),
            RpcRequest::Reboot {
                at: None,
                in_minutes: Some(15)
            }
        );
    }
}
