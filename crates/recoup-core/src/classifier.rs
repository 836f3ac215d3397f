//! Abandonment classification for raw cart events.
//!
//! A heuristic, not a guarantee: a cart counts as abandoned once its own
//! last-activity timestamp is older than the policy threshold. The event's
//! timestamp is used rather than the time of processing, so ingestion lag
//! alone never makes a fresh cart look abandoned.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Error, Result, event::CartEvent};

/// Default abandonment threshold, in seconds.
pub const DEFAULT_THRESHOLD_SECS: u64 = 60 * 60;

/// Largest accepted threshold: thirty days.
pub const MAX_THRESHOLD_SECS: u64 = 30 * 24 * 60 * 60;

/// Decision produced by [`AbandonmentPolicy::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
  /// The cart has been idle for longer than the threshold.
  Abandoned {
    #[serde(rename = "age_secs", serialize_with = "secs")]
    age: Duration,
  },
  /// Idle, but not for long enough (or timestamped in the future).
  TooRecent {
    #[serde(rename = "age_secs", serialize_with = "secs")]
    age: Duration,
  },
  /// The cart already carries a completed-checkout reference.
  Converted,
  /// The event has no usable timestamp to judge by.
  Undated,
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_i64(d.num_seconds())
}

impl Classification {
  pub fn is_abandoned(&self) -> bool { matches!(self, Self::Abandoned { .. }) }

  pub fn reason(&self) -> &'static str {
    match self {
      Self::Abandoned { .. } => "abandoned",
      Self::TooRecent { .. } => "too_recent",
      Self::Converted => "converted",
      Self::Undated => "undated",
    }
  }
}

/// Threshold configuration for the classifier.
#[derive(Debug, Clone, Copy)]
pub struct AbandonmentPolicy {
  pub threshold: Duration,
}

impl Default for AbandonmentPolicy {
  fn default() -> Self {
    Self {
      threshold: Duration::hours(1),
    }
  }
}

impl AbandonmentPolicy {
  /// A policy with a threshold of `secs` seconds.
  ///
  /// Rejects zero and anything above [`MAX_THRESHOLD_SECS`].
  pub fn from_secs(secs: u64) -> Result<Self> {
    let invalid = || Error::InvalidThreshold {
      secs,
      max: MAX_THRESHOLD_SECS,
    };
    if secs == 0 || secs > MAX_THRESHOLD_SECS {
      return Err(invalid());
    }
    let threshold = i64::try_from(secs)
      .ok()
      .and_then(Duration::try_seconds)
      .ok_or_else(invalid)?;
    Ok(Self { threshold })
  }

  /// Decide whether `event` describes an abandoned cart as of `now`.
  ///
  /// The gap must strictly exceed the threshold.
  pub fn classify(&self, event: &CartEvent, now: DateTime<Utc>) -> Classification {
    if event.has_completed_checkout() {
      return Classification::Converted;
    }
    let Some(last_activity) = event.last_activity() else {
      return Classification::Undated;
    };

    let age = now - last_activity;
    if age > self.threshold {
      Classification::Abandoned { age }
    } else {
      Classification::TooRecent { age }
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::event::{InboundEvent, Topic};

  fn cart(body: serde_json::Value) -> CartEvent {
    match InboundEvent::parse(&Topic::CartUpdate, body.to_string().as_bytes()).unwrap() {
      InboundEvent::Cart(c) => c,
      other => panic!("unexpected {other:?}"),
    }
  }

  fn updated_minutes_ago(now: DateTime<Utc>, minutes: i64) -> CartEvent {
    cart(json!({ "id": "c1", "updated_at": (now - Duration::minutes(minutes)).to_rfc3339() }))
  }

  #[test]
  fn fifty_nine_minutes_is_not_abandoned() {
    let now = Utc::now();
    let class = AbandonmentPolicy::default().classify(&updated_minutes_ago(now, 59), now);
    assert!(matches!(class, Classification::TooRecent { .. }));
  }

  #[test]
  fn sixty_one_minutes_is_abandoned() {
    let now = Utc::now();
    let class = AbandonmentPolicy::default().classify(&updated_minutes_ago(now, 61), now);
    assert!(class.is_abandoned());
  }

  #[test]
  fn exactly_the_threshold_is_not_abandoned() {
    let now = Utc::now();
    let class = AbandonmentPolicy::default().classify(&updated_minutes_ago(now, 60), now);
    assert_eq!(class.reason(), "too_recent");
  }

  #[test]
  fn event_timestamp_wins_over_processing_time() {
    // Processed two hours late, but the cart was touched a minute before the
    // event was emitted.
    let emitted = Utc::now() - Duration::hours(2);
    let event = cart(json!({
      "id": "c1",
      "created_at": (emitted - Duration::days(1)).to_rfc3339(),
      "updated_at": (emitted - Duration::minutes(1)).to_rfc3339(),
    }));
    let class = AbandonmentPolicy::default().classify(&event, emitted);
    assert!(matches!(class, Classification::TooRecent { .. }));
  }

  #[test]
  fn completed_checkout_is_converted() {
    let now = Utc::now();
    let event = cart(json!({
      "id": "c1",
      "updated_at": (now - Duration::hours(3)).to_rfc3339(),
      "completed_at": (now - Duration::hours(2)).to_rfc3339(),
    }));
    assert_eq!(AbandonmentPolicy::default().classify(&event, now), Classification::Converted);

    let event = cart(json!({ "id": "c1", "order_id": 55, "updated_at": (now - Duration::hours(3)).to_rfc3339() }));
    assert_eq!(AbandonmentPolicy::default().classify(&event, now), Classification::Converted);
  }

  #[test]
  fn missing_timestamps_are_undated() {
    let event = cart(json!({ "id": "c1" }));
    assert_eq!(
      AbandonmentPolicy::default().classify(&event, Utc::now()),
      Classification::Undated
    );
  }

  #[test]
  fn falls_back_to_created_at() {
    let now = Utc::now();
    let event = cart(json!({ "id": "c1", "created_at": (now - Duration::hours(2)).to_rfc3339() }));
    assert!(AbandonmentPolicy::default().classify(&event, now).is_abandoned());
  }

  #[test]
  fn custom_threshold() {
    let now = Utc::now();
    let policy = AbandonmentPolicy::from_secs(10 * 60).unwrap();
    assert!(policy.classify(&updated_minutes_ago(now, 11), now).is_abandoned());
  }

  #[test]
  fn default_matches_default_secs() {
    let policy = AbandonmentPolicy::from_secs(DEFAULT_THRESHOLD_SECS).unwrap();
    assert_eq!(policy.threshold, AbandonmentPolicy::default().threshold);
  }

  #[test]
  fn out_of_range_thresholds_are_rejected() {
    for secs in [0, MAX_THRESHOLD_SECS + 1, u64::MAX] {
      assert!(matches!(
        AbandonmentPolicy::from_secs(secs),
        Err(Error::InvalidThreshold { .. })
      ));
    }
    assert!(AbandonmentPolicy::from_secs(MAX_THRESHOLD_SECS).is_ok());
  }
}
