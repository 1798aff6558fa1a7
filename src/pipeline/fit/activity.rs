use chrono::{DateTime, Duration, Local, Offset, Utc};

use crate::error::EncodeError;
use crate::pipeline::fit::profile::{
    self, date_time, mesg_num, position, scaled_u16, scaled_u32, Message, Value,
    TIMESTAMP_FIELD,
};
use crate::pipeline::fit::writer::{FitWriter, MessageSink};
use crate::types::activity::ActivitySummary;

pub const PRODUCT_NAME: &str = "TreadmillWalk";
pub const SERIAL_NUMBER: u32 = 0xDEAD_BEEF;
pub const MIN_DATA_POINTS: usize = 100;
pub const DEFAULT_SAMPLE_STEP_SECONDS: f64 = 10.0;
pub const DEFAULT_START_POSITION: (f64, f64) = (10.0, -40.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    /// Target spacing between record messages, in seconds.
    pub sample_step_seconds: f64,
    /// Fixed (lat, lon) in degrees; `None` leaves positions out.
    pub start_position: Option<(f64, f64)>,
    /// Offset added to the start time for the activity's local timestamp.
    pub utc_offset_seconds: i64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            sample_step_seconds: DEFAULT_SAMPLE_STEP_SECONDS,
            start_position: Some(DEFAULT_START_POSITION),
            utc_offset_seconds: local_utc_offset_seconds(),
        }
    }
}

pub fn local_utc_offset_seconds() -> i64 {
    Local::now().offset().fix().local_minus_utc() as i64
}

/// Number of intervals between record messages; one more record than this
/// is written.
pub fn data_point_count(duration_s: f64, step_s: f64) -> usize {
    let step = if step_s.is_finite() && step_s > 0.0 {
        step_s
    } else {
        DEFAULT_SAMPLE_STEP_SECONDS
    };
    ((duration_s / step).ceil() as usize).max(MIN_DATA_POINTS)
}

/// Encodes a treadmill activity that ends now.
pub fn encode_activity(
    summary: &ActivitySummary,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    encode_activity_at(summary, options, Utc::now())
}

/// Encodes a treadmill activity ending at `end_time`.
pub fn encode_activity_at(
    summary: &ActivitySummary,
    options: &EncodeOptions,
    end_time: DateTime<Utc>,
) -> Result<Vec<u8>, EncodeError> {
    let mut writer = FitWriter::new();
    write_activity(&mut writer, summary, options, end_time)?;
    writer.finish()
}

/// Emits the full message sequence for one activity into `sink`.
pub fn write_activity<S: MessageSink>(
    sink: &mut S,
    summary: &ActivitySummary,
    options: &EncodeOptions,
    end_time: DateTime<Utc>,
) -> Result<(), EncodeError> {
    let duration_s = summary.duration_s;
    if !duration_s.is_finite() || duration_s <= 0.0 {
        return Err(EncodeError::InvalidDuration(duration_s));
    }

    let total_time = scaled_u32("total_timer_time", duration_s, 1000.0, 0.0)?;
    let start_time = shift_ms(end_time, -(duration_s * 1000.0).round() as i64).ok_or(
        EncodeError::OutOfRange {
            field: "duration",
            value: duration_s,
        },
    )?;
    let start = date_time(start_time)?;
    let end = date_time(end_time)?;
    let total_distance = scaled_u32("total_distance", summary.distance_m, 100.0, 0.0)?;
    let total_calories = scaled_u16("total_calories", summary.calories_kcal, 1.0, 0.0)?;
    let (ascent, descent) = climb_totals(summary.altitude_gain_m)?;
    let position = match options.start_position {
        Some((lat, lon)) => Some((position(lat)?, position(lon)?)),
        None => None,
    };

    sink.write_message(
        &Message::new(mesg_num::FILE_ID)
            .field(profile::file_id::TYPE, Value::Enum(profile::FILE_TYPE_ACTIVITY))
            .field(profile::file_id::MANUFACTURER, Value::UInt16(profile::MANUFACTURER_GARMIN))
            .field(profile::file_id::PRODUCT, Value::UInt16(0))
            .field(profile::file_id::SERIAL_NUMBER, Value::UInt32z(SERIAL_NUMBER))
            .field(profile::file_id::TIME_CREATED, start.clone())
            .field(profile::file_id::PRODUCT_NAME, Value::String(PRODUCT_NAME.to_string())),
    )?;

    let local_start = shift_ms(start_time, options.utc_offset_seconds.saturating_mul(1000))
        .ok_or(EncodeError::OutOfRange {
            field: "local_timestamp",
            value: options.utc_offset_seconds as f64,
        })
        .and_then(date_time)?;
    sink.write_message(
        &Message::new(mesg_num::ACTIVITY)
            .field(TIMESTAMP_FIELD, start.clone())
            .field(profile::activity::TOTAL_TIMER_TIME, total_time.clone())
            .field(profile::activity::NUM_SESSIONS, Value::UInt16(1))
            .field(profile::activity::TYPE, Value::Enum(profile::ACTIVITY_TYPE_MANUAL))
            .field(profile::activity::LOCAL_TIMESTAMP, local_start),
    )?;

    if let Some(weight_kg) = summary.weight_kg {
        sink.write_message(&Message::new(mesg_num::USER_PROFILE).field(
            profile::user_profile::WEIGHT,
            scaled_u16("weight", weight_kg, 10.0, 0.0)?,
        ))?;
    }

    sink.write_message(
        &Message::new(mesg_num::SESSION)
            .field(TIMESTAMP_FIELD, end.clone())
            .field(profile::session::START_TIME, start.clone())
            .field(profile::session::TOTAL_ELAPSED_TIME, total_time.clone())
            .field(profile::session::TOTAL_TIMER_TIME, total_time.clone())
            .field(profile::session::TOTAL_DISTANCE, total_distance.clone())
            .maybe_field(profile::session::TOTAL_ASCENT, ascent.clone())
            .maybe_field(profile::session::TOTAL_DESCENT, descent.clone())
            .field(profile::session::TOTAL_CALORIES, total_calories.clone())
            .maybe_field(profile::session::START_POSITION_LAT, position.as_ref().map(|p| p.0.clone()))
            .maybe_field(profile::session::START_POSITION_LONG, position.as_ref().map(|p| p.1.clone()))
            .field(profile::session::NUM_LAPS, Value::UInt16(1))
            .field(profile::session::SPORT, Value::Enum(profile::SPORT_WALKING)),
    )?;

    sink.write_message(
        &Message::new(mesg_num::LAP)
            .field(TIMESTAMP_FIELD, end)
            .field(profile::lap::START_TIME, start)
            .field(profile::lap::TOTAL_ELAPSED_TIME, total_time.clone())
            .field(profile::lap::TOTAL_TIMER_TIME, total_time)
            .field(profile::lap::TOTAL_DISTANCE, total_distance)
            .maybe_field(profile::lap::TOTAL_ASCENT, ascent)
            .maybe_field(profile::lap::TOTAL_DESCENT, descent)
            .field(profile::lap::TOTAL_CALORIES, total_calories)
            .maybe_field(profile::lap::START_POSITION_LAT, position.as_ref().map(|p| p.0.clone()))
            .maybe_field(profile::lap::START_POSITION_LONG, position.as_ref().map(|p| p.1.clone()))
            .field(profile::lap::SPORT, Value::Enum(profile::SPORT_WALKING)),
    )?;

    let intervals = data_point_count(duration_s, options.sample_step_seconds);
    let speed = scaled_u16("speed", summary.distance_m / duration_s, 1000.0, 0.0)?;
    for i in 0..=intervals {
        let fraction = i as f64 / intervals as f64;
        let offset_ms = (fraction * duration_s * 1000.0).round() as i64;
        let timestamp = shift_ms(start_time, offset_ms)
            .ok_or(EncodeError::OutOfRange {
                field: "timestamp",
                value: fraction * duration_s,
            })
            .and_then(date_time)?;

        let record = Message::new(mesg_num::RECORD)
            .field(TIMESTAMP_FIELD, timestamp)
            .maybe_field(profile::record::POSITION_LAT, position.as_ref().map(|p| p.0.clone()))
            .maybe_field(profile::record::POSITION_LONG, position.as_ref().map(|p| p.1.clone()))
            .field(
                profile::record::DISTANCE,
                scaled_u32("distance", fraction * summary.distance_m, 100.0, 0.0)?,
            )
            .field(
                profile::record::ALTITUDE,
                scaled_u16("altitude", fraction * summary.altitude_gain_m, 5.0, 500.0)?,
            )
            .field(profile::record::SPEED, speed.clone())
            .field(
                profile::record::CALORIES,
                scaled_u16("calories", fraction * summary.calories_kcal, 1.0, 0.0)?,
            );
        sink.write_message(&record)?;
    }

    Ok(())
}

fn shift_ms(time: DateTime<Utc>, ms: i64) -> Option<DateTime<Utc>> {
    Duration::try_milliseconds(ms).and_then(|delta| time.checked_add_signed(delta))
}

/// Splits a signed altitude change into the ascent and descent totals.
fn climb_totals(altitude_gain_m: f64) -> Result<(Option<Value>, Option<Value>), EncodeError> {
    if altitude_gain_m >= 0.0 {
        Ok((Some(scaled_u16("total_ascent", altitude_gain_m, 1.0, 0.0)?), None))
    } else if altitude_gain_m < 0.0 {
        Ok((None, Some(scaled_u16("total_descent", -altitude_gain_m, 1.0, 0.0)?)))
    } else {
        Err(EncodeError::OutOfRange {
            field: "total_ascent",
            value: altitude_gain_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fitparser::profile::MesgNum;

    fn summary() -> ActivitySummary {
        ActivitySummary {
            distance_m: 2600.0,
            altitude_gain_m: 347.62,
            calories_kcal: 324.0,
            duration_s: 1800.0,
            weight_kg: Some(72.0),
        }
    }

    fn options() -> EncodeOptions {
        EncodeOptions {
            utc_offset_seconds: 3600,
            ..EncodeOptions::default()
        }
    }

    fn end_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap()
    }

    fn as_f64(value: &fitparser::Value) -> Option<f64> {
        match value {
            fitparser::Value::Float64(v) => Some(*v),
            fitparser::Value::Float32(v) => Some(*v as f64),
            fitparser::Value::UInt8(v) => Some(*v as f64),
            fitparser::Value::UInt16(v) => Some(*v as f64),
            fitparser::Value::UInt32(v) => Some(*v as f64),
            fitparser::Value::SInt32(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn field(record: &fitparser::FitDataRecord, name: &str) -> Option<f64> {
        let enhanced = format!("enhanced_{name}");
        record
            .fields()
            .iter()
            .find(|f| f.name() == name || f.name() == enhanced)
            .and_then(|f| as_f64(f.value()))
    }

    /// Records message kinds without encoding anything.
    #[derive(Default)]
    struct CountingSink {
        kinds: Vec<u16>,
    }

    impl MessageSink for CountingSink {
        fn write_message(&mut self, message: &Message) -> Result<(), EncodeError> {
            self.kinds.push(message.global);
            Ok(())
        }
    }

    #[test]
    fn data_point_count_has_floor_of_one_hundred() {
        assert_eq!(data_point_count(60.0, 10.0), 100);
        assert_eq!(data_point_count(1800.0, 10.0), 180);
        assert_eq!(data_point_count(1801.0, 10.0), 181);
        assert_eq!(data_point_count(3600.0, 30.0), 120);
        assert_eq!(data_point_count(1800.0, 0.0), 180);
    }

    #[test]
    fn message_order_and_counts() {
        let mut sink = CountingSink::default();
        write_activity(&mut sink, &summary(), &options(), end_time()).unwrap();

        assert_eq!(
            &sink.kinds[..5],
            &[
                mesg_num::FILE_ID,
                mesg_num::ACTIVITY,
                mesg_num::USER_PROFILE,
                mesg_num::SESSION,
                mesg_num::LAP
            ]
        );
        let records = sink.kinds.iter().filter(|k| **k == mesg_num::RECORD).count();
        assert_eq!(records, 181);
        assert_eq!(sink.kinds.len(), 5 + 181);
    }

    #[test]
    fn user_profile_is_omitted_without_weight() {
        let mut sink = CountingSink::default();
        let summary = ActivitySummary {
            weight_kg: None,
            ..summary()
        };
        write_activity(&mut sink, &summary, &options(), end_time()).unwrap();
        assert!(!sink.kinds.contains(&mesg_num::USER_PROFILE));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let summary = ActivitySummary {
            duration_s: 0.0,
            ..summary()
        };
        assert!(matches!(
            encode_activity(&summary, &options()),
            Err(EncodeError::InvalidDuration(_))
        ));
    }

    #[test]
    fn huge_duration_is_out_of_range() {
        for duration_s in [1e12, 1e300, 60.0 * 86_400.0] {
            let summary = ActivitySummary {
                duration_s,
                ..summary()
            };
            assert!(matches!(
                encode_activity_at(&summary, &options(), end_time()),
                Err(EncodeError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn extreme_utc_offset_is_out_of_range() {
        let options = EncodeOptions {
            utc_offset_seconds: i64::MAX,
            ..options()
        };
        assert!(matches!(
            encode_activity_at(&summary(), &options, end_time()),
            Err(EncodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn encoded_file_decodes_with_interpolated_records() {
        let bytes = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        let records = fitparser::from_bytes(&bytes).expect("valid FIT");

        let kinds: Vec<MesgNum> = records.iter().map(|r| r.kind()).collect();
        assert_eq!(kinds[0], MesgNum::FileId);
        assert_eq!(kinds[1], MesgNum::Activity);
        assert_eq!(kinds[2], MesgNum::UserProfile);
        assert_eq!(kinds[3], MesgNum::Session);
        assert_eq!(kinds[4], MesgNum::Lap);
        assert_eq!(kinds.iter().filter(|k| **k == MesgNum::Session).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == MesgNum::Lap).count(), 1);

        let samples: Vec<_> = records.iter().filter(|r| r.kind() == MesgNum::Record).collect();
        assert_eq!(samples.len(), 181);

        let first = samples[0];
        assert_eq!(field(first, "distance"), Some(0.0));
        assert_eq!(field(first, "altitude"), Some(0.0));
        assert_eq!(field(first, "calories"), Some(0.0));

        let last = samples[samples.len() - 1];
        assert!((field(last, "distance").unwrap() - 2600.0).abs() < 0.01);
        assert!((field(last, "altitude").unwrap() - 347.6).abs() < 0.2);
        assert_eq!(field(last, "calories"), Some(324.0));
        assert!((field(last, "speed").unwrap() - 2600.0 / 1800.0).abs() < 0.001);

        let session = &records[3];
        assert!((field(session, "total_distance").unwrap() - 2600.0).abs() < 0.01);
        assert_eq!(field(session, "total_ascent"), Some(348.0));
        assert_eq!(field(session, "total_calories"), Some(324.0));
        assert!((field(session, "total_timer_time").unwrap() - 1800.0).abs() < 0.001);
    }

    #[test]
    fn record_timestamps_span_the_duration() {
        let bytes = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        let records = fitparser::from_bytes(&bytes).expect("valid FIT");
        let stamps: Vec<i64> = records
            .iter()
            .filter(|r| r.kind() == MesgNum::Record)
            .filter_map(|r| {
                r.fields().iter().find(|f| f.name() == "timestamp").and_then(|f| match f.value() {
                    fitparser::Value::Timestamp(t) => Some(t.timestamp()),
                    _ => None,
                })
            })
            .collect();
        assert_eq!(stamps.len(), 181);
        assert_eq!(stamps[0], end_time().timestamp() - 1800);
        assert_eq!(stamps[180], end_time().timestamp());
        assert!(stamps.windows(2).all(|w| w[1] - w[0] == 10));
    }

    #[test]
    fn positions_are_optional() {
        let with = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        let without = encode_activity_at(
            &summary(),
            &EncodeOptions {
                start_position: None,
                ..options()
            },
            end_time(),
        )
        .unwrap();
        assert!(without.len() < with.len());

        let records = fitparser::from_bytes(&without).expect("valid FIT");
        let sample = records.iter().find(|r| r.kind() == MesgNum::Record).unwrap();
        assert!(sample.fields().iter().all(|f| f.name() != "position_lat"));
    }

    #[test]
    fn same_instant_produces_identical_bytes() {
        let a = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        let b = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_instants_differ_only_in_timestamps() {
        let a = encode_activity_at(&summary(), &options(), end_time()).unwrap();
        let b = encode_activity_at(&summary(), &options(), end_time() + Duration::seconds(5))
            .unwrap();
        assert_eq!(a.len(), b.len());
        let decoded_a = fitparser::from_bytes(&a).unwrap();
        let decoded_b = fitparser::from_bytes(&b).unwrap();
        for (ra, rb) in decoded_a.iter().zip(decoded_b.iter()) {
            assert_eq!(ra.kind(), rb.kind());
            for (fa, fb) in ra.fields().iter().zip(rb.fields().iter()) {
                let is_time = matches!(fa.value(), fitparser::Value::Timestamp(_))
                    || matches!(
                        fa.name(),
                        "timestamp" | "local_timestamp" | "time_created" | "start_time"
                    );
                if is_time {
                    continue;
                }
                assert_eq!(fa.value(), fb.value(), "{}", fa.name());
            }
        }
    }

    #[test]
    fn descent_is_written_for_negative_gain() {
        let summary = ActivitySummary {
            altitude_gain_m: -30.0,
            ..summary()
        };
        let bytes = encode_activity_at(&summary, &options(), end_time()).unwrap();
        let records = fitparser::from_bytes(&bytes).unwrap();
        let session = records.iter().find(|r| r.kind() == MesgNum::Session).unwrap();
        assert_eq!(field(session, "total_descent"), Some(30.0));
        assert_eq!(field(session, "total_ascent"), None);
    }

    #[test]
    fn unrepresentable_totals_propagate_encoder_errors() {
        let summary = ActivitySummary {
            calories_kcal: f64::NAN,
            ..summary()
        };
        assert!(matches!(
            encode_activity_at(&summary, &options(), end_time()),
            Err(EncodeError::OutOfRange { field: "total_calories", .. })
        ));
    }
}
