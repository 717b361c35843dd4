//! Next-24-hours temperature trend for the detail view.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone};

use crate::model::ForecastRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    /// `HH:MM`, 24-hour clock, in the time zone of the `now` the trend was built for.
    pub time: String,
    pub temperature: i64,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Forecast entries with `now <= dt <= now + 24h`, kept in input order.
///
/// Pass `Utc::now()` for UTC labels or `Local::now()` for the viewer's wall clock.
pub fn temperature_trend<Tz>(forecast: &ForecastRecord, now: DateTime<Tz>) -> Vec<TrendPoint>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let zone = now.timezone();
    let from = now.timestamp();
    let until = from + Duration::hours(24).num_seconds();

    forecast
        .list
        .iter()
        .filter(|entry| entry.dt >= from && entry.dt <= until)
        .filter_map(|entry| {
            let at = DateTime::from_timestamp(entry.dt, 0)?.with_timezone(&zone);
            Some(TrendPoint {
                time: at.format("%H:%M").to_string(),
                temperature: round_half_up(entry.main.temp),
                timestamp: entry.dt,
            })
        })
        .collect()
}

fn round_half_up(t: f64) -> i64 {
    (t + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, ForecastEntry, MainReading, Wind};
    use chrono::{FixedOffset, Utc};

    const NOW: i64 = 1_700_000_000; // 2023-11-14 22:13:20 UTC
    const HOUR: i64 = 3600;

    fn forecast(entries: &[(i64, f64)]) -> ForecastRecord {
        ForecastRecord {
            list: entries
                .iter()
                .map(|&(dt, temp)| ForecastEntry {
                    dt,
                    main: MainReading { temp, humidity: 40 },
                    weather: vec![Condition {
                        description: "clear sky".into(),
                        icon: "01n".into(),
                    }],
                    wind: Wind { speed: 2.0 },
                })
                .collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).expect("valid timestamp")
    }

    #[test]
    fn keeps_only_the_next_day() {
        let record = forecast(&[
            (NOW - HOUR, 1.0),
            (NOW, 2.0),
            (NOW + 3 * HOUR, 3.0),
            (NOW + 24 * HOUR, 4.0),
            (NOW + 24 * HOUR + 1, 5.0),
        ]);

        let trend = temperature_trend(&record, now());
        let stamps: Vec<i64> = trend.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![NOW, NOW + 3 * HOUR, NOW + 24 * HOUR]);
    }

    #[test]
    fn labels_are_utc_hours_and_minutes() {
        let trend = temperature_trend(&forecast(&[(NOW, 0.0), (NOW + 2 * HOUR, 0.0)]), now());
        assert_eq!(trend[0].time, "22:13");
        assert_eq!(trend[1].time, "00:13");
    }

    #[test]
    fn labels_follow_the_zone_of_now() {
        let kyiv = FixedOffset::east_opt(2 * HOUR as i32).expect("valid offset");
        let record = forecast(&[(NOW, 0.0), (NOW + 2 * HOUR, 0.0)]);

        let trend = temperature_trend(&record, now().with_timezone(&kyiv));

        assert_eq!(trend[0].time, "00:13");
        assert_eq!(trend[1].time, "02:13");
        assert_eq!(trend[0].timestamp, NOW);
    }

    #[test]
    fn temperatures_round_half_up() {
        let record = forecast(&[(NOW, 12.5), (NOW + 1, 12.49), (NOW + 2, -2.5), (NOW + 3, -2.51)]);
        let temps: Vec<i64> =
            temperature_trend(&record, now()).iter().map(|p| p.temperature).collect();
        assert_eq!(temps, vec![13, 12, -2, -3]);
    }

    #[test]
    fn preserves_input_order() {
        let record = forecast(&[(NOW + 2 * HOUR, 1.0), (NOW + HOUR, 2.0)]);
        let trend = temperature_trend(&record, now());
        assert_eq!(trend[0].timestamp, NOW + 2 * HOUR);
        assert_eq!(trend[1].timestamp, NOW + HOUR);
    }

    #[test]
    fn empty_forecast_gives_empty_trend() {
        assert!(temperature_trend(&forecast(&[]), now()).is_empty());
    }
}
