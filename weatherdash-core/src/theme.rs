use std::fmt;

use crate::model::WeatherSnapshot;

/// Visual theme of a city card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Clear,
    Rain,
    Snow,
    Thunder,
    Fog,
    Cloud,
    Hot,
    Warm,
    Cold,
}

impl Theme {
    pub fn class_name(self) -> &'static str {
        match self {
            Theme::Clear => "theme-clear",
            Theme::Rain => "theme-rain",
            Theme::Snow => "theme-snow",
            Theme::Thunder => "theme-thunder",
            Theme::Fog => "theme-fog",
            Theme::Cloud => "theme-cloud",
            Theme::Hot => "theme-hot",
            Theme::Warm => "theme-warm",
            Theme::Cold => "theme-cold",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Theme::Clear | Theme::Warm => "🌤️",
            Theme::Rain => "🌧️",
            Theme::Snow => "🌨️",
            Theme::Thunder => "⛈️",
            Theme::Fog => "🌫️",
            Theme::Cloud => "☁️",
            Theme::Hot => "☀️",
            Theme::Cold => "❄️",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Pick a theme from the description keywords, falling back to temperature bands.
///
/// The 10..20 band maps to [`Theme::Cloud`] and anything below zero to
/// [`Theme::Rain`]; existing cards rely on that mapping.
pub fn weather_theme(weather: Option<&WeatherSnapshot>) -> Theme {
    let Some(weather) = weather else {
        return Theme::Clear;
    };

    let desc = weather.description.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| desc.contains(w));

    if has(&["rain", "drizzle"]) {
        Theme::Rain
    } else if has(&["snow"]) {
        Theme::Snow
    } else if has(&["storm", "thunder"]) {
        Theme::Thunder
    } else if has(&["fog", "mist"]) {
        Theme::Fog
    } else if has(&["cloud"]) {
        Theme::Cloud
    } else if weather.temp >= 30.0 {
        Theme::Hot
    } else if weather.temp >= 20.0 {
        Theme::Warm
    } else if weather.temp >= 10.0 {
        Theme::Cloud
    } else if weather.temp >= 0.0 {
        Theme::Cold
    } else {
        Theme::Rain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    #[test]
    fn missing_weather_is_clear() {
        assert_eq!(weather_theme(None), Theme::Clear);
        assert_eq!(weather_theme(None).class_name(), "theme-clear");
    }

    #[test]
    fn description_wins_over_temperature() {
        assert_eq!(weather_theme(Some(&snapshot(35.0, "Light Rain"))), Theme::Rain);
        assert_eq!(weather_theme(Some(&snapshot(35.0, "drizzle"))), Theme::Rain);
        assert_eq!(weather_theme(Some(&snapshot(-5.0, "heavy snow"))), Theme::Snow);
        assert_eq!(weather_theme(Some(&snapshot(25.0, "thunderstorm"))), Theme::Thunder);
        assert_eq!(weather_theme(Some(&snapshot(5.0, "mist"))), Theme::Fog);
        assert_eq!(weather_theme(Some(&snapshot(31.0, "broken clouds"))), Theme::Cloud);
    }

    #[test]
    fn rain_is_checked_before_thunder() {
        assert_eq!(weather_theme(Some(&snapshot(20.0, "thunderstorm with rain"))), Theme::Rain);
    }

    #[test]
    fn temperature_bands() {
        let at = |t| weather_theme(Some(&snapshot(t, "clear sky")));
        assert_eq!(at(30.0), Theme::Hot);
        assert_eq!(at(29.9), Theme::Warm);
        assert_eq!(at(20.0), Theme::Warm);
        assert_eq!(at(15.0), Theme::Cloud);
        assert_eq!(at(0.0), Theme::Cold);
        assert_eq!(at(-0.5), Theme::Rain);
    }

    #[test]
    fn icons_follow_theme() {
        assert_eq!(Theme::Hot.icon(), "☀️");
        assert_eq!(Theme::Cold.icon(), "❄️");
        assert_eq!(Theme::Warm.icon(), Theme::Clear.icon());
        assert_eq!(Theme::Thunder.to_string(), "theme-thunder");
    }
}
