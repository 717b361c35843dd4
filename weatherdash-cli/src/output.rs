use chrono::{DateTime, Local};
use weatherdash_core::{
    CityCard, CityDetails, CitySuggestion, Notice, WatchedCity, theme::weather_theme,
};

pub fn notice(notice: &Notice) {
    if notice.is_error() {
        eprintln!("✗ {notice}");
    } else {
        println!("✓ {notice}");
    }
}

pub fn suggestions(items: &[CitySuggestion]) {
    for s in items {
        println!(
            "  {:<40} {:>8.3}, {:>8.3}   id: {}",
            s.display_name,
            s.lat,
            s.lon,
            s.city_id()
        );
    }
}

fn updated_at(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

fn weather_line(city: &WatchedCity) -> String {
    match &city.weather {
        Some(w) => format!(
            "{:>5.1}°C  {:<20} humidity {:>3}%  wind {:>4.1} m/s",
            w.temp, w.description, w.humidity, w.wind_speed
        ),
        None => "no data yet".to_string(),
    }
}

pub fn cards(cards: &[CityCard]) {
    if cards.is_empty() {
        println!("Your watchlist is empty. Add a city with `weatherdash add`.");
        return;
    }

    for card in cards {
        let status = if card.is_auto_refreshing {
            "refreshing…"
        } else if card.is_stale {
            "stale"
        } else {
            ""
        };
        println!(
            "{} {:<16} {:<3} {}  (updated {}) {}",
            card.theme.icon(),
            card.city.name,
            card.city.country,
            weather_line(&card.city),
            updated_at(card.city.last_updated),
            status
        );
        println!("   id: {}", card.city.id);
    }
}

pub fn city(city: &WatchedCity) {
    let theme = weather_theme(city.weather.as_ref());
    println!("{} {}, {}", theme.icon(), city.name, city.country);
    println!("   {}", weather_line(city));
    println!("   updated {}", updated_at(city.last_updated));
}

pub fn details(details: &CityDetails) {
    city(&details.city);

    if details.trend.is_empty() {
        println!("\nNo forecast available for the next 24 hours.");
        return;
    }

    println!("\nTemperature trend (next 24 hours):");
    let min = details
        .trend
        .iter()
        .map(|p| p.temperature)
        .min()
        .unwrap_or(0);
    for point in &details.trend {
        let bar = "▇".repeat((point.temperature - min + 1).clamp(1, 40) as usize);
        println!("  {}  {:>4}°C  {}", point.time, point.temperature, bar);
    }
}
