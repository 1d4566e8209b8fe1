use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

/// Country lookup for shipped entries, usually backed by a geolocation service.
pub trait GeoLookup: Send + Sync {
    fn country(&self) -> String;
}

impl<F> GeoLookup for F
where
    F: Fn() -> String + Send + Sync,
{
    fn country(&self) -> String {
        self()
    }
}

const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

/// Language part of the user's locale, e.g. `en` for `en_US.UTF-8`.
///
/// Empty when no locale is configured.
pub fn detect_language() -> String {
    LOCALE_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|value| language_from_locale(&value))
        .unwrap_or_default()
}

fn language_from_locale(locale: &str) -> Option<String> {
    let language = locale
        .split(['.', '@'])
        .next()?
        .split(['_', '-'])
        .next()?
        .trim();

    if language.is_empty() || language == "C" || language == "POSIX" {
        return None;
    }
    Some(language.to_lowercase())
}

/// Abbreviation of the local time zone right now, e.g. `EDT`.
///
/// The zone comes from `TZ` or, failing that, the system setting. When neither
/// names a known IANA zone the numeric offset (`+09:00`) is reported instead.
pub fn time_zone() -> String {
    let now = Utc::now();
    local_zone_names()
        .iter()
        .find_map(|zone| zone_abbreviation(zone, now))
        .unwrap_or_else(|| Local::now().format("%:z").to_string())
}

fn local_zone_names() -> Vec<String> {
    let from_env = std::env::var("TZ")
        .ok()
        .map(|tz| tz.trim_start_matches(':').trim().to_string())
        .filter(|tz| !tz.is_empty());

    from_env
        .into_iter()
        .chain(iana_time_zone::get_timezone().ok())
        .collect()
}

fn zone_abbreviation(zone: &str, at: DateTime<Utc>) -> Option<String> {
    let tz: Tz = zone.parse().ok()?;
    Some(at.with_timezone(&tz).format("%Z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_locale_vars() {
        unsafe {
            for name in LOCALE_VARS {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_language_from_locale_forms() {
        assert_eq!(language_from_locale("en_US.UTF-8").as_deref(), Some("en"));
        assert_eq!(language_from_locale("zh-CN").as_deref(), Some("zh"));
        assert_eq!(language_from_locale("de_DE@euro").as_deref(), Some("de"));
        assert_eq!(language_from_locale("FR").as_deref(), Some("fr"));
        assert_eq!(language_from_locale("C.UTF-8"), None);
        assert_eq!(language_from_locale("POSIX"), None);
        assert_eq!(language_from_locale(""), None);
    }

    #[test]
    #[serial]
    fn test_detect_language_prefers_lc_all() {
        clear_locale_vars();
        unsafe {
            std::env::set_var("LANG", "en_US.UTF-8");
            std::env::set_var("LC_ALL", "ja_JP.UTF-8");
        }

        assert_eq!(detect_language(), "ja");
        clear_locale_vars();
    }

    #[test]
    #[serial]
    fn test_detect_language_skips_c_locale() {
        clear_locale_vars();
        unsafe {
            std::env::set_var("LC_ALL", "C");
            std::env::set_var("LANG", "pt_BR.UTF-8");
        }

        assert_eq!(detect_language(), "pt");
        clear_locale_vars();
    }

    #[test]
    #[serial]
    fn test_detect_language_empty_without_locale() {
        clear_locale_vars();
        assert_eq!(detect_language(), "");
    }

    #[test]
    fn test_closure_geo_lookup() {
        let geo = || "IR".to_string();
        assert_eq!(geo.country(), "IR");
        let unknown = String::new;
        assert_eq!(unknown.country(), "");
    }

    #[test]
    fn test_zone_abbreviation_follows_daylight_saving() {
        use chrono::TimeZone;

        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        assert_eq!(zone_abbreviation("America/New_York", summer).as_deref(), Some("EDT"));
        assert_eq!(zone_abbreviation("America/New_York", winter).as_deref(), Some("EST"));
        assert_eq!(zone_abbreviation("Asia/Tokyo", winter).as_deref(), Some("JST"));
        assert_eq!(zone_abbreviation("Not/AZone", winter), None);
    }

    #[test]
    #[serial]
    fn test_time_zone_uses_tz_variable() {
        let previous = std::env::var("TZ").ok();
        unsafe {
            std::env::set_var("TZ", "America/New_York");
        }

        let zone = time_zone();

        unsafe {
            match previous {
                Some(tz) => std::env::set_var("TZ", tz),
                None => std::env::remove_var("TZ"),
            }
        }
        assert!(zone == "EDT" || zone == "EST", "unexpected zone {zone:?}");
    }

    #[test]
    #[serial]
    fn test_time_zone_accepts_colon_prefixed_tz() {
        let previous = std::env::var("TZ").ok();
        unsafe {
            std::env::set_var("TZ", ":UTC");
        }

        let zone = time_zone();

        unsafe {
            match previous {
                Some(tz) => std::env::set_var("TZ", tz),
                None => std::env::remove_var("TZ"),
            }
        }
        assert_eq!(zone, "UTC");
    }
}
