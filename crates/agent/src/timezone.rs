//! Timezone conversion tool
//!
//! Converts a wall-clock or ISO timestamp between two zones. Zones may be
//! given as a common alias (`eastern`, `pst`, `utc`, ...) or an IANA name.
//! Failures are returned to the model as `{"error": ...}` values.

use async_trait::async_trait;
use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use huddle_core::{Tool, ToolOutput, ToolProvenance};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const TOOL_NAME: &str = "convert_timezone";

const ALIASES: &[(&str, &str)] = &[
    ("eastern", "America/New_York"),
    ("est", "America/New_York"),
    ("edt", "America/New_York"),
    ("central", "America/Chicago"),
    ("cst", "America/Chicago"),
    ("cdt", "America/Chicago"),
    ("mountain", "America/Denver"),
    ("mst", "America/Denver"),
    ("mdt", "America/Denver"),
    ("pacific", "America/Los_Angeles"),
    ("pst", "America/Los_Angeles"),
    ("pdt", "America/Los_Angeles"),
    ("utc", "UTC"),
    ("gmt", "UTC"),
    ("z", "UTC"),
];

const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Invalid date: `{0}` (expected YYYY-MM-DD HH:MM[:SS] or an ISO-8601 timestamp)")]
    InvalidDate(String),
    #[error("Unknown timezone: `{0}`")]
    UnknownTimezone(String),
    #[error("{time} does not exist in {zone} (skipped by a daylight-saving transition)")]
    NonexistentLocalTime { time: String, zone: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub original: String,
    pub from_timezone: String,
    pub to_timezone: String,
    pub converted: String,
    pub iso_format: String,
}

/// Maps a known alias to its IANA name; anything else is returned trimmed
/// but otherwise unchanged.
pub fn normalize_timezone(name: &str) -> String {
    let trimmed = name.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map(|(_, zone)| (*zone).to_owned())
        .unwrap_or_else(|| trimmed.to_owned())
}

fn resolve_zone(name: &str) -> Result<(String, Tz), ConversionError> {
    let normalized = normalize_timezone(name);
    let zone = normalized
        .parse::<Tz>()
        .map_err(|_| ConversionError::UnknownTimezone(name.trim().to_owned()))?;
    Ok((normalized, zone))
}

fn looks_like_iso(input: &str) -> bool {
    input.contains('T') || input.contains('Z')
}

fn parse_instant(input: &str, zone: Tz) -> Result<DateTime<Utc>, ConversionError> {
    if looks_like_iso(input) {
        if let Ok(absolute) = DateTime::parse_from_rfc3339(input) {
            return Ok(absolute.with_timezone(&Utc));
        }
        if let Ok(absolute) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M%:z") {
            return Ok(absolute.with_timezone(&Utc));
        }
        if let Some(stripped) = input.strip_suffix('Z') {
            if let Some(naive) = parse_naive(stripped) {
                return Ok(naive.and_utc());
            }
        }
    }

    let naive = parse_naive(input).ok_or_else(|| ConversionError::InvalidDate(input.to_owned()))?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(ConversionError::NonexistentLocalTime {
            time: naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            zone: zone.name().to_owned(),
        }),
    }
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn convert(datetime_str: &str, from: &str, to: &str) -> Result<Conversion, ConversionError> {
    let input = datetime_str.trim();
    let (from_timezone, from_zone) = resolve_zone(from)?;
    let (to_timezone, to_zone) = resolve_zone(to)?;

    let instant = parse_instant(input, from_zone)?;
    let target = instant.with_timezone(&to_zone);

    Ok(Conversion {
        original: datetime_str.to_owned(),
        from_timezone,
        to_timezone,
        converted: target.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        iso_format: target.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    datetime_str: String,
    from_timezone: String,
    to_timezone: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertTimezoneTool;

#[async_trait]
impl Tool for ConvertTimezoneTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Convert a date and time from one timezone to another. Accepts aliases such as \
         eastern, central, mountain, pacific, est, pst and utc, or IANA names like \
         America/Chicago."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datetime_str": {
                    "type": "string",
                    "description": "Date and time, e.g. 2026-10-16 10:30:00 or an ISO-8601 timestamp"
                },
                "from_timezone": {
                    "type": "string",
                    "description": "Source timezone alias or IANA name"
                },
                "to_timezone": {
                    "type": "string",
                    "description": "Target timezone alias or IANA name"
                }
            },
            "required": ["datetime_str", "from_timezone", "to_timezone"]
        })
    }

    fn provenance(&self) -> ToolProvenance {
        ToolProvenance::Local
    }

    async fn invoke(&self, params: Value) -> ToolOutput {
        let request: ConvertRequest = match serde_json::from_value(params) {
            Ok(request) => request,
            Err(error) => return ToolOutput::failure(format!("Invalid parameters: {error}")),
        };

        match convert(&request.datetime_str, &request.from_timezone, &request.to_timezone) {
            Ok(conversion) => match serde_json::to_value(conversion) {
                Ok(value) => ToolOutput::Success(value),
                Err(error) => ToolOutput::failure(error.to_string()),
            },
            Err(error) => ToolOutput::failure(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use huddle_core::{Tool, ToolOutput};
    use serde_json::json;

    use super::{convert, normalize_timezone, ConversionError, ConvertTimezoneTool};

    #[test]
    fn aliases_are_case_insensitive_and_idempotent() {
        assert_eq!(normalize_timezone("UTC"), normalize_timezone("utc"));
        assert_eq!(normalize_timezone(" Eastern "), "America/New_York");
        assert_eq!(normalize_timezone("PST"), "America/Los_Angeles");
        assert_eq!(normalize_timezone(&normalize_timezone("cst")), "America/Chicago");
    }

    #[test]
    fn unknown_alias_passes_through() {
        assert_eq!(normalize_timezone("Europe/Berlin"), "Europe/Berlin");
        assert_eq!(normalize_timezone("Mars/Olympus"), "Mars/Olympus");
    }

    #[test]
    fn eastern_morning_to_utc_in_daylight_time() {
        let conversion = convert("2026-10-16 10:30:00", "eastern", "utc").expect("converts");
        assert_eq!(conversion.from_timezone, "America/New_York");
        assert_eq!(conversion.to_timezone, "UTC");
        assert_eq!(conversion.converted, "2026-10-16 14:30:00 UTC");
        assert_eq!(conversion.iso_format, "2026-10-16T14:30:00Z");
    }

    #[test]
    fn eastern_morning_to_utc_in_standard_time() {
        let conversion = convert("2026-12-01 10:30", "est", "utc").expect("converts");
        assert_eq!(conversion.iso_format, "2026-12-01T15:30:00Z");
    }

    #[test]
    fn target_abbreviation_and_offset_are_rendered() {
        let conversion =
            convert("2026-10-16T14:30:00Z", "utc", "central").expect("converts");
        assert_eq!(conversion.converted, "2026-10-16 09:30:00 CDT");
        assert_eq!(conversion.iso_format, "2026-10-16T09:30:00-05:00");
    }

    #[test]
    fn iso_input_with_offset_ignores_source_zone() {
        let conversion =
            convert("2026-10-16T10:30:00-04:00", "pacific", "utc").expect("converts");
        assert_eq!(conversion.iso_format, "2026-10-16T14:30:00Z");
    }

    #[test]
    fn t_form_without_offset_is_local_to_source_zone() {
        let conversion = convert("2026-10-16T10:30", "pacific", "utc").expect("converts");
        assert_eq!(conversion.iso_format, "2026-10-16T17:30:00Z");
    }

    #[test]
    fn round_trip_restores_wall_clock() {
        for (input, zone_a, zone_b) in [
            ("2026-03-02 08:15:00", "central", "Asia/Tokyo"),
            ("2026-07-04 23:45:00", "pacific", "eastern"),
            ("2026-11-20 12:00:00", "Europe/London", "mountain"),
        ] {
            let forward = convert(input, zone_a, zone_b).expect("forward");
            let wall_clock = &forward.converted[..19];
            let back = convert(wall_clock, zone_b, zone_a).expect("back");
            assert_eq!(&back.converted[..19], input, "{zone_a} -> {zone_b}");
        }
    }

    #[test]
    fn spring_forward_gap_is_an_error() {
        let error = convert("2026-03-08 02:30:00", "eastern", "utc").expect_err("gap");
        assert!(matches!(error, ConversionError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn fall_back_fold_takes_earlier_instant() {
        let conversion = convert("2026-11-01 01:30:00", "eastern", "utc").expect("converts");
        assert_eq!(conversion.iso_format, "2026-11-01T05:30:00Z");
    }

    #[test]
    fn invalid_inputs_are_structured_errors() {
        assert!(matches!(
            convert("next tuesday-ish", "eastern", "utc"),
            Err(ConversionError::InvalidDate(_))
        ));
        assert!(matches!(
            convert("2026-02-30 10:00", "eastern", "utc"),
            Err(ConversionError::InvalidDate(_))
        ));
        assert_eq!(
            convert("2026-10-16 10:00", "Mars/Olympus", "utc"),
            Err(ConversionError::UnknownTimezone("Mars/Olympus".to_owned()))
        );
    }

    #[tokio::test]
    async fn tool_returns_errors_as_data() {
        let tool = ConvertTimezoneTool;

        let output = tool
            .invoke(json!({
                "datetime_str": "not a date",
                "from_timezone": "eastern",
                "to_timezone": "utc"
            }))
            .await;
        let ToolOutput::Failure { message } = output else {
            panic!("expected failure");
        };
        assert!(message.starts_with("Invalid date"));

        let output = tool.invoke(json!({ "datetime_str": "2026-10-16 10:00" })).await;
        assert!(output.is_failure());
    }

    #[tokio::test]
    async fn tool_success_carries_all_fields() {
        let output = ConvertTimezoneTool
            .invoke(json!({
                "datetime_str": "2026-10-16 10:30:00",
                "from_timezone": "eastern",
                "to_timezone": "utc"
            }))
            .await;

        assert_eq!(
            output,
            ToolOutput::Success(json!({
                "original": "2026-10-16 10:30:00",
                "from_timezone": "America/New_York",
                "to_timezone": "UTC",
                "converted": "2026-10-16 14:30:00 UTC",
                "iso_format": "2026-10-16T14:30:00Z"
            }))
        );
    }
}
