//! Lenient date, time and number scanning with MySQL's literal rules
//!
//! Parsing here only splits text into fields. Range and zero-date policy
//! depend on `sql_mode` and live in the caster.

use std::time::{SystemTime, UNIX_EPOCH};

/// Calendar date plus time of day, all fields as written (zero parts allowed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DateTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub micros: u32,
}

/// Signed duration as stored in TIME columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub negative: bool,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub micros: u32,
}

impl DateTime {
    pub fn date(year: u32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == DateTime::default()
    }

    pub fn has_zero_part(&self) -> bool {
        self.month == 0 || self.day == 0
    }

    /// True when month and day form a real calendar date.
    pub fn is_calendar_valid(&self) -> bool {
        self.month >= 1
            && self.month <= 12
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// Seconds since the Unix epoch (UTC), ignoring microseconds.
    pub fn unix_seconds(&self) -> i64 {
        days_from_civil(self.year as i64, self.month, self.day) * 86_400
            + (self.hour * 3600 + self.minute * 60 + self.second) as i64
    }

    pub fn from_unix_seconds(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400) as u32;
        let (year, month, day) = civil_from_days(days);
        Self {
            year: year as u32,
            month,
            day,
            hour: rem / 3600,
            minute: rem % 3600 / 60,
            second: rem % 60,
            micros: 0,
        }
    }

    /// Round the fraction to `fsp` digits, carrying into the seconds.
    pub fn round_to(mut self, fsp: u32) -> Self {
        let unit = 10u32.pow(6 - fsp.min(6));
        let rounded = (self.micros + unit / 2) / unit * unit;
        if rounded < 1_000_000 {
            self.micros = rounded;
            return self;
        }
        if !self.is_calendar_valid() {
            self.micros = 0;
            return self;
        }
        let mut next = DateTime::from_unix_seconds(self.unix_seconds() + 1);
        next.micros = 0;
        next
    }

    pub fn format_date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn format_datetime(&self, fsp: u32) -> String {
        format!(
            "{} {:02}:{:02}:{:02}{}",
            self.format_date(),
            self.hour,
            self.minute,
            self.second,
            fraction(self.micros, fsp)
        )
    }
}

impl Time {
    pub fn total_seconds(&self) -> i64 {
        let s = (self.hours as i64) * 3600 + (self.minutes as i64) * 60 + self.seconds as i64;
        if self.negative {
            -s
        } else {
            s
        }
    }

    pub fn round_to(mut self, fsp: u32) -> Self {
        let unit = 10u32.pow(6 - fsp.min(6));
        let rounded = (self.micros + unit / 2) / unit * unit;
        if rounded < 1_000_000 {
            self.micros = rounded;
            return self;
        }
        self.micros = 0;
        self.seconds += 1;
        if self.seconds == 60 {
            self.seconds = 0;
            self.minutes += 1;
        }
        if self.minutes == 60 {
            self.minutes = 0;
            self.hours += 1;
        }
        self
    }

    pub fn format(&self, fsp: u32) -> String {
        format!(
            "{}{:02}:{:02}:{:02}{}",
            if self.negative { "-" } else { "" },
            self.hours,
            self.minutes,
            self.seconds,
            fraction(self.micros, fsp)
        )
    }
}

fn fraction(micros: u32, fsp: u32) -> String {
    if fsp == 0 {
        return String::new();
    }
    let digits = format!("{:06}", micros);
    format!(".{}", &digits[..fsp.min(6) as usize])
}

pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

// Howard Hinnant's days_from_civil / civil_from_days
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = m as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

/// Current UTC wall clock.
pub fn now_utc() -> DateTime {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    DateTime::from_unix_seconds(secs)
}

/// Two-digit years: 00-69 are 20xx, 70-99 are 19xx.
pub fn expand_two_digit_year(year: u32) -> u32 {
    if year < 70 {
        2000 + year
    } else if year < 100 {
        1900 + year
    } else {
        year
    }
}

fn micros_from_digits(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(6).collect();
    while padded.len() < 6 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

struct Groups<'a> {
    parts: Vec<&'a str>,
    seps: Vec<char>,
    trailing: bool,
}

/// Split text into digit runs, recording the single separator before each.
fn digit_groups(s: &str) -> Option<Groups<'_>> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut seps = Vec::new();
    let mut i = 0;
    let mut sep = '\0';
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            parts.push(&s[start..i]);
            seps.push(sep);
            sep = '\0';
        } else if bytes[i].is_ascii_punctuation() || bytes[i] == b' ' || bytes[i] == b'T' {
            if parts.is_empty() {
                return None;
            }
            // Runs of separators collapse, but a later '.' wins
            if sep == '\0' || bytes[i] == b'.' {
                sep = bytes[i] as char;
            }
            i += 1;
        } else {
            return Some(Groups {
                parts,
                seps,
                trailing: true,
            });
        }
    }
    Some(Groups {
        parts,
        seps,
        trailing: sep != '\0',
    })
}

/// Parse a DATE/DATETIME literal. The flag is `false` when trailing
/// characters were ignored (a truncation warning in MySQL).
pub fn parse_datetime(input: &str) -> Option<(DateTime, bool)> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let groups = digit_groups(s)?;
    let clean = !groups.trailing;
    if groups.parts.len() == 1 || (groups.parts.len() == 2 && groups.seps[1] == '.') {
        let mut dt = parse_datetime_digits(groups.parts[0])?;
        if let Some(frac) = groups.parts.get(1) {
            dt.micros = micros_from_digits(frac);
        }
        return Some((dt, clean));
    }
    let p = &groups.parts;
    if p.len() < 3 {
        return None;
    }
    let num = |i: usize| -> Option<u32> { p.get(i).map(|v| v.parse::<u32>().ok()).unwrap_or(Some(0)) };
    let mut year = num(0)?;
    if p[0].len() <= 2 {
        year = expand_two_digit_year(year);
    }
    let mut dt = DateTime::date(year, num(1)?, num(2)?);
    let mut idx = 3;
    let mut time_fields = 0;
    while idx < p.len() && time_fields < 3 && groups.seps[idx] != '.' {
        let v = num(idx)?;
        match time_fields {
            0 => dt.hour = v,
            1 => dt.minute = v,
            _ => dt.second = v,
        }
        time_fields += 1;
        idx += 1;
    }
    if idx < p.len() && groups.seps[idx] == '.' {
        dt.micros = micros_from_digits(p[idx]);
        idx += 1;
    }
    if p[0].len() > 4 || p[1].len() > 2 || p[2].len() > 2 {
        return None;
    }
    Some((dt, clean && idx == p.len()))
}

fn parse_datetime_digits(d: &str) -> Option<DateTime> {
    let n = |a: usize, b: usize| -> u32 { d[a..b].parse().unwrap_or(0) };
    let (mut dt, rest) = match d.len() {
        14 | 8 => (DateTime::date(n(0, 4), n(4, 6), n(6, 8)), 8),
        12 | 6 => (
            DateTime::date(expand_two_digit_year(n(0, 2)), n(2, 4), n(4, 6)),
            6,
        ),
        _ => return None,
    };
    if d.len() > rest {
        dt.hour = n(rest, rest + 2);
        dt.minute = n(rest + 2, rest + 4);
        dt.second = n(rest + 4, rest + 6);
    }
    Some(dt)
}

/// Numbers used as dates: `20240102`, `240102`, `20240102103000`.
pub fn datetime_from_number(n: u64) -> Option<DateTime> {
    if n == 0 {
        return Some(DateTime::default());
    }
    let digits = n.to_string();
    let padded = match digits.len() {
        1..=6 => format!("{:06}", n),
        7 | 8 => format!("{:08}", n),
        9..=12 => format!("{:012}", n),
        13 | 14 => format!("{:014}", n),
        _ => return None,
    };
    parse_datetime_digits(&padded)
}

/// Parse a TIME literal: `[-][D ]hh:mm[:ss][.frac]` or `[-]hhmmss[.frac]`.
pub fn parse_time(input: &str) -> Option<(Time, bool)> {
    let mut s = input.trim();
    if s.is_empty() {
        return None;
    }
    let mut t = Time::default();
    if let Some(rest) = s.strip_prefix('-') {
        t.negative = true;
        s = rest;
    }
    // A full datetime literal keeps only its time part
    if s.len() >= 10 && s.as_bytes().get(4) == Some(&b'-') {
        let (dt, clean) = parse_datetime(s)?;
        return Some((
            Time {
                negative: t.negative,
                hours: dt.hour,
                minutes: dt.minute,
                seconds: dt.second,
                micros: dt.micros,
            },
            clean,
        ));
    }
    let mut days = 0;
    if let Some((d, rest)) = s.split_once(' ') {
        if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()) && rest.contains(':') {
            days = d.parse::<u32>().ok()?;
            s = rest.trim_start();
        }
    }
    let (body, frac, clean) = match s.find(|c: char| !(c.is_ascii_digit() || c == ':')) {
        Some(pos) if s.as_bytes()[pos] == b'.' => {
            let rest = &s[pos + 1..];
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            (&s[..pos], &rest[..end], end == rest.len())
        }
        Some(pos) => (&s[..pos], "", false),
        None => (s, "", true),
    };
    if body.is_empty() {
        return None;
    }
    if body.contains(':') {
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() > 3 || fields.iter().any(|f| f.is_empty()) {
            return None;
        }
        t.hours = fields[0].parse().ok()?;
        t.minutes = fields[1].parse().ok()?;
        t.seconds = fields.get(2).map(|v| v.parse().ok()).unwrap_or(Some(0))?;
    } else {
        let v: u64 = body.parse().ok()?;
        t.seconds = (v % 100) as u32;
        t.minutes = (v / 100 % 100) as u32;
        t.hours = u32::try_from(v / 10_000).ok()?;
    }
    if t.minutes > 59 || t.seconds > 59 {
        return None;
    }
    t.hours += days * 24;
    t.micros = micros_from_digits(frac);
    Some((t, clean))
}

/// Longest numeric prefix the way MySQL reads strings in numeric context.
/// Returns the prefix and whether it covered the whole (trimmed) input.
pub fn numeric_prefix(s: &str) -> (&str, bool) {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut has_digits = i > digits_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if has_digits || j > frac_start {
            has_digits = true;
            i = j;
        }
    }
    if has_digits && i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    if !has_digits {
        return ("", false);
    }
    let complete = trimmed[i..].trim_end().is_empty();
    (&trimmed[..i], complete)
}

/// Numeric value of a string (0 when nothing numeric leads it).
pub fn leading_number(s: &str) -> (f64, bool) {
    let (prefix, complete) = numeric_prefix(s);
    match prefix.parse::<f64>() {
        Ok(v) => (v, complete),
        Err(_) => (0.0, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimited_datetime() {
        let (dt, clean) = parse_datetime("2024-03-05 07:08:09.5").unwrap();
        assert!(clean);
        assert_eq!(dt.format_datetime(1), "2024-03-05 07:08:09.5");
        assert_eq!(dt.micros, 500_000);

        let (dt, _) = parse_datetime("24/3/5").unwrap();
        assert_eq!(dt.format_date(), "2024-03-05");

        let (dt, _) = parse_datetime("2024-01-02T10:11").unwrap();
        assert_eq!(dt.format_datetime(0), "2024-01-02 10:11:00");
    }

    #[test]
    fn test_parse_compact_datetime() {
        let (dt, _) = parse_datetime("20240102103000").unwrap();
        assert_eq!(dt.format_datetime(0), "2024-01-02 10:30:00");
        assert_eq!(datetime_from_number(991231).unwrap().format_date(), "1999-12-31");
        assert!(parse_datetime("abc").is_none());
        assert!(parse_datetime("2024-01").is_none());
    }

    #[test]
    fn test_trailing_garbage() {
        let (dt, clean) = parse_datetime("2024-01-02 junk").unwrap();
        assert!(!clean);
        assert_eq!(dt.format_date(), "2024-01-02");
    }

    #[test]
    fn test_calendar_validity() {
        assert!(DateTime::date(2024, 2, 29).is_calendar_valid());
        assert!(!DateTime::date(2023, 2, 29).is_calendar_valid());
        assert!(DateTime::default().is_zero());
    }

    #[test]
    fn test_rounding_carries() {
        let (dt, _) = parse_datetime("1999-12-31 23:59:59.9").unwrap();
        assert_eq!(dt.round_to(0).format_datetime(0), "2000-01-01 00:00:00");
        let (t, _) = parse_time("10:59:59.6").unwrap();
        assert_eq!(t.round_to(0).format(0), "11:00:00");
    }

    #[test]
    fn test_parse_time() {
        let (t, _) = parse_time("-1 02:03:04").unwrap();
        assert_eq!(t.format(0), "-26:03:04");
        let (t, _) = parse_time("123456").unwrap();
        assert_eq!(t.format(0), "12:34:56");
        assert!(parse_time("10:61:00").is_none());
    }

    #[test]
    fn test_unix_round_trip() {
        let dt = DateTime::from_unix_seconds(0);
        assert_eq!(dt.format_datetime(0), "1970-01-01 00:00:00");
        let (dt, _) = parse_datetime("2038-01-19 03:14:07").unwrap();
        assert_eq!(dt.unix_seconds(), i32::MAX as i64);
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("12abc"), ("12", false));
        assert_eq!(numeric_prefix(" -3.5e2 "), ("-3.5e2", true));
        assert_eq!(numeric_prefix("abc"), ("", false));
        assert_eq!(leading_number(".5").0, 0.5);
    }
}
