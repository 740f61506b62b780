//! Number formats of the route languages.
//!
//! Track positions are strict: the whole text must be a number, optionally
//! split into `a:b:c` parts weighted by the unit-of-length factors. Command
//! arguments are lenient and take the longest numeric prefix.

/// Length of the longest prefix of `s` that is a valid decimal number.
fn numeric_prefix_len(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Parses a complete decimal number. Surrounding whitespace is allowed.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || numeric_prefix_len(s) != s.len() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Parses the longest numeric prefix, e.g. `"25m"` gives 25.
pub fn parse_lenient(s: &str) -> Option<f64> {
    let s = s.trim();
    let n = numeric_prefix_len(s);
    if n == 0 {
        return None;
    }
    s[..n].parse::<f64>().ok()
}

/// Lenient integer; fractional values are truncated.
pub fn parse_int(s: &str) -> Option<i64> {
    parse_lenient(s).filter(|x| x.abs() < 9.0e18).map(|x| x.trunc() as i64)
}

/// Parses a length under the unit-of-length factors. The last part of
/// `a:b:c` is weighted by the last factor, the one before by the second to
/// last factor, and so on.
pub fn parse_length(s: &str, unit_factors: &[f64]) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > unit_factors.len() {
        return None;
    }
    let offset = unit_factors.len() - parts.len();
    let mut value = 0.0;
    for (i, part) in parts.iter().enumerate() {
        value += parse_number(part)? * unit_factors[offset + i];
    }
    Some(value)
}

pub fn is_valid_length(s: &str, unit_factors: &[f64]) -> bool {
    parse_length(s, unit_factors).is_some()
}

/// Parses a time of day written as `hh.mmss` (or `hh:mm:ss`) into seconds.
pub fn parse_time(s: &str) -> Option<f64> {
    use regex::Regex;
    let s = s.trim();
    let re = Regex::new(r"^(\d{1,2})(?:[.:](\d{1,2}):?(\d{1,2})?)?$").ok()?;
    let caps = re.captures(s)?;
    let hours = caps[1].parse::<f64>().ok()?;
    let minutes = match caps.get(2) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<f64>().ok()? * 10.0,
        Some(m) => m.as_str().parse::<f64>().ok()?,
        None => 0.0,
    };
    let seconds = match caps.get(3) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<f64>().ok()? * 10.0,
        Some(m) => m.as_str().parse::<f64>().ok()?,
        None => 0.0,
    };
    Some(3600.0 * hours + 60.0 * minutes + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn strict_numbers() {
        assert_eq!(parse_number("25"), Some(25.0));
        assert_eq!(parse_number(" -1.5e2 "), Some(-150.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("5."), Some(5.0));
        assert_eq!(parse_number("25m"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_lenient("25m"), Some(25.0));
        assert_eq!(parse_lenient("1e"), Some(1.0));
        assert_eq!(parse_lenient("x1"), None);
        assert_eq!(parse_int("3.9"), Some(3));
    }

    #[test]
    fn unit_factors() {
        let factors = [1000.0, 1.0];
        assert_eq!(parse_length("12", &factors), Some(12.0));
        assert_eq!(parse_length("1:250", &factors), Some(1250.0));
        assert_eq!(parse_length("1:2:3", &factors), None);
        assert_eq!(parse_length("1:x", &factors), None);
    }

    #[test]
    fn times() {
        assert_approx_eq!(parse_time("10.3015").unwrap(), 10.0 * 3600.0 + 30.0 * 60.0 + 15.0);
        assert_approx_eq!(parse_time("7.05").unwrap(), 7.0 * 3600.0 + 5.0 * 60.0);
        assert_approx_eq!(parse_time("8").unwrap(), 8.0 * 3600.0);
        assert_eq!(parse_time("P"), None);
    }
}
