use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// Replacement used by [`escape`] for every `.` in a string.
pub const DEFAULT_ESCAPE_REPLACEMENT: &str = "_";

/// Values that can be made safe to embed as a single segment of a dotted metric name.
///
/// Strings have every `.` replaced. Everything else passes through untouched, so callers never
/// need to guard what they hand to [`escape`].
pub trait Escape {
    type Output;

    fn escape_with(self, replacement: &str) -> Self::Output;
}

impl Escape for &str {
    type Output = String;

    fn escape_with(self, replacement: &str) -> String {
        self.replace('.', replacement)
    }
}

impl Escape for String {
    type Output = String;

    fn escape_with(self, replacement: &str) -> String {
        self.as_str().escape_with(replacement)
    }
}

impl Escape for &String {
    type Output = String;

    fn escape_with(self, replacement: &str) -> String {
        self.as_str().escape_with(replacement)
    }
}

impl Escape for Cow<'_, str> {
    type Output = String;

    fn escape_with(self, replacement: &str) -> String {
        self.as_ref().escape_with(replacement)
    }
}

impl<T: Escape> Escape for Option<T> {
    type Output = Option<T::Output>;

    fn escape_with(self, replacement: &str) -> Self::Output {
        self.map(|value| value.escape_with(replacement))
    }
}

macro_rules! escape_as_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Escape for $ty {
                type Output = $ty;

                #[inline]
                fn escape_with(self, _replacement: &str) -> $ty {
                    self
                }
            }
        )*
    };
}

escape_as_identity!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
);

impl<T> Escape for Vec<T> {
    type Output = Vec<T>;

    fn escape_with(self, _replacement: &str) -> Vec<T> {
        self
    }
}

impl<K, V, S> Escape for HashMap<K, V, S> {
    type Output = HashMap<K, V, S>;

    fn escape_with(self, _replacement: &str) -> Self::Output {
        self
    }
}

impl<K, V> Escape for BTreeMap<K, V> {
    type Output = BTreeMap<K, V>;

    fn escape_with(self, _replacement: &str) -> Self::Output {
        self
    }
}

/// Replaces every `.` in a string value with `_`; any other value is returned unchanged.
pub fn escape<T: Escape>(value: T) -> T::Output {
    value.escape_with(DEFAULT_ESCAPE_REPLACEMENT)
}

/// Like [`escape`], with a caller-chosen replacement.
pub fn escape_with<T: Escape>(value: T, replacement: &str) -> T::Output {
    value.escape_with(replacement)
}

/// Makes a metric name safe for the statsd line format.
///
/// - `::` separators become `.`
/// - `:`, `|` and `@` delimit fields in a statsd line and are converted to underscores
pub fn sanitize_metric_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.push('.');
        } else if invalid_metric_name_character(c) {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

// <NAMESPACE>.<METRIC_NAME>:<VALUE>|<TYPE>|@<SAMPLE_RATE>
pub fn write_metric_line<T>(
    buffer: &mut String,
    prefix: Option<&str>,
    name: &str,
    mtype: &str,
    value: T,
    sample_rate: Option<f32>,
) where
    T: Display,
{
    if let Some(pref) = prefix {
        buffer.push_str(sanitize_metric_name(pref).as_str());
        buffer.push('.');
    }
    buffer.push_str(sanitize_metric_name(name).as_str());

    buffer.push(':');
    buffer.push_str(value.to_string().as_str());
    buffer.push('|');
    buffer.push_str(mtype);

    if let Some(rate) = sample_rate.filter(|rate| *rate < 1.0) {
        buffer.push_str("|@");
        buffer.push_str(rate.to_string().as_str());
    }
}

/// Renders milliseconds with exactly two decimals, rounding half away from zero.
///
/// Rounding works on the shortest decimal form of `value` (what `Display` prints), so `1.015`
/// becomes `1.02` even though the nearest `f64` sits just below it.
pub fn format_ms(value: f64) -> String {
    if !value.is_finite() {
        return format!("{:.2}", value);
    }

    let repr = value.abs().to_string();
    let (int, frac) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int
        .bytes()
        .chain(frac.bytes().chain(std::iter::repeat(b'0')).take(2))
        .map(|b| b - b'0')
        .collect();

    if frac.as_bytes().get(2).map_or(false, |d| *d >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let point = digits.len() - 2;
    let mut out = String::with_capacity(digits.len() + 2);
    if value.is_sign_negative() && digits.iter().any(|d| *d != 0) {
        out.push('-');
    }
    for (i, d) in digits.iter().enumerate() {
        if i == point {
            out.push('.');
        }
        out.push(char::from(b'0' + d));
    }
    out
}

#[inline]
fn invalid_metric_name_character(c: char) -> bool {
    matches!(c, ':' | '|' | '@')
}
