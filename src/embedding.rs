//! Embedding store: an LRU cache of bounded-width `f32` vectors, plus the
//! line protocol that drives it.
//!
//! Protocol
//! - First line: `<capacity> <width>`.
//! - `key` alone looks the key up; the reply is the values in `%g` style
//!   (six significant digits) separated by single spaces, or `!NOEMBED!` on a
//!   miss.
//! - `key\tv1 v2 ...` stores values; the reply is `!STORED!`, or `!STORERR!`
//!   when the value list is missing or empty, or a token has no float prefix.
//!   Each token is read up to its longest float prefix.
//! - Blank lines are ignored.

use crate::error::{CacheError, SessionError};
use crate::lru::RecencyCache;
use std::io::{BufRead, Write};
use tracing::{debug, trace};

pub const REPLY_STORED: &str = "!STORED!";
pub const REPLY_STORE_ERROR: &str = "!STORERR!";
pub const REPLY_MISS: &str = "!NOEMBED!";

/// Cache of `String -> Vec<f32>` where no vector grows past `width` values.
#[derive(Debug)]
pub struct EmbeddingStore {
    entries: RecencyCache<String, Vec<f32>>,
    width: usize,
}

impl EmbeddingStore {
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            entries: RecencyCache::new(capacity),
            width,
        }
    }

    /// Store `values` under `key`.
    ///
    /// A new key keeps the first `width` values. An existing key is extended
    /// with as many of `values` as still fit; a full vector is left as is.
    /// Either way the key becomes most recently used.
    pub fn store(&mut self, key: &str, values: &[f32]) -> Result<(), CacheError> {
        if self.entries.contains_key(key) {
            let existing = self.entries.get_mut(key)?;
            let room = self.width.saturating_sub(existing.len());
            existing.extend(values.iter().copied().take(room));
            return Ok(());
        }
        let kept: Vec<f32> = values.iter().copied().take(self.width).collect();
        if let Some((evicted, _)) = self.entries.put(key.to_owned(), kept)? {
            trace!(key = %evicted, "embedding evicted");
        }
        Ok(())
    }

    /// Fetch the vector for `key`, marking it most recently used.
    pub fn lookup(&mut self, key: &str) -> Option<&[f32]> {
        self.entries.get(key).ok().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn parse_header(line: &str) -> Result<(usize, usize), SessionError> {
    let mut it = line.split_whitespace().map(str::parse::<usize>);
    match (it.next(), it.next()) {
        (Some(Ok(capacity)), Some(Ok(width))) => Ok((capacity, width)),
        _ => Err(SessionError::Header(line.to_owned())),
    }
}

/// Values of a store command, or `None` if any token has no float prefix.
fn parse_values(s: &str) -> Option<Vec<f32>> {
    s.split(' ').map(parse_float_prefix).collect()
}

/// Length of the leading run of ASCII digits in `b`.
fn digits(b: &[u8]) -> usize {
    b.iter().take_while(|c| c.is_ascii_digit()).count()
}

/// Parse the longest prefix of `token` that reads as a float, after leading
/// whitespace. Trailing garbage is ignored (`1.5abc` is `1.5`). `None` when
/// there is no numeric prefix or the value is out of `f32` range.
fn parse_float_prefix(token: &str) -> Option<f32> {
    let t = token.trim_start();
    let b = t.as_bytes();
    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));

    let rest = t[end..].to_ascii_lowercase();
    for word in ["infinity", "inf", "nan"] {
        if rest.starts_with(word) {
            return t[..end + word.len()].parse().ok();
        }
    }

    let int = digits(&b[end..]);
    end += int;
    let mut frac = 0;
    if b.get(end) == Some(&b'.') {
        frac = digits(&b[end + 1..]);
        if int + frac > 0 {
            end += 1 + frac;
        }
    }
    if int + frac == 0 {
        return None;
    }
    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let n = digits(&b[exp..]);
        if n > 0 {
            end = exp + n;
        }
    }

    let mantissa = &t[..end];
    let value: f32 = mantissa.parse().ok()?;
    let nonzero_digits = mantissa
        .split(|c| c == 'e' || c == 'E')
        .next()
        .is_some_and(|m| m.bytes().any(|c| (b'1'..=b'9').contains(&c)));
    // Overflow to infinity or underflow to zero is a range error.
    if value.is_infinite() || (value == 0.0 && nonzero_digits) {
        return None;
    }
    Some(value)
}

/// Format like C's `%g` with 6 significant digits: fixed notation for
/// decimal exponents in `[-4, 6)`, otherwise `d.ddddde±XX`, with trailing
/// zeros removed.
fn format_float(v: f32) -> String {
    const PRECISION: i32 = 6;
    if v.is_nan() {
        return if v.is_sign_negative() { "-nan" } else { "nan" }.to_owned();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_owned();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    let v = f64::from(v);
    // Exponent after rounding to PRECISION significant digits.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if (-4..PRECISION).contains(&exp) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, v);
        trim_fraction(&fixed).to_owned()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn format_values(values: &[f32]) -> String {
    values
        .iter()
        .map(|&v| format_float(v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply one command line to the store and return the reply.
pub fn handle_line(store: &mut EmbeddingStore, line: &str) -> String {
    let Some((key, rest)) = line.split_once('\t') else {
        return match store.lookup(line) {
            Some(values) => format_values(values),
            None => REPLY_MISS.to_owned(),
        };
    };
    // Fields after a second tab are ignored.
    let raw = rest.split('\t').next().unwrap_or_default();
    let values = match parse_values(raw) {
        Some(v) if !v.is_empty() => v,
        _ => return REPLY_STORE_ERROR.to_owned(),
    };
    match store.store(key, &values) {
        Ok(()) => REPLY_STORED.to_owned(),
        Err(e) => {
            debug!(error = %e, key, "store rejected");
            REPLY_STORE_ERROR.to_owned()
        }
    }
}

/// Run a session: read the header, then answer each command line.
pub fn serve<R: BufRead, W: Write>(reader: R, mut writer: W) -> Result<(), SessionError> {
    let mut lines = reader.lines();
    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Err(SessionError::Header(String::new())),
        }
    };
    let (capacity, width) = parse_header(&header)?;
    debug!(capacity, width, "embedding session started");

    let mut store = EmbeddingStore::new(capacity, width);
    let mut handled = 0usize;
    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        writeln!(writer, "{}", handle_line(&mut store, &line))?;
        handled += 1;
    }
    writer.flush()?;
    debug!(handled, cached = store.len(), "embedding session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_key_is_truncated_to_width() {
        let mut s = EmbeddingStore::new(2, 2);
        s.store("v", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.lookup("v"), Some(&[1.0, 2.0][..]));
    }

    /// Invariant: an existing vector is extended only up to `width`, and a full
    /// vector is left unchanged.
    #[test]
    fn existing_key_is_extended_up_to_width() {
        let mut s = EmbeddingStore::new(2, 3);
        s.store("v", &[1.0]).unwrap();
        s.store("v", &[2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.lookup("v"), Some(&[1.0, 2.0, 3.0][..]));
        s.store("v", &[9.0]).unwrap();
        assert_eq!(s.lookup("v"), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(s.len(), 1);
    }

    /// Invariant: extending an entry counts as a use for eviction purposes.
    #[test]
    fn store_touches_recency() {
        let mut s = EmbeddingStore::new(2, 4);
        s.store("a", &[1.0]).unwrap();
        s.store("b", &[2.0]).unwrap();
        s.store("a", &[1.5]).unwrap();
        s.store("c", &[3.0]).unwrap();
        assert!(s.lookup("b").is_none());
        assert_eq!(s.lookup("a"), Some(&[1.0, 1.5][..]));
    }

    #[test]
    fn zero_capacity_store_fails() {
        let mut s = EmbeddingStore::new(0, 4);
        assert_eq!(s.store("a", &[1.0]), Err(CacheError::InvalidCapacity));
        assert!(s.lookup("a").is_none());
    }

    #[test]
    fn header_parsing() {
        assert_eq!(parse_header("2 4").unwrap(), (2, 4));
        assert_eq!(parse_header("  10\t3 ").unwrap(), (10, 3));
        assert!(matches!(parse_header("2"), Err(SessionError::Header(_))));
        assert!(matches!(parse_header("a b"), Err(SessionError::Header(_))));
    }

    /// Invariant: a token is read up to its longest float prefix; tokens with
    /// no numeric prefix or an out-of-range value reject the whole store.
    #[test]
    fn value_parsing_reads_float_prefixes() {
        assert_eq!(parse_values("1e-3 2"), Some(vec![0.001, 2.0]));
        assert_eq!(parse_values("1.5abc -2x"), Some(vec![1.5, -2.0]));
        assert_eq!(parse_values("3e 4e+ .5 7."), Some(vec![3.0, 4.0, 0.5, 7.0]));
        assert_eq!(parse_values("1 x"), None);
        assert_eq!(parse_values(""), None);
        assert_eq!(parse_values("1  2"), None);
        assert_eq!(parse_values("."), None);
        assert_eq!(parse_values("-"), None);
        assert_eq!(parse_values("1e39"), None);
        assert_eq!(parse_values("1e-50"), None);
        assert_eq!(parse_values("0.0e-50"), Some(vec![0.0]));
        assert_eq!(parse_values("-INFINITY"), Some(vec![f32::NEG_INFINITY]));
        assert!(parse_values("nanx").is_some_and(|v| v[0].is_nan()));
    }

    /// Invariant: replies use six significant digits, fixed notation for
    /// exponents in [-4, 6) and `e±XX` notation otherwise.
    #[test]
    fn float_formatting_uses_six_significant_digits() {
        let cases: &[(f32, &str)] = &[
            (0.001, "0.001"),
            (0.01, "0.01"),
            (0.1, "0.1"),
            (10.0, "10"),
            (1000.0, "1000"),
            (2.5, "2.5"),
            (-1.25, "-1.25"),
            (0.1234567, "0.123457"),
            (123456.0, "123456"),
            (999999.7, "1e+06"),
            (1_000_000.0, "1e+06"),
            (1234567.0, "1.23457e+06"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (1e-7, "1e-07"),
            (-3.5e20, "-3.5e+20"),
            (0.0, "0"),
            (f32::INFINITY, "inf"),
        ];
        for &(v, want) in cases {
            assert_eq!(format_float(v), want, "formatting {v:e}");
        }
    }

    #[test]
    fn handle_line_replies() {
        let mut s = EmbeddingStore::new(2, 2);
        assert_eq!(handle_line(&mut s, "k"), REPLY_MISS);
        assert_eq!(handle_line(&mut s, "k\t"), REPLY_STORE_ERROR);
        assert_eq!(handle_line(&mut s, "k\t0.5 0.25"), REPLY_STORED);
        assert_eq!(handle_line(&mut s, "k"), "0.5 0.25");
        assert_eq!(handle_line(&mut s, "j\t1\textra"), REPLY_STORED);
        assert_eq!(handle_line(&mut s, "j"), "1");
    }
}
