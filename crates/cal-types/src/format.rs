//! C-style numeric format strings.
//!
//! Variable values are rendered into input templates with the format string
//! declared in the configuration (default `"%le"`). Only the floating-point
//! subset of the `printf` grammar is supported: optional literal text around
//! exactly one `%[flags][width][.precision][l]{e,E,f,F,g,G}` conversion.

use serde::{Deserialize, Serialize};

/// A parsed format string, validated once at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CFormat {
    raw: String,
    prefix: String,
    suffix: String,
    spec: Spec,
}

#[derive(Debug, Clone, PartialEq)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    LowerExp,
    UpperExp,
    Fixed,
    LowerGeneral,
    UpperGeneral,
}

impl CFormat {
    /// The format applied when the configuration declares none.
    pub const DEFAULT: &'static str = "%le";

    /// Parse a format string, rejecting anything outside the supported subset.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut prefix = String::new();
        let mut spec: Option<Spec> = None;
        let mut suffix = String::new();

        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            let literal = if spec.is_none() {
                &mut prefix
            } else {
                &mut suffix
            };
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }
            if spec.is_some() {
                return Err("more than one conversion".to_string());
            }

            let mut parsed = Spec {
                minus: false,
                plus: false,
                space: false,
                zero: false,
                width: 0,
                precision: None,
                conversion: Conversion::LowerExp,
            };
            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => parsed.minus = true,
                    '+' => parsed.plus = true,
                    ' ' => parsed.space = true,
                    '0' => parsed.zero = true,
                    _ => break,
                }
                chars.next();
            }
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                parsed.width = parsed.width * 10 + d as usize;
                chars.next();
            }
            if chars.peek() == Some(&'.') {
                chars.next();
                let mut precision = 0usize;
                while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                    precision = precision * 10 + d as usize;
                    chars.next();
                }
                parsed.precision = Some(precision);
            }
            while matches!(chars.peek(), Some('l') | Some('L')) {
                chars.next();
            }
            parsed.conversion = match chars.next() {
                Some('e') => Conversion::LowerExp,
                Some('E') => Conversion::UpperExp,
                Some('f') | Some('F') => Conversion::Fixed,
                Some('g') => Conversion::LowerGeneral,
                Some('G') => Conversion::UpperGeneral,
                Some(other) => return Err(format!("unsupported conversion {other:?}")),
                None => return Err("truncated conversion".to_string()),
            };
            spec = Some(parsed);
        }

        match spec {
            Some(spec) => Ok(Self {
                raw: raw.to_string(),
                prefix,
                suffix,
                spec,
            }),
            None => Err("no conversion in format string".to_string()),
        }
    }

    /// The format string as declared in the configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Render one value the way C's `printf` would.
    pub fn render(&self, value: f64) -> String {
        format!("{}{}{}", self.prefix, self.spec.render(value), self.suffix)
    }
}

impl Default for CFormat {
    fn default() -> Self {
        Self {
            raw: Self::DEFAULT.to_string(),
            prefix: String::new(),
            suffix: String::new(),
            spec: Spec {
                minus: false,
                plus: false,
                space: false,
                zero: false,
                width: 0,
                precision: None,
                conversion: Conversion::LowerExp,
            },
        }
    }
}

impl TryFrom<String> for CFormat {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<CFormat> for String {
    fn from(format: CFormat) -> String {
        format.raw
    }
}

impl std::str::FromStr for CFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Spec {
    fn render(&self, value: f64) -> String {
        let negative = value.is_sign_negative() && (value != 0.0 || value.is_nan());
        let magnitude = value.abs();
        let upper = matches!(
            self.conversion,
            Conversion::UpperExp | Conversion::UpperGeneral
        );

        let body = if !magnitude.is_finite() {
            let text = if magnitude.is_nan() { "nan" } else { "inf" };
            if upper {
                text.to_uppercase()
            } else {
                text.to_string()
            }
        } else {
            match self.conversion {
                Conversion::Fixed => {
                    format!("{:.*}", self.precision.unwrap_or(6), magnitude)
                }
                Conversion::LowerExp | Conversion::UpperExp => {
                    exp_form(magnitude, self.precision.unwrap_or(6), upper)
                }
                Conversion::LowerGeneral | Conversion::UpperGeneral => {
                    general_form(magnitude, self.precision.unwrap_or(6), upper)
                }
            }
        };

        let sign = if negative && !value.is_nan() {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };

        let len = sign.len() + body.len();
        if len >= self.width {
            return format!("{sign}{body}");
        }
        let pad = self.width - len;
        if self.minus {
            format!("{sign}{body}{}", " ".repeat(pad))
        } else if self.zero && magnitude.is_finite() {
            format!("{sign}{}{body}", "0".repeat(pad))
        } else {
            format!("{}{sign}{body}", " ".repeat(pad))
        }
    }
}

/// `%e` rendering: mantissa with `precision` fractional digits, then a signed
/// two-digit exponent.
fn exp_form(magnitude: f64, precision: usize, upper: bool) -> String {
    let formatted = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some(parts) => parts,
        None => (formatted.as_str(), "0"),
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let marker = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}{marker}{sign}{:02}", exponent.abs())
}

/// `%g` rendering: `precision` significant digits, fixed or exponential form
/// by C's exponent rule, trailing zeros stripped.
fn general_form(magnitude: f64, precision: usize, upper: bool) -> String {
    let digits = precision.max(1);
    let probe = format!("{:.*e}", digits - 1, magnitude);
    let exponent: i32 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exponent >= -4 && exponent < digits as i32 {
        let fractional = (digits as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(format!("{:.*}", fractional, magnitude))
    } else {
        let mantissa = match probe.split_once('e') {
            Some((m, _)) => strip_trailing_zeros(m.to_string()),
            None => probe,
        };
        let marker = if upper { 'E' } else { 'e' };
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}{marker}{sign}{:02}", exponent.abs())
    }
}

fn strip_trailing_zeros(text: String) -> String {
    if !text.contains('.') {
        return text;
    }
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
