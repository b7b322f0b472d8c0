//! printf-style formatting for scripts.
//!
//! Verbs: `%s %v %d %i %f %e %g %x %X %o %b %c %q %t %%`, with the flags
//! `- + 0 space #`, width, and precision. Mistakes are rendered inline rather
//! than raised: `%!d(string=x)` for a wrong type, `%!d(MISSING)` for a missing
//! argument, and a trailing `%!(EXTRA type=value, ...)` for unused arguments.

use super::ScriptResult;
use crate::sandbox::value::{Value, to_host};
use rhai::{Array, ImmutableString, Module};
use std::iter::Peekable;
use std::str::Chars;

const MAX_WIDTH: usize = 1_000_000;

/// `fmt::sprintf(format)`, `fmt::sprintf(format, args)`.
pub fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("sprintf", |format: ImmutableString| -> ScriptResult<String> {
        Ok(sprintf(&format, &[]))
    });
    module.set_native_fn(
        "sprintf",
        |format: ImmutableString, args: Array| -> ScriptResult<String> {
            let args: Vec<Value> = args.into_iter().map(to_host).collect();
            Ok(sprintf(&format, &args))
        },
    );
    module
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.sharp = true,
                _ => break,
            }
            chars.next();
        }

        spec.width = read_number(&mut chars);
        if spec.width.is_some_and(|w| w > MAX_WIDTH) {
            out.push_str("%!(BADWIDTH)");
            spec.width = None;
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let precision = read_number(&mut chars).unwrap_or(0);
            if precision > MAX_WIDTH {
                out.push_str("%!(BADPREC)");
            } else {
                spec.precision = Some(precision);
            }
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        };
        next_arg += 1;

        match format_arg(verb, spec, arg) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&format!("%!{verb}({}={arg})", arg.type_name())),
        }
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|arg| format!("{}={arg}", arg.type_name()))
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }

    out
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut number: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        number = Some(
            number
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit as usize),
        );
    }
    number
}

#[allow(clippy::cast_precision_loss)]
fn format_arg(verb: char, spec: Spec, arg: &Value) -> Option<String> {
    let text = match (verb, arg) {
        ('v', Value::Float(x)) => float(*x, 'v', spec),
        ('v', other) => pad(&other.to_string(), spec),
        ('s', other) => pad(&truncate(&other.to_string(), spec.precision), spec),
        ('d' | 'i', Value::Int(i)) => integer(*i, 10, false, "", spec),
        ('x', Value::Int(i)) => integer(*i, 16, false, if spec.sharp { "0x" } else { "" }, spec),
        ('X', Value::Int(i)) => integer(*i, 16, true, if spec.sharp { "0X" } else { "" }, spec),
        ('o', Value::Int(i)) => integer(*i, 8, false, if spec.sharp { "0" } else { "" }, spec),
        ('b', Value::Int(i)) => integer(*i, 2, false, "", spec),
        ('x', Value::String(s)) => pad(&hex_bytes(s, false), spec),
        ('X', Value::String(s)) => pad(&hex_bytes(s, true), spec),
        ('c', Value::Int(i)) => {
            let c = u32::try_from(*i).ok().and_then(char::from_u32)?;
            pad(&c.to_string(), spec)
        }
        ('q', Value::String(s)) => pad(&format!("{s:?}"), spec),
        ('q', Value::Int(i)) => {
            let c = u32::try_from(*i).ok().and_then(char::from_u32)?;
            pad(&format!("{c:?}"), spec)
        }
        ('t', Value::Bool(b)) => pad(&b.to_string(), spec),
        ('f' | 'F' | 'e' | 'E' | 'g' | 'G', Value::Float(x)) => float(*x, verb, spec),
        ('f' | 'F' | 'e' | 'E' | 'g' | 'G', Value::Int(i)) => float(*i as f64, verb, spec),
        _ => return None,
    };
    Some(text)
}

fn sign(negative: bool, spec: Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn integer(value: i64, radix: u32, upper: bool, prefix: &str, spec: Spec) -> String {
    let magnitude = value.unsigned_abs();
    let mut digits = match (radix, upper) {
        (16, false) => format!("{magnitude:x}"),
        (16, true) => format!("{magnitude:X}"),
        (8, _) => format!("{magnitude:o}"),
        (2, _) => format!("{magnitude:b}"),
        _ => magnitude.to_string(),
    };
    if let Some(precision) = spec.precision {
        if precision == 0 && magnitude == 0 {
            digits.clear();
        } else if digits.len() < precision {
            digits = format!("{}{digits}", "0".repeat(precision - digits.len()));
        }
    }
    // An explicit precision turns zero padding off.
    let zero_ok = spec.precision.is_none();
    pad_number(sign(value < 0, spec), prefix, &digits, spec, zero_ok)
}

fn float(value: f64, verb: char, spec: Spec) -> String {
    let negative = value.is_sign_negative() && !value.is_nan();
    if value.is_nan() {
        return pad_number(sign(false, spec), "", "NaN", spec, false);
    }
    if value.is_infinite() {
        return pad_number(sign(negative, spec), "", "Inf", spec, false);
    }

    let magnitude = value.abs();
    let body = match verb {
        'f' | 'F' => format!("{magnitude:.prec$}", prec = spec.precision.unwrap_or(6)),
        'e' | 'E' => exponent(magnitude, spec.precision.unwrap_or(6), verb == 'E'),
        'v' => general(magnitude, None, false, 21),
        _ => general(magnitude, spec.precision, verb == 'G', 6),
    };
    pad_number(sign(negative, spec), "", &body, spec, true)
}

fn split_exponent(scientific: &str) -> (&str, i32) {
    match scientific.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (scientific, 0),
    }
}

fn join_exponent(mantissa: &str, exp: i32, upper: bool) -> String {
    let marker = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{marker}{sign}{:02}", exp.unsigned_abs())
}

fn exponent(magnitude: f64, precision: usize, upper: bool) -> String {
    let scientific = format!("{magnitude:.precision$e}");
    let (mantissa, exp) = split_exponent(&scientific);
    join_exponent(mantissa, exp, upper)
}

/// `%g`: scientific for large or small exponents, plain decimal otherwise.
/// `shortest_limit` is the exponent threshold when no precision is given.
fn general(magnitude: f64, precision: Option<usize>, upper: bool, shortest_limit: i32) -> String {
    if magnitude == 0.0 {
        return "0".to_string();
    }
    let precision = precision.map(|p| p.max(1));
    let scientific = match precision {
        Some(p) => format!("{magnitude:.prec$e}", prec = p - 1),
        None => format!("{magnitude:e}"),
    };
    let (mantissa, exp) = split_exponent(&scientific);
    let limit = precision.map_or(shortest_limit, |p| i32::try_from(p).unwrap_or(i32::MAX));

    if exp < -4 || exp >= limit {
        return join_exponent(trim_fraction(mantissa), exp, upper);
    }
    match precision {
        None => magnitude.to_string(),
        Some(p) => {
            let p = i32::try_from(p).unwrap_or(i32::MAX);
            let decimals = usize::try_from(p - 1 - exp).unwrap_or(0);
            trim_fraction(&format!("{magnitude:.decimals$}")).to_string()
        }
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

fn hex_bytes(text: &str, upper: bool) -> String {
    text.bytes()
        .map(|b| {
            if upper {
                format!("{b:02X}")
            } else {
                format!("{b:02x}")
            }
        })
        .collect()
}

fn truncate(text: &str, precision: Option<usize>) -> String {
    match precision {
        Some(limit) => text.chars().take(limit).collect(),
        None => text.to_string(),
    }
}

fn pad(text: &str, spec: Spec) -> String {
    pad_number("", "", text, spec, false)
}

fn pad_number(sign: &str, prefix: &str, body: &str, spec: Spec, zero_ok: bool) -> String {
    let len = sign.len() + prefix.len() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return format!("{sign}{prefix}{body}");
    }
    let fill = width - len;
    if spec.minus {
        format!("{sign}{prefix}{body}{}", " ".repeat(fill))
    } else if spec.zero && zero_ok {
        format!("{sign}{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{sign}{prefix}{body}", " ".repeat(fill))
    }
}
