//! Poll trigger - five-field schedule expressions

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// A five-field polling schedule (`minute hour day-of-month month day-of-week`).
///
/// Supports `*`, exact values, ranges, `*/step` and `range/step`, plus the
/// `H` hash term (`H`, `H/step`, `H(a-b)`) which spreads pipelines with the
/// same nominal schedule across the interval deterministically by pipeline
/// name. `H/5 * * * *` fires every five minutes at a per-pipeline offset.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    raw: String,
    fields: [Field; 5],
    hash: u32,
}

#[derive(Debug, Clone)]
struct Field {
    terms: Vec<Term>,
    min: u32,
    max: u32,
}

#[derive(Debug, Clone)]
enum Term {
    Any,
    Exact(u32),
    Range(u32, u32),
    Hash { range: Option<(u32, u32)> },
    Step { base: StepBase, step: u32 },
}

#[derive(Debug, Clone)]
enum StepBase {
    Any,
    Range(u32, u32),
    Hash(Option<(u32, u32)>),
}

const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day-of-month", "month", "day-of-week"];
const FIELD_BOUNDS: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 7)];

impl PollSchedule {
    /// Parse a schedule expression, hashing `H` terms by `seed` (the
    /// pipeline name).
    pub fn parse(expr: &str, seed: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            bail!(
                "Schedule '{}' has {} fields, expected 5 (minute hour day-of-month month day-of-week)",
                expr,
                parts.len()
            );
        }

        let mut fields = Vec::with_capacity(5);
        for (i, part) in parts.iter().enumerate() {
            let (min, max) = FIELD_BOUNDS[i];
            let field = parse_field(part, min, max)
                .with_context(|| format!("Invalid {} field '{}'", FIELD_NAMES[i], part))?;
            fields.push(field);
        }

        Ok(Self {
            raw: expr.to_string(),
            fields: fields.try_into().expect("five fields"),
            hash: fnv1a(seed),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the schedule fires at the given instant (minute resolution)
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        // day-of-week 7 means Sunday, same as 0
        let dow = at.weekday().num_days_from_sunday();
        let values = [at.minute(), at.hour(), at.day(), at.month(), dow];

        self.fields
            .iter()
            .zip(values)
            .all(|(field, value)| field.matches(value, self.hash) || (field.max == 7 && value == 0 && field.matches(7, self.hash)))
    }

    /// Next firing instant strictly after `after`, if one exists within
    /// the coming four years.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = (after + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;

        // Minute-by-minute scan; schedules are sparse but never empty in
        // practice, and the bound keeps a contradictory one from spinning.
        let limit = after + Duration::days(4 * 366);
        while candidate <= limit {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

impl Field {
    fn matches(&self, value: u32, hash: u32) -> bool {
        self.terms.iter().any(|term| match term {
            Term::Any => true,
            Term::Exact(n) => value == *n,
            Term::Range(a, b) => value >= *a && value <= *b,
            Term::Hash { range } => {
                let (lo, hi) = range.unwrap_or((self.min, self.max));
                value == lo + hash % (hi - lo + 1)
            }
            Term::Step { base, step } => match base {
                StepBase::Any => value >= self.min && (value - self.min) % step == 0,
                StepBase::Range(a, b) => value >= *a && value <= *b && (value - a) % step == 0,
                StepBase::Hash(range) => {
                    let (lo, hi) = range.unwrap_or((self.min, self.max));
                    value >= lo && value <= hi && (value - lo) % step == hash % step
                }
            },
        })
    }
}

fn parse_field(part: &str, min: u32, max: u32) -> Result<Field> {
    let mut terms = Vec::new();
    for piece in part.split(',') {
        terms.push(parse_term(piece, min, max)?);
    }
    Ok(Field { terms, min, max })
}

fn parse_term(piece: &str, min: u32, max: u32) -> Result<Term> {
    let (base, step) = match piece.split_once('/') {
        Some((base, step)) => {
            let step: u32 = step
                .parse()
                .with_context(|| format!("Bad step '{}'", step))?;
            if step == 0 {
                bail!("Step must be non-zero");
            }
            (base, Some(step))
        }
        None => (piece, None),
    };

    let term = if base == "*" {
        match step {
            Some(step) => Term::Step {
                base: StepBase::Any,
                step,
            },
            None => Term::Any,
        }
    } else if let Some(range) = base.strip_prefix('H') {
        let range = if range.is_empty() {
            None
        } else {
            let inner = range
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .with_context(|| format!("Bad hash range '{}'", base))?;
            Some(parse_range(inner, min, max)?)
        };
        match step {
            Some(step) => Term::Step {
                base: StepBase::Hash(range),
                step,
            },
            None => Term::Hash { range },
        }
    } else if base.contains('-') {
        let range = parse_range(base, min, max)?;
        match step {
            Some(step) => Term::Step {
                base: StepBase::Range(range.0, range.1),
                step,
            },
            None => Term::Range(range.0, range.1),
        }
    } else {
        let value: u32 = base
            .parse()
            .with_context(|| format!("Bad value '{}'", base))?;
        if value < min || value > max {
            bail!("Value {} out of range {}-{}", value, min, max);
        }
        if step.is_some() {
            bail!("Step requires a range base, got '{}'", piece);
        }
        Term::Exact(value)
    };

    Ok(term)
}

fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32)> {
    let (a, b) = s
        .split_once('-')
        .with_context(|| format!("Bad range '{}'", s))?;
    let a: u32 = a.parse().with_context(|| format!("Bad range start '{}'", a))?;
    let b: u32 = b.parse().with_context(|| format!("Bad range end '{}'", b))?;
    if a > b || a < min || b > max {
        bail!("Range {}-{} outside {}-{}", a, b, min, max);
    }
    Ok((a, b))
}

fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for byte in s.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}
