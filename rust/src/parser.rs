//! Reader for the textual graph description.
//!
//! ```text
//! @tasks 3
//! T0 2 1(10) 2(4)      # task id, child count, child(volume)...
//! uT1 0                # 'u' prefix marks an unpredictable task
//! T2 0
//! @proc 2
//! 120 0 0              # unit cost, reserved, category (0 = HC, 1 = PP)
//! 80 0 1
//! @times
//! 3 5
//! ...
//! @cost
//! ...
//! @comm 1
//! CHAN0 5 2 1 1        # cost, bandwidth, one connection flag per PE type
//! ```
//!
//! Blank lines and `#` comments are ignored.

use std::iter::Peekable;

use thiserror::Error;

use crate::models::{ChannelSpec, GraphInput, PeType};

/// Malformed graph description.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number, 0 for end of input.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

type Lines<'a> = Peekable<Box<dyn Iterator<Item = (usize, &'a str)> + 'a>>;

fn content_lines<'a>(text: &'a str) -> Lines<'a> {
    let iter: Box<dyn Iterator<Item = (usize, &'a str)> + 'a> = Box::new(
        text.lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
            .filter(|(_, line)| !line.is_empty()),
    );
    iter.peekable()
}

fn next_line<'a>(lines: &mut Lines<'a>, expected: &str) -> Result<(usize, &'a str), ParseError> {
    lines.next().ok_or_else(|| {
        ParseError::new(0, format!("unexpected end of input, expected {}", expected))
    })
}

fn number<T: std::str::FromStr>(line: usize, token: &str) -> Result<T, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::new(line, format!("invalid number '{}'", token)))
}

fn numbers(line: usize, text: &str) -> Result<Vec<f64>, ParseError> {
    text.split_whitespace().map(|t| number(line, t)).collect()
}

/// `@<name>` header, with a count when `counted`.
fn header(lines: &mut Lines<'_>, name: &str, counted: bool) -> Result<usize, ParseError> {
    let (line, text) = next_line(lines, name)?;
    let mut tokens = text.split_whitespace();
    if tokens.next() != Some(name) {
        return Err(ParseError::new(line, format!("expected '{}' header", name)));
    }
    let count = match (counted, tokens.next()) {
        (true, Some(token)) => number(line, token)?,
        (true, None) => return Err(ParseError::new(line, format!("'{}' needs a count", name))),
        (false, _) => 0,
    };
    if tokens.next().is_some() {
        return Err(ParseError::new(line, format!("trailing tokens after '{}'", name)));
    }
    Ok(count)
}

/// `rows` lines of exactly `columns` numbers.
fn matrix(
    lines: &mut Lines<'_>,
    name: &str,
    rows: usize,
    columns: usize,
) -> Result<Vec<Vec<f64>>, ParseError> {
    (0..rows)
        .map(|_| {
            let (line, text) = next_line(lines, name)?;
            let row = numbers(line, text)?;
            if row.len() != columns {
                return Err(ParseError::new(
                    line,
                    format!("{} row has {} values, expected {}", name, row.len(), columns),
                ));
            }
            Ok(row)
        })
        .collect()
}

/// `child(volume)` token.
fn edge(line: usize, token: &str) -> Result<(usize, f64), ParseError> {
    let invalid = || ParseError::new(line, format!("invalid edge '{}'", token));
    let (child, rest) = token.split_once('(').ok_or_else(invalid)?;
    let volume = rest.strip_suffix(')').ok_or_else(invalid)?;
    Ok((number(line, child)?, number(line, volume)?))
}

/// Parse a complete graph description.
pub fn parse_graph(text: &str) -> Result<GraphInput, ParseError> {
    let mut lines = content_lines(text);

    let n = header(&mut lines, "@tasks", true)?;
    let mut adjacency = vec![vec![false; n]; n];
    let mut volumes = vec![vec![0.0; n]; n];
    let mut unpredictable = vec![false; n];

    while let Some(&(line, text)) = lines.peek() {
        if text.starts_with('@') {
            break;
        }
        lines.next();

        let mut tokens = text.split_whitespace();
        let label = tokens.next().unwrap_or_default();
        let marked = label.starts_with('u');
        let id: usize = label
            .trim_start_matches('u')
            .strip_prefix('T')
            .ok_or_else(|| ParseError::new(line, format!("expected task label, found '{}'", label)))
            .and_then(|id| number(line, id))?;
        if id >= n {
            return Err(ParseError::new(line, format!("task T{} out of range", id)));
        }
        let declared: usize = match tokens.next() {
            Some(token) => number(line, token)?,
            None => return Err(ParseError::new(line, "missing child count")),
        };

        unpredictable[id] |= marked;
        let mut found = 0;
        for token in tokens {
            let (child, volume) = edge(line, token)?;
            if child >= n {
                return Err(ParseError::new(line, format!("child T{} out of range", child)));
            }
            adjacency[id][child] = true;
            volumes[id][child] = volume;
            found += 1;
        }
        if found != declared {
            return Err(ParseError::new(
                line,
                format!("T{} declares {} children, found {}", id, declared, found),
            ));
        }
    }

    let m = header(&mut lines, "@proc", true)?;
    let pe_types = matrix(&mut lines, "@proc", m, 3)?
        .iter()
        .map(|row| PeType::from_row(row).map_err(|err| ParseError::new(0, err.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    header(&mut lines, "@times", false)?;
    let times = matrix(&mut lines, "@times", n, m)?;
    header(&mut lines, "@cost", false)?;
    let costs = matrix(&mut lines, "@cost", n, m)?;

    let k = header(&mut lines, "@comm", true)?;
    let mut channels = Vec::with_capacity(k);
    for expected in 0..k {
        let (line, text) = next_line(&mut lines, "@comm")?;
        let (label, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        if label != format!("CHAN{}", expected) {
            return Err(ParseError::new(
                line,
                format!("expected CHAN{}, found '{}'", expected, label),
            ));
        }
        let row = numbers(line, rest)?;
        let channel =
            ChannelSpec::from_row(&row, m).map_err(|err| ParseError::new(line, err.to_string()))?;
        channels.push(channel);
    }

    if let Some((line, text)) = lines.next() {
        return Err(ParseError::new(line, format!("unexpected content '{}'", text)));
    }

    Ok(GraphInput {
        adjacency,
        volumes,
        pe_types,
        times,
        costs,
        channels,
        unpredictable: unpredictable.iter().any(|&u| u).then_some(unpredictable),
    })
}
