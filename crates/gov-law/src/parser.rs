//! # Law Parser
//!
//! Compiles rule-language text into a [`LawDefinition`].
//!
//! ```text
//! law midnight_deadline:1.0.0:
//!   scope: deliverable
//!   clock: midnight America/Sao_Paulo
//!
//!   if ok: accepted == true and now <= deadline_at
//!   then: accept, tag(key=status,val=accepted), append_ledger
//!   ...
//! ```
//!
//! Lines are trimmed; blank lines and `#` comments are ignored. The header
//! comes first. `scope:` and `clock:` appear exactly once, and each of the
//! three `if <branch>:` lines is immediately followed by its `then:` line.
//!
//! Unknown action tokens are dropped with a warning under
//! [`ActionStrictness::Lenient`] and rejected under
//! [`ActionStrictness::Strict`]. Strict mode also rejects conditions that
//! do not parse as expressions.

use gov_core::{validate_timezone, Action, ClockSpec, ContentDigest, LawDefinition, Triage, TriageBlock};

use crate::error::ParseError;
use crate::expr::Expr;

/// How the parser treats action tokens it does not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionStrictness {
    /// Drop the token and log a warning.
    #[default]
    Lenient,
    /// Fail the parse.
    Strict,
}

/// Parser configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Treatment of unknown action tokens and unparsable conditions.
    pub strictness: ActionStrictness,
}

impl ParserOptions {
    /// Options with [`ActionStrictness::Strict`].
    pub fn strict() -> Self {
        Self {
            strictness: ActionStrictness::Strict,
        }
    }
}

/// Content hash of law text: `sha256:<hex>` over the exact bytes.
pub fn hash_law_text(text: &str) -> String {
    ContentDigest::sha256(text.as_bytes()).to_string()
}

/// Parse with default (lenient) options.
pub fn parse_law(text: &str) -> Result<LawDefinition, ParseError> {
    parse_law_with(text, &ParserOptions::default())
}

/// Parse law text into a definition whose `hash` is set.
pub fn parse_law_with(text: &str, options: &ParserOptions) -> Result<LawDefinition, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .peekable();

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| ParseError::whole("empty law text"))?;
    let id = parse_header(header_no, header)?;

    let mut scope: Option<String> = None;
    let mut clock: Option<ClockSpec> = None;
    let mut branches: [Option<TriageBlock>; 3] = [None, None, None];

    while let Some((no, line)) = lines.next() {
        if let Some(rest) = line.strip_prefix("scope:") {
            if scope.is_some() {
                return Err(ParseError::at(no, line, "duplicate `scope:` line"));
            }
            let selector = rest.trim();
            if selector.is_empty() || selector.contains(char::is_whitespace) {
                return Err(ParseError::at(no, line, "scope must be a single selector"));
            }
            scope = Some(selector.to_string());
        } else if let Some(rest) = line.strip_prefix("clock:") {
            if clock.is_some() {
                return Err(ParseError::at(no, line, "duplicate `clock:` line"));
            }
            clock = Some(parse_clock(no, line, rest)?);
        } else if let Some(rest) = line.strip_prefix("if ") {
            let (branch, condition) = rest
                .split_once(':')
                .ok_or_else(|| ParseError::at(no, line, "expected `if <branch>: <condition>`"))?;
            let triage = parse_branch(no, line, branch.trim())?;
            let slot = &mut branches[branch_index(triage)];
            if slot.is_some() {
                return Err(ParseError::at(no, line, format!("duplicate `{triage}` branch")));
            }
            let condition = condition.trim();
            if condition.is_empty() {
                return Err(ParseError::at(no, line, "empty condition"));
            }
            if options.strictness == ActionStrictness::Strict {
                Expr::parse(condition)
                    .map_err(|e| ParseError::at(no, line, format!("invalid condition: {e}")))?;
            }

            let actions = match lines.next_if(|(_, next)| next.starts_with("then:")) {
                Some((then_no, then_line)) => {
                    parse_actions(then_no, then_line, &then_line["then:".len()..], options)?
                }
                None => {
                    return Err(ParseError::at(
                        no,
                        line,
                        format!("`{triage}` branch is not followed by a `then:` line"),
                    ))
                }
            };
            *slot = Some(TriageBlock {
                condition: condition.to_string(),
                actions,
            });
        } else if line.starts_with("then:") {
            return Err(ParseError::at(no, line, "`then:` without a preceding `if` line"));
        } else {
            return Err(ParseError::at(no, line, "unrecognized line"));
        }
    }

    let scope = scope.ok_or_else(|| ParseError::whole("missing `scope:` line"))?;
    let clock = clock.ok_or_else(|| ParseError::whole("missing `clock:` line"))?;
    let [ok, doubt, not] = branches;
    let missing = |t: Triage| ParseError::whole(format!("missing `if {t}:` branch"));

    Ok(LawDefinition {
        id,
        scope,
        clock,
        ok: ok.ok_or_else(|| missing(Triage::Ok))?,
        doubt: doubt.ok_or_else(|| missing(Triage::Doubt))?,
        not: not.ok_or_else(|| missing(Triage::Not))?,
        hash: Some(hash_law_text(text)),
    })
}

fn branch_index(triage: Triage) -> usize {
    match triage {
        Triage::Ok => 0,
        Triage::Doubt => 1,
        Triage::Not => 2,
    }
}

fn parse_header(no: usize, line: &str) -> Result<String, ParseError> {
    let malformed = || ParseError::at(no, line, "expected header `law <name>:<version>:`");
    let body = line
        .strip_prefix("law ")
        .and_then(|rest| rest.trim().strip_suffix(':'))
        .ok_or_else(malformed)?;
    let (name, version) = body.split_once(':').ok_or_else(malformed)?;
    if !is_law_name(name) {
        return Err(ParseError::at(no, line, format!("invalid law name \"{name}\"")));
    }
    if !is_semver(version) {
        return Err(ParseError::at(
            no,
            line,
            format!("version \"{version}\" is not MAJOR.MINOR.PATCH"),
        ));
    }
    Ok(format!("{name}:{version}"))
}

fn is_law_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_semver(version: &str) -> bool {
    let (core, pre) = match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    };
    let numeric = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| numeric(p))
        && pre.map_or(true, |p| {
            !p.is_empty()
                && p.split('.').all(|id| {
                    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                })
        })
}

fn parse_clock(no: usize, line: &str, rest: &str) -> Result<ClockSpec, ParseError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("midnight"), Some(zone), None) => {
            validate_timezone(zone).map_err(|e| ParseError::at(no, line, e.to_string()))?;
            Ok(ClockSpec {
                timezone: zone.to_string(),
            })
        }
        _ => Err(ParseError::at(no, line, "expected `clock: midnight <IANA-zone>`")),
    }
}

fn parse_branch(no: usize, line: &str, branch: &str) -> Result<Triage, ParseError> {
    Triage::ORDER
        .into_iter()
        .find(|t| t.as_str() == branch)
        .ok_or_else(|| {
            ParseError::at(no, line, format!("unknown branch \"{branch}\" (expected ok, doubt or not)"))
        })
}

fn parse_actions(
    no: usize,
    line: &str,
    list: &str,
    options: &ParserOptions,
) -> Result<Vec<Action>, ParseError> {
    let mut actions = Vec::new();
    for token in split_top_level(list) {
        match parse_action(token) {
            Some(action) => actions.push(action),
            None if options.strictness == ActionStrictness::Strict => {
                return Err(ParseError::at(no, line, format!("unknown action \"{token}\"")));
            }
            None => {
                tracing::warn!(line = no, token, "dropping unrecognized action token");
            }
        }
    }
    Ok(actions)
}

/// Split on commas that are not inside parentheses, trimming each piece.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(list[start..].trim());
    pieces
}

/// Parse one action token. Returns `None` if the token is not recognized.
pub fn parse_action(token: &str) -> Option<Action> {
    match token {
        "accept" => return Some(Action::Accept),
        "append_ledger" => return Some(Action::AppendLedger),
        _ => {}
    }

    let (name, args) = token.split_once('(')?;
    let args = args.strip_suffix(')')?;
    let mut pairs = Vec::new();
    for pair in args.split(',') {
        let (key, value) = pair.split_once('=')?;
        let (key, value) = (key.trim(), value.trim());
        if !is_word(value) {
            return None;
        }
        pairs.push((key, value));
    }
    let arg = |wanted: &str| -> Option<String> {
        pairs
            .iter()
            .find(|(k, _)| *k == wanted)
            .map(|(_, v)| v.to_string())
    };
    let arity = pairs.len();

    match (name.trim(), arity) {
        ("hold", 1) => Some(Action::Hold {
            hours: arg("hours")?.parse().ok()?,
        }),
        ("terminate", 1) => Some(Action::Terminate {
            reason: arg("reason")?,
        }),
        ("notify", 1) => Some(Action::Notify { role: arg("role")? }),
        ("tag", 2) => Some(Action::Tag {
            key: arg("key")?,
            val: arg("val")?,
        }),
        ("emit", 1) => Some(Action::Emit {
            event: arg("event")?,
        }),
        _ => None,
    }
}

fn is_word(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}
