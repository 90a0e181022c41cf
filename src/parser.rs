use crate::model::{BetType, Outcome, ParsedBet, Side, Sport};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

// Stake suffix must be anchored right after the digits with no sign, so a
// token like "+25" can never be read as units and "2u" can never be odds.
static RE_STAKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:units?|u)\b").unwrap());

static RE_WIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(win|won|winner|cash|cashed|hit)\b").unwrap());
static RE_LOSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(loss|lost|lose|miss|missed|hook|hooked)\b").unwrap());
static RE_PUSH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(push|pushed|void|voided|cancel|cancelled|canceled)\b").unwrap());

static RE_TOTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?P<side>over|under|o|u)\s*(?P<line>\d+(?:\.\d+)?)\b").unwrap());
static RE_STAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(points|pts|rebounds|rebs?|boards|assists|asts?|shots|sog|yards|yds|saves|strikeouts|ks|goals|threes|3pm|blocks|steals)\b",
    )
    .unwrap()
});
static RE_SIGNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<sign>[+-])(?P<num>\d+(?:\.\d+)?)\b").unwrap());
static RE_ML: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(ml|money\s*line|moneyline)\b").unwrap());
static RE_ML_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+-]\d{3,4}\b").unwrap());
static RE_ODDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+-]\d{2,4}\b").unwrap());

// Recap trailer: "MM/DD: W-L", optionally with a year. Everything from this
// line on is bookkeeping, not bet text.
static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<date>\d{1,2}/\d{1,2}(?:/\d{2,4})?)\s*[:\-]\s*\d+\s*[-–]\s*\d+").unwrap()
});

/// Outcome symbols checked before any keyword scan. Positive-affect marks
/// map to Win; negative-affect and the hook mark map to Loss.
const OUTCOME_SYMBOLS: &[(&str, Outcome)] = &[
    ("✅", Outcome::Win),
    ("💰", Outcome::Win),
    ("❌", Outcome::Loss),
    ("🪝", Outcome::Loss),
];

const SPORT_TABLE: &[(Sport, &[&str], &[&str])] = &[
    (Sport::Soccer, &["⚽"], &["soccer", "mls", "epl", "ucl"]),
    (Sport::Football, &["🏈"], &["nfl", "ncaaf", "cfb", "football"]),
    (Sport::Basketball, &["🏀"], &["nba", "wnba", "ncaab", "cbb", "basketball"]),
    (Sport::Baseball, &["⚾"], &["mlb", "baseball"]),
    (Sport::Mma, &["🥊"], &["mma", "ufc"]),
    (Sport::Hockey, &["🏒"], &["nhl", "hockey"]),
];

/// A spread magnitude at or above this is treated as American odds, not a
/// point line. Known-heuristic boundary between "-3.5" and "-110".
const MAX_SPREAD_MAGNITUDE: f64 = 100.0;

/// Bet-type classification rules, applied in fixed precedence. Later rules
/// are looser patterns than earlier ones and must not steal their matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRule {
    OverUnder,
    SignedSpread,
    MoneylineKeyword,
}

const LINE_RULES: &[LineRule] = &[
    LineRule::OverUnder,
    LineRule::SignedSpread,
    LineRule::MoneylineKeyword,
];

struct LineMatch {
    bet_type: BetType,
    line: Option<f64>,
    side: Option<Side>,
    /// Byte range to strip from the working text; `None` leaves the token
    /// in place for the odds extractor.
    consume: Option<Range<usize>>,
}

impl LineRule {
    fn apply(&self, text: &str) -> Option<LineMatch> {
        match self {
            LineRule::OverUnder => {
                let caps = RE_TOTAL.captures(text)?;
                let whole = caps.get(0)?;
                let line: f64 = caps.name("line")?.as_str().parse().ok()?;
                let side = match caps.name("side")?.as_str().to_lowercase().as_str() {
                    "over" | "o" => Side::Over,
                    _ => Side::Under,
                };
                let bet_type = if RE_STAT.is_match(text) {
                    BetType::Prop
                } else {
                    BetType::Total
                };
                Some(LineMatch {
                    bet_type,
                    line: Some(line),
                    side: Some(side),
                    consume: Some(whole.range()),
                })
            }
            LineRule::SignedSpread => {
                for caps in RE_SIGNED.captures_iter(text) {
                    let whole = caps.get(0).unwrap();
                    let num: f64 = caps.name("num").unwrap().as_str().parse().ok()?;
                    let has_decimal = caps.name("num").unwrap().as_str().contains('.');
                    // Whole 3-4 digit integers read as a price, not a line.
                    if !has_decimal && num >= MAX_SPREAD_MAGNITUDE {
                        continue;
                    }
                    let side = if caps.name("sign").unwrap().as_str() == "-" {
                        Side::Fav
                    } else {
                        Side::Dog
                    };
                    let signed = if side == Side::Fav { -num } else { num };
                    return Some(LineMatch {
                        bet_type: BetType::Spread,
                        line: Some(signed),
                        side: Some(side),
                        consume: Some(whole.range()),
                    });
                }
                None
            }
            LineRule::MoneylineKeyword => {
                if let Some(m) = RE_ML.find(text) {
                    return Some(LineMatch {
                        bet_type: BetType::Moneyline,
                        line: None,
                        side: None,
                        consume: Some(m.range()),
                    });
                }
                // A bare 3-4 digit price with no line context still reads as
                // a moneyline; the token is left for the odds extractor.
                if RE_ML_NUM.is_match(text) {
                    return Some(LineMatch {
                        bet_type: BetType::Moneyline,
                        line: None,
                        side: None,
                        consume: None,
                    });
                }
                None
            }
        }
    }
}

fn remove_range(text: &mut String, range: Range<usize>) {
    text.replace_range(range, " ");
}

fn extract_stake(text: &mut String) -> Option<f64> {
    for caps in RE_STAKE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        // Reject a sign glued to the digits: "-110u" is not a stake.
        let before = text[..whole.start()].chars().next_back();
        if matches!(before, Some('+') | Some('-')) {
            continue;
        }
        let units: f64 = caps.get(1).unwrap().as_str().parse().ok()?;
        let range = whole.range();
        remove_range(text, range);
        return Some(units);
    }
    None
}

fn extract_outcome(text: &mut String) -> Option<Outcome> {
    for (symbol, outcome) in OUTCOME_SYMBOLS {
        if let Some(pos) = text.find(symbol) {
            let range = pos..pos + symbol.len();
            remove_range(text, range);
            return Some(*outcome);
        }
    }
    for (re, outcome) in [
        (&*RE_WIN, Outcome::Win),
        (&*RE_LOSS, Outcome::Loss),
        (&*RE_PUSH, Outcome::Push),
    ] {
        if let Some(m) = re.find(text) {
            let range = m.range();
            remove_range(text, range);
            return Some(outcome);
        }
    }
    None
}

fn extract_sport(text: &mut String) -> Sport {
    let lower = text.to_lowercase();
    for (sport, symbols, keywords) in SPORT_TABLE {
        for symbol in *symbols {
            if let Some(pos) = text.find(symbol) {
                let range = pos..pos + symbol.len();
                remove_range(text, range);
                return *sport;
            }
        }
        for keyword in *keywords {
            if let Some(pos) = find_word(&lower, keyword) {
                let range = pos..pos + keyword.len();
                // Offsets come from the lowercased copy; only strip when they
                // line up with the original bytes.
                if text.get(range.clone()).is_some_and(|s| s.eq_ignore_ascii_case(keyword)) {
                    remove_range(text, range);
                }
                return *sport;
            }
        }
    }
    Sport::Unknown
}

/// Whole-word search in already-lowercased text.
fn find_word(lower: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = lower[from..].find(word) {
        let start = from + rel;
        let end = start + word.len();
        let ok_before = start == 0
            || !lower[..start].chars().next_back().map_or(false, |c| c.is_alphanumeric());
        let ok_after = end == lower.len()
            || !lower[end..].chars().next().map_or(false, |c| c.is_alphanumeric());
        if ok_before && ok_after {
            return Some(start);
        }
        from = end;
    }
    None
}

fn extract_line(text: &mut String) -> (BetType, Option<f64>, Option<Side>) {
    for rule in LINE_RULES {
        if let Some(m) = rule.apply(text) {
            if let Some(range) = m.consume {
                remove_range(text, range);
            }
            return (m.bet_type, m.line, m.side);
        }
    }
    (BetType::Unknown, None, None)
}

fn extract_odds(text: &str) -> Option<String> {
    // A decimal tail means the token is a leftover line fragment, not a
    // price: "-45.5" must never read as odds of -45.
    RE_ODDS
        .find_iter(text)
        .find(|m| text.as_bytes().get(m.end()) != Some(&b'.'))
        .map(|m| m.as_str().to_string())
}

/// Classify one line of free text into a structured bet.
///
/// Returns `None` on empty input or when no win/loss/push signal is found;
/// such lines are simply skipped, never surfaced as errors. Extraction runs
/// in strict precedence (stake, outcome, sport, bet type and line, odds),
/// each step consuming its matched token so later steps cannot cross-match.
pub fn parse(line: &str) -> Option<ParsedBet> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }
    let mut text = raw.to_string();

    let stake_units = extract_stake(&mut text).unwrap_or(1.0);
    let outcome = extract_outcome(&mut text)?;
    let sport = extract_sport(&mut text);
    let (bet_type, posted_line, posted_side) = extract_line(&mut text);
    let posted_odds = extract_odds(&text);

    let signed_result = match outcome {
        Outcome::Win => stake_units,
        Outcome::Loss => -stake_units,
        Outcome::Push => 0.0,
        Outcome::Unresolved => return None,
    };

    Some(ParsedBet {
        raw_text: raw.to_string(),
        stake_units,
        posted_odds,
        outcome,
        signed_result,
        sport,
        bet_type,
        posted_line,
        posted_side,
    })
}

/// Pre-process one posting into parseable lines: the recap trailer and
/// everything after it are dropped, and a parlay block (a "parlay" header
/// or any line ending in ':', plus its leg lines) is joined into a single
/// line so the whole parlay classifies as one bet.
pub fn message_lines(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let cut = lines
        .iter()
        .position(|l| RE_SUMMARY.is_match(l))
        .unwrap_or(lines.len());
    let lines = &lines[..cut];

    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.to_lowercase().contains("parlay") || line.ends_with(':') {
            let mut block = vec![line];
            let mut j = i + 1;
            while j < lines.len() && !starts_new_entry(lines[j]) {
                block.push(lines[j]);
                j += 1;
            }
            out.push(block.join(" | "));
            i = j;
        } else {
            out.push(line.to_string());
            i += 1;
        }
    }
    out
}

/// A leg line is absorbed into the open parlay block until something that
/// reads like a fresh entry shows up: a stake, a sport mark, or another
/// parlay header.
fn starts_new_entry(line: &str) -> bool {
    RE_STAKE.is_match(line)
        || line.to_lowercase().contains("parlay")
        || SPORT_TABLE
            .iter()
            .any(|(_, symbols, _)| symbols.iter().any(|s| line.contains(s)))
}

/// Date carried in the posting's recap trailer, if any. A two-digit year
/// reads as 20xx; a missing year falls back to `default_year`.
pub fn recap_date(content: &str, default_year: i32) -> Option<NaiveDate> {
    for line in content.lines().rev() {
        if let Some(caps) = RE_SUMMARY.captures(line) {
            let mut parts = caps.name("date")?.as_str().split('/');
            let month: u32 = parts.next()?.parse().ok()?;
            let day: u32 = parts.next()?.parse().ok()?;
            let year = match parts.next() {
                Some(y) => {
                    let y: i32 = y.parse().ok()?;
                    if y < 100 { y + 2000 } else { y }
                }
                None => default_year,
            };
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }
    None
}

/// Parse a whole posting: one bet per collapsed line, unparseable lines
/// skipped.
pub fn parse_message(content: &str) -> Vec<ParsedBet> {
    message_lines(content).iter().filter_map(|l| parse(l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spread_win_with_units_and_odds() {
        let bet = parse("2u Lakers -3.5 -110 🏀 ✅").unwrap();
        assert_eq!(bet.stake_units, 2.0);
        assert_eq!(bet.outcome, Outcome::Win);
        assert_eq!(bet.signed_result, 2.0);
        assert_eq!(bet.sport, Sport::Basketball);
        assert_eq!(bet.bet_type, BetType::Spread);
        assert_eq!(bet.posted_line, Some(-3.5));
        assert_eq!(bet.posted_side, Some(Side::Fav));
        assert_eq!(bet.posted_odds.as_deref(), Some("-110"));
    }

    #[test]
    fn parses_dog_spread() {
        let bet = parse("Jets +7 loss").unwrap();
        assert_eq!(bet.bet_type, BetType::Spread);
        assert_eq!(bet.posted_line, Some(7.0));
        assert_eq!(bet.posted_side, Some(Side::Dog));
        assert_eq!(bet.signed_result, -1.0);
    }

    #[test]
    fn parses_total_over() {
        let bet = parse("Celtics/Knicks over 227.5 cash").unwrap();
        assert_eq!(bet.bet_type, BetType::Total);
        assert_eq!(bet.posted_line, Some(227.5));
        assert_eq!(bet.posted_side, Some(Side::Over));
    }

    #[test]
    fn stat_keyword_makes_prop() {
        let bet = parse("Jokic over 9.5 rebounds ✅").unwrap();
        assert_eq!(bet.bet_type, BetType::Prop);
        assert_eq!(bet.posted_line, Some(9.5));
        assert_eq!(bet.posted_side, Some(Side::Over));
    }

    #[test]
    fn under_shorthand() {
        let bet = parse("u 42.5 nfl miss").unwrap();
        assert_eq!(bet.bet_type, BetType::Total);
        assert_eq!(bet.posted_side, Some(Side::Under));
        assert_eq!(bet.sport, Sport::Football);
    }

    #[test]
    fn moneyline_keyword() {
        let bet = parse("Yankees ML -150 ⚾ ❌").unwrap();
        assert_eq!(bet.bet_type, BetType::Moneyline);
        assert_eq!(bet.posted_line, None);
        assert_eq!(bet.posted_side, None);
        assert_eq!(bet.posted_odds.as_deref(), Some("-150"));
    }

    #[test]
    fn bare_price_reads_as_moneyline() {
        let bet = parse("Tyson Fury +240 win 🥊").unwrap();
        assert_eq!(bet.bet_type, BetType::Moneyline);
        assert_eq!(bet.posted_odds.as_deref(), Some("+240"));
        assert_eq!(bet.sport, Sport::Mma);
    }

    #[test]
    fn stake_defaults_to_one_unit() {
        let bet = parse("Avalanche ML win").unwrap();
        assert_eq!(bet.stake_units, 1.0);
        assert_eq!(bet.signed_result, 1.0);
    }

    #[test]
    fn stake_suffix_not_taken_as_odds() {
        let bet = parse("2u Bruins -1.5 ✅").unwrap();
        assert_eq!(bet.stake_units, 2.0);
        assert_eq!(bet.posted_line, Some(-1.5));
        assert_eq!(bet.posted_odds, None);
    }

    #[test]
    fn hook_counts_as_loss() {
        let bet = parse("1.5u Heat -6.5 🪝").unwrap();
        assert_eq!(bet.outcome, Outcome::Loss);
        assert_eq!(bet.signed_result, -1.5);
        let bet = parse("Heat -6.5 hooked").unwrap();
        assert_eq!(bet.outcome, Outcome::Loss);
    }

    #[test]
    fn push_keyword() {
        let bet = parse("Bills -3 push").unwrap();
        assert_eq!(bet.outcome, Outcome::Push);
        assert_eq!(bet.signed_result, 0.0);
    }

    #[test]
    fn no_outcome_signal_fails() {
        assert!(parse("Lakers -3.5 -110 2u").is_none());
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn spread_and_vig_both_extracted() {
        let bet = parse("Niners -7.5 -115 win").unwrap();
        assert_eq!(bet.posted_line, Some(-7.5));
        assert_eq!(bet.posted_odds.as_deref(), Some("-115"));
    }

    // The spread-vs-price split is a documented heuristic: a signed 3-4
    // digit integer is read as a price even when the bettor meant a big
    // spread. Kept as-is rather than guessed around.
    #[test]
    fn large_signed_integer_classified_as_price() {
        let bet = parse("Chiefs -110 win").unwrap();
        assert_eq!(bet.bet_type, BetType::Moneyline);
        assert_eq!(bet.posted_line, None);
        assert_eq!(bet.posted_odds.as_deref(), Some("-110"));
    }

    #[test]
    fn parse_message_skips_bad_lines() {
        let content = "2u Lakers -3.5 ✅\njust chatting here\nJets +7 ❌";
        let bets = parse_message(content);
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].posted_line, Some(-3.5));
        assert_eq!(bets[1].posted_side, Some(Side::Dog));
    }

    #[test]
    fn leftover_decimal_never_reads_as_vig() {
        let bet = parse("Niners -7.5 -45.5 win").unwrap();
        assert_eq!(bet.posted_line, Some(-7.5));
        assert_eq!(bet.posted_odds, None);
    }

    #[test]
    fn parlay_block_collapses_to_one_bet() {
        let content = "3u parlay ✅:\nLakers -3.5\nCeltics ML\n1u Jets +7 ❌";
        let bets = parse_message(content);
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].stake_units, 3.0);
        assert_eq!(bets[0].outcome, Outcome::Win);
        assert_eq!(bets[1].stake_units, 1.0);
        assert_eq!(bets[1].posted_line, Some(7.0));
    }

    #[test]
    fn summary_trailer_is_not_a_bet() {
        let content = "2u Lakers -3.5 ✅\n11/2: 1-0";
        let bets = parse_message(content);
        assert_eq!(bets.len(), 1);
    }

    #[test]
    fn recap_date_extraction() {
        assert_eq!(
            recap_date("Jets +7 ❌\n10/31: 0-1", 2024),
            NaiveDate::from_ymd_opt(2024, 10, 31)
        );
        assert_eq!(
            recap_date("10/31/23: 5-2", 2024),
            NaiveDate::from_ymd_opt(2023, 10, 31)
        );
        assert_eq!(recap_date("Jets +7 ❌", 2024), None);
        // A slashless score line is not a recap trailer.
        assert_eq!(recap_date("over 227.5 cash", 2024), None);
    }
}
