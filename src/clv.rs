use crate::model::{BetType, Side};

/// Implied win probability of American odds. `None` for malformed or zero
/// odds; valid nonzero odds always land strictly inside (0, 1).
pub fn american_to_prob(odds: &str) -> Option<f64> {
    let trimmed = odds.trim();
    let value: f64 = trimmed.strip_prefix('+').unwrap_or(trimmed).parse().ok()?;
    if value == 0.0 || !value.is_finite() {
        return None;
    }
    if value > 0.0 {
        Some(100.0 / (value + 100.0))
    } else {
        Some(-value / (-value + 100.0))
    }
}

/// Closing Line Value: the edge between the posted number and the closing
/// consensus, signed so that positive always means the bettor beat the
/// close for the side they took.
///
/// Returns `None` when a field the bet type requires is missing or the side
/// is outside that type's domain; such bets are excluded from averages, not
/// reported as errors. No rounding happens here.
pub fn calc_clv(
    bet_type: BetType,
    posted_line: Option<f64>,
    posted_side: Option<Side>,
    posted_odds: Option<&str>,
    closing_line: Option<f64>,
    closing_odds: Option<&str>,
) -> Option<f64> {
    match bet_type {
        BetType::Moneyline => {
            let posted = american_to_prob(posted_odds?)?;
            let closing = american_to_prob(closing_odds?)?;
            Some(closing - posted)
        }
        BetType::Spread => {
            let side = posted_side?;
            if !side.valid_for(BetType::Spread) {
                return None;
            }
            // Magnitude growth is favorable movement for either side, so the
            // formula is side-agnostic on absolute lines.
            Some(closing_line?.abs() - posted_line?.abs())
        }
        BetType::Total | BetType::Prop => {
            let diff = closing_line? - posted_line?;
            match posted_side? {
                Side::Over => Some(diff),
                Side::Under => Some(-diff),
                _ => None,
            }
        }
        BetType::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn american_to_prob_bounds() {
        for odds in ["-10000", "-150", "-101", "+100", "+150", "+25000", "100", "-1"] {
            let p = american_to_prob(odds).unwrap();
            assert!(p > 0.0 && p < 1.0, "{odds} gave {p}");
        }
    }

    #[test]
    fn american_to_prob_known_values() {
        assert!(close(american_to_prob("-150").unwrap(), 0.6));
        assert!(close(american_to_prob("+100").unwrap(), 0.5));
        assert!(close(american_to_prob("+150").unwrap(), 0.4));
    }

    #[test]
    fn american_to_prob_rejects_garbage() {
        assert!(american_to_prob("").is_none());
        assert!(american_to_prob("even").is_none());
        assert!(american_to_prob("0").is_none());
    }

    #[test]
    fn spread_clv_sign_law() {
        let fav = calc_clv(
            BetType::Spread,
            Some(-3.5),
            Some(Side::Fav),
            None,
            Some(-4.5),
            None,
        );
        assert!(close(fav.unwrap(), 1.0));
        let dog = calc_clv(
            BetType::Spread,
            Some(7.0),
            Some(Side::Dog),
            None,
            Some(8.0),
            None,
        );
        assert!(close(dog.unwrap(), 1.0));
    }

    #[test]
    fn total_clv_sign_law() {
        let over = calc_clv(
            BetType::Total,
            Some(227.5),
            Some(Side::Over),
            None,
            Some(229.0),
            None,
        );
        assert!(close(over.unwrap(), 1.5));
        let under = calc_clv(
            BetType::Total,
            Some(227.5),
            Some(Side::Under),
            None,
            Some(229.0),
            None,
        );
        assert!(close(under.unwrap(), -1.5));
    }

    #[test]
    fn moneyline_clv_sign_law() {
        let clv = calc_clv(
            BetType::Moneyline,
            None,
            None,
            Some("-150"),
            None,
            Some("-130"),
        )
        .unwrap();
        // p(-130) - p(-150) = 0.5652... - 0.6
        assert!((clv + 0.0348).abs() < 1e-3);
        assert!(clv < 0.0);
    }

    #[test]
    fn missing_fields_yield_none() {
        assert!(calc_clv(BetType::Moneyline, None, None, None, None, Some("-110")).is_none());
        assert!(calc_clv(BetType::Spread, Some(-3.5), Some(Side::Fav), None, None, None).is_none());
        assert!(calc_clv(BetType::Total, Some(44.0), None, None, Some(45.0), None).is_none());
        assert!(calc_clv(BetType::Unknown, Some(1.0), None, None, Some(2.0), None).is_none());
    }

    #[test]
    fn side_outside_type_domain_yields_none() {
        assert!(calc_clv(
            BetType::Spread,
            Some(-3.5),
            Some(Side::Over),
            None,
            Some(-4.5),
            None
        )
        .is_none());
        assert!(calc_clv(
            BetType::Total,
            Some(44.0),
            Some(Side::Fav),
            None,
            Some(45.0),
            None
        )
        .is_none());
    }

    #[test]
    fn moneyline_conversion_failure_yields_none() {
        assert!(calc_clv(
            BetType::Moneyline,
            None,
            None,
            Some("EV"),
            None,
            Some("-110")
        )
        .is_none());
    }
}
