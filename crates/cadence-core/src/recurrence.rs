use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::CoreError;
use crate::models::{Frequency, MonthDaySet, Occurrence, RecurrenceRule, WeekdaySet};

/// Number of days in the given month, or `None` for an invalid year/month.
#[inline]
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(chrono::Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as u32)
}

/// Builds `year-month-day`, clamping `day` to the last day of the month.
#[inline]
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

#[inline]
fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn from_month_index(index: i64) -> Option<(i32, u32)> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    Some((year, index.rem_euclid(12) as u32 + 1))
}

#[inline]
fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Computes the next candidate occurrence strictly after `reference`.
///
/// Pure and deterministic. Interval parity (which weeks, months or years are
/// eligible) is measured from the rule's anchor date, so the anchor also
/// supplies the weekday or day of month when the rule leaves its set empty.
/// Returns `None` only when the result would fall outside chrono's calendar.
pub fn next_candidate(rule: &RecurrenceRule, reference: NaiveDate) -> Option<NaiveDate> {
    let interval = rule.interval.max(1);
    match rule.frequency {
        Frequency::Daily => reference.checked_add_days(Days::new(interval as u64)),
        Frequency::Weekly => next_weekly(rule, reference, interval as i64),
        Frequency::Monthly => next_monthly(rule, reference, interval as i64),
        Frequency::Yearly => next_yearly(rule, reference, interval as i32),
    }
}

fn next_weekly(rule: &RecurrenceRule, reference: NaiveDate, interval: i64) -> Option<NaiveDate> {
    let days = if rule.days_of_week.is_empty() {
        WeekdaySet::from_weekdays([rule.anchor_date.weekday()])
    } else {
        rule.days_of_week
    };
    let anchor_week = week_start(rule.anchor_date);
    let mut date = reference.succ_opt()?;

    // At most: finish the current week, jump to the next eligible week, scan it.
    for _ in 0..3 {
        let monday = week_start(date);
        let weeks = monday.signed_duration_since(anchor_week).num_days() / 7;
        let offset = weeks.rem_euclid(interval);
        if offset != 0 {
            date = monday.checked_add_days(Days::new(((interval - offset) * 7) as u64))?;
            continue;
        }
        let sunday = monday.checked_add_days(Days::new(6))?;
        while date <= sunday {
            if days.contains(date.weekday()) {
                return Some(date);
            }
            date = date.succ_opt()?;
        }
    }
    None
}

fn next_monthly(rule: &RecurrenceRule, reference: NaiveDate, interval: i64) -> Option<NaiveDate> {
    let days: Vec<u32> = if rule.days_of_month.is_empty() {
        vec![rule.anchor_date.day()]
    } else {
        rule.days_of_month.days().collect()
    };
    let anchor = month_index(rule.anchor_date);
    let mut index = month_index(reference);
    let offset = (index - anchor).rem_euclid(interval);
    if offset != 0 {
        index += interval - offset;
    }

    // The first eligible month may already be used up; the next one never is.
    for _ in 0..2 {
        let (year, month) = from_month_index(index)?;
        let found = days
            .iter()
            .filter_map(|&day| clamped_date(year, month, day))
            .filter(|date| *date > reference)
            .min();
        if found.is_some() {
            return found;
        }
        index += interval;
    }
    None
}

fn next_yearly(rule: &RecurrenceRule, reference: NaiveDate, interval: i32) -> Option<NaiveDate> {
    let (month, day) = (rule.anchor_date.month(), rule.anchor_date.day());
    let mut year = reference.year();
    let offset = (year - rule.anchor_date.year()).rem_euclid(interval);
    if offset != 0 {
        year = year.checked_add(interval - offset)?;
    }
    for _ in 0..2 {
        if let Some(date) = clamped_date(year, month, day) {
            if date > reference {
                return Some(date);
            }
        }
        year = year.checked_add(interval)?;
    }
    None
}

/// Moves Saturday back to Friday and Sunday forward to Monday.
///
/// Total, idempotent and monotone: `a <= b` implies
/// `skip_weekend(a) <= skip_weekend(b)`.
#[inline]
pub fn skip_weekend(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

/// Applies the rule's weekend policy to a scheduled date.
#[inline]
pub fn due_date_for(rule: &RecurrenceRule, scheduled: NaiveDate) -> NaiveDate {
    if rule.skip_weekends {
        skip_weekend(scheduled)
    } else {
        scheduled
    }
}

/// What the rule does next, evaluated from a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// End date reached or calendar exhausted
    Ended,
    /// A new occurrence with its own due date
    Occurrence(Occurrence),
    /// The weekend policy folded this occurrence onto the due date of the last
    /// created task; the cursor advances but no task is created.
    Coalesced(Occurrence),
}

/// Plans the step after `cursor`, given the due date of the last task created
/// (`None` if there is none yet). Shared by the batch processor and previews
/// so both see the same schedule.
pub fn plan_after(rule: &RecurrenceRule, cursor: NaiveDate, last_due: Option<NaiveDate>) -> NextStep {
    let Some(scheduled) = next_candidate(rule, cursor) else {
        return NextStep::Ended;
    };
    let due = due_date_for(rule, scheduled);
    if rule.end_date.is_some_and(|end| due >= end) {
        return NextStep::Ended;
    }
    let occurrence = Occurrence { scheduled, due };
    if rule.skip_weekends && last_due.is_some_and(|last| due <= last) {
        NextStep::Coalesced(occurrence)
    } else {
        NextStep::Occurrence(occurrence)
    }
}

/// Iterator over the occurrences a rule will produce after its cursor.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    cursor: NaiveDate,
    last_due: Option<NaiveDate>,
    done: bool,
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match plan_after(self.rule, self.cursor, self.last_due) {
                NextStep::Ended => self.done = true,
                NextStep::Coalesced(skipped) => self.cursor = skipped.scheduled,
                NextStep::Occurrence(occurrence) => {
                    self.cursor = occurrence.scheduled;
                    self.last_due = Some(occurrence.due);
                    return Some(occurrence);
                }
            }
        }
        None
    }
}

/// Upcoming occurrences, starting after `rule.last_generated`.
pub fn upcoming(rule: &RecurrenceRule) -> Occurrences<'_> {
    Occurrences {
        rule,
        cursor: rule.last_generated,
        last_due: rule.last_due,
        done: rule.dormant,
    }
}

/// Rejects rule shapes the engine cannot evaluate.
pub fn validate_rule(
    frequency: Frequency,
    interval: u32,
    days_of_week: &WeekdaySet,
    days_of_month: &MonthDaySet,
    anchor: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), CoreError> {
    if interval < 1 {
        return Err(CoreError::InvalidRuleConfiguration(
            "interval must be at least 1".to_string(),
        ));
    }
    if !days_of_week.is_empty() && frequency != Frequency::Weekly {
        return Err(CoreError::InvalidRuleConfiguration(format!(
            "days of week only apply to weekly rules, not {}",
            frequency
        )));
    }
    if !days_of_month.is_empty() && frequency != Frequency::Monthly {
        return Err(CoreError::InvalidRuleConfiguration(format!(
            "days of month only apply to monthly rules, not {}",
            frequency
        )));
    }
    if let Some(end) = end_date {
        if end <= anchor {
            return Err(CoreError::InvalidRuleConfiguration(format!(
                "end date {} must be after the start date {}",
                end, anchor
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly(interval: u32, days: &[u8], anchor: NaiveDate) -> RecurrenceRule {
        let mut rule = RecurrenceRule::new(Frequency::Weekly, interval, anchor);
        rule.days_of_week = WeekdaySet::from_ordinals(days.iter().copied()).unwrap();
        rule
    }

    fn monthly(interval: u32, days: &[u8], anchor: NaiveDate) -> RecurrenceRule {
        let mut rule = RecurrenceRule::new(Frequency::Monthly, interval, anchor);
        rule.days_of_month = MonthDaySet::from_days(days.iter().copied()).unwrap();
        rule
    }

    fn walk(rule: &RecurrenceRule, from: NaiveDate, n: usize) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(n);
        let mut reference = from;
        for _ in 0..n {
            reference = next_candidate(rule, reference).unwrap();
            out.push(reference);
        }
        out
    }

    mod calculator {
        use super::*;

        #[rstest]
        #[case(1, date(2026, 2, 20), date(2026, 2, 21))]
        #[case(3, date(2026, 2, 27), date(2026, 3, 2))]
        #[case(7, date(2026, 12, 28), date(2027, 1, 4))]
        fn daily_adds_interval(#[case] interval: u32, #[case] from: NaiveDate, #[case] expected: NaiveDate) {
            let rule = RecurrenceRule::new(Frequency::Daily, interval, from);
            assert_eq!(next_candidate(&rule, from), Some(expected));
        }

        #[test]
        fn weekly_walks_selected_days() {
            let anchor = date(2026, 2, 20);
            let rule = weekly(1, &[1, 3, 5], anchor);
            assert_eq!(
                walk(&rule, anchor, 4),
                vec![date(2026, 2, 23), date(2026, 2, 25), date(2026, 2, 27), date(2026, 3, 2)]
            );
        }

        #[test]
        fn weekly_interval_skips_off_weeks() {
            // Anchor week starts Monday 2026-02-16; eligible weeks are 16th, Mar 2nd, ...
            let anchor = date(2026, 2, 20);
            let rule = weekly(2, &[2, 4], anchor);
            assert_eq!(
                walk(&rule, anchor, 4),
                vec![date(2026, 3, 3), date(2026, 3, 5), date(2026, 3, 17), date(2026, 3, 19)]
            );
        }

        #[test]
        fn weekly_empty_set_uses_anchor_weekday() {
            let anchor = date(2026, 2, 20); // Friday
            let rule = weekly(1, &[], anchor);
            assert_eq!(walk(&rule, anchor, 2), vec![date(2026, 2, 27), date(2026, 3, 6)]);
        }

        #[test]
        fn weekly_picks_later_day_in_anchor_week() {
            let anchor = date(2026, 2, 17); // Tuesday
            let rule = weekly(3, &[1, 7], anchor);
            // Sunday of the anchor week first, then Monday three weeks on.
            assert_eq!(walk(&rule, anchor, 2), vec![date(2026, 2, 22), date(2026, 3, 9)]);
        }

        #[test]
        fn monthly_clamps_to_short_month() {
            let rule = monthly(1, &[31], date(2026, 1, 31));
            assert_eq!(next_candidate(&rule, date(2026, 4, 10)), Some(date(2026, 4, 30)));
            assert_eq!(next_candidate(&rule, date(2026, 1, 31)), Some(date(2026, 2, 28)));
        }

        #[test]
        fn monthly_walks_multiple_days() {
            let rule = monthly(1, &[15, 1], date(2026, 1, 1));
            assert_eq!(
                walk(&rule, date(2026, 1, 1), 3),
                vec![date(2026, 1, 15), date(2026, 2, 1), date(2026, 2, 15)]
            );
        }

        #[test]
        fn monthly_interval_counts_from_anchor_month() {
            let rule = monthly(3, &[10], date(2026, 1, 10));
            assert_eq!(
                walk(&rule, date(2026, 1, 10), 3),
                vec![date(2026, 4, 10), date(2026, 7, 10), date(2026, 10, 10)]
            );
        }

        #[test]
        fn monthly_empty_set_keeps_anchor_day() {
            let anchor = date(2026, 1, 31);
            let rule = monthly(1, &[], anchor);
            assert_eq!(
                walk(&rule, anchor, 3),
                vec![date(2026, 2, 28), date(2026, 3, 31), date(2026, 4, 30)]
            );
        }

        #[test]
        fn monthly_clamping_collapses_duplicates() {
            let rule = monthly(1, &[29, 30, 31], date(2026, 2, 1));
            assert_eq!(
                walk(&rule, date(2026, 2, 1), 2),
                vec![date(2026, 2, 28), date(2026, 3, 29)]
            );
        }

        #[test]
        fn yearly_leap_day_clamps_then_returns() {
            let anchor = date(2024, 2, 29);
            let rule = RecurrenceRule::new(Frequency::Yearly, 1, anchor);
            assert_eq!(
                walk(&rule, anchor, 4),
                vec![date(2025, 2, 28), date(2026, 2, 28), date(2027, 2, 28), date(2028, 2, 29)]
            );
        }

        #[test]
        fn yearly_interval() {
            let anchor = date(2026, 7, 4);
            let rule = RecurrenceRule::new(Frequency::Yearly, 2, anchor);
            assert_eq!(walk(&rule, anchor, 2), vec![date(2028, 7, 4), date(2030, 7, 4)]);
        }

        #[test]
        fn calendar_overflow_is_none() {
            let rule = RecurrenceRule::new(Frequency::Daily, 10, NaiveDate::MAX);
            assert_eq!(next_candidate(&rule, NaiveDate::MAX), None);
        }
    }

    mod weekend_policy {
        use super::*;

        #[rstest]
        #[case(date(2026, 2, 21), date(2026, 2, 20))]
        #[case(date(2026, 2, 22), date(2026, 2, 23))]
        #[case(date(2026, 2, 24), date(2026, 2, 24))]
        fn shifts_weekends(#[case] input: NaiveDate, #[case] expected: NaiveDate) {
            assert_eq!(skip_weekend(input), expected);
        }

        #[test]
        fn daily_rule_coalesces_saturday_onto_friday() {
            let anchor = date(2026, 2, 19); // Thursday
            let mut rule = RecurrenceRule::new(Frequency::Daily, 1, anchor);
            rule.skip_weekends = true;
            let dues: Vec<NaiveDate> = upcoming(&rule).take(3).map(|o| o.due).collect();
            assert_eq!(dues, vec![date(2026, 2, 20), date(2026, 2, 23), date(2026, 2, 24)]);
            assert_eq!(
                plan_after(&rule, date(2026, 2, 20), Some(date(2026, 2, 20))),
                NextStep::Coalesced(Occurrence { scheduled: date(2026, 2, 21), due: date(2026, 2, 20) })
            );
        }

        #[test]
        fn sunday_anchor_still_yields_monday() {
            let anchor = date(2026, 2, 22); // Sunday
            let mut rule = RecurrenceRule::new(Frequency::Daily, 1, anchor);
            rule.skip_weekends = true;
            assert_eq!(
                plan_after(&rule, anchor, None),
                NextStep::Occurrence(Occurrence { scheduled: date(2026, 2, 23), due: date(2026, 2, 23) })
            );
            let dues: Vec<NaiveDate> = upcoming(&rule).take(2).map(|o| o.due).collect();
            assert_eq!(dues, vec![date(2026, 2, 23), date(2026, 2, 24)]);
        }

        #[test]
        fn enabling_policy_after_a_sunday_task_keeps_monday() {
            // Sunday the 22nd was generated while the policy was off.
            let mut rule = RecurrenceRule::new(Frequency::Daily, 1, date(2026, 2, 20));
            rule.last_generated = date(2026, 2, 22);
            rule.last_due = Some(date(2026, 2, 22));
            rule.skip_weekends = true;
            assert_eq!(upcoming(&rule).next().map(|o| o.due), Some(date(2026, 2, 23)));
        }
    }

    mod planning {
        use super::*;

        #[test]
        fn end_date_is_exclusive() {
            let anchor = date(2026, 3, 1);
            let mut rule = RecurrenceRule::new(Frequency::Daily, 1, anchor);
            rule.end_date = Some(date(2026, 3, 4));
            let dues: Vec<NaiveDate> = upcoming(&rule).map(|o| o.due).collect();
            assert_eq!(dues, vec![date(2026, 3, 2), date(2026, 3, 3)]);
            assert_eq!(plan_after(&rule, date(2026, 3, 3), None), NextStep::Ended);
        }

        #[test]
        fn dormant_rule_has_no_upcoming() {
            let mut rule = RecurrenceRule::new(Frequency::Daily, 1, date(2026, 3, 1));
            rule.dormant = true;
            assert_eq!(upcoming(&rule).next(), None);
        }

        #[rstest]
        #[case(Frequency::Daily, 0, &[], &[])]
        #[case(Frequency::Daily, 1, &[1], &[])]
        #[case(Frequency::Weekly, 1, &[], &[10])]
        #[case(Frequency::Yearly, 1, &[], &[1])]
        fn invalid_shapes_are_rejected(
            #[case] frequency: Frequency,
            #[case] interval: u32,
            #[case] dow: &[u8],
            #[case] dom: &[u8],
        ) {
            let result = validate_rule(
                frequency,
                interval,
                &WeekdaySet::from_ordinals(dow.iter().copied()).unwrap(),
                &MonthDaySet::from_days(dom.iter().copied()).unwrap(),
                date(2026, 1, 1),
                None,
            );
            assert!(matches!(result, Err(CoreError::InvalidRuleConfiguration(_))));
        }

        #[test]
        fn end_before_start_is_rejected() {
            let result = validate_rule(
                Frequency::Daily,
                1,
                &WeekdaySet::new(),
                &MonthDaySet::new(),
                date(2026, 1, 1),
                Some(date(2026, 1, 1)),
            );
            assert!(result.is_err());
        }
    }

    fn any_date() -> impl Strategy<Value = NaiveDate> {
        (0u64..40_000).prop_map(|offset| date(1990, 1, 1) + Days::new(offset))
    }

    fn any_frequency() -> impl Strategy<Value = Frequency> {
        prop_oneof![
            Just(Frequency::Daily),
            Just(Frequency::Weekly),
            Just(Frequency::Monthly),
            Just(Frequency::Yearly),
        ]
    }

    proptest! {
        #[test]
        fn daily_is_reference_plus_interval(anchor in any_date(), offset in 0u64..500, interval in 1u32..60) {
            let rule = RecurrenceRule::new(Frequency::Daily, interval, anchor);
            let reference = anchor + Days::new(offset);
            prop_assert_eq!(next_candidate(&rule, reference), Some(reference + Days::new(interval as u64)));
        }

        #[test]
        fn weekly_lands_on_selected_day(
            anchor in any_date(),
            offset in 0u64..400,
            interval in 1u32..6,
            days in proptest::collection::vec(1u8..=7, 0..4),
        ) {
            let rule = weekly(interval, &days, anchor);
            let reference = anchor + Days::new(offset);
            let next = next_candidate(&rule, reference).unwrap();
            prop_assert!(next > reference);
            if days.is_empty() {
                prop_assert_eq!(next.weekday(), anchor.weekday());
            } else {
                prop_assert!(days.contains(&(next.weekday().number_from_monday() as u8)));
            }
            let weeks = week_start(next).signed_duration_since(week_start(anchor)).num_days() / 7;
            prop_assert_eq!(weeks % interval as i64, 0);
        }

        #[test]
        fn candidates_are_strictly_increasing(
            frequency in any_frequency(),
            anchor in any_date(),
            interval in 1u32..5,
            days in proptest::collection::vec(1u8..=28, 0..3),
        ) {
            let mut rule = RecurrenceRule::new(frequency, interval, anchor);
            match frequency {
                Frequency::Weekly => rule.days_of_week = WeekdaySet::from_ordinals(days.iter().map(|d| (d % 7) + 1)).unwrap(),
                Frequency::Monthly => rule.days_of_month = MonthDaySet::from_days(days.iter().copied()).unwrap(),
                _ => {}
            }
            let mut reference = anchor;
            for _ in 0..12 {
                let next = next_candidate(&rule, reference).unwrap();
                prop_assert!(next > reference);
                reference = next;
            }
        }

        #[test]
        fn skip_weekend_is_idempotent_and_monotone(a in any_date(), gap in 0u64..10) {
            let b = a + Days::new(gap);
            let once = skip_weekend(a);
            prop_assert_eq!(skip_weekend(once), once);
            prop_assert!(!matches!(once.weekday(), Weekday::Sat | Weekday::Sun));
            prop_assert!(skip_weekend(a) <= skip_weekend(b));
        }

        #[test]
        fn nothing_due_on_or_after_end(
            frequency in any_frequency(),
            anchor in any_date(),
            span in 1u64..800,
            skip in any::<bool>(),
        ) {
            let mut rule = RecurrenceRule::new(frequency, 1, anchor);
            rule.skip_weekends = skip;
            let end = anchor + Days::new(span);
            rule.end_date = Some(end);
            for occurrence in upcoming(&rule).take(1000) {
                prop_assert!(occurrence.due < end);
            }
        }

        #[test]
        fn shifted_due_dates_strictly_increase(
            frequency in any_frequency(),
            anchor in any_date(),
            interval in 1u32..4,
        ) {
            let mut rule = RecurrenceRule::new(frequency, interval, anchor);
            rule.skip_weekends = true;
            let dues: Vec<NaiveDate> = upcoming(&rule).take(30).map(|o| o.due).collect();
            prop_assert!(dues.windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert!(dues.iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        }
    }
}
