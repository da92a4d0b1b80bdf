//! Pipeline KPI aggregation.
//!
//! Reduces a lead collection into the statistics shown on the sales
//! dashboards. Everything here is a pure function over already-fetched
//! records.
//!
//! Rates are kept as raw `f64` ratios in `[0, 1]`; rounding to whole
//! percents only happens in [`PipelineKpis::display`]. Every ratio falls
//! back to `0` when its denominator is zero, so an empty collection yields
//! a well-formed, all-zero result.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lead::{PipelineRecord, Temperature, ALL_TEMPERATURES};
use crate::pipeline::{LeadStage, ALL_STAGES};
use crate::types::{Money, Timestamp};
use crate::visibility::LeadScope;

// ---------------------------------------------------------------------------
// Time windows
// ---------------------------------------------------------------------------

/// Creation-date window applied before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[default]
    #[serde(rename = "all")]
    AllTime,
}

/// Every window, in the order a UI should offer them.
pub const ALL_WINDOWS: [TimeWindow; 4] = [
    TimeWindow::Last7Days,
    TimeWindow::Last30Days,
    TimeWindow::Last90Days,
    TimeWindow::AllTime,
];

impl TimeWindow {
    /// Query-string / wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Last7Days => "7d",
            TimeWindow::Last30Days => "30d",
            TimeWindow::Last90Days => "90d",
            TimeWindow::AllTime => "all",
        }
    }

    /// Length of the window in days, `None` for all time.
    pub const fn days(self) -> Option<i64> {
        match self {
            TimeWindow::Last7Days => Some(7),
            TimeWindow::Last30Days => Some(30),
            TimeWindow::Last90Days => Some(90),
            TimeWindow::AllTime => None,
        }
    }

    /// Inclusive lower bound on `created_at`, relative to `now`.
    pub fn since(self, now: Timestamp) -> Option<Timestamp> {
        self.days().map(|d| now - Duration::days(d))
    }

    /// Same predicate as the lead list: only the lower bound applies, so a
    /// row stamped slightly ahead of `now` by another clock still counts.
    pub fn contains(self, created_at: Timestamp, now: Timestamp) -> bool {
        self.since(now).map_or(true, |since| created_at >= since)
    }
}

impl FromStr for TimeWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_WINDOWS
            .iter()
            .copied()
            .find(|window| window.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown window '{s}'; expected one of 7d, 30d, 90d, all"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Count and share of actionable leads at one temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureShare {
    pub count: i64,
    /// Fraction of actionable (non-terminal) leads, in `[0, 1]`.
    pub share: f64,
}

/// Aggregated statistics over a visible lead collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineKpis {
    /// Lead count per stage. Always holds all nine stages.
    pub stage_counts: BTreeMap<LeadStage, i64>,
    /// Sum of `ca` per stage. Always holds all nine stages.
    pub stage_ca: BTreeMap<LeadStage, Money>,
    pub total_leads: i64,
    pub closed_count: i64,
    pub lost_count: i64,
    /// `closed_count / total_leads`.
    pub conversion_rate: f64,
    /// Attended appointments over appointments with a known outcome.
    pub show_up_rate: f64,
    /// Mean `ca` of won leads.
    pub average_deal_size: Money,
    /// Leads not yet won or lost.
    pub actionable_leads: i64,
    /// Temperature breakdown over actionable leads only.
    pub temperature: BTreeMap<Temperature, TemperatureShare>,
}

/// Presentation view: ratios rounded to whole percents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDisplay {
    pub conversion_pct: i64,
    pub show_up_pct: i64,
    pub average_deal_size: Money,
    pub temperature_pct: BTreeMap<Temperature, i64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Round a `[0, 1]` ratio to a whole percent for display.
pub fn round_percent(ratio: f64) -> i64 {
    if !ratio.is_finite() {
        return 0;
    }
    (ratio * 100.0).round() as i64
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Reduce `records` into [`PipelineKpis`].
///
/// The caller is responsible for visibility; see [`aggregate_scoped`].
pub fn aggregate<'a, R>(records: impl IntoIterator<Item = &'a R>) -> PipelineKpis
where
    R: PipelineRecord + 'a,
{
    let mut stage_counts: BTreeMap<LeadStage, i64> =
        ALL_STAGES.iter().map(|s| (*s, 0)).collect();
    let mut stage_ca: BTreeMap<LeadStage, Money> =
        ALL_STAGES.iter().map(|s| (*s, Money::ZERO)).collect();
    let mut temperature_counts: BTreeMap<Temperature, i64> =
        ALL_TEMPERATURES.iter().map(|t| (*t, 0)).collect();

    let mut total_leads = 0_i64;
    let mut show_up_known = 0_i64;
    let mut show_up_attended = 0_i64;
    let mut actionable_leads = 0_i64;

    for record in records {
        let stage = record.stage();
        total_leads += 1;
        *stage_counts.entry(stage).or_default() += 1;
        *stage_ca.entry(stage).or_default() += record.ca();

        if let Some(attended) = record.show_up() {
            show_up_known += 1;
            if attended {
                show_up_attended += 1;
            }
        }

        if !stage.is_terminal() {
            actionable_leads += 1;
            *temperature_counts.entry(record.temperature()).or_default() += 1;
        }
    }

    let closed_count = stage_counts[&LeadStage::Close];
    let lost_count = stage_counts[&LeadStage::Perdu];
    let closed_ca = stage_ca[&LeadStage::Close];

    let average_deal_size = if closed_count == 0 {
        Money::ZERO
    } else {
        closed_ca / Money::from(closed_count)
    };

    let temperature = temperature_counts
        .into_iter()
        .map(|(t, count)| {
            (
                t,
                TemperatureShare {
                    count,
                    share: ratio(count, actionable_leads),
                },
            )
        })
        .collect();

    PipelineKpis {
        stage_counts,
        stage_ca,
        total_leads,
        closed_count,
        lost_count,
        conversion_rate: ratio(closed_count, total_leads),
        show_up_rate: ratio(show_up_attended, show_up_known),
        average_deal_size,
        actionable_leads,
        temperature,
    }
}

/// Apply the visibility scope, then the creation window, then aggregate.
///
/// Filtering always happens before any reduction, so the result only
/// reflects leads the actor is allowed to see.
pub fn aggregate_scoped<R: PipelineRecord>(
    records: &[R],
    scope: &LeadScope,
    window: TimeWindow,
    now: Timestamp,
) -> PipelineKpis {
    aggregate(
        records
            .iter()
            .filter(|r| scope.permits(*r))
            .filter(|r| window.contains(r.created_at(), now)),
    )
}

impl PipelineKpis {
    /// Rounded presentation values. The raw ratios stay untouched.
    pub fn display(&self) -> KpiDisplay {
        KpiDisplay {
            conversion_pct: round_percent(self.conversion_rate),
            show_up_pct: round_percent(self.show_up_rate),
            average_deal_size: self.average_deal_size.round_dp(2),
            temperature_pct: self
                .temperature
                .iter()
                .map(|(t, share)| (*t, round_percent(share.share)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::DbId;

    #[derive(Clone)]
    struct Row {
        stage: LeadStage,
        ca: Decimal,
        show_up: Option<bool>,
        temperature: Temperature,
        created_at: Timestamp,
        closer: Option<DbId>,
        setter: Option<DbId>,
    }

    impl PipelineRecord for Row {
        fn stage(&self) -> LeadStage {
            self.stage
        }
        fn ca(&self) -> Decimal {
            self.ca
        }
        fn show_up(&self) -> Option<bool> {
            self.show_up
        }
        fn temperature(&self) -> Temperature {
            self.temperature
        }
        fn created_at(&self) -> Timestamp {
            self.created_at
        }
        fn closer_id(&self) -> Option<DbId> {
            self.closer
        }
        fn setter_id(&self) -> Option<DbId> {
            self.setter
        }
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn row(stage: LeadStage, ca: i64) -> Row {
        Row {
            stage,
            ca: Decimal::from(ca),
            show_up: None,
            temperature: Temperature::Warm,
            created_at: now() - Duration::days(1),
            closer: None,
            setter: None,
        }
    }

    fn mixed() -> Vec<Row> {
        vec![
            Row { temperature: Temperature::Hot, ..row(LeadStage::Nouveau, 1_000) },
            Row { show_up: Some(true), ..row(LeadStage::RdvEffectue, 2_500) },
            Row { show_up: Some(false), ..row(LeadStage::RdvPlanifie, 700) },
            Row { show_up: Some(true), ..row(LeadStage::Close, 5_000) },
            Row { show_up: Some(true), ..row(LeadStage::Close, 3_000) },
            row(LeadStage::Perdu, 0),
            Row { temperature: Temperature::Cold, ..row(LeadStage::Proposition, 1_200) },
        ]
    }

    #[test]
    fn scenario_one_new_closed_lost() {
        let leads = vec![
            row(LeadStage::Nouveau, 1_000),
            row(LeadStage::Close, 5_000),
            row(LeadStage::Perdu, 0),
        ];
        let kpis = aggregate(&leads);
        assert_eq!(kpis.total_leads, 3);
        assert_eq!(kpis.closed_count, 1);
        assert_eq!(kpis.lost_count, 1);
        assert!((kpis.conversion_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(kpis.average_deal_size, Decimal::from(5_000));
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let kpis = aggregate::<Row>(&[]);
        assert_eq!(kpis.total_leads, 0);
        assert_eq!(kpis.closed_count, 0);
        assert_eq!(kpis.conversion_rate, 0.0);
        assert_eq!(kpis.show_up_rate, 0.0);
        assert_eq!(kpis.average_deal_size, Decimal::ZERO);
        assert_eq!(kpis.stage_counts.len(), 9);
        assert!(kpis.stage_counts.values().all(|c| *c == 0));
        assert!(kpis.temperature.values().all(|t| t.count == 0 && t.share == 0.0));
    }

    #[test]
    fn rates_are_zero_when_only_their_denominator_is_zero() {
        // Leads exist, but none is closed and no appointment outcome is known.
        let leads = vec![row(LeadStage::Qualifie, 400), row(LeadStage::Contacte, 0)];
        let kpis = aggregate(&leads);
        assert_eq!(kpis.total_leads, 2);
        assert_eq!(kpis.show_up_rate, 0.0);
        assert_eq!(kpis.average_deal_size, Decimal::ZERO);
        assert!(kpis.conversion_rate.is_finite());
    }

    #[test]
    fn stage_counts_sum_to_total() {
        let kpis = aggregate(&mixed());
        assert_eq!(kpis.stage_counts.values().sum::<i64>(), kpis.total_leads);
        assert_eq!(kpis.total_leads, 7);
    }

    #[test]
    fn stage_ca_sums_to_total_ca() {
        let leads = mixed();
        let kpis = aggregate(&leads);
        let by_stage: Decimal = kpis.stage_ca.values().copied().sum();
        let total: Decimal = leads.iter().map(|l| l.ca).sum();
        assert_eq!(by_stage, total);
        assert_eq!(kpis.stage_ca[&LeadStage::Close], Decimal::from(8_000));
    }

    #[test]
    fn ca_moves_with_the_lead_stage() {
        let mut leads = vec![row(LeadStage::Proposition, 900)];
        let before = aggregate(&leads);
        assert_eq!(before.stage_ca[&LeadStage::Proposition], Decimal::from(900));

        leads[0].stage = LeadStage::Negocie;
        let after = aggregate(&leads);
        assert_eq!(after.stage_ca[&LeadStage::Proposition], Decimal::ZERO);
        assert_eq!(after.stage_ca[&LeadStage::Negocie], Decimal::from(900));
    }

    #[test]
    fn unknown_show_up_is_excluded_from_the_rate() {
        let leads = vec![
            Row { show_up: Some(true), ..row(LeadStage::RdvEffectue, 0) },
            Row { show_up: None, ..row(LeadStage::RdvPlanifie, 0) },
            Row { show_up: Some(false), ..row(LeadStage::RdvPlanifie, 0) },
        ];
        let kpis = aggregate(&leads);
        assert_eq!(kpis.show_up_rate, 0.5);
    }

    #[test]
    fn average_deal_size_uses_closed_leads_only() {
        let kpis = aggregate(&mixed());
        assert_eq!(kpis.closed_count, 2);
        assert_eq!(kpis.average_deal_size, Decimal::from(4_000));
    }

    #[test]
    fn temperature_breakdown_ignores_terminal_leads() {
        let kpis = aggregate(&mixed());
        // 5 open leads: 1 HOT, 3 WARM, 1 COLD.
        assert_eq!(kpis.actionable_leads, 5);
        assert_eq!(kpis.temperature[&Temperature::Hot].count, 1);
        assert_eq!(kpis.temperature[&Temperature::Warm].count, 3);
        assert_eq!(kpis.temperature[&Temperature::Cold].count, 1);
        assert!((kpis.temperature[&Temperature::Warm].share - 0.6).abs() < 1e-12);
    }

    #[test]
    fn scoped_aggregate_only_counts_visible_leads() {
        let leads = vec![
            Row { closer: Some(1), ..row(LeadStage::Close, 5_000) },
            Row { closer: Some(1), ..row(LeadStage::Nouveau, 100) },
            Row { closer: Some(2), ..row(LeadStage::Close, 9_000) },
            Row { closer: Some(2), ..row(LeadStage::Close, 9_000) },
        ];
        let kpis = aggregate_scoped(&leads, &LeadScope::Closer(1), TimeWindow::AllTime, now());
        assert_eq!(kpis.total_leads, 2);
        assert_eq!(kpis.closed_count, 1);
        assert_eq!(kpis.conversion_rate, 0.5);
        assert_eq!(kpis.average_deal_size, Decimal::from(5_000));
    }

    #[test]
    fn time_window_filters_on_creation_date() {
        let leads = vec![
            Row { created_at: now() - Duration::days(3), ..row(LeadStage::Nouveau, 1) },
            Row { created_at: now() - Duration::days(20), ..row(LeadStage::Nouveau, 1) },
            Row { created_at: now() - Duration::days(60), ..row(LeadStage::Nouveau, 1) },
            Row { created_at: now() - Duration::days(400), ..row(LeadStage::Nouveau, 1) },
        ];
        let count = |w| aggregate_scoped(&leads, &LeadScope::All, w, now()).total_leads;
        assert_eq!(count(TimeWindow::Last7Days), 1);
        assert_eq!(count(TimeWindow::Last30Days), 2);
        assert_eq!(count(TimeWindow::Last90Days), 3);
        assert_eq!(count(TimeWindow::AllTime), 4);
    }

    #[test]
    fn lead_stamped_ahead_of_now_is_inside_every_window() {
        let ahead = now() + Duration::seconds(2);
        for window in [TimeWindow::Last7Days, TimeWindow::Last30Days, TimeWindow::AllTime] {
            assert!(window.contains(ahead, now()), "{window:?}");
        }
        let leads = vec![Row { created_at: ahead, ..row(LeadStage::Nouveau, 1) }];
        let kpis = aggregate_scoped(&leads, &LeadScope::All, TimeWindow::Last7Days, now());
        assert_eq!(kpis.total_leads, 1);
    }

    #[test]
    fn display_rounds_without_touching_raw_ratios() {
        let leads = vec![
            row(LeadStage::Nouveau, 1_000),
            row(LeadStage::Close, 5_000),
            row(LeadStage::Perdu, 0),
        ];
        let kpis = aggregate(&leads);
        let display = kpis.display();
        assert_eq!(display.conversion_pct, 33);
        assert!((kpis.conversion_rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn round_percent_handles_edges() {
        assert_eq!(round_percent(0.0), 0);
        assert_eq!(round_percent(1.0), 100);
        assert_eq!(round_percent(0.666), 67);
        assert_eq!(round_percent(f64::NAN), 0);
    }

    #[test]
    fn time_window_deserializes_from_short_names() {
        let w: TimeWindow = serde_json::from_str("\"30d\"").unwrap();
        assert_eq!(w, TimeWindow::Last30Days);
        assert!(serde_json::from_str::<TimeWindow>("\"14d\"").is_err());
    }

    #[test]
    fn time_window_parses_the_same_names_it_serializes() {
        for window in ALL_WINDOWS {
            assert_eq!(window.as_str().parse::<TimeWindow>().unwrap(), window);
            assert_eq!(serde_json::to_value(window).unwrap(), window.as_str());
        }
        assert_matches::assert_matches!(
            "14d".parse::<TimeWindow>(),
            Err(CoreError::Validation(msg)) if msg.contains("14d")
        );
    }

    #[test]
    fn kpis_serialize_stage_keys_by_name() {
        let kpis = aggregate(&mixed());
        let json = serde_json::to_value(&kpis).unwrap();
        assert_eq!(json["stage_counts"]["RDV_PLANIFIE"], 1);
        assert_eq!(json["stage_counts"]["CLOSE"], 2);
        assert_eq!(json["temperature"]["HOT"]["count"], 1);
    }
}
