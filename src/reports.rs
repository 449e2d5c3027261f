use crate::aggregate::{
    aggregate, correlation, reorder_weekdays, select, top_rows, AggregationRequest,
    Correlation, SortOrder, Stat,
};
use crate::config::PipelineConfig;
use crate::error::InvalidColumnError;
use crate::types::{Outcome, Table};
use serde::Serialize;
use tracing::{debug, info};

/// One part of the canned report.
///
/// A section whose inputs are absent says which columns it lacked instead
/// of failing the whole report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    MissingColumns(Vec<String>),
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(v) => Some(v),
            Section::MissingColumns(_) => None,
        }
    }

    /// Message for the user when the section could not be built.
    pub fn notice(&self) -> Option<String> {
        match self {
            Section::Ready(_) => None,
            Section::MissingColumns(cols) => Some(format!("column(s) missing: {}", cols.join(", "))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSections {
    pub top_teams: Section<Table>,
    pub weekday_means: Section<Table>,
    pub top_slots: Section<Table>,
    pub top_participation: Section<Table>,
    pub top_satisfaction: Section<Table>,
    pub bottom_weekdays: Section<Table>,
    pub promotion_vs_attendees: Section<Correlation>,
    pub reaction_vs_attendees: Section<Correlation>,
}

impl ReportSections {
    /// Table sections with a stable identifier, in report order.
    pub fn tables(&self) -> [(&'static str, &Section<Table>); 6] {
        [
            ("top_teams", &self.top_teams),
            ("weekday_means", &self.weekday_means),
            ("top_slots", &self.top_slots),
            ("top_participation", &self.top_participation),
            ("top_satisfaction", &self.top_satisfaction),
            ("bottom_weekdays", &self.bottom_weekdays),
        ]
    }

    pub fn correlations(&self) -> [(&'static str, &Section<Correlation>); 2] {
        [
            ("promotion_vs_attendees", &self.promotion_vs_attendees),
            ("reaction_vs_attendees", &self.reaction_vs_attendees),
        ]
    }
}

fn section<T, F>(table: &Table, required: &[&str], build: F) -> Section<T>
where
    F: FnOnce() -> Result<T, InvalidColumnError>,
{
    let missing = table.missing_columns(required);
    if !missing.is_empty() {
        debug!("report section skipped, missing {:?}", missing);
        return Section::MissingColumns(missing);
    }
    match build() {
        Ok(v) => Section::Ready(v),
        Err(e) => Section::MissingColumns(vec![e.column]),
    }
}

/// Run the fixed battery of summaries over the current view.
pub fn compose(table: &Table, config: &PipelineConfig) -> Outcome<ReportSections> {
    let c = &config.columns;
    let attendees = c.attendees.as_str();
    let top_n = config.report_top_n;
    let mut out = Outcome::new(());

    let mut ranked = |group: &str, n: usize, order: SortOrder| {
        section(table, &[group, attendees], || {
            let request = AggregationRequest::ranking(group, attendees, n, order).configured(config);
            aggregate(table, &request).map(|o| out.absorb(o))
        })
    };
    let top_teams = ranked(c.team.as_str(), top_n, SortOrder::Descending);
    let top_slots = ranked(c.time_slot.as_str(), top_n, SortOrder::Descending);
    let bottom_weekdays = ranked(c.weekday.as_str(), config.report_bottom_n, SortOrder::Ascending);

    let weekday = c.weekday.as_str();
    let weekday_means = section(table, &[weekday, attendees], || {
        let request = AggregationRequest::new(attendees, &[weekday], &[Stat::Mean, Stat::Count])
            .configured(config);
        aggregate(table, &request).map(|o| reorder_weekdays(&out.absorb(o)))
    });

    let leaders = |rate: &str| {
        section(table, &[rate], || {
            let rows = top_rows(table, rate, top_n, SortOrder::Descending)?;
            Ok(select(
                &rows,
                &[c.event_name.as_str(), c.date.as_str(), c.team.as_str(), rate],
            ))
        })
    };
    let top_participation = leaders(c.participation_rate.as_str());
    let top_satisfaction = leaders(c.satisfaction_rate.as_str());

    let correlate = |a: &str, b: &str| {
        section(table, &[a, b], || {
            correlation(table, a, b, config.min_correlation_points)
        })
    };
    let promotion_vs_attendees = correlate(c.promotions.as_str(), attendees);
    let reaction_vs_attendees = correlate(c.reaction_rate.as_str(), attendees);

    let report = ReportSections {
        top_teams,
        weekday_means,
        top_slots,
        top_participation,
        top_satisfaction,
        bottom_weekdays,
        promotion_vs_attendees,
        reaction_vs_attendees,
    };
    let ready = report.tables().iter().filter(|(_, s)| s.ready().is_some()).count()
        + report
            .correlations()
            .iter()
            .filter(|(_, s)| s.ready().is_some())
            .count();
    info!("report composed: {} of 8 section(s) available", ready);
    out.map(|_| report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use pretty_assertions::assert_eq;

    fn table(cols: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::with_rows(cols.iter().map(|s| s.to_string()).collect(), rows)
    }

    #[test]
    fn missing_columns_degrade_per_section() {
        let t = table(
            &["チーム", "参加者数"],
            vec![
                vec!["A".into(), Value::Int(10)],
                vec!["B".into(), Value::Int(20)],
            ],
        );
        let report = compose(&t, &PipelineConfig::default()).value;
        let teams = report.top_teams.ready().unwrap();
        assert_eq!(teams.rows()[0][0], Value::from("B"));
        assert_eq!(
            report.weekday_means,
            Section::MissingColumns(vec!["曜日".to_string()])
        );
        assert_eq!(
            report.promotion_vs_attendees.notice().unwrap(),
            "column(s) missing: 告知回数"
        );
        assert!(report.top_participation.ready().is_none());
    }

    #[test]
    fn weekday_sections_use_canonical_order() {
        let t = table(
            &["曜日", "参加者数"],
            vec![
                vec!["金".into(), Value::Int(1)],
                vec!["月".into(), Value::Int(9)],
                vec!["水".into(), Value::Int(5)],
                vec!["火".into(), Value::Int(3)],
            ],
        );
        let report = compose(&t, &PipelineConfig::default()).value;
        let order: Vec<String> = report
            .weekday_means
            .ready()
            .unwrap()
            .rows()
            .iter()
            .map(|r| r[0].to_string())
            .collect();
        assert_eq!(order, vec!["月", "火", "水", "金"]);
        let bottom: Vec<String> = report
            .bottom_weekdays
            .ready()
            .unwrap()
            .rows()
            .iter()
            .map(|r| r[0].to_string())
            .collect();
        assert_eq!(bottom, vec!["金", "火", "水"]);
    }

    #[test]
    fn configured_outlier_exclusion_reaches_rankings() {
        let mut rows: Vec<Vec<Value>> = (0..20)
            .map(|i| vec![if i % 2 == 0 { "A" } else { "B" }.into(), Value::Int(10 + i % 3)])
            .collect();
        rows.push(vec!["C".into(), Value::Int(1000)]);
        let t = table(&["チーム", "参加者数"], rows);

        let report = compose(&t, &PipelineConfig::default()).value;
        assert_eq!(report.top_teams.ready().unwrap().rows()[0][0], Value::from("C"));

        let config = PipelineConfig {
            exclude_outliers: true,
            ..PipelineConfig::default()
        };
        let teams = compose(&t, &config).value.top_teams.ready().unwrap().clone();
        assert_eq!(teams.len(), 2);
        assert!(teams.rows().iter().all(|r| r[0] != Value::from("C")));
    }

    #[test]
    fn leaders_keep_identifying_columns() {
        let t = table(
            &["イベント名", "参加率", "メモ"],
            vec![
                vec!["朝会".into(), Value::Float(50.0), "x".into()],
                vec!["夕会".into(), Value::Float(90.0), "y".into()],
                vec!["昼会".into(), Value::Missing, "z".into()],
            ],
        );
        let report = compose(&t, &PipelineConfig::default()).value;
        let top = report.top_participation.ready().unwrap();
        assert_eq!(top.columns(), &["イベント名".to_string(), "参加率".into()][..]);
        assert_eq!(top.len(), 2);
        assert_eq!(top.rows()[0][0], Value::from("夕会"));
    }
}
