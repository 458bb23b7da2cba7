//! Schedules to time objects.
//!
//! Recurring schedules are cut into chunks of at most three hour ranges, the
//! most a Check Point time object holds. Weekly schedules produce one time
//! object per weekday and chunk.

use chrono::NaiveDateTime;

use crate::objects::{CpObject, HourRange, ObjectKind, Recurrence, TimeSpec};
use crate::scope::ConversionScope;
use crate::source::{ScheduleEntry, ScheduleKind};

const MAX_HOUR_RANGES: usize = 3;
const DATE_FORMAT: &str = "%Y/%m/%d@%H:%M";

pub fn convert_schedules(scope: &mut ConversionScope<'_>, entries: &[ScheduleEntry]) {
    for entry in entries {
        let specs = match &entry.kind {
            ScheduleKind::Daily(members) => recurring(Recurrence::Daily, members),
            ScheduleKind::Weekly(days) => days
                .iter()
                .flat_map(|(day, members)| recurring(Recurrence::Weekly(*day), members))
                .collect(),
            ScheduleKind::NonRecurring(members) => members
                .iter()
                .filter_map(|member| absolute(scope, &entry.meta.name, member))
                .collect(),
            ScheduleKind::Empty => Vec::new(),
        };

        if specs.is_empty() {
            scope.warn(format!(
                "{} schedule has no usable time ranges and was not converted",
                entry.meta.name
            ));
            continue;
        }

        for spec in specs {
            let name = scope.issue_time_name(&entry.meta.name);
            let object = CpObject::new(name, ObjectKind::Time(spec))
                .with_comments(entry.meta.description.as_deref())
                .with_tags(entry.meta.tags.iter().cloned());
            let target = scope.base.insert(object);
            scope
                .base
                .schedules
                .entry(entry.meta.name.clone())
                .or_default()
                .push(target);
        }
    }
}

fn recurring(recurrence: Recurrence, members: &[String]) -> Vec<TimeSpec> {
    members
        .chunks(MAX_HOUR_RANGES)
        .map(|chunk| TimeSpec::Recurring {
            recurrence,
            hour_ranges: chunk
                .iter()
                .filter_map(|range| range.split_once('-'))
                .map(|(from, to)| HourRange {
                    from: from.trim().to_string(),
                    to: to.trim().to_string(),
                })
                .collect(),
        })
        .collect()
}

fn absolute(scope: &mut ConversionScope<'_>, name: &str, member: &str) -> Option<TimeSpec> {
    let (start, end) = member.split_once('-')?;
    let parsed = NaiveDateTime::parse_from_str(start.trim(), DATE_FORMAT)
        .and_then(|start| Ok((start, NaiveDateTime::parse_from_str(end.trim(), DATE_FORMAT)?)));
    match parsed {
        Ok((start, end)) => Some(TimeSpec::Absolute { start, end }),
        Err(err) => {
            scope.warn(format!(
                "{name} schedule contains invalid date range {member}: {err}"
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;
    use crate::source::EntryMeta;
    use chrono::Weekday;
    use pretty_assertions::assert_eq;

    fn schedule(name: &str, kind: ScheduleKind) -> ScheduleEntry {
        ScheduleEntry {
            meta: EntryMeta {
                name: name.to_string(),
                ..EntryMeta::default()
            },
            kind,
        }
    }

    fn ranges(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn weekly_schedule_explodes_per_day_and_chunk() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let work = schedule(
            "work",
            ScheduleKind::Weekly(vec![
                (
                    Weekday::Mon,
                    ranges(&["08:00-09:00", "10:00-11:00", "12:00-13:00", "14:00-15:00"]),
                ),
                (Weekday::Fri, ranges(&["08:00-10:00"])),
            ]),
        );

        convert_schedules(&mut scope, &[work]);
        let times = scope.base.schedule("work");
        assert_eq!(times.len(), 3);
        assert_eq!(times[0].name, "work");
        match &times[0].kind {
            ObjectKind::Time(TimeSpec::Recurring {
                recurrence,
                hour_ranges,
            }) => {
                assert_eq!(*recurrence, Recurrence::Weekly(Weekday::Mon));
                assert_eq!(hour_ranges.len(), 3);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        match &times[2].kind {
            ObjectKind::Time(TimeSpec::Recurring { recurrence, .. }) => {
                assert_eq!(*recurrence, Recurrence::Weekly(Weekday::Fri));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        let names: Vec<_> = times.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["work", "work_t0", "work_t1"]);
    }

    #[test]
    fn non_recurring_ranges_parse_absolute_windows() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let freeze = schedule(
            "change-freeze",
            ScheduleKind::NonRecurring(ranges(&[
                "2024/12/20@18:00-2025/01/02@08:00",
                "garbage",
                "2024/13/01@00:00-2024/13/02@00:00",
            ])),
        );

        convert_schedules(&mut scope, &[freeze]);
        let times = scope.base.schedule("change-freeze");
        assert_eq!(times.len(), 1);
        assert_eq!(times[0].name, "chang_t0");
        match &times[0].kind {
            ObjectKind::Time(spec) => assert_eq!(
                spec.absolute_window(),
                Some([
                    "20-Dec-2024".to_string(),
                    "18:00".to_string(),
                    "02-Jan-2025".to_string(),
                    "08:00".to_string()
                ])
            ),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(scope
            .diagnostics
            .warnings
            .iter()
            .any(|w| w.starts_with("change-freeze schedule contains invalid date range")));
    }

    #[test]
    fn empty_schedule_is_reported() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_schedules(&mut scope, &[schedule("never", ScheduleKind::Empty)]);
        assert!(scope.base.schedule("never").is_empty());
        assert_eq!(scope.diagnostics.warnings.len(), 1);
    }
}
