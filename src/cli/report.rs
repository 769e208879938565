//! Read-only reports over the persisted statistics. Nothing here writes to the store, so it's
//! safe to run while the daemon is recording.

use std::fmt::Display;

use ansi_term::Style;
use anyhow::Result;
use serde::Serialize;

use crate::{
    daemon::storage::{
        daily_stats::{DailyStatsStore, StatsTotals},
        entities::DailyStats,
        kv_store::KeyValueStore,
    },
    milestones::{
        completed, progress, Milestone, MilestoneProgress, DISTANCE_MILESTONES,
        KEYSTROKE_MILESTONES,
    },
    utils::{
        format::{format_count, format_distance, progress_bar},
        percentage::Percentage,
    },
};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayReport {
    pub today: DailyStats,
    pub keys: MilestoneProgress<'static>,
    pub distance: MilestoneProgress<'static>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekReport {
    pub days: Vec<DailyStats>,
    pub totals: StatsTotals,
    pub average_daily: StatsTotals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonesReport {
    pub today: DailyStats,
    pub keys: &'static [Milestone],
    pub distance: &'static [Milestone],
}

pub async fn today_report<S: KeyValueStore>(store: &DailyStatsStore<S>) -> Result<TodayReport> {
    let today = store.open_day_or_zero().await?;
    Ok(TodayReport {
        today,
        keys: progress(KEYSTROKE_MILESTONES, today.key_count as f64),
        distance: progress(DISTANCE_MILESTONES, today.distance_mm),
    })
}

pub async fn week_report<S: KeyValueStore>(store: &DailyStatsStore<S>) -> Result<WeekReport> {
    Ok(WeekReport {
        days: store.weekly_stats().await?,
        totals: store.weekly_totals().await?,
        average_daily: store.average_daily().await?,
    })
}

pub async fn milestones_report<S: KeyValueStore>(
    store: &DailyStatsStore<S>,
) -> Result<MilestonesReport> {
    let today = store.open_day_or_zero().await?;
    Ok(MilestonesReport {
        today,
        keys: completed(KEYSTROKE_MILESTONES, today.key_count as f64),
        distance: completed(DISTANCE_MILESTONES, today.distance_mm),
    })
}

/// Prints `report` either as pretty JSON or through its [Display] implementation.
pub fn print_report(report: &(impl Serialize + Display), json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn write_progress(
    f: &mut std::fmt::Formatter<'_>,
    label: &str,
    value: &str,
    progress: &MilestoneProgress<'_>,
) -> std::fmt::Result {
    writeln!(f, "{:<12}{}", label, Style::new().bold().paint(value))?;
    if let Some(current) = progress.current {
        writeln!(f, "{:<12}{} ({})", "", current.name, current.description)?;
    }
    match progress.next {
        Some(next) => writeln!(
            f,
            "{:<12}{} {} to {}",
            "",
            progress_bar(progress.progress, BAR_WIDTH),
            Percentage::from_ratio(progress.progress),
            next.name
        ),
        None => writeln!(f, "{:<12}All milestones reached", ""),
    }
}

impl Display for TodayReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", Style::new().underline().paint(self.today.date_key()))?;
        write_progress(
            f,
            "Keystrokes",
            &format_count(self.today.key_count),
            &self.keys,
        )?;
        write_progress(
            f,
            "Distance",
            &format_distance(self.today.distance_mm),
            &self.distance,
        )
    }
}

impl Display for WeekReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for day in &self.days {
            writeln!(
                f,
                "{}\t{:>10}\t{:>10}",
                day.date.format("%a %Y-%m-%d"),
                format_count(day.key_count),
                format_distance(day.distance_mm)
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{}\t{:>10}\t{:>10}",
            Style::new().bold().paint("Week total    "),
            format_count(self.totals.key_count),
            format_distance(self.totals.distance_mm)
        )?;
        writeln!(
            f,
            "{}\t{:>10}\t{:>10}",
            Style::new().bold().paint("Daily average "),
            format_count(self.average_daily.key_count),
            format_distance(self.average_daily.distance_mm)
        )
    }
}

fn write_completed(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    milestones: &[Milestone],
) -> std::fmt::Result {
    writeln!(f, "{}", Style::new().underline().paint(title))?;
    if milestones.is_empty() {
        return writeln!(f, "  none yet");
    }
    for milestone in milestones {
        writeln!(f, "  {:<16}{}", milestone.name, milestone.description)?;
    }
    Ok(())
}

impl Display for MilestonesReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_completed(f, "Keystrokes", self.keys)?;
        writeln!(f)?;
        write_completed(f, "Distance", self.distance)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::NaiveDate;

    use crate::{
        daemon::storage::{
            daily_stats::{DailyStatsStore, StatsTotals},
            entities::DailyStats,
            kv_store::MemoryStore,
        },
        utils::clock::test_clock::ManualClock,
    };

    use super::{milestones_report, today_report, week_report};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn store() -> DailyStatsStore<MemoryStore> {
        DailyStatsStore::new(
            MemoryStore::new(),
            Arc::new(ManualClock::at(day(10), 12, 0)),
        )
    }

    #[tokio::test]
    async fn test_today_report() -> Result<()> {
        let store = store();
        store.save(DailyStats::new(day(10), 300, 700.)).await?;

        let report = today_report(&store).await?;

        assert_eq!(report.today, DailyStats::new(day(10), 300, 700.));
        assert_eq!(report.keys.current.map(|m| m.name), Some("Tweet"));
        assert_eq!(report.keys.next.map(|m| m.name), Some("Email"));
        assert_eq!(report.distance.current.map(|m| m.name), Some("Screen Width"));

        let text = report.to_string();
        assert!(text.contains("300"));
        assert!(text.contains("700 mm"));
        assert!(text.contains("to Email"));
        Ok(())
    }

    #[tokio::test]
    async fn test_today_report_without_data() -> Result<()> {
        let report = today_report(&store()).await?;

        assert_eq!(report.today, DailyStats::zero(day(10)));
        assert_eq!(report.keys.current, None);
        assert_eq!(report.keys.progress, 0.);
        Ok(())
    }

    #[tokio::test]
    async fn test_week_report_json() -> Result<()> {
        let store = store();
        store.save(DailyStats::new(day(9), 10, 1.)).await?;
        store.save(DailyStats::new(day(10), 20, 2.)).await?;

        let report = week_report(&store).await?;
        assert_eq!(report.days.len(), 7);
        assert_eq!(
            report.totals,
            StatsTotals {
                key_count: 30,
                distance_mm: 3.
            }
        );

        let json = serde_json::to_value(&report)?;
        assert_eq!(json["days"][6]["date"], "2024-05-10");
        assert_eq!(json["days"][5]["keyCount"], 10);
        assert_eq!(json["averageDaily"]["keyCount"], 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_week_report_after_daemon_was_stopped_overnight() -> Result<()> {
        let clock = ManualClock::at(day(10), 22, 0);
        let store = DailyStatsStore::new(MemoryStore::new(), Arc::new(clock.clone()));
        store.save(DailyStats::new(day(10), 500, 40.)).await?;

        clock.set(day(11), 9, 0);
        let report = week_report(&store).await?;

        assert_eq!(report.days[5], DailyStats::new(day(10), 500, 40.));
        assert_eq!(report.days[6], DailyStats::zero(day(11)));
        assert_eq!(report.totals.key_count, 500);
        assert_eq!(report.average_daily.key_count, 500);
        assert!(report.to_string().contains("500"));
        Ok(())
    }

    #[tokio::test]
    async fn test_milestones_report() -> Result<()> {
        let store = store();
        store.save(DailyStats::new(day(10), 900, 0.)).await?;

        let report = milestones_report(&store).await?;

        assert_eq!(
            report.keys.iter().map(|m| m.name).collect::<Vec<_>>(),
            vec!["Tweet", "Email", "A4 Page"]
        );
        assert!(report.distance.is_empty());
        assert!(report.to_string().contains("none yet"));
        Ok(())
    }
}
