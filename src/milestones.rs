//! Gamified progress feedback. A milestone is a named threshold on a cumulative metric, and the
//! engine reports which one was reached last and how far along the next one is.
//!
//! Milestone lists are static and must stay sorted ascending by threshold.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Milestone {
    pub name: &'static str,
    /// In the unit of the metric: keystrokes or millimetres.
    pub threshold: f64,
    pub icon: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneProgress<'a> {
    pub current: Option<&'a Milestone>,
    pub next: Option<&'a Milestone>,
    /// Always in `[0, 1]`.
    pub progress: f64,
    pub is_completed: bool,
}

const fn milestone(
    name: &'static str,
    threshold: f64,
    icon: &'static str,
    description: &'static str,
) -> Milestone {
    Milestone {
        name,
        threshold,
        icon,
        description,
    }
}

pub static KEYSTROKE_MILESTONES: &[Milestone] = &[
    milestone("Tweet", 140., "bubble.left", "1 tweet"),
    milestone("Email", 500., "envelope", "Short email"),
    milestone("A4 Page", 800., "doc.text", "1 A4 page"),
    milestone("Blog Post", 2_000., "newspaper", "Blog article"),
    milestone("Essay", 5_000., "doc.richtext", "Short essay"),
    milestone("Short Story", 10_000., "book.closed", "Short story"),
    milestone("Report", 25_000., "doc.text.magnifyingglass", "Business report"),
    milestone("Thesis Chapter", 50_000., "graduationcap", "1 chapter"),
    milestone("Novella", 100_000., "books.vertical", "Novella"),
    milestone("Novel", 250_000., "book", "Short novel"),
    milestone("HP Book 1", 516_000., "wand.and.stars", "Harry Potter 1"),
    milestone("War and Peace", 1_200_000., "building.columns", "Epic novel"),
    milestone("HP All Books", 6_506_000., "sparkles", "All HP books"),
];

/// Thresholds are in millimetres.
pub static DISTANCE_MILESTONES: &[Milestone] = &[
    milestone("Screen Width", 600., "display", "27\" display"),
    milestone("Desk Length", 1_500., "desk", "Office desk"),
    milestone("Room", 5_000., "square.split.bottomrightquarter", "Across a room"),
    milestone("Hallway", 20_000., "arrow.left.and.right", "Down the hall"),
    milestone("100m Sprint", 100_000., "figure.run", "100m dash"),
    milestone("Football Field", 110_000., "sportscourt", "Full field"),
    milestone("Around the Block", 400_000., "map", "City block"),
    milestone("1 km", 1_000_000., "flag", "1 kilometer"),
    milestone("Tokyo Tower", 3_330_000., "building.2", "333m height"),
    milestone("Mt. Fuji", 3_776_000., "mountain.2", "3,776m"),
    milestone("5K Run", 5_000_000., "figure.run.circle", "5km race"),
    milestone("10K Run", 10_000_000., "medal", "10km race"),
    milestone("Half Marathon", 21_097_500., "trophy", "21.1km"),
    milestone("Full Marathon", 42_195_000., "trophy.fill", "42.195km"),
    milestone("Ultramarathon", 100_000_000., "star.circle", "100km"),
    milestone("Tokyo-Osaka", 400_000_000., "car", "400km"),
];

/// Number of milestones in `milestones` whose threshold has been reached by `value`.
fn reached(milestones: &[Milestone], value: f64) -> usize {
    milestones.partition_point(|m| m.threshold <= value)
}

/// Computes progress of `value` against an ascending list of milestones.
pub fn progress(milestones: &[Milestone], value: f64) -> MilestoneProgress<'_> {
    let reached = reached(milestones, value);
    let current = reached.checked_sub(1).map(|index| &milestones[index]);
    let next = milestones.get(reached);

    let Some(next) = next else {
        return MilestoneProgress {
            current,
            next: None,
            progress: 1.,
            is_completed: true,
        };
    };

    let base = current.map_or(0., |m| m.threshold);
    let ratio = (value - base) / (next.threshold - base);
    let progress = if ratio.is_nan() {
        0.
    } else {
        ratio.clamp(0., 1.)
    };

    MilestoneProgress {
        current,
        next: Some(next),
        progress,
        is_completed: false,
    }
}

/// Every milestone reached by `value`, in list order.
pub fn completed(milestones: &[Milestone], value: f64) -> &[Milestone] {
    &milestones[..reached(milestones, value)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(values: &[f64]) -> Vec<Milestone> {
        values
            .iter()
            .map(|v| milestone("test", *v, "icon", "test milestone"))
            .collect()
    }

    #[test]
    fn test_progress_between_milestones() {
        let list = thresholds(&[100., 500., 1000.]);
        let result = progress(&list, 300.);
        assert_eq!(result.current.map(|m| m.threshold), Some(100.));
        assert_eq!(result.next.map(|m| m.threshold), Some(500.));
        assert_eq!(result.progress, 0.5);
        assert!(!result.is_completed);
    }

    #[test]
    fn test_progress_past_last() {
        let list = thresholds(&[100., 500., 1000.]);
        let result = progress(&list, 1500.);
        assert_eq!(result.current.map(|m| m.threshold), Some(1000.));
        assert_eq!(result.next, None);
        assert_eq!(result.progress, 1.);
        assert!(result.is_completed);

        assert!(progress(&list, 1000.).is_completed);
    }

    #[test]
    fn test_progress_before_first() {
        let list = thresholds(&[100., 500., 1000.]);
        let result = progress(&list, 25.);
        assert_eq!(result.current, None);
        assert_eq!(result.next, Some(&list[0]));
        assert_eq!(result.progress, 0.25);
    }

    #[test]
    fn test_progress_exactly_on_threshold() {
        let list = thresholds(&[100., 500., 1000.]);
        let result = progress(&list, 500.);
        assert_eq!(result.current, Some(&list[1]));
        assert_eq!(result.next, Some(&list[2]));
        assert_eq!(result.progress, 0.);
    }

    #[test]
    fn test_progress_always_in_range() {
        for list in [KEYSTROKE_MILESTONES, DISTANCE_MILESTONES] {
            let mut value = 0.;
            while value < 1e9 {
                let result = progress(list, value);
                assert!((0. ..=1.).contains(&result.progress), "{value}");
                value = value * 1.7 + 13.;
            }
        }
    }

    #[test]
    fn test_completed_is_prefix_up_to_current() {
        let list = thresholds(&[100., 500., 1000.]);
        assert!(completed(&list, 50.).is_empty());
        assert_eq!(completed(&list, 700.), &list[..2]);
        assert_eq!(completed(&list, 5000.), &list[..]);

        let result = progress(&list, 700.);
        assert_eq!(completed(&list, 700.).last(), result.current);
    }

    #[test]
    fn test_static_lists_are_sorted() {
        for list in [KEYSTROKE_MILESTONES, DISTANCE_MILESTONES] {
            assert!(list.windows(2).all(|w| w[0].threshold < w[1].threshold));
        }
    }
}
