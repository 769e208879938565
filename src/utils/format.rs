/// Human friendly distance: millimetres below a metre, metres below a kilometre.
pub fn format_distance(distance_mm: f64) -> String {
    if distance_mm >= 1_000_000. {
        format!("{:.1} km", distance_mm / 1_000_000.)
    } else if distance_mm >= 1000. {
        format!("{:.1} m", distance_mm / 1000.)
    } else {
        format!("{:.0} mm", distance_mm)
    }
}

/// Inserts thousands separators, `1234567` becomes `1,234,567`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            result.push(',');
        }
        result.push(digit);
    }
    result
}

/// Fixed width text bar, used by the reports.
pub fn progress_bar(progress: f64, width: usize) -> String {
    let progress = if progress.is_nan() {
        0.
    } else {
        progress.clamp(0., 1.)
    };
    let filled = (progress * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
