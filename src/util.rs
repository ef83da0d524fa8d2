/// Render a second count as `MM:SS`, clamping negatives to zero.
/// Minutes are not wrapped into hours, so 3725 seconds is `62:05`.
pub fn format_mmss(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let mins = seconds / 60;
    let secs = seconds % 60;
    format!("{mins:02}:{secs:02}")
}

/// Team names are compared after trimming; blank names collapse into one bucket.
pub fn normalize_team(team: &str) -> String {
    let trimmed = team.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace anything outside `[A-Za-z0-9]` with `_` so the name is safe in a file name.
pub fn sanitize_for_file_name(team: &str) -> String {
    team.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Short mission code as shown on the ledger, e.g. `M03`.
pub fn mission_code(mission_id: u32) -> String {
    format!("M{mission_id:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(59), "00:59");
        assert_eq!(format_mmss(61), "01:01");
        assert_eq!(format_mmss(1800), "30:00");
    }

    #[test]
    fn test_format_mmss_negative_clamps() {
        assert_eq!(format_mmss(-5), "00:00");
    }

    #[test]
    fn test_format_mmss_past_an_hour() {
        assert_eq!(format_mmss(3725), "62:05");
    }

    #[test]
    fn test_normalize_team() {
        assert_eq!(normalize_team("  Team Alpha "), "Team Alpha");
        assert_eq!(normalize_team("   "), "Unknown");
        assert_eq!(normalize_team(""), "Unknown");
    }

    #[test]
    fn test_normalize_team_keeps_case() {
        assert_ne!(normalize_team("alpha"), normalize_team("Alpha"));
    }

    #[test]
    fn test_sanitize_for_file_name() {
        assert_eq!(sanitize_for_file_name("Cyber Sharks!"), "Cyber_Sharks_");
        assert_eq!(sanitize_for_file_name("Team-7"), "Team_7");
        assert_eq!(sanitize_for_file_name("Équipe"), "_quipe");
    }

    #[test]
    fn test_mission_code() {
        assert_eq!(mission_code(1), "M01");
        assert_eq!(mission_code(12), "M12");
    }
}
