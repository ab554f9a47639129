// src/recording/objective.rs
//! Wool objective identifiers
//!
//! Objectives are persisted as the dye colour's ordinal in the host's colour
//! table. Unknown colour names map to [`UNKNOWN_OBJECTIVE`].

/// Sentinel for a colour name that is not in the table
pub const UNKNOWN_OBJECTIVE: i32 = -1;

const DYE_COLORS: [&str; 16] = [
    "WHITE",
    "ORANGE",
    "MAGENTA",
    "LIGHT_BLUE",
    "YELLOW",
    "LIME",
    "PINK",
    "GRAY",
    "LIGHT_GRAY",
    "CYAN",
    "PURPLE",
    "BLUE",
    "BROWN",
    "GREEN",
    "RED",
    "BLACK",
];

/// Objective id for a dye colour name (`"RED"`, `"light blue"`, `"Light-Gray"`)
pub fn objective_id(color: &str) -> i32 {
    let normalized: String = color
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    // Pre-1.13 name for LIGHT_GRAY
    let normalized = if normalized == "SILVER" {
        "LIGHT_GRAY"
    } else {
        normalized.as_str()
    };

    DYE_COLORS
        .iter()
        .position(|name| *name == normalized)
        .map(|idx| idx as i32)
        .unwrap_or(UNKNOWN_OBJECTIVE)
}

/// Colour name for an objective id
pub fn color_name(objective_id: i32) -> Option<&'static str> {
    usize::try_from(objective_id)
        .ok()
        .and_then(|idx| DYE_COLORS.get(idx).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_colors() {
        assert_eq!(objective_id("WHITE"), 0);
        assert_eq!(objective_id("RED"), 14);
        assert_eq!(objective_id("BLACK"), 15);
        assert_eq!(objective_id("light blue"), 3);
        assert_eq!(objective_id("Light-Gray"), 8);
        assert_eq!(objective_id("SILVER"), 8);
    }

    #[test]
    fn test_unknown_color_is_sentinel() {
        assert_eq!(objective_id("CHARTREUSE"), UNKNOWN_OBJECTIVE);
        assert_eq!(objective_id(""), UNKNOWN_OBJECTIVE);
    }

    #[test]
    fn test_color_name() {
        assert_eq!(color_name(14), Some("RED"));
        assert_eq!(color_name(-1), None);
        assert_eq!(color_name(16), None);
    }
}
